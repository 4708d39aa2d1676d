#![forbid(unsafe_code)]

//! Tree configuration.
//!
//! Defaults can be overridden from the environment:
//!
//! | variable | field | format |
//! |---|---|---|
//! | `LAZYTREE_NODE_HEIGHT` | `node_height` | positive integer (px) |
//! | `LAZYTREE_PANEL_HEIGHT` | `panel_height` | positive integer (px) |
//! | `LAZYTREE_CLIP_MODE` | `clip_mode` | `own` or `span` |
//! | `LAZYTREE_SUPPRESS_UNCHANGED` | `suppress_unchanged_scroll` | bool (1/0/true/false) |

use std::env;
use std::fmt;

use crate::viewport::ClipMode;

pub const ENV_NODE_HEIGHT: &str = "LAZYTREE_NODE_HEIGHT";
pub const ENV_PANEL_HEIGHT: &str = "LAZYTREE_PANEL_HEIGHT";
pub const ENV_CLIP_MODE: &str = "LAZYTREE_CLIP_MODE";
pub const ENV_SUPPRESS_UNCHANGED: &str = "LAZYTREE_SUPPRESS_UNCHANGED";

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Height of every row in pixels. The window math assumes uniform rows.
    pub node_height: u32,
    /// Initial viewport height in pixels, used until the host reports one.
    pub panel_height: u32,
    /// Lower clip boundary policy for child instantiation.
    pub clip_mode: ClipMode,
    /// Skip emitting a frame on scroll when the spacers did not change.
    pub suppress_unchanged_scroll: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            node_height: 30,
            panel_height: 600,
            clip_mode: ClipMode::default(),
            suppress_unchanged_scroll: true,
        }
    }
}

/// Configuration parse diagnostics (env + validation).
#[derive(Debug, Clone)]
pub struct TreeConfigParse {
    pub config: TreeConfig,
    pub errors: Vec<ConfigError>,
}

/// Configuration error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub field: &'static str,
    pub value: String,
    pub message: String,
}

impl ConfigError {
    fn new(field: &'static str, value: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.field, self.value, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl TreeConfig {
    #[must_use]
    pub fn with_node_height(mut self, node_height: u32) -> Self {
        self.node_height = node_height;
        self
    }

    #[must_use]
    pub fn with_panel_height(mut self, panel_height: u32) -> Self {
        self.panel_height = panel_height;
        self
    }

    #[must_use]
    pub fn with_clip_mode(mut self, clip_mode: ClipMode) -> Self {
        self.clip_mode = clip_mode;
        self
    }

    #[must_use]
    pub fn with_suppress_unchanged_scroll(mut self, suppress: bool) -> Self {
        self.suppress_unchanged_scroll = suppress;
        self
    }

    /// Parse config from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with_diagnostics().config
    }

    /// Parse config from environment variables and return diagnostics.
    #[must_use]
    pub fn from_env_with_diagnostics() -> TreeConfigParse {
        from_env_with(|key| env::var(key).ok())
    }

    /// Validate config constraints and return all violations.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();
        if self.node_height == 0 {
            errors.push(ConfigError::new(
                "node_height",
                "0",
                "rows must be at least 1px tall",
            ));
        }
        if self.panel_height == 0 {
            errors.push(ConfigError::new(
                "panel_height",
                "0",
                "viewport must be at least 1px tall",
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn from_env_with<F>(mut get: F) -> TreeConfigParse
where
    F: FnMut(&str) -> Option<String>,
{
    let mut config = TreeConfig::default();
    let mut errors = Vec::new();

    if let Some(value) = get(ENV_NODE_HEIGHT) {
        match parse_positive(&value) {
            Some(parsed) => config.node_height = parsed,
            None => errors.push(ConfigError::new(
                "node_height",
                value,
                "expected positive integer",
            )),
        }
    }

    if let Some(value) = get(ENV_PANEL_HEIGHT) {
        match parse_positive(&value) {
            Some(parsed) => config.panel_height = parsed,
            None => errors.push(ConfigError::new(
                "panel_height",
                value,
                "expected positive integer",
            )),
        }
    }

    if let Some(value) = get(ENV_CLIP_MODE) {
        match ClipMode::parse(&value) {
            Some(parsed) => config.clip_mode = parsed,
            None => errors.push(ConfigError::new("clip_mode", value, "expected own|span")),
        }
    }

    if let Some(value) = get(ENV_SUPPRESS_UNCHANGED) {
        match parse_bool(&value) {
            Some(parsed) => config.suppress_unchanged_scroll = parsed,
            None => errors.push(ConfigError::new(
                "suppress_unchanged_scroll",
                value,
                "expected bool (1/0/true/false)",
            )),
        }
    }

    if let Err(mut invalid) = config.validate() {
        errors.append(&mut invalid);
    }

    TreeConfigParse { config, errors }
}

fn parse_positive(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|&n| n > 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
