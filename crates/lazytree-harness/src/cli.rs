#![forbid(unsafe_code)]

//! Command-line argument parsing for the harness.
//!
//! Parses args manually. Environment variables with the `LAZYTREE_HARNESS_*`
//! prefix set defaults; tree geometry defaults come from
//! [`TreeConfig::from_env_with_diagnostics`].

use std::env;
use std::fmt;
use std::process;

use lazytree_core::{ClipMode, TreeConfig, TreePath};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const HELP_TEXT: &str = "\
lazytree harness: drive a lazily-loaded tree without a UI

USAGE:
    lazytree-harness [OPTIONS]

OPTIONS:
    --node-height=N      Row height in px (default: 30)
    --panel-height=N     Viewport height in px (default: 600)
    --clip-mode=MODE     Child clipping: 'span' (default) or 'own'
    --toggle=PATH        Toggle the node at PATH (e.g. 3 or 3-0-1); repeatable
    --scroll=PX          Scroll to PX; repeatable, runs in order with --toggle
    --fail=PATH          Make loads of PATH fail; repeatable
    --seed=N             Seed for the synthetic child counts (default: 1)
    --max-top=N          Upper bound on top-level children (default: 1000)
    --max-children=N     Upper bound on deeper children (default: 10)
    --delay-ms=N         Answer loads from a thread after N ms per child
    --format=FMT         Output: 'text' (default) or 'json' (one object per step)
    --help, -h           Show this help message
    --version, -V        Show version

PATHS:
    Child indices joined by '-'. The first top-level node is 0, its second
    child is 0-1.

ENVIRONMENT VARIABLES:
    LAZYTREE_HARNESS_SEED        Override --seed
    LAZYTREE_HARNESS_FORMAT      Override --format
    LAZYTREE_HARNESS_DELAY_MS    Override --delay-ms
    LAZYTREE_HARNESS_MAX_TOP     Override --max-top
    LAZYTREE_NODE_HEIGHT         Default row height
    LAZYTREE_PANEL_HEIGHT        Default viewport height
    LAZYTREE_CLIP_MODE           Default clip mode
    LAZYTREE_SUPPRESS_UNCHANGED  Skip frames for scrolls that change nothing
    RUST_LOG                     Log filter for stderr diagnostics (default: warn)";

/// Frame output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" | "jsonl" => Some(Self::Json),
            _ => None,
        }
    }
}

/// One scripted interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Toggle(TreePath),
    Scroll(u32),
}

/// Parsed command-line options.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Engine configuration.
    pub tree: TreeConfig,
    /// Interactions in command-line order.
    pub steps: Vec<Step>,
    /// Paths whose loads fail.
    pub fail: Vec<TreePath>,
    pub seed: u64,
    pub max_top: usize,
    pub max_children: usize,
    /// Per-child answer delay in milliseconds (0 = answer inline).
    pub delay_ms: u64,
    pub format: Format,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            tree: TreeConfig::default(),
            steps: Vec::new(),
            fail: Vec::new(),
            seed: 1,
            max_top: 1000,
            max_children: 10,
            delay_ms: 0,
            format: Format::Text,
        }
    }
}

/// Result of argument parsing.
#[derive(Debug)]
pub enum Parsed {
    Run(Opts),
    Help,
    Version,
}

/// Invalid command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError(String);

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CliError {}

impl Opts {
    /// Parse command-line arguments and environment variables.
    ///
    /// Environment variables take precedence over defaults but are overridden
    /// by explicit command-line flags.
    pub fn parse() -> Self {
        let mut opts = Self::default();

        let tree = TreeConfig::from_env_with_diagnostics();
        for err in &tree.errors {
            eprintln!("Ignoring invalid environment setting: {err}");
        }
        opts.tree = tree.config;

        if let Ok(val) = env::var("LAZYTREE_HARNESS_SEED")
            && let Ok(n) = val.parse()
        {
            opts.seed = n;
        }
        if let Ok(val) = env::var("LAZYTREE_HARNESS_FORMAT")
            && let Some(format) = Format::parse(&val)
        {
            opts.format = format;
        }
        if let Ok(val) = env::var("LAZYTREE_HARNESS_DELAY_MS")
            && let Ok(n) = val.parse()
        {
            opts.delay_ms = n;
        }
        if let Ok(val) = env::var("LAZYTREE_HARNESS_MAX_TOP")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            opts.max_top = n;
        }

        match parse_args(opts, env::args().skip(1)) {
            Ok(Parsed::Run(opts)) => opts,
            Ok(Parsed::Help) => {
                println!("{HELP_TEXT}");
                process::exit(0);
            }
            Ok(Parsed::Version) => {
                println!("lazytree-harness {VERSION}");
                process::exit(0);
            }
            Err(err) => {
                eprintln!("{err}");
                eprintln!("Run with --help for usage information.");
                process::exit(1);
            }
        }
    }
}

/// Apply command-line `args` on top of `opts`.
pub fn parse_args<I>(mut opts: Opts, args: I) -> Result<Parsed, CliError>
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Parsed::Help),
            "--version" | "-V" => return Ok(Parsed::Version),
            other => {
                if let Some(val) = other.strip_prefix("--node-height=") {
                    opts.tree.node_height = positive(val, "--node-height")?;
                } else if let Some(val) = other.strip_prefix("--panel-height=") {
                    opts.tree.panel_height = positive(val, "--panel-height")?;
                } else if let Some(val) = other.strip_prefix("--clip-mode=") {
                    opts.tree.clip_mode = ClipMode::parse(val)
                        .ok_or_else(|| invalid("--clip-mode", val))?;
                } else if let Some(val) = other.strip_prefix("--toggle=") {
                    opts.steps.push(Step::Toggle(tree_path(val, "--toggle")?));
                } else if let Some(val) = other.strip_prefix("--scroll=") {
                    let px = val.parse().map_err(|_| invalid("--scroll", val))?;
                    opts.steps.push(Step::Scroll(px));
                } else if let Some(val) = other.strip_prefix("--fail=") {
                    opts.fail.push(tree_path(val, "--fail")?);
                } else if let Some(val) = other.strip_prefix("--seed=") {
                    opts.seed = val.parse().map_err(|_| invalid("--seed", val))?;
                } else if let Some(val) = other.strip_prefix("--max-top=") {
                    opts.max_top = positive(val, "--max-top")?;
                } else if let Some(val) = other.strip_prefix("--max-children=") {
                    opts.max_children = positive(val, "--max-children")?;
                } else if let Some(val) = other.strip_prefix("--delay-ms=") {
                    opts.delay_ms = val.parse().map_err(|_| invalid("--delay-ms", val))?;
                } else if let Some(val) = other.strip_prefix("--format=") {
                    opts.format = Format::parse(val).ok_or_else(|| invalid("--format", val))?;
                } else {
                    return Err(CliError(format!("Unknown argument: {other}")));
                }
            }
        }
    }
    Ok(Parsed::Run(opts))
}

fn invalid(flag: &str, val: &str) -> CliError {
    CliError(format!("Invalid {flag} value: {val}"))
}

fn positive<T>(val: &str, flag: &str) -> Result<T, CliError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match val.parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(invalid(flag, val)),
    }
}

fn tree_path(val: &str, flag: &str) -> Result<TreePath, CliError> {
    match val.parse::<TreePath>() {
        Ok(path) if !path.is_root() => Ok(path),
        _ => Err(invalid(flag, val)),
    }
}
