#![forbid(unsafe_code)]

//! Headless reference driver for lazytree-core.
//!
//! Loads a synthetic tree, replays scripted toggles and scrolls, and dumps
//! the frame produced by each step.
//!
//! # Running
//!
//! ```sh
//! cargo run -p lazytree-harness -- --toggle=3 --scroll=120 --format=json
//! ```

mod cli;
mod output;
mod synthetic;

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use lazytree_core::{Completion, ToggleEffect, TreeDriver, TreeError, ViewportGeometry};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Format, Opts, Step};
use crate::output::StepRecord;
use crate::synthetic::SyntheticLoader;

/// Upper bound on waiting for delayed loads after each step.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() {
    init_tracing();
    let opts = Opts::parse();
    if let Err(errors) = opts.tree.validate() {
        for err in errors {
            eprintln!("Invalid configuration: {err}");
        }
        process::exit(1);
    }
    if let Err(err) = run(&opts, &mut io::stdout().lock()) {
        eprintln!("lazytree-harness: {err}");
        process::exit(1);
    }
}

fn run(opts: &Opts, out: &mut impl Write) -> io::Result<()> {
    let loader = SyntheticLoader::new(opts.seed, opts.max_top, opts.max_children)
        .failing(opts.fail.clone())
        .delayed(Duration::from_millis(opts.delay_ms));
    let mut driver = TreeDriver::new(opts.tree, loader);
    info!(
        node_height = opts.tree.node_height,
        panel_height = opts.tree.panel_height,
        clip_mode = opts.tree.clip_mode.as_str(),
        steps = opts.steps.len(),
        "harness starting"
    );

    driver.start();
    let effect = describe_completions(&driver.settle(SETTLE_TIMEOUT));
    let frame = driver.frame();
    emit(
        opts.format,
        out,
        &StepRecord {
            step: 0,
            action: "start".into(),
            effect,
            frame: Some(&frame),
        },
    )?;

    for (index, step) in opts.steps.iter().enumerate() {
        let (action, effect, frame) = match step {
            Step::Toggle(path) => {
                let effect = driver.toggle(path);
                let mut effect = describe_toggle(&effect);
                let completions = driver.settle(SETTLE_TIMEOUT);
                if !completions.is_empty() {
                    effect = format!("{effect}; {}", describe_completions(&completions));
                }
                (format!("toggle {path}"), effect, Some(driver.frame()))
            }
            Step::Scroll(px) => {
                let geometry = ViewportGeometry::new(*px, opts.tree.panel_height);
                let frame = driver.scroll(geometry);
                let effect = if frame.is_some() { "moved" } else { "unchanged" };
                (format!("scroll {px}"), effect.to_string(), frame)
            }
        };
        emit(
            opts.format,
            out,
            &StepRecord {
                step: index + 1,
                action,
                effect,
                frame: frame.as_ref(),
            },
        )?;
    }
    out.flush()
}

fn emit(format: Format, out: &mut impl Write, record: &StepRecord<'_>) -> io::Result<()> {
    match format {
        Format::Text => output::write_text(out, record),
        Format::Json => output::write_json(out, record),
    }
}

fn describe_toggle(effect: &ToggleEffect) -> String {
    match effect {
        ToggleEffect::Ignored => "ignored".into(),
        ToggleEffect::Load(ticket) => format!("load #{}", ticket.generation()),
        ToggleEffect::Cancelled => "cancelled".into(),
        ToggleEffect::Expanded => "expanded".into(),
        ToggleEffect::Collapsed => "collapsed".into(),
    }
}

fn describe_completions(results: &[Result<Completion, TreeError>]) -> String {
    let parts: Vec<String> = results
        .iter()
        .map(|result| match result {
            Ok(Completion::Expanded { children, .. }) => format!("loaded {children} children"),
            Ok(Completion::Failed(failure)) => format!("failed: {}", failure.reason),
            Err(err) => {
                warn!(%err, "completion rejected");
                format!("rejected: {err}")
            }
        })
        .collect();
    if parts.is_empty() {
        "pending".into()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytree_core::TreePath;

    fn opts(steps: Vec<Step>) -> Opts {
        let mut opts = Opts {
            steps,
            max_top: 20,
            max_children: 4,
            ..Opts::default()
        };
        opts.tree = opts.tree.with_panel_height(90);
        opts
    }

    fn output(opts: &Opts) -> String {
        let mut buf = Vec::new();
        run(opts, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn start_dumps_root_children() {
        let text = output(&opts(Vec::new()));
        assert!(text.starts_with("== step 0: start -> loaded "));
        assert!(text.contains("> 0\n"));
    }

    #[test]
    fn scripted_steps_in_order() {
        let opts = opts(vec![
            Step::Toggle(TreePath::from([0])),
            Step::Scroll(0),
            Step::Toggle(TreePath::from([0])),
        ]);
        let text = output(&opts);
        let headers: Vec<_> = text.lines().filter(|l| l.starts_with("==")).collect();
        assert_eq!(headers.len(), 4);
        assert!(headers[1].starts_with("== step 1: toggle 0 -> load #2; loaded "));
        assert_eq!(headers[2], "== step 2: scroll 0 -> unchanged");
        assert_eq!(headers[3], "== step 3: toggle 0 -> collapsed");
    }

    #[test]
    fn failing_path_is_reported() {
        let mut opts = opts(vec![Step::Toggle(TreePath::from([0]))]);
        opts.fail = vec![TreePath::from([0])];
        opts.format = Format::Json;
        let text = output(&opts);
        let last: serde_json::Value =
            serde_json::from_str(text.lines().last().unwrap()).unwrap();
        assert_eq!(last["effect"], "load #2; failed: synthetic failure");
        assert_eq!(
            last["frame"]["rows"][0]["status"]["failed"],
            "synthetic failure"
        );
    }

    #[test]
    fn delayed_loader_settles() {
        let mut opts = opts(vec![Step::Toggle(TreePath::from([0]))]);
        opts.delay_ms = 1;
        let text = output(&opts);
        assert!(!text.contains("pending"), "{text}");
    }
}
