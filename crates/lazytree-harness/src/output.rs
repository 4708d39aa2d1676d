#![forbid(unsafe_code)]

//! Frame dumps.

use std::io::{self, Write};

use lazytree_core::{NodeStatus, RowKind, ViewFrame};
use serde::Serialize;

/// One harness step and the frame it produced, if any.
#[derive(Debug, Serialize)]
pub struct StepRecord<'a> {
    pub step: usize,
    pub action: String,
    /// Outcome of the action as reported by the engine.
    pub effect: String,
    /// `None` when a scroll left the spacers unchanged.
    pub frame: Option<&'a ViewFrame>,
}

/// Write `record` as a single JSON line.
pub fn write_json(out: &mut impl Write, record: &StepRecord<'_>) -> io::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    writeln!(out)
}

/// Write `record` as an indented outline.
pub fn write_text(out: &mut impl Write, record: &StepRecord<'_>) -> io::Result<()> {
    writeln!(
        out,
        "== step {}: {} -> {}",
        record.step, record.action, record.effect
    )?;
    let Some(frame) = record.frame else {
        return writeln!(out, "   (spacers unchanged, no frame)");
    };

    match &frame.root {
        None => return writeln!(out, "   (root not requested)"),
        Some(NodeStatus::Loading) => writeln!(out, "   (root loading)")?,
        Some(NodeStatus::Failed(reason)) => writeln!(out, "   (root failed: {reason})")?,
        Some(NodeStatus::Ready) => {}
    }

    writeln!(
        out,
        "   deployed={} window={:?} top={}px bottom={}px",
        frame.deployed_count,
        frame.edges.render_window(frame.deployed_count),
        frame.spacers.top,
        frame.spacers.bottom
    )?;
    for row in &frame.rows {
        let indent = "  ".repeat(row.depth);
        let marker = if row.expanded { 'v' } else { '>' };
        let status = match &row.status {
            NodeStatus::Ready => String::new(),
            NodeStatus::Loading => " (loading)".to_string(),
            NodeStatus::Failed(reason) => format!(" (failed: {reason})"),
        };
        let visibility = match row.kind {
            RowKind::Container => " [container]",
            RowKind::Row if row.occluded => " [overscan]",
            RowKind::Row => "",
        };
        writeln!(
            out,
            "   {:>6} {indent}{marker} {}{status}{visibility}",
            row.position, row.label
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytree_core::{SpacerHeights, TreePath, ViewRow, ViewportEdges};

    fn frame() -> ViewFrame {
        ViewFrame {
            rows: vec![
                ViewRow {
                    path: TreePath::from([0]),
                    label: "0".into(),
                    depth: 0,
                    position: 0,
                    expanded: true,
                    occluded: false,
                    kind: RowKind::Row,
                    status: NodeStatus::Ready,
                },
                ViewRow {
                    path: TreePath::from([0, 0]),
                    label: "0, 0".into(),
                    depth: 1,
                    position: 1,
                    expanded: true,
                    occluded: false,
                    kind: RowKind::Row,
                    status: NodeStatus::Loading,
                },
            ],
            spacers: SpacerHeights { top: 0, bottom: 60 },
            edges: ViewportEdges {
                last_occluded_above: None,
                first_occluded_below: 2,
            },
            deployed_count: 4,
            root: Some(NodeStatus::Ready),
        }
    }

    fn render(write: fn(&mut Vec<u8>, &StepRecord<'_>) -> io::Result<()>, frame: &ViewFrame) -> String {
        let record = StepRecord {
            step: 1,
            action: "toggle 0-0".into(),
            effect: "load".into(),
            frame: Some(frame),
        };
        let mut buf = Vec::new();
        write(&mut buf, &record).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn text_outline() {
        let text = render(|out, r| write_text(out, r), &frame());
        assert!(text.starts_with("== step 1: toggle 0-0 -> load\n"));
        assert!(text.contains("deployed=4 window=Some(0..=1) top=0px bottom=60px"));
        assert!(text.contains("  v 0, 0 (loading)"));
    }

    #[test]
    fn json_line() {
        let text = render(|out, r| write_json(out, r), &frame());
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["step"], 1);
        assert_eq!(value["frame"]["rows"][1]["path"], serde_json::json!([0, 0]));
        assert_eq!(value["frame"]["rows"][1]["status"], "loading");
        assert_eq!(value["frame"]["spacers"]["bottom"], 60);
    }

    #[test]
    fn unchanged_scroll_has_no_frame() {
        let record = StepRecord {
            step: 2,
            action: "scroll 5".into(),
            effect: "unchanged".into(),
            frame: None,
        };
        let mut buf = Vec::new();
        write_text(&mut buf, &record).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("no frame"));
    }
}
