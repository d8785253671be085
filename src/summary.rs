use unicode_width::UnicodeWidthStr;

use crate::Analysis;
use crate::traversal::Direction;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(fill))
}

/// Plain-text table of the visited nodes, one row per node in visitation
/// order, followed by a one-line summary.
pub fn render_table(analysis: &Analysis) -> String {
    let marker = match analysis.direction {
        Direction::Downstream => "TERMINAL",
        Direction::Upstream => "BASE",
    };
    let header = ["LEVEL", "NODE", "LABEL", ""];
    let rows: Vec<[String; 4]> = analysis
        .subgraph
        .nodes
        .iter()
        .map(|n| {
            [
                n.level.to_string(),
                n.id.clone(),
                if n.label == n.id { String::new() } else { n.label.clone() },
                if n.is_extremal { marker.to_string() } else { String::new() },
            ]
        })
        .collect();

    let mut widths = header.map(display_width);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(display_width(cell));
        }
    }

    let format_row = |cells: [&str; 4]| -> String {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, w)| pad(cell, w))
            .collect();
        line.join("  ").trim_end().to_string()
    };

    let mut out = vec![format_row(header)];
    for row in &rows {
        out.push(format_row([&row[0], &row[1], &row[2], &row[3]]));
    }

    let caption = match analysis.direction {
        Direction::Downstream => "Forward subgraph analysis",
        Direction::Upstream => "Backward subgraph analysis",
    };
    out.push(String::new());
    out.push(format!(
        "{caption} of {}: {} nodes, {} edges, {} levels",
        analysis.start,
        analysis.subgraph.nodes.len(),
        analysis.subgraph.edges.len(),
        analysis.subgraph.max_level + 1
    ));
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnalysisConfig, Request, analyze};
    use pretty_assertions::assert_eq;

    #[test]
    fn display_width_counts_wide_chars() {
        assert_eq!(display_width("abc"), 3);
        assert_eq!(display_width("模型"), 4);
    }

    #[test]
    fn pad_uses_display_width() {
        assert_eq!(pad("模型", 6), "模型  ");
        assert_eq!(pad("toolong", 3), "toolong");
    }

    #[test]
    fn table_aligns_wide_labels() {
        let text = "a [label=\"模型\"]\na -> bb\n";
        let request = Request::new("a", Direction::Downstream);
        let analysis = analyze(text, &request, &AnalysisConfig::default()).unwrap();
        let expected = "\
LEVEL  NODE  LABEL
0      a     模型
1      bb           TERMINAL

Forward subgraph analysis of a: 2 nodes, 1 edges, 2 levels";
        assert_eq!(render_table(&analysis), expected);
    }
}
