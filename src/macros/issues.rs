// src/macros/issues.rs
//! Issue tracker macros.

use crate::model::{MacroNode, MarkupNode, MarkupTree, ReplacementBlock, TableCell, TableNode};
use crate::report::ResourceStatus;

/// The tracker table as a rectangular table, column order kept.
pub fn transform_table(tree: &MarkupTree, node: &MacroNode) -> (ReplacementBlock, ResourceStatus) {
    let table = node.body.iter().find_map(|id| match tree.node(*id) {
        Some(MarkupNode::Table(table)) => Some(table),
        _ => None,
    });

    match table {
        Some(table) if !table.rows.is_empty() => {
            (ReplacementBlock::Table(rectangular(table)), ResourceStatus::Ok)
        }
        _ => (
            ReplacementBlock::Placeholder {
                label: "Issue table without rows".to_string(),
                fallback: None,
            },
            ResourceStatus::degraded("empty issue table"),
        ),
    }
}

/// Pads short rows with empty cells. Padding in an all-header row is a
/// header cell too.
fn rectangular(table: &TableNode) -> TableNode {
    let width = table.column_count();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let header_row = !row.is_empty() && row.iter().all(|cell| cell.header);
            let mut row = row.clone();
            row.resize_with(width, || TableCell {
                header: header_row,
                children: Vec::new(),
            });
            row
        })
        .collect();
    TableNode { rows }
}

/// The tracker's error message as one quoted line.
pub fn transform_error(node: &MacroNode) -> (ReplacementBlock, ResourceStatus) {
    let message = node
        .plain_body
        .as_deref()
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .unwrap_or("Issue tracker error");
    (
        ReplacementBlock::QuotedLine(message.to_string()),
        ResourceStatus::Ok,
    )
}
