// src/macros/generic.rs
//! Layout and content macros with a fixed Markdown rendering.

use crate::model::{CalloutStyle, MacroNode, MarkupTree, ReplacementBlock};
use crate::report::ResourceStatus;

const EXPAND_DEFAULT_TITLE: &str = "Click here to expand...";

pub fn transform(tree: &MarkupTree, node: &MacroNode) -> (ReplacementBlock, ResourceStatus) {
    let block = match node.name.as_str() {
        "info" => callout(node, CalloutStyle::Info),
        "note" => callout(node, CalloutStyle::Note),
        "tip" => callout(node, CalloutStyle::Tip),
        "warning" => callout(node, CalloutStyle::Warning),
        "panel" => callout(node, CalloutStyle::Panel),
        "expand" => ReplacementBlock::Container {
            style: CalloutStyle::Expand,
            title: Some(
                node.parameter("title")
                    .unwrap_or(EXPAND_DEFAULT_TITLE)
                    .to_string(),
            ),
            children: node.body.clone(),
            inline: false,
        },
        "code" | "noformat" => ReplacementBlock::CodeBlock {
            language: node.parameter("language").unwrap_or_default().to_string(),
            source: node
                .plain_body
                .clone()
                .unwrap_or_else(|| body_text(tree, node)),
        },
        "status" => {
            let title = node
                .parameter("title")
                .map(str::to_string)
                .unwrap_or_else(|| body_text(tree, node));
            let title = title.trim();
            let title = if title.is_empty() { "STATUS" } else { title };
            ReplacementBlock::InlineText(format!("[{}]", title.to_uppercase()))
        }
        "toc" => ReplacementBlock::Marker("Table of contents".to_string()),
        "anchor" => ReplacementBlock::InlineText(String::new()),
        _ => ReplacementBlock::Container {
            style: CalloutStyle::Plain,
            title: None,
            children: node.body.clone(),
            inline: node.inline,
        },
    };
    (block, ResourceStatus::Ok)
}

fn callout(node: &MacroNode, style: CalloutStyle) -> ReplacementBlock {
    ReplacementBlock::Container {
        style,
        title: node.parameter("title").map(str::to_string),
        children: node.body.clone(),
        inline: false,
    }
}

fn body_text(tree: &MarkupTree, node: &MacroNode) -> String {
    node.body
        .iter()
        .map(|id| tree.text_content(*id))
        .collect::<String>()
}
