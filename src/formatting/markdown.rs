// src/formatting/markdown.rs
//! Deterministic Markdown serializer for a rendered [`MarkupTree`].
//!
//! The walker separates nodes into block and inline nodes. Consecutive
//! inline nodes form a paragraph; block nodes render as their own chunk.
//! Chunks are joined with a blank line.

use super::state::FormatState;
use super::text::{
    code_fence, code_span, collapse_whitespace, prefix_lines, push_inline, table_cell,
    wrap_marker,
};
use crate::constants::{CHARS_PER_NODE_ESTIMATE, INDENT_SPACES};
use crate::links::Breadcrumb;
use crate::model::{
    AttachmentLocator, AttachmentRefNode, AttachmentResolution, BlockKind, CalloutStyle,
    DisplayHint, LinkTarget, MarkupNode, MarkupTree, NodeId, ReplacementBlock, TableNode,
};

const MISSING_MARKER: &str = "[missing attachment]";
const UNAVAILABLE_MARKER: &str = "[attachment unavailable]";

/// Serializes breadcrumbs, title and body into the final Markdown text.
pub fn render_document(tree: &MarkupTree, title: &str, breadcrumbs: &[Breadcrumb]) -> String {
    let mut chunks = Vec::new();
    if !breadcrumbs.is_empty() {
        let trail: Vec<String> = breadcrumbs
            .iter()
            .map(|crumb| format!("[{}]({})", crumb.title.trim(), crumb.href))
            .collect();
        chunks.push(trail.join(" > "));
    }

    let title = collapse_whitespace(title.trim());
    chunks.push(format!(
        "# {}",
        if title.is_empty() { "Untitled" } else { &title }
    ));

    let renderer = MarkdownRenderer::new(tree);
    chunks.extend(renderer.render_body());

    let mut out = String::with_capacity(tree.len() * CHARS_PER_NODE_ESTIMATE);
    out.push_str(chunks.join("\n\n").trim_end());
    out.push('\n');
    out
}

struct MarkdownRenderer<'a> {
    tree: &'a MarkupTree,
}

impl<'a> MarkdownRenderer<'a> {
    fn new(tree: &'a MarkupTree) -> Self {
        Self { tree }
    }

    fn render_body(&self) -> Vec<String> {
        self.flow(self.tree.root_children(), FormatState::new())
    }

    // --- Classification ---

    fn is_inline(&self, id: NodeId) -> bool {
        match self.tree.node(id) {
            Some(MarkupNode::Text(_))
            | Some(MarkupNode::Link(_))
            | Some(MarkupNode::AttachmentRef(_))
            | Some(MarkupNode::ExternalImage { .. }) => true,
            Some(MarkupNode::Block {
                kind: BlockKind::Transparent,
                children,
            }) => children.iter().all(|child| self.is_inline(*child)),
            Some(MarkupNode::Block { kind, .. }) => kind.is_inline(),
            Some(MarkupNode::Rendered(block)) => match block {
                ReplacementBlock::InlineText(_) | ReplacementBlock::Image { .. } => true,
                ReplacementBlock::Container { inline, .. } => *inline,
                _ => false,
            },
            Some(MarkupNode::Macro(node)) => node.inline,
            Some(MarkupNode::Table(_)) | None => false,
        }
    }

    // --- Block level ---

    /// Renders a child list, grouping inline runs into paragraphs.
    fn flow(&self, children: &[NodeId], state: FormatState) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut run = String::new();
        for &child in children {
            if self.is_inline(child) {
                push_inline(&mut run, &self.inline(child, state));
                continue;
            }
            flush_paragraph(&mut run, &mut chunks);
            chunks.extend(self.block(child, state));
        }
        flush_paragraph(&mut run, &mut chunks);
        chunks
    }

    fn block(&self, id: NodeId, state: FormatState) -> Vec<String> {
        let Some(node) = self.tree.node(id) else {
            return Vec::new();
        };
        match node {
            MarkupNode::Block { kind, children } => self.block_element(kind, children, state),
            MarkupNode::Table(table) => self.table(table, state).into_iter().collect(),
            MarkupNode::Rendered(block) => self.replacement(block, state),
            MarkupNode::Macro(node) => {
                log::debug!("Macro #{} ({}) reached the serializer untransformed", node.ordinal, node.name);
                Vec::new()
            }
            // Inline nodes are handled by `flow`
            _ => self.flow(&[id], state),
        }
    }

    fn block_element(&self, kind: &BlockKind, children: &[NodeId], state: FormatState) -> Vec<String> {
        match kind {
            BlockKind::Heading(level) => {
                let text = self.inline_run(children, state);
                if text.is_empty() {
                    return Vec::new();
                }
                let hashes = "#".repeat(state.heading_level(*level) as usize);
                vec![format!("{} {}", hashes, text.replace("\\\n", " "))]
            }
            BlockKind::List { ordered } => self.list(*ordered, children, state).into_iter().collect(),
            BlockKind::BlockQuote => {
                let inner = self.flow(children, state).join("\n\n");
                if inner.trim().is_empty() {
                    return Vec::new();
                }
                vec![prefix_lines(&inner, "> ", ">")]
            }
            BlockKind::Preformatted { language } => {
                let source = children
                    .iter()
                    .map(|child| self.tree.text_content(*child))
                    .collect::<String>();
                vec![code_fence(language.as_deref().unwrap_or_default(), &source)]
            }
            BlockKind::HorizontalRule => vec!["---".to_string()],
            BlockKind::LineBreak => Vec::new(),
            BlockKind::Root | BlockKind::Paragraph | BlockKind::ListItem | BlockKind::Transparent => {
                self.flow(children, state)
            }
            // Inline kinds never reach here through `flow`
            _ => self.flow(children, state),
        }
    }

    fn list(&self, ordered: bool, children: &[NodeId], state: FormatState) -> Option<String> {
        let indent = " ".repeat(INDENT_SPACES);
        let mut items = Vec::new();

        for (index, &child) in children.iter().enumerate() {
            let blocks = match self.tree.node(child) {
                Some(MarkupNode::Block {
                    kind: BlockKind::ListItem,
                    children,
                }) => self.flow(children, state),
                Some(MarkupNode::Text(text)) if text.trim().is_empty() => continue,
                _ => self.flow(&[child], state),
            };
            let marker = if ordered {
                format!("{}.", index + 1)
            } else {
                "-".to_string()
            };
            let body = blocks.join("\n");
            let mut lines = body.lines();
            let item = match lines.next() {
                Some(first) => {
                    let rest: Vec<String> = lines
                        .map(|line| {
                            if line.is_empty() {
                                String::new()
                            } else {
                                format!("{}{}", indent, line)
                            }
                        })
                        .collect();
                    let mut item = format!("{} {}", marker, first);
                    for line in rest {
                        item.push('\n');
                        item.push_str(&line);
                    }
                    item
                }
                None => marker,
            };
            items.push(item);
        }

        (!items.is_empty()).then(|| items.join("\n"))
    }

    fn table(&self, table: &TableNode, state: FormatState) -> Option<String> {
        let columns = table.column_count();
        if columns == 0 {
            return None;
        }
        let cell_state = state.enter_table();
        let mut rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .filter(|row| !row.is_empty())
            .map(|row| {
                let mut cells: Vec<String> = row
                    .iter()
                    .map(|cell| {
                        let content = self.flow(&cell.children, cell_state).join("<br>");
                        table_cell(&content)
                    })
                    .collect();
                cells.resize(columns, String::new());
                cells
            })
            .collect();

        let first_is_header = table
            .rows
            .iter()
            .find(|row| !row.is_empty())
            .map(|row| row.iter().all(|cell| cell.header))
            .unwrap_or(false);
        let header = if first_is_header && !rows.is_empty() {
            rows.remove(0)
        } else {
            vec![String::new(); columns]
        };

        let mut lines = vec![table_row(&header), table_row(&vec!["---".to_string(); columns])];
        lines.extend(rows.iter().map(|row| table_row(row)));
        Some(lines.join("\n"))
    }

    fn replacement(&self, block: &ReplacementBlock, state: FormatState) -> Vec<String> {
        match block {
            ReplacementBlock::CodeBlock { language, source } => vec![code_fence(language, source)],
            ReplacementBlock::Table(table) => self.table(table, state).into_iter().collect(),
            ReplacementBlock::QuotedLine(text) => {
                let text = collapse_whitespace(text.trim());
                vec![format!("> {}", wrap_marker(&text, "_", "_"))]
            }
            ReplacementBlock::Placeholder { label, fallback } => {
                let mut chunks = vec![format!("> **{}**", collapse_whitespace(label.trim()))];
                if let Some(fallback) = fallback.as_deref().filter(|f| !f.trim().is_empty()) {
                    chunks.push(code_fence("", fallback));
                }
                chunks
            }
            ReplacementBlock::Container {
                style,
                title,
                children,
                ..
            } => self.container(*style, title.as_deref(), children, state),
            ReplacementBlock::InlineText(text) => {
                let text = collapse_whitespace(text.trim());
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![text]
                }
            }
            ReplacementBlock::Marker(text) => vec![wrap_marker(text.trim(), "_", "_")],
            ReplacementBlock::Image { src, alt } => vec![format!("![{}]({})", alt.trim(), src)],
        }
    }

    fn container(
        &self,
        style: CalloutStyle,
        title: Option<&str>,
        children: &[NodeId],
        state: FormatState,
    ) -> Vec<String> {
        let body = self.flow(children, state.enter_container());
        let label = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .or_else(|| style.default_label());

        match style {
            CalloutStyle::Plain => body,
            CalloutStyle::Expand => {
                let mut chunks = Vec::with_capacity(body.len() + 1);
                if let Some(label) = label {
                    chunks.push(format!("**{}**", collapse_whitespace(label)));
                }
                chunks.extend(body);
                chunks
            }
            CalloutStyle::Info
            | CalloutStyle::Note
            | CalloutStyle::Tip
            | CalloutStyle::Warning
            | CalloutStyle::Panel => {
                let mut chunks = Vec::with_capacity(body.len() + 1);
                if let Some(label) = label {
                    chunks.push(format!("**{}**", collapse_whitespace(label)));
                }
                chunks.extend(body);
                if chunks.is_empty() {
                    return Vec::new();
                }
                vec![prefix_lines(&chunks.join("\n\n"), "> ", ">")]
            }
        }
    }

    // --- Inline level ---

    /// Inline text of a child list, trimmed.
    fn inline_run(&self, children: &[NodeId], state: FormatState) -> String {
        let mut run = String::new();
        for &child in children {
            if self.is_inline(child) {
                push_inline(&mut run, &self.inline(child, state));
            } else {
                // Block content inside an inline context is flattened
                let flattened = self.block(child, state).join(" ");
                push_inline(&mut run, &collapse_whitespace(&flattened));
            }
        }
        run.trim().to_string()
    }

    fn inline_children(&self, children: &[NodeId], state: FormatState) -> String {
        let mut run = String::new();
        for &child in children {
            let piece = if self.is_inline(child) {
                self.inline(child, state)
            } else {
                collapse_whitespace(&self.block(child, state).join(" "))
            };
            if run.ends_with(' ') {
                run.push_str(piece.trim_start_matches(' '));
            } else {
                run.push_str(&piece);
            }
        }
        run
    }

    fn inline(&self, id: NodeId, state: FormatState) -> String {
        let Some(node) = self.tree.node(id) else {
            return String::new();
        };
        match node {
            MarkupNode::Text(text) => collapse_whitespace(text),
            MarkupNode::Block { kind, children } => self.inline_element(kind, children, id, state),
            MarkupNode::Link(link) => {
                let text = self.inline_children(&link.children, state);
                let text = text.trim();
                match link_href(&link.target) {
                    Some(href) if text.is_empty() => format!("[{}]({})", href, href),
                    Some(href) => format!("[{}]({})", text, href),
                    None => text.to_string(),
                }
            }
            MarkupNode::AttachmentRef(reference) => attachment(reference),
            MarkupNode::ExternalImage { src, alt } => format!("![{}]({})", alt.trim(), src),
            MarkupNode::Rendered(ReplacementBlock::InlineText(text)) => collapse_whitespace(text),
            MarkupNode::Rendered(ReplacementBlock::Image { src, alt }) => {
                format!("![{}]({})", alt.trim(), src)
            }
            MarkupNode::Rendered(ReplacementBlock::Container { children, .. }) => {
                self.inline_children(children, state)
            }
            MarkupNode::Rendered(block) => collapse_whitespace(&self.replacement(block, state).join(" ")),
            MarkupNode::Macro(_) | MarkupNode::Table(_) => String::new(),
        }
    }

    fn inline_element(
        &self,
        kind: &BlockKind,
        children: &[NodeId],
        id: NodeId,
        state: FormatState,
    ) -> String {
        match kind {
            BlockKind::LineBreak if state.in_table() => "<br>".to_string(),
            BlockKind::LineBreak => "\\\n".to_string(),
            BlockKind::InlineCode => code_span(&self.tree.text_content(id)),
            BlockKind::Strong => wrap_marker(&self.inline_children(children, state), "**", "**"),
            BlockKind::Emphasis => wrap_marker(&self.inline_children(children, state), "_", "_"),
            BlockKind::Strikethrough => {
                wrap_marker(&self.inline_children(children, state), "~~", "~~")
            }
            BlockKind::Underline => wrap_marker(&self.inline_children(children, state), "<u>", "</u>"),
            BlockKind::Superscript => {
                wrap_marker(&self.inline_children(children, state), "<sup>", "</sup>")
            }
            BlockKind::Subscript => {
                wrap_marker(&self.inline_children(children, state), "<sub>", "</sub>")
            }
            _ => self.inline_children(children, state),
        }
    }
}

fn flush_paragraph(run: &mut String, chunks: &mut Vec<String>) {
    let paragraph = run.trim();
    let paragraph = paragraph.trim_end_matches("\\\n").trim();
    if !paragraph.is_empty() {
        chunks.push(paragraph.to_string());
    }
    run.clear();
}

fn table_row(cells: &[String]) -> String {
    format!("| {} |", cells.join(" | "))
}

fn link_href(target: &LinkTarget) -> Option<String> {
    match target {
        LinkTarget::Resolved(href) | LinkTarget::External(href) => {
            (!href.trim().is_empty()).then(|| href.trim().to_string())
        }
        LinkTarget::Anchor(anchor) => Some(format!("#{}", anchor)),
        // Unresolved page targets keep their text only
        LinkTarget::Page { .. } | LinkTarget::PageTitle { .. } => None,
    }
}

fn attachment(reference: &AttachmentRefNode) -> String {
    let text = collapse_whitespace(reference.text.trim());
    let text = if text.is_empty() {
        match &reference.locator {
            AttachmentLocator::Filename(name) => name.clone(),
            AttachmentLocator::Id(id) => id.to_string(),
        }
    } else {
        text
    };
    match &reference.resolution {
        AttachmentResolution::Exported(path) => match reference.hint {
            DisplayHint::Image => format!("![{}]({})", text, path),
            DisplayHint::File => format!("[{}]({})", text, path),
        },
        AttachmentResolution::Unavailable => format!("{} {}", text, UNAVAILABLE_MARKER),
        AttachmentResolution::Missing => format!("{} {}", text, MISSING_MARKER),
        AttachmentResolution::Pending => text,
    }
}
