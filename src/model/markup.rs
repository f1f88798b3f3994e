// src/model/markup.rs
//! Arena representation of normalized page markup.
//!
//! Nodes live in a single `Vec` and refer to each other through [`NodeId`].
//! The tree is built once by the normalizer; later stages only overwrite
//! nodes in place (a macro slot becomes [`MarkupNode::Rendered`], a link
//! target becomes [`LinkTarget::Resolved`]).

use crate::types::{AttachmentId, PageId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node in its [`MarkupTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkupNode {
    Text(String),
    Block {
        kind: BlockKind,
        children: Vec<NodeId>,
    },
    Table(TableNode),
    Macro(MacroNode),
    Link(LinkNode),
    AttachmentRef(AttachmentRefNode),
    /// An image hosted outside the wiki.
    ExternalImage { src: String, alt: String },
    /// What a macro slot holds after transformation.
    Rendered(ReplacementBlock),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    Root,
    Paragraph,
    Heading(u8),
    List { ordered: bool },
    ListItem,
    BlockQuote,
    Preformatted { language: Option<String> },
    HorizontalRule,
    LineBreak,
    Strong,
    Emphasis,
    Strikethrough,
    Underline,
    InlineCode,
    Superscript,
    Subscript,
    /// Unrecognized element; children are rendered in place.
    Transparent,
}

impl BlockKind {
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Self::Strong
                | Self::Emphasis
                | Self::Strikethrough
                | Self::Underline
                | Self::InlineCode
                | Self::Superscript
                | Self::Subscript
                | Self::LineBreak
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableNode {
    pub rows: Vec<Vec<TableCell>>,
}

impl TableNode {
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub header: bool,
    pub children: Vec<NodeId>,
}

/// Rendering engine of a diagram-as-code macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramEngine {
    PlantUml,
    Mermaid,
}

impl DiagramEngine {
    /// Code fence tag for the engine.
    pub fn fence_tag(&self) -> &'static str {
        match self {
            Self::PlantUml => "plantuml",
            Self::Mermaid => "mermaid",
        }
    }
}

/// Closed set of macro kinds; every macro node carries exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacroKind {
    DiagramAsCode(DiagramEngine),
    Drawing,
    IssueTable,
    IssueErrorTable,
    Generic,
    Unknown,
}

/// Layout and content macros rendered by the generic transformer.
pub const GENERIC_MACRO_NAMES: &[&str] = &[
    "info", "note", "tip", "warning", "panel", "expand", "code", "noformat", "toc", "status",
    "anchor", "excerpt", "section", "column", "details",
];

impl MacroKind {
    /// Classifies a macro by name alone.
    ///
    /// Issue tracker macros need a look at their body and are classified by
    /// the normalizer; by name they are a generic inline reference.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "plantuml" => Self::DiagramAsCode(DiagramEngine::PlantUml),
            "mermaid" | "mermaid-cloud" | "mermaid-macro" => {
                Self::DiagramAsCode(DiagramEngine::Mermaid)
            }
            "drawio" | "inc-drawio" | "drawio-sketch" => Self::Drawing,
            "jira" => Self::Generic,
            other if GENERIC_MACRO_NAMES.contains(&other) => Self::Generic,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::DiagramAsCode(DiagramEngine::PlantUml) => "diagram-plantuml",
            Self::DiagramAsCode(DiagramEngine::Mermaid) => "diagram-mermaid",
            Self::Drawing => "drawing",
            Self::IssueTable => "issue-table",
            Self::IssueErrorTable => "issue-error-table",
            Self::Generic => "generic",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MacroKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A vendor macro instance found in the page body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroNode {
    pub kind: MacroKind,
    /// Macro name as written in the markup, lower-cased.
    pub name: String,
    /// Position among all macros of the page in document order.
    pub ordinal: usize,
    pub parameters: IndexMap<String, String>,
    /// Markup between the macro's start and end tags, verbatim.
    pub raw_inner: String,
    /// Plain-text body (diagram source, code, tracker error text).
    pub plain_body: Option<String>,
    /// Parsed rich body.
    pub body: Vec<NodeId>,
    /// Whether the macro sits inside a line of text.
    pub inline: bool,
}

impl MacroNode {
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkTarget {
    External(String),
    Page {
        id: PageId,
        anchor: Option<String>,
    },
    PageTitle {
        space: String,
        title: String,
    },
    /// In-page anchor, without the leading `#`.
    Anchor(String),
    /// Final href after link rewriting.
    Resolved(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkNode {
    pub target: LinkTarget,
    pub children: Vec<NodeId>,
}

/// How an attachment reference names its file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentLocator {
    Id(AttachmentId),
    Filename(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayHint {
    Image,
    File,
}

/// Outcome of resolving an attachment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentResolution {
    Pending,
    /// Bundle-relative path of the exported file.
    Exported(String),
    /// Referenced but the download failed.
    Unavailable,
    /// Not present in the manifest.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRefNode {
    pub locator: AttachmentLocator,
    pub hint: DisplayHint,
    /// Alt text for images, link text for files.
    pub text: String,
    pub resolution: AttachmentResolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalloutStyle {
    Info,
    Note,
    Tip,
    Warning,
    Panel,
    Expand,
    /// Body rendered in place with no decoration.
    Plain,
}

impl CalloutStyle {
    pub fn default_label(&self) -> Option<&'static str> {
        match self {
            Self::Info => Some("Info"),
            Self::Note => Some("Note"),
            Self::Tip => Some("Tip"),
            Self::Warning => Some("Warning"),
            Self::Panel | Self::Expand | Self::Plain => None,
        }
    }
}

/// Output of a macro transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplacementBlock {
    CodeBlock {
        language: String,
        source: String,
    },
    Table(TableNode),
    /// A single quoted, italic line.
    QuotedLine(String),
    /// Visible stand-in for content that could not be rendered.
    Placeholder {
        label: String,
        fallback: Option<String>,
    },
    Container {
        style: CalloutStyle,
        title: Option<String>,
        children: Vec<NodeId>,
        inline: bool,
    },
    /// Literal inline text, e.g. a status lozenge.
    InlineText(String),
    /// An italic marker paragraph.
    Marker(String),
    /// An exported image, by bundle-relative path.
    Image { src: String, alt: String },
}

/// Normalized page body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupTree {
    nodes: Vec<MarkupNode>,
    root: NodeId,
    warnings: Vec<String>,
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![MarkupNode::Block {
                kind: BlockKind::Root,
                children: Vec::new(),
            }],
            root: NodeId(0),
            warnings: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root_children().is_empty()
    }

    pub fn root_children(&self) -> &[NodeId] {
        self.children(self.root)
    }

    pub fn node(&self, id: NodeId) -> Option<&MarkupNode> {
        self.nodes.get(id.0)
    }

    /// Adds a detached node and returns its id.
    pub fn push(&mut self, node: MarkupNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Overwrites a node in place. Ids outside the arena are ignored.
    pub fn replace(&mut self, id: NodeId, node: MarkupNode) {
        if let Some(slot) = self.nodes.get_mut(id.0) {
            *slot = node;
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut MarkupNode> {
        self.nodes.get_mut(id.0)
    }

    /// Appends `child` to a node that holds a child list.
    ///
    /// Returns `false` when the parent cannot hold children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        match self.nodes.get_mut(parent.0) {
            Some(MarkupNode::Block { children, .. })
            | Some(MarkupNode::Link(LinkNode { children, .. }))
            | Some(MarkupNode::Macro(MacroNode { body: children, .. })) => {
                children.push(child);
                true
            }
            _ => false,
        }
    }

    /// Direct children of block, link, and macro nodes.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.nodes.get(id.0) {
            Some(MarkupNode::Block { children, .. })
            | Some(MarkupNode::Link(LinkNode { children, .. }))
            | Some(MarkupNode::Macro(MacroNode { body: children, .. }))
            | Some(MarkupNode::Rendered(ReplacementBlock::Container { children, .. })) => children,
            _ => &[],
        }
    }

    /// Every node reachable from `id`, including table cells, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let next: Vec<NodeId> = match self.nodes.get(current.0) {
                Some(MarkupNode::Table(table))
                | Some(MarkupNode::Rendered(ReplacementBlock::Table(table))) => table
                    .rows
                    .iter()
                    .flat_map(|row| row.iter().flat_map(|cell| cell.children.iter().copied()))
                    .collect(),
                _ => self.children(current).to_vec(),
            };
            stack.extend(next.into_iter().rev());
        }
        out
    }

    /// Like [`descendants`](Self::descendants), but skips the bodies of
    /// macros whose body is not rendered (diagrams, drawings, unknown macros).
    pub fn rendered_descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let next: Vec<NodeId> = match self.nodes.get(current.0) {
                Some(MarkupNode::Macro(node))
                    if !matches!(node.kind, MacroKind::Generic | MacroKind::IssueTable) =>
                {
                    Vec::new()
                }
                Some(MarkupNode::Table(table))
                | Some(MarkupNode::Rendered(ReplacementBlock::Table(table))) => table
                    .rows
                    .iter()
                    .flat_map(|row| row.iter().flat_map(|cell| cell.children.iter().copied()))
                    .collect(),
                _ => self.children(current).to_vec(),
            };
            stack.extend(next.into_iter().rev());
        }
        out
    }

    /// Macro nodes that end up in the output, in document order.
    pub fn macros(&self) -> Vec<(NodeId, &MacroNode)> {
        self.rendered_descendants(self.root)
            .into_iter()
            .filter_map(|id| match self.nodes.get(id.0) {
                Some(MarkupNode::Macro(node)) => Some((id, node)),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of a subtree, without any whitespace handling.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for node_id in self.descendants(id) {
            match self.nodes.get(node_id.0) {
                Some(MarkupNode::Text(value)) => text.push_str(value),
                Some(MarkupNode::Block {
                    kind: BlockKind::LineBreak,
                    ..
                }) => text.push('\n'),
                Some(MarkupNode::AttachmentRef(reference)) => text.push_str(&reference.text),
                _ => {}
            }
        }
        text
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(tree: &mut MarkupTree, text: &str) -> NodeId {
        let text = tree.push(MarkupNode::Text(text.to_string()));
        let para = tree.push(MarkupNode::Block {
            kind: BlockKind::Paragraph,
            children: vec![text],
        });
        tree.append_child(tree.root(), para);
        para
    }

    #[test]
    fn test_macro_kind_by_name() {
        assert_eq!(
            MacroKind::from_name("PlantUML"),
            MacroKind::DiagramAsCode(DiagramEngine::PlantUml)
        );
        assert_eq!(
            MacroKind::from_name("mermaid-cloud"),
            MacroKind::DiagramAsCode(DiagramEngine::Mermaid)
        );
        assert_eq!(MacroKind::from_name("inc-drawio"), MacroKind::Drawing);
        assert_eq!(MacroKind::from_name("info"), MacroKind::Generic);
        assert_eq!(MacroKind::from_name("roadmap-planner"), MacroKind::Unknown);
    }

    #[test]
    fn test_descendants_follow_document_order() {
        let mut tree = MarkupTree::new();
        let first = paragraph(&mut tree, "one");
        let second = paragraph(&mut tree, "two");
        let order = tree.descendants(tree.root());
        let first_pos = order.iter().position(|id| *id == first).unwrap();
        let second_pos = order.iter().position(|id| *id == second).unwrap();
        assert!(first_pos < second_pos);
        assert_eq!(tree.text_content(tree.root()), "onetwo");
    }

    #[test]
    fn test_unrendered_macro_bodies_are_skipped() {
        let mut tree = MarkupTree::new();
        let inner = tree.push(MarkupNode::Macro(MacroNode {
            kind: MacroKind::Generic,
            name: "status".to_string(),
            ordinal: 1,
            parameters: IndexMap::new(),
            raw_inner: String::new(),
            plain_body: None,
            body: Vec::new(),
            inline: true,
        }));
        let outer = tree.push(MarkupNode::Macro(MacroNode {
            kind: MacroKind::Unknown,
            name: "roadmap".to_string(),
            ordinal: 0,
            parameters: IndexMap::new(),
            raw_inner: String::new(),
            plain_body: None,
            body: vec![inner],
            inline: false,
        }));
        tree.append_child(tree.root(), outer);

        let names: Vec<_> = tree.macros().iter().map(|(_, m)| m.name.clone()).collect();
        assert_eq!(names, vec!["roadmap".to_string()]);
        assert!(tree.descendants(tree.root()).contains(&inner));
    }

    #[test]
    fn test_replace_overwrites_slot() {
        let mut tree = MarkupTree::new();
        let para = paragraph(&mut tree, "before");
        tree.replace(
            para,
            MarkupNode::Rendered(ReplacementBlock::Marker("after".to_string())),
        );
        assert!(matches!(
            tree.node(para),
            Some(MarkupNode::Rendered(ReplacementBlock::Marker(_)))
        ));
    }
}
