// src/markup/normalizer.rs
//! Turns parsed page markup into the arena [`MarkupTree`].
//!
//! The view rendering is the primary input. Two other renderings fill in
//! what the view lacks: issue tracker tables come from the export view and
//! PlantUML source comes from the editor variant, both matched by the
//! ordinal of the macro among macros of the same family.

use super::parser::{parse_markup, Content, Element};
use crate::error::AppError;
use crate::model::{
    AttachmentLocator, AttachmentRefNode, AttachmentResolution, BlockKind, DiagramEngine,
    DisplayHint, LinkNode, LinkTarget, MacroKind, MacroNode, MarkupNode, MarkupTree, NodeId,
    Page, TableCell, TableNode,
};
use crate::types::{AttachmentId, PageId, PageReference};
use base64::Engine;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

static DIAGRAM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\|diagramName=(.+?)\|").expect("diagram name regex is valid"));

static BRUSH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"brush:\s*([A-Za-z0-9_+#-]+)").expect("brush regex is valid"));

/// Stand-in origin used to resolve server-relative links.
const RELATIVE_ORIGIN: &str = "http://wiki.invalid";

const ISSUE_TABLE_CLASS: &str = "jira-table";
const ISSUE_ERROR_CLASS: &str = "jim-error-message-table";

/// Normalizes all markup variants of a page into one tree.
pub fn normalize_page(page: &Page) -> Result<MarkupTree, AppError> {
    let primary = parse_markup(page.primary_markup())?;

    let export_view = if page.body_export.trim().is_empty() {
        None
    } else {
        match parse_markup(&page.body_export) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("Ignoring export view of page {}: {}", page.id, e);
                None
            }
        }
    };

    let mut issue_fragments = Vec::new();
    if let Some(parsed) = &export_view {
        parsed.root.find_all(&is_issue_fragment, &mut issue_fragments);
    }

    let diagram_sources = if page.editor_first_version.trim().is_empty() {
        Vec::new()
    } else {
        match parse_markup(&page.editor_first_version) {
            Ok(parsed) => collect_editor_diagram_sources(&parsed.root),
            Err(e) => {
                log::warn!("Ignoring editor variant of page {}: {}", page.id, e);
                Vec::new()
            }
        }
    };

    let mut builder = TreeBuilder::new(issue_fragments, diagram_sources);
    for warning in &primary.warnings {
        builder.tree.add_warning(warning.clone());
    }
    let root = builder.tree.root();
    builder.convert_children(&primary.root, root);

    log::debug!(
        "Normalized page {}: {} nodes, {} macros, {} warnings",
        page.id,
        builder.tree.len(),
        builder.macro_ordinal,
        builder.tree.warnings().len()
    );
    Ok(builder.tree)
}

/// Normalizes a single markup string with no companion variants.
pub fn normalize_markup(source: &str) -> Result<MarkupTree, AppError> {
    let parsed = parse_markup(source)?;
    let mut builder = TreeBuilder::new(Vec::new(), Vec::new());
    for warning in &parsed.warnings {
        builder.tree.add_warning(warning.clone());
    }
    let root = builder.tree.root();
    builder.convert_children(&parsed.root, root);
    Ok(builder.tree)
}

fn is_issue_fragment(element: &Element) -> bool {
    element.has_class(ISSUE_TABLE_CLASS) || element.has_class(ISSUE_ERROR_CLASS)
}

/// PlantUML sources of the editor variant in document order.
///
/// The editor renders macros as `table[data-macro-name=plantuml]` with the
/// source in a `pre`; storage-format macros keep it in `ac:plain-text-body`.
fn collect_editor_diagram_sources(root: &Element) -> Vec<String> {
    let mut macros = Vec::new();
    root.find_all(
        &|e: &Element| {
            (e.name == "table" && e.attr("data-macro-name") == Some("plantuml"))
                || (e.name == "ac:structured-macro" && e.attr("ac:name") == Some("plantuml"))
        },
        &mut macros,
    );
    macros
        .into_iter()
        .map(|element| {
            element
                .find(&|e: &Element| e.name == "pre" || e.name == "ac:plain-text-body")
                .map(|body| body.text().trim().to_string())
                .unwrap_or_default()
        })
        .collect()
}

fn macro_name(element: &Element) -> Option<String> {
    if let Some(name) = element.attr("data-macro-name") {
        return Some(name.trim().to_ascii_lowercase());
    }
    if element.name == "ac:structured-macro" || element.name == "ac:macro" {
        return element
            .attr("ac:name")
            .map(|name| name.trim().to_ascii_lowercase());
    }
    if is_issue_fragment(element) {
        return Some("jira".to_string());
    }
    None
}

struct TreeBuilder<'a> {
    tree: MarkupTree,
    macro_ordinal: usize,
    issue_fragments: Vec<&'a Element>,
    issue_index: usize,
    diagram_sources: Vec<String>,
    diagram_index: usize,
    /// Depth of enclosing paragraphs and headings.
    inline_depth: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(issue_fragments: Vec<&'a Element>, diagram_sources: Vec<String>) -> Self {
        Self {
            tree: MarkupTree::new(),
            macro_ordinal: 0,
            issue_fragments,
            issue_index: 0,
            diagram_sources,
            diagram_index: 0,
            inline_depth: 0,
        }
    }

    fn convert_children(&mut self, element: &Element, parent: NodeId) {
        for id in self.convert_contents(&element.children) {
            self.tree.append_child(parent, id);
        }
    }

    fn convert_contents(&mut self, contents: &[Content]) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for content in contents {
            match content {
                Content::Text(text) => ids.push(self.tree.push(MarkupNode::Text(text.clone()))),
                Content::Element(element) => {
                    if let Some(id) = self.convert_element(element) {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    fn block(&mut self, kind: BlockKind, element: &Element) -> NodeId {
        let inline_scope = matches!(kind, BlockKind::Paragraph | BlockKind::Heading(_));
        if inline_scope {
            self.inline_depth += 1;
        }
        let children = self.convert_contents(&element.children);
        if inline_scope {
            self.inline_depth -= 1;
        }
        self.tree.push(MarkupNode::Block { kind, children })
    }

    fn convert_element(&mut self, element: &Element) -> Option<NodeId> {
        if let Some(name) = macro_name(element) {
            return Some(self.convert_macro(element, name));
        }

        let name = element.name.as_str();
        let node = match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                self.block(BlockKind::Heading(level), element)
            }
            "p" => self.block(BlockKind::Paragraph, element),
            "ul" => self.block(BlockKind::List { ordered: false }, element),
            "ol" => self.block(BlockKind::List { ordered: true }, element),
            "li" => self.block(BlockKind::ListItem, element),
            "blockquote" => self.block(BlockKind::BlockQuote, element),
            "pre" => self.preformatted(element),
            "hr" => self.block(BlockKind::HorizontalRule, element),
            "br" => self.block(BlockKind::LineBreak, element),
            "strong" | "b" => self.block(BlockKind::Strong, element),
            "em" | "i" => self.block(BlockKind::Emphasis, element),
            "s" | "del" | "strike" => self.block(BlockKind::Strikethrough, element),
            "u" => self.block(BlockKind::Underline, element),
            "code" | "tt" => self.block(BlockKind::InlineCode, element),
            "sup" => self.block(BlockKind::Superscript, element),
            "sub" => self.block(BlockKind::Subscript, element),
            "table" => self.table(element),
            "a" => self.anchor(element),
            "img" => return self.image(element),
            "ac:image" => return self.storage_image(element),
            "ac:link" => return self.storage_link(element),
            "script" | "style" | "ac:parameter" | "ac:placeholder" => return None,
            _ => self.block(BlockKind::Transparent, element),
        };
        Some(node)
    }

    fn preformatted(&mut self, element: &Element) -> NodeId {
        let language = element
            .attr("data-language")
            .map(str::to_string)
            .or_else(|| brush_language(element));
        let text = self.tree.push(MarkupNode::Text(element.text()));
        self.tree.push(MarkupNode::Block {
            kind: BlockKind::Preformatted { language },
            children: vec![text],
        })
    }

    fn table(&mut self, element: &Element) -> NodeId {
        let table = self.table_node(element);
        self.tree.push(MarkupNode::Table(table))
    }

    fn table_node(&mut self, element: &Element) -> TableNode {
        let mut rows = Vec::new();
        self.collect_rows(element, &mut rows);
        TableNode { rows }
    }

    fn collect_rows(&mut self, element: &Element, rows: &mut Vec<Vec<TableCell>>) {
        for child in element.child_elements() {
            match child.name.as_str() {
                "tr" => {
                    let mut cells = Vec::new();
                    for cell in child.child_elements() {
                        if cell.name == "td" || cell.name == "th" {
                            cells.push(TableCell {
                                header: cell.name == "th",
                                children: self.convert_contents(&cell.children),
                            });
                        }
                    }
                    rows.push(cells);
                }
                "thead" | "tbody" | "tfoot" => self.collect_rows(child, rows),
                _ => {}
            }
        }
    }

    fn anchor(&mut self, element: &Element) -> NodeId {
        let resource_type = element.attr("data-linked-resource-type").unwrap_or_default();
        let href = element.attr("href").unwrap_or_default().trim().to_string();

        if resource_type == "attachment" || href.contains("/download/attachments/") {
            let locator = attachment_locator(element, &href);
            return self.tree.push(MarkupNode::AttachmentRef(AttachmentRefNode {
                locator,
                hint: DisplayHint::File,
                text: element.text().trim().to_string(),
                resolution: AttachmentResolution::Pending,
            }));
        }

        let target = if resource_type == "page" {
            element
                .attr("data-linked-resource-id")
                .and_then(|id| PageId::parse(id).ok())
                .map(|id| LinkTarget::Page {
                    id,
                    anchor: fragment_of(&href),
                })
                .unwrap_or_else(|| classify_href(&href))
        } else {
            classify_href(&href)
        };

        let children = self.convert_contents(&element.children);
        self.tree.push(MarkupNode::Link(LinkNode { target, children }))
    }

    fn image(&mut self, element: &Element) -> Option<NodeId> {
        let src = element.attr("src").unwrap_or_default().trim().to_string();
        let alt = element.attr("alt").unwrap_or_default().trim().to_string();

        if src.contains("/images/icons/") {
            // Emoticons and status icons carry their meaning in the alt text
            if alt.is_empty() {
                return None;
            }
            return Some(self.tree.push(MarkupNode::Text(alt)));
        }

        let is_attachment = element.attr("data-linked-resource-type") == Some("attachment")
            || src.contains("/download/attachments/")
            || src.contains("/download/thumbnails/");
        if is_attachment {
            let locator = attachment_locator(element, &src);
            let text = element
                .attr("data-linked-resource-default-alias")
                .map(str::to_string)
                .filter(|_| alt.is_empty())
                .unwrap_or(alt);
            return Some(self.tree.push(MarkupNode::AttachmentRef(AttachmentRefNode {
                locator,
                hint: DisplayHint::Image,
                text,
                resolution: AttachmentResolution::Pending,
            })));
        }

        if src.is_empty() {
            return None;
        }
        Some(self.tree.push(MarkupNode::ExternalImage { src, alt }))
    }

    fn storage_image(&mut self, element: &Element) -> Option<NodeId> {
        let alt = element.attr("ac:alt").unwrap_or_default().to_string();
        for child in element.child_elements() {
            match child.name.as_str() {
                "ri:attachment" => {
                    let filename = child.attr("ri:filename")?.to_string();
                    let text = if alt.is_empty() { filename.clone() } else { alt };
                    return Some(self.tree.push(MarkupNode::AttachmentRef(AttachmentRefNode {
                        locator: AttachmentLocator::Filename(filename),
                        hint: DisplayHint::Image,
                        text,
                        resolution: AttachmentResolution::Pending,
                    })));
                }
                "ri:url" => {
                    let src = child.attr("ri:value")?.to_string();
                    return Some(self.tree.push(MarkupNode::ExternalImage { src, alt }));
                }
                _ => {}
            }
        }
        None
    }

    fn storage_link(&mut self, element: &Element) -> Option<NodeId> {
        let anchor = element
            .attr("ac:anchor")
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        let body = element
            .child_elements()
            .find(|e| e.name == "ac:plain-text-link-body" || e.name == "ac:link-body");
        let resource = element.child_elements().find(|e| e.name.starts_with("ri:"));

        let (target, fallback_text) = match resource {
            Some(res) if res.name == "ri:attachment" => {
                let filename = res.attr("ri:filename")?.to_string();
                let text = body
                    .map(|b| b.text().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| filename.clone());
                return Some(self.tree.push(MarkupNode::AttachmentRef(AttachmentRefNode {
                    locator: AttachmentLocator::Filename(filename),
                    hint: DisplayHint::File,
                    text,
                    resolution: AttachmentResolution::Pending,
                })));
            }
            Some(res) if res.name == "ri:page" => {
                let title = res.attr("ri:content-title").unwrap_or_default().to_string();
                let target = match res.attr("ri:content-id").and_then(|id| PageId::parse(id).ok()) {
                    Some(id) => LinkTarget::Page { id, anchor },
                    None => LinkTarget::PageTitle {
                        space: res.attr("ri:space-key").unwrap_or_default().to_string(),
                        title: title.clone(),
                    },
                };
                (target, title)
            }
            Some(res) if res.name == "ri:url" => {
                let url = res.attr("ri:value").unwrap_or_default().to_string();
                (LinkTarget::External(url.clone()), url)
            }
            _ => match anchor {
                Some(anchor) => (LinkTarget::Anchor(anchor.clone()), anchor),
                None => return None,
            },
        };

        let mut children = match body {
            Some(b) if b.name == "ac:link-body" => self.convert_contents(&b.children),
            Some(b) => {
                let text = b.text();
                if text.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![self.tree.push(MarkupNode::Text(text))]
                }
            }
            None => Vec::new(),
        };
        if children.is_empty() && !fallback_text.is_empty() {
            children.push(self.tree.push(MarkupNode::Text(fallback_text)));
        }
        Some(self.tree.push(MarkupNode::Link(LinkNode { target, children })))
    }

    fn convert_macro(&mut self, element: &Element, name: String) -> NodeId {
        let ordinal = self.macro_ordinal;
        self.macro_ordinal += 1;

        let inline = element.name == "span" || self.inline_depth > 0;
        let mut parameters = macro_parameters(element);
        let mut kind = MacroKind::from_name(&name);
        let mut plain_body = storage_plain_body(element);
        let mut body = Vec::new();

        match kind {
            MacroKind::DiagramAsCode(engine) => {
                if plain_body.is_none() {
                    plain_body = element
                        .find(&|e: &Element| e.name == "pre")
                        .map(|pre| pre.text().trim().to_string())
                        .filter(|source| !source.is_empty());
                }
                if engine == DiagramEngine::PlantUml {
                    let editor_source = self.diagram_sources.get(self.diagram_index).cloned();
                    self.diagram_index += 1;
                    if plain_body.is_none() {
                        plain_body = editor_source.filter(|source| !source.is_empty());
                    }
                }
            }
            MacroKind::Drawing => {
                add_drawing_parameters(element, &mut parameters);
                if plain_body.is_none() {
                    plain_body = embedded_drawing(&element.raw_inner);
                }
            }
            MacroKind::Generic if name == "jira" && element.name != "span" => {
                kind = self.convert_issue_macro(element, &mut plain_body, &mut body);
            }
            MacroKind::Generic if name == "code" || name == "noformat" => {
                if plain_body.is_none() {
                    if let Some(pre) = element.find(&|e: &Element| e.name == "pre") {
                        plain_body = Some(pre.text());
                        if !parameters.contains_key("language") {
                            if let Some(language) = brush_language(pre) {
                                parameters.insert("language".to_string(), language);
                            }
                        }
                    }
                }
            }
            _ => {}
        }

        if body.is_empty() && kind != MacroKind::IssueErrorTable {
            body = match element
                .child_elements()
                .find(|e| e.name == "ac:rich-text-body")
            {
                Some(rich) => self.convert_contents(&rich.children),
                None => self.convert_contents(&element.children),
            };
        }

        self.tree.push(MarkupNode::Macro(MacroNode {
            kind,
            name,
            ordinal,
            parameters,
            raw_inner: element.raw_inner.clone(),
            plain_body,
            body,
            inline,
        }))
    }

    /// Classifies a block-level issue macro and fills its body.
    ///
    /// The view rendering of an issue table is usually a loading stub; the
    /// export view carries the rendered table at the same ordinal.
    fn convert_issue_macro(
        &mut self,
        element: &Element,
        plain_body: &mut Option<String>,
        body: &mut Vec<NodeId>,
    ) -> MacroKind {
        let index = self.issue_index;
        self.issue_index += 1;

        let own_content = is_issue_fragment(element)
            || element.find(&is_issue_fragment).is_some()
            || element.find(&|e: &Element| e.name == "table").is_some();
        let content = if own_content {
            Some(element)
        } else {
            let fragment = self.issue_fragments.get(index).copied();
            if fragment.is_none() {
                log::debug!("No export-view fragment for issue macro #{}", index);
            }
            fragment
        };

        let Some(content) = content else {
            return MacroKind::Generic;
        };

        let error_table = if content.has_class(ISSUE_ERROR_CLASS) {
            Some(content)
        } else {
            content.find(&|e: &Element| e.has_class(ISSUE_ERROR_CLASS))
        };
        if let Some(error_table) = error_table {
            *plain_body = Some(error_table.text().trim().to_string());
            return MacroKind::IssueErrorTable;
        }

        let table = if content.name == "table" {
            Some(content)
        } else {
            content.find(&|e: &Element| e.name == "table")
        };
        match table {
            Some(table) => {
                let node = self.table(table);
                body.push(node);
                MacroKind::IssueTable
            }
            None => MacroKind::Generic,
        }
    }
}

/// Parameters from `data-macro-parameters` (`k=v|k=v`) and `ac:parameter`.
fn macro_parameters(element: &Element) -> IndexMap<String, String> {
    let mut parameters = IndexMap::new();
    if let Some(raw) = element.attr("data-macro-parameters") {
        for pair in raw.split('|') {
            if let Some((key, value)) = pair.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    parameters.insert(key.to_string(), value.trim().to_string());
                }
            }
        }
    }
    for child in element.child_elements() {
        if child.name == "ac:parameter" {
            if let Some(key) = child.attr("ac:name") {
                parameters.insert(key.to_string(), child.text().trim().to_string());
            }
        }
    }
    parameters
}

fn storage_plain_body(element: &Element) -> Option<String> {
    element
        .child_elements()
        .find(|e| e.name == "ac:plain-text-body")
        .map(Element::text)
}

/// Drawing references from the hidden data element or the raw markup.
fn add_drawing_parameters(element: &Element, parameters: &mut IndexMap<String, String>) {
    let data = element.find(&|e: &Element| {
        e.attr("id")
            .map(|id| id.starts_with("drawio-macro-data-"))
            .unwrap_or(false)
    });
    if let Some(data) = data {
        match decode_drawing_data(data.text().trim()) {
            Some((att_id, diagram_name)) => {
                if let Some(att_id) = att_id {
                    parameters.entry("attId".to_string()).or_insert(att_id);
                }
                if let Some(name) = diagram_name {
                    parameters.entry("diagramName".to_string()).or_insert(name);
                }
            }
            None => log::debug!("Undecodable drawing macro data"),
        }
    }

    if !parameters.contains_key("diagramName") {
        if let Some(caps) = DIAGRAM_NAME.captures(&element.raw_inner) {
            parameters.insert("diagramName".to_string(), caps[1].to_string());
        }
    }
}

/// Decodes base64 JSON `{"attId": ..., "diagramName": ...}`.
fn decode_drawing_data(raw: &str) -> Option<(Option<String>, Option<String>)> {
    if raw.is_empty() {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(raw).ok()?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let as_text = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Some((
        value.get("attId").and_then(as_text),
        value.get("diagramName").and_then(as_text),
    ))
}

/// An `mxfile` or `mxGraphModel` document embedded in the macro markup.
fn embedded_drawing(raw: &str) -> Option<String> {
    for (open, close) in [("<mxfile", "</mxfile>"), ("<mxGraphModel", "</mxGraphModel>")] {
        if let Some(start) = raw.find(open) {
            let end = raw[start..]
                .find(close)
                .map(|offset| start + offset + close.len())?;
            return Some(raw[start..end].to_string());
        }
    }
    None
}

fn brush_language(element: &Element) -> Option<String> {
    ["data-syntaxhighlighter-params", "class"]
        .iter()
        .filter_map(|attr| element.attr(attr))
        .find_map(|value| BRUSH.captures(value).map(|caps| caps[1].to_string()))
}

fn fragment_of(href: &str) -> Option<String> {
    href.split_once('#')
        .map(|(_, fragment)| fragment.to_string())
        .filter(|fragment| !fragment.is_empty())
}

/// Classifies an `href` that is not an attachment link.
///
/// Absolute URLs stay external here; deciding whether they point at the
/// same wiki needs the base URL and happens during link rewriting.
fn classify_href(href: &str) -> LinkTarget {
    if let Some(anchor) = href.strip_prefix('#') {
        return LinkTarget::Anchor(anchor.to_string());
    }
    if href.starts_with('/') {
        if let Ok(url) = Url::parse(RELATIVE_ORIGIN).and_then(|origin| origin.join(href)) {
            match PageReference::from_url(&url) {
                Some(PageReference::Id(id)) => {
                    return LinkTarget::Page {
                        id,
                        anchor: url.fragment().map(str::to_string),
                    }
                }
                Some(PageReference::SpaceTitle { space, title }) => {
                    return LinkTarget::PageTitle { space, title }
                }
                None => {}
            }
        }
    }
    LinkTarget::External(href.to_string())
}

fn attachment_locator(element: &Element, url: &str) -> AttachmentLocator {
    if element.attr("data-linked-resource-type") == Some("attachment") {
        if let Some(id) = element
            .attr("data-linked-resource-id")
            .and_then(|id| AttachmentId::new(id).ok())
        {
            return AttachmentLocator::Id(id);
        }
    }
    AttachmentLocator::Filename(filename_from_url(url))
}

/// Last path segment of a download link, percent-decoded.
fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::page_with_body;
    use pretty_assertions::assert_eq;

    fn only_macro(tree: &MarkupTree) -> MacroNode {
        let macros = tree.macros();
        assert_eq!(macros.len(), 1, "expected exactly one macro");
        macros[0].1.clone()
    }

    #[test]
    fn test_structure_is_recognized() {
        let tree = normalize_markup("<h2>Title</h2><p>Hello <strong>world</strong></p>").unwrap();
        let root = tree.root_children();
        assert_eq!(root.len(), 2);
        assert!(matches!(
            tree.node(root[0]),
            Some(MarkupNode::Block {
                kind: BlockKind::Heading(2),
                ..
            })
        ));
        assert_eq!(tree.text_content(root[1]), "Hello world");
    }

    #[test]
    fn test_macro_kinds() {
        let tree = normalize_markup(
            r#"<div data-macro-name="plantuml"></div>
               <div data-macro-name="drawio"></div>
               <div data-macro-name="info"><p>x</p></div>
               <div data-macro-name="roadmap"><p>y</p></div>"#,
        )
        .unwrap();
        let kinds: Vec<_> = tree.macros().iter().map(|(_, m)| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MacroKind::DiagramAsCode(DiagramEngine::PlantUml),
                MacroKind::Drawing,
                MacroKind::Generic,
                MacroKind::Unknown,
            ]
        );
        let ordinals: Vec<_> = tree.macros().iter().map(|(_, m)| m.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_storage_macro_parameters_and_body() {
        let tree = normalize_markup(
            r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter><ac:plain-text-body><![CDATA[fn main() {}]]></ac:plain-text-body></ac:structured-macro>"#,
        )
        .unwrap();
        let node = only_macro(&tree);
        assert_eq!(node.name, "code");
        assert_eq!(node.parameter("language"), Some("rust"));
        assert_eq!(node.plain_body.as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn test_issue_table_comes_from_export_view() {
        let mut page = page_with_body(
            "1",
            "Issues",
            r#"<div data-macro-name="jira"><span>Loading...</span></div>"#,
        );
        page.body_export = r#"<div class="jira-table"><table><tr><th>Key</th><th>Summary</th></tr><tr><td>ABC-1</td><td>Fix</td></tr></table></div>"#.to_string();

        let tree = normalize_page(&page).unwrap();
        let node = only_macro(&tree);
        assert_eq!(node.kind, MacroKind::IssueTable);
        assert!(matches!(tree.node(node.body[0]), Some(MarkupNode::Table(t)) if t.rows.len() == 2));
    }

    #[test]
    fn test_issue_error_table_is_flattened() {
        let mut page = page_with_body("1", "Issues", r#"<div data-macro-name="jira"></div>"#);
        page.body_export = r#"<div class="jim-error-message-table"><div class="aui-message"><p>Issue does not exist</p></div></div>"#.to_string();

        let tree = normalize_page(&page).unwrap();
        let node = only_macro(&tree);
        assert_eq!(node.kind, MacroKind::IssueErrorTable);
        assert_eq!(node.plain_body.as_deref(), Some("Issue does not exist"));
        assert!(node.body.is_empty());
    }

    #[test]
    fn test_single_issue_is_inline_generic() {
        let tree = normalize_markup(
            r#"<p>See <span data-macro-name="jira" class="jira-issue"><a href="https://jira.example.com/browse/ABC-1">ABC-1</a></span></p>"#,
        )
        .unwrap();
        let node = only_macro(&tree);
        assert_eq!(node.kind, MacroKind::Generic);
        assert!(node.inline);
    }

    #[test]
    fn test_plantuml_source_from_editor_by_ordinal() {
        let mut page = page_with_body(
            "1",
            "Diagrams",
            r#"<div data-macro-name="plantuml"><img src="a.png"/></div><div data-macro-name="plantuml"><img src="b.png"/></div>"#,
        );
        page.editor_first_version = r#"<table data-macro-name="plantuml"><tr><td><pre>@startuml
A -> B
@enduml</pre></td></tr></table><table data-macro-name="plantuml"><tr><td><pre>@startuml
C -> D
@enduml</pre></td></tr></table>"#
            .to_string();

        let tree = normalize_page(&page).unwrap();
        let sources: Vec<_> = tree
            .macros()
            .iter()
            .map(|(_, m)| m.plain_body.clone().unwrap_or_default())
            .collect();
        assert_eq!(
            sources,
            vec!["@startuml\nA -> B\n@enduml", "@startuml\nC -> D\n@enduml"]
        );
    }

    #[test]
    fn test_drawing_data_is_decoded() {
        let payload = base64::engine::general_purpose::STANDARD
            .encode(r#"{"attId":"att42","diagramName":"flow"}"#);
        let markup = format!(
            r#"<div data-macro-name="drawio"><div id="drawio-macro-data-1" style="display:none">{}</div></div>"#,
            payload
        );
        let node = only_macro(&normalize_markup(&markup).unwrap());
        assert_eq!(node.parameter("attId"), Some("att42"));
        assert_eq!(node.parameter("diagramName"), Some("flow"));
    }

    #[test]
    fn test_drawing_name_from_legacy_fragment() {
        let node = only_macro(
            &normalize_markup(
                r#"<div data-macro-name="drawio"><span>|border=true|diagramName=Net map|width=400|</span></div>"#,
            )
            .unwrap(),
        );
        assert_eq!(node.parameter("diagramName"), Some("Net map"));
    }

    #[test]
    fn test_links_are_classified() {
        let tree = normalize_markup(
            r##"<p><a href="/pages/viewpage.action?pageId=77#Setup">p</a><a href="/display/ENG/Run+Book">d</a><a href="#top">t</a><a href="https://example.org">e</a></p>"##,
        )
        .unwrap();
        let targets: Vec<_> = tree
            .descendants(tree.root())
            .into_iter()
            .filter_map(|id| match tree.node(id) {
                Some(MarkupNode::Link(link)) => Some(link.target.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                LinkTarget::Page {
                    id: PageId::parse("77").unwrap(),
                    anchor: Some("Setup".to_string()),
                },
                LinkTarget::PageTitle {
                    space: "ENG".to_string(),
                    title: "Run Book".to_string(),
                },
                LinkTarget::Anchor("top".to_string()),
                LinkTarget::External("https://example.org".to_string()),
            ]
        );
    }

    #[test]
    fn test_attachment_references() {
        let tree = normalize_markup(
            r#"<p><img src="/download/attachments/1/My%20Diagram.png?version=1" alt=""/><a href="/download/attachments/1/spec.pdf" data-linked-resource-type="attachment" data-linked-resource-id="900">spec</a></p>"#,
        )
        .unwrap();
        let refs: Vec<_> = tree
            .descendants(tree.root())
            .into_iter()
            .filter_map(|id| match tree.node(id) {
                Some(MarkupNode::AttachmentRef(r)) => Some((r.locator.clone(), r.hint)),
                _ => None,
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                (
                    AttachmentLocator::Filename("My Diagram.png".to_string()),
                    DisplayHint::Image
                ),
                (
                    AttachmentLocator::Id(AttachmentId::new("900").unwrap()),
                    DisplayHint::File
                ),
            ]
        );
    }

    #[test]
    fn test_code_macro_language_from_brush() {
        let node = only_macro(
            &normalize_markup(
                r#"<div data-macro-name="code"><div class="codeContent"><pre class="syntaxhighlighter-pre" data-syntaxhighlighter-params="brush: java; gutter: false">int x = 1;</pre></div></div>"#,
            )
            .unwrap(),
        );
        assert_eq!(node.parameter("language"), Some("java"));
        assert_eq!(node.plain_body.as_deref(), Some("int x = 1;"));
    }

    #[test]
    fn test_malformed_markup_is_an_error() {
        let page = page_with_body("1", "Broken", "<p class=\"unterminated");
        assert!(matches!(
            normalize_page(&page),
            Err(AppError::MalformedMarkup { .. })
        ));
    }
}
