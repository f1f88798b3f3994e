// src/markup/parser.rs
//! Lenient tokenizer for Confluence page markup.
//!
//! The wiki returns XHTML most of the time, but view renderings regularly
//! contain HTML-isms: `<br>` without a slash, unquoted attributes, stray
//! end tags, `&nbsp;`. The reader is configured to accept all of those and
//! the element stack repairs nesting; every repair is recorded as a warning.

use super::entities::decode_references;
use crate::error::AppError;
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// HTML elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    /// Lower-cased tag name including any namespace prefix (`ac:link`).
    pub name: String,
    pub attrs: IndexMap<String, String>,
    pub children: Vec<Content>,
    /// Source text between the start and end tag.
    pub raw_inner: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Element(Element),
    Text(String),
}

impl Element {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|value| value.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Content::Element(element) => Some(element),
            Content::Text(_) => None,
        })
    }

    /// First descendant (depth-first, self excluded) matching `predicate`.
    pub fn find<P>(&self, predicate: &P) -> Option<&Element>
    where
        P: Fn(&Element) -> bool,
    {
        for child in self.child_elements() {
            if predicate(child) {
                return Some(child);
            }
            if let Some(found) = child.find(predicate) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants matching `predicate` in document order, without
    /// descending into matches.
    pub fn find_all<'a, P>(&'a self, predicate: &P, out: &mut Vec<&'a Element>)
    where
        P: Fn(&Element) -> bool,
    {
        for child in self.child_elements() {
            if predicate(child) {
                out.push(child);
            } else {
                child.find_all(predicate, out);
            }
        }
    }

    /// Concatenated descendant text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Content::Text(text) => out.push_str(text),
                Content::Element(element) if element.name == "br" => out.push('\n'),
                Content::Element(element) => element.collect_text(out),
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Content::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Content::Text(text.to_string()));
        }
    }
}

/// Parsed markup plus the repairs made along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMarkup {
    pub root: Element,
    pub warnings: Vec<String>,
}

struct OpenElement {
    element: Element,
    /// Byte offset just after the start tag.
    inner_start: usize,
}

/// Tokenizes `source` into an element tree.
///
/// Fails only when the tokenizer gives up before producing any content;
/// later failures keep what was read and add a warning.
pub fn parse_markup(source: &str) -> Result<ParsedMarkup, AppError> {
    let mut reader = Reader::from_str(source);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.allow_dangling_amp = true;
    }

    let mut stack = vec![OpenElement {
        element: Element::named("#root"),
        inner_start: 0,
    }];
    let mut warnings = Vec::new();

    loop {
        let event_start = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = start_element(&e);
                if VOID_ELEMENTS.contains(&element.name.as_str()) {
                    append_child(&mut stack, element);
                    continue;
                }
                close_implied(&mut stack, &element.name, source, event_start);
                stack.push(OpenElement {
                    element,
                    inner_start: reader.buffer_position() as usize,
                });
            }
            Ok(Event::Empty(e)) => {
                let element = start_element(&e);
                append_child(&mut stack, element);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    continue;
                }
                match stack.iter().rposition(|open| open.element.name == name) {
                    Some(depth) if depth > 0 => {
                        while stack.len() > depth + 1 {
                            if let Some(open) = stack.last() {
                                warnings.push(format!("unclosed <{}>", open.element.name));
                            }
                            close_top(&mut stack, source, event_start);
                        }
                        close_top(&mut stack, source, event_start);
                    }
                    _ => warnings.push(format!("stray end tag </{}>", name)),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.element.push_text(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                let text = super::entities::decode_reference(&name)
                    .unwrap_or_else(|| format!("&{};", name));
                if let Some(top) = stack.last_mut() {
                    top.element.push_text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(top) = stack.last_mut() {
                    top.element.push_text(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_)) => {}
            Err(err) => {
                let has_content = stack.len() > 1 || !stack[0].element.children.is_empty();
                if !has_content {
                    return Err(AppError::MalformedMarkup {
                        reason: format!("at byte {}: {}", reader.error_position(), err),
                    });
                }
                warnings.push(format!(
                    "markup truncated at byte {}: {}",
                    reader.error_position(),
                    err
                ));
                break;
            }
        }
    }

    let end = source.len();
    while stack.len() > 1 {
        if let Some(open) = stack.last() {
            warnings.push(format!("unclosed <{}>", open.element.name));
        }
        close_top(&mut stack, source, end);
    }

    let root = stack
        .pop()
        .map(|open| open.element)
        .unwrap_or_else(|| Element::named("#root"));

    Ok(ParsedMarkup { root, warnings })
}

fn start_element(start: &BytesStart) -> Element {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let mut attrs = IndexMap::new();
    for attr in start.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = decode_references(&String::from_utf8_lossy(&attr.value));
        attrs.entry(key).or_insert(value);
    }
    Element {
        name,
        attrs,
        ..Default::default()
    }
}

fn append_child(stack: &mut [OpenElement], element: Element) {
    if let Some(top) = stack.last_mut() {
        top.element.children.push(Content::Element(element));
    }
}

/// Pops the innermost open element and attaches it to its parent.
fn close_top(stack: &mut Vec<OpenElement>, source: &str, inner_end: usize) {
    if stack.len() <= 1 {
        return;
    }
    if let Some(mut open) = stack.pop() {
        open.element.raw_inner = source
            .get(open.inner_start..inner_end.max(open.inner_start))
            .unwrap_or_default()
            .to_string();
        append_child(stack, open.element);
    }
}

/// Closes elements whose end tag HTML allows to be omitted.
fn close_implied(stack: &mut Vec<OpenElement>, starting: &str, source: &str, at: usize) {
    let implied: &[&str] = match starting {
        "p" => &["p"],
        "li" => &["li", "p"],
        "td" | "th" => &["td", "th", "p"],
        "tr" => &["tr", "td", "th", "p"],
        _ => return,
    };
    while stack.len() > 1 {
        let top = stack
            .last()
            .map(|open| open.element.name.as_str())
            .unwrap_or_default();
        if !implied.contains(&top) {
            break;
        }
        let closes_sibling = top == starting || (starting == "tr" && top != "p");
        close_top(stack, source, at);
        if closes_sibling && top_is_container(stack, starting) {
            break;
        }
    }
}

fn top_is_container(stack: &[OpenElement], starting: &str) -> bool {
    let top = stack
        .last()
        .map(|open| open.element.name.as_str())
        .unwrap_or_default();
    match starting {
        "li" => matches!(top, "ul" | "ol"),
        "td" | "th" => top == "tr",
        "tr" => matches!(top, "table" | "tbody" | "thead" | "tfoot"),
        _ => true,
    }
}
