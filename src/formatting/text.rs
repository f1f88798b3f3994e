// src/formatting/text.rs
//! Text-level helpers: whitespace collapsing, inline markers, code fences.

/// Collapses every whitespace run, non-breaking spaces included, to one space.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Appends an inline piece without doubling the space at the seam.
pub fn push_inline(buffer: &mut String, piece: &str) {
    let seam_has_space = buffer.is_empty() || buffer.ends_with(' ') || buffer.ends_with('\n');
    if seam_has_space {
        buffer.push_str(piece.trim_start_matches(' '));
    } else {
        buffer.push_str(piece);
    }
}

/// Wraps the trimmed content in a marker, keeping outer spaces outside it.
///
/// `**` around `" bold "` gives `" **bold** "`; blank content yields itself.
pub fn wrap_marker(content: &str, open: &str, close: &str) -> String {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return content.to_string();
    }
    let lead = if content.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if content.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{}{}{}{}{}", lead, open, trimmed, close, trail)
}

/// Inline code span, widening the backtick run past any run in the content.
pub fn code_span(content: &str) -> String {
    let content = collapse_whitespace(content);
    let content = content.trim();
    if content.is_empty() {
        return String::new();
    }
    let ticks = "`".repeat(longest_run(content, '`') + 1);
    let pad = if content.starts_with('`') || content.ends_with('`') { " " } else { "" };
    format!("{}{}{}{}{}", ticks, pad, content, pad, ticks)
}

/// Fenced code block; the content is kept verbatim apart from edge newlines.
pub fn code_fence(language: &str, source: &str) -> String {
    let source = source.trim_matches('\n');
    let fence = "`".repeat(longest_run(source, '`').max(2) + 1);
    format!("{}{}\n{}\n{}", fence, language.trim(), source, fence)
}

/// Prefixes every line, using `blank` for empty lines.
pub fn prefix_lines(text: &str, prefix: &str, blank: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                blank.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escapes a cell value so it stays inside one table column and row.
pub fn table_cell(text: &str) -> String {
    text.trim()
        .replace('|', "\\|")
        .replace("\\\n", "<br>")
        .replace('\n', "<br>")
}

fn longest_run(text: &str, target: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == target {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a \n\t b\u{a0}\u{a0}c"), "a b c");
        assert_eq!(collapse_whitespace("  lead"), " lead");
    }

    #[test]
    fn test_push_inline_seams() {
        let mut buffer = String::new();
        push_inline(&mut buffer, " one ");
        push_inline(&mut buffer, " two");
        push_inline(&mut buffer, "three");
        assert_eq!(buffer, "one twothree");
    }

    #[test]
    fn test_wrap_marker_keeps_spaces_outside() {
        assert_eq!(wrap_marker(" bold ", "**", "**"), " **bold** ");
        assert_eq!(wrap_marker("  ", "**", "**"), "  ");
    }

    #[test]
    fn test_fences_outgrow_content() {
        assert_eq!(code_fence("sh", "\necho hi\n"), "```sh\necho hi\n```");
        assert_eq!(code_fence("", "a ``` b"), "````\na ``` b\n````");
        assert_eq!(code_span("a`b"), "``a`b``");
    }

    #[test]
    fn test_table_cell_escaping() {
        assert_eq!(table_cell(" a | b\nc "), "a \\| b<br>c");
    }
}
