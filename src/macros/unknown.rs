// src/macros/unknown.rs
use crate::model::{MacroNode, ReplacementBlock};
use crate::report::ResourceStatus;

/// Unsupported macros stay visible: a placeholder naming the macro plus
/// its raw inner markup.
pub fn transform(node: &MacroNode) -> (ReplacementBlock, ResourceStatus) {
    let raw = node.raw_inner.trim();
    (
        ReplacementBlock::Placeholder {
            label: format!("Unsupported macro: {}", node.name),
            fallback: (!raw.is_empty()).then(|| raw.to_string()),
        },
        ResourceStatus::degraded("unsupported macro"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::normalize_markup;
    use crate::model::MacroKind;

    #[test]
    fn test_placeholder_keeps_raw_markup() {
        let tree =
            normalize_markup(r#"<div data-macro-name="roadmap"><p>Q3 <b>launch</b></p></div>"#)
                .unwrap();
        let (_, node) = tree.macros()[0];
        assert_eq!(node.kind, MacroKind::Unknown);

        let (block, status) = transform(node);
        assert_eq!(
            block,
            ReplacementBlock::Placeholder {
                label: "Unsupported macro: roadmap".to_string(),
                fallback: Some("<p>Q3 <b>launch</b></p>".to_string()),
            }
        );
        assert!(!status.is_ok());
        assert!(matches!(status, ResourceStatus::Degraded(_)));
    }
}
