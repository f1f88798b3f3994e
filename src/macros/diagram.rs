// src/macros/diagram.rs
use super::include::expand_includes;
use crate::export::ExportContext;
use crate::model::{DiagramEngine, MacroNode, ReplacementBlock};
use crate::report::ResourceStatus;

/// Diagram-as-code: the source in a code block tagged with the engine.
pub fn transform(
    node: &MacroNode,
    engine: DiagramEngine,
    ctx: &ExportContext,
) -> (ReplacementBlock, ResourceStatus) {
    let Some(source) = node
        .plain_body
        .as_deref()
        .filter(|source| !source.trim().is_empty())
    else {
        return (
            ReplacementBlock::Placeholder {
                label: format!("{} diagram without source", engine.fence_tag()),
                fallback: None,
            },
            ResourceStatus::degraded("no diagram source"),
        );
    };

    let (expanded, failures) = expand_includes(source, &ctx.includes);
    let status = if failures.is_empty() {
        ResourceStatus::Ok
    } else {
        ResourceStatus::failed(failures.join(", "))
    };

    (
        ReplacementBlock::CodeBlock {
            language: engine.fence_tag().to_string(),
            source: expanded,
        },
        status,
    )
}
