// src/macros/mod.rs
//! Macro transformers.
//!
//! Each macro kind has one strategy turning the macro node into a
//! [`ReplacementBlock`] plus a [`ResourceStatus`]. Dispatch is an exhaustive
//! match over [`MacroKind`]; transformers only read the tree and the
//! context, and [`transform_all`] writes the results back by index.

mod diagram;
mod drawing;
mod generic;
pub mod include;
mod issues;
mod unknown;

pub use include::{
    collect_include_urls, fetch_includes, HttpIncludeSource, IncludeFetch, IncludeResults,
    IncludeSource,
};

use crate::export::ExportContext;
use crate::model::{MacroKind, MacroNode, MarkupNode, MarkupTree, NodeId, ReplacementBlock};
use crate::report::{ResourceKey, ResourceStatus};

/// Runs the transformer for the macro's kind.
pub fn transform_macro(
    tree: &MarkupTree,
    node: &MacroNode,
    ctx: &ExportContext,
) -> (ReplacementBlock, ResourceStatus) {
    match node.kind {
        MacroKind::DiagramAsCode(engine) => diagram::transform(node, engine, ctx),
        MacroKind::Drawing => drawing::transform(node, ctx),
        MacroKind::IssueTable => issues::transform_table(tree, node),
        MacroKind::IssueErrorTable => issues::transform_error(node),
        MacroKind::Generic => generic::transform(tree, node),
        MacroKind::Unknown => unknown::transform(node),
    }
}

pub fn macro_resource_key(node: &MacroNode) -> ResourceKey {
    ResourceKey::Macro {
        ordinal: node.ordinal,
        kind: node.kind,
        name: node.name.clone(),
    }
}

/// Transforms every rendered macro, records its status, and overwrites the
/// macro slot with the result. Returns the number of macros transformed.
pub fn transform_all(tree: &mut MarkupTree, ctx: &ExportContext) -> usize {
    let replacements: Vec<(NodeId, ReplacementBlock)> = tree
        .macros()
        .into_iter()
        .map(|(id, node)| {
            let (block, status) = transform_macro(tree, node, ctx);
            ctx.report.record(macro_resource_key(node), status);
            (id, block)
        })
        .collect();

    let count = replacements.len();
    for (id, block) in replacements {
        tree.replace(id, MarkupNode::Rendered(block));
    }
    log::debug!("Page {}: transformed {} macros", ctx.report.page_id(), count);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::context_fixtures::context;
    use crate::markup::normalize_markup;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_macro_is_replaced_and_reported() {
        let mut tree = normalize_markup(
            r#"<div data-macro-name="info"><div data-macro-name="plantuml"><pre>A -> B</pre></div></div>
               <div data-macro-name="roadmap"><p>plan</p></div>"#,
        )
        .unwrap();
        let ctx = context();

        assert_eq!(transform_all(&mut tree, &ctx), 3);
        assert!(tree.macros().is_empty());

        let summary = ctx.report.summary();
        assert_eq!((summary.ok, summary.degraded, summary.failed), (2, 1, 0));
        let nested = ResourceKey::Macro {
            ordinal: 1,
            kind: MacroKind::DiagramAsCode(crate::model::DiagramEngine::PlantUml),
            name: "plantuml".to_string(),
        };
        assert_eq!(ctx.report.status(&nested), Some(ResourceStatus::Ok));
    }
}
