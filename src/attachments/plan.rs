// src/attachments/plan.rs
//! Which attachments a page exports, and under which names.

use super::naming::FileNameAllocator;
use crate::model::{
    AttachmentEntry, AttachmentLocator, AttachmentManifest, MacroKind, MacroNode, MarkupNode,
    MarkupTree,
};
use crate::types::{AttachmentId, ExportFileName};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};

/// Finds the manifest entry an attachment reference points at.
pub fn locate<'m>(
    manifest: &'m AttachmentManifest,
    locator: &AttachmentLocator,
) -> Option<&'m AttachmentEntry> {
    match locator {
        AttachmentLocator::Id(id) => manifest.by_id(id),
        AttachmentLocator::Filename(name) => manifest.by_title(name),
    }
}

/// Finds the attachment a drawing macro refers to.
///
/// Tried in order: the `attId` parameter, then the `diagramName` as an
/// exact title, as `<name>.drawio`, and as the `<name>.drawio.png` preview.
pub fn locate_drawing<'m>(
    manifest: &'m AttachmentManifest,
    node: &MacroNode,
) -> Option<&'m AttachmentEntry> {
    let by_id = node
        .parameter("attId")
        .and_then(|id| AttachmentId::new(id).ok())
        .and_then(|id| manifest.by_id(&id));
    if by_id.is_some() {
        return by_id;
    }

    let name = node.parameter("diagramName")?.trim();
    manifest
        .by_title(name)
        .or_else(|| manifest.by_title(&format!("{}.drawio", name)))
        .or_else(|| manifest.by_title(&format!("{}.drawio.png", name)))
}

/// Referenced attachments with their export names, in manifest order.
#[derive(Debug, Clone, Default)]
pub struct AttachmentPlan {
    assignments: IndexMap<AttachmentId, ExportFileName>,
    /// Drawing macro ordinal to the attachment holding its diagram.
    drawings: BTreeMap<usize, AttachmentId>,
}

impl AttachmentPlan {
    /// Collects the referenced set from the rendered part of the tree.
    ///
    /// Attachment nodes and drawing macros without embedded source count as
    /// references; everything else in the manifest stays out of the export.
    pub fn build(tree: &MarkupTree, manifest: &AttachmentManifest) -> Self {
        let mut referenced: HashSet<AttachmentId> = HashSet::new();
        let mut drawings = BTreeMap::new();

        for id in tree.rendered_descendants(tree.root()) {
            match tree.node(id) {
                Some(MarkupNode::AttachmentRef(reference)) => {
                    if let Some(entry) = locate(manifest, &reference.locator) {
                        referenced.insert(entry.id.clone());
                    }
                }
                Some(MarkupNode::Macro(node))
                    if node.kind == MacroKind::Drawing && node.plain_body.is_none() =>
                {
                    if let Some(entry) = locate_drawing(manifest, node) {
                        referenced.insert(entry.id.clone());
                        drawings.insert(node.ordinal, entry.id.clone());
                    }
                }
                _ => {}
            }
        }

        let mut allocator = FileNameAllocator::new();
        let assignments = manifest
            .entries()
            .iter()
            .filter(|entry| referenced.contains(&entry.id))
            .map(|entry| (entry.id.clone(), allocator.allocate(&entry.title)))
            .collect();

        Self {
            assignments,
            drawings,
        }
    }

    pub fn file_name(&self, id: &AttachmentId) -> Option<&ExportFileName> {
        self.assignments.get(id)
    }

    pub fn drawing_attachment(&self, ordinal: usize) -> Option<&AttachmentId> {
        self.drawings.get(&ordinal)
    }

    pub fn assignments(&self) -> impl Iterator<Item = (&AttachmentId, &ExportFileName)> {
        self.assignments.iter()
    }

    /// Referenced manifest entries paired with their names, in manifest order.
    pub fn referenced(
        &self,
        manifest: &AttachmentManifest,
    ) -> Vec<(AttachmentEntry, ExportFileName)> {
        self.assignments
            .iter()
            .filter_map(|(id, name)| {
                manifest
                    .by_id(id)
                    .map(|entry| (entry.clone(), name.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::normalize_markup;
    use crate::model::attachment_fixtures::entry;
    use pretty_assertions::assert_eq;

    fn manifest() -> AttachmentManifest {
        AttachmentManifest::new(vec![
            entry("att1", "Diagram.png", 10),
            entry("att2", "unused.pdf", 20),
            entry("att3", "diagram.PNG", 30),
            entry("att4", "flow.drawio", 40),
            entry("att5", "flow.drawio.png", 50),
        ])
    }

    #[test]
    fn test_only_referenced_attachments_are_planned() {
        let tree = normalize_markup(
            r#"<p><img src="/download/attachments/1/diagram.PNG" data-linked-resource-id="att3"/>
               <a href="/download/attachments/1/Diagram.png">first</a></p>"#,
        )
        .unwrap();
        let plan = AttachmentPlan::build(&tree, &manifest());
        let names: Vec<_> = plan
            .assignments()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("att1".to_string(), "diagram.png".to_string()),
                ("att3".to_string(), "diagram-2.png".to_string()),
            ]
        );
    }

    #[test]
    fn test_drawing_reference_prefers_source_over_preview() {
        let tree =
            normalize_markup(r#"<div data-macro-name="drawio" data-macro-parameters="diagramName=flow"></div>"#)
                .unwrap();
        let plan = AttachmentPlan::build(&tree, &manifest());
        assert_eq!(plan.drawing_attachment(0).map(|id| id.to_string()), Some("att4".to_string()));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_drawing_by_attachment_id() {
        let tree = normalize_markup(
            r#"<div data-macro-name="drawio" data-macro-parameters="attId=att5|diagramName=flow"></div>"#,
        )
        .unwrap();
        let plan = AttachmentPlan::build(&tree, &manifest());
        assert_eq!(plan.drawing_attachment(0).map(|id| id.to_string()), Some("att5".to_string()));
        assert_eq!(
            plan.file_name(&AttachmentId::new("att5").unwrap()).map(|n| n.to_string()),
            Some("flow-drawio.png".to_string())
        );
    }

    #[test]
    fn test_references_inside_unknown_macros_are_ignored() {
        let tree = normalize_markup(
            r#"<div data-macro-name="roadmap"><img src="/download/attachments/1/Diagram.png"/></div>"#,
        )
        .unwrap();
        assert!(AttachmentPlan::build(&tree, &manifest()).is_empty());
    }
}
