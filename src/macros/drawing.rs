// src/macros/drawing.rs
use crate::attachments::DownloadedAttachment;
use crate::export::ExportContext;
use crate::model::{MacroNode, ReplacementBlock};
use crate::report::ResourceStatus;

/// Drawings: embedded diagram XML, else the diagram attachment's content.
///
/// When only the rendered preview is attached the preview image is shown
/// instead and the macro is degraded.
pub fn transform(node: &MacroNode, ctx: &ExportContext) -> (ReplacementBlock, ResourceStatus) {
    if let Some(xml) = node.plain_body.as_deref() {
        return (xml_block(xml), ResourceStatus::Ok);
    }

    let name = node
        .parameter("diagramName")
        .or_else(|| node.parameter("attId"))
        .unwrap_or("unnamed");

    let Some(attachment_id) = ctx.attachments.drawing_attachment(node.ordinal) else {
        return (
            ReplacementBlock::Placeholder {
                label: format!("Drawing '{}' not found among the page attachments", name),
                fallback: None,
            },
            ResourceStatus::degraded("drawing attachment not found"),
        );
    };

    match ctx.downloads.get(attachment_id) {
        Some(DownloadedAttachment {
            bytes: Some(bytes),
            entry,
            file_name,
            ..
        }) => {
            if is_image(&entry.title, entry.media_type.as_deref()) {
                (
                    ReplacementBlock::Image {
                        src: format!("attachments/{}", file_name),
                        alt: name.to_string(),
                    },
                    ResourceStatus::degraded("only the preview image is available"),
                )
            } else {
                let xml = String::from_utf8_lossy(bytes);
                (xml_block(&xml), ResourceStatus::Ok)
            }
        }
        Some(downloaded) => (
            ReplacementBlock::Placeholder {
                label: format!("Drawing '{}' could not be downloaded", name),
                fallback: None,
            },
            ResourceStatus::failed(downloaded.status.reason().unwrap_or("download failed")),
        ),
        None => (
            ReplacementBlock::Placeholder {
                label: format!("Drawing '{}' was not downloaded", name),
                fallback: None,
            },
            ResourceStatus::failed("not downloaded"),
        ),
    }
}

fn xml_block(xml: &str) -> ReplacementBlock {
    ReplacementBlock::CodeBlock {
        language: "xml".to_string(),
        source: xml.trim().to_string(),
    }
}

fn is_image(title: &str, media_type: Option<&str>) -> bool {
    media_type.is_some_and(|media| media.starts_with("image/"))
        || title.to_ascii_lowercase().ends_with(".png")
}
