// src/api/responses.rs
//! Wire types of the Confluence REST API.
//!
//! Only the fields the exporter reads are declared; everything else in the
//! payload is ignored by serde.

use crate::error::AppError;
use crate::model::{Ancestor, AttachmentEntry, AttachmentManifest, Page, PageTitle};
use crate::types::{AttachmentId, PageId};
use serde::Deserialize;
use std::collections::BTreeSet;

/// `GET /rest/api/content/{id}` with body, label, space and ancestor expansions.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentResponse {
    pub id: PageId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub space: Option<SpaceRef>,
    #[serde(default)]
    pub body: BodyRenderings,
    #[serde(default)]
    pub ancestors: Vec<AncestorRef>,
    #[serde(default)]
    pub metadata: Option<ContentMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpaceRef {
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BodyRenderings {
    #[serde(default)]
    pub view: Option<BodyValue>,
    #[serde(default)]
    pub export_view: Option<BodyValue>,
    #[serde(default)]
    pub editor: Option<BodyValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BodyValue {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AncestorRef {
    pub id: PageId,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentMetadata {
    #[serde(default)]
    pub labels: Option<Results<Label>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Offset-paginated result list.
#[derive(Debug, Clone, Deserialize)]
pub struct Results<T> {
    pub results: Vec<T>,
    #[serde(rename = "_links", default)]
    pub links: ResultLinks,
}

impl<T> Results<T> {
    pub fn has_more(&self) -> bool {
        self.links.next.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// One item of `GET /rest/api/content/{id}/child/attachment`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub extensions: AttachmentExtensions,
    #[serde(default)]
    pub metadata: Option<AttachmentMetadata>,
    #[serde(rename = "_links", default)]
    pub links: AttachmentLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentExtensions {
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,
    #[serde(rename = "fileSize", default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentMetadata {
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentLinks {
    #[serde(default)]
    pub download: Option<String>,
}

/// One item of `GET /rest/api/content?spaceKey=&title=`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSummary {
    pub id: PageId,
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Conversion from wire types to the domain model.
pub trait ToDomain<T> {
    fn to_domain(self) -> Result<T, AppError>;
}

impl ToDomain<Page> for ContentResponse {
    fn to_domain(self) -> Result<Page, AppError> {
        let body = self.body;
        let labels: BTreeSet<String> = self
            .metadata
            .and_then(|metadata| metadata.labels)
            .map(|labels| labels.results.into_iter().map(|label| label.name).collect())
            .unwrap_or_default();

        Ok(Page {
            id: self.id,
            title: PageTitle::new(self.title),
            space_key: self.space.map(|space| space.key).unwrap_or_default(),
            body: body.view.map(|b| b.value).unwrap_or_default(),
            body_export: body.export_view.map(|b| b.value).unwrap_or_default(),
            editor_first_version: body.editor.map(|b| b.value).unwrap_or_default(),
            ancestors: self
                .ancestors
                .into_iter()
                .map(|ancestor| Ancestor {
                    id: ancestor.id,
                    title: ancestor.title,
                })
                .collect(),
            labels,
            attachments: AttachmentManifest::default(),
        })
    }
}

impl ToDomain<AttachmentEntry> for AttachmentResponse {
    fn to_domain(self) -> Result<AttachmentEntry, AppError> {
        let id = AttachmentId::new(self.id)?;
        let download_link = self.links.download.ok_or_else(|| {
            AppError::MalformedResponse(format!("attachment {} has no download link", id))
        })?;
        let media_type = self
            .extensions
            .media_type
            .or_else(|| self.metadata.and_then(|metadata| metadata.media_type));

        Ok(AttachmentEntry {
            id,
            title: self.title,
            media_type,
            download_link,
            file_size: self.extensions.file_size,
        })
    }
}
