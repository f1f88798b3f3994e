// src/links/mod.rs
//! Link and breadcrumb rewriting.
//!
//! Page links become relative paths when the target is exported in the
//! same run, and canonical wiki URLs otherwise. Attachment references are
//! resolved against the attachment plan and the download results.

use crate::attachments::locate;
use crate::constants::{ATTACHMENTS_DIR, CONTENT_FILE_NAME};
use crate::export::ExportContext;
use crate::model::{
    Ancestor, AttachmentLocator, AttachmentResolution, LinkTarget, MarkupNode, MarkupTree, Page,
};
use crate::output::get_relative_path;
use crate::report::{ResourceKey, ResourceStatus};
use crate::types::{BaseUrl, PageId, PageReference};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Characters escaped in the title segment of a `/display/` URL.
const DISPLAY_TITLE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b' ');

/// Pages exported in the current run, by id and by space/title.
#[derive(Debug, Clone, Default)]
pub struct CoExportMap {
    directories: HashMap<PageId, String>,
    titles: HashMap<(String, String), PageId>,
}

impl CoExportMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: PageId, space: &str, title: &str, directory: String) {
        self.titles
            .insert((space.to_string(), title.to_string()), id.clone());
        self.directories.insert(id, directory);
    }

    pub fn directory(&self, id: &PageId) -> Option<&str> {
        self.directories.get(id).map(String::as_str)
    }

    pub fn id_for_title(&self, space: &str, title: &str) -> Option<&PageId> {
        self.titles.get(&(space.to_string(), title.to_string()))
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }
}

/// Canonical display URL of a page named by space and title.
pub fn display_url(base: &BaseUrl, space: &str, title: &str) -> String {
    let title = utf8_percent_encode(title, DISPLAY_TITLE)
        .to_string()
        .replace(' ', "+");
    format!("{}/display/{}/{}", base, space, title)
}

/// Relative path from the current page's Markdown to another exported page.
fn co_export_path(ctx: &ExportContext, directory: &str) -> Option<String> {
    let from = Path::new(&ctx.page_dir).join(CONTENT_FILE_NAME);
    let to = Path::new(directory).join(CONTENT_FILE_NAME);
    match get_relative_path(&from, &to) {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("{}", e);
            None
        }
    }
}

fn with_anchor(href: String, anchor: Option<&str>) -> String {
    match anchor {
        Some(anchor) => format!("{}#{}", href, anchor),
        None => href,
    }
}

/// Final href of a link target.
pub fn resolve_target(target: &LinkTarget, ctx: &ExportContext) -> String {
    let base = &ctx.settings.base_url;
    match target {
        LinkTarget::Page { id, anchor } => {
            match ctx.co_export.directory(id).and_then(|dir| co_export_path(ctx, dir)) {
                Some(path) => with_anchor(path, anchor.as_deref()),
                None => with_anchor(base.page_url(id), anchor.as_deref()),
            }
        }
        LinkTarget::PageTitle { space, title } => {
            let co_exported = ctx
                .co_export
                .id_for_title(space, title)
                .and_then(|id| ctx.co_export.directory(id))
                .and_then(|dir| co_export_path(ctx, dir));
            co_exported.unwrap_or_else(|| display_url(base, space, title))
        }
        LinkTarget::Anchor(anchor) => format!("#{}", anchor),
        LinkTarget::External(href) => match internal_reference(href, base) {
            Some(internal) => resolve_target(&internal, ctx),
            None => href.clone(),
        },
        LinkTarget::Resolved(href) => href.clone(),
    }
}

/// An absolute link into the same wiki that names a page.
fn internal_reference(href: &str, base: &BaseUrl) -> Option<LinkTarget> {
    let url = Url::parse(href).ok()?;
    let host = url.host_str()?.to_lowercase();
    if Some(host) != base.host() {
        return None;
    }
    match PageReference::from_url(&url)? {
        PageReference::Id(id) => Some(LinkTarget::Page {
            id,
            anchor: url.fragment().filter(|f| !f.is_empty()).map(str::to_string),
        }),
        PageReference::SpaceTitle { space, title } => Some(LinkTarget::PageTitle { space, title }),
    }
}

fn locator_label(locator: &AttachmentLocator) -> String {
    match locator {
        AttachmentLocator::Id(id) => id.to_string(),
        AttachmentLocator::Filename(name) => name.clone(),
    }
}

fn resolve_attachment(locator: &AttachmentLocator, ctx: &ExportContext) -> AttachmentResolution {
    let Some(entry) = locate(&ctx.manifest, locator) else {
        let key = ResourceKey::MissingAttachment {
            reference: locator_label(locator),
        };
        if ctx.report.status(&key).is_none() {
            ctx.report
                .record(key, ResourceStatus::degraded("not in the attachment manifest"));
        }
        return AttachmentResolution::Missing;
    };

    let exported = ctx
        .attachments
        .file_name(&entry.id)
        .filter(|_| ctx.downloads.bytes(&entry.id).is_some());
    match exported {
        Some(name) => AttachmentResolution::Exported(format!("{}/{}", ATTACHMENTS_DIR, name)),
        None => AttachmentResolution::Unavailable,
    }
}

/// Rewrites every link target and attachment reference of the rendered tree.
pub fn rewrite_links(tree: &mut MarkupTree, ctx: &ExportContext) -> usize {
    let mut rewritten = 0;
    for id in tree.descendants(tree.root()) {
        match tree.node_mut(id) {
            Some(MarkupNode::Link(link)) => {
                link.target = LinkTarget::Resolved(resolve_target(&link.target, ctx));
                rewritten += 1;
            }
            Some(MarkupNode::AttachmentRef(reference)) => {
                reference.resolution = resolve_attachment(&reference.locator, ctx);
                rewritten += 1;
            }
            _ => {}
        }
    }
    rewritten
}

/// One breadcrumb entry: ancestor title and canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub title: String,
    pub href: String,
}

/// Ancestors below the space home page, top down, each linked to its
/// wiki URL. The first ancestor is the space home and is left out.
pub fn breadcrumbs(page: &Page, base: &BaseUrl) -> Vec<Breadcrumb> {
    page.ancestors
        .iter()
        .skip(1)
        .map(|Ancestor { id, title }| Breadcrumb {
            title: title.clone(),
            href: base.page_url(id),
        })
        .collect()
}
