//! Site materializer: writes the generator source tree for one snapshot.
//!
//! Layout of the tree rooted at `work_dir`:
//!
//! ```text
//! config.json          generator config (theme, dirs, title)
//! data/site.json       the full content snapshot
//! content/_index.md    home page stub
//! content/<page>/...   one stub per schema page
//! static/              site-level static files
//! ```
//!
//! Stubs carry JSON front matter only; templates read the page content from
//! `data/site.json`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use schoolsite_core::error::CoreError;
use schoolsite_core::theme::{FieldKind, PageSchema, ThemeSchema, LAYOUTS_DIR};
use serde_json::{json, Value};

use crate::error::PipelineResult;

/// Page ids rendered at the site root.
const HOME_PAGE_IDS: &[&str] = &["home", "index"];

/// Generic page layout name in generator templates.
const SINGLE_LAYOUT: &str = "single";

const LIST_PATTERN: &str = r"(?i)list|items|posts|articles|news|events";

static LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LIST_PATTERN).expect("valid regex"));

/// Everything needed to lay out one site.
#[derive(Debug)]
pub struct SiteSource<'a> {
    pub theme: &'a ThemeSchema,
    /// Root of the themes catalog; the theme lives in `<themes_dir>/<theme.id>`.
    pub themes_dir: &'a Path,
    pub snapshot: &'a Value,
    /// Where the generator should publish.
    pub output_dir: &'a Path,
    /// Extra static directories mounted next to the site's own `static/`.
    pub static_mounts: &'a [PathBuf],
}

/// One content stub to write, relative to the source root.
#[derive(Debug, Clone, PartialEq)]
pub struct PageStub {
    pub path: PathBuf,
    pub front_matter: Value,
}

/// Write the generator source tree for `source` into `work_dir`.
pub async fn materialize(work_dir: &Path, source: &SiteSource<'_>) -> PipelineResult<()> {
    let theme_dir = source.themes_dir.join(&source.theme.id);
    if !tokio::fs::try_exists(&theme_dir).await.unwrap_or(false) {
        tracing::error!(
            theme_id = %source.theme.id,
            path = %theme_dir.display(),
            "Theme directory missing; cannot materialize",
        );
        return Err(CoreError::ThemeNotFound(source.theme.id.clone()).into());
    }

    tokio::fs::create_dir_all(work_dir.join("data")).await?;
    tokio::fs::create_dir_all(work_dir.join("content")).await?;
    tokio::fs::create_dir_all(work_dir.join("static")).await?;

    write_json(&work_dir.join("data").join("site.json"), source.snapshot).await?;
    write_json(&work_dir.join("config.json"), &site_config(source)).await?;

    let stubs = page_stubs(source.theme, |page_id| {
        theme_dir
            .join(LAYOUTS_DIR)
            .join(page_id)
            .join(format!("{SINGLE_LAYOUT}.html"))
            .is_file()
    });
    for stub in &stubs {
        let path = work_dir.join(&stub.path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut body = serde_json::to_string_pretty(&stub.front_matter)
            .map_err(|e| CoreError::Internal(format!("Failed to encode front matter: {e}")))?;
        body.push('\n');
        tokio::fs::write(&path, body).await?;
    }

    tracing::debug!(
        work_dir = %work_dir.display(),
        theme_id = %source.theme.id,
        pages = stubs.len(),
        "Materialized site source",
    );
    Ok(())
}

/// Generator configuration for `source`.
pub fn site_config(source: &SiteSource<'_>) -> Value {
    let mut static_dirs = vec![Value::String("static".into())];
    static_dirs.extend(
        source
            .static_mounts
            .iter()
            .map(|p| Value::String(p.display().to_string())),
    );

    json!({
        "baseURL": "/",
        "title": site_title(source.theme, source.snapshot),
        "theme": source.theme.id,
        "themesDir": source.themes_dir.display().to_string(),
        "publishDir": source.output_dir.display().to_string(),
        "staticDir": static_dirs,
        "disableKinds": ["taxonomy", "term", "RSS", "sitemap"],
    })
}

/// One stub per schema page. `has_single_layout(page_id)` reports whether the
/// theme ships `layouts/<page_id>/single.html`.
pub fn page_stubs<F>(theme: &ThemeSchema, has_single_layout: F) -> Vec<PageStub>
where
    F: Fn(&str) -> bool,
{
    theme
        .pages
        .iter()
        .map(|page| {
            let is_list = is_list_page(page);
            let layout = if has_single_layout(&page.id) {
                SINGLE_LAYOUT.to_string()
            } else {
                page.layout.clone().unwrap_or_else(|| page.id.clone())
            };
            PageStub {
                path: stub_path(page, is_list),
                front_matter: json!({
                    "title": page.title,
                    "layout": layout,
                    "type": page.id,
                    "list": is_list,
                }),
            }
        })
        .collect()
}

/// A page renders as a list when it has a repeating field whose id or label
/// looks like a feed.
pub fn is_list_page(page: &PageSchema) -> bool {
    page.fields().any(|field| {
        matches!(field.kind, FieldKind::List | FieldKind::ImageSet)
            && (LIST_RE.is_match(&field.id) || LIST_RE.is_match(field.label()))
    })
}

fn stub_path(page: &PageSchema, is_list: bool) -> PathBuf {
    let content = PathBuf::from("content");
    if HOME_PAGE_IDS.contains(&page.id.as_str()) {
        return content.join("_index.md");
    }
    let file = if is_list { "_index.md" } else { "index.md" };
    content.join(&page.id).join(file)
}

/// The home page's `title` field when filled in, else the theme name.
fn site_title(theme: &ThemeSchema, snapshot: &Value) -> String {
    theme
        .pages
        .iter()
        .filter(|page| HOME_PAGE_IDS.contains(&page.id.as_str()))
        .flat_map(|page| {
            page.sections.iter().filter_map(move |section| {
                snapshot
                    .get(&page.id)?
                    .get(&section.id)?
                    .get("title")?
                    .as_str()
            })
        })
        .map(str::trim)
        .find(|title| !title.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| theme.name.clone())
}

async fn write_json(path: &Path, value: &Value) -> PipelineResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::Internal(format!("Failed to encode {}: {e}", path.display())))?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
