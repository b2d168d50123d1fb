//! Theme schemas and the on-disk theme catalog.
//!
//! A theme is a directory `<themes_dir>/<id>/` holding a `theme.json` schema
//! plus generator templates under `layouts/`. The schema is a typed tree of
//! pages, sections and fields; validation and materialization both interpret
//! the same tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::imaging::ImageConstraints;

/// Schema file name inside every theme directory.
pub const SCHEMA_FILE: &str = "theme.json";

/// Templates directory inside every theme directory.
pub const LAYOUTS_DIR: &str = "layouts";

// ---------------------------------------------------------------------------
// Schema tree
// ---------------------------------------------------------------------------

/// Field input kind as declared by the theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Richtext,
    Url,
    Image,
    ImageSet,
    List,
}

impl FieldKind {
    /// Kinds whose value is a single string.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Textarea | Self::Richtext | Self::Url | Self::Image
        )
    }

    /// Kinds whose value is a JSON array.
    pub fn is_array(self) -> bool {
        matches!(self, Self::ImageSet | Self::List)
    }

    /// Kinds that hold uploaded images.
    pub fn is_image(self) -> bool {
        matches!(self, Self::Image | Self::ImageSet)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
    /// Accepted mime types for image fields. Empty means any `image/*`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
    /// Item fields for `list` kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldSchema>,
}

impl FieldSchema {
    /// Display label, falling back to the id.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    /// Upload-time constraints for image fields.
    pub fn image_constraints(&self) -> ImageConstraints {
        ImageConstraints {
            min_width: self.min_width,
            min_height: self.min_height,
            accept: self.accept.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSchema {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSchema {
    pub id: String,
    pub title: String,
    /// Default layout when the theme ships no page-specific single template.
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub sections: Vec<SectionSchema>,
}

impl PageSchema {
    /// All fields of the page across sections, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeSchema {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pages: Vec<PageSchema>,
}

impl ThemeSchema {
    pub fn page(&self, page_id: &str) -> Option<&PageSchema> {
        self.pages.iter().find(|p| p.id == page_id)
    }

    /// Look up a top-level field by `page.section.field`.
    pub fn field(&self, page_id: &str, section_id: &str, field_id: &str) -> Option<&FieldSchema> {
        self.page(page_id)?
            .sections
            .iter()
            .find(|s| s.id == section_id)?
            .fields
            .iter()
            .find(|f| f.id == field_id)
    }

    /// Parse a schema from `theme.json` contents.
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        serde_json::from_str(raw)
            .map_err(|e| CoreError::Validation(format!("Invalid theme schema: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Listing entry returned by [`ThemeCatalog::list`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThemeSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// Themes available on disk.
#[derive(Debug, Clone)]
pub struct ThemeCatalog {
    root: PathBuf,
}

impl ThemeCatalog {
    /// Open the catalog rooted at `root`, which must be an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoreError::Storage(format!(
                "Themes directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every theme with a readable schema, sorted by id.
    ///
    /// Directories with a missing or malformed `theme.json` are skipped with a
    /// warning so one broken theme does not hide the rest.
    pub async fn list(&self) -> Result<Vec<ThemeSummary>, CoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            CoreError::Storage(format!("Failed to read themes directory: {e}"))
        })?;

        let mut themes = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir || validate_theme_id(&id).is_err() {
                continue;
            }
            match self.schema(&id).await {
                Ok(schema) => themes.push(ThemeSummary {
                    id,
                    name: schema.name,
                    description: schema.description,
                }),
                Err(e) => tracing::warn!(theme_id = %id, error = %e, "Skipping unreadable theme"),
            }
        }

        themes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(themes)
    }

    /// Load and parse the schema of theme `id`.
    pub async fn schema(&self, id: &str) -> Result<ThemeSchema, CoreError> {
        validate_theme_id(id)?;
        let path = self.root.join(id).join(SCHEMA_FILE);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| CoreError::ThemeNotFound(id.to_string()))?;
        let mut schema = ThemeSchema::from_json(&raw)?;
        // The directory name is authoritative.
        schema.id = id.to_string();
        Ok(schema)
    }

    /// Directory of theme `id`. Fails with `ThemeNotFound` if it does not exist.
    pub fn theme_dir(&self, id: &str) -> Result<PathBuf, CoreError> {
        validate_theme_id(id)?;
        let dir = self.root.join(id);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(CoreError::ThemeNotFound(id.to_string()))
        }
    }

    /// Whether theme `id` ships the template at `layouts/<relative>`.
    pub fn has_template(&self, id: &str, relative: &str) -> bool {
        self.theme_dir(id)
            .map(|dir| dir.join(LAYOUTS_DIR).join(relative).is_file())
            .unwrap_or(false)
    }
}

/// Theme ids are directory names: lowercase ASCII letters, digits, `-` and `_`.
pub fn validate_theme_id(id: &str) -> Result<(), CoreError> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!("Invalid theme id '{id}'")))
    }
}
