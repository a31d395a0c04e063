use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::api::{Api, Auth};
use crate::error::ApiError;
use crate::model::{Category, ContentEnvelope, ContentId, ContentListEnvelope, ContentRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub category: Option<Category>,
    pub search: Option<String>,
    pub featured: bool,
}

impl ContentFilter {
    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(category) = self.category {
            query.push(("category", category.as_str().to_owned()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            query.push(("search", search.to_owned()));
        }
        if self.featured {
            query.push(("featured", "1".to_owned()));
        }
        query
    }
}

/// Read side of the content catalog.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Fetches one record; `has_access` and `full_text` reflect the current
    /// session, or an anonymous reader when signed out.
    async fn get(&self, id: ContentId) -> Result<ContentRecord, ApiError>;
    async fn list(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>, ApiError>;
}

/// New catalog item. `full_text` is ignored by the server when a PDF is
/// attached; text is extracted from the PDF instead.
#[derive(Debug, Clone)]
pub struct ContentDraft {
    pub title: String,
    pub author: Option<String>,
    pub category: Category,
    pub description: Option<String>,
    pub preview_text: Option<String>,
    pub full_text: Option<String>,
    pub price: i64,
    pub is_featured: bool,
    pub cover_image: Option<PathBuf>,
    pub pdf_file: Option<PathBuf>,
}

/// Partial update; unset fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "flag")]
    pub is_featured: Option<bool>,
    #[serde(skip)]
    pub cover_image: Option<PathBuf>,
    #[serde(skip)]
    pub pdf_file: Option<PathBuf>,
}

impl ContentPatch {
    fn has_files(&self) -> bool {
        self.cover_image.is_some() || self.pdf_file.is_some()
    }
}

fn flag<S: serde::Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(b) => serializer.serialize_u8(u8::from(*b)),
        None => serializer.serialize_none(),
    }
}

#[derive(Clone)]
pub struct HttpCatalog {
    api: Api,
}

impl HttpCatalog {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    pub fn cover_url(&self, record: &ContentRecord) -> Option<String> {
        record
            .cover_image
            .as_deref()
            .map(|name| self.api.transport().endpoint(&format!("/uploads/{name}")))
    }

    pub async fn create(&self, draft: &ContentDraft) -> anyhow::Result<ContentRecord> {
        self.api.require_admin()?;
        if draft.title.trim().is_empty() {
            anyhow::bail!("title is required");
        }

        let mut form = Form::new()
            .text("title", draft.title.trim().to_owned())
            .text("category", draft.category.as_str())
            .text("price", draft.price.to_string())
            .text("is_featured", u8::from(draft.is_featured).to_string());
        for (name, value) in [
            ("author", &draft.author),
            ("description", &draft.description),
            ("preview_text", &draft.preview_text),
            ("full_text", &draft.full_text),
        ] {
            if let Some(value) = value {
                form = form.text(name, value.clone());
            }
        }
        form = attach_files(form, draft.cover_image.as_deref(), draft.pdf_file.as_deref()).await?;

        let envelope: ContentEnvelope = self
            .api
            .multipart(Method::POST, "/api/content", form, Auth::Required)
            .await?;
        tracing::info!(content_id = envelope.content.id, "content created");
        Ok(envelope.content)
    }

    pub async fn update(
        &self,
        id: ContentId,
        patch: &ContentPatch,
    ) -> anyhow::Result<ContentRecord> {
        self.api.require_admin()?;
        let path = format!("/api/content/{id}");

        let envelope: ContentEnvelope = if patch.has_files() {
            let mut form = Form::new();
            let fields = serde_json::to_value(patch).context("encode content patch")?;
            if let Some(fields) = fields.as_object() {
                for (name, value) in fields {
                    let text = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    form = form.text(name.clone(), text);
                }
            }
            form = attach_files(form, patch.cover_image.as_deref(), patch.pdf_file.as_deref())
                .await?;
            self.api
                .multipart(Method::PUT, &path, form, Auth::Required)
                .await?
        } else {
            self.api.put(&path, patch, Auth::Required).await?
        };
        tracing::info!(content_id = id, "content updated");
        Ok(envelope.content)
    }

    pub async fn delete(&self, id: ContentId) -> anyhow::Result<()> {
        self.api.require_admin()?;
        let _: serde::de::IgnoredAny = self
            .api
            .delete(&format!("/api/content/{id}"), Auth::Required)
            .await?;
        tracing::info!(content_id = id, "content deleted");
        Ok(())
    }
}

#[async_trait]
impl ContentService for HttpCatalog {
    async fn get(&self, id: ContentId) -> Result<ContentRecord, ApiError> {
        let envelope: ContentEnvelope = self
            .api
            .get(&format!("/api/content/{id}"), &[], Auth::Optional)
            .await?;
        Ok(envelope.content)
    }

    async fn list(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>, ApiError> {
        let envelope: ContentListEnvelope = self
            .api
            .get("/api/content", &filter.query(), Auth::Optional)
            .await?;
        Ok(envelope.content)
    }
}

async fn attach_files(
    mut form: Form,
    cover_image: Option<&Path>,
    pdf_file: Option<&Path>,
) -> anyhow::Result<Form> {
    if let Some(path) = cover_image {
        form = form.part("cover_image", file_part(path).await?);
    }
    if let Some(path) = pdf_file {
        let part = file_part(path)
            .await?
            .mime_str("application/pdf")
            .context("set pdf mime type")?;
        form = form.part("pdf_file", part);
    }
    Ok(form)
}

pub(crate) async fn file_part(path: &Path) -> anyhow::Result<Part> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("read upload: {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow::anyhow!("upload has no file name: {}", path.display()))?
        .to_owned();
    Ok(Part::bytes(data).file_name(file_name))
}
