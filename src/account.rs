use std::path::Path;

use anyhow::Context as _;
use reqwest::Method;
use reqwest::multipart::Form;
use serde::Serialize;

use crate::api::{Api, Auth};
use crate::catalog::file_part;
use crate::error::ApiError;
use crate::model::{ContentId, Dashboard, Identity, ProgressEnvelope, ReadingProgress};

const AVATAR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const AVATAR_MAX_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

/// Per-user aggregates, reading progress and profile edits.
#[derive(Clone)]
pub struct Account {
    api: Api,
}

impl Account {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    pub async fn dashboard(&self) -> Result<Dashboard, ApiError> {
        self.api
            .get("/api/users/dashboard", &[], Auth::Required)
            .await
    }

    pub async fn progress(
        &self,
        content_id: ContentId,
    ) -> Result<Option<ReadingProgress>, ApiError> {
        let envelope: ProgressEnvelope = self
            .api
            .get(
                &format!("/api/reading-progress/{content_id}"),
                &[],
                Auth::Required,
            )
            .await?;
        Ok(envelope.progress)
    }

    pub async fn record_progress(
        &self,
        content_id: ContentId,
        progress_percent: f64,
        last_page: u32,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "content_id": content_id,
            "progress_percent": progress_percent.clamp(0.0, 100.0),
            "last_page": last_page,
        });
        let _: serde::de::IgnoredAny = self
            .api
            .put("/api/reading-progress", &body, Auth::Required)
            .await?;
        Ok(())
    }

    /// Saves the profile, then refreshes the session's cached identity.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> anyhow::Result<Identity> {
        if update.name.trim().is_empty() {
            anyhow::bail!("name is required");
        }
        if update.new_password.is_some() && update.current_password.is_none() {
            anyhow::bail!("current password is required to set a new password");
        }

        let auth = if update.current_password.is_some() {
            Auth::Credentials
        } else {
            Auth::Required
        };
        let _: serde::de::IgnoredAny = self.api.put("/api/profile", update, auth).await?;
        let identity = self.api.session().refresh_identity().await?;
        tracing::info!(user_id = identity.id, "profile updated");
        Ok(identity)
    }

    pub async fn upload_avatar(&self, path: &Path) -> anyhow::Result<Identity> {
        check_avatar(path).await?;
        let form = Form::new().part("avatar", file_part(path).await?);
        let _: serde::de::IgnoredAny = self
            .api
            .multipart(Method::POST, "/api/profile/avatar", form, Auth::Required)
            .await?;
        let identity = self.api.session().refresh_identity().await?;
        tracing::info!(user_id = identity.id, "avatar updated");
        Ok(identity)
    }
}

async fn check_avatar(path: &Path) -> anyhow::Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !AVATAR_EXTENSIONS.contains(&extension.as_str()) {
        anyhow::bail!("Invalid file type. Only PNG, JPG, GIF, WEBP allowed.");
    }

    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("stat avatar: {}", path.display()))?;
    if metadata.len() > AVATAR_MAX_BYTES {
        anyhow::bail!("File too large. Maximum size is 5MB.");
    }
    Ok(())
}
