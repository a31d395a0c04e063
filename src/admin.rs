use crate::api::{Api, Auth};
use crate::error::ApiError;
use crate::model::{AdminStats, Identity, Role, StatsEnvelope, UserEnvelope, UsersEnvelope};

/// User management and site totals. Every call needs an admin identity; the
/// role is checked locally first and the server still answers 403 on its own.
#[derive(Clone)]
pub struct AdminUsers {
    api: Api,
}

impl AdminUsers {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    /// Newest accounts first.
    pub async fn list(&self) -> Result<Vec<Identity>, ApiError> {
        self.api.require_admin()?;
        let envelope: UsersEnvelope = self.api.get("/api/users", &[], Auth::Required).await?;
        Ok(envelope.users)
    }

    pub async fn stats(&self) -> Result<AdminStats, ApiError> {
        self.api.require_admin()?;
        let envelope: StatsEnvelope = self.api.get("/api/users/stats", &[], Auth::Required).await?;
        Ok(envelope.stats)
    }

    pub async fn update_role(&self, user_id: i64, role: Role) -> Result<Identity, ApiError> {
        self.api.require_admin()?;
        let body = serde_json::json!({ "role": role });
        let envelope: UserEnvelope = self
            .api
            .put(&format!("/api/users/{user_id}"), &body, Auth::Required)
            .await?;
        tracing::info!(user_id, role = %role, "user role updated");
        Ok(envelope.user)
    }

    /// Removes the account with its bookmarks, progress, grants and payments.
    /// The server refuses to delete admins.
    pub async fn delete(&self, user_id: i64) -> Result<(), ApiError> {
        self.api.require_admin()?;
        let _: serde::de::IgnoredAny = self
            .api
            .delete(&format!("/api/users/{user_id}"), Auth::Required)
            .await?;
        tracing::info!(user_id, "user deleted");
        Ok(())
    }
}
