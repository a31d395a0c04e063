use std::sync::Arc;

use async_trait::async_trait;

use crate::api::{Api, Auth};
use crate::error::ApiError;
use crate::model::{Bookmark, BookmarksEnvelope, ContentId};

#[async_trait]
pub trait BookmarkService: Send + Sync {
    async fn list(&self) -> Result<Vec<Bookmark>, ApiError>;
    async fn add(&self, content_id: ContentId) -> Result<(), ApiError>;
    async fn remove(&self, content_id: ContentId) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct HttpBookmarks {
    api: Api,
}

impl HttpBookmarks {
    pub fn new(api: Api) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BookmarkService for HttpBookmarks {
    async fn list(&self) -> Result<Vec<Bookmark>, ApiError> {
        let envelope: BookmarksEnvelope =
            self.api.get("/api/bookmarks", &[], Auth::Required).await?;
        Ok(envelope.bookmarks)
    }

    async fn add(&self, content_id: ContentId) -> Result<(), ApiError> {
        let _: serde::de::IgnoredAny = self
            .api
            .post(
                "/api/bookmarks",
                &serde_json::json!({ "content_id": content_id }),
                Auth::Required,
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, content_id: ContentId) -> Result<(), ApiError> {
        let _: serde::de::IgnoredAny = self
            .api
            .delete(&format!("/api/bookmarks/{content_id}"), Auth::Required)
            .await?;
        Ok(())
    }
}

/// Bookmark button state for one content item.
///
/// Membership comes from the full list rather than a per-item flag, so a
/// change made elsewhere is only noticed on the next `check`. After a toggle
/// the local state is flipped without re-reading the list.
pub struct BookmarkToggle {
    service: Arc<dyn BookmarkService>,
    content_id: ContentId,
    bookmarked: bool,
}

impl BookmarkToggle {
    pub async fn check(
        service: Arc<dyn BookmarkService>,
        content_id: ContentId,
    ) -> Result<Self, ApiError> {
        let bookmarked = service
            .list()
            .await?
            .iter()
            .any(|bookmark| bookmark.content_id == content_id);
        Ok(Self {
            service,
            content_id,
            bookmarked,
        })
    }

    pub fn is_bookmarked(&self) -> bool {
        self.bookmarked
    }

    /// Returns the new membership.
    pub async fn toggle(&mut self) -> Result<bool, ApiError> {
        if self.bookmarked {
            self.service.remove(self.content_id).await?;
        } else {
            self.service.add(self.content_id).await?;
        }
        self.bookmarked = !self.bookmarked;
        tracing::debug!(
            content_id = self.content_id,
            bookmarked = self.bookmarked,
            "bookmark toggled"
        );
        Ok(self.bookmarked)
    }
}
