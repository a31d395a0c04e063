use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::Method;

use crate::error::ApiError;
use crate::model::{AuthEnvelope, Identity, UserEnvelope};
use crate::token_store::TokenStore;
use crate::transport::{Body, Transport};

/// Process-wide login state.
///
/// Only `login`, `register`, `logout` and `refresh_identity` change the
/// signed-in identity; `invalidate` is the forced logout used when the
/// collaborator rejects the token.
#[async_trait]
pub trait SessionService: Send + Sync {
    fn token(&self) -> Option<String>;
    fn identity(&self) -> Option<Identity>;

    async fn login(&self, email: &str, password: &str) -> Result<Identity, ApiError>;
    async fn register(&self, name: &str, email: &str, password: &str)
    -> Result<Identity, ApiError>;
    async fn logout(&self) -> anyhow::Result<()>;
    async fn refresh_identity(&self) -> Result<Identity, ApiError>;
    async fn invalidate(&self);
}

#[derive(Debug, Clone)]
struct SignedIn {
    token: String,
    identity: Option<Identity>,
}

pub struct Session {
    transport: Transport,
    store: Arc<dyn TokenStore>,
    state: RwLock<Option<SignedIn>>,
}

impl Session {
    pub fn new(transport: Transport, store: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            store,
            state: RwLock::new(None),
        }
    }

    /// Restores the persisted token and resolves its identity.
    ///
    /// A rejected token is discarded. An unreachable server keeps the token
    /// so the next run can try again, but leaves the identity unknown.
    pub async fn rehydrate(
        transport: Transport,
        store: Arc<dyn TokenStore>,
    ) -> anyhow::Result<Self> {
        let session = Self::new(transport, store);
        let Some(token) = session.store.load().await? else {
            tracing::debug!("no persisted token");
            return Ok(session);
        };

        session.set(Some(SignedIn {
            token,
            identity: None,
        }));

        match session.refresh_identity().await {
            Ok(identity) => {
                tracing::debug!(user_id = identity.id, "session restored");
            }
            Err(ApiError::Transport { detail }) => {
                tracing::warn!(%detail, "could not verify persisted token");
            }
            // refresh_identity has already signed out.
            Err(err @ ApiError::Unauthorized { .. }) => {
                tracing::info!(error = %err, "persisted token rejected");
            }
            Err(err) => {
                tracing::info!(error = %err, "persisted token rejected; signing out");
                session.invalidate().await;
            }
        }
        Ok(session)
    }

    fn get(&self) -> Option<SignedIn> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, next: Option<SignedIn>) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    async fn establish(&self, envelope: AuthEnvelope) -> Result<Identity, ApiError> {
        self.store
            .save(&envelope.token)
            .await
            .map_err(|err| ApiError::transport(format!("persist token: {err:#}")))?;
        self.set(Some(SignedIn {
            token: envelope.token,
            identity: Some(envelope.user.clone()),
        }));
        tracing::info!(user_id = envelope.user.id, "signed in");
        Ok(envelope.user)
    }
}

#[async_trait]
impl SessionService for Session {
    fn token(&self) -> Option<String> {
        self.get().map(|s| s.token)
    }

    fn identity(&self) -> Option<Identity> {
        self.get().and_then(|s| s.identity)
    }

    async fn login(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
        let body = Body::json(&serde_json::json!({
            "email": email.trim(),
            "password": password,
        }))?;
        let envelope: AuthEnvelope = self
            .transport
            .execute(Method::POST, "/api/auth/login", &[], body, None)
            .await
            .map_err(|err| match err {
                // No session is involved yet; bad credentials are a form error.
                ApiError::Unauthorized { message } => {
                    ApiError::domain(reqwest::StatusCode::UNAUTHORIZED, message)
                }
                other => other,
            })?;
        self.establish(envelope).await
    }

    async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, ApiError> {
        let body = Body::json(&serde_json::json!({
            "name": name.trim(),
            "email": email.trim(),
            "password": password,
        }))?;
        let envelope: AuthEnvelope = self
            .transport
            .execute(Method::POST, "/api/auth/register", &[], body, None)
            .await?;
        self.establish(envelope).await
    }

    async fn logout(&self) -> anyhow::Result<()> {
        self.set(None);
        self.store.clear().await?;
        tracing::info!("signed out");
        Ok(())
    }

    async fn refresh_identity(&self) -> Result<Identity, ApiError> {
        let token = self.token().ok_or(ApiError::MissingSession)?;
        let result: Result<UserEnvelope, ApiError> = self
            .transport
            .execute(Method::GET, "/api/auth/me", &[], Body::Empty, Some(&token))
            .await;
        let envelope = match result {
            Ok(envelope) => envelope,
            Err(err @ ApiError::Unauthorized { .. }) => {
                self.invalidate().await;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        // A concurrent logout wins over a late refresh.
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.as_mut() {
            Some(signed_in) if signed_in.token == token => {
                signed_in.identity = Some(envelope.user.clone());
            }
            _ => return Err(ApiError::MissingSession),
        }
        Ok(envelope.user)
    }

    async fn invalidate(&self) {
        self.set(None);
        if let Err(err) = self.store.clear().await {
            tracing::warn!(error = %format!("{err:#}"), "failed to clear persisted token");
        }
        tracing::warn!("session invalidated; log in again");
    }
}
