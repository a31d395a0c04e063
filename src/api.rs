use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::model::Identity;
use crate::session::SessionService;
use crate::transport::{Body, Transport};

/// How a call uses the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Attach the token when signed in; the server answers anonymously
    /// otherwise.
    Optional,
    /// Refuse locally without a token.
    Required,
    /// Like `Required`, but the request carries a password of its own. A 401
    /// rejects that password, not the token, so the session is kept.
    Credentials,
}

/// Session-aware client shared by the catalog, payment, bookmark and account
/// services. A 401 on a call that carried a token forces a logout.
#[derive(Clone)]
pub struct Api {
    transport: Transport,
    session: Arc<dyn SessionService>,
}

impl Api {
    pub fn new(transport: Transport, session: Arc<dyn SessionService>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<dyn SessionService> {
        &self.session
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Local role check before admin calls. The server stays authoritative.
    pub fn require_admin(&self) -> Result<Identity, ApiError> {
        match self.session.identity() {
            Some(identity) if identity.is_admin() => Ok(identity),
            Some(_) => Err(ApiError::forbidden("Admin access required")),
            None => Err(ApiError::MissingSession),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: Auth,
    ) -> Result<T, ApiError> {
        self.call(Method::GET, path, query, Body::Empty, auth).await
    }

    pub async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<T, ApiError> {
        self.call(Method::POST, path, &[], Body::json(body)?, auth).await
    }

    pub async fn put<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> Result<T, ApiError> {
        self.call(Method::PUT, path, &[], Body::json(body)?, auth).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, auth: Auth) -> Result<T, ApiError> {
        self.call(Method::DELETE, path, &[], Body::Empty, auth).await
    }

    pub async fn multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: reqwest::multipart::Form,
        auth: Auth,
    ) -> Result<T, ApiError> {
        self.call(method, path, &[], Body::Multipart(form), auth).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Body,
        auth: Auth,
    ) -> Result<T, ApiError> {
        let token = match (auth, self.session.token()) {
            (_, Some(token)) => Some(token),
            (Auth::Optional, None) => None,
            (Auth::Required | Auth::Credentials, None) => return Err(ApiError::MissingSession),
        };

        let result = self
            .transport
            .execute(method, path, query, body, token.as_deref())
            .await;

        match result {
            Err(ApiError::Unauthorized { message }) if auth == Auth::Credentials => {
                tracing::debug!(path, %message, "submitted password rejected");
                Err(ApiError::domain(StatusCode::UNAUTHORIZED, message))
            }
            Err(ApiError::Unauthorized { message }) if token.is_some() => {
                tracing::warn!(path, %message, "token rejected; forcing logout");
                self.session.invalidate().await;
                Err(ApiError::Unauthorized { message })
            }
            other => other,
        }
    }
}
