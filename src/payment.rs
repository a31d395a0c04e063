//! Two-step mobile-money purchase: phone number, then one-time passcode.
//!
//! The server is the only source of truth for amount and content binding.
//! The client keeps nothing but the `payment_id` it was handed, and never
//! dedups flows: two flows for the same content get two payment ids, and the
//! collaborator is responsible for granting access at most once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{Api, Auth};
use crate::error::ApiError;
use crate::model::{
    ContentId, PaymentConfirmation, PaymentId, PaymentInitiation, PaymentRecord, PaymentsEnvelope,
};

#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn initiate(
        &self,
        content_id: ContentId,
        phone_number: &str,
    ) -> Result<PaymentInitiation, ApiError>;

    async fn confirm(&self, payment_id: &PaymentId, otp: &str)
    -> Result<PaymentConfirmation, ApiError>;
}

#[derive(Clone)]
pub struct HttpPayments {
    api: Api,
}

impl HttpPayments {
    pub fn new(api: Api) -> Self {
        Self { api }
    }

    pub async fn history(&self) -> Result<Vec<PaymentRecord>, ApiError> {
        let envelope: PaymentsEnvelope = self
            .api
            .get("/api/payments/history", &[], Auth::Required)
            .await?;
        Ok(envelope.payments)
    }
}

#[async_trait]
impl PaymentService for HttpPayments {
    async fn initiate(
        &self,
        content_id: ContentId,
        phone_number: &str,
    ) -> Result<PaymentInitiation, ApiError> {
        let body = serde_json::json!({
            "content_id": content_id,
            "phone_number": phone_number,
        });
        self.api
            .post("/api/payments/initiate", &body, Auth::Required)
            .await
    }

    async fn confirm(
        &self,
        payment_id: &PaymentId,
        otp: &str,
    ) -> Result<PaymentConfirmation, ApiError> {
        let body = serde_json::json!({
            "payment_id": payment_id,
            "otp": otp,
        });
        self.api
            .post("/api/payments/confirm", &body, Auth::Required)
            .await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    PhoneEntry,
    OtpPending {
        payment_id: PaymentId,
        otp_hint: Option<String>,
    },
    Succeeded {
        payment_id: PaymentId,
    },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Self::PhoneEntry => "phone entry",
            Self::OtpPending { .. } => "otp pending",
            Self::Succeeded { .. } => "succeeded",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("cannot {operation} while in {phase}")]
    OutOfOrder {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl FlowError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

/// One purchase attempt for one content item.
///
/// Failures leave the phase untouched so the same step can be retried; the
/// message is kept in [`PaymentFlow::last_error`] for inline display. OTP
/// retries are unlimited.
pub struct PaymentFlow {
    payments: Arc<dyn PaymentService>,
    content_id: ContentId,
    phase: Phase,
    last_error: Option<String>,
    unlock_delay: Duration,
}

impl fmt::Debug for PaymentFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentFlow")
            .field("content_id", &self.content_id)
            .field("phase", &self.phase)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

impl PaymentFlow {
    pub fn new(
        payments: Arc<dyn PaymentService>,
        content_id: ContentId,
        unlock_delay: Duration,
    ) -> Self {
        Self {
            payments,
            content_id,
            phase: Phase::PhoneEntry,
            last_error: None,
            unlock_delay,
        }
    }

    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn payment_id(&self) -> Option<&PaymentId> {
        match &self.phase {
            Phase::PhoneEntry => None,
            Phase::OtpPending { payment_id, .. } | Phase::Succeeded { payment_id } => {
                Some(payment_id)
            }
        }
    }

    /// Simulation aid from the server. Holding the verification secret on
    /// the verified side defeats the second factor; show it only in demo
    /// setups.
    pub fn otp_hint(&self) -> Option<&str> {
        match &self.phase {
            Phase::OtpPending { otp_hint, .. } => otp_hint.as_deref(),
            _ => None,
        }
    }

    pub async fn initiate(&mut self, phone_number: &str) -> Result<&Phase, FlowError> {
        if !matches!(self.phase, Phase::PhoneEntry) {
            return Err(self.reject("initiate"));
        }
        self.last_error = None;

        let phone_number = phone_number.trim();
        if phone_number.is_empty() {
            return Err(self.fail(FlowError::InvalidInput("Phone number is required")));
        }

        let initiation = match self.payments.initiate(self.content_id, phone_number).await {
            Ok(initiation) => initiation,
            Err(err) => return Err(self.fail(err.into())),
        };

        if initiation.otp_hint.is_some() {
            tracing::warn!(
                payment_id = %initiation.payment_id,
                "server returned the OTP to the client; simulation only"
            );
        }
        tracing::info!(
            content_id = self.content_id,
            payment_id = %initiation.payment_id,
            "payment initiated"
        );

        self.phase = Phase::OtpPending {
            payment_id: initiation.payment_id,
            otp_hint: initiation.otp_hint,
        };
        Ok(&self.phase)
    }

    /// Confirms the pending payment with the code the user received.
    ///
    /// On success the flow is finished and the returned [`Completion`] is
    /// the only way to learn about it: the caller waits on it and then
    /// re-reads the content.
    pub async fn confirm(&mut self, otp: &str) -> Result<Completion, FlowError> {
        let payment_id = match &self.phase {
            Phase::OtpPending { payment_id, .. } => payment_id.clone(),
            _ => return Err(self.reject("confirm")),
        };
        self.last_error = None;

        let otp = otp.trim();
        if otp.is_empty() {
            return Err(self.fail(FlowError::InvalidInput("Confirmation code is required")));
        }

        let confirmation = match self.payments.confirm(&payment_id, otp).await {
            Ok(confirmation) => confirmation,
            Err(err) => return Err(self.fail(err.into())),
        };

        tracing::info!(
            content_id = self.content_id,
            payment_id = %payment_id,
            transaction_id = ?confirmation.transaction_id,
            "payment confirmed"
        );
        self.phase = Phase::Succeeded {
            payment_id: payment_id.clone(),
        };

        Ok(Completion {
            content_id: self.content_id,
            payment_id,
            confirmation,
            delay: self.unlock_delay,
        })
    }

    /// Closes the flow. An unconfirmed payment stays `initiated` on the
    /// server; there is no cancel call, so expiry is the server's job.
    pub fn abandon(self) -> Option<PaymentId> {
        match &self.phase {
            Phase::OtpPending { payment_id, .. } => Some(payment_id.clone()),
            _ => None,
        }
    }

    fn reject(&self, operation: &'static str) -> FlowError {
        let err = FlowError::OutOfOrder {
            operation,
            phase: self.phase.name(),
        };
        tracing::debug!(error = %err, "payment step rejected");
        err
    }

    fn fail(&mut self, err: FlowError) -> FlowError {
        let message = err.user_message();
        tracing::debug!(phase = %self.phase, %message, "payment step failed");
        self.last_error = Some(message);
        err
    }
}

impl Drop for PaymentFlow {
    fn drop(&mut self) {
        if let Phase::OtpPending { payment_id, .. } = &self.phase {
            tracing::info!(
                content_id = self.content_id,
                payment_id = %payment_id,
                "payment abandoned before confirmation"
            );
        }
    }
}

/// Proof that a payment was confirmed, handed to whoever re-checks access.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content_id: ContentId,
    pub payment_id: PaymentId,
    pub confirmation: PaymentConfirmation,
    delay: Duration,
}

impl Completion {
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits out the success display before access is re-read. The wait is
    /// bounded by the configured delay.
    pub async fn settle(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
