use std::sync::Arc;
use std::time::Duration;

use crate::catalog::ContentService;
use crate::error::ApiError;
use crate::model::{ContentId, ContentRecord};
use crate::payment::{Completion, PaymentFlow, PaymentService};
use crate::session::SessionService;

/// Session-local reading size. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSize(u8);

impl FontSize {
    pub const MIN: u8 = 12;
    pub const MAX: u8 = 24;
    pub const STEP: u8 = 2;

    pub fn new(size: u8) -> Self {
        Self(size.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn larger(self) -> Self {
        Self::new(self.0.saturating_add(Self::STEP))
    }

    pub fn smaller(self) -> Self {
        Self::new(self.0.saturating_sub(Self::STEP))
    }
}

impl Default for FontSize {
    fn default() -> Self {
        Self(16)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderView {
    FullText {
        title: String,
        paragraphs: Vec<String>,
        font_size: FontSize,
    },
    Paywall {
        title: String,
        preview: Vec<String>,
        price_label: String,
        call_to_action: String,
    },
}

impl ReaderView {
    pub fn is_full_text(&self) -> bool {
        matches!(self, Self::FullText { .. })
    }
}

/// Chooses between the full text and the paywall.
///
/// Full text requires both the server's `has_access` and a non-empty
/// `full_text`; anything else falls back to the preview, so a server that
/// leaks `full_text` to an unentitled reader still shows the paywall.
pub fn render(record: &ContentRecord, font_size: FontSize, signed_in: bool) -> ReaderView {
    let title = record.title.clone();
    if record.has_access
        && let Some(full_text) = record.full_text.as_deref()
        && !full_text.trim().is_empty()
    {
        return ReaderView::FullText {
            title,
            paragraphs: paragraphs(full_text),
            font_size,
        };
    }

    let price_label = format_price(record.price);
    let call_to_action = if signed_in {
        format!("Unlock for {price_label}")
    } else {
        "Login to Purchase".to_owned()
    };
    ReaderView::Paywall {
        title,
        preview: paragraphs(record.preview_text.as_deref().unwrap_or_default()),
        price_label,
        call_to_action,
    }
}

/// Splits text into paragraphs on blank lines. Lines inside a paragraph are
/// kept as written.
pub fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
            continue;
        }
        current.push(line.trim_end());
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

/// `5000` -> `UGX 5,000`.
pub fn format_price(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("UGX {sign}{grouped}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReaderState<'a> {
    Loading,
    Ready(&'a ContentRecord),
    Failed { message: &'a str },
}

/// Entitlement-aware view of one content item.
///
/// Access is never patched locally: after a purchase the record is fetched
/// again and the view is rebuilt from what the server says.
pub struct Reader {
    content: Arc<dyn ContentService>,
    session: Arc<dyn SessionService>,
    content_id: ContentId,
    record: Option<ContentRecord>,
    failure: Option<String>,
    font_size: FontSize,
}

impl Reader {
    pub fn new(
        content: Arc<dyn ContentService>,
        session: Arc<dyn SessionService>,
        content_id: ContentId,
    ) -> Self {
        Self {
            content,
            session,
            content_id,
            record: None,
            failure: None,
            font_size: FontSize::default(),
        }
    }

    pub fn content_id(&self) -> ContentId {
        self.content_id
    }

    pub fn state(&self) -> ReaderState<'_> {
        match (&self.record, &self.failure) {
            (Some(record), _) => ReaderState::Ready(record),
            (None, Some(message)) => ReaderState::Failed { message },
            (None, None) => ReaderState::Loading,
        }
    }

    pub fn record(&self) -> Option<&ContentRecord> {
        self.record.as_ref()
    }

    pub fn font_size(&self) -> FontSize {
        self.font_size
    }

    pub fn set_font_size(&mut self, font_size: FontSize) {
        self.font_size = font_size;
    }

    pub fn increase_font(&mut self) -> FontSize {
        self.font_size = self.font_size.larger();
        self.font_size
    }

    pub fn decrease_font(&mut self) -> FontSize {
        self.font_size = self.font_size.smaller();
        self.font_size
    }

    /// Fetches the record for the current session. A failure replaces any
    /// previously loaded record so stale access is never shown.
    pub async fn load(&mut self) -> Result<&ContentRecord, ApiError> {
        self.record = None;
        self.failure = None;
        match self.content.get(self.content_id).await {
            Ok(record) => {
                tracing::debug!(
                    content_id = self.content_id,
                    has_access = record.has_access,
                    "content loaded"
                );
                Ok(self.record.insert(record))
            }
            Err(err) => {
                tracing::warn!(content_id = self.content_id, error = %err, "content load failed");
                self.failure = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Reruns a failed load.
    pub async fn retry(&mut self) -> Result<&ContentRecord, ApiError> {
        self.load().await
    }

    pub fn view(&self) -> Option<ReaderView> {
        let record = self.record()?;
        Some(render(record, self.font_size, self.session.token().is_some()))
    }

    /// Opens a purchase for the loaded item. Requires a signed-in user.
    pub fn start_purchase(
        &self,
        payments: Arc<dyn PaymentService>,
        unlock_delay: Duration,
    ) -> Result<PaymentFlow, ApiError> {
        if self.session.token().is_none() {
            return Err(ApiError::MissingSession);
        }
        Ok(PaymentFlow::new(payments, self.content_id, unlock_delay))
    }

    /// Closes the loop after a confirmed payment: wait out the success
    /// display, then fetch the record once more.
    pub async fn on_payment_succeeded(
        &mut self,
        completion: &Completion,
    ) -> Result<&ContentRecord, ApiError> {
        if completion.content_id != self.content_id {
            tracing::warn!(
                reader = self.content_id,
                paid = completion.content_id,
                "completion for another item; reloading anyway"
            );
        }
        completion.settle().await;
        let record = self.load().await?;
        if !record.has_access {
            tracing::warn!(
                content_id = record.id,
                payment_id = %completion.payment_id,
                "payment confirmed but access not granted yet"
            );
        }
        Ok(record)
    }
}
