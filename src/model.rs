use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ContentId = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Book,
    Guide,
    Article,
    Document,
    /// Any category this client does not know yet.
    #[serde(other)]
    #[value(skip)]
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Guide => "guide",
            Self::Article => "article",
            Self::Document => "document",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog item as seen by one requesting identity.
///
/// `full_text` is only expected when `has_access` is true; readers must check
/// both before showing it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    pub id: ContentId,
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub category: Category,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::amount")]
    pub price: i64,
    #[serde(default, deserialize_with = "de::count")]
    pub page_count: u32,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_featured: bool,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preview_text: Option<String>,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub has_access: bool,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    #[serde(default)]
    pub id: Option<i64>,
    pub content_id: ContentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "de::optional_amount")]
    pub price: Option<i64>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Server-issued payment handle. Opaque to the client; kept in the wire form
/// it arrived in so it is echoed back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum PaymentId {
    Number(i64),
    Text(String),
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentInitiation {
    pub payment_id: PaymentId,
    #[serde(default)]
    pub otp_hint: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "de::optional_amount")]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentConfirmation {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub content_id: Option<ContentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub content_id: ContentId,
    #[serde(default)]
    pub content_title: Option<String>,
    /// Only filled in on the admin stats listing.
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "de::amount")]
    pub amount: i64,
    pub status: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchasedItem {
    pub id: ContentId,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default, deserialize_with = "de::count")]
    pub page_count: u32,
    #[serde(default)]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub last_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dashboard {
    #[serde(default)]
    pub purchased_content: Vec<PurchasedItem>,
    #[serde(default)]
    pub bookmarks_count: u64,
    #[serde(default, deserialize_with = "de::amount")]
    pub total_spent: i64,
    #[serde(default)]
    pub total_purchased: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadingProgress {
    pub content_id: ContentId,
    #[serde(default)]
    pub progress_percent: f64,
    #[serde(default)]
    pub last_page: u32,
    #[serde(default, deserialize_with = "de::timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Site-wide totals for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminStats {
    #[serde(default)]
    pub total_users: u64,
    #[serde(default)]
    pub total_content: u64,
    #[serde(default)]
    pub total_payments: u64,
    #[serde(default, deserialize_with = "de::amount")]
    pub total_revenue: i64,
    #[serde(default)]
    pub recent_payments: Vec<PaymentRecord>,
}

// Response envelopes.

#[derive(Debug, Deserialize)]
pub(crate) struct ContentEnvelope {
    pub content: ContentRecord,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentListEnvelope {
    pub content: Vec<ContentRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: Identity,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthEnvelope {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsersEnvelope {
    pub users: Vec<Identity>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsEnvelope {
    pub stats: AdminStats,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BookmarksEnvelope {
    pub bookmarks: Vec<Bookmark>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentsEnvelope {
    pub payments: Vec<PaymentRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressEnvelope {
    #[serde(default)]
    pub progress: Option<ReadingProgress>,
}

/// Lenient decoders for the collaborator's SQL-shaped JSON: integer flags,
/// REAL prices and `YYYY-MM-DD HH:MM:SS` timestamps.
mod de {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Ok(optional_amount(deserializer)?.unwrap_or(0))
    }

    pub fn optional_amount<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    return Ok(Some(i));
                }
                n.as_f64()
                    .map(|f| Some(f.round() as i64))
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {n}")))
            }
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(|f| Some(f.round() as i64))
                .map_err(|_| serde::de::Error::custom(format!("invalid amount: {s:?}"))),
            Some(other) => Err(serde::de::Error::custom(format!("invalid amount: {other}"))),
        }
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let value = optional_amount(deserializer)?.unwrap_or(0);
        u32::try_from(value.max(0)).map_err(serde::de::Error::custom)
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::Number(n)) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
            Some(other) => Err(serde::de::Error::custom(format!("invalid flag: {other}"))),
        }
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        Ok(parse_timestamp(&raw))
    }

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }
}
