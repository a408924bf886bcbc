// src/models.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    pub id: u64,
    pub name: String,
    /// Arrives as a decimal string ("50.00"), parsed here.
    #[serde(deserialize_with = "de::decimal")]
    pub price: Decimal,
    #[serde(default)]
    pub quantity_available: u32,
    /// Owning event id.
    #[serde(default)]
    pub event: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub title: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub location: String,
    /// Raw date-time as sent by the backend, see [`Event::starts_at`].
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub date: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub image: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub age_restriction: Option<u32>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub ticket_types: Vec<TicketType>,
}

impl Event {
    pub fn starts_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_date_time(&self.date)
    }

    pub fn ticket_type(&self, id: u64) -> Option<&TicketType> {
        self.ticket_types.iter().find(|t| t.id == id)
    }
}

/// Accepts RFC 3339 and the offset-less `YYYY-MM-DDTHH:MM:SS` form (read as UTC).
pub fn parse_date_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Ticket ids come back as numbers from listings and as strings from the
/// purchase endpoint; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(pub String);

impl TicketId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for TicketId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for TicketId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TicketId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::string_or_number(deserializer).map(TicketId)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    Pending,
    Confirmed,
    Cancelled,
    Attended,
    Other(String),
}

impl TicketStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::Confirmed => "confirmed",
            TicketStatus::Cancelled => "cancelled",
            TicketStatus::Attended => "attended",
            TicketStatus::Other(raw) => raw,
        }
    }
}

impl From<&str> for TicketStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => TicketStatus::Pending,
            "confirmed" => TicketStatus::Confirmed,
            "cancelled" | "canceled" => TicketStatus::Cancelled,
            "attended" => TicketStatus::Attended,
            _ => TicketStatus::Other(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
    /// Backend wording: "Payment not processed".
    NotProcessed,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Successful => "successful",
            PaymentStatus::Failed => "failed",
            PaymentStatus::NotProcessed => "payment not processed",
            PaymentStatus::Other(raw) => raw,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::NotProcessed)
    }
}

impl From<&str> for PaymentStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => PaymentStatus::Pending,
            "successful" => PaymentStatus::Successful,
            "failed" => PaymentStatus::Failed,
            "payment not processed" => PaymentStatus::NotProcessed,
            _ => PaymentStatus::Other(value.to_string()),
        }
    }
}

macro_rules! string_enum_serde {
    ($ty:ident) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                match Option::<String>::deserialize(deserializer)? {
                    Some(raw) => Ok($ty::from(raw.as_str())),
                    None => Ok($ty::Pending),
                }
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                $ty::Pending
            }
        }
    };
}

string_enum_serde!(TicketStatus);
string_enum_serde!(PaymentStatus);

/// A purchased ticket, with the event and customer fields the backend
/// denormalizes into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub secret_code: String,
    #[serde(default)]
    pub barcode_token: Option<String>,
    #[serde(default)]
    pub barcode_image: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub ticket_number: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "de::decimal_or_zero")]
    pub ticket_price: Decimal,
    /// Backend total, authoritative when present. Filled in from
    /// `ticket_price * quantity` by [`Ticket::normalize_total`] otherwise.
    #[serde(default, deserialize_with = "de::opt_decimal")]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub issued_at: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub event_title: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub event_date: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub event_location: String,
    #[serde(default)]
    pub event_image: Option<String>,
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub event_contact: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub ticket_type_name: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub customer_first_name: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub customer_last_name: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_avatar: Option<String>,
}

fn one() -> u32 {
    1
}

impl Ticket {
    pub fn total(&self) -> Decimal {
        self.total_price
            .unwrap_or_else(|| self.ticket_price * Decimal::from(self.quantity))
    }

    pub fn normalize_total(&mut self) {
        if self.total_price.is_none() {
            self.total_price = Some(self.ticket_price * Decimal::from(self.quantity));
        }
    }

    pub fn customer_name(&self) -> String {
        format!("{} {}", self.customer_first_name, self.customer_last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub email: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub auth_token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Wire helpers shared by the models and the accessors.
pub mod de {
    use std::str::FromStr;

    use rust_decimal::Decimal;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn parse_decimal(value: &Value) -> Result<Option<Decimal>, String> {
        let text = match value {
            Value::Null => return Ok(None),
            Value::String(s) if s.trim().is_empty() => return Ok(None),
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => return Err(format!("expected decimal, got {other}")),
        };
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map(Some)
            .map_err(|e| format!("invalid decimal {text:?}: {e}"))
    }

    pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_decimal(&value)
            .map_err(D::Error::custom)?
            .ok_or_else(|| D::Error::custom("missing decimal"))
    }

    pub fn decimal_or_zero<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Decimal, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(parse_decimal(&value)
            .map_err(D::Error::custom)?
            .unwrap_or(Decimal::ZERO))
    }

    pub fn opt_decimal<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_decimal(&value).map_err(D::Error::custom)
    }

    /// `null` reads as an empty string.
    pub fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub fn string_or_number<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!("expected id, got {other}"))),
        }
    }
}

impl FromStr for TicketId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TicketId(s.trim().to_string()))
    }
}
