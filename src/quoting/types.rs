//! Quote domain types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Lifecycle status of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    /// Being built by the agent; editable.
    Draft,
    /// Delivered to the client.
    Sent,
    Accepted,
    /// Declined by the client; the agent may revise it.
    Rejected,
    Expired,
    Cancelled,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 6] = [
        QuoteStatus::Draft,
        QuoteStatus::Sent,
        QuoteStatus::Accepted,
        QuoteStatus::Rejected,
        QuoteStatus::Expired,
        QuoteStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "DRAFT",
            QuoteStatus::Sent => "SENT",
            QuoteStatus::Accepted => "ACCEPTED",
            QuoteStatus::Rejected => "REJECTED",
            QuoteStatus::Expired => "EXPIRED",
            QuoteStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation requested on a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Send,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Send => "send",
        })
    }
}

/// A travel agent owning quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
}

/// A versioned quote prepared by an agent for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    /// Human-facing reference, unique across quotes.
    pub reference: String,
    /// Owning agent.
    pub agent_id: String,
    pub title: String,
    pub client_email: String,
    /// Total price in minor currency units.
    pub total_cents: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: QuoteStatus,
    /// Incremented by exactly one on every successful mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Payload for creating a quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuote {
    pub agent_id: String,
    pub title: String,
    pub client_email: String,
    #[serde(default)]
    pub total_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Generated when absent.
    #[serde(default)]
    pub reference: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl NewQuote {
    pub fn validate(&self) -> CoreResult<()> {
        validate_amount(self.total_cents)?;
        validate_currency(&self.currency)
    }

    /// Build the initial DRAFT record at version 1.
    pub fn into_quote(self, now: DateTime<Utc>) -> Quote {
        let id = Uuid::new_v4();
        let reference = self.reference.unwrap_or_else(|| generate_reference(&id));
        Quote {
            id,
            reference,
            updated_by: self.agent_id.clone(),
            agent_id: self.agent_id,
            title: self.title,
            client_email: self.client_email,
            total_cents: self.total_cents,
            currency: self.currency.to_ascii_uppercase(),
            notes: self.notes,
            status: QuoteStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
            sent_at: None,
        }
    }
}

/// Partial update of a quote's editable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl QuotePatch {
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(total) = self.total_cents {
            validate_amount(total)?;
        }
        if let Some(currency) = &self.currency {
            validate_currency(currency)?;
        }
        Ok(())
    }

    /// Apply the patch onto `quote`, leaving version and audit fields alone.
    pub fn apply_to(self, quote: &mut Quote) {
        if let Some(title) = self.title {
            quote.title = title;
        }
        if let Some(client_email) = self.client_email {
            quote.client_email = client_email;
        }
        if let Some(total) = self.total_cents {
            quote.total_cents = total;
        }
        if let Some(currency) = self.currency {
            quote.currency = currency.to_ascii_uppercase();
        }
        if let Some(notes) = self.notes {
            quote.notes = Some(notes);
        }
    }
}

fn validate_amount(total_cents: i64) -> CoreResult<()> {
    if total_cents < 0 {
        return Err(CoreError::validation("total_cents", "must not be negative"));
    }
    Ok(())
}

fn validate_currency(currency: &str) -> CoreResult<()> {
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::validation(
            "currency",
            format!("'{}' is not a three-letter currency code", currency),
        ));
    }
    Ok(())
}

/// Short reference derived from `id`, e.g. `Q-1A2B3C4D`.
pub fn generate_reference(id: &Uuid) -> String {
    let simple = id.simple().to_string();
    format!("Q-{}", simple[..8].to_ascii_uppercase())
}
