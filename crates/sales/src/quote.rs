use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{ClientId, DomainError, DomainResult, Entity, OrderId, QuoteId, UserId};

use crate::document::{DocumentNumber, DocumentType};
use crate::pricing::{self, Adjustments, LineInput, LineItem, Totals};

/// Quote status. `Converted` is only ever set by conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    InReview,
    Sent,
    ApprovedByClient,
    Rejected,
    Expired,
    Converted,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::InReview => "in_review",
            QuoteStatus::Sent => "sent",
            QuoteStatus::ApprovedByClient => "approved_by_client",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Expired => "expired",
            QuoteStatus::Converted => "converted",
        }
    }
}

impl core::fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuoteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_review" => Ok(QuoteStatus::InReview),
            "sent" => Ok(QuoteStatus::Sent),
            "approved_by_client" => Ok(QuoteStatus::ApprovedByClient),
            "rejected" => Ok(QuoteStatus::Rejected),
            "expired" => Ok(QuoteStatus::Expired),
            "converted" => Ok(QuoteStatus::Converted),
            other => Err(DomainError::validation(format!("unknown quote status '{other}'"))),
        }
    }
}

/// Input for a new quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuote {
    pub client_id: ClientId,
    pub items: Vec<LineInput>,
    #[serde(default)]
    pub adjustments: Adjustments,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of an unconverted quote. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotePatch {
    pub client_id: Option<ClientId>,
    pub items: Option<Vec<LineInput>>,
    pub adjustments: Option<Adjustments>,
    pub status: Option<QuoteStatus>,
    pub valid_until: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}

impl QuotePatch {
    pub fn is_empty(&self) -> bool {
        self == &QuotePatch::default()
    }
}

/// A priced, non-binding proposal to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub number: DocumentNumber,
    pub client_id: ClientId,
    pub items: Vec<LineItem>,
    pub adjustments: Adjustments,
    pub totals: Totals,
    pub status: QuoteStatus,
    pub converted: bool,
    pub order_id: Option<OrderId>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Price and build a quote in `in_review`.
    pub fn create(
        id: QuoteId,
        number: DocumentNumber,
        input: NewQuote,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if number.document_type != DocumentType::Quote {
            return Err(DomainError::validation("quote requires an ORC document number"));
        }
        let (items, totals) = pricing::price(&input.items, &input.adjustments)?;

        Ok(Self {
            id,
            number,
            client_id: input.client_id,
            items,
            adjustments: input.adjustments,
            totals,
            status: QuoteStatus::InReview,
            converted: false,
            order_id: None,
            valid_until: input.valid_until,
            notes: input.notes,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_converted(&self) -> bool {
        self.converted || self.status == QuoteStatus::Converted
    }

    /// Fails with `Immutable` once the quote has produced an order.
    pub fn ensure_mutable(&self) -> DomainResult<()> {
        if self.is_converted() {
            return Err(DomainError::immutable(format!(
                "quote {} was converted and can no longer change",
                self.number
            )));
        }
        Ok(())
    }

    /// Apply `patch`, re-pricing when items or adjustments change.
    ///
    /// Either every field in the patch applies or none does.
    pub fn apply_patch(&mut self, patch: QuotePatch, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_mutable()?;

        if patch.status == Some(QuoteStatus::Converted) {
            return Err(DomainError::validation(
                "status 'converted' can only be set by converting the quote",
            ));
        }

        let repriced = if patch.items.is_some() || patch.adjustments.is_some() {
            let adjustments = patch
                .adjustments
                .clone()
                .unwrap_or_else(|| self.adjustments.clone());
            let items = match &patch.items {
                Some(inputs) => pricing::price_lines(inputs)?,
                None => self.items.clone(),
            };
            let totals = pricing::compute_totals(&items, &adjustments)?;
            Some((items, adjustments, totals))
        } else {
            None
        };

        if let Some((items, adjustments, totals)) = repriced {
            self.items = items;
            self.adjustments = adjustments;
            self.totals = totals;
        }
        if let Some(client_id) = patch.client_id {
            self.client_id = client_id;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(valid_until) = patch.valid_until {
            self.valid_until = valid_until;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Conversion guard: already converted, then terminal statuses.
    pub fn ensure_convertible(&self) -> DomainResult<()> {
        if self.is_converted() {
            return Err(DomainError::AlreadyConverted {
                quote: self.number.to_string(),
            });
        }
        if matches!(self.status, QuoteStatus::Rejected | QuoteStatus::Expired) {
            return Err(DomainError::NotConvertible {
                quote: self.number.to_string(),
                status: self.status.to_string(),
            });
        }
        if self.items.is_empty() {
            return Err(DomainError::validation("quote has no items to convert"));
        }
        Ok(())
    }

    pub fn mark_converted(&mut self, order_id: OrderId, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_convertible()?;
        self.converted = true;
        self.order_id = Some(order_id);
        self.status = QuoteStatus::Converted;
        self.updated_at = now;
        Ok(())
    }
}

impl Entity for Quote {
    type Id = QuoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
