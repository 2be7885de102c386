//! Orders and their status state machine.
//!
//! The transition table lives on [`OrderStatus`]; every status change goes
//! through [`Order::plan_transition`] first, which is the single point of
//! validation. The plan also says which stock effect the infrastructure layer
//! must apply in the same transaction.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use salesflow_core::{ClientId, DomainError, DomainResult, Entity, OrderId, ProductId, QuoteId, UserId};
use salesflow_inventory::MovementDirection;

use crate::document::{DocumentNumber, DocumentType};
use crate::pricing::{self, Adjustments, LineInput, LineItem, Totals};
use crate::quote::Quote;

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingApproval,
    Approved,
    InProduction,
    Picking,
    Invoiced,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::PendingApproval,
        OrderStatus::Approved,
        OrderStatus::InProduction,
        OrderStatus::Picking,
        OrderStatus::Invoiced,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// Adjacency list: the only statuses reachable from `self`.
    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            PendingApproval => &[Approved, Cancelled],
            Approved => &[InProduction, Cancelled],
            InProduction => &[Picking, Cancelled],
            Picking => &[Invoiced],
            Invoiced => &[InTransit],
            InTransit => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Stock was decremented on approval and is still held by the order.
    pub fn holds_stock(self) -> bool {
        matches!(self, OrderStatus::Approved | OrderStatus::InProduction)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Approved => "approved",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Picking => "picking",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::InTransit => "in_transit",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}

/// Inventory side effect bound to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Decrement every item's product (approval).
    Reserve,
    /// Give every item's quantity back (cancellation of a stock-holding order).
    Release,
}

impl StockEffect {
    pub fn direction(self) -> Option<MovementDirection> {
        match self {
            StockEffect::None => None,
            StockEffect::Reserve => Some(MovementDirection::Out),
            StockEffect::Release => Some(MovementDirection::In),
        }
    }
}

/// A validated transition, ready to be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub effect: StockEffect,
}

/// Input for an order created without a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub client_id: ClientId,
    pub items: Vec<LineInput>,
    #[serde(default)]
    pub adjustments: Adjustments,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A binding sales transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub number: DocumentNumber,
    pub client_id: ClientId,
    pub quote_id: Option<QuoteId>,
    pub items: Vec<LineItem>,
    pub adjustments: Adjustments,
    pub totals: Totals,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,

    pub created_by: UserId,
    pub approved_by: Option<UserId>,
    pub cancelled_by: Option<UserId>,

    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub in_production_at: Option<DateTime<Utc>>,
    pub picking_at: Option<DateTime<Utc>>,
    pub invoiced_at: Option<DateTime<Utc>>,
    pub in_transit_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[allow(clippy::too_many_arguments)]
    fn base(
        id: OrderId,
        number: DocumentNumber,
        client_id: ClientId,
        items: Vec<LineItem>,
        adjustments: Adjustments,
        totals: Totals,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if number.document_type != DocumentType::Order {
            return Err(DomainError::validation("order requires a PED document number"));
        }
        Ok(Self {
            id,
            number,
            client_id,
            quote_id: None,
            items,
            adjustments,
            totals,
            status: OrderStatus::PendingApproval,
            notes: None,
            cancel_reason: None,
            created_by,
            approved_by: None,
            cancelled_by: None,
            created_at: now,
            approved_at: None,
            in_production_at: None,
            picking_at: None,
            invoiced_at: None,
            in_transit_at: None,
            delivered_at: None,
            cancelled_at: None,
            updated_at: now,
        })
    }

    /// Copy a quote into a new pending order. Items and monetary fields are
    /// taken verbatim, never re-priced.
    pub fn from_quote(
        id: OrderId,
        number: DocumentNumber,
        quote: &Quote,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut items = quote.items.clone();
        items.sort_by_key(|item| item.position);

        let mut order = Self::base(
            id,
            number,
            quote.client_id,
            items,
            quote.adjustments.clone(),
            quote.totals.clone(),
            created_by,
            now,
        )?;
        order.quote_id = Some(quote.id);
        order.notes = quote.notes.clone();
        Ok(order)
    }

    /// Price and build an order entered directly.
    pub fn create(
        id: OrderId,
        number: DocumentNumber,
        input: NewOrder,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let (items, totals) = pricing::price(&input.items, &input.adjustments)?;
        let mut order = Self::base(
            id,
            number,
            input.client_id,
            items,
            input.adjustments,
            totals,
            created_by,
            now,
        )?;
        order.notes = input.notes;
        Ok(order)
    }

    /// Validate `target` against the adjacency table and derive its stock effect.
    pub fn plan_transition(&self, target: OrderStatus) -> DomainResult<TransitionPlan> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::invalid_transition(self.status, target));
        }

        let effect = match target {
            OrderStatus::Approved => StockEffect::Reserve,
            OrderStatus::Cancelled if self.status.holds_stock() => StockEffect::Release,
            _ => StockEffect::None,
        };

        Ok(TransitionPlan {
            from: self.status,
            to: target,
            effect,
        })
    }

    /// `(product, quantity)` pairs in stored item order.
    pub fn stock_lines(&self) -> Vec<(ProductId, i64)> {
        let mut items: Vec<&LineItem> = self.items.iter().collect();
        items.sort_by_key(|item| item.position);
        items
            .into_iter()
            .map(|item| (item.product_id, item.quantity))
            .collect()
    }

    /// Ledger reason recorded on movements caused by `plan`.
    pub fn movement_reason(&self, plan: &TransitionPlan) -> String {
        match plan.to {
            OrderStatus::Approved => format!("order {} approved", self.number),
            OrderStatus::Cancelled => format!("order {} cancelled", self.number),
            other => format!("order {} {}", self.number, other),
        }
    }

    /// Write the new status and stamp the transition. The plan must come from
    /// [`Order::plan_transition`] on this same state.
    pub fn apply_transition(
        &mut self,
        plan: &TransitionPlan,
        actor: UserId,
        cancel_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if plan.from != self.status {
            return Err(DomainError::conflict(format!(
                "order {} moved from {} while the transition was planned",
                self.number, plan.from
            )));
        }

        match plan.to {
            OrderStatus::Approved => {
                self.approved_at = Some(now);
                self.approved_by = Some(actor);
            }
            OrderStatus::InProduction => self.in_production_at = Some(now),
            OrderStatus::Picking => self.picking_at = Some(now),
            OrderStatus::Invoiced => self.invoiced_at = Some(now),
            OrderStatus::InTransit => self.in_transit_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancelled_by = Some(actor);
                self.cancel_reason = cancel_reason;
            }
            OrderStatus::PendingApproval => {}
        }

        self.status = plan.to;
        self.updated_at = now;
        Ok(())
    }

    /// Only a never-approved order entered directly may be deleted.
    pub fn ensure_deletable(&self) -> DomainResult<()> {
        if self.status != OrderStatus::PendingApproval {
            return Err(DomainError::immutable(format!(
                "order {} is {} and cannot be deleted",
                self.number, self.status
            )));
        }
        if self.quote_id.is_some() {
            return Err(DomainError::immutable(format!(
                "order {} was converted from a quote and cannot be deleted",
                self.number
            )));
        }
        Ok(())
    }

    /// When the order reached `status`, if it did.
    pub fn reached_at(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::PendingApproval => Some(self.created_at),
            OrderStatus::Approved => self.approved_at,
            OrderStatus::InProduction => self.in_production_at,
            OrderStatus::Picking => self.picking_at,
            OrderStatus::Invoiced => self.invoiced_at,
            OrderStatus::InTransit => self.in_transit_at,
            OrderStatus::Delivered => self.delivered_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
