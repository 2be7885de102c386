//! Change notices emitted after a successful commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use salesflow_core::{OrderId, ProductId, QuoteId};

use crate::event::Event;

/// Which kind of entity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Quote,
    Order,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Quote => "quote",
            EntityKind::Order => "order",
        }
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// Cache-invalidation signal for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub entity: EntityKind,
    pub entity_id: Uuid,
    pub change: ChangeKind,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeNotice {
    pub fn new(entity: EntityKind, entity_id: Uuid, change: ChangeKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            entity,
            entity_id,
            change,
            occurred_at,
        }
    }

    pub fn product(id: ProductId, change: ChangeKind, at: DateTime<Utc>) -> Self {
        Self::new(EntityKind::Product, *id.as_uuid(), change, at)
    }

    pub fn quote(id: QuoteId, change: ChangeKind, at: DateTime<Utc>) -> Self {
        Self::new(EntityKind::Quote, *id.as_uuid(), change, at)
    }

    pub fn order(id: OrderId, change: ChangeKind, at: DateTime<Utc>) -> Self {
        Self::new(EntityKind::Order, *id.as_uuid(), change, at)
    }

    /// Cache key of the single entity (`"<entity>:<id>"`).
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.entity.as_str(), self.entity_id)
    }

    /// Pattern covering list/filter pages of the same entity kind.
    pub fn list_pattern(&self) -> String {
        format!("{}s:*", self.entity.as_str())
    }
}

impl Event for ChangeNotice {
    fn event_type(&self) -> &'static str {
        match self.entity {
            EntityKind::Product => "sales.product.changed",
            EntityKind::Quote => "sales.quote.changed",
            EntityKind::Order => "sales.order.changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_follow_entity_kind() {
        let id = ProductId::new();
        let notice = ChangeNotice::product(id, ChangeKind::Updated, Utc::now());

        assert_eq!(notice.cache_key(), format!("product:{id}"));
        assert_eq!(notice.list_pattern(), "products:*");
        assert_eq!(notice.event_type(), "sales.product.changed");
    }

    #[test]
    fn serializes_kinds_in_snake_case() {
        let notice = ChangeNotice::order(OrderId::new(), ChangeKind::Created, Utc::now());
        let json = serde_json::to_value(&notice).unwrap();

        assert_eq!(json["entity"], "order");
        assert_eq!(json["change"], "created");
    }
}
