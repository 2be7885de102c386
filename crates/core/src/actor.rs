//! Acting user identity attached to every mutation.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// The authenticated user on whose behalf a mutation runs.
///
/// Authentication happens upstream; this crate only records who acted, for the
/// audit trail on orders and stock movements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
}

impl ActingUser {
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
