use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// What an authenticated caller is allowed to do, resolved once when the
/// token is issued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Customer,
    TaxiDriver,
}

/// The authenticated caller, passed explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub capability: Capability,
}

impl Identity {
    pub fn new(user_id: UserId, capability: Capability) -> Self {
        Self {
            user_id,
            capability,
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capability == capability
    }
}
