use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

pub type OrderId = i64;

pub const LOCATION_MAX_LEN: usize = 255;

/// Ride status, serialized as its numeric code (1, 2, 3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(into = "u8", try_from = "u8")]
pub enum OrderStatus {
    #[default]
    Waiting,
    Accepted,
    Canceled,
}

impl OrderStatus {
    pub fn code(self) -> u8 {
        match self {
            OrderStatus::Waiting => 1,
            OrderStatus::Accepted => 2,
            OrderStatus::Canceled => 3,
        }
    }
}

impl From<OrderStatus> for u8 {
    fn from(status: OrderStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for OrderStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OrderStatus::Waiting),
            2 => Ok(OrderStatus::Accepted),
            3 => Ok(OrderStatus::Canceled),
            other => Err(format!("unknown order status {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub customer: UserId,
    pub location_from: String,
    pub location_to: String,
    pub order_time: DateTime<Utc>,
    pub status: OrderStatus,
    pub taxi_driver: Option<UserId>,
}

/// A requested move along the order state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Accept { driver: UserId },
    Cancel,
}

impl Transition {
    pub fn target(self) -> OrderStatus {
        match self {
            Transition::Accept { .. } => OrderStatus::Accepted,
            Transition::Cancel => OrderStatus::Canceled,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("order is {current:?}, cannot move to {target:?}")]
pub struct InvalidTransition {
    pub current: OrderStatus,
    pub target: OrderStatus,
}

impl Order {
    /// Applies `transition` in place. Only `Waiting` orders may move.
    pub fn apply(&mut self, transition: Transition) -> Result<(), InvalidTransition> {
        if self.status != OrderStatus::Waiting {
            return Err(InvalidTransition {
                current: self.status,
                target: transition.target(),
            });
        }
        if let Transition::Accept { driver } = transition {
            self.taxi_driver = Some(driver);
        }
        self.status = transition.target();
        Ok(())
    }
}

/// Result of a transactional transition attempt in a repository.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(Order),
    Rejected(Order),
    Missing,
}

/// Validated input for a fresh order. Status and driver are never taken
/// from the caller.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: UserId,
    pub location_from: String,
    pub location_to: String,
    pub order_time: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(
        customer: UserId,
        location_from: String,
        location_to: String,
    ) -> anyhow::Result<Self> {
        for (field, value) in [("location_from", &location_from), ("location_to", &location_to)] {
            if value.trim().is_empty() {
                anyhow::bail!("{field} empty");
            }
            if value.chars().count() > LOCATION_MAX_LEN {
                anyhow::bail!("{field} longer than {LOCATION_MAX_LEN} characters");
            }
        }
        Ok(Self {
            customer,
            location_from,
            location_to,
            order_time: Utc::now(),
        })
    }

    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            customer: self.customer,
            location_from: self.location_from,
            location_to: self.location_to,
            order_time: self.order_time,
            status: OrderStatus::Waiting,
            taxi_driver: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting_order() -> Order {
        NewOrder::new(7, "A".into(), "B".into())
            .unwrap()
            .into_order(1)
    }

    #[test]
    fn new_order_starts_waiting_without_driver() {
        let order = waiting_order();
        assert_eq!(order.status, OrderStatus::Waiting);
        assert_eq!(order.taxi_driver, None);
        assert_eq!(order.customer, 7);
    }

    #[test]
    fn validation_errors() {
        assert!(NewOrder::new(1, "".into(), "B".into()).is_err());
        assert!(NewOrder::new(1, "A".into(), "   ".into()).is_err());
        assert!(NewOrder::new(1, "A".into(), "x".repeat(LOCATION_MAX_LEN + 1)).is_err());
        assert!(NewOrder::new(1, "A".into(), "x".repeat(LOCATION_MAX_LEN)).is_ok());
    }

    #[test]
    fn accept_assigns_driver() {
        let mut order = waiting_order();
        order.apply(Transition::Accept { driver: 42 }).unwrap();
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.taxi_driver, Some(42));
    }

    #[test]
    fn cancel_leaves_driver_unset() {
        let mut order = waiting_order();
        order.apply(Transition::Cancel).unwrap();
        assert_eq!(order.status, OrderStatus::Canceled);
        assert_eq!(order.taxi_driver, None);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut accepted = waiting_order();
        accepted.apply(Transition::Accept { driver: 42 }).unwrap();
        let err = accepted.apply(Transition::Cancel).unwrap_err();
        assert_eq!(err.current, OrderStatus::Accepted);
        assert_eq!(accepted.status, OrderStatus::Accepted);
        assert!(accepted.apply(Transition::Accept { driver: 43 }).is_err());
        assert_eq!(accepted.taxi_driver, Some(42));

        let mut canceled = waiting_order();
        canceled.apply(Transition::Cancel).unwrap();
        assert!(canceled.apply(Transition::Accept { driver: 42 }).is_err());
        assert!(canceled.apply(Transition::Cancel).is_err());
        assert_eq!(canceled.taxi_driver, None);
    }

    #[test]
    fn status_serializes_as_code() {
        let json = serde_json::to_string(&OrderStatus::Accepted).unwrap();
        assert_eq!(json, "2");
        let parsed: OrderStatus = serde_json::from_str("3").unwrap();
        assert_eq!(parsed, OrderStatus::Canceled);
        assert!(serde_json::from_str::<OrderStatus>("4").is_err());
    }
}
