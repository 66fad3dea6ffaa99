//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// Pending ──► Completed   (payment accepted, reservations committed)
///    │
///    └──────► Canceled    (buyer cancel or expiration, reservations released)
/// ```
///
/// Both `Completed` and `Canceled` are terminal; no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment; reservations are held against the stock ledger.
    #[default]
    Pending,

    /// Payment accepted and physical stock consumed (terminal).
    Completed,

    /// Cancelled by the buyer or by expiration; reservations returned (terminal).
    Canceled,
}

impl OrderStatus {
    /// Returns true if the order can be paid in this status.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Returns the status as its stored text form.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Parses the stored text form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "completed" => Some(OrderStatus::Completed),
            "canceled" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn only_pending_can_pay() {
        assert!(OrderStatus::Pending.can_pay());
        assert!(!OrderStatus::Completed.can_pay());
        assert!(!OrderStatus::Canceled.can_pay());
    }

    #[test]
    fn only_pending_can_cancel() {
        assert!(OrderStatus::Pending.can_cancel());
        assert!(!OrderStatus::Completed.can_cancel());
        assert!(!OrderStatus::Canceled.can_cancel());
    }

    #[test]
    fn terminal_statuses() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
    }

    #[test]
    fn text_roundtrip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Completed,
            OrderStatus::Canceled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("shipped"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
