//! Order payment state machine.
//!
//! An order's financial state is never tracked incrementally: every event
//! insert or delete recomputes `net_paid` and the status as a pure fold over
//! the full event history, which makes the result idempotent and independent
//! of the order events were applied in.

use crate::store::{OrderRecord, PaymentRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Collection,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Partial,
    Paid,
    RefundPart,
    Refunded,
    Void,
    Cancelled,
}

impl OrderStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "Pending payment",
            Self::Partial => "Partially paid",
            Self::Paid => "Paid",
            Self::RefundPart => "Partially refunded",
            Self::Refunded => "Refunded",
            Self::Void => "Void",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Void and cancelled orders carry no sales value.
    pub fn counts_as_sale(self) -> bool {
        !matches!(self, Self::Void | Self::Cancelled)
    }
}

/// Derived financial state of a single order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerState {
    pub net_paid: f64,
    pub has_refund: bool,
    pub status: OrderStatus,
}

/// Folds the full event history into the current state.
pub fn derive_state(total_amount: f64, events: &[PaymentRecord]) -> LedgerState {
    let mut collected = 0.0;
    let mut refunded = 0.0;
    for event in events {
        match event.kind {
            PaymentKind::Collection => collected += event.amount,
            PaymentKind::Refund => refunded += event.amount,
        }
    }

    let net_paid = collected - refunded;
    let has_refund = events.iter().any(|e| e.kind == PaymentKind::Refund);

    let status = if net_paid >= total_amount {
        OrderStatus::Paid
    } else if net_paid > 0.0 {
        if has_refund {
            OrderStatus::RefundPart
        } else {
            OrderStatus::Partial
        }
    } else if has_refund {
        OrderStatus::Refunded
    } else {
        OrderStatus::Pending
    };

    LedgerState {
        net_paid,
        has_refund,
        status,
    }
}

impl LedgerState {
    /// Writes the derived state back onto the order.
    ///
    /// `settled_at` stamps `paid_at` on the first transition into Paid and is
    /// never overwritten afterwards; falling back to Pending clears it.
    pub fn apply_to(&self, order: &mut OrderRecord, settled_at: NaiveDateTime) {
        order.total_paid = self.net_paid;
        order.status = self.status;

        match self.status {
            OrderStatus::Paid => {
                if order.paid_at.is_none() {
                    order.paid_at = Some(settled_at);
                }
            }
            OrderStatus::Pending => {
                order.paid_at = None;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{OrderRecord, OrderType};
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn event(id: &str, amount: f64, kind: PaymentKind, day: u32) -> PaymentRecord {
        PaymentRecord {
            id: id.to_string(),
            order_id: "ORD-1".to_string(),
            amount,
            kind,
            paid_at: ts(day),
        }
    }

    #[test]
    fn test_status_progression_over_event_history() {
        let mut events = Vec::new();
        let total = 100.0;

        events.push(event("p1", 40.0, PaymentKind::Collection, 1));
        let state = derive_state(total, &events);
        assert_eq!(state.status, OrderStatus::Partial);
        assert_eq!(state.net_paid, 40.0);

        events.push(event("p2", 60.0, PaymentKind::Collection, 2));
        let state = derive_state(total, &events);
        assert_eq!(state.status, OrderStatus::Paid);
        assert_eq!(state.net_paid, 100.0);

        events.push(event("p3", 30.0, PaymentKind::Refund, 3));
        let state = derive_state(total, &events);
        assert_eq!(state.status, OrderStatus::RefundPart);
        assert_eq!(state.net_paid, 70.0);

        events.push(event("p4", 70.0, PaymentKind::Refund, 4));
        let state = derive_state(total, &events);
        assert_eq!(state.status, OrderStatus::Refunded);
        assert_eq!(state.net_paid, 0.0);
        assert!(state.has_refund);
    }

    #[test]
    fn test_fold_is_order_independent() {
        let forward = vec![
            event("p1", 40.0, PaymentKind::Collection, 1),
            event("p2", 60.0, PaymentKind::Collection, 2),
            event("p3", 30.0, PaymentKind::Refund, 3),
        ];
        let mut shuffled = forward.clone();
        shuffled.reverse();

        assert_eq!(derive_state(100.0, &forward), derive_state(100.0, &shuffled));
    }

    #[test]
    fn test_empty_history_is_pending() {
        let state = derive_state(100.0, &[]);
        assert_eq!(state.status, OrderStatus::Pending);
        assert_eq!(state.net_paid, 0.0);
        assert!(!state.has_refund);
    }

    #[test]
    fn test_overpayment_is_paid() {
        let events = vec![event("p1", 120.0, PaymentKind::Collection, 1)];
        let state = derive_state(100.0, &events);
        assert_eq!(state.status, OrderStatus::Paid);
        assert_eq!(state.net_paid, 120.0);
    }

    #[test]
    fn test_apply_to_stamps_paid_at_once_and_clears_on_pending() {
        let mut order = OrderRecord {
            id: "ORD-1".to_string(),
            client_id: "C-1".to_string(),
            amount: 100.0,
            total_paid: 0.0,
            status: OrderStatus::Pending,
            order_type: OrderType::New,
            created_at: ts(1),
            paid_at: None,
        };

        let paid = LedgerState {
            net_paid: 100.0,
            has_refund: false,
            status: OrderStatus::Paid,
        };
        paid.apply_to(&mut order, ts(2));
        assert_eq!(order.paid_at, Some(ts(2)));

        // A later recompute into Paid must not move the stamp.
        paid.apply_to(&mut order, ts(5));
        assert_eq!(order.paid_at, Some(ts(2)));

        let pending = LedgerState {
            net_paid: 0.0,
            has_refund: false,
            status: OrderStatus::Pending,
        };
        pending.apply_to(&mut order, ts(6));
        assert_eq!(order.paid_at, None);
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
