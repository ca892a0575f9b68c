//! Record types and the data-store collaborator contract.
//!
//! `DataStore` is the read side: a handful of list methods plus provided
//! sum/count/group implementations that a server-backed store may override
//! with native aggregation. `LedgerStore` is the mutation side used by the
//! payment state machine; every call is a single atomic unit of work.
//! `MemoryStore` is the reference implementation backing the tests.

use crate::error::{LedgerError, Result};
use crate::ledger::{derive_state, OrderStatus, PaymentKind};
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderType {
    New,
    Renew,
    Upsell,
    Service,
    Implementation,
}

impl OrderType {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::New => "New purchase",
            Self::Renew => "Renewal",
            Self::Upsell => "Upsell",
            Self::Service => "Professional services",
            Self::Implementation => "Implementation",
        }
    }
}

/// Order-type predicate on a report request. `Renewal` is the legacy alias
/// covering both renewals and upsells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTypeFilter {
    All,
    New,
    Renew,
    Upsell,
    Service,
    Implementation,
    Renewal,
}

impl OrderTypeFilter {
    pub fn matches(self, order_type: OrderType) -> bool {
        match self {
            Self::All => true,
            Self::New => order_type == OrderType::New,
            Self::Renew => order_type == OrderType::Renew,
            Self::Upsell => order_type == OrderType::Upsell,
            Self::Service => order_type == OrderType::Service,
            Self::Implementation => order_type == OrderType::Implementation,
            Self::Renewal => matches!(order_type, OrderType::Renew | OrderType::Upsell),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientSegment {
    Individual,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CostCategory {
    Labor,
    Marketing,
    Cloud,
    Office,
    Travel,
    AiApi,
    Saas,
    Other,
}

impl CostCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Labor => "Labor",
            Self::Marketing => "Marketing",
            Self::Cloud => "Cloud resources",
            Self::Office => "Office supplies",
            Self::Travel => "Travel",
            Self::AiApi => "AI services",
            Self::Saas => "Software subscriptions",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub client_id: String,
    /// Total invoiced amount.
    pub amount: f64,
    /// Net paid balance, maintained by the state machine.
    pub total_paid: f64,
    pub status: OrderStatus,
    pub order_type: OrderType,
    pub created_at: NaiveDateTime,
    /// Settlement time: stamped on the first transition into Paid.
    pub paid_at: Option<NaiveDateTime>,
}

impl OrderRecord {
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        amount: f64,
        order_type: OrderType,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            amount,
            total_paid: 0.0,
            status: OrderStatus::Pending,
            order_type,
            created_at,
            paid_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub order_id: String,
    pub amount: f64,
    pub kind: PaymentKind,
    pub paid_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub segment: ClientSegment,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: String,
    pub amount: f64,
    pub category: CostCategory,
    pub paid_at: NaiveDateTime,
}

/// A trial signup from the optional licensing source. The client link may be
/// missing when the signup never matched a known client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub id: String,
    pub client_id: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Inclusive time filter on a record's timestamp field. Either bound may be
/// open; the pending-amount balance uses an open start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub since: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
}

impl TimeSpan {
    pub fn between(since: NaiveDateTime, until: NaiveDateTime) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
        }
    }

    pub fn up_to(until: NaiveDateTime) -> Self {
        Self {
            since: None,
            until: Some(until),
        }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.since.map_or(true, |s| ts >= s) && self.until.map_or(true, |u| ts <= u)
    }
}

/// Read contract consumed by the aggregation layer.
///
/// The list methods are the minimum a backing store must provide; the
/// sum/count/group methods have default implementations over those lists and
/// exist so a database-backed store can push them down to native aggregation.
pub trait DataStore {
    fn orders(&self) -> Vec<OrderRecord>;
    fn payments(&self) -> Vec<PaymentRecord>;
    fn clients(&self) -> Vec<ClientRecord>;
    fn costs(&self) -> Vec<CostRecord>;

    /// The possibly-absent trial source. `None` means the capability is not
    /// installed and every trial metric contributes zero.
    fn trials(&self) -> Option<Vec<TrialRecord>>;

    fn order(&self, order_id: &str) -> Option<OrderRecord> {
        self.orders().into_iter().find(|o| o.id == order_id)
    }

    fn payments_for(&self, order_id: &str) -> Vec<PaymentRecord> {
        self.payments()
            .into_iter()
            .filter(|p| p.order_id == order_id)
            .collect()
    }

    /// Sum of order amounts by creation time, all statuses included.
    fn sum_order_amounts(&self, span: TimeSpan, filter: OrderTypeFilter) -> f64 {
        self.orders()
            .iter()
            .filter(|o| span.contains(o.created_at) && filter.matches(o.order_type))
            .map(|o| o.amount)
            .sum()
    }

    fn count_orders(&self, span: TimeSpan, filter: OrderTypeFilter) -> usize {
        self.orders()
            .iter()
            .filter(|o| span.contains(o.created_at) && filter.matches(o.order_type))
            .count()
    }

    /// Sum of payment events of one kind, attributed to orders passing the
    /// order-type filter (a join through the owning order).
    fn sum_payments(&self, span: TimeSpan, kind: PaymentKind, filter: OrderTypeFilter) -> f64 {
        let matching: BTreeSet<String> = self
            .orders()
            .into_iter()
            .filter(|o| filter.matches(o.order_type))
            .map(|o| o.id)
            .collect();

        self.payments()
            .iter()
            .filter(|p| p.kind == kind && span.contains(p.paid_at) && matching.contains(&p.order_id))
            .map(|p| p.amount)
            .sum()
    }

    fn count_clients(&self, span: TimeSpan) -> usize {
        self.clients()
            .iter()
            .filter(|c| span.contains(c.created_at))
            .count()
    }

    /// Distinct clients whose orders reached Paid within the span, keyed by
    /// settlement time rather than creation time.
    fn count_deal_clients(&self, span: TimeSpan) -> usize {
        self.orders()
            .iter()
            .filter(|o| o.status == OrderStatus::Paid)
            .filter(|o| o.paid_at.map_or(false, |t| span.contains(t)))
            .map(|o| o.client_id.clone())
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn sum_costs(&self, span: TimeSpan) -> f64 {
        self.costs()
            .iter()
            .filter(|c| span.contains(c.paid_at))
            .map(|c| c.amount)
            .sum()
    }

    fn group_costs_by_category(&self, span: TimeSpan) -> BTreeMap<CostCategory, f64> {
        let mut groups = BTreeMap::new();
        for cost in self.costs() {
            if span.contains(cost.paid_at) {
                *groups.entry(cost.category).or_insert(0.0) += cost.amount;
            }
        }
        groups
    }

    /// Trial signup count; zero when the trial source is absent.
    fn count_trials(&self, span: TimeSpan) -> usize {
        self.trials().map_or(0, |trials| {
            trials.iter().filter(|t| span.contains(t.created_at)).count()
        })
    }
}

/// Mutation contract for the payment state machine.
///
/// Each method is one atomic unit of work: the guard check, the event write
/// and the status recompute commit together or not at all, and
/// implementations must serialize calls touching the same order.
pub trait LedgerStore: DataStore {
    /// Records a collection or refund against an order and recomputes its
    /// state. Fails with `InvalidRefund` when a refund exceeds the net paid
    /// balance and `OrderVoid` when the order has been voided.
    fn record_payment(
        &mut self,
        order_id: &str,
        amount: f64,
        kind: PaymentKind,
        paid_at: NaiveDateTime,
    ) -> Result<(OrderRecord, PaymentRecord)>;

    /// Deletes a payment event and recomputes the order state, which may roll
    /// the status back (e.g. Paid to Partial). Fails with `OrderVoid` when the
    /// order has been voided: a recompute would resurrect it.
    fn delete_payment(&mut self, order_id: &str, payment_id: &str) -> Result<OrderRecord>;

    /// Voids an order. Rejected with `OrderHasActivity` unless the net paid
    /// balance is exactly zero.
    fn void_order(&mut self, order_id: &str) -> Result<OrderRecord>;
}

/// In-memory store. `&mut self` makes each ledger mutation naturally atomic
/// and serialized; a database-backed implementation would use a transaction
/// per call instead.
#[derive(Debug, Default)]
pub struct MemoryStore {
    orders: Vec<OrderRecord>,
    payments: Vec<PaymentRecord>,
    clients: Vec<ClientRecord>,
    costs: Vec<CostRecord>,
    trials: Option<Vec<TrialRecord>>,
    payment_seq: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_order(&mut self, order: OrderRecord) {
        self.orders.push(order);
    }

    pub fn add_client(&mut self, client: ClientRecord) {
        self.clients.push(client);
    }

    pub fn add_cost(&mut self, cost: CostRecord) {
        self.costs.push(cost);
    }

    /// Installs the trial source if absent and records a signup.
    pub fn add_trial(&mut self, trial: TrialRecord) {
        self.trials.get_or_insert_with(Vec::new).push(trial);
    }

    /// Installs an empty trial source (distinct from the source being absent).
    pub fn enable_trial_source(&mut self) {
        self.trials.get_or_insert_with(Vec::new);
    }

    fn order_index(&self, order_id: &str) -> Result<usize> {
        self.orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| LedgerError::NotFound(format!("order {}", order_id)))
    }

    /// Recomputes one order from its full event history and writes the result
    /// back. The settlement stamp uses the latest event time so the recompute
    /// stays deterministic under replay.
    fn recompute_order(&mut self, index: usize) {
        let order_id = self.orders[index].id.clone();
        let events: Vec<PaymentRecord> = self
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();

        let state = derive_state(self.orders[index].amount, &events);
        let settled_at = events
            .iter()
            .map(|e| e.paid_at)
            .max()
            .unwrap_or(self.orders[index].created_at);

        state.apply_to(&mut self.orders[index], settled_at);
        debug!(
            "order {} recomputed: net_paid={} status={:?}",
            order_id, state.net_paid, state.status
        );
    }
}

impl DataStore for MemoryStore {
    fn orders(&self) -> Vec<OrderRecord> {
        self.orders.clone()
    }

    fn payments(&self) -> Vec<PaymentRecord> {
        self.payments.clone()
    }

    fn clients(&self) -> Vec<ClientRecord> {
        self.clients.clone()
    }

    fn costs(&self) -> Vec<CostRecord> {
        self.costs.clone()
    }

    fn trials(&self) -> Option<Vec<TrialRecord>> {
        self.trials.clone()
    }
}

impl LedgerStore for MemoryStore {
    fn record_payment(
        &mut self,
        order_id: &str,
        amount: f64,
        kind: PaymentKind,
        paid_at: NaiveDateTime,
    ) -> Result<(OrderRecord, PaymentRecord)> {
        let index = self.order_index(order_id)?;
        let order = &self.orders[index];

        if order.status == OrderStatus::Void {
            return Err(LedgerError::OrderVoid(order.id.clone()));
        }
        if kind == PaymentKind::Refund && amount > order.total_paid {
            return Err(LedgerError::InvalidRefund {
                requested: amount,
                net_paid: order.total_paid,
            });
        }

        self.payment_seq += 1;
        let payment = PaymentRecord {
            id: format!("PAY-{:06}", self.payment_seq),
            order_id: order_id.to_string(),
            amount,
            kind,
            paid_at,
        };
        self.payments.push(payment.clone());
        self.recompute_order(index);

        Ok((self.orders[index].clone(), payment))
    }

    fn delete_payment(&mut self, order_id: &str, payment_id: &str) -> Result<OrderRecord> {
        let index = self.order_index(order_id)?;
        let order = &self.orders[index];

        if order.status == OrderStatus::Void {
            return Err(LedgerError::OrderVoid(order.id.clone()));
        }

        let position = self
            .payments
            .iter()
            .position(|p| p.id == payment_id && p.order_id == order_id)
            .ok_or_else(|| LedgerError::NotFound(format!("payment {}", payment_id)))?;

        self.payments.remove(position);
        self.recompute_order(index);

        Ok(self.orders[index].clone())
    }

    fn void_order(&mut self, order_id: &str) -> Result<OrderRecord> {
        let index = self.order_index(order_id)?;
        let order = &mut self.orders[index];

        if order.total_paid != 0.0 {
            return Err(LedgerError::OrderHasActivity {
                net_paid: order.total_paid,
            });
        }

        order.status = OrderStatus::Void;
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, month, day)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn store_with_order(amount: f64) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.add_order(OrderRecord::new(
            "ORD-1",
            "C-1",
            amount,
            OrderType::New,
            ts(1, 1),
        ));
        store
    }

    #[test]
    fn test_record_payment_walks_the_state_machine() {
        let mut store = store_with_order(100.0);

        let (order, _) = store
            .record_payment("ORD-1", 40.0, PaymentKind::Collection, ts(1, 2))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.total_paid, 40.0);

        let (order, _) = store
            .record_payment("ORD-1", 60.0, PaymentKind::Collection, ts(1, 3))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.paid_at, Some(ts(1, 3)));

        let (order, _) = store
            .record_payment("ORD-1", 30.0, PaymentKind::Refund, ts(1, 4))
            .unwrap();
        assert_eq!(order.status, OrderStatus::RefundPart);
        assert_eq!(order.total_paid, 70.0);

        let (order, _) = store
            .record_payment("ORD-1", 70.0, PaymentKind::Refund, ts(1, 5))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.total_paid, 0.0);
    }

    #[test]
    fn test_excess_refund_rejected_without_mutation() {
        let mut store = store_with_order(100.0);
        store
            .record_payment("ORD-1", 40.0, PaymentKind::Collection, ts(1, 2))
            .unwrap();

        let err = store
            .record_payment("ORD-1", 1000.0, PaymentKind::Refund, ts(1, 3))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidRefund { .. }));

        let order = store.order("ORD-1").unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.total_paid, 40.0);
        assert_eq!(store.payments_for("ORD-1").len(), 1);
    }

    #[test]
    fn test_void_rejected_with_activity() {
        let mut store = store_with_order(100.0);
        store
            .record_payment("ORD-1", 40.0, PaymentKind::Collection, ts(1, 2))
            .unwrap();

        let err = store.void_order("ORD-1").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::OrderHasActivity { net_paid } if net_paid == 40.0
        ));
    }

    #[test]
    fn test_void_then_no_further_activity() {
        let mut store = store_with_order(100.0);
        let order = store.void_order("ORD-1").unwrap();
        assert_eq!(order.status, OrderStatus::Void);

        let err = store
            .record_payment("ORD-1", 10.0, PaymentKind::Collection, ts(1, 2))
            .unwrap_err();
        assert!(matches!(err, LedgerError::OrderVoid(_)));
    }

    #[test]
    fn test_void_survives_payment_deletion() {
        // Fully refunded order: net paid is zero, so voiding is admitted.
        let mut store = store_with_order(100.0);
        store
            .record_payment("ORD-1", 100.0, PaymentKind::Collection, ts(1, 2))
            .unwrap();
        let (_, refund) = store
            .record_payment("ORD-1", 100.0, PaymentKind::Refund, ts(1, 3))
            .unwrap();
        store.void_order("ORD-1").unwrap();

        // Deleting the refund would recompute the order back to Paid.
        let err = store.delete_payment("ORD-1", &refund.id).unwrap_err();
        assert!(matches!(err, LedgerError::OrderVoid(_)));
        assert_eq!(store.order("ORD-1").unwrap().status, OrderStatus::Void);
    }

    #[test]
    fn test_delete_payment_rolls_state_back() {
        let mut store = store_with_order(100.0);
        store
            .record_payment("ORD-1", 40.0, PaymentKind::Collection, ts(1, 2))
            .unwrap();
        let (order, full) = store
            .record_payment("ORD-1", 60.0, PaymentKind::Collection, ts(1, 3))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);

        let order = store.delete_payment("ORD-1", &full.id).unwrap();
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.total_paid, 40.0);

        let first = store.payments_for("ORD-1")[0].id.clone();
        let order = store.delete_payment("ORD-1", &first).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.paid_at, None);
    }

    #[test]
    fn test_unknown_order_and_payment_are_not_found() {
        let mut store = store_with_order(100.0);
        assert!(matches!(
            store.record_payment("ORD-9", 1.0, PaymentKind::Collection, ts(1, 2)),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_payment("ORD-1", "PAY-404"),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(
            store.void_order("ORD-9"),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_absent_trial_source_counts_zero() {
        let store = store_with_order(100.0);
        assert!(store.trials().is_none());
        assert_eq!(store.count_trials(TimeSpan::up_to(ts(12, 31))), 0);
    }

    #[test]
    fn test_filter_joins_payments_through_orders() {
        let mut store = MemoryStore::new();
        store.add_order(OrderRecord::new(
            "ORD-N",
            "C-1",
            100.0,
            OrderType::New,
            ts(1, 1),
        ));
        store.add_order(OrderRecord::new(
            "ORD-R",
            "C-2",
            200.0,
            OrderType::Renew,
            ts(1, 1),
        ));
        store
            .record_payment("ORD-N", 100.0, PaymentKind::Collection, ts(1, 5))
            .unwrap();
        store
            .record_payment("ORD-R", 150.0, PaymentKind::Collection, ts(1, 6))
            .unwrap();

        let span = TimeSpan::between(ts(1, 1), ts(1, 31));
        assert_eq!(
            store.sum_payments(span, PaymentKind::Collection, OrderTypeFilter::New),
            100.0
        );
        assert_eq!(
            store.sum_payments(span, PaymentKind::Collection, OrderTypeFilter::Renewal),
            150.0
        );
        assert_eq!(
            store.sum_payments(span, PaymentKind::Collection, OrderTypeFilter::All),
            250.0
        );
    }
}
