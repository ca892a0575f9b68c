//! Buckets heterogeneous business events into a resolved window's labels and
//! computes the windowed and cumulative sums the report layer composes.

use crate::ledger::PaymentKind;
use crate::period::ResolvedRange;
use crate::store::{ClientSegment, DataStore, OrderTypeFilter, TimeSpan};
use chrono::NaiveDateTime;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Per-bucket split of a value by client segment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SegmentSplit {
    pub enterprise: f64,
    pub individual: f64,
}

pub struct MetricAggregator<'a, S: DataStore> {
    store: &'a S,
}

impl<'a, S: DataStore> MetricAggregator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn window(range: &ResolvedRange) -> TimeSpan {
        TimeSpan::between(range.start, range.end)
    }

    /// Order amounts per bucket by creation time. Void and cancelled orders
    /// carry no sales value.
    pub fn sales_by_bucket(
        &self,
        range: &ResolvedRange,
        filter: OrderTypeFilter,
    ) -> BTreeMap<String, f64> {
        let mut buckets = zeroed(range, 0.0f64);
        for order in self.store.orders() {
            if order.status.counts_as_sale() && filter.matches(order.order_type) {
                add_amount(&mut buckets, range, order.created_at, order.amount);
            }
        }
        buckets
    }

    /// Collection amounts per bucket with refunds subtracted in place, joined
    /// to the filtered order set.
    pub fn net_collections_by_bucket(
        &self,
        range: &ResolvedRange,
        filter: OrderTypeFilter,
    ) -> BTreeMap<String, f64> {
        let order_types: HashMap<String, _> = self
            .store
            .orders()
            .into_iter()
            .map(|o| (o.id, o.order_type))
            .collect();

        let mut buckets = zeroed(range, 0.0f64);
        for payment in self.store.payments() {
            let passes = order_types
                .get(&payment.order_id)
                .map_or(false, |t| filter.matches(*t));
            if !passes {
                continue;
            }
            let signed = match payment.kind {
                PaymentKind::Collection => payment.amount,
                PaymentKind::Refund => -payment.amount,
            };
            add_amount(&mut buckets, range, payment.paid_at, signed);
        }
        buckets
    }

    /// Trial signup counts per bucket; all zero when the source is absent.
    /// The order-type filter never applies here (trials carry no such
    /// dimension).
    pub fn trials_by_bucket(&self, range: &ResolvedRange) -> BTreeMap<String, u64> {
        let mut buckets = zeroed(range, 0u64);
        for trial in self.store.trials().unwrap_or_default() {
            add_count(&mut buckets, range, trial.created_at);
        }
        buckets
    }

    /// New-client counts per bucket by creation time.
    pub fn clients_by_bucket(&self, range: &ResolvedRange) -> BTreeMap<String, u64> {
        let mut buckets = zeroed(range, 0u64);
        for client in self.store.clients() {
            add_count(&mut buckets, range, client.created_at);
        }
        buckets
    }

    /// Sales per bucket split by the owning client's segment.
    pub fn sales_split_by_segment(
        &self,
        range: &ResolvedRange,
        filter: OrderTypeFilter,
    ) -> BTreeMap<String, SegmentSplit> {
        let segments = self.client_segments();
        let mut buckets = zeroed(range, SegmentSplit::default());

        for order in self.store.orders() {
            if !order.status.counts_as_sale() || !filter.matches(order.order_type) {
                continue;
            }
            if let Some(split) = bucket_slot(&mut buckets, range, order.created_at) {
                match segments.get(&order.client_id) {
                    Some(ClientSegment::Enterprise) => split.enterprise += order.amount,
                    _ => split.individual += order.amount,
                }
            }
        }
        buckets
    }

    /// Trial counts per bucket split by segment. Trials without a client link
    /// count as individual.
    pub fn trials_split_by_segment(
        &self,
        range: &ResolvedRange,
    ) -> BTreeMap<String, (u64, u64)> {
        let segments = self.client_segments();
        let mut buckets = zeroed(range, (0u64, 0u64));

        for trial in self.store.trials().unwrap_or_default() {
            if let Some((enterprise, individual)) =
                bucket_slot(&mut buckets, range, trial.created_at)
            {
                let segment = trial
                    .client_id
                    .as_ref()
                    .and_then(|id| segments.get(id))
                    .copied();
                match segment {
                    Some(ClientSegment::Enterprise) => *enterprise += 1,
                    _ => *individual += 1,
                }
            }
        }
        buckets
    }

    /// Net income (collections minus refunds) per bucket, unfiltered.
    pub fn net_income_by_bucket(&self, range: &ResolvedRange) -> BTreeMap<String, f64> {
        self.net_collections_by_bucket(range, OrderTypeFilter::All)
    }

    /// Operating costs per bucket by payment date.
    pub fn costs_by_bucket(&self, range: &ResolvedRange) -> BTreeMap<String, f64> {
        let mut buckets = zeroed(range, 0.0f64);
        for cost in self.store.costs() {
            add_amount(&mut buckets, range, cost.paid_at, cost.amount);
        }
        buckets
    }

    /// Windowed sales total by creation time, void/cancelled excluded.
    pub fn sum_sales(&self, span: TimeSpan, filter: OrderTypeFilter) -> f64 {
        self.store
            .orders()
            .iter()
            .filter(|o| {
                o.status.counts_as_sale()
                    && filter.matches(o.order_type)
                    && span.contains(o.created_at)
            })
            .map(|o| o.amount)
            .sum()
    }

    /// Sales grouped by order type; only types with orders appear.
    pub fn sales_by_order_type(
        &self,
        span: TimeSpan,
        filter: OrderTypeFilter,
    ) -> BTreeMap<crate::store::OrderType, f64> {
        let mut groups = BTreeMap::new();
        for order in self.store.orders() {
            if order.status.counts_as_sale()
                && filter.matches(order.order_type)
                && span.contains(order.created_at)
            {
                *groups.entry(order.order_type).or_insert(0.0) += order.amount;
            }
        }
        groups
    }

    /// Order counts grouped by status, all statuses included.
    pub fn orders_by_status(
        &self,
        span: TimeSpan,
        filter: OrderTypeFilter,
    ) -> BTreeMap<crate::ledger::OrderStatus, u64> {
        let mut groups = BTreeMap::new();
        for order in self.store.orders() {
            if filter.matches(order.order_type) && span.contains(order.created_at) {
                *groups.entry(order.status).or_insert(0) += 1;
            }
        }
        groups
    }

    /// Net income over an arbitrary span, unfiltered.
    pub fn net_income(&self, span: TimeSpan) -> f64 {
        let collected = self
            .store
            .sum_payments(span, PaymentKind::Collection, OrderTypeFilter::All);
        let refunded = self
            .store
            .sum_payments(span, PaymentKind::Refund, OrderTypeFilter::All);
        collected - refunded
    }

    /// Cumulative outstanding balance at the window's end instant: everything
    /// invoiced up to `end` minus everything collected up to `end`. A running
    /// balance, deliberately independent of the window start.
    pub fn pending_amount(&self, end: NaiveDateTime, filter: OrderTypeFilter) -> f64 {
        let up_to_end = TimeSpan::up_to(end);
        let invoiced = self.store.sum_order_amounts(up_to_end, filter);
        let collected = self
            .store
            .sum_payments(up_to_end, PaymentKind::Collection, filter);
        invoiced - collected
    }

    fn client_segments(&self) -> HashMap<String, ClientSegment> {
        self.store
            .clients()
            .into_iter()
            .map(|c| (c.id, c.segment))
            .collect()
    }
}

fn zeroed<V: Clone>(range: &ResolvedRange, zero: V) -> BTreeMap<String, V> {
    range
        .labels
        .iter()
        .map(|label| (label.clone(), zero.clone()))
        .collect()
}

/// Mutable slot for the bucket a timestamp falls into, or `None` when the
/// timestamp is outside the window. A key inside the window that misses the
/// label set indicates a resolver bug and is dropped with a log line.
fn bucket_slot<'m, V>(
    buckets: &'m mut BTreeMap<String, V>,
    range: &ResolvedRange,
    ts: NaiveDateTime,
) -> Option<&'m mut V> {
    if !range.contains(ts) {
        return None;
    }
    let key = range.granularity.label_for(ts);
    if !buckets.contains_key(&key) {
        debug!("dropping in-window event with unknown bucket key {}", key);
        return None;
    }
    buckets.get_mut(&key)
}

fn add_amount(
    buckets: &mut BTreeMap<String, f64>,
    range: &ResolvedRange,
    ts: NaiveDateTime,
    amount: f64,
) {
    if let Some(slot) = bucket_slot(buckets, range, ts) {
        *slot += amount;
    }
}

fn add_count(buckets: &mut BTreeMap<String, u64>, range: &ResolvedRange, ts: NaiveDateTime) {
    if let Some(slot) = bucket_slot(buckets, range, ts) {
        *slot += 1;
    }
}
