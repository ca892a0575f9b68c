//! # Revenue Ledger
//!
//! A deterministic order payment ledger and period-based revenue analytics
//! engine.
//!
//! ## Core Concepts
//!
//! - **Ledger state machine**: an order's payment status is always derived
//!   from its full collection/refund event history by a pure fold, never
//!   from an incrementally drifting counter.
//! - **Period resolution**: a year or month-range request becomes concrete
//!   calendar boundaries plus an ordered, gap-free list of bucket labels
//!   (daily or monthly).
//! - **Aggregation**: sales, collections, trials, clients and costs are
//!   bucketed into those labels; cumulative balances (pending amount) are
//!   evaluated against the window end only.
//! - **Safe growth**: period-over-period comparisons never divide by zero,
//!   and calendar shifting is leap-year and partial-month aware.
//!
//! ## Example
//!
//! ```rust,ignore
//! use revenue_ledger::*;
//! use chrono::NaiveDate;
//!
//! let mut store = MemoryStore::new();
//! store.add_order(OrderRecord::new(
//!     "ORD-1",
//!     "C-1",
//!     1000.0,
//!     OrderType::New,
//!     NaiveDate::from_ymd_opt(2025, 2, 10).unwrap().and_hms_opt(9, 0, 0).unwrap(),
//! ));
//! store.record_payment(
//!     "ORD-1",
//!     1000.0,
//!     PaymentKind::Collection,
//!     NaiveDate::from_ymd_opt(2025, 2, 15).unwrap().and_hms_opt(9, 0, 0).unwrap(),
//! )?;
//!
//! let assembler = ReportAssembler::new(&store);
//! let request = TimeWindowRequest::new(TimeDimension::Year(2025), OrderTypeFilter::All);
//! let summary = assembler.summary(&request)?;
//! assert_eq!(summary.collection_amount, 1000.0);
//! ```

pub mod aggregate;
pub mod calendar;
pub mod error;
pub mod growth;
pub mod ledger;
pub mod period;
pub mod report;
pub mod store;

pub use aggregate::{MetricAggregator, SegmentSplit};
pub use error::{LedgerError, Result};
pub use growth::{delta, growth_rate, ratio_pct};
pub use ledger::{derive_state, LedgerState, OrderStatus, PaymentKind};
pub use period::{
    resolve, Granularity, ResolvedRange, TimeDimension, TimeWindowRequest, YearMonth,
};
pub use report::{
    ComparisonPoint, ComparisonReport, DistributionReport, DistributionSlice, NewCustomerReport,
    ReportAssembler, SummaryReport, TrendPoint, TrendReport, WorkbenchReport, WorkbenchSummary,
};
pub use store::{
    ClientRecord, ClientSegment, CostCategory, CostRecord, DataStore, LedgerStore, MemoryStore,
    OrderRecord, OrderType, OrderTypeFilter, PaymentRecord, TimeSpan, TrialRecord,
};
