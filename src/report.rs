//! Composes the aggregation primitives into the six report shapes.

use crate::aggregate::MetricAggregator;
use crate::error::Result;
use crate::growth::{delta, growth_rate, ratio_pct, round1, round2};
use crate::ledger::PaymentKind;
use crate::period::{
    month_labels, Granularity, ResolvedRange, TimeDimension, TimeWindowRequest, YearMonth,
};
use crate::store::{DataStore, TimeSpan};
use chrono::{Datelike, Local, NaiveDate};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub trial_count: u64,
    pub trial_growth: f64,
    pub order_count: u64,
    pub order_growth: f64,
    pub sales_amount: f64,
    /// Same-period sales of the previous comparable window.
    pub sales_compare_amount: f64,
    pub collection_amount: f64,
    pub collection_growth: f64,
    pub pending_amount: f64,
    /// Always neutral: cumulative balances never compute growth.
    pub pending_growth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub label: String,
    pub sales_amount: f64,
    /// Collections with refunds subtracted in the same bucket.
    pub collection_amount: f64,
    pub trial_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub labels: Vec<String>,
    pub points: Vec<TrendPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPoint {
    pub label: String,
    pub enterprise_sales: f64,
    pub individual_sales: f64,
    pub enterprise_trials: u64,
    pub individual_trials: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub labels: Vec<String>,
    pub points: Vec<ComparisonPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSlice {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionReport {
    /// Sales amount per order type.
    pub order_type: Vec<DistributionSlice>,
    /// Order count per status.
    pub order_status: Vec<DistributionSlice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomerReport {
    /// Exactly six consecutive months ending at the reference month.
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchSummary {
    pub total_income: f64,
    pub income_growth: f64,
    pub total_expense: f64,
    pub expense_growth: f64,
    pub new_customers: u64,
    pub new_customers_growth: f64,
    pub deal_customers: u64,
    pub conversion_rate: f64,
    pub total_profit: f64,
    pub profit_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchReport {
    pub summary: WorkbenchSummary,
    pub labels: Vec<String>,
    pub income: Vec<f64>,
    pub expense: Vec<f64>,
    pub profit: Vec<f64>,
    pub margin: Vec<f64>,
    pub expense_pie: Vec<DistributionSlice>,
}

/// Stateless report facade over a data store.
///
/// `today` anchors the new-customer rolling window for years without data;
/// tests pin it, production uses the local clock.
pub struct ReportAssembler<'a, S: DataStore> {
    store: &'a S,
    today: NaiveDate,
}

impl<'a, S: DataStore> ReportAssembler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            today: Local::now().date_naive(),
        }
    }

    pub fn with_today(store: &'a S, today: NaiveDate) -> Self {
        Self { store, today }
    }

    fn aggregator(&self) -> MetricAggregator<'a, S> {
        MetricAggregator::new(self.store)
    }

    /// Summary cards: windowed counts/sums with previous-window comparisons
    /// plus the cumulative pending balance.
    pub fn summary(&self, request: &TimeWindowRequest) -> Result<SummaryReport> {
        let range = request.resolve()?;
        let (prev_start, prev_end) = range.previous(&request.dimension);
        let span = MetricAggregator::<S>::window(&range);
        let prev_span = TimeSpan::between(prev_start, prev_end);
        let agg = self.aggregator();
        let filter = request.order_type;

        let trial_count = self.store.count_trials(span) as u64;
        let prev_trials = self.store.count_trials(prev_span) as f64;

        let order_count = self.store.count_orders(span, filter) as u64;
        let prev_orders = self.store.count_orders(prev_span, filter) as f64;

        let sales_amount = agg.sum_sales(span, filter);
        let sales_compare_amount = agg.sum_sales(prev_span, filter);

        let collection_amount = self
            .store
            .sum_payments(span, PaymentKind::Collection, filter);
        let prev_collection = self
            .store
            .sum_payments(prev_span, PaymentKind::Collection, filter);

        let pending_amount = agg.pending_amount(range.end, filter);

        Ok(SummaryReport {
            trial_count,
            trial_growth: delta(trial_count as f64, prev_trials),
            order_count,
            order_growth: delta(order_count as f64, prev_orders),
            sales_amount: round2(sales_amount),
            sales_compare_amount: round2(sales_compare_amount),
            collection_amount: round2(collection_amount),
            collection_growth: round2(delta(collection_amount, prev_collection)),
            pending_amount: round2(pending_amount),
            pending_growth: 0.0,
        })
    }

    /// Per-bucket sales, net collections and trial counts.
    pub fn trend(&self, request: &TimeWindowRequest) -> Result<TrendReport> {
        let range = request.resolve()?;
        let agg = self.aggregator();

        let sales = agg.sales_by_bucket(&range, request.order_type);
        let collections = agg.net_collections_by_bucket(&range, request.order_type);
        let trials = agg.trials_by_bucket(&range);

        let points = range
            .labels
            .iter()
            .map(|label| TrendPoint {
                label: label.clone(),
                sales_amount: round2(sales[label]),
                collection_amount: round2(collections[label]),
                trial_count: trials[label],
            })
            .collect();

        Ok(TrendReport {
            labels: range.labels,
            points,
        })
    }

    /// Per-bucket sales and trials split by client segment.
    pub fn comparison(&self, request: &TimeWindowRequest) -> Result<ComparisonReport> {
        let range = request.resolve()?;
        let agg = self.aggregator();

        let sales = agg.sales_split_by_segment(&range, request.order_type);
        let trials = agg.trials_split_by_segment(&range);

        let points = range
            .labels
            .iter()
            .map(|label| {
                let split = sales[label];
                let (enterprise_trials, individual_trials) = trials[label];
                ComparisonPoint {
                    label: label.clone(),
                    enterprise_sales: round2(split.enterprise),
                    individual_sales: round2(split.individual),
                    enterprise_trials,
                    individual_trials,
                }
            })
            .collect();

        Ok(ComparisonReport {
            labels: range.labels,
            points,
        })
    }

    /// Sales distribution by order type and order counts by status.
    pub fn distribution(&self, request: &TimeWindowRequest) -> Result<DistributionReport> {
        let range = request.resolve()?;
        let span = MetricAggregator::<S>::window(&range);
        let agg = self.aggregator();

        let order_type = agg
            .sales_by_order_type(span, request.order_type)
            .into_iter()
            .map(|(order_type, value)| DistributionSlice {
                name: order_type.display_name().to_string(),
                value: round2(value),
            })
            .collect();

        let order_status = agg
            .orders_by_status(span, request.order_type)
            .into_iter()
            .map(|(status, count)| DistributionSlice {
                name: status.display_name().to_string(),
                value: count as f64,
            })
            .collect();

        Ok(DistributionReport {
            order_type,
            order_status,
        })
    }

    /// New-client counts for the six months ending at the window's reference
    /// month.
    pub fn new_customers(&self, request: &TimeWindowRequest) -> Result<NewCustomerReport> {
        let reference = self.reference_month(&request.dimension);
        let start = YearMonth::from_date(crate::calendar::shift_month(reference.first_day(), -5));
        let labels = month_labels(start, reference);

        let range = ResolvedRange {
            start: start.first_day().and_hms_opt(0, 0, 0).unwrap(),
            end: reference.last_day().and_hms_opt(23, 59, 59).unwrap(),
            granularity: Granularity::Month,
            labels,
        };

        let buckets = self.aggregator().clients_by_bucket(&range);
        let counts = range.labels.iter().map(|label| buckets[label]).collect();

        Ok(NewCustomerReport {
            labels: range.labels,
            counts,
        })
    }

    /// Workbench dashboard: profitability summary, per-bucket trend and the
    /// cost-category pie. Growth comparisons are computed for the year
    /// dimension only; month windows report neutral growth.
    pub fn workbench(&self, request: &TimeWindowRequest) -> Result<WorkbenchReport> {
        let range = request.resolve()?;
        let span = MetricAggregator::<S>::window(&range);
        let agg = self.aggregator();

        let compare_yearly = request.dimension.is_yearly();
        let (prev_start, prev_end) = range.previous(&request.dimension);
        let prev_span = TimeSpan::between(prev_start, prev_end);

        let income = agg.net_income(span);
        let expense = self.store.sum_costs(span);
        let new_customers = self.store.count_clients(span);
        let deal_customers = self.store.count_deal_clients(span);
        let profit = income - expense;

        let (income_growth, expense_growth, new_customers_growth) = if compare_yearly {
            (
                growth_rate(income, agg.net_income(prev_span)),
                growth_rate(expense, self.store.sum_costs(prev_span)),
                growth_rate(
                    new_customers as f64,
                    self.store.count_clients(prev_span) as f64,
                ),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        let income_buckets = agg.net_income_by_bucket(&range);
        let expense_buckets = agg.costs_by_bucket(&range);

        let mut income_series = Vec::with_capacity(range.labels.len());
        let mut expense_series = Vec::with_capacity(range.labels.len());
        let mut profit_series = Vec::with_capacity(range.labels.len());
        let mut margin_series = Vec::with_capacity(range.labels.len());
        for label in &range.labels {
            let bucket_income = income_buckets[label];
            let bucket_expense = expense_buckets[label];
            let bucket_profit = bucket_income - bucket_expense;

            income_series.push(round2(bucket_income));
            expense_series.push(round2(bucket_expense));
            profit_series.push(round2(bucket_profit));
            margin_series.push(round1(ratio_pct(bucket_profit, bucket_income)));
        }

        let expense_pie = self
            .store
            .group_costs_by_category(span)
            .into_iter()
            .map(|(category, value)| DistributionSlice {
                name: category.display_name().to_string(),
                value: round2(value),
            })
            .collect();

        info!(
            "workbench window {}..{}: income={} expense={} deals={}",
            range.start, range.end, income, expense, deal_customers
        );

        Ok(WorkbenchReport {
            summary: WorkbenchSummary {
                total_income: round2(income),
                income_growth: round1(income_growth),
                total_expense: round2(expense),
                expense_growth: round1(expense_growth),
                new_customers: new_customers as u64,
                new_customers_growth: round1(new_customers_growth),
                deal_customers: deal_customers as u64,
                conversion_rate: round1(ratio_pct(deal_customers as f64, new_customers as f64)),
                total_profit: round2(profit),
                profit_margin: round1(ratio_pct(profit, income)),
            },
            labels: range.labels,
            income: income_series,
            expense: expense_series,
            profit: profit_series,
            margin: margin_series,
            expense_pie,
        })
    }

    /// Reference month of the rolling new-customer window: for a year, the
    /// latest month with client data in that year, else "today" when the year
    /// is current, else December; for a month range, its end month.
    fn reference_month(&self, dimension: &TimeDimension) -> YearMonth {
        match dimension {
            TimeDimension::Year(year) => {
                let latest = self
                    .store
                    .clients()
                    .iter()
                    .filter(|c| c.created_at.year() == *year)
                    .map(|c| c.created_at)
                    .max();

                match latest {
                    Some(ts) => YearMonth::from_date(ts.date()),
                    None if *year == self.today.year() => YearMonth::from_date(self.today),
                    None => YearMonth { year: *year, month: 12 },
                }
            }
            TimeDimension::Months { end, .. } => *end,
        }
    }
}
