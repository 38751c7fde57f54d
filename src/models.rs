use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::filter::FilterOptions;
use crate::stats::{Chart, Kpis};

/// One upstream row before normalization.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Label used for rows without a connection date in derived columns.
pub const NULL_BUCKET: &str = "NaT";

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SubscriptionRecord {
    pub subscriber_id: String,
    pub subscriber_name: String,
    pub city_id: String,
    pub manager_id: String,
    pub provider_tariff_name: String,
    pub subscription_type: String,
    pub billing_period: String,
    pub subscription_connection_time: Option<NaiveDateTime>,
    pub connection_date: Option<NaiveDateTime>,
    pub disconnection_date: Option<NaiveDateTime>,
    pub quantity: f64,
    pub amount: f64,
    pub percent_bonus: f64,
    pub amount_of_remuneration: f64,
    pub month: String,
    pub day_of_week: String,
}

/// Inclusive date range selected on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// Query bounds sent upstream; also the cache key.
    pub fn bounds(&self) -> (String, String) {
        (
            format!("{}T00:00:00", self.from.format("%Y-%m-%d")),
            format!("{}T23:59:59", self.to.format("%Y-%m-%d")),
        )
    }
}

/// Per-field count of values that were present but could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct CoercionReport {
    pub failures: BTreeMap<&'static str, u64>,
}

impl CoercionReport {
    pub fn record(&mut self, field: &'static str) {
        *self.failures.entry(field).or_default() += 1;
    }

    pub fn total(&self) -> u64 {
        self.failures.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct DashboardQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub city: Option<String>,
    pub tariff: Option<String>,
    pub subscription_type: Option<String>,
    pub manager: Option<String>,
    pub billing_period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub range: DateRange,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub options: FilterOptions,
    pub kpis: Kpis,
    pub charts: BTreeMap<&'static str, Chart>,
    pub coercion: CoercionReport,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse<'a> {
    pub range: DateRange,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub rows: Vec<RecordRow<'a>>,
}

/// Row of the data table; derived columns are left out.
#[derive(Debug, Serialize)]
pub struct RecordRow<'a> {
    pub subscriber_id: &'a str,
    pub subscriber_name: &'a str,
    pub city_id: &'a str,
    pub manager_id: &'a str,
    pub provider_tariff_name: &'a str,
    pub subscription_type: &'a str,
    pub billing_period: &'a str,
    pub subscription_connection_time: Option<NaiveDateTime>,
    pub connection_date: Option<NaiveDateTime>,
    pub disconnection_date: Option<NaiveDateTime>,
    pub quantity: f64,
    pub amount: f64,
    pub percent_bonus: f64,
    pub amount_of_remuneration: f64,
}

impl<'a> From<&'a SubscriptionRecord> for RecordRow<'a> {
    fn from(record: &'a SubscriptionRecord) -> Self {
        Self {
            subscriber_id: &record.subscriber_id,
            subscriber_name: &record.subscriber_name,
            city_id: &record.city_id,
            manager_id: &record.manager_id,
            provider_tariff_name: &record.provider_tariff_name,
            subscription_type: &record.subscription_type,
            billing_period: &record.billing_period,
            subscription_connection_time: record.subscription_connection_time,
            connection_date: record.connection_date,
            disconnection_date: record.disconnection_date,
            quantity: record.quantity,
            amount: record.amount,
            percent_bonus: record.percent_bonus,
            amount_of_remuneration: record.amount_of_remuneration,
        }
    }
}
