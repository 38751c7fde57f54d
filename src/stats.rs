use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::cache::Dataset;
use crate::filter::{FilterOptions, Filters};
use crate::models::{DashboardResponse, DateRange, SubscriptionRecord, NULL_BUCKET};

pub const TOP_CITIES: usize = 15;
pub const TOP_MANAGERS: usize = 10;
pub const TOP_SUBSCRIBERS: usize = 10;

const NO_DATA: &str = "No data";
const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub label: String,
    pub value: f64,
}

impl Point {
    fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Chart payload; an empty input is reported as `no_data`, never as an empty series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Chart {
    Series { points: Vec<Point> },
    NoData { message: &'static str },
}

impl Chart {
    fn from_points(points: Vec<Point>, message: &'static str) -> Self {
        if points.is_empty() {
            Chart::NoData { message }
        } else {
            Chart::Series { points }
        }
    }

    fn series(points: Vec<Point>) -> Self {
        Self::from_points(points, NO_DATA)
    }

    pub fn points(&self) -> &[Point] {
        match self {
            Chart::Series { points } => points,
            Chart::NoData { .. } => &[],
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Chart::NoData { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_subscriptions: usize,
    pub unique_subscribers: usize,
    pub total_amount: f64,
    /// `None` when no rows match.
    pub average_bonus: Option<f64>,
}

pub fn build_dashboard(range: DateRange, dataset: &Dataset, filters: &Filters) -> DashboardResponse {
    let rows = filters.apply(&dataset.records);

    DashboardResponse {
        range,
        total_rows: dataset.records.len(),
        filtered_rows: rows.len(),
        options: FilterOptions::from_records(&dataset.records),
        kpis: kpis(&rows),
        charts: charts(&rows),
        coercion: dataset.report.clone(),
    }
}

pub fn kpis(rows: &[&SubscriptionRecord]) -> Kpis {
    let unique_subscribers = rows
        .iter()
        .map(|row| row.subscriber_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    let total_amount = rows.iter().map(|row| row.amount).sum::<f64>();
    let average_bonus = (!rows.is_empty())
        .then(|| rows.iter().map(|row| row.percent_bonus).sum::<f64>() / rows.len() as f64);

    Kpis {
        total_subscriptions: rows.len(),
        unique_subscribers,
        total_amount,
        average_bonus,
    }
}

pub fn charts(rows: &[&SubscriptionRecord]) -> BTreeMap<&'static str, Chart> {
    let mut charts = BTreeMap::new();

    charts.insert("by_month", Chart::series(by_month(rows)));
    charts.insert(
        "by_tariff",
        Chart::series(descending(count_by(rows, |row| &row.provider_tariff_name))),
    );
    charts.insert(
        "top_cities",
        Chart::series(top_non_blank(rows, |row| &row.city_id, TOP_CITIES)),
    );
    charts.insert(
        "by_subscription_type",
        Chart::series(descending(count_by(rows, |row| &row.subscription_type))),
    );
    charts.insert("daily", Chart::series(daily(rows)));
    charts.insert("amount_by_month", Chart::series(amount_by_month(rows)));
    charts.insert(
        "by_billing_period",
        Chart::series(descending(count_by(rows, |row| &row.billing_period))),
    );
    charts.insert(
        "top_managers",
        Chart::from_points(
            top_non_blank(rows, |row| &row.manager_id, TOP_MANAGERS),
            "No manager data",
        ),
    );
    charts.insert("bonus_distribution", Chart::series(bonus_distribution(rows)));
    charts.insert("by_weekday", Chart::series(by_weekday(rows)));
    charts.insert("top_subscribers", Chart::series(top_subscribers(rows)));

    charts
}

fn count_by<'a>(
    rows: &[&'a SubscriptionRecord],
    key: impl Fn(&'a SubscriptionRecord) -> &'a str,
) -> BTreeMap<&'a str, u64> {
    let mut counts = BTreeMap::new();
    for &row in rows {
        *counts.entry(key(row)).or_insert(0u64) += 1;
    }
    counts
}

/// Count descending; ties by label so the order is stable.
fn descending(counts: BTreeMap<&str, u64>) -> Vec<Point> {
    let mut ordered: Vec<_> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ordered
        .into_iter()
        .map(|(label, count)| Point::new(label, count as f64))
        .collect()
}

fn top_non_blank<'a>(
    rows: &[&'a SubscriptionRecord],
    key: impl Fn(&'a SubscriptionRecord) -> &'a str,
    limit: usize,
) -> Vec<Point> {
    let mut counts = count_by(rows, key);
    counts.retain(|label, _| !label.trim().is_empty());
    let mut points = descending(counts);
    points.truncate(limit);
    points
}

/// Labels ascending with the null bucket last.
fn null_bucket_last<V>(groups: BTreeMap<&str, V>) -> Vec<(&str, V)> {
    let mut ordered: Vec<_> = groups.into_iter().collect();
    ordered.sort_by_key(|(label, _)| *label == NULL_BUCKET);
    ordered
}

fn by_month(rows: &[&SubscriptionRecord]) -> Vec<Point> {
    null_bucket_last(count_by(rows, |row| &row.month))
        .into_iter()
        .map(|(month, count)| Point::new(month, count as f64))
        .collect()
}

fn amount_by_month(rows: &[&SubscriptionRecord]) -> Vec<Point> {
    let total: f64 = rows.iter().map(|row| row.amount).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();
    for row in rows {
        *sums.entry(row.month.as_str()).or_default() += row.amount;
    }
    null_bucket_last(sums)
        .into_iter()
        .map(|(month, amount)| Point::new(month, amount))
        .collect()
}

fn daily(rows: &[&SubscriptionRecord]) -> Vec<Point> {
    let mut counts: BTreeMap<(bool, Option<NaiveDate>), u64> = BTreeMap::new();
    for row in rows {
        let date = row.connection_date.map(|ts| ts.date());
        *counts.entry((date.is_none(), date)).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((_, date), count)| {
            let label = date.map_or_else(|| NULL_BUCKET.to_string(), |d| d.to_string());
            Point::new(label, count as f64)
        })
        .collect()
}

fn bonus_distribution(rows: &[&SubscriptionRecord]) -> Vec<Point> {
    let mut bonuses: Vec<f64> = rows
        .iter()
        .map(|row| row.percent_bonus)
        .filter(|bonus| *bonus > 0.0)
        .collect();
    bonuses.sort_by(f64::total_cmp);

    let mut points: Vec<Point> = Vec::new();
    let mut previous: Option<f64> = None;
    for bonus in bonuses {
        if previous == Some(bonus) {
            if let Some(point) = points.last_mut() {
                point.value += 1.0;
            }
        } else {
            points.push(Point::new(format_number(bonus), 1.0));
        }
        previous = Some(bonus);
    }
    points
}

fn by_weekday(rows: &[&SubscriptionRecord]) -> Vec<Point> {
    if rows.is_empty() {
        return Vec::new();
    }

    let counts = count_by(rows, |row| &row.day_of_week);
    let mut points: Vec<Point> = WEEKDAYS
        .iter()
        .map(|day| Point::new(*day, counts.get(day).copied().unwrap_or(0) as f64))
        .collect();
    if let Some(undated) = counts.get(NULL_BUCKET) {
        points.push(Point::new(NULL_BUCKET, *undated as f64));
    }
    points
}

fn top_subscribers(rows: &[&SubscriptionRecord]) -> Vec<Point> {
    let mut counts: BTreeMap<(&str, &str), u64> = BTreeMap::new();
    for row in rows {
        *counts
            .entry((row.subscriber_id.as_str(), row.subscriber_name.as_str()))
            .or_default() += 1;
    }

    let mut ordered: Vec<_> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered.truncate(TOP_SUBSCRIBERS);

    // Names shared by several ids get the id appended so bars stay distinct.
    let mut ids_per_name: HashMap<&str, usize> = HashMap::new();
    for ((_, name), _) in &ordered {
        *ids_per_name.entry(*name).or_default() += 1;
    }

    ordered
        .into_iter()
        .map(|((id, name), count)| {
            let label = if name.trim().is_empty() {
                id.to_string()
            } else if ids_per_name[name] > 1 {
                format!("{name} ({id})")
            } else {
                name.to_string()
            };
            Point::new(label, count as f64)
        })
        .collect()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
