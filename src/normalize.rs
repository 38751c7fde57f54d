//! Schema-driven coercion of upstream rows into [`SubscriptionRecord`]s.
//!
//! Coercion is best effort: a value that cannot be parsed becomes the
//! field's default (`""`, `null` or `0`) and is counted in the
//! [`CoercionReport`]; a row is never dropped and a batch never fails.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde_json::Value;

use crate::models::{CoercionReport, RawRecord, SubscriptionRecord, NULL_BUCKET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SubscriberId,
    SubscriberName,
    CityId,
    ManagerId,
    ProviderTariffName,
    SubscriptionType,
    BillingPeriod,
    SubscriptionConnectionTime,
    ConnectionDate,
    DisconnectionDate,
    Quantity,
    Amount,
    PercentBonus,
    AmountOfRemuneration,
}

enum Slot<'a> {
    Text(&'a mut String),
    Timestamp(&'a mut Option<NaiveDateTime>),
    Number(&'a mut f64),
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::SubscriberId,
        Field::SubscriberName,
        Field::CityId,
        Field::ManagerId,
        Field::ProviderTariffName,
        Field::SubscriptionType,
        Field::BillingPeriod,
        Field::SubscriptionConnectionTime,
        Field::ConnectionDate,
        Field::DisconnectionDate,
        Field::Quantity,
        Field::Amount,
        Field::PercentBonus,
        Field::AmountOfRemuneration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::SubscriberId => "subscriber_id",
            Field::SubscriberName => "subscriber_name",
            Field::CityId => "city_id",
            Field::ManagerId => "manager_id",
            Field::ProviderTariffName => "provider_tariff_name",
            Field::SubscriptionType => "subscription_type",
            Field::BillingPeriod => "billing_period",
            Field::SubscriptionConnectionTime => "subscription_connection_time",
            Field::ConnectionDate => "connection_date",
            Field::DisconnectionDate => "disconnection_date",
            Field::Quantity => "quantity",
            Field::Amount => "amount",
            Field::PercentBonus => "percent_bonus",
            Field::AmountOfRemuneration => "amount_of_remuneration",
        }
    }

    /// Upstream keys, wire spelling first.
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            Field::ProviderTariffName => &["provaider_tariff_name", "provider_tariff_name"],
            Field::SubscriptionConnectionTime => {
                &["subscription_conection_time", "subscription_connection_time"]
            }
            Field::PercentBonus => &["procent_bonus_id", "percent_bonus"],
            Field::AmountOfRemuneration => &["amount_of_remuneration_id", "amount_of_remuneration"],
            Field::SubscriberId => &["subscriber_id"],
            Field::SubscriberName => &["subscriber_name"],
            Field::CityId => &["city_id"],
            Field::ManagerId => &["manager_id"],
            Field::SubscriptionType => &["subscription_type"],
            Field::BillingPeriod => &["billing_period"],
            Field::ConnectionDate => &["connection_date"],
            Field::DisconnectionDate => &["disconnection_date"],
            Field::Quantity => &["quantity"],
            Field::Amount => &["amount"],
        }
    }

    fn slot(self, record: &mut SubscriptionRecord) -> Slot<'_> {
        match self {
            Field::SubscriberId => Slot::Text(&mut record.subscriber_id),
            Field::SubscriberName => Slot::Text(&mut record.subscriber_name),
            Field::CityId => Slot::Text(&mut record.city_id),
            Field::ManagerId => Slot::Text(&mut record.manager_id),
            Field::ProviderTariffName => Slot::Text(&mut record.provider_tariff_name),
            Field::SubscriptionType => Slot::Text(&mut record.subscription_type),
            Field::BillingPeriod => Slot::Text(&mut record.billing_period),
            Field::SubscriptionConnectionTime => {
                Slot::Timestamp(&mut record.subscription_connection_time)
            }
            Field::ConnectionDate => Slot::Timestamp(&mut record.connection_date),
            Field::DisconnectionDate => Slot::Timestamp(&mut record.disconnection_date),
            Field::Quantity => Slot::Number(&mut record.quantity),
            Field::Amount => Slot::Number(&mut record.amount),
            Field::PercentBonus => Slot::Number(&mut record.percent_bonus),
            Field::AmountOfRemuneration => Slot::Number(&mut record.amount_of_remuneration),
        }
    }

    fn lookup(self, raw: &RawRecord) -> Option<&Value> {
        self.keys().iter().find_map(|key| raw.get(*key))
    }
}

enum Coerced<T> {
    Value(T),
    Missing,
    Invalid,
}

#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<SubscriptionRecord>,
    pub report: CoercionReport,
}

pub fn normalize(raw: &[RawRecord]) -> Normalized {
    let mut report = CoercionReport::default();
    let records = raw
        .iter()
        .map(|row| normalize_record(row, &mut report))
        .collect();
    Normalized { records, report }
}

static NULL: Value = Value::Null;

fn normalize_record(raw: &RawRecord, report: &mut CoercionReport) -> SubscriptionRecord {
    let mut record = SubscriptionRecord::default();

    for field in Field::ALL {
        let value = field.lookup(raw).unwrap_or(&NULL);
        let invalid = match field.slot(&mut record) {
            Slot::Text(slot) => assign(slot, coerce_text(value), String::new()),
            Slot::Timestamp(slot) => assign(slot, coerce_timestamp(value).map(Some), None),
            Slot::Number(slot) => assign(slot, coerce_number(value), 0.0),
        };
        if invalid {
            report.record(field.name());
        }
    }

    record.month = record
        .connection_date
        .map(|ts| ts.format("%Y-%m").to_string())
        .unwrap_or_else(|| NULL_BUCKET.to_string());
    record.day_of_week = record
        .connection_date
        .map(|ts| weekday_name(ts.weekday()).to_string())
        .unwrap_or_else(|| NULL_BUCKET.to_string());

    record
}

/// Stores the coerced value or the default; returns `true` on a failed coercion.
fn assign<T>(slot: &mut T, coerced: Coerced<T>, default: T) -> bool {
    match coerced {
        Coerced::Value(value) => {
            *slot = value;
            false
        }
        Coerced::Missing => {
            *slot = default;
            false
        }
        Coerced::Invalid => {
            *slot = default;
            true
        }
    }
}

impl<T> Coerced<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Coerced<U> {
        match self {
            Coerced::Value(value) => Coerced::Value(f(value)),
            Coerced::Missing => Coerced::Missing,
            Coerced::Invalid => Coerced::Invalid,
        }
    }
}

fn coerce_text(value: &Value) -> Coerced<String> {
    match value {
        Value::Null => Coerced::Missing,
        Value::String(text) => Coerced::Value(text.clone()),
        other => Coerced::Value(other.to_string()),
    }
}

fn coerce_number(value: &Value) -> Coerced<f64> {
    let parsed = match value {
        Value::Null => return Coerced::Missing,
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return Coerced::Missing,
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Array(_) | Value::Object(_) => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Coerced::Value(number),
        _ => Coerced::Invalid,
    }
}

fn coerce_timestamp(value: &Value) -> Coerced<NaiveDateTime> {
    match value {
        Value::Null => Coerced::Missing,
        Value::String(text) if text.trim().is_empty() => Coerced::Missing,
        Value::String(text) => match parse_timestamp(text) {
            Some(ts) => Coerced::Value(ts),
            None => Coerced::Invalid,
        },
        _ => Coerced::Invalid,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Parses the date/time shapes seen upstream. Offsets are dropped and the
/// local wall time kept. Timestamps outside 1677-09-22..=2262-04-11 are
/// rejected, which covers the `0001-01-01T00:00:00` empty date.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.naive_local())
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        })
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    representable(parsed).then_some(parsed)
}

fn representable(ts: NaiveDateTime) -> bool {
    let date = ts.date();
    match (
        NaiveDate::from_ymd_opt(1677, 9, 22),
        NaiveDate::from_ymd_opt(2262, 4, 11),
    ) {
        (Some(min), Some(max)) => date >= min && date <= max,
        _ => false,
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
