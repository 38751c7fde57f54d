//! Equality filters over the categorical columns.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{DashboardQuery, SubscriptionRecord};

/// Label shown for the "no filter" choice in the page controls.
pub const ALL_LABEL: &str = "Все";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterColumn {
    City,
    Tariff,
    SubscriptionType,
    Manager,
    BillingPeriod,
}

impl FilterColumn {
    pub const ALL: [FilterColumn; 5] = [
        FilterColumn::City,
        FilterColumn::Tariff,
        FilterColumn::SubscriptionType,
        FilterColumn::Manager,
        FilterColumn::BillingPeriod,
    ];

    pub fn value_of(self, record: &SubscriptionRecord) -> &str {
        match self {
            FilterColumn::City => &record.city_id,
            FilterColumn::Tariff => &record.provider_tariff_name,
            FilterColumn::SubscriptionType => &record.subscription_type,
            FilterColumn::Manager => &record.manager_id,
            FilterColumn::BillingPeriod => &record.billing_period,
        }
    }

    /// Blank values are not offered as choices for these columns.
    fn skips_blank(self) -> bool {
        matches!(self, FilterColumn::City | FilterColumn::Manager)
    }
}

/// One control's choice. `All` is a variant, never a string, so no data
/// value can be mistaken for it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    All,
    Only(String),
}

impl Selection {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(selected) => selected == value,
        }
    }
}

impl From<Option<String>> for Selection {
    fn from(value: Option<String>) -> Self {
        value.map_or(Selection::All, Selection::Only)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    selections: BTreeMap<FilterColumn, Selection>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: FilterColumn, selection: Selection) -> Self {
        self.set(column, selection);
        self
    }

    pub fn only(self, column: FilterColumn, value: impl Into<String>) -> Self {
        self.with(column, Selection::Only(value.into()))
    }

    pub fn set(&mut self, column: FilterColumn, selection: Selection) {
        match selection {
            Selection::All => {
                self.selections.remove(&column);
            }
            only => {
                self.selections.insert(column, only);
            }
        }
    }

    pub fn selection(&self, column: FilterColumn) -> &Selection {
        static ALL: Selection = Selection::All;
        self.selections.get(&column).unwrap_or(&ALL)
    }

    pub fn is_unfiltered(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn matches(&self, record: &SubscriptionRecord) -> bool {
        self.selections
            .iter()
            .all(|(column, selection)| selection.matches(column.value_of(record)))
    }

    /// Rows matching every active selection, in table order.
    pub fn apply<'a>(&self, records: &'a [SubscriptionRecord]) -> Vec<&'a SubscriptionRecord> {
        records.iter().filter(|record| self.matches(record)).collect()
    }
}

impl From<&DashboardQuery> for Filters {
    fn from(query: &DashboardQuery) -> Self {
        Filters::new()
            .with(FilterColumn::City, query.city.clone().into())
            .with(FilterColumn::Tariff, query.tariff.clone().into())
            .with(FilterColumn::SubscriptionType, query.subscription_type.clone().into())
            .with(FilterColumn::Manager, query.manager.clone().into())
            .with(FilterColumn::BillingPeriod, query.billing_period.clone().into())
    }
}

/// Choices for each control, computed over the unfiltered table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub all_label: &'static str,
    pub cities: Vec<String>,
    pub tariffs: Vec<String>,
    pub subscription_types: Vec<String>,
    /// `None` hides the manager control.
    pub managers: Option<Vec<String>>,
    pub billing_periods: Vec<String>,
}

impl FilterOptions {
    pub fn from_records(records: &[SubscriptionRecord]) -> Self {
        let distinct = |column: FilterColumn| -> Vec<String> {
            records
                .iter()
                .map(|record| column.value_of(record))
                .filter(|value| !column.skips_blank() || !value.trim().is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .map(str::to_string)
                .collect()
        };

        let managers = distinct(FilterColumn::Manager);
        Self {
            all_label: ALL_LABEL,
            cities: distinct(FilterColumn::City),
            tariffs: distinct(FilterColumn::Tariff),
            subscription_types: distinct(FilterColumn::SubscriptionType),
            managers: (!managers.is_empty()).then_some(managers),
            billing_periods: distinct(FilterColumn::BillingPeriod),
        }
    }
}
