use crate::cache::SubscriptionCache;
use crate::models::DateRange;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SubscriptionCache>,
    pub default_range: DateRange,
}

impl AppState {
    pub fn new(cache: SubscriptionCache, default_range: DateRange) -> Self {
        Self {
            cache: Arc::new(cache),
            default_range,
        }
    }
}
