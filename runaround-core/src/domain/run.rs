//! Run domain model

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A run logged by an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub username: String,
    pub date: NaiveDate,
    /// Distance in miles
    pub distance: Decimal,
    pub route: Option<String>,
}

impl Run {
    pub fn new(username: impl Into<String>, date: NaiveDate, distance: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            date,
            distance,
            route: None,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }
}
