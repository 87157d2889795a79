// ==========================================
// Paie - pay period model
// ==========================================
// One row per pay date. Date components and the sequence in year are
// derived from pay_date and checked by triggers
// ==========================================

use crate::domain::types::PeriodStatus;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPeriod {
    pub period_id: String,
    pub pay_date: NaiveDate,
    pub pay_day: u32,
    pub pay_month: u32,
    pub pay_year: i32,
    pub period_seq_in_year: u32,
    pub status: PeriodStatus,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PayPeriod {
    pub fn is_closed(&self) -> bool {
        self.status == PeriodStatus::Closed
    }
}

/// (day, month, year) of a pay date
pub fn date_components(pay_date: NaiveDate) -> (u32, u32, i32) {
    (pay_date.day(), pay_date.month(), pay_date.year())
}

/// Row of `list_periods`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_id: String,
    pub pay_date: NaiveDate,
    pub status: PeriodStatus,
    pub period_seq_in_year: u32,
    pub transaction_count: i64,
}
