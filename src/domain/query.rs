// ==========================================
// Paie - query surface DTOs
// ==========================================

use crate::domain::transaction::TransactionView;
use crate::domain::types::EmployeeStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const MAX_PAGE_SIZE: usize = 500;
pub const MAX_TABLE_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeFilter {
    /// Case-insensitive match on matricule or full name
    pub search: Option<String>,
    pub statut: Option<EmployeeStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRow {
    pub employee_id: String,
    pub matricule: String,
    pub nom_complet: String,
    pub statut: EmployeeStatus,
    pub transaction_count: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub pay_date: Option<NaiveDate>,
    pub period_id: Option<String>,
    pub matricule: Option<String>,
    pub pay_code: Option<String>,
    pub budget_post: Option<String>,
    pub job_category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePage {
    pub rows: Vec<TransactionView>,
    pub total: i64,
    pub offset: usize,
    pub limit: usize,
}

/// (page >= 1, page_size in 1..=500)
pub fn clamp_page(page: usize, page_size: usize) -> (usize, usize) {
    (page.max(1), page_size.clamp(1, MAX_PAGE_SIZE))
}

pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_TABLE_LIMIT)
}
