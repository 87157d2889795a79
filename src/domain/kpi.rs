// ==========================================
// Paie - KPI documents
// ==========================================
// KpiSnapshot is stored as JSON in kpi_snapshot.data, keyed by the pay
// date string (YYYY-MM-DD)
// ==========================================

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Headline figures of a pay date (all amounts in cents)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiCards {
    /// Sum of positive employee amounts
    pub masse_salariale_cents: i64,
    /// Sum of negative employee amounts
    pub deductions_cents: i64,
    /// Sum of all employee amounts
    pub salaire_net_cents: i64,
    pub masse_employeur_cents: i64,
    pub net_moyen_cents: i64,
    pub nb_employes: i64,
    pub nb_transactions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub key: String,
    pub label: Option<String>,
    pub total_cents: i64,
    pub lines: i64,
    pub employees: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRow {
    pub matricule: String,
    pub nom_complet: String,
    pub pay_code: String,
    pub amount_employee_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub period: String,
    pub period_id: Option<String>,
    pub cards: KpiCards,
    pub codes_top: Vec<BreakdownRow>,
    pub postes_top: Vec<BreakdownRow>,
    pub anomalies: Vec<AnomalyRow>,
    pub calculated_at: DateTime<Utc>,
    pub row_count: i64,
}

/// Result of `get_kpis`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSummary {
    pub pay_date: NaiveDate,
    pub cards: KpiCards,
    /// false when computed on the fly because no snapshot existed
    pub from_snapshot: bool,
    pub calculated_at: DateTime<Utc>,
}

/// Result of `get_kpi_details`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiDetails {
    pub pay_date: NaiveDate,
    pub by_pay_code: Vec<BreakdownRow>,
    pub by_budget_post: Vec<BreakdownRow>,
    pub by_job_category: Vec<BreakdownRow>,
}
