// ==========================================
// Paie - import request and result envelope
// ==========================================
// The envelope is the only thing an import returns to callers: user
// errors are reported in it instead of being raised
// ==========================================

use crate::domain::kpi::KpiSnapshot;
use crate::domain::profile::ColumnMapping;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Rows listed individually in `RejectedRowsSummary::sample`
pub const REJECTED_SAMPLE_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub file_path: PathBuf,
    pub pay_date: NaiveDate,
    pub user_id: String,
    pub apply_sign_policy: bool,
    /// Caller-confirmed mapping; skips detection and stored profiles
    pub mapping_override: Option<ColumnMapping>,
    pub save_profile: bool,
    pub client_key: Option<String>,
}

impl ImportRequest {
    pub fn new(file_path: impl Into<PathBuf>, pay_date: NaiveDate, user_id: &str) -> Self {
        Self {
            file_path: file_path.into(),
            pay_date,
            user_id: user_id.to_string(),
            apply_sign_policy: false,
            mapping_override: None,
            save_profile: true,
            client_key: None,
        }
    }

    pub fn with_sign_policy(mut self, apply: bool) -> Self {
        self.apply_sign_policy = apply;
        self
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping_override = Some(mapping);
        self
    }

    pub fn with_client_key(mut self, client_key: &str) -> Self {
        self.client_key = Some(client_key.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRow {
    /// 1-based row number in the source file, header included
    pub row_no: usize,
    /// `code` or `code:field`
    pub reasons: Vec<String>,
}

/// Stable code of a reason: `"missing_required:matricule"` -> `"missing_required"`
pub fn reason_code(reason: &str) -> &str {
    reason.split_once(':').map(|(code, _)| code).unwrap_or(reason)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRowsSummary {
    pub total: usize,
    pub by_reason: BTreeMap<String, usize>,
    pub sample: Vec<RejectedRow>,
}

impl RejectedRowsSummary {
    /// Counts reasons by code, keeps the first `REJECTED_SAMPLE_LIMIT` rows
    /// with their field-level detail
    pub fn from_rows(rows: &[RejectedRow]) -> Self {
        let mut by_reason = BTreeMap::new();
        for reason in rows.iter().flat_map(|r| r.reasons.iter()) {
            *by_reason.entry(reason_code(reason).to_string()).or_insert(0) += 1;
        }
        Self {
            total: rows.len(),
            by_reason,
            sample: rows.iter().take(REJECTED_SAMPLE_LIMIT).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportEnvelope {
    pub status: EnvelopeStatus,
    pub batch_id: Option<String>,
    pub period_id: Option<String>,
    pub rows_count: usize,
    pub accepted_rows: usize,
    pub rejected_rows: usize,
    pub pay_date: NaiveDate,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kpi: Option<KpiSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_rows_summary: Option<RejectedRowsSummary>,
    pub mapping_warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

impl ImportEnvelope {
    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}
