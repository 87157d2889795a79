// ==========================================
// Paie - domain enums
// ==========================================
// Stored as lowercase TEXT; `as_str` and `FromStr` must stay in sync
// with the CHECK constraints in repository/schema.rs
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// PeriodStatus
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    Open,
    Closed,
}

impl PeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodStatus::Open => "open",
            PeriodStatus::Closed => "closed",
        }
    }
}

impl FromStr for PeriodStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(PeriodStatus::Open),
            "closed" => Ok(PeriodStatus::Closed),
            other => Err(format!("unknown period status: {}", other)),
        }
    }
}

impl fmt::Display for PeriodStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// EmployeeStatus
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "active",
            EmployeeStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EmployeeStatus::Active),
            "inactive" => Ok(EmployeeStatus::Inactive),
            other => Err(format!("unknown employee status: {}", other)),
        }
    }
}

// ==========================================
// BatchStatus
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Processed,
    Error,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processed => "processed",
            BatchStatus::Error => "error",
        }
    }
}

impl FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BatchStatus::Pending),
            "processed" => Ok(BatchStatus::Processed),
            "error" => Ok(BatchStatus::Error),
            other => Err(format!("unknown batch status: {}", other)),
        }
    }
}

// ==========================================
// SignCategory - pay-code classification for the sign policy
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignCategory {
    Gain,
    Deduction,
    Neutral,
}

impl SignCategory {
    /// Stored sign: +1, -1 or 0
    pub fn sign(&self) -> i64 {
        match self {
            SignCategory::Gain => 1,
            SignCategory::Deduction => -1,
            SignCategory::Neutral => 0,
        }
    }

    pub fn from_sign(sign: i64) -> Option<Self> {
        match sign {
            1 => Some(SignCategory::Gain),
            -1 => Some(SignCategory::Deduction),
            0 => Some(SignCategory::Neutral),
            _ => None,
        }
    }
}

impl FromStr for SignCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gain" | "+1" | "1" => Ok(SignCategory::Gain),
            "deduction" | "-1" => Ok(SignCategory::Deduction),
            "neutral" | "0" | "exclude" => Ok(SignCategory::Neutral),
            other => Err(format!("unknown sign category: {}", other)),
        }
    }
}

// ==========================================
// LogicalField - columns the mapper resolves
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalField {
    LineNumber,
    JobCategory,
    JobCode,
    JobTitle,
    PayDate,
    Matricule,
    EmployeeName,
    PayCategory,
    PayCode,
    PayCodeLabel,
    BudgetPost,
    BudgetPostLabel,
    Amount,
    EmployerShare,
    CombinedAmount,
}

impl LogicalField {
    /// Canonical 15-column order of the client spreadsheet
    pub const CANONICAL_ORDER: [LogicalField; 15] = [
        LogicalField::LineNumber,
        LogicalField::JobCategory,
        LogicalField::JobCode,
        LogicalField::JobTitle,
        LogicalField::PayDate,
        LogicalField::Matricule,
        LogicalField::EmployeeName,
        LogicalField::PayCategory,
        LogicalField::PayCode,
        LogicalField::PayCodeLabel,
        LogicalField::BudgetPost,
        LogicalField::BudgetPostLabel,
        LogicalField::Amount,
        LogicalField::EmployerShare,
        LogicalField::CombinedAmount,
    ];

    pub fn is_required(&self) -> bool {
        matches!(
            self,
            LogicalField::PayDate
                | LogicalField::Matricule
                | LogicalField::EmployeeName
                | LogicalField::PayCode
                | LogicalField::PayCodeLabel
                | LogicalField::PayCategory
                | LogicalField::BudgetPost
                | LogicalField::BudgetPostLabel
                | LogicalField::Amount
        )
    }

    /// Monetary columns are exempt from the formula-injection filter
    pub fn is_monetary(&self) -> bool {
        matches!(
            self,
            LogicalField::Amount | LogicalField::EmployerShare | LogicalField::CombinedAmount
        )
    }

    /// Greedy assignment order of the column mapper (higher first)
    pub fn priority(&self) -> u32 {
        match self {
            LogicalField::PayDate => 100,
            LogicalField::Amount => 95,
            LogicalField::Matricule => 90,
            LogicalField::EmployerShare => 90,
            LogicalField::PayCode => 85,
            LogicalField::EmployeeName => 80,
            LogicalField::CombinedAmount => 75,
            LogicalField::BudgetPost => 70,
            LogicalField::PayCodeLabel => 65,
            LogicalField::BudgetPostLabel => 60,
            LogicalField::PayCategory => 55,
            LogicalField::JobCode => 50,
            LogicalField::JobTitle => 45,
            LogicalField::JobCategory => 40,
            LogicalField::LineNumber => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::LineNumber => "line_number",
            LogicalField::JobCategory => "job_category",
            LogicalField::JobCode => "job_code",
            LogicalField::JobTitle => "job_title",
            LogicalField::PayDate => "pay_date",
            LogicalField::Matricule => "matricule",
            LogicalField::EmployeeName => "employee_name",
            LogicalField::PayCategory => "pay_category",
            LogicalField::PayCode => "pay_code",
            LogicalField::PayCodeLabel => "pay_code_label",
            LogicalField::BudgetPost => "budget_post",
            LogicalField::BudgetPostLabel => "budget_post_label",
            LogicalField::Amount => "amount",
            LogicalField::EmployerShare => "employer_share",
            LogicalField::CombinedAmount => "combined_amount",
        }
    }

    /// French label shown in mapping previews and error messages
    pub fn label_fr(&self) -> &'static str {
        match self {
            LogicalField::LineNumber => "N° de ligne",
            LogicalField::JobCategory => "Catégorie d'emploi",
            LogicalField::JobCode => "Code emploi",
            LogicalField::JobTitle => "Titre d'emploi",
            LogicalField::PayDate => "Date de paie",
            LogicalField::Matricule => "Matricule",
            LogicalField::EmployeeName => "Employé",
            LogicalField::PayCategory => "Catégorie de paie",
            LogicalField::PayCode => "Code de paie",
            LogicalField::PayCodeLabel => "Description du code de paie",
            LogicalField::BudgetPost => "Poste budgétaire",
            LogicalField::BudgetPostLabel => "Desc poste budgétaire",
            LogicalField::Amount => "Montant",
            LogicalField::EmployerShare => "Part employeur",
            LogicalField::CombinedAmount => "Mnt/Cmb",
        }
    }

    /// Position in the 15-column staging mirror
    pub fn staging_index(&self) -> usize {
        Self::CANONICAL_ORDER
            .iter()
            .position(|f| f == self)
            .unwrap_or(0)
    }
}

impl FromStr for LogicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalField::CANONICAL_ORDER
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown logical field: {}", s))
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
