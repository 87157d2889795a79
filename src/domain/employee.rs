// ==========================================
// Paie - employee model
// ==========================================
// Identity key: matricule_norm (trimmed, lowercased)
// Created on first sighting during ingest; removed only as an orphan
// during period deletion
// ==========================================

use crate::domain::types::EmployeeStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: String,
    pub matricule_raw: String,
    pub matricule_norm: String,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub nom_complet: String,
    pub statut: EmployeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Employee fields as seen in one source row; input of the upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeIdentity {
    pub matricule_raw: String,
    pub matricule_norm: String,
    pub nom: Option<String>,
    pub prenom: Option<String>,
    pub nom_complet: String,
}

impl EmployeeIdentity {
    pub fn from_source(matricule_raw: &str, full_name: &str) -> Self {
        let (nom, prenom) = split_full_name(full_name);
        Self {
            matricule_raw: matricule_raw.trim().to_string(),
            matricule_norm: normalize_matricule(matricule_raw),
            nom,
            prenom,
            nom_complet: full_name.trim().to_string(),
        }
    }
}

pub fn normalize_matricule(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Splits "Nom, Prénom" on the first comma, otherwise "Nom Prénom..." on
/// the first whitespace.
pub fn split_full_name(full_name: &str) -> (Option<String>, Option<String>) {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        return (None, None);
    }

    let (nom, prenom) = match trimmed.split_once(',') {
        Some((nom, prenom)) => (nom.trim(), prenom.trim()),
        None => match trimmed.split_once(char::is_whitespace) {
            Some((nom, prenom)) => (nom.trim(), prenom.trim()),
            None => (trimmed, ""),
        },
    };

    let to_opt = |s: &str| {
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    };
    (to_opt(nom), to_opt(prenom))
}
