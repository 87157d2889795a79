// ==========================================
// Paie - column mapping and ingestion profiles
// ==========================================
// A profile is keyed by (client_key, header_signature). It stores the
// mapping by normalized header name so the column order of a later file
// with the same headers does not matter
// ==========================================

use crate::domain::types::LogicalField;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical field -> source column index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub columns: BTreeMap<LogicalField, usize>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: LogicalField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn set(&mut self, field: LogicalField, column: usize) {
        self.columns.insert(field, column);
    }

    pub fn field_for_column(&self, column: usize) -> Option<LogicalField> {
        self.columns
            .iter()
            .find(|(_, c)| **c == column)
            .map(|(f, _)| *f)
    }

    pub fn missing_required(&self) -> Vec<LogicalField> {
        LogicalField::CANONICAL_ORDER
            .iter()
            .copied()
            .filter(|f| f.is_required() && !self.columns.contains_key(f))
            .collect()
    }

    /// Mapping expressed by normalized header name, for persistence
    pub fn to_header_map(&self, normalized_headers: &[String]) -> BTreeMap<LogicalField, String> {
        self.columns
            .iter()
            .filter_map(|(f, c)| normalized_headers.get(*c).map(|h| (*f, h.clone())))
            .collect()
    }

    /// Rebuilds column indices from a stored header map; returns None when a
    /// stored header is absent from this file
    pub fn from_header_map(
        header_map: &BTreeMap<LogicalField, String>,
        normalized_headers: &[String],
    ) -> Option<Self> {
        let mut mapping = ColumnMapping::new();
        for (field, header) in header_map {
            let column = normalized_headers.iter().position(|h| h == header)?;
            mapping.set(*field, column);
        }
        Some(mapping)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionProfile {
    pub profile_id: String,
    pub client_key: String,
    pub header_signature: String,
    pub mapping: BTreeMap<LogicalField, String>,
    pub options: serde_json::Value,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_survives_column_reorder() {
        let headers_a = vec!["matricule".to_string(), "montant".to_string()];
        let headers_b = vec!["montant".to_string(), "matricule".to_string()];

        let mut mapping = ColumnMapping::new();
        mapping.set(LogicalField::Matricule, 0);
        mapping.set(LogicalField::Amount, 1);

        let stored = mapping.to_header_map(&headers_a);
        let rebuilt = ColumnMapping::from_header_map(&stored, &headers_b).unwrap();
        assert_eq!(rebuilt.get(LogicalField::Matricule), Some(1));
        assert_eq!(rebuilt.get(LogicalField::Amount), Some(0));
    }

    #[test]
    fn test_missing_required_lists_all_when_empty() {
        let mapping = ColumnMapping::new();
        assert_eq!(mapping.missing_required().len(), 9);
    }

    #[test]
    fn test_mapping_serializes_with_field_names() {
        let mut mapping = ColumnMapping::new();
        mapping.set(LogicalField::PayDate, 4);
        let json = serde_json::to_string(&mapping).unwrap();
        assert!(json.contains("\"pay_date\":4"));
    }
}
