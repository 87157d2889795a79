// ==========================================
// Paie - column mapper / schema detector
// ==========================================
// confidence = 0.55 * value + 0.45 * header
//   value  = weighted detector average (x0.3 when a validator fails)
//   header = 1.0 exact alias, 0.7 alias contained, else 0
// Assignment:
//   1. exact French aliases resolve first
//   2. remaining fields greedily by priority, best free column
//   3. 15 columns without any alias hit -> canonical positions
// ==========================================

use crate::domain::profile::ColumnMapping;
use crate::domain::types::LogicalField;
use crate::importer::detectors::{weighted_score, Detector, MaskSpec, Validator};
use crate::importer::grid::{CellValue, GridRow};
use crate::importer::header::{exact_alias_field, header_score, header_signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const VALUE_WEIGHT: f64 = 0.55;
pub const HEADER_WEIGHT: f64 = 0.45;
pub const VALIDATOR_PENALTY: f64 = 0.3;
pub const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    /// confidence >= accept threshold
    Accepted,
    /// warn <= confidence < accept: mapped, reported as a warning
    Uncertain,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub column: usize,
    pub header: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResolution {
    pub field: LogicalField,
    pub column: Option<usize>,
    pub header: Option<String>,
    pub confidence: f64,
    pub status: ResolutionStatus,
    pub alternatives: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingResult {
    pub fields: BTreeMap<LogicalField, FieldResolution>,
    pub warnings: Vec<String>,
    pub header_signature: String,
    pub positional_fallback: bool,
}

impl MappingResult {
    /// Accepted and uncertain fields
    pub fn mapping(&self) -> ColumnMapping {
        let mut mapping = ColumnMapping::new();
        for (field, res) in &self.fields {
            if let (Some(column), ResolutionStatus::Accepted | ResolutionStatus::Uncertain) =
                (res.column, res.status)
            {
                mapping.set(*field, column);
            }
        }
        mapping
    }

    /// Required fields below the accept threshold. An uncertain match
    /// still counts as unresolved for a required field; only optional
    /// fields are loaded on an uncertain match.
    pub fn unresolved_required(&self) -> Vec<LogicalField> {
        LogicalField::CANONICAL_ORDER
            .iter()
            .copied()
            .filter(|f| f.is_required())
            .filter(|f| {
                self.fields
                    .get(f)
                    .map(|r| r.status != ResolutionStatus::Accepted)
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Mean confidence over mapped fields
    pub fn overall_confidence(&self) -> f64 {
        let mapped: Vec<f64> = self
            .fields
            .values()
            .filter(|r| r.column.is_some())
            .map(|r| r.confidence)
            .collect();
        if mapped.is_empty() {
            0.0
        } else {
            mapped.iter().sum::<f64>() / mapped.len() as f64
        }
    }
}

/// Mapping proposal returned by `preview_file`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingPreview {
    pub original_headers: Vec<String>,
    pub normalized_headers: Vec<String>,
    pub mapping: MappingResult,
    /// First rows rendered as text
    pub sample_rows: Vec<Vec<String>>,
    pub profile_matched: bool,
    pub unresolved_required: Vec<LogicalField>,
}

struct FieldProfile {
    detectors: Vec<(Detector, f64)>,
    validators: Vec<Validator>,
}

fn mask(min_len: usize, max_len: usize) -> Detector {
    Detector::MaskDominance(MaskSpec {
        min_len,
        max_len,
        min_coverage: 0.6,
        max_noise: 0.2,
    })
}

fn profile_for(field: LogicalField) -> FieldProfile {
    use Detector::*;
    let (detectors, validators) = match field {
        LogicalField::LineNumber => (
            vec![
                (AllNumericRatio, 2.0),
                (HighCardinalityHint { min_distinct_ratio: 0.8 }, 1.0),
                (AvgLengthRange { min: 1.0, max: 6.0 }, 1.0),
            ],
            vec![Validator::MinUniqueness(0.5)],
        ),
        LogicalField::JobCategory => (
            vec![(AlphaTokenRatio, 2.0), (LowCardinalityHint { max_distinct_ratio: 0.3 }, 1.0)],
            vec![],
        ),
        LogicalField::JobCode => (
            vec![(mask(1, 10), 2.0), (LowCardinalityHint { max_distinct_ratio: 0.5 }, 1.0)],
            vec![],
        ),
        LogicalField::JobTitle => (
            vec![
                (AlphaTokenRatio, 2.0),
                (AvgLengthRange { min: 5.0, max: 60.0 }, 1.0),
                (LowCardinalityHint { max_distinct_ratio: 0.5 }, 1.0),
            ],
            vec![],
        ),
        LogicalField::PayDate => (
            vec![
                (DateParseRatio { min_ratio: 0.8 }, 3.0),
                (LowCardinalityHint { max_distinct_ratio: 0.2 }, 1.0),
            ],
            vec![],
        ),
        LogicalField::Matricule => (
            vec![(mask(1, 12), 2.0), (AvgLengthRange { min: 2.0, max: 12.0 }, 1.0)],
            vec![],
        ),
        LogicalField::EmployeeName => (
            vec![
                (HighEntropyAlpha, 2.0),
                (ContainsCommaRatio, 1.0),
                (AvgLengthRange { min: 5.0, max: 60.0 }, 1.0),
            ],
            vec![Validator::RejectConstant],
        ),
        LogicalField::PayCategory => (
            vec![(AlphaTokenRatio, 2.0), (LowCardinalityHint { max_distinct_ratio: 0.2 }, 2.0)],
            vec![],
        ),
        LogicalField::PayCode => (
            vec![
                (mask(1, 8), 2.0),
                (LowCardinalityHint { max_distinct_ratio: 0.5 }, 1.0),
                (AvgLengthRange { min: 1.0, max: 8.0 }, 1.0),
            ],
            vec![],
        ),
        LogicalField::PayCodeLabel | LogicalField::BudgetPostLabel => (
            vec![(AlphaTokenRatio, 2.0), (AvgLengthRange { min: 4.0, max: 80.0 }, 1.0)],
            vec![],
        ),
        LogicalField::BudgetPost => (
            vec![(mask(3, 20), 2.0), (LowCardinalityHint { max_distinct_ratio: 0.5 }, 1.0)],
            vec![],
        ),
        LogicalField::Amount => (
            vec![
                (NumberParseRatio { min_ratio: 0.8 }, 3.0),
                (HighCardinalityHint { min_distinct_ratio: 0.3 }, 1.0),
            ],
            vec![Validator::RejectConstant],
        ),
        LogicalField::EmployerShare | LogicalField::CombinedAmount => {
            (vec![(NumberParseRatio { min_ratio: 0.8 }, 3.0)], vec![])
        }
    };
    FieldProfile {
        detectors,
        validators,
    }
}

/// Value score of one column for one field, validators applied
pub fn value_score(field: LogicalField, values: &[&CellValue]) -> f64 {
    let profile = profile_for(field);
    let mut score = weighted_score(&profile.detectors, values);
    if profile.validators.iter().any(|v| !v.passes(values)) {
        score *= VALIDATOR_PENALTY;
    }
    score
}

pub fn combine(value: f64, header: f64) -> f64 {
    (VALUE_WEIGHT * value + HEADER_WEIGHT * header).clamp(0.0, 1.0)
}

#[derive(Debug, Clone)]
pub struct ColumnMapper {
    pub accept_threshold: f64,
    pub warn_threshold: f64,
}

impl ColumnMapper {
    pub fn new(accept_threshold: f64, warn_threshold: f64) -> Self {
        Self {
            accept_threshold,
            warn_threshold,
        }
    }

    fn status_for(&self, confidence: f64) -> ResolutionStatus {
        if confidence >= self.accept_threshold {
            ResolutionStatus::Accepted
        } else if confidence >= self.warn_threshold {
            ResolutionStatus::Uncertain
        } else {
            ResolutionStatus::Unresolved
        }
    }

    /// `headers` are normalized, `sample` is at most `sample_rows` rows
    pub fn detect(&self, headers: &[String], sample: &[&GridRow]) -> MappingResult {
        let n_cols = headers.len();
        let column_values: Vec<Vec<&CellValue>> = (0..n_cols)
            .map(|c| {
                sample
                    .iter()
                    .map(|r| r.cell(c))
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .collect();

        // scores[field][column] = (confidence, header score)
        let mut scores: BTreeMap<LogicalField, Vec<(f64, f64)>> = BTreeMap::new();
        for field in LogicalField::CANONICAL_ORDER {
            let row: Vec<(f64, f64)> = (0..n_cols)
                .map(|c| {
                    let h = header_score(&headers[c], field);
                    let v = value_score(field, &column_values[c]);
                    (combine(v, h), h)
                })
                .collect();
            scores.insert(field, row);
        }

        let any_alias_hit = scores.values().flatten().any(|(_, h)| *h > 0.0);
        let positional = !any_alias_hit && n_cols == LogicalField::CANONICAL_ORDER.len();

        let mut assigned: BTreeMap<LogicalField, (usize, f64)> = BTreeMap::new();
        let mut taken = vec![false; n_cols];
        let mut warnings = Vec::new();

        if positional {
            for (column, field) in LogicalField::CANONICAL_ORDER.iter().enumerate() {
                let confidence = scores[field][column].0.max(self.accept_threshold);
                assigned.insert(*field, (column, confidence));
                taken[column] = true;
            }
            warnings.push("no known header: canonical 15-column order assumed".to_string());
        } else {
            let mut by_priority = LogicalField::CANONICAL_ORDER.to_vec();
            by_priority.sort_by(|a, b| b.priority().cmp(&a.priority()));

            // exact aliases always resolve
            for field in &by_priority {
                let hit = (0..n_cols)
                    .find(|&c| !taken[c] && exact_alias_field(&headers[c]) == Some(*field));
                if let Some(column) = hit {
                    let confidence = scores[field][column].0.max(self.accept_threshold);
                    assigned.insert(*field, (column, confidence));
                    taken[column] = true;
                }
            }

            for field in &by_priority {
                if assigned.contains_key(field) {
                    continue;
                }
                let best = (0..n_cols)
                    .filter(|&c| !taken[c])
                    .max_by(|&a, &b| {
                        let (ca, ha) = scores[field][a];
                        let (cb, hb) = scores[field][b];
                        ca.total_cmp(&cb)
                            .then(ha.total_cmp(&hb))
                            .then(b.cmp(&a))
                    });
                if let Some(column) = best {
                    let confidence = scores[field][column].0;
                    if confidence >= self.warn_threshold {
                        assigned.insert(*field, (column, confidence));
                        taken[column] = true;
                    }
                }
            }
        }

        let mut fields = BTreeMap::new();
        for field in LogicalField::CANONICAL_ORDER {
            let chosen = assigned.get(&field).copied();
            let mut alternatives: Vec<Candidate> = (0..n_cols)
                .filter(|c| Some(*c) != chosen.map(|(col, _)| col))
                .map(|c| Candidate {
                    column: c,
                    header: headers[c].clone(),
                    confidence: scores[&field][c].0,
                })
                .filter(|cand| cand.confidence > 0.0)
                .collect();
            alternatives.sort_by(|a, b| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then(a.column.cmp(&b.column))
            });
            alternatives.truncate(MAX_ALTERNATIVES);

            let resolution = match chosen {
                Some((column, confidence)) => {
                    let status = self.status_for(confidence);
                    if status == ResolutionStatus::Uncertain {
                        warnings.push(format!(
                            "low confidence for {} (column '{}'): {:.2}",
                            field, headers[column], confidence
                        ));
                    }
                    FieldResolution {
                        field,
                        column: Some(column),
                        header: Some(headers[column].clone()),
                        confidence,
                        status,
                        alternatives,
                    }
                }
                None => FieldResolution {
                    field,
                    column: None,
                    header: None,
                    confidence: 0.0,
                    status: ResolutionStatus::Unresolved,
                    alternatives,
                },
            };
            fields.insert(field, resolution);
        }

        MappingResult {
            fields,
            warnings,
            header_signature: header_signature(headers),
            positional_fallback: positional,
        }
    }

    /// Result for a mapping supplied by a caller or a stored profile
    pub fn from_mapping(&self, headers: &[String], mapping: &ColumnMapping, confidence: f64) -> MappingResult {
        let mut fields = BTreeMap::new();
        for field in LogicalField::CANONICAL_ORDER {
            let column = mapping.get(field).filter(|c| *c < headers.len());
            fields.insert(
                field,
                FieldResolution {
                    field,
                    column,
                    header: column.map(|c| headers[c].clone()),
                    confidence: if column.is_some() { confidence } else { 0.0 },
                    status: if column.is_some() {
                        self.status_for(confidence)
                    } else {
                        ResolutionStatus::Unresolved
                    },
                    alternatives: Vec::new(),
                },
            );
        }
        MappingResult {
            fields,
            warnings: Vec::new(),
            header_signature: header_signature(headers),
            positional_fallback: false,
        }
    }
}
