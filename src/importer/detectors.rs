// ==========================================
// Paie - column value detectors
// ==========================================
// Each detector scores a column sample in [0, 1]. Inputs are the
// non-empty cells of one column.
// ==========================================

use crate::importer::grid::CellValue;
use crate::importer::row_parser::{parse_amount, parse_date};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskSpec {
    pub min_len: usize,
    pub max_len: usize,
    /// Share of values that must follow the dominant mask
    pub min_coverage: f64,
    /// Max share of values with characters outside [A-Za-z0-9 -/.]
    pub max_noise: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detector {
    MaskDominance(MaskSpec),
    AllNumericRatio,
    AlphaTokenRatio,
    HighEntropyAlpha,
    DateParseRatio { min_ratio: f64 },
    NumberParseRatio { min_ratio: f64 },
    LowCardinalityHint { max_distinct_ratio: f64 },
    HighCardinalityHint { min_distinct_ratio: f64 },
    AvgLengthRange { min: f64, max: f64 },
    ContainsCommaRatio,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Validator {
    /// Fails when one value covers more than half the sample
    RejectConstant,
    MinUniqueness(f64),
}

fn texts(values: &[&CellValue]) -> Vec<String> {
    values.iter().map(|v| v.to_string().trim().to_string()).collect()
}

fn share(values: &[&CellValue], pred: impl Fn(&CellValue) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| pred(v)).count() as f64 / values.len() as f64
}

fn distinct_ratio(values: &[&CellValue]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let distinct: std::collections::HashSet<String> = texts(values).into_iter().collect();
    distinct.len() as f64 / values.len() as f64
}

/// 9 for digits, A for letters, '-' for separators, '?' otherwise
pub fn value_mask(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_digit() {
                '9'
            } else if c.is_alphabetic() {
                'A'
            } else if matches!(c, '-' | '/' | ' ' | '.') {
                '-'
            } else {
                '?'
            }
        })
        .collect()
}

fn mask_dominance(values: &[&CellValue], spec: &MaskSpec) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let texts = texts(values);
    let n = texts.len() as f64;

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut noisy = 0usize;
    let mut in_bounds = 0usize;
    for t in &texts {
        let mask = value_mask(t);
        if mask.contains('?') {
            noisy += 1;
        }
        let len = t.chars().count();
        if len >= spec.min_len && len <= spec.max_len {
            in_bounds += 1;
        }
        *counts.entry(mask).or_insert(0) += 1;
    }

    let dominant = counts.values().copied().max().unwrap_or(0) as f64 / n;
    if dominant < spec.min_coverage || noisy as f64 / n > spec.max_noise {
        return 0.0;
    }
    dominant * (in_bounds as f64 / n)
}

fn is_integral_text(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn shannon_entropy(s: &str) -> f64 {
    let letters: Vec<char> = s.chars().filter(|c| c.is_alphabetic()).flat_map(|c| c.to_lowercase()).collect();
    if letters.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in &letters {
        *counts.entry(*c).or_insert(0) += 1;
    }
    let n = letters.len() as f64;
    counts
        .values()
        .map(|&k| {
            let p = k as f64 / n;
            -p * p.log2()
        })
        .sum()
}

impl Detector {
    pub fn score(&self, values: &[&CellValue]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let raw = match self {
            Detector::MaskDominance(spec) => mask_dominance(values, spec),
            Detector::AllNumericRatio => share(values, |v| match v {
                CellValue::Int(_) => true,
                CellValue::Float(x) => x.fract() == 0.0,
                CellValue::Text(s) => is_integral_text(s.trim()),
                _ => false,
            }),
            Detector::AlphaTokenRatio => share(values, |v| {
                matches!(v, CellValue::Text(_))
                    && v.to_string()
                        .split(|c: char| !c.is_alphabetic())
                        .any(|token| token.chars().count() >= 2)
            }),
            Detector::HighEntropyAlpha => share(values, |v| {
                matches!(v, CellValue::Text(_)) && shannon_entropy(&v.to_string()) >= 2.5
            }),
            Detector::DateParseRatio { min_ratio } => {
                let ratio = share(values, |v| parse_date(v).is_ok());
                if ratio >= *min_ratio {
                    ratio
                } else {
                    0.0
                }
            }
            Detector::NumberParseRatio { min_ratio } => {
                let ratio = share(values, |v| !matches!(v, CellValue::Date(_)) && parse_amount(v).is_some());
                if ratio >= *min_ratio {
                    ratio
                } else {
                    0.0
                }
            }
            Detector::LowCardinalityHint { max_distinct_ratio } => {
                let ratio = distinct_ratio(values);
                if ratio <= *max_distinct_ratio {
                    1.0
                } else if *max_distinct_ratio >= 1.0 {
                    0.0
                } else {
                    (1.0 - (ratio - max_distinct_ratio) / (1.0 - max_distinct_ratio)).max(0.0)
                }
            }
            Detector::HighCardinalityHint { min_distinct_ratio } => {
                let ratio = distinct_ratio(values);
                if ratio >= *min_distinct_ratio || *min_distinct_ratio <= 0.0 {
                    1.0
                } else {
                    ratio / min_distinct_ratio
                }
            }
            Detector::AvgLengthRange { min, max } => {
                let texts = texts(values);
                let avg = texts.iter().map(|t| t.chars().count()).sum::<usize>() as f64 / texts.len() as f64;
                if avg >= *min && avg <= *max {
                    1.0
                } else if avg < *min {
                    (avg / min).max(0.0)
                } else {
                    (max / avg).max(0.0)
                }
            }
            Detector::ContainsCommaRatio => share(values, |v| v.to_string().contains(',')),
        };
        raw.clamp(0.0, 1.0)
    }
}

impl Validator {
    pub fn passes(&self, values: &[&CellValue]) -> bool {
        if values.is_empty() {
            return true;
        }
        match self {
            Validator::RejectConstant => {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for t in texts(values) {
                    *counts.entry(t).or_insert(0) += 1;
                }
                let top = counts.values().copied().max().unwrap_or(0) as f64;
                top / values.len() as f64 <= 0.5
            }
            Validator::MinUniqueness(min) => distinct_ratio(values) >= *min,
        }
    }
}

/// Weighted average of detector scores
pub fn weighted_score(detectors: &[(Detector, f64)], values: &[&CellValue]) -> f64 {
    let total_weight: f64 = detectors.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    detectors
        .iter()
        .map(|(d, w)| d.score(values) * w)
        .sum::<f64>()
        / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Text(v.to_string())).collect()
    }

    fn refs(cells: &[CellValue]) -> Vec<&CellValue> {
        cells.iter().collect()
    }

    #[test]
    fn test_value_mask() {
        assert_eq!(value_mask("A-1001"), "A-9999");
        assert_eq!(value_mask("0-101"), "9-999");
        assert_eq!(value_mask("x@y"), "A?A");
    }

    #[test]
    fn test_date_ratio_requires_minimum() {
        let c = cells(&["2025-08-28", "28/08/2025", "hier", "demain"]);
        assert_eq!(Detector::DateParseRatio { min_ratio: 0.8 }.score(&refs(&c)), 0.0);
        let c = cells(&["2025-08-28", "2025-08-28", "2025-08-28"]);
        assert_eq!(Detector::DateParseRatio { min_ratio: 0.8 }.score(&refs(&c)), 1.0);
    }

    #[test]
    fn test_number_and_mask_detectors() {
        let amounts = cells(&["1 000,00", "-45,10", "(12)", "3.5"]);
        assert_eq!(Detector::NumberParseRatio { min_ratio: 0.8 }.score(&refs(&amounts)), 1.0);

        let codes = cells(&["100", "200", "300", "1050"]);
        let spec = MaskSpec { min_len: 1, max_len: 8, min_coverage: 0.6, max_noise: 0.2 };
        assert_eq!(Detector::MaskDominance(spec).score(&refs(&codes)), 0.75);
    }

    #[test]
    fn test_cardinality_hints() {
        let constant = cells(&["Gains", "Gains", "Gains", "Retenues"]);
        assert_eq!(
            Detector::LowCardinalityHint { max_distinct_ratio: 0.5 }.score(&refs(&constant)),
            1.0
        );
        assert!(!Validator::RejectConstant.passes(&refs(&constant)));

        let unique = cells(&["a1", "a2", "a3", "a4"]);
        assert_eq!(
            Detector::HighCardinalityHint { min_distinct_ratio: 0.5 }.score(&refs(&unique)),
            1.0
        );
        assert!(Validator::MinUniqueness(0.9).passes(&refs(&unique)));
    }

    #[test]
    fn test_names_score_high_on_entropy() {
        let names = cells(&["Tremblay, Marie", "Gagnon, Jean-Luc", "Roy, Sophie"]);
        assert_eq!(Detector::HighEntropyAlpha.score(&refs(&names)), 1.0);
        assert_eq!(Detector::ContainsCommaRatio.score(&refs(&names)), 1.0);
        let codes = cells(&["100", "200"]);
        assert_eq!(Detector::HighEntropyAlpha.score(&refs(&codes)), 0.0);
    }
}
