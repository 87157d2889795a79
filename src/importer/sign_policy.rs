// ==========================================
// Paie - sign policy
// ==========================================
// Gain -> +|x|, Deduction -> -|x|, Neutral keeps the source sign.
// Unknown pay codes use the configured default.
// ==========================================

use crate::domain::types::SignCategory;
use crate::importer::row_parser::ParsedRow;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SignPolicy {
    categories: HashMap<String, SignCategory>,
    default: SignCategory,
}

impl SignPolicy {
    pub fn new(categories: HashMap<String, SignCategory>, default: SignCategory) -> Self {
        Self {
            categories,
            default,
        }
    }

    pub fn category(&self, pay_code: &str) -> SignCategory {
        self.categories
            .get(pay_code.trim())
            .copied()
            .unwrap_or(self.default)
    }

    pub fn signed_amount(&self, pay_code: &str, amount_cents: i64) -> i64 {
        match self.category(pay_code) {
            SignCategory::Gain => amount_cents.abs(),
            SignCategory::Deduction => -amount_cents.abs(),
            SignCategory::Neutral => amount_cents,
        }
    }

    /// Re-signs employee amounts in place; returns how many changed
    pub fn apply(&self, rows: &mut [ParsedRow]) -> usize {
        let mut changed = 0;
        for row in rows.iter_mut() {
            let signed = self.signed_amount(&row.pay_code, row.amount_cents);
            if signed != row.amount_cents {
                row.amount_cents = signed;
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SignPolicy {
        let mut map = HashMap::new();
        map.insert("100".to_string(), SignCategory::Gain);
        map.insert("510".to_string(), SignCategory::Deduction);
        SignPolicy::new(map, SignCategory::Neutral)
    }

    #[test]
    fn test_categories_force_sign() {
        let p = policy();
        assert_eq!(p.signed_amount("100", -1500), 1500);
        assert_eq!(p.signed_amount("510", 25035), -25035);
        assert_eq!(p.signed_amount("510", -25035), -25035);
    }

    #[test]
    fn test_unknown_code_uses_default() {
        let p = policy();
        assert_eq!(p.signed_amount("999", -42), -42);

        let strict = SignPolicy::new(HashMap::new(), SignCategory::Deduction);
        assert_eq!(strict.signed_amount("999", 42), -42);
    }
}
