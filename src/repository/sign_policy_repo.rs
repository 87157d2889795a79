// ==========================================
// Paie - sign_policy repository
// ==========================================

use crate::domain::types::SignCategory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::query_all;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub struct SignPolicyRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SignPolicyRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn set(&self, pay_code: &str, category: SignCategory) -> RepositoryResult<()> {
        let pay_code = pay_code.trim();
        if pay_code.is_empty() {
            return Err(RepositoryError::BusinessRuleViolation(
                "pay_code must not be empty".to_string(),
            ));
        }
        self.conn.execute(
            "INSERT INTO sign_policy (pay_code, sign, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(pay_code) DO UPDATE SET sign = excluded.sign, updated_at = excluded.updated_at",
            params![pay_code, category.sign(), Utc::now()],
        )?;
        Ok(())
    }

    /// Ordered by pay code
    pub fn list(&self) -> RepositoryResult<Vec<(String, SignCategory)>> {
        let rows: Vec<(String, i64)> = query_all(
            self.conn,
            "SELECT pay_code, sign FROM sign_policy ORDER BY pay_code",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|(code, sign)| SignCategory::from_sign(sign).map(|c| (code, c)))
            .collect())
    }

    pub fn load_map(&self) -> RepositoryResult<HashMap<String, SignCategory>> {
        Ok(self.list()?.into_iter().collect())
    }
}
