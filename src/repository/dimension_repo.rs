// ==========================================
// Paie - pay code / budget post dimensions
// ==========================================

use crate::repository::error::RepositoryResult;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// Pay code -> (label, category), budget post -> label
#[derive(Debug, Default, Clone)]
pub struct DimensionSet {
    pub pay_codes: BTreeMap<String, (Option<String>, Option<String>)>,
    pub budget_posts: BTreeMap<String, Option<String>>,
}

impl DimensionSet {
    /// Later non-empty labels win over earlier ones
    pub fn add_pay_code(&mut self, code: &str, label: Option<&str>, category: Option<&str>) {
        let entry = self.pay_codes.entry(code.to_string()).or_insert((None, None));
        if let Some(l) = label.filter(|l| !l.is_empty()) {
            entry.0 = Some(l.to_string());
        }
        if let Some(c) = category.filter(|c| !c.is_empty()) {
            entry.1 = Some(c.to_string());
        }
    }

    pub fn add_budget_post(&mut self, code: &str, label: Option<&str>) {
        let entry = self.budget_posts.entry(code.to_string()).or_insert(None);
        if let Some(l) = label.filter(|l| !l.is_empty()) {
            *entry = Some(l.to_string());
        }
    }
}

pub struct DimensionRepository<'c> {
    conn: &'c Connection,
}

impl<'c> DimensionRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Returns (pay codes written, budget posts written)
    pub fn upsert(&self, dims: &DimensionSet) -> RepositoryResult<(usize, usize)> {
        let now = Utc::now();

        let mut codes = self.conn.prepare_cached(
            "INSERT INTO pay_code_dim (pay_code, label, category, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pay_code) DO UPDATE SET
                 label = COALESCE(excluded.label, pay_code_dim.label),
                 category = COALESCE(excluded.category, pay_code_dim.category),
                 updated_at = excluded.updated_at",
        )?;
        let mut code_count = 0;
        for (code, (label, category)) in &dims.pay_codes {
            code_count += codes.execute(params![code, label, category, now])?;
        }

        let mut posts = self.conn.prepare_cached(
            "INSERT INTO budget_post_dim (code, label, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(code) DO UPDATE SET
                 label = COALESCE(excluded.label, budget_post_dim.label),
                 updated_at = excluded.updated_at",
        )?;
        let mut post_count = 0;
        for (code, label) in &dims.budget_posts {
            post_count += posts.execute(params![code, label, now])?;
        }

        Ok((code_count, post_count))
    }

    pub fn pay_code_label(&self, pay_code: &str) -> RepositoryResult<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT label FROM pay_code_dim WHERE pay_code = ?1",
                params![pay_code],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten())
    }
}
