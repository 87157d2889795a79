// ==========================================
// Paie - ingestion_profile repository
// ==========================================
// Key: (client_key, header_signature). mapping_json is the
// field -> normalized header map
// ==========================================

use crate::domain::profile::IngestionProfile;
use crate::domain::types::LogicalField;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use uuid::Uuid;

pub struct ProfileRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ProfileRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, client_key: &str, header_signature: &str) -> RepositoryResult<Option<IngestionProfile>> {
        let row = self
            .conn
            .query_row(
                "SELECT profile_id, client_key, header_signature, mapping_json, options_json,
                        confidence, created_at, updated_at
                 FROM ingestion_profile
                 WHERE client_key = ?1 AND header_signature = ?2",
                params![client_key, header_signature],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, f64>(5)?,
                        row.get::<_, DateTime<Utc>>(6)?,
                        row.get::<_, DateTime<Utc>>(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((profile_id, client_key, header_signature, mapping_json, options_json, confidence, created_at, updated_at)) =
            row
        else {
            return Ok(None);
        };

        let mapping: BTreeMap<LogicalField, String> = serde_json::from_str(&mapping_json)?;
        let options: serde_json::Value = serde_json::from_str(&options_json)?;
        Ok(Some(IngestionProfile {
            profile_id,
            client_key,
            header_signature,
            mapping,
            options,
            confidence,
            created_at,
            updated_at,
        }))
    }

    /// Insert or replace the mapping of (client_key, signature)
    pub fn upsert(
        &self,
        client_key: &str,
        header_signature: &str,
        mapping: &BTreeMap<LogicalField, String>,
        options: &serde_json::Value,
        confidence: f64,
    ) -> RepositoryResult<()> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO ingestion_profile (profile_id, client_key, header_signature, mapping_json,
                                            options_json, confidence, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT(client_key, header_signature) DO UPDATE SET
                 mapping_json = excluded.mapping_json,
                 options_json = excluded.options_json,
                 confidence = excluded.confidence,
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                client_key,
                header_signature,
                serde_json::to_string(mapping)?,
                serde_json::to_string(options)?,
                confidence,
                now
            ],
        )?;
        Ok(())
    }
}
