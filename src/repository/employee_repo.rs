// ==========================================
// Paie - employee repository
// ==========================================
// Upsert key: matricule_norm. Orphan detection backs the period
// deletion cascade
// ==========================================

use crate::domain::employee::{Employee, EmployeeIdentity};
use crate::domain::types::EmployeeStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::store::query_all;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

const EMPLOYEE_COLUMNS: &str =
    "employee_id, matricule_raw, matricule_norm, nom, prenom, nom_complet, statut, created_at, updated_at";

#[derive(Debug, Default)]
pub struct UpsertOutcome {
    /// matricule_norm -> employee_id
    pub ids: HashMap<String, String>,
    pub created: usize,
    pub updated: usize,
}

pub struct EmployeeRepository<'c> {
    conn: &'c Connection,
}

impl<'c> EmployeeRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
        let statut: String = row.get(6)?;
        Ok(Employee {
            employee_id: row.get(0)?,
            matricule_raw: row.get(1)?,
            matricule_norm: row.get(2)?,
            nom: row.get(3)?,
            prenom: row.get(4)?,
            nom_complet: row.get(5)?,
            statut: statut.parse().unwrap_or(EmployeeStatus::Active),
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    /// Inserts unseen matricules as `active`, refreshes names of known
    /// ones. Identities must be unique by matricule_norm.
    pub fn upsert_many<C>(&self, identities: &[EmployeeIdentity], mut on_row: C) -> RepositoryResult<UpsertOutcome>
    where
        C: FnMut(usize) -> RepositoryResult<()>,
    {
        let mut stmt = self.conn.prepare_cached(
            r#"
            INSERT INTO employee (employee_id, matricule_raw, matricule_norm, nom, prenom,
                                  nom_complet, statut, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', ?7, ?7)
            ON CONFLICT(matricule_norm) DO UPDATE SET
                nom = COALESCE(excluded.nom, employee.nom),
                prenom = COALESCE(excluded.prenom, employee.prenom),
                nom_complet = CASE WHEN excluded.nom_complet <> '' THEN excluded.nom_complet
                                   ELSE employee.nom_complet END,
                updated_at = excluded.updated_at
            RETURNING employee_id
            "#,
        )?;

        let mut outcome = UpsertOutcome::default();
        let now = Utc::now();
        for (i, identity) in identities.iter().enumerate() {
            let proposed = Uuid::new_v4().to_string();
            let employee_id: String = stmt.query_row(
                params![
                    proposed,
                    identity.matricule_raw,
                    identity.matricule_norm,
                    identity.nom,
                    identity.prenom,
                    identity.nom_complet,
                    now
                ],
                |row| row.get(0),
            )?;

            if employee_id == proposed {
                outcome.created += 1;
            } else {
                outcome.updated += 1;
            }
            outcome.ids.insert(identity.matricule_norm.clone(), employee_id);
            on_row(i + 1)?;
        }

        Ok(outcome)
    }

    pub fn find_by_matricule(&self, matricule_norm: &str) -> RepositoryResult<Option<Employee>> {
        let sql = format!("SELECT {} FROM employee WHERE matricule_norm = ?1", EMPLOYEE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![matricule_norm], Self::map_row)
            .optional()?)
    }

    pub fn count_all(&self) -> RepositoryResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM employee", [], |row| row.get(0))?)
    }

    /// Distinct employees with at least one transaction in the period
    pub fn count_for_period(&self, period_id: &str) -> RepositoryResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(DISTINCT employee_id) FROM payroll_transaction WHERE period_id = ?1",
            params![period_id],
            |row| row.get(0),
        )?)
    }

    /// Employees whose every transaction belongs to `period_id`
    pub fn orphan_ids_for_period(&self, period_id: &str) -> RepositoryResult<Vec<String>> {
        query_all(
            self.conn,
            r#"
            SELECT DISTINCT t.employee_id
            FROM payroll_transaction t
            WHERE t.period_id = ?1
              AND NOT EXISTS (
                  SELECT 1 FROM payroll_transaction o
                  WHERE o.employee_id = t.employee_id AND o.period_id <> ?1
              )
            ORDER BY t.employee_id
            "#,
            params![period_id],
            |row| row.get(0),
        )
    }

    /// Deletes the given employees; foreign keys reject any still referenced
    pub fn delete_ids(&self, employee_ids: &[String]) -> RepositoryResult<usize> {
        let mut stmt = self
            .conn
            .prepare_cached("DELETE FROM employee WHERE employee_id = ?1")?;
        let mut deleted = 0;
        for id in employee_ids {
            deleted += stmt.execute(params![id])?;
        }
        Ok(deleted)
    }

    /// Soft delete; refused while any transaction references the employee
    pub fn deactivate(&self, employee_id: &str) -> RepositoryResult<()> {
        let referenced: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM payroll_transaction WHERE employee_id = ?1",
            params![employee_id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "employee {} still referenced by {} transactions",
                employee_id, referenced
            )));
        }

        let updated = self.conn.execute(
            "UPDATE employee SET statut = 'inactive', updated_at = ?2 WHERE employee_id = ?1",
            params![employee_id, Utc::now()],
        )?;
        if updated == 0 {
            return Err(RepositoryError::not_found("employee", employee_id));
        }
        Ok(())
    }
}
