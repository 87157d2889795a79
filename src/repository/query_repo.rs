// ==========================================
// Paie - read-side queries (employees, transaction table)
// ==========================================
// WHERE clauses are assembled from static fragments only; every value
// is bound through a `?` placeholder
// ==========================================

use crate::domain::employee::normalize_matricule;
use crate::domain::query::{
    clamp_limit, clamp_page, EmployeeFilter, EmployeeRow, Page, TablePage, TransactionFilter,
};
use crate::domain::transaction::TransactionView;
use crate::domain::types::EmployeeStatus;
use crate::repository::error::RepositoryResult;
use crate::repository::store::query_all;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Static WHERE fragments plus their bound values
#[derive(Default)]
struct WhereBuilder {
    clauses: Vec<&'static str>,
    values: Vec<Value>,
}

impl WhereBuilder {
    fn push(&mut self, clause: &'static str, values: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause);
        self.values.extend(values);
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// `%term%` for LIKE ... ESCAPE '\'
fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub struct QueryRepository<'c> {
    conn: &'c Connection,
}

impl<'c> QueryRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Employees with their line count and net for the period (or all
    /// periods when `period_id` is None). `page` is 1-based.
    pub fn list_employees(
        &self,
        period_id: Option<&str>,
        filter: &EmployeeFilter,
        page: usize,
        page_size: usize,
    ) -> RepositoryResult<Page<EmployeeRow>> {
        let (page, page_size) = clamp_page(page, page_size);

        let mut join_values = Vec::new();
        let join = match period_id {
            Some(id) => {
                join_values.push(Value::Text(id.to_string()));
                "JOIN payroll_transaction t ON t.employee_id = e.employee_id AND t.period_id = ?"
            }
            None => "LEFT JOIN payroll_transaction t ON t.employee_id = e.employee_id",
        };

        let mut wb = WhereBuilder::default();
        if let Some(search) = non_empty(&filter.search) {
            let pattern = like_pattern(search);
            wb.push(
                "(e.matricule_norm LIKE ? ESCAPE '\\' OR lower(e.nom_complet) LIKE ? ESCAPE '\\')",
                [Value::Text(pattern.clone()), Value::Text(pattern)],
            );
        }
        if let Some(statut) = filter.statut {
            wb.push("e.statut = ?", [Value::Text(statut.as_str().to_string())]);
        }

        let base = format!(
            "SELECT e.employee_id, e.matricule_raw, e.nom_complet, e.statut,
                    COUNT(t.transaction_id), COALESCE(SUM(t.amount_employee_cents), 0)
             FROM employee e
             {}{}
             GROUP BY e.employee_id",
            join,
            wb.sql()
        );

        let mut values = join_values;
        values.extend(wb.values.iter().cloned());

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM ({})", base),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let offset = (page - 1) * page_size;
        values.push(Value::Integer(page_size as i64));
        values.push(Value::Integer(offset as i64));
        let items = query_all(
            self.conn,
            &format!(
                "{} ORDER BY e.nom_complet, e.matricule_norm LIMIT ? OFFSET ?",
                base
            ),
            params_from_iter(values.iter()),
            |row| {
                let statut: String = row.get(3)?;
                Ok(EmployeeRow {
                    employee_id: row.get(0)?,
                    matricule: row.get(1)?,
                    nom_complet: row.get(2)?,
                    statut: statut.parse().unwrap_or(EmployeeStatus::Active),
                    transaction_count: row.get(4)?,
                    net_cents: row.get(5)?,
                })
            },
        )?;

        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Transactions joined with employee and period
    pub fn get_table(
        &self,
        offset: usize,
        limit: usize,
        filter: &TransactionFilter,
    ) -> RepositoryResult<TablePage> {
        let limit = clamp_limit(limit);

        let mut wb = WhereBuilder::default();
        if let Some(pay_date) = filter.pay_date {
            wb.push(
                "t.pay_date = ?",
                [Value::Text(pay_date.format("%Y-%m-%d").to_string())],
            );
        }
        if let Some(period_id) = non_empty(&filter.period_id) {
            wb.push("t.period_id = ?", [Value::Text(period_id.to_string())]);
        }
        if let Some(matricule) = non_empty(&filter.matricule) {
            wb.push("e.matricule_norm = ?", [Value::Text(normalize_matricule(matricule))]);
        }
        if let Some(pay_code) = non_empty(&filter.pay_code) {
            wb.push("t.pay_code = ?", [Value::Text(pay_code.to_string())]);
        }
        if let Some(budget_post) = non_empty(&filter.budget_post) {
            wb.push("t.budget_post = ?", [Value::Text(budget_post.to_string())]);
        }
        if let Some(job_category) = non_empty(&filter.job_category) {
            wb.push("t.job_category = ?", [Value::Text(job_category.to_string())]);
        }
        if let Some(search) = non_empty(&filter.search) {
            let pattern = like_pattern(search);
            wb.push(
                "(lower(e.nom_complet) LIKE ? ESCAPE '\\' OR e.matricule_norm LIKE ? ESCAPE '\\'
                  OR lower(t.pay_code) LIKE ? ESCAPE '\\')",
                [
                    Value::Text(pattern.clone()),
                    Value::Text(pattern.clone()),
                    Value::Text(pattern),
                ],
            );
        }

        let from = format!(
            "FROM payroll_transaction t
             JOIN employee e ON e.employee_id = t.employee_id
             JOIN pay_period p ON p.period_id = t.period_id
             LEFT JOIN pay_code_dim d ON d.pay_code = t.pay_code{}",
            wb.sql()
        );

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {}", from),
            params_from_iter(wb.values.iter()),
            |row| row.get(0),
        )?;

        let mut values = wb.values.clone();
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));
        let rows = query_all(
            self.conn,
            &format!(
                "SELECT t.transaction_id, t.pay_date, p.status, e.matricule_raw, e.nom_complet,
                        t.pay_code, d.label, t.pay_category, t.budget_post, t.job_category,
                        t.amount_employee_cents, t.amount_employer_cents, t.source_file,
                        t.source_row_no
                 {}
                 ORDER BY t.pay_date DESC, t.source_file, t.source_row_no
                 LIMIT ? OFFSET ?",
                from
            ),
            params_from_iter(values.iter()),
            |row| {
                Ok(TransactionView {
                    transaction_id: row.get(0)?,
                    pay_date: row.get(1)?,
                    period_status: row.get(2)?,
                    matricule: row.get(3)?,
                    nom_complet: row.get(4)?,
                    pay_code: row.get(5)?,
                    pay_code_label: row.get(6)?,
                    pay_category: row.get(7)?,
                    budget_post: row.get(8)?,
                    job_category: row.get(9)?,
                    amount_employee_cents: row.get(10)?,
                    amount_employer_cents: row.get(11)?,
                    source_file: row.get(12)?,
                    source_row_no: row.get(13)?,
                })
            },
        )?;

        Ok(TablePage {
            rows,
            total,
            offset,
            limit,
        })
    }
}
