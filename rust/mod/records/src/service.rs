use std::sync::Arc;

use pcbtrace_core::{PageParams, Pagination, ServiceError};
use pcbtrace_sql::{Row, SQLExecutor, SQLStore, Value};

use crate::model::{ManufacturingRecord, TableStats};
use crate::schema::{self, Field};

const RECENCY: &str = "ORDER BY created_at DESC, rowid DESC";

/// Read-only access to `manufacturing_data`.
pub struct RecordService {
    pub(crate) sql: Arc<dyn SQLStore>,
}

/// One page of records plus its pagination block.
#[derive(Debug, Clone)]
pub struct Page {
    pub items: Vec<ManufacturingRecord>,
    pub pagination: Pagination,
}

fn storage(e: pcbtrace_sql::SQLError) -> ServiceError {
    ServiceError::Storage(e.to_string())
}

impl RecordService {
    pub fn new(sql: Arc<dyn SQLStore>) -> Self {
        Self { sql }
    }

    /// Point lookup by PCB serial number.
    pub fn get_by_pcb(&self, pcb_sr_no: &str) -> Result<Option<ManufacturingRecord>, ServiceError> {
        let sql = format!("SELECT * FROM {} WHERE pcb_sr_no = ?1", schema::TABLE);
        let rows = self
            .sql
            .query(&sql, &[Value::from(pcb_sr_no)])
            .map_err(storage)?;
        rows.first().map(ManufacturingRecord::from_row).transpose()
    }

    pub fn list_by_lot(&self, lot_no: &str) -> Result<Vec<ManufacturingRecord>, ServiceError> {
        self.list_by(Field::LotNo, lot_no)
    }

    pub fn list_by_model(&self, model: &str) -> Result<Vec<ManufacturingRecord>, ServiceError> {
        self.list_by(Field::Model, model)
    }

    /// All records whose `field` equals `value`, newest first.
    fn list_by(&self, field: Field, value: &str) -> Result<Vec<ManufacturingRecord>, ServiceError> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?1 {}",
            schema::TABLE,
            field.column(),
            RECENCY
        );
        let rows = self.sql.query(&sql, &[Value::from(value)]).map_err(storage)?;
        to_records(&rows)
    }

    /// Page through the whole table, newest first.
    pub fn list_page(&self, params: &PageParams) -> Result<Page, ServiceError> {
        let total = self.count()?;
        let sql = format!(
            "SELECT * FROM {} {} LIMIT ?1 OFFSET ?2",
            schema::TABLE,
            RECENCY
        );
        let rows = self
            .sql
            .query(
                &sql,
                &[
                    Value::Integer(params.per_page() as i64),
                    Value::Integer(i64::try_from(params.offset()).unwrap_or(i64::MAX)),
                ],
            )
            .map_err(storage)?;

        Ok(Page {
            items: to_records(&rows)?,
            pagination: Pagination::new(params.page(), params.per_page(), total),
        })
    }

    /// The `limit` most recent records.
    pub fn recent(&self, limit: u64) -> Result<Vec<ManufacturingRecord>, ServiceError> {
        let sql = format!("SELECT * FROM {} {} LIMIT ?1", schema::TABLE, RECENCY);
        let rows = self
            .sql
            .query(&sql, &[Value::Integer(limit as i64)])
            .map_err(storage)?;
        to_records(&rows)
    }

    pub fn count(&self) -> Result<u64, ServiceError> {
        let sql = format!("SELECT COUNT(*) AS cnt FROM {}", schema::TABLE);
        let rows = self.sql.query(&sql, &[]).map_err(storage)?;
        Ok(first_count(&rows, "cnt"))
    }

    /// Total and distinct counts, computed in one scan.
    pub fn stats(&self) -> Result<TableStats, ServiceError> {
        let sql = format!(
            "SELECT
                COUNT(*) AS total,
                COUNT(DISTINCT lot_no) AS unique_lots,
                COUNT(DISTINCT model) AS unique_models,
                COUNT(DISTINCT part_code) AS unique_parts,
                COUNT(DISTINCT ticket_no) AS unique_tickets
            FROM {}",
            schema::TABLE
        );
        let rows = self.sql.query(&sql, &[]).map_err(storage)?;
        Ok(TableStats {
            total_records: first_count(&rows, "total"),
            unique_lot_numbers: first_count(&rows, "unique_lots"),
            unique_models: first_count(&rows, "unique_models"),
            unique_part_codes: first_count(&rows, "unique_parts"),
            unique_tickets: first_count(&rows, "unique_tickets"),
        })
    }

    /// On-disk size of the database in bytes.
    pub fn database_size(&self) -> Result<u64, ServiceError> {
        let rows = self
            .sql
            .query(
                "SELECT page_count * page_size AS size FROM pragma_page_count(), pragma_page_size()",
                &[],
            )
            .map_err(storage)?;
        Ok(first_count(&rows, "size"))
    }
}

fn to_records(rows: &[Row]) -> Result<Vec<ManufacturingRecord>, ServiceError> {
    rows.iter().map(ManufacturingRecord::from_row).collect()
}

fn first_count(rows: &[Row], column: &str) -> u64 {
    rows.first()
        .and_then(|r| r.get_i64(column))
        .unwrap_or(0)
        .max(0) as u64
}
