//! Table definition shared by the importer and the query service.

use pcbtrace_sql::{SQLError, SQLExecutor};

pub const TABLE: &str = "manufacturing_data";

/// Canonical record fields, in table column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    SrNo,
    LotNo,
    RfNo,
    PcbSrNo,
    FanSrNo,
    TicketNo,
    LineItemNo,
    Version,
    Model,
    PartCode,
    CustomerComplaint,
    Symptom,
    Defect,
    RfObservation,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::SrNo,
        Field::LotNo,
        Field::RfNo,
        Field::PcbSrNo,
        Field::FanSrNo,
        Field::TicketNo,
        Field::LineItemNo,
        Field::Version,
        Field::Model,
        Field::PartCode,
        Field::CustomerComplaint,
        Field::Symptom,
        Field::Defect,
        Field::RfObservation,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Field::SrNo => "sr_no",
            Field::LotNo => "lot_no",
            Field::RfNo => "rf_no",
            Field::PcbSrNo => "pcb_sr_no",
            Field::FanSrNo => "fan_sr_no",
            Field::TicketNo => "ticket_no",
            Field::LineItemNo => "line_item_no",
            Field::Version => "version",
            Field::Model => "model",
            Field::PartCode => "part_code",
            Field::CustomerComplaint => "customer_complaint",
            Field::Symptom => "symptom",
            Field::Defect => "defect",
            Field::RfObservation => "rf_observation",
        }
    }

    pub fn from_column(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.column() == name)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS manufacturing_data (
    sr_no INTEGER,
    lot_no TEXT,
    rf_no TEXT,
    pcb_sr_no TEXT PRIMARY KEY NOT NULL,
    fan_sr_no TEXT,
    ticket_no TEXT,
    line_item_no TEXT,
    version TEXT,
    model TEXT,
    part_code TEXT,
    customer_complaint TEXT,
    symptom TEXT,
    defect TEXT,
    rf_observation TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
)";

/// A secondary index on one column of the table.
#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    pub name: &'static str,
    pub field: Field,
}

impl IndexDef {
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {}({})",
            self.name,
            TABLE,
            self.field.column()
        )
    }
}

/// The fixed set of secondary indexes. Rebuildable from the table at any time.
pub const SECONDARY_INDEXES: &[IndexDef] = &[
    IndexDef { name: "idx_lot_no", field: Field::LotNo },
    IndexDef { name: "idx_rf_no", field: Field::RfNo },
    IndexDef { name: "idx_fan_sr_no", field: Field::FanSrNo },
    IndexDef { name: "idx_ticket_no", field: Field::TicketNo },
    IndexDef { name: "idx_model", field: Field::Model },
    IndexDef { name: "idx_part_code", field: Field::PartCode },
];

/// Create the table if missing.
pub fn ensure_table<E: SQLExecutor + ?Sized>(sql: &E) -> Result<(), SQLError> {
    sql.exec_batch(CREATE_TABLE)
}

/// Create the table and every secondary index if missing.
pub fn init_schema<E: SQLExecutor + ?Sized>(sql: &E) -> Result<(), SQLError> {
    ensure_table(sql)?;
    for idx in SECONDARY_INDEXES {
        sql.exec_batch(&idx.create_sql())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcbtrace_sql::{SqliteStore, Value};

    #[test]
    fn field_columns_roundtrip() {
        for field in Field::ALL {
            assert_eq!(Field::from_column(field.column()), Some(field));
        }
        assert_eq!(Field::from_column("serial"), None);
    }

    #[test]
    fn init_schema_is_repeatable() {
        let store = SqliteStore::open_in_memory().unwrap();
        init_schema(&store).unwrap();
        init_schema(&store).unwrap();

        let rows = store
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL",
                &[Value::from(TABLE)],
            )
            .unwrap();
        assert_eq!(rows.len(), SECONDARY_INDEXES.len());
    }

    #[test]
    fn created_at_defaults_on_insert() {
        let store = SqliteStore::open_in_memory().unwrap();
        ensure_table(&store).unwrap();
        store
            .exec("INSERT INTO manufacturing_data (pcb_sr_no) VALUES (?1)", &[Value::from("PCB-1")])
            .unwrap();
        let rows = store.query("SELECT created_at FROM manufacturing_data", &[]).unwrap();
        assert!(rows[0].get_str("created_at").is_some());
    }
}
