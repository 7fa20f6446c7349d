use chrono::{NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use pcbtrace_core::ServiceError;
use pcbtrace_sql::{Row, Value};

use crate::schema::Field;

/// One tested unit, as stored in `manufacturing_data`.
///
/// JSON field names are the table's column names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManufacturingRecord {
    pub sr_no: Option<i64>,
    pub lot_no: Option<String>,
    pub rf_no: Option<String>,

    /// PCB serial number, the natural primary key.
    pub pcb_sr_no: String,

    pub fan_sr_no: Option<String>,
    pub ticket_no: Option<String>,
    pub line_item_no: Option<String>,
    pub version: Option<String>,
    pub model: Option<String>,
    pub part_code: Option<String>,
    pub customer_complaint: Option<String>,
    pub symptom: Option<String>,
    pub defect: Option<String>,
    pub rf_observation: Option<String>,

    /// Insert time, ISO-8601 UTC.
    pub created_at: Option<String>,
}

impl ManufacturingRecord {
    pub fn from_row(row: &Row) -> Result<Self, ServiceError> {
        let text = |field: Field| row.get_str(field.column()).map(String::from);
        let pcb_sr_no = text(Field::PcbSrNo)
            .ok_or_else(|| ServiceError::Internal("row without pcb_sr_no".into()))?;

        Ok(Self {
            sr_no: row.get_i64(Field::SrNo.column()),
            lot_no: text(Field::LotNo),
            rf_no: text(Field::RfNo),
            pcb_sr_no,
            fan_sr_no: text(Field::FanSrNo),
            ticket_no: text(Field::TicketNo),
            line_item_no: text(Field::LineItemNo),
            version: text(Field::Version),
            model: text(Field::Model),
            part_code: text(Field::PartCode),
            customer_complaint: text(Field::CustomerComplaint),
            symptom: text(Field::Symptom),
            defect: text(Field::Defect),
            rf_observation: text(Field::RfObservation),
            created_at: row.get_str("created_at").map(to_iso8601),
        })
    }
}

/// Render a SQLite `CURRENT_TIMESTAMP` value (`YYYY-MM-DD HH:MM:SS`, UTC)
/// as ISO-8601. Values in any other shape are returned unchanged.
pub fn to_iso8601(raw: &str) -> String {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| raw.to_string())
}

/// A cleaned record ready for insertion. `created_at` is assigned by the database.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRecord {
    pub sr_no: Option<i64>,
    pub lot_no: Option<String>,
    pub rf_no: Option<String>,
    pub pcb_sr_no: String,
    pub fan_sr_no: Option<String>,
    pub ticket_no: Option<String>,
    pub line_item_no: Option<String>,
    pub version: Option<String>,
    pub model: Option<String>,
    pub part_code: Option<String>,
    pub customer_complaint: Option<String>,
    pub symptom: Option<String>,
    pub defect: Option<String>,
    pub rf_observation: Option<String>,
}

impl NewRecord {
    pub fn new(pcb_sr_no: impl Into<String>) -> Self {
        Self {
            pcb_sr_no: pcb_sr_no.into(),
            ..Default::default()
        }
    }

    /// Set a text field. `SrNo` and `PcbSrNo` have dedicated fields and are ignored here.
    pub fn set_text(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::SrNo | Field::PcbSrNo => return,
            Field::LotNo => &mut self.lot_no,
            Field::RfNo => &mut self.rf_no,
            Field::FanSrNo => &mut self.fan_sr_no,
            Field::TicketNo => &mut self.ticket_no,
            Field::LineItemNo => &mut self.line_item_no,
            Field::Version => &mut self.version,
            Field::Model => &mut self.model,
            Field::PartCode => &mut self.part_code,
            Field::CustomerComplaint => &mut self.customer_complaint,
            Field::Symptom => &mut self.symptom,
            Field::Defect => &mut self.defect,
            Field::RfObservation => &mut self.rf_observation,
        };
        *slot = value;
    }

    /// Parameter values in [`Field::ALL`] order.
    pub fn into_values(self) -> [Value; 14] {
        [
            self.sr_no.into(),
            self.lot_no.into(),
            self.rf_no.into(),
            Value::Text(self.pcb_sr_no),
            self.fan_sr_no.into(),
            self.ticket_no.into(),
            self.line_item_no.into(),
            self.version.into(),
            self.model.into(),
            self.part_code.into(),
            self.customer_complaint.into(),
            self.symptom.into(),
            self.defect.into(),
            self.rf_observation.into(),
        ]
    }
}

/// Aggregate counts over the whole table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub total_records: u64,
    pub unique_lot_numbers: u64,
    pub unique_models: u64,
    pub unique_part_codes: u64,
    pub unique_tickets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso8601_from_sqlite_timestamp() {
        assert_eq!(to_iso8601("2025-01-31 08:15:00"), "2025-01-31T08:15:00Z");
        assert_eq!(to_iso8601("2025-01-31T08:15:00.250"), "2025-01-31T08:15:00Z");
        assert_eq!(to_iso8601("yesterday"), "yesterday");
    }

    #[test]
    fn values_follow_column_order() {
        let mut rec = NewRecord::new("PCB-1");
        rec.sr_no = Some(7);
        rec.set_text(Field::Model, Some("Renesa".into()));
        rec.set_text(Field::PcbSrNo, Some("ignored".into()));

        let values = rec.into_values();
        let pos = |f: Field| Field::ALL.iter().position(|x| *x == f).unwrap();
        assert_eq!(values[pos(Field::SrNo)], Value::Integer(7));
        assert_eq!(values[pos(Field::PcbSrNo)], Value::Text("PCB-1".into()));
        assert_eq!(values[pos(Field::Model)], Value::Text("Renesa".into()));
        assert_eq!(values[pos(Field::LotNo)], Value::Null);
    }

    #[test]
    fn from_row_requires_key() {
        let row = Row {
            columns: vec![("pcb_sr_no".into(), Value::Null)],
        };
        assert!(ManufacturingRecord::from_row(&row).is_err());

        let row = Row {
            columns: vec![
                ("sr_no".into(), Value::Integer(1)),
                ("pcb_sr_no".into(), Value::Text("PCB-9".into())),
                ("lot_no".into(), Value::Text("L-1".into())),
                ("created_at".into(), Value::Text("2025-02-01 10:00:00".into())),
            ],
        };
        let rec = ManufacturingRecord::from_row(&row).unwrap();
        assert_eq!(rec.pcb_sr_no, "PCB-9");
        assert_eq!(rec.sr_no, Some(1));
        assert_eq!(rec.lot_no.as_deref(), Some("L-1"));
        assert_eq!(rec.model, None);
        assert_eq!(rec.created_at.as_deref(), Some("2025-02-01T10:00:00Z"));
    }
}
