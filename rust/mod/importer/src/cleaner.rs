//! Row cleaning: raw cells to [`NewRecord`] or a skip reason.

use pcbtrace_records::NewRecord;
use pcbtrace_records::schema::Field;

use crate::columns::ColumnMap;
use crate::sheet::Cell;

/// Why a row was not turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The primary key cell is empty after cleaning.
    MissingKey,
    /// The sequence number cell holds something that is not a number.
    InvalidSequenceNumber(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingKey => f.write_str("missing pcb_sr_no"),
            SkipReason::InvalidSequenceNumber(raw) => write!(f, "invalid sr_no '{raw}'"),
        }
    }
}

/// Render a cell as trimmed text. Empty cells, blank strings and the
/// literal "nan" (any case) become `None`.
pub fn clean_text(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Empty => None,
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                None
            } else {
                Some(s.to_string())
            }
        }
        Cell::Int(i) => Some(i.to_string()),
        Cell::Float(f) => format_float(*f),
        Cell::Bool(b) => Some(b.to_string()),
    }
}

// Whole floats print without a fractional part, so 12345.0 reads "12345".
fn format_float(f: f64) -> Option<String> {
    if !f.is_finite() {
        return None;
    }
    if f.fract() == 0.0 && f.abs() < 1e15 {
        Some(format!("{}", f as i64))
    } else {
        Some(f.to_string())
    }
}

/// Parse the sequence number. Fractional values truncate toward zero.
fn parse_sequence(cell: &Cell) -> Result<Option<i64>, SkipReason> {
    match cell {
        Cell::Empty => Ok(None),
        Cell::Int(i) => Ok(Some(*i)),
        Cell::Float(f) if f.is_nan() => Ok(None),
        Cell::Float(f) if f.is_finite() && f.abs() < 9.2e18 => Ok(Some(f.trunc() as i64)),
        Cell::Float(f) => Err(SkipReason::InvalidSequenceNumber(f.to_string())),
        Cell::Bool(b) => Err(SkipReason::InvalidSequenceNumber(b.to_string())),
        Cell::Text(s) => {
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            t.parse::<i64>()
                .map(Some)
                .map_err(|_| SkipReason::InvalidSequenceNumber(t.to_string()))
        }
    }
}

/// Cleans rows of one sheet against its column map.
#[derive(Debug, Clone)]
pub struct RowCleaner {
    columns: ColumnMap,
}

impl RowCleaner {
    pub fn new(columns: ColumnMap) -> Self {
        Self { columns }
    }

    fn cell<'r>(&self, row: &'r [Cell], field: Field) -> Option<&'r Cell> {
        self.columns.get(field).and_then(|i| row.get(i))
    }

    pub fn clean(&self, row: &[Cell]) -> Result<NewRecord, SkipReason> {
        let pcb_sr_no = self
            .cell(row, Field::PcbSrNo)
            .and_then(clean_text)
            .ok_or(SkipReason::MissingKey)?;

        let mut record = NewRecord::new(pcb_sr_no);
        record.sr_no = match self.cell(row, Field::SrNo) {
            Some(c) => parse_sequence(c)?,
            None => None,
        };
        for field in Field::ALL {
            if matches!(field, Field::SrNo | Field::PcbSrNo) {
                continue;
            }
            record.set_text(field, self.cell(row, field).and_then(clean_text));
        }
        Ok(record)
    }

    /// Clean `rows` lazily. Each item carries the 1-based spreadsheet line
    /// number, counting the header as line 1.
    pub fn clean_rows<I>(&self, rows: I) -> CleanedRows<'_, I::IntoIter>
    where
        I: IntoIterator<Item = Vec<Cell>>,
    {
        CleanedRows {
            cleaner: self,
            rows: rows.into_iter().enumerate(),
        }
    }
}

pub struct CleanedRows<'a, I> {
    cleaner: &'a RowCleaner,
    rows: std::iter::Enumerate<I>,
}

impl<I> Iterator for CleanedRows<'_, I>
where
    I: Iterator<Item = Vec<Cell>>,
{
    type Item = (usize, Result<NewRecord, SkipReason>);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, row) = self.rows.next()?;
        Some((idx + 2, self.cleaner.clean(&row)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::ColumnNormalizer;

    fn cleaner(headers: &[&str]) -> RowCleaner {
        let headers: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
        RowCleaner::new(ColumnNormalizer::default().map_columns(&headers).unwrap())
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    #[test]
    fn text_cleaning() {
        assert_eq!(clean_text(&text("  A1  ")), Some("A1".into()));
        assert_eq!(clean_text(&text("   ")), None);
        assert_eq!(clean_text(&text("NaN")), None);
        assert_eq!(clean_text(&text("nan")), None);
        assert_eq!(clean_text(&text("nano")), Some("nano".into()));
        assert_eq!(clean_text(&Cell::Empty), None);
        assert_eq!(clean_text(&Cell::Float(f64::NAN)), None);
        assert_eq!(clean_text(&Cell::Float(12345.0)), Some("12345".into()));
        assert_eq!(clean_text(&Cell::Float(1.25)), Some("1.25".into()));
        assert_eq!(clean_text(&Cell::Int(-4)), Some("-4".into()));
        assert_eq!(clean_text(&Cell::Bool(true)), Some("true".into()));
    }

    #[test]
    fn sequence_numbers() {
        assert_eq!(parse_sequence(&Cell::Float(3.9)), Ok(Some(3)));
        assert_eq!(parse_sequence(&Cell::Float(-3.9)), Ok(Some(-3)));
        assert_eq!(parse_sequence(&Cell::Int(8)), Ok(Some(8)));
        assert_eq!(parse_sequence(&text(" 42 ")), Ok(Some(42)));
        assert_eq!(parse_sequence(&text("")), Ok(None));
        assert_eq!(parse_sequence(&Cell::Float(f64::NAN)), Ok(None));
        assert_eq!(
            parse_sequence(&text("abc")),
            Err(SkipReason::InvalidSequenceNumber("abc".into()))
        );
        assert!(parse_sequence(&Cell::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn row_becomes_record() {
        let c = cleaner(&["Sr No", "PCB Sr No.", "Lot No", "Model", "Remarks"]);
        let rec = c
            .clean(&[
                Cell::Float(1.0),
                text(" PCB-1 "),
                text("L1"),
                text("  "),
                text("ignored"),
            ])
            .unwrap();
        assert_eq!(rec.pcb_sr_no, "PCB-1");
        assert_eq!(rec.sr_no, Some(1));
        assert_eq!(rec.lot_no.as_deref(), Some("L1"));
        assert_eq!(rec.model, None);
        assert_eq!(rec.defect, None);
    }

    #[test]
    fn numeric_key_keeps_integral_form() {
        let c = cleaner(&["pcb_sr_no"]);
        assert_eq!(c.clean(&[Cell::Float(987654.0)]).unwrap().pcb_sr_no, "987654");
    }

    #[test]
    fn skip_reasons() {
        let c = cleaner(&["Sr No", "PCB Sr No"]);
        assert_eq!(c.clean(&[Cell::Int(1), text("nan")]), Err(SkipReason::MissingKey));
        assert_eq!(c.clean(&[Cell::Int(1)]), Err(SkipReason::MissingKey));
        assert_eq!(
            c.clean(&[text("x1"), text("PCB-9")]),
            Err(SkipReason::InvalidSequenceNumber("x1".into()))
        );
    }

    #[test]
    fn clean_rows_numbers_lines_from_two() {
        let c = cleaner(&["PCB Sr No"]);
        let out: Vec<_> = c
            .clean_rows(vec![vec![text("A")], vec![Cell::Empty], vec![text("C")]])
            .collect();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].0, 2);
        assert!(out[0].1.is_ok());
        assert_eq!(out[1], (3, Err(SkipReason::MissingKey)));
        assert_eq!(out[2].0, 4);
    }
}
