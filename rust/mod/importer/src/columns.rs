//! Header normalization: raw spreadsheet headers to canonical fields.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use pcbtrace_records::schema::Field;
use serde::Deserialize;

use crate::error::ImportError;

/// What to do with a header that matches no canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownHeaderPolicy {
    #[default]
    Ignore,
    Warn,
}

impl FromStr for UnknownHeaderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            other => Err(format!("unknown header policy '{other}' (expected ignore or warn)")),
        }
    }
}

const BUILTIN_SYNONYMS: &[(&str, Field)] = &[
    ("sr.no", Field::SrNo),
    ("sr no", Field::SrNo),
    ("sr_no", Field::SrNo),
    ("srno", Field::SrNo),
    ("serial no", Field::SrNo),
    ("lot no.", Field::LotNo),
    ("lot no", Field::LotNo),
    ("lot_no", Field::LotNo),
    ("lotno", Field::LotNo),
    ("rf no.", Field::RfNo),
    ("rf no", Field::RfNo),
    ("rf_no", Field::RfNo),
    ("rfno", Field::RfNo),
    ("pcb sr no.", Field::PcbSrNo),
    ("pcb sr no", Field::PcbSrNo),
    ("pcb_sr_no", Field::PcbSrNo),
    ("pcbsrno", Field::PcbSrNo),
    ("fan sr no.", Field::FanSrNo),
    ("fan sr no", Field::FanSrNo),
    ("fan_sr_no", Field::FanSrNo),
    ("fansrno", Field::FanSrNo),
    ("ticket no.", Field::TicketNo),
    ("ticket no", Field::TicketNo),
    ("ticket_no", Field::TicketNo),
    ("ticketno", Field::TicketNo),
    ("line item no.", Field::LineItemNo),
    ("line item no", Field::LineItemNo),
    ("line_item_no", Field::LineItemNo),
    ("lineitemno", Field::LineItemNo),
    ("version", Field::Version),
    ("model", Field::Model),
    ("part code", Field::PartCode),
    ("part_code", Field::PartCode),
    ("partcode", Field::PartCode),
    ("customer complaint", Field::CustomerComplaint),
    ("customer_complaint", Field::CustomerComplaint),
    ("complaint", Field::CustomerComplaint),
    ("symptom", Field::Symptom),
    ("defect", Field::Defect),
    ("rf observation", Field::RfObservation),
    ("rf_observation", Field::RfObservation),
    ("rfobservation", Field::RfObservation),
    ("observation", Field::RfObservation),
];

/// Lower-case and trim a raw header.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Immutable many-to-one mapping from normalized header spellings to fields.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    entries: HashMap<String, Field>,
}

#[derive(Deserialize)]
struct SynonymFile {
    #[serde(default)]
    synonyms: BTreeMap<String, String>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SynonymTable {
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_SYNONYMS
                .iter()
                .map(|(k, f)| (k.to_string(), *f))
                .collect(),
        }
    }

    /// Return a new table with `extra` merged over this one.
    /// Each value must be a canonical column name.
    pub fn with_entries<I, K, V>(&self, extra: I) -> Result<Self, ImportError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = self.entries.clone();
        for (raw, target) in extra {
            let field = Field::from_column(target.as_ref().trim()).ok_or_else(|| {
                ImportError::Synonyms(format!(
                    "'{}' maps to unknown field '{}'",
                    raw.as_ref(),
                    target.as_ref()
                ))
            })?;
            entries.insert(normalize_header(raw.as_ref()), field);
        }
        Ok(Self { entries })
    }

    /// Merge a TOML file of the form `[synonyms] "lot #" = "lot_no"` over this table.
    pub fn with_file(&self, path: &Path) -> Result<Self, ImportError> {
        let content = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SynonymFile =
            toml::from_str(&content).map_err(|e| ImportError::Synonyms(e.to_string()))?;
        self.with_entries(file.synonyms)
    }

    /// Resolve a raw header. Headers that already spell a canonical column
    /// resolve to it even without an explicit entry.
    pub fn resolve(&self, raw: &str) -> Option<Field> {
        let key = normalize_header(raw);
        self.entries
            .get(&key)
            .copied()
            .or_else(|| Field::from_column(&key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical field to column position within one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    positions: BTreeMap<Field, usize>,
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.positions.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.positions.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.positions.keys().copied()
    }
}

/// Maps a sheet's header row onto canonical fields.
#[derive(Debug, Clone, Default)]
pub struct ColumnNormalizer {
    synonyms: SynonymTable,
    policy: UnknownHeaderPolicy,
}

impl ColumnNormalizer {
    pub fn new(synonyms: SynonymTable, policy: UnknownHeaderPolicy) -> Self {
        Self { synonyms, policy }
    }

    /// The renamed header set: canonical names where known, the
    /// normalized raw header otherwise.
    pub fn canonical_headers(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| match self.synonyms.resolve(h) {
                Some(field) => field.column().to_string(),
                None => normalize_header(h),
            })
            .collect()
    }

    /// Locate every canonical field in `headers`. Fails when the primary
    /// key column is absent. When two headers resolve to the same field
    /// the leftmost one wins.
    pub fn map_columns(&self, headers: &[String]) -> Result<ColumnMap, ImportError> {
        let mut positions = BTreeMap::new();
        for (idx, raw) in headers.iter().enumerate() {
            match self.synonyms.resolve(raw) {
                Some(field) => {
                    if positions.contains_key(&field) {
                        tracing::warn!(header = %raw, %field, column = idx + 1, "duplicate column ignored");
                    } else {
                        positions.insert(field, idx);
                    }
                }
                None => {
                    if self.policy == UnknownHeaderPolicy::Warn && !raw.trim().is_empty() {
                        tracing::warn!(header = %raw, column = idx + 1, "unknown column ignored");
                    }
                }
            }
        }

        if !positions.contains_key(&Field::PcbSrNo) {
            return Err(ImportError::MissingKeyColumn {
                available: self.canonical_headers(headers),
            });
        }
        Ok(ColumnMap { positions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_variants_share_canonical_name() {
        let n = ColumnNormalizer::default();
        let out = n.canonical_headers(&headers(&["Lot No.", "lot_no", "LOTNO", "  lot no  "]));
        assert_eq!(out, vec!["lot_no"; 4]);
    }

    #[test]
    fn every_builtin_synonym_resolves() {
        let table = SynonymTable::builtin();
        for (raw, field) in BUILTIN_SYNONYMS {
            assert_eq!(table.resolve(&raw.to_uppercase()), Some(*field), "{raw}");
        }
        for field in Field::ALL {
            assert_eq!(table.resolve(field.column()), Some(field));
        }
    }

    #[test]
    fn unknown_headers_pass_through() {
        let n = ColumnNormalizer::default();
        assert_eq!(
            n.canonical_headers(&headers(&["PCB Sr No.", " Remarks "])),
            vec!["pcb_sr_no", "remarks"]
        );
        let map = n.map_columns(&headers(&["PCB Sr No.", "Remarks"])).unwrap();
        assert_eq!(map.fields().collect::<Vec<_>>(), vec![Field::PcbSrNo]);
    }

    #[test]
    fn missing_key_column_rejected() {
        let n = ColumnNormalizer::new(SynonymTable::builtin(), UnknownHeaderPolicy::Warn);
        let err = n.map_columns(&headers(&["Lot No", "Model"])).unwrap_err();
        match err {
            ImportError::MissingKeyColumn { available } => {
                assert_eq!(available, vec!["lot_no", "model"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_duplicate_column_wins() {
        let n = ColumnNormalizer::default();
        let map = n
            .map_columns(&headers(&["Sr No", "PCB Sr No", "Complaint", "Customer Complaint"]))
            .unwrap();
        assert_eq!(map.get(Field::SrNo), Some(0));
        assert_eq!(map.get(Field::PcbSrNo), Some(1));
        assert_eq!(map.get(Field::CustomerComplaint), Some(2));
        assert!(!map.contains(Field::Model));
    }

    #[test]
    fn extra_entries_extend_table() {
        let table = SynonymTable::builtin()
            .with_entries([("Board Serial", "pcb_sr_no"), ("Lot #", "lot_no")])
            .unwrap();
        assert_eq!(table.resolve("BOARD SERIAL"), Some(Field::PcbSrNo));
        assert_eq!(table.resolve("lot #"), Some(Field::LotNo));
        assert_eq!(table.len(), BUILTIN_SYNONYMS.len() + 2);

        let err = SynonymTable::builtin().with_entries([("x", "not_a_field")]).unwrap_err();
        assert!(matches!(err, ImportError::Synonyms(_)));
    }

    #[test]
    fn synonym_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synonyms.toml");
        std::fs::write(&path, "[synonyms]\n\"Board S/N\" = \"pcb_sr_no\"\n").unwrap();
        let table = SynonymTable::builtin().with_file(&path).unwrap();
        assert_eq!(table.resolve("board s/n"), Some(Field::PcbSrNo));

        std::fs::write(&path, "[synonyms\n").unwrap();
        assert!(matches!(
            SynonymTable::builtin().with_file(&path),
            Err(ImportError::Synonyms(_))
        ));
    }

    #[test]
    fn policy_parses() {
        assert_eq!("WARN".parse::<UnknownHeaderPolicy>(), Ok(UnknownHeaderPolicy::Warn));
        assert_eq!("ignore".parse::<UnknownHeaderPolicy>(), Ok(UnknownHeaderPolicy::Ignore));
        assert!("loud".parse::<UnknownHeaderPolicy>().is_err());
    }
}
