//! Console report printed after an import run.

use pcbtrace_importer::{FileStatus, RunSummary};
use pcbtrace_records::{ManufacturingRecord, RecordService};

/// Format a count with thousands separators: 1234567 -> "1,234,567".
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Human-readable byte size. Stays in a unit until the value reaches
/// 10240 of it, so 9000 bytes prints as "9000 bytes".
pub fn pretty_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "kB", "MB", "GB", "TB"];
    let mut size = bytes;
    let mut unit = 0;
    while size >= 10 * 1024 && unit < UNITS.len() - 1 {
        size = (size + 512) / 1024;
        unit += 1;
    }
    format!("{} {}", size, UNITS[unit])
}

pub fn print_summary(summary: &RunSummary) {
    let t = &summary.totals;
    println!();
    println!("Import summary");
    println!("  Files:      {} ({} failed)", summary.files.len(), summary.files_failed());
    for file in &summary.files {
        let name = file.path.display();
        match &file.status {
            FileStatus::Imported(s) => println!(
                "    {}: {} inserted, {} skipped",
                name,
                group_thousands(s.inserted),
                group_thousands(s.skipped())
            ),
            FileStatus::Failed(e) => println!("    {}: FAILED ({})", name, e),
        }
    }
    println!("  Rows read:  {}", group_thousands(t.rows_read));
    println!("  Inserted:   {}", group_thousands(t.inserted));
    println!("  Duplicates: {}", group_thousands(t.duplicates));
    println!("  Skipped:    {}", group_thousands(t.skipped()));
    println!("  Elapsed:    {:.2}s", summary.elapsed.as_secs_f64());
    println!("  Rate:       {:.0} records/sec", summary.rate());
}

pub fn print_stats(svc: &RecordService) -> anyhow::Result<()> {
    let stats = svc.stats()?;
    let size = svc.database_size()?;
    println!();
    println!("Table statistics");
    println!("  Total records:     {}", group_thousands(stats.total_records));
    println!("  Database size:     {}", pretty_size(size));
    println!("  Unique lots:       {}", group_thousands(stats.unique_lot_numbers));
    println!("  Unique models:     {}", group_thousands(stats.unique_models));
    println!("  Unique part codes: {}", group_thousands(stats.unique_part_codes));
    Ok(())
}

fn cell(v: Option<&str>, width: usize) -> String {
    let s = v.unwrap_or("-");
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}~")
    } else {
        s.to_string()
    }
}

pub fn sample_rows(records: &[ManufacturingRecord]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<20} {:<12} {:<14} {:<14} {}",
        "PCB_SR_NO", "LOT_NO", "MODEL", "PART_CODE", "CREATED_AT"
    )];
    for r in records {
        lines.push(format!(
            "{:<20} {:<12} {:<14} {:<14} {}",
            cell(Some(&r.pcb_sr_no), 20),
            cell(r.lot_no.as_deref(), 12),
            cell(r.model.as_deref(), 14),
            cell(r.part_code.as_deref(), 14),
            r.created_at.as_deref().unwrap_or("-")
        ));
    }
    lines
}

pub fn print_sample(svc: &RecordService, limit: u64) -> anyhow::Result<()> {
    if limit == 0 {
        return Ok(());
    }
    let records = svc.recent(limit)?;
    println!();
    println!("Most recent {} records", records.len());
    for line in sample_rows(&records) {
        println!("  {}", line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn sizes() {
        assert_eq!(pretty_size(8192), "8192 bytes");
        assert_eq!(pretty_size(10240), "10 kB");
        assert_eq!(pretty_size(5 * 1024 * 1024), "5120 kB");
        assert_eq!(pretty_size(64 * 1024 * 1024), "64 MB");
    }

    #[test]
    fn sample_table_truncates_long_values() {
        let rec = ManufacturingRecord {
            sr_no: None,
            lot_no: Some("LOT-1".into()),
            rf_no: None,
            pcb_sr_no: "PCB-0001".into(),
            fan_sr_no: None,
            ticket_no: None,
            line_item_no: None,
            version: None,
            model: Some("A very long model name".into()),
            part_code: None,
            customer_complaint: None,
            symptom: None,
            defect: None,
            rf_observation: None,
            created_at: Some("2025-01-01T00:00:00Z".into()),
        };
        let lines = sample_rows(&[rec]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("PCB_SR_NO"));
        assert!(lines[1].contains("PCB-0001"));
        assert!(lines[1].contains("A very long m~"));
        assert!(lines[1].ends_with("2025-01-01T00:00:00Z"));
    }
}
