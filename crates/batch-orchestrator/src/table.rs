//! Tabular boundary: header-addressed parsing of raw snapshot tables and
//! emission of the scored output table.
//!
//! Columns are resolved by header name, never by position, so upstream
//! sheets may reorder or append columns without breaking the engine.

use std::collections::HashMap;
use std::path::PathBuf;

use screener_core::{coerce_num, Field, FusedRecord, ScoreBreakdown, ScreenerError};

/// Input columns the scoring pass cannot run without.
pub const REQUIRED_COLUMNS: [&str; 12] = [
    "Symbol",
    "Name",
    "Sector",
    "Industry",
    "Price",
    "Prev Close",
    "P/E",
    "P/B",
    "P/S",
    "PEG",
    "RSI",
    "Recommendation",
];

/// Header row of the scored output table.
pub const OUTPUT_HEADER: [&str; 22] = [
    "Time",
    "Symbol",
    "Name",
    "Sector",
    "Industry",
    "Price",
    "% Daily Change",
    "PE",
    "PS",
    "PB",
    "PEG",
    "RSI",
    "TechReco",
    "PE_z_inSector",
    "PS_z_inSector",
    "PB_z_inSector",
    "PEG_flag",
    "Score_Value (PE/PEG)",
    "Score_Growth (Δ%)",
    "Score_Tech (RSI/Reco)",
    "Total_Score (0-9)",
    "Notes",
];

/// Header row of the raw snapshot table: `Time`, `Symbol`, then the full
/// field schema in declaration order.
pub fn snapshot_header() -> Vec<String> {
    let mut header = vec!["Time".to_string(), "Symbol".to_string()];
    header.extend(Field::ALL.iter().map(|f| f.as_str().to_string()));
    header
}

/// Render fused records as a raw snapshot table, header included.
pub fn emit_snapshot_rows(records: &[FusedRecord]) -> Vec<Vec<String>> {
    let mut rows = vec![snapshot_header()];
    for record in records {
        let mut row = vec![
            record.fetched_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.symbol.clone(),
        ];
        for field in Field::ALL {
            row.push(match record.fields.get(field) {
                None => String::new(),
                Some(screener_core::FieldValue::Num(v)) => fmt_num(v),
                Some(screener_core::FieldValue::Text(s)) => s,
            });
        }
        rows.push(row);
    }
    rows
}

/// Render score breakdowns as the analysis table, header included. Records
/// and breakdowns are matched by symbol; records without a breakdown are
/// skipped.
pub fn emit_rows(records: &[FusedRecord], scores: &[ScoreBreakdown]) -> Vec<Vec<String>> {
    let by_symbol: HashMap<&str, &FusedRecord> =
        records.iter().map(|r| (r.symbol.as_str(), r)).collect();

    let mut rows = vec![OUTPUT_HEADER.iter().map(|s| s.to_string()).collect::<Vec<_>>()];
    for score in scores {
        let Some(record) = by_symbol.get(score.symbol.as_str()) else {
            continue;
        };
        let f = &record.fields;
        rows.push(vec![
            score.computed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            score.symbol.clone(),
            f.name.clone().unwrap_or_default(),
            f.sector
                .clone()
                .unwrap_or_else(|| quant_scoring::UNKNOWN_SECTOR.to_string()),
            f.industry.clone().unwrap_or_default(),
            opt_num(f.price),
            opt_round2(score.daily_change_pct),
            opt_num(f.pe),
            opt_num(f.ps),
            opt_num(f.pb),
            opt_num(f.peg),
            opt_num(f.rsi),
            f.recommendation.clone().unwrap_or_else(|| "N/A".to_string()),
            opt_round2(score.pe_z),
            opt_round2(score.ps_z),
            opt_round2(score.pb_z),
            score.peg_flag.as_str().to_string(),
            score.value_score.to_string(),
            score.growth_score.to_string(),
            score.tech_score.to_string(),
            score.total_score.to_string(),
            score.notes.join("; "),
        ]);
    }
    rows
}

/// Parse a raw snapshot table (header row first) back into fused records.
///
/// Cells are coerced leniently, so a malformed numeric cell degrades to a
/// missing field; a missing required column is a hard error because the
/// whole batch would be meaningless.
pub fn parse_table(rows: &[Vec<String>]) -> Result<Vec<FusedRecord>, ScreenerError> {
    let Some((header, data)) = rows.split_first() else {
        return Err(ScreenerError::EmptyBatch);
    };

    let idx: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !idx.contains_key(**c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ScreenerError::MissingColumns(missing));
    }

    let cell = |row: &[String], name: &str| -> String {
        idx.get(name)
            .and_then(|i| row.get(*i))
            .cloned()
            .unwrap_or_default()
    };
    let text = |row: &[String], name: &str| -> Option<String> {
        let raw = cell(row, name);
        let t = raw.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("n/a") {
            None
        } else {
            Some(t.to_string())
        }
    };
    let num = |row: &[String], name: &str| -> Option<f64> { coerce_num(&cell(row, name)) };

    let mut records = Vec::with_capacity(data.len());
    for row in data {
        let symbol = cell(row, "Symbol");
        if symbol.trim().is_empty() {
            continue;
        }
        let mut record = FusedRecord::new(symbol.trim());
        record.fields.name = text(row, "Name");
        record.fields.sector = text(row, "Sector");
        record.fields.industry = text(row, "Industry");
        record.fields.price = num(row, "Price");
        record.fields.open = num(row, "Open");
        record.fields.prev_close = num(row, "Prev Close");
        record.fields.day_high = num(row, "Day High");
        record.fields.day_low = num(row, "Day Low");
        record.fields.week52_high = num(row, "52W High");
        record.fields.week52_low = num(row, "52W Low");
        record.fields.volume = num(row, "Volume");
        record.fields.market_cap = num(row, "Market Cap");
        record.fields.pe = num(row, "P/E");
        record.fields.pb = num(row, "P/B");
        record.fields.ps = num(row, "P/S");
        record.fields.peg = num(row, "PEG");
        record.fields.rsi = num(row, "RSI");
        record.fields.macd = num(row, "MACD");
        record.fields.recommendation = text(row, "Recommendation");
        records.push(record);
    }

    Ok(records)
}

fn fmt_num(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

fn opt_num(v: Option<f64>) -> String {
    v.map(fmt_num).unwrap_or_default()
}

fn opt_round2(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_default()
}

/// Destination for a full-table replace. The write is all-or-nothing per
/// cycle: the previous contents are discarded, never merged.
pub trait TabularSink {
    fn replace(&mut self, rows: &[Vec<String>]) -> Result<(), ScreenerError>;
}

/// CSV file sink; each cycle rewrites the file from scratch.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TabularSink for CsvSink {
    fn replace(&mut self, rows: &[Vec<String>]) -> Result<(), ScreenerError> {
        let mut writer = csv::Writer::from_path(&self.path)
            .map_err(|e| ScreenerError::Sink(e.to_string()))?;
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| ScreenerError::Sink(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| ScreenerError::Sink(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_core::PegFlag;

    fn sample_record() -> FusedRecord {
        let mut r = FusedRecord::new("AAPL");
        r.fields.name = Some("Apple Inc.".to_string());
        r.fields.sector = Some("Technology".to_string());
        r.fields.price = Some(182.5);
        r.fields.prev_close = Some(180.0);
        r.fields.pe = Some(29.4);
        r
    }

    fn sample_score() -> ScoreBreakdown {
        ScoreBreakdown {
            symbol: "AAPL".to_string(),
            computed_at: chrono::Utc::now(),
            daily_change_pct: Some(1.3889),
            pe_z: Some(-0.456),
            ps_z: None,
            pb_z: None,
            peg_flag: PegFlag::NotAvailable,
            value_score: 2,
            growth_score: 2,
            tech_score: 1,
            total_score: 5,
            notes: vec!["PEG missing/NA".to_string(), "RSI NA".to_string()],
        }
    }

    #[test]
    fn output_header_is_first_row() {
        let rows = emit_rows(&[sample_record()], &[sample_score()]);
        assert_eq!(rows[0], OUTPUT_HEADER.to_vec());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn derived_values_round_to_two_decimals() {
        let rows = emit_rows(&[sample_record()], &[sample_score()]);
        let row = &rows[1];
        assert_eq!(row[6], "1.39"); // % Daily Change
        assert_eq!(row[13], "-0.46"); // PE_z_inSector
        assert_eq!(row[14], ""); // undefined PS z stays blank
        assert_eq!(row[21], "PEG missing/NA; RSI NA");
    }

    #[test]
    fn missing_recommendation_renders_na() {
        let rows = emit_rows(&[sample_record()], &[sample_score()]);
        assert_eq!(rows[1][12], "N/A");
    }

    #[test]
    fn parse_rejects_missing_required_columns() {
        let rows = vec![
            vec!["Symbol".to_string(), "Price".to_string()],
            vec!["AAPL".to_string(), "182.5".to_string()],
        ];
        let err = parse_table(&rows).unwrap_err();
        match err {
            ScreenerError::MissingColumns(cols) => {
                assert!(cols.contains(&"P/E".to_string()));
                assert!(!cols.contains(&"Price".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn snapshot_round_trips_through_parse() {
        let rows = emit_snapshot_rows(&[sample_record()]);
        let parsed = parse_table(&rows).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].symbol, "AAPL");
        assert_eq!(parsed[0].fields.price, Some(182.5));
        assert_eq!(parsed[0].fields.pe, Some(29.4));
        assert_eq!(parsed[0].fields.rsi, None);
    }

    #[test]
    fn parse_treats_malformed_cells_as_missing() {
        let mut rows = emit_snapshot_rows(&[sample_record()]);
        let pe_col = rows[0].iter().position(|h| h == "P/E").unwrap();
        rows[1][pe_col] = "not-a-number".to_string();
        let parsed = parse_table(&rows).unwrap();
        assert_eq!(parsed[0].fields.pe, None);
    }

    #[test]
    fn csv_sink_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quant.csv");
        let mut sink = CsvSink::new(&path);

        sink.replace(&[vec!["a".to_string(), "b".to_string()]]).unwrap();
        sink.replace(&[vec!["c".to_string(), "d".to_string()]]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "c,d");
    }
}
