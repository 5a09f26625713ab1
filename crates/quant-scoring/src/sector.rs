//! Per-sector distributions of raw valuation multiples.
//!
//! Buckets are rebuilt from scratch for every batch; a record's own values
//! are part of its sector's distribution (not leave-one-out).

use std::collections::HashMap;

use screener_core::FusedRecord;

pub const UNKNOWN_SECTOR: &str = "UNKNOWN";

/// Raw value collections for one sector. Missing values are excluded at
/// build time, never imputed.
#[derive(Debug, Clone, Default)]
pub struct SectorBucket {
    pub pe: Vec<f64>,
    pub ps: Vec<f64>,
    pub pb: Vec<f64>,
    pub peg: Vec<f64>,
    pub price: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SectorBuckets {
    buckets: HashMap<String, SectorBucket>,
}

impl SectorBuckets {
    pub fn build(records: &[FusedRecord]) -> Self {
        let mut buckets: HashMap<String, SectorBucket> = HashMap::new();

        for record in records {
            let key = sector_key(record.fields.sector.as_deref()).to_string();
            let bucket = buckets.entry(key).or_default();

            let mut push = |target: &mut Vec<f64>, value: Option<f64>| {
                if let Some(v) = value.filter(|v| v.is_finite()) {
                    target.push(v);
                }
            };
            push(&mut bucket.pe, record.fields.pe);
            push(&mut bucket.ps, record.fields.ps);
            push(&mut bucket.pb, record.fields.pb);
            push(&mut bucket.peg, record.fields.peg);
            push(&mut bucket.price, record.fields.price);
        }

        Self { buckets }
    }

    /// Bucket for a record's sector; records with no sector share the
    /// `UNKNOWN` bucket.
    pub fn get(&self, sector: Option<&str>) -> Option<&SectorBucket> {
        self.buckets.get(sector_key(sector))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn sector_key(sector: Option<&str>) -> &str {
    match sector {
        Some(s) if !s.trim().is_empty() => s,
        _ => UNKNOWN_SECTOR,
    }
}
