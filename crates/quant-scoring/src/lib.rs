//! Cross-sectional normalization and composite scoring.
//!
//! Maps each fused record plus its sector distribution to a bounded
//! breakdown: three sector-relative z-scores, three sub-scores in [0, 3]
//! and a composite in [0, 9]. Every missing input degrades to a documented
//! default; the engine never fails on absent data.

pub mod sector;

pub use sector::{SectorBucket, SectorBuckets, UNKNOWN_SECTOR};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use screener_core::{FusedRecord, PegFlag, ScoreBreakdown};

/// Externally adjustable scoring parameters. Defaults reproduce the
/// production cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum numeric members a distribution needs before z-scores are
    /// considered meaningful.
    pub min_sector_sample: usize,
    /// Star cutoffs for |P/E z-score| (lower is better).
    pub pe_z_cutoffs: [f64; 3],
    /// Star cutoffs for raw PEG (lower is better).
    pub peg_cutoffs: [f64; 3],
    /// Star cutoffs for daily % change (higher is better).
    pub growth_cutoffs: [f64; 3],
    /// RSI deviation bands around the neutral 50 mark.
    pub rsi_dev_cutoffs: [f64; 3],
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_sector_sample: 3,
            pe_z_cutoffs: [0.5, 1.0, 1.5],
            peg_cutoffs: [1.0, 1.5, 2.0],
            growth_cutoffs: [0.5, 1.0, 2.0],
            rsi_dev_cutoffs: [10.0, 20.0, 30.0],
        }
    }
}

/// Percentage change from `prev` to `now`; undefined when either side is
/// missing or the base is zero.
pub fn pct_change(now: Option<f64>, prev: Option<f64>) -> Option<f64> {
    let (now, prev) = (now?, prev?);
    if prev == 0.0 {
        return None;
    }
    Some((now - prev) / prev * 100.0)
}

/// Z-score of `value` against `dist` using the population standard
/// deviation. Undefined for a missing value or an undersized distribution;
/// exactly 0 when the distribution has no variance.
pub fn zscore(value: Option<f64>, dist: &[f64], min_sample: usize) -> Option<f64> {
    let v = value?;
    if dist.len() < min_sample {
        return None;
    }
    let mean = dist.mean();
    let sd = dist.population_std_dev();
    if sd == 0.0 {
        return Some(0.0);
    }
    Some((v - mean) / sd)
}

/// Map a scalar onto 0..=3 stars given three ascending cutoffs.
/// Undefined input earns 0 stars; callers wanting a neutral default
/// substitute it themselves.
pub fn star_scale(value: Option<f64>, lower_is_better: bool, cutoffs: [f64; 3]) -> u8 {
    let Some(v) = value else { return 0 };
    if lower_is_better {
        if v <= cutoffs[0] {
            3
        } else if v <= cutoffs[1] {
            2
        } else if v <= cutoffs[2] {
            1
        } else {
            0
        }
    } else if v >= cutoffs[2] {
        3
    } else if v >= cutoffs[1] {
        2
    } else if v >= cutoffs[0] {
        1
    } else {
        0
    }
}

fn is_buy_class(recommendation: Option<&str>) -> bool {
    let Some(reco) = recommendation else {
        return false;
    };
    let upper = reco.trim().to_uppercase();
    upper.contains("STRONG_BUY") || upper == "BUY"
}

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one record against its sector bucket. `None` for the bucket
    /// (single-symbol requests, unknown batch context) leaves every
    /// z-score undefined and lets the star mappings degrade.
    pub fn score(&self, record: &FusedRecord, bucket: Option<&SectorBucket>) -> ScoreBreakdown {
        let fields = &record.fields;
        let min = self.config.min_sector_sample;

        let daily_change_pct = pct_change(fields.price, fields.prev_close);

        let empty = SectorBucket::default();
        let bucket = bucket.unwrap_or(&empty);
        let pe_z = zscore(fields.pe, &bucket.pe, min);
        let ps_z = zscore(fields.ps, &bucket.ps, min);
        let pb_z = zscore(fields.pb, &bucket.pb, min);

        let peg_flag = PegFlag::from_peg(fields.peg);

        // Value: |P/E z| and raw PEG each earn stars, but the axis
        // saturates at 3 rather than summing to 6.
        let value_stars_pe = star_scale(pe_z.map(f64::abs), true, self.config.pe_z_cutoffs);
        let value_stars_peg = star_scale(fields.peg, true, self.config.peg_cutoffs);
        let value_score = (value_stars_pe + value_stars_peg).min(3);

        // Growth: daily change as a coarse proxy.
        let growth_score = star_scale(daily_change_pct, false, self.config.growth_cutoffs);

        // Tech: distance from the neutral RSI of 50; a missing RSI is a
        // neutral 1 star, not a bad signal. A buy-class recommendation
        // adds one point, still capped at 3.
        let rsi_stars = match fields.rsi {
            None => 1,
            Some(rsi) => {
                let dev = Some((rsi - 50.0).abs());
                star_scale(dev, true, self.config.rsi_dev_cutoffs)
            }
        };
        let reco_bonus = u8::from(is_buy_class(fields.recommendation.as_deref()));
        let tech_score = (rsi_stars + reco_bonus).min(3);

        let total_score = value_score + growth_score + tech_score;

        let mut notes = Vec::new();
        if fields.pe.is_none() {
            notes.push("PE missing".to_string());
        }
        if fields.peg.is_none() {
            notes.push("PEG missing/NA".to_string());
        }
        if fields.rsi.is_none() {
            notes.push("RSI NA".to_string());
        }

        ScoreBreakdown {
            symbol: record.symbol.clone(),
            computed_at: Utc::now(),
            daily_change_pct,
            pe_z,
            ps_z,
            pb_z,
            peg_flag,
            value_score,
            growth_score,
            tech_score,
            total_score,
            notes,
        }
    }
}
