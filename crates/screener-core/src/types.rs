use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of a data provider, used as the provenance tag on fused fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    Yahoo,
    Fmp,
    TradingView,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Yahoo => "yahoo",
            ProviderKind::Fmp => "fmp",
            ProviderKind::TradingView => "tradingview",
        }
    }
}

/// Every field a provider can contribute to a fused record.
///
/// `as_str` returns the column header used by the tabular boundary, so the
/// same schema drives fusion, row emission and table parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Name,
    Sector,
    Industry,
    Price,
    Open,
    PrevClose,
    DayHigh,
    DayLow,
    FiftyTwoWeekHigh,
    FiftyTwoWeekLow,
    Volume,
    MarketCap,
    Pe,
    Pb,
    Ps,
    Peg,
    Rsi,
    Macd,
    Recommendation,
}

impl Field {
    pub const ALL: [Field; 19] = [
        Field::Name,
        Field::Sector,
        Field::Industry,
        Field::Price,
        Field::Open,
        Field::PrevClose,
        Field::DayHigh,
        Field::DayLow,
        Field::FiftyTwoWeekHigh,
        Field::FiftyTwoWeekLow,
        Field::Volume,
        Field::MarketCap,
        Field::Pe,
        Field::Pb,
        Field::Ps,
        Field::Peg,
        Field::Rsi,
        Field::Macd,
        Field::Recommendation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Sector => "Sector",
            Field::Industry => "Industry",
            Field::Price => "Price",
            Field::Open => "Open",
            Field::PrevClose => "Prev Close",
            Field::DayHigh => "Day High",
            Field::DayLow => "Day Low",
            Field::FiftyTwoWeekHigh => "52W High",
            Field::FiftyTwoWeekLow => "52W Low",
            Field::Volume => "Volume",
            Field::MarketCap => "Market Cap",
            Field::Pe => "P/E",
            Field::Pb => "P/B",
            Field::Ps => "P/S",
            Field::Peg => "PEG",
            Field::Rsi => "RSI",
            Field::Macd => "MACD",
            Field::Recommendation => "Recommendation",
        }
    }
}

/// A single field value as supplied by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Num(f64),
    Text(String),
}

impl FieldValue {
    /// The "falsy" rule used by fusion: a field holding an empty value is
    /// still considered missing and may be filled by a lower-priority
    /// provider. Zero and non-finite numerics count as empty, as do blank
    /// and `"N/A"` strings.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Num(v) => !v.is_finite() || *v == 0.0,
            FieldValue::Text(s) => {
                let t = s.trim();
                t.is_empty() || t.eq_ignore_ascii_case("n/a")
            }
        }
    }
}

/// Coerce a raw cell into a numeric value. Blank cells, the `"N/A"`
/// sentinel and non-numeric text all collapse to `None` rather than an
/// error.
pub fn coerce_num(raw: &str) -> Option<f64> {
    let t = raw.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("n/a") {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Partial field mapping returned by one provider for one symbol.
///
/// Adapters validate and coerce at this boundary, so every value here is
/// already well-typed; unavailable fields are simply `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: Option<f64>,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
    pub peg: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub recommendation: Option<String>,
}

impl FieldPatch {
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::Name => self.name.clone().map(FieldValue::Text),
            Field::Sector => self.sector.clone().map(FieldValue::Text),
            Field::Industry => self.industry.clone().map(FieldValue::Text),
            Field::Price => self.price.map(FieldValue::Num),
            Field::Open => self.open.map(FieldValue::Num),
            Field::PrevClose => self.prev_close.map(FieldValue::Num),
            Field::DayHigh => self.day_high.map(FieldValue::Num),
            Field::DayLow => self.day_low.map(FieldValue::Num),
            Field::FiftyTwoWeekHigh => self.week52_high.map(FieldValue::Num),
            Field::FiftyTwoWeekLow => self.week52_low.map(FieldValue::Num),
            Field::Volume => self.volume.map(FieldValue::Num),
            Field::MarketCap => self.market_cap.map(FieldValue::Num),
            Field::Pe => self.pe.map(FieldValue::Num),
            Field::Pb => self.pb.map(FieldValue::Num),
            Field::Ps => self.ps.map(FieldValue::Num),
            Field::Peg => self.peg.map(FieldValue::Num),
            Field::Rsi => self.rsi.map(FieldValue::Num),
            Field::Macd => self.macd.map(FieldValue::Num),
            Field::Recommendation => self.recommendation.clone().map(FieldValue::Text),
        }
    }

    /// Type-mismatched writes are dropped; they can only come from a
    /// malformed provider mapping and are treated as "no value".
    pub fn set(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::Name, FieldValue::Text(s)) => self.name = Some(s),
            (Field::Sector, FieldValue::Text(s)) => self.sector = Some(s),
            (Field::Industry, FieldValue::Text(s)) => self.industry = Some(s),
            (Field::Price, FieldValue::Num(v)) => self.price = Some(v),
            (Field::Open, FieldValue::Num(v)) => self.open = Some(v),
            (Field::PrevClose, FieldValue::Num(v)) => self.prev_close = Some(v),
            (Field::DayHigh, FieldValue::Num(v)) => self.day_high = Some(v),
            (Field::DayLow, FieldValue::Num(v)) => self.day_low = Some(v),
            (Field::FiftyTwoWeekHigh, FieldValue::Num(v)) => self.week52_high = Some(v),
            (Field::FiftyTwoWeekLow, FieldValue::Num(v)) => self.week52_low = Some(v),
            (Field::Volume, FieldValue::Num(v)) => self.volume = Some(v),
            (Field::MarketCap, FieldValue::Num(v)) => self.market_cap = Some(v),
            (Field::Pe, FieldValue::Num(v)) => self.pe = Some(v),
            (Field::Pb, FieldValue::Num(v)) => self.pb = Some(v),
            (Field::Ps, FieldValue::Num(v)) => self.ps = Some(v),
            (Field::Peg, FieldValue::Num(v)) => self.peg = Some(v),
            (Field::Rsi, FieldValue::Num(v)) => self.rsi = Some(v),
            (Field::Macd, FieldValue::Num(v)) => self.macd = Some(v),
            (Field::Recommendation, FieldValue::Text(s)) => self.recommendation = Some(s),
            _ => {}
        }
    }

    /// True when no field carries a usable (non-empty) value.
    pub fn is_blank(&self) -> bool {
        Field::ALL
            .iter()
            .all(|f| self.get(*f).map_or(true, |v| v.is_empty()))
    }
}

/// One symbol's reconciled attribute set for a single fetch cycle.
///
/// Built by the fusion resolver and immutable afterwards; `provenance`
/// records which provider supplied each filled field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedRecord {
    pub symbol: String,
    pub fetched_at: DateTime<Utc>,
    pub fields: FieldPatch,
    #[serde(default)]
    pub provenance: BTreeMap<Field, ProviderKind>,
}

impl FusedRecord {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            fetched_at: Utc::now(),
            fields: FieldPatch::default(),
            provenance: BTreeMap::new(),
        }
    }

    /// Fields that are still absent or empty.
    pub fn missing(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| self.fields.get(*f).map_or(true, |v| v.is_empty()))
            .collect()
    }

    /// Fill every still-empty field from `patch`, tagging each newly
    /// filled field with `source`. Fields already holding a non-empty
    /// value are frozen and never overwritten.
    pub fn absorb(&mut self, patch: &FieldPatch, source: ProviderKind) {
        for field in Field::ALL {
            let occupied = self.fields.get(field).map_or(false, |v| !v.is_empty());
            if occupied {
                continue;
            }
            if let Some(value) = patch.get(field) {
                if !value.is_empty() {
                    self.fields.set(field, value);
                    self.provenance.insert(field, source);
                }
            }
        }
    }
}

/// Categorical PEG classification with the labels used in the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PegFlag {
    Good,
    Mid,
    High,
    NotAvailable,
}

impl PegFlag {
    pub fn from_peg(peg: Option<f64>) -> Self {
        match peg {
            None => PegFlag::NotAvailable,
            Some(v) if v < 1.0 => PegFlag::Good,
            Some(v) if v <= 2.0 => PegFlag::Mid,
            Some(_) => PegFlag::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PegFlag::Good => "Good(<1)",
            PegFlag::Mid => "Mid(1-2)",
            PegFlag::High => "High(>2)",
            PegFlag::NotAvailable => "N/A",
        }
    }
}

/// Derived scoring output for one fused record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub symbol: String,
    pub computed_at: DateTime<Utc>,
    pub daily_change_pct: Option<f64>,
    /// Sector-relative z-scores for the valuation multiples.
    pub pe_z: Option<f64>,
    pub ps_z: Option<f64>,
    pub pb_z: Option<f64>,
    pub peg_flag: PegFlag,
    /// Sub-scores, each in [0, 3].
    pub value_score: u8,
    pub growth_score: u8,
    pub tech_score: u8,
    /// Composite score in [0, 9].
    pub total_score: u8,
    /// One entry per structurally missing critical input, in check order.
    pub notes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_rule_covers_zero_nan_and_sentinel() {
        assert!(FieldValue::Num(0.0).is_empty());
        assert!(FieldValue::Num(f64::NAN).is_empty());
        assert!(!FieldValue::Num(12.5).is_empty());
        assert!(FieldValue::Text("".to_string()).is_empty());
        assert!(FieldValue::Text("  n/a ".to_string()).is_empty());
        assert!(!FieldValue::Text("Technology".to_string()).is_empty());
    }

    #[test]
    fn coerce_num_treats_malformed_as_missing() {
        assert_eq!(coerce_num("12.5"), Some(12.5));
        assert_eq!(coerce_num(" -3 "), Some(-3.0));
        assert_eq!(coerce_num(""), None);
        assert_eq!(coerce_num("N/A"), None);
        assert_eq!(coerce_num("twelve"), None);
    }

    #[test]
    fn absorb_fills_only_missing_fields() {
        let mut record = FusedRecord::new("AAPL");
        let base = FieldPatch {
            price: Some(182.5),
            pe: Some(29.0),
            ..Default::default()
        };
        record.absorb(&base, ProviderKind::Yahoo);

        let fallback = FieldPatch {
            price: Some(999.0),
            peg: Some(1.4),
            ..Default::default()
        };
        record.absorb(&fallback, ProviderKind::Fmp);

        assert_eq!(record.fields.price, Some(182.5));
        assert_eq!(record.fields.peg, Some(1.4));
        assert_eq!(record.provenance[&Field::Price], ProviderKind::Yahoo);
        assert_eq!(record.provenance[&Field::Peg], ProviderKind::Fmp);
    }

    #[test]
    fn absorb_refills_falsy_values() {
        let mut record = FusedRecord::new("TSLA");
        let base = FieldPatch {
            volume: Some(0.0),
            sector: Some("N/A".to_string()),
            ..Default::default()
        };
        record.absorb(&base, ProviderKind::Yahoo);
        assert!(record.provenance.is_empty());

        let fallback = FieldPatch {
            volume: Some(1_000_000.0),
            sector: Some("Consumer Cyclical".to_string()),
            ..Default::default()
        };
        record.absorb(&fallback, ProviderKind::Fmp);
        assert_eq!(record.fields.volume, Some(1_000_000.0));
        assert_eq!(record.provenance[&Field::Volume], ProviderKind::Fmp);
    }

    #[test]
    fn peg_flag_boundaries() {
        assert_eq!(PegFlag::from_peg(Some(0.999)), PegFlag::Good);
        assert_eq!(PegFlag::from_peg(Some(1.0)), PegFlag::Mid);
        assert_eq!(PegFlag::from_peg(Some(2.0)), PegFlag::Mid);
        assert_eq!(PegFlag::from_peg(Some(2.001)), PegFlag::High);
        assert_eq!(PegFlag::from_peg(None), PegFlag::NotAvailable);
    }
}
