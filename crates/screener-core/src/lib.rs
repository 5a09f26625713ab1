pub mod error;
pub mod traits;
pub mod types;

pub use error::ScreenerError;
pub use traits::{FetchOutcome, ProviderAdapter};
pub use types::{
    coerce_num, Field, FieldPatch, FieldValue, FusedRecord, PegFlag, ProviderKind, ScoreBreakdown,
};
