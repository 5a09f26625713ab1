use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScreenerError {
    #[error("Provider failure: {0}")]
    Provider(String),

    #[error("No provider returned data for {0}")]
    SymbolUnavailable(String),

    #[error("Symbol batch is empty")]
    EmptyBatch,

    #[error("Required columns missing from input table: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("API error: {0}")]
    Api(String),
}
