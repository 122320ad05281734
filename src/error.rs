use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("required input sheet not found: {0}")]
    MissingInput(String),
    #[error("input sheet invalid: {0}")]
    InvalidSheet(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnCode {
    W001StateCorrupt,
    W002PriceInvalid,
    W003PriceWithoutName,
    W004SearchFailed,
    W005SearchDisabled,
    W006DuplicateEntity,
    W007GamesUnreadable,
    W008RecordKeptRaw,
}

impl WarnCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::W001StateCorrupt => "W001_STATE_CORRUPT",
            Self::W002PriceInvalid => "W002_PRICE_INVALID",
            Self::W003PriceWithoutName => "W003_PRICE_WITHOUT_NAME",
            Self::W004SearchFailed => "W004_SEARCH_FAILED",
            Self::W005SearchDisabled => "W005_SEARCH_DISABLED",
            Self::W006DuplicateEntity => "W006_DUPLICATE_ENTITY",
            Self::W007GamesUnreadable => "W007_GAMES_UNREADABLE",
            Self::W008RecordKeptRaw => "W008_RECORD_KEPT_RAW",
        }
    }
}
