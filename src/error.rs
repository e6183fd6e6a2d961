use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromotionError {
    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("Required column missing in input header: {0}")]
    MissingColumn(String),

    #[error("Invalid date in record {record}, column '{column}': '{value}' (expected dd.mm.yyyy)")]
    Parse {
        record: String,
        column: String,
        value: String,
    },

    #[error("Unknown reference date format: {0} (expected dd.mm.yyyy or dd.mm.yy)")]
    InvalidReferenceDate(String),

    #[error("Rank '{rank}' of record {record} not found in rank ladder")]
    Lookup { record: String, rank: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid column pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// Non-fatal findings about the input data. They are logged and collected,
/// never used for control flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataQualityWarning {
    #[error("{record}: no rank recorded, assuming {substituted}")]
    MissingRank { record: String, substituted: String },

    #[error("{record}: course {group} has no status (counted as not passed)")]
    MissingCourseStatus { record: String, group: u32 },

    #[error("{record}: course {group} has unknown status '{value}' (counted as not passed)")]
    UnknownCourseStatus {
        record: String,
        group: u32,
        value: String,
    },

    #[error("{record}: entry '{column}' has no start date, skipped")]
    MissingStartDate { record: String, column: String },

    #[error("{record}: unknown sex marker '{value}', using male rank names")]
    UnknownSex { record: String, value: String },

    #[error("{record}: no department membership recorded")]
    NoDepartmentHistory { record: String },
}

pub type Result<T> = std::result::Result<T, PromotionError>;
