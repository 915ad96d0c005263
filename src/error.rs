//! Error taxonomy for the vocabulary engine.

use thiserror::Error;

/// Why an import attempt was rejected as a whole.
///
/// Imports are all-or-nothing: a single row diagnostic rejects the entire
/// file, including rows that validated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("no sheet with the required headers (Deutsch, Japanisch, Kanji, Romaji/Lautschrift, Lektion/Bereich)")]
    HeaderNotFound,

    #[error("missing required values in rows: {}", format_row_numbers(.0))]
    MissingFields(Vec<usize>),

    #[error("no rows to import")]
    Empty,

    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),
}

/// At most the first 10 offending row numbers appear in the message.
fn format_row_numbers(rows: &[usize]) -> String {
    rows.iter().take(10).map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("entry already exists for ('{source_text}', '{target_kana}')")]
    Conflict { source_text: String, target_kana: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("import rejected: {0}")]
    Import(#[from] ImportError),

    #[error("upstream service failed: {0}")]
    Upstream(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("HTTP error: {0}")]
    Http(Box<reqwest::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation { field, message: message.into() }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(error: reqwest::Error) -> Self {
        CoreError::Http(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
