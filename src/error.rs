use thiserror::Error;

/// Reasons a single box-score page cannot contribute rows to the dataset.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("element not found: {context}")]
    ElementNotFound { context: &'static str },

    #[error("table not found: #{id}")]
    MissingTable { id: String },

    #[error("malformed line score: {reason}")]
    MalformedLineScore { reason: String },

    #[error("column `{column}` expected by the base column set is missing")]
    MissingColumn { column: String },

    #[error("file name `{name}` does not start with a YYYYMMDD date")]
    BadDate { name: String },

    #[error("season link `{href}` has no numeric prefix")]
    BadSeason { href: String },
}
