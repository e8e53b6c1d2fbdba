use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A `$`-prefixed key outside `$and` / `$or` / `$not`.
    #[error("unsupported logical operation {0}")]
    UnsupportedLogicalOperator(String),

    #[error("unsupported comparison operator {0}")]
    UnsupportedComparison(String),
}

pub type Result<T> = std::result::Result<T, Error>;
