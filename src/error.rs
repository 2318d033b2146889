use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("data source error: {0}")]
    DataSource(String),

    #[error("failed to load asset {path:?}: {reason}")]
    AssetLoad { path: PathBuf, reason: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write {path:?}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SheetError {
    pub fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SheetError::AssetLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<rusqlite::Error> for SheetError {
    fn from(e: rusqlite::Error) -> Self {
        SheetError::DataSource(e.to_string())
    }
}

impl From<csv::Error> for SheetError {
    fn from(e: csv::Error) -> Self {
        SheetError::DataSource(e.to_string())
    }
}
