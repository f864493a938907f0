use std::path::PathBuf;

/// Failure to produce a [`WorkbookModel`](crate::WorkbookModel).
///
/// Readers fail fast: a malformed container is reported, never repaired.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "json")]
    #[error("invalid JSON workbook: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "calamine")]
    #[error("unreadable workbook container: {0}")]
    Container(#[from] calamine::Error),

    #[cfg(feature = "calamine")]
    #[error("unreadable workbook package: {0}")]
    Package(#[from] zip::result::ZipError),

    #[cfg(feature = "calamine")]
    #[error("malformed workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid workbook content: {0}")]
    Invalid(String),

    #[error("unsupported workbook format `{0}`")]
    UnsupportedFormat(String),

    #[error("reading `{format}` files requires the `{feature}` feature")]
    FeatureDisabled {
        format: String,
        feature: &'static str,
    },
}

impl ModelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::Io {
            path: path.into(),
            source,
        }
    }
}
