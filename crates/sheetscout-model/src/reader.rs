use std::path::Path;

use crate::error::ModelError;
use crate::model::{FormatVariant, WorkbookModel};

/// Source of a fully realized [`WorkbookModel`].
pub trait WorkbookReader {
    fn format(&self) -> FormatVariant;

    /// Read everything the model exposes. Called once per reader.
    fn read_workbook(&mut self) -> Result<WorkbookModel, ModelError>;
}

/// Open `path` with the reader matching its extension.
pub fn load_workbook(path: impl AsRef<Path>) -> Result<WorkbookModel, ModelError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    let format = FormatVariant::from_extension(&ext);

    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("load_workbook", path = %path.display(), format = format.as_str())
        .entered();

    let model = match format {
        FormatVariant::Json => open_json(path)?,
        FormatVariant::Unknown => return Err(ModelError::UnsupportedFormat(ext)),
        _ => open_container(path)?,
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        sheets = model.sheets.len(),
        formulas = model.formula_count(),
        "workbook loaded"
    );

    Ok(model)
}

#[cfg(feature = "json")]
fn open_json(path: &Path) -> Result<WorkbookModel, ModelError> {
    crate::backends::JsonReader::open_path(path)?.read_workbook()
}

#[cfg(not(feature = "json"))]
fn open_json(_path: &Path) -> Result<WorkbookModel, ModelError> {
    Err(ModelError::FeatureDisabled {
        format: "json".into(),
        feature: "json",
    })
}

#[cfg(feature = "calamine")]
fn open_container(path: &Path) -> Result<WorkbookModel, ModelError> {
    crate::backends::CalamineReader::open_path(path)?.read_workbook()
}

#[cfg(not(feature = "calamine"))]
fn open_container(path: &Path) -> Result<WorkbookModel, ModelError> {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_string();
    Err(ModelError::FeatureDisabled {
        format,
        feature: "calamine",
    })
}
