//! Read-only workbook model consumed by the SheetScout engine, plus readers
//! that build it from JSON or from Excel containers.

pub mod backends;
pub mod builder;
pub mod error;
pub mod model;
pub mod reader;

pub use builder::{SheetBuilder, WorkbookBuilder};
pub use error::ModelError;
pub use model::{
    CellModel, CellStyle, FileMetadata, FormatVariant, NamedRange, SheetModel, SheetVisibility,
    WorkbookModel,
};
pub use reader::{WorkbookReader, load_workbook};

#[cfg(feature = "calamine")]
pub use backends::CalamineReader;
#[cfg(feature = "json")]
pub use backends::JsonReader;

pub use sheetscout_common::{CellCoord, CellRange, CellValue};
