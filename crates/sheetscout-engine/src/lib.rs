//! Automation-feasibility scoring for Excel workbooks.
//!
//! [`FeasibilityEngine::analyze`] turns a [`WorkbookModel`] into a
//! [`FeasibilityReport`]: four component scores (structure, formula
//! complexity, automation patterns, risk), a weighted composite, an effort
//! estimate and a ranked list of automation tools. The engine never fails;
//! problems with the input surface as engine findings on the report.
//!
//! ```
//! use sheetscout_engine::FeasibilityEngine;
//! use sheetscout_model::{SheetBuilder, WorkbookBuilder};
//!
//! let workbook = WorkbookBuilder::new()
//!     .sheet(SheetBuilder::new("Data").header_row(1, &["Region", "Sales"]).build())
//!     .build();
//! let report = FeasibilityEngine::default().analyze(&workbook);
//! assert!(report.composite() > 50.0);
//! ```

pub mod classifier;
mod engine;
pub mod findings;
mod formula;
mod opportunities;
pub mod patterns;
pub mod policy;
pub mod recommend;
mod report;
pub mod risk;
mod scan;
pub mod score;
pub mod structure;

pub use classifier::{
    ClassifyFailure, ComplexityTier, ExcelFormulaClassifier, FeatureCache, FormulaClassifier,
    FormulaFeatures, ReferenceSpan, SheetTarget,
};
pub use engine::FeasibilityEngine;
pub use findings::{Finding, FindingKind};
pub use patterns::{DetectedPattern, Pattern, SheetRole};
pub use policy::{
    AnalysisLimits, EffortThresholds, PolicyError, PolicyIssue, ScoringPolicy, Step, Weights,
};
pub use recommend::{EffortCategory, FeasibilityLevel, Tool, ToolRecommendation};
pub use report::{FeasibilityReport, WorkbookSummary};
pub use risk::{RiskFinding, RiskRule, Severity};
pub use score::{Component, SubScore};
pub use structure::StructuralMetrics;

pub use sheetscout_model::WorkbookModel;
