use std::collections::BTreeMap;

use serde::Serialize;
use sheetscout_model::FormatVariant;

use crate::classifier::ComplexityTier;
use crate::findings::Finding;
use crate::patterns::DetectedPattern;
use crate::recommend::{EffortCategory, FeasibilityLevel, ToolRecommendation};
use crate::risk::RiskFinding;
use crate::score::{Component, SubScore};
use crate::structure::StructuralMetrics;

/// Counts describing the analyzed workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkbookSummary {
    pub file_name: Option<String>,
    pub format: FormatVariant,
    pub file_size_bytes: u64,
    /// Sheets in the workbook.
    pub sheet_count: usize,
    /// Sheets the engine scanned; fewer than `sheet_count` when truncated.
    pub analyzed_sheets: usize,
    pub populated_cells: usize,
    pub formula_cells: usize,
    pub distinct_formulas: usize,
    pub named_ranges: usize,
    pub has_macros: bool,
    pub tier_histogram: BTreeMap<ComplexityTier, usize>,
    /// `None` when there was nothing to measure.
    pub metrics: Option<StructuralMetrics>,
}

/// Result of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityReport {
    composite: f64,
    effort: EffortCategory,
    feasibility: FeasibilityLevel,
    recommendations: Vec<ToolRecommendation>,
    structure: SubScore,
    formula: SubScore,
    pattern: SubScore,
    risk: SubScore,
    risk_findings: Vec<RiskFinding>,
    patterns: Vec<DetectedPattern>,
    engine_findings: Vec<Finding>,
    opportunities: Vec<String>,
    summary: WorkbookSummary,
}

pub(crate) struct ReportParts {
    pub composite: f64,
    pub effort: EffortCategory,
    pub recommendations: Vec<ToolRecommendation>,
    pub structure: SubScore,
    pub formula: SubScore,
    pub pattern: SubScore,
    pub risk: SubScore,
    pub risk_findings: Vec<RiskFinding>,
    pub patterns: Vec<DetectedPattern>,
    pub engine_findings: Vec<Finding>,
    pub opportunities: Vec<String>,
    pub summary: WorkbookSummary,
}

impl FeasibilityReport {
    pub(crate) fn from_parts(parts: ReportParts) -> Self {
        Self {
            composite: parts.composite,
            effort: parts.effort,
            feasibility: FeasibilityLevel::from_composite(parts.composite),
            recommendations: parts.recommendations,
            structure: parts.structure,
            formula: parts.formula,
            pattern: parts.pattern,
            risk: parts.risk,
            risk_findings: parts.risk_findings,
            patterns: parts.patterns,
            engine_findings: parts.engine_findings,
            opportunities: parts.opportunities,
            summary: parts.summary,
        }
    }

    pub fn composite(&self) -> f64 {
        self.composite
    }

    pub fn effort(&self) -> EffortCategory {
        self.effort
    }

    pub fn feasibility(&self) -> FeasibilityLevel {
        self.feasibility
    }

    /// Tools ranked best first.
    pub fn recommendations(&self) -> &[ToolRecommendation] {
        &self.recommendations
    }

    pub fn top_tool(&self) -> Option<&ToolRecommendation> {
        self.recommendations.first()
    }

    pub fn subscore(&self, component: Component) -> &SubScore {
        match component {
            Component::Structure => &self.structure,
            Component::Formula => &self.formula,
            Component::Pattern => &self.pattern,
            Component::Risk => &self.risk,
        }
    }

    /// The four component scores in `Component::ALL` order.
    pub fn subscores(&self) -> [&SubScore; 4] {
        [&self.structure, &self.formula, &self.pattern, &self.risk]
    }

    pub fn risk_findings(&self) -> &[RiskFinding] {
        &self.risk_findings
    }

    pub fn has_blocking_risk(&self) -> bool {
        self.risk_findings.iter().any(|f| f.blocking)
    }

    pub fn patterns(&self) -> &[DetectedPattern] {
        &self.patterns
    }

    /// Findings about input handling: degenerate input, unparsable
    /// formulas, clamped metrics and truncation.
    pub fn engine_findings(&self) -> &[Finding] {
        &self.engine_findings
    }

    pub fn opportunities(&self) -> &[String] {
        &self.opportunities
    }

    pub fn summary(&self) -> &WorkbookSummary {
        &self.summary
    }
}
