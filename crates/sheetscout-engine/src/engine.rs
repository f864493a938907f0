use std::collections::BTreeMap;

use sheetscout_model::WorkbookModel;

use crate::classifier::{ComplexityTier, ExcelFormulaClassifier, FeatureCache, FormulaClassifier};
use crate::findings::{Finding, FindingKind};
use crate::formula::FormulaAnalysis;
use crate::opportunities::{self, OpportunityInput};
use crate::patterns;
use crate::policy::{PolicyError, ScoringPolicy};
use crate::recommend::{self, EffortCategory, Scores};
use crate::report::{FeasibilityReport, ReportParts, WorkbookSummary};
use crate::risk::{self, RiskInput};
use crate::scan::WorkbookScan;
use crate::score::{Component, SubScore};
use crate::structure::StructuralMetrics;

/// Scores workbooks for automation feasibility under one policy.
///
/// Holds no per-run state: each [`analyze`](Self::analyze) call builds its
/// own formula cache, so one engine can serve many workbooks.
#[derive(Debug, Clone)]
pub struct FeasibilityEngine<C: FormulaClassifier = ExcelFormulaClassifier> {
    policy: ScoringPolicy,
    classifier: C,
}

impl Default for FeasibilityEngine {
    fn default() -> Self {
        let policy = ScoringPolicy::default();
        Self {
            classifier: ExcelFormulaClassifier::from_policy(&policy),
            policy,
        }
    }
}

impl FeasibilityEngine {
    pub fn new(policy: ScoringPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            classifier: ExcelFormulaClassifier::from_policy(&policy),
            policy,
        })
    }
}

impl<C: FormulaClassifier> FeasibilityEngine<C> {
    /// Engine with a caller-supplied classifier.
    pub fn with_classifier(policy: ScoringPolicy, classifier: C) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy, classifier })
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn analyze(&self, model: &WorkbookModel) -> FeasibilityReport {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("analyze", sheets = model.sheets.len()).entered();

        if model.sheets.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("workbook has no sheets");
            return degenerate(model);
        }

        let policy = &self.policy;
        let mut engine_findings = Vec::new();
        let scan = WorkbookScan::new(model, &policy.limits, &mut engine_findings);

        let mut cache = FeatureCache::new(&self.classifier);
        let formulas = FormulaAnalysis::run(&scan, &mut cache, &policy.formula, &mut engine_findings);

        let metrics = {
            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!("structure_analysis").entered();
            StructuralMetrics::measure(&scan, &mut engine_findings)
        };
        let structure = metrics.score(&policy.structure);

        let pattern_analysis = patterns::detect(&scan, &formulas, &policy.pattern);
        let risk_assessment = risk::assess(&RiskInput {
            model,
            scan: &scan,
            metrics: &metrics,
            formulas: &formulas,
            policy: &policy.risk,
        });

        let scores = Scores::new(
            &structure,
            &formulas.subscore,
            &pattern_analysis.subscore,
            &risk_assessment.subscore,
            &risk_assessment,
        );
        let composite = recommend::composite(&scores, &policy.weights);
        let effort = recommend::effort(composite, &policy.effort, risk_assessment.has_blocking());
        let recommendations = recommend::rank_tools(&scores);

        let opportunities = opportunities::identify(&OpportunityInput {
            metrics: &metrics,
            formulas: &formulas,
            patterns: &pattern_analysis,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            composite,
            effort = %effort,
            engine_findings = engine_findings.len(),
            "analysis complete"
        );

        let summary = WorkbookSummary {
            file_name: model.metadata.file_name.clone(),
            format: model.metadata.format,
            file_size_bytes: model.metadata.size_bytes,
            sheet_count: model.sheets.len(),
            analyzed_sheets: scan.sheet_count(),
            populated_cells: scan.populated_cells(),
            formula_cells: formulas.formula_cells,
            distinct_formulas: formulas.distinct_formulas,
            named_ranges: metrics.named_ranges,
            has_macros: model.is_macro_enabled(),
            tier_histogram: formulas.histogram.clone(),
            metrics: Some(metrics),
        };

        FeasibilityReport::from_parts(ReportParts {
            composite,
            effort,
            recommendations,
            structure,
            formula: formulas.subscore,
            pattern: pattern_analysis.subscore,
            risk: risk_assessment.subscore,
            risk_findings: risk_assessment.findings,
            patterns: pattern_analysis.detected,
            engine_findings,
            opportunities,
            summary,
        })
    }
}

fn degenerate(model: &WorkbookModel) -> FeasibilityReport {
    FeasibilityReport::from_parts(ReportParts {
        composite: 0.0,
        effort: EffortCategory::VeryHigh,
        recommendations: Vec::new(),
        structure: SubScore::zero(Component::Structure),
        formula: SubScore::zero(Component::Formula),
        pattern: SubScore::zero(Component::Pattern),
        risk: SubScore::zero(Component::Risk),
        risk_findings: Vec::new(),
        patterns: Vec::new(),
        engine_findings: vec![Finding::new(
            FindingKind::InputDegenerate,
            "workbook contains no sheets; nothing to analyze",
        )],
        opportunities: Vec::new(),
        summary: WorkbookSummary {
            file_name: model.metadata.file_name.clone(),
            format: model.metadata.format,
            file_size_bytes: model.metadata.size_bytes,
            sheet_count: 0,
            analyzed_sheets: 0,
            populated_cells: 0,
            formula_cells: 0,
            distinct_formulas: 0,
            named_ranges: model.named_ranges.len(),
            has_macros: model.is_macro_enabled(),
            tier_histogram: ComplexityTier::ALL.iter().map(|t| (*t, 0)).collect::<BTreeMap<_, _>>(),
            metrics: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetscout_model::{SheetBuilder, WorkbookBuilder};

    #[test]
    fn invalid_policy_is_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.weights.risk = -1.0;
        assert!(matches!(
            FeasibilityEngine::new(policy),
            Err(PolicyError::Invalid { .. })
        ));
    }

    #[test]
    fn empty_workbook_is_degenerate() {
        let report = FeasibilityEngine::default().analyze(&WorkbookModel::default());
        assert_eq!(report.composite(), 0.0);
        assert_eq!(report.effort(), EffortCategory::VeryHigh);
        assert!(report.recommendations().is_empty());
        assert_eq!(report.engine_findings().len(), 1);
        assert!(report.subscores().iter().all(|s| s.value() == 0.0 && s.findings().is_empty()));
    }

    #[test]
    fn engine_findings_flow_into_the_report() {
        let wb = WorkbookBuilder::new()
            .sheet(SheetBuilder::new("Bad").formula(1, 1, "=SUM(A1").build())
            .build();
        let report = FeasibilityEngine::default().analyze(&wb);
        assert_eq!(report.engine_findings().len(), 1);
        assert_eq!(report.engine_findings()[0].kind, FindingKind::FormulaUnparsable);
        assert!(report.engine_findings()[0].kind.is_engine());
    }
}
