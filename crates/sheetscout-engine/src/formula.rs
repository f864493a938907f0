use std::collections::BTreeMap;
use std::sync::Arc;

use sheetscout_common::CellCoord;

use crate::classifier::{ClassifyFailure, ComplexityTier, FeatureCache, FormulaFeatures};
use crate::findings::{Finding, FindingKind};
use crate::policy::{FormulaPolicy, Step, TierPenalties};
use crate::scan::WorkbookScan;
use crate::score::{Component, ScoreBuilder, SubScore};

/// Formula cells of every scanned sheet with their classified features.
#[derive(Debug)]
pub(crate) struct FormulaAnalysis {
    /// Features of each formula cell, indexed like `WorkbookScan::sheets`.
    pub per_sheet: Vec<Vec<Arc<FormulaFeatures>>>,
    pub histogram: BTreeMap<ComplexityTier, usize>,
    pub formula_cells: usize,
    pub distinct_formulas: usize,
    pub volatile_cells: usize,
    pub external_cells: usize,
    pub macro_call_cells: usize,
    pub subscore: SubScore,
}

pub(crate) fn penalty(penalties: &TierPenalties, tier: ComplexityTier) -> f64 {
    match tier {
        ComplexityTier::Trivial => penalties.trivial,
        ComplexityTier::Basic => penalties.basic,
        ComplexityTier::Lookup => penalties.lookup,
        ComplexityTier::Conditional => penalties.conditional,
        ComplexityTier::ArrayOrNested => penalties.array_or_nested,
        ComplexityTier::VolatileOrExternal => penalties.volatile_or_external,
    }
}

impl FormulaAnalysis {
    pub fn run(
        scan: &WorkbookScan<'_>,
        cache: &mut FeatureCache<'_>,
        policy: &FormulaPolicy,
        findings: &mut Vec<Finding>,
    ) -> Self {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("formula_analysis").entered();

        let mut histogram: BTreeMap<ComplexityTier, usize> =
            ComplexityTier::ALL.iter().map(|t| (*t, 0)).collect();
        let mut per_sheet = Vec::with_capacity(scan.sheets.len());
        let (mut volatile_cells, mut external_cells, mut macro_call_cells) = (0, 0, 0);
        let mut penalty_sum = 0.0;

        for sheet in &scan.sheets {
            let mut sites = Vec::new();
            for cell in sheet.formula_cells() {
                let Some(text) = cell.formula() else {
                    continue;
                };
                let (features, fresh) = cache.lookup(text);
                if fresh {
                    if let Some(failure) = &features.failure {
                        findings.push(failure_finding(failure, sheet.name(), cell.coord));
                    }
                }
                *histogram.entry(features.tier).or_default() += 1;
                penalty_sum += penalty(&policy.penalties, features.tier);
                volatile_cells += usize::from(features.volatile);
                external_cells += usize::from(!features.workbooks.is_empty());
                macro_call_cells += usize::from(features.macro_calls);
                sites.push(features);
            }
            per_sheet.push(sites);
        }

        let formula_cells: usize = per_sheet.iter().map(Vec::len).sum();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            formula_cells,
            distinct = cache.len(),
            cache_hits = cache.hits(),
            "formulas classified"
        );

        let mut score = ScoreBuilder::new(Component::Formula, 100.0);
        if formula_cells == 0 {
            score.note("no formulas found; nothing to re-implement");
        } else {
            let mean = penalty_sum / formula_cells as f64;
            score.apply(
                FindingKind::Metric,
                -mean,
                format!("mean tier penalty {mean:.1} over {formula_cells} formula cells"),
            );
            if let Some(step) = Step::lookup(&policy.volume_steps, formula_cells as f64) {
                score.apply(
                    FindingKind::Metric,
                    -step.points,
                    format!(
                        "{formula_cells} formula cells exceeds {} (volume deduction)",
                        step.above
                    ),
                );
            }
            if let Some((tier, count)) = histogram
                .iter()
                .filter(|(_, n)| **n > 0)
                .max_by_key(|(tier, n)| (**n, **tier))
            {
                score.note(format!("most common tier: {tier} ({count} cells)"));
            }
        }

        Self {
            per_sheet,
            histogram,
            formula_cells,
            distinct_formulas: cache.len(),
            volatile_cells,
            external_cells,
            macro_call_cells,
            subscore: score.finish(),
        }
    }

    /// Share of formula cells at or below `tier`; `None` without formulas.
    pub fn share_at_most(&self, tier: ComplexityTier) -> Option<f64> {
        if self.formula_cells == 0 {
            return None;
        }
        let simple: usize = self
            .histogram
            .iter()
            .filter(|(t, _)| **t <= tier)
            .map(|(_, n)| *n)
            .sum();
        Some(simple as f64 / self.formula_cells as f64)
    }

    pub fn tier_cells(&self, tier: ComplexityTier) -> usize {
        self.histogram.get(&tier).copied().unwrap_or(0)
    }

    /// `(sheet index, features)` for every formula cell.
    pub fn sites(&self) -> impl Iterator<Item = (usize, &Arc<FormulaFeatures>)> {
        self.per_sheet
            .iter()
            .enumerate()
            .flat_map(|(i, sites)| sites.iter().map(move |s| (i, s)))
    }
}

fn failure_finding(failure: &ClassifyFailure, sheet: &str, coord: CellCoord) -> Finding {
    match failure {
        ClassifyFailure::Unparsable { message } => Finding::new(
            FindingKind::FormulaUnparsable,
            format!("{sheet}!{coord}: formula could not be parsed ({message})"),
        ),
        ClassifyFailure::TooLong { .. } => Finding::new(
            FindingKind::Truncated,
            format!("{sheet}!{coord}: {failure}; not tokenized"),
        ),
    }
}
