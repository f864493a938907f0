//! Workbook shape: sheet count, hidden sheets, merges, named ranges and how
//! unevenly data is spread across sheets.

use serde::Serialize;
use sheetscout_model::SheetVisibility;

use crate::findings::{Finding, FindingKind};
use crate::policy::{Step, StructurePolicy};
use crate::scan::WorkbookScan;
use crate::score::{Component, ScoreBuilder, SubScore};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralMetrics {
    pub sheet_count: usize,
    pub hidden_sheets: usize,
    pub very_hidden_sheets: usize,
    /// Hidden (including very hidden) sheets over all sheets.
    pub hidden_ratio: f64,
    pub protected_sheets: usize,
    pub merged_ranges: usize,
    /// Merged ranges per populated cell on the densest sheet, in `[0, 1]`.
    pub max_merged_density: f64,
    /// Workbook and sheet scoped.
    pub named_ranges: usize,
    pub populated_cells: usize,
    /// Coefficient of variation of populated cells over non-empty sheets;
    /// zero with fewer than two such sheets.
    pub irregularity: f64,
    pub file_size_mb: f64,
    /// Blend of irregularity, merge density and hidden ratio in `[0, 1]`.
    pub inconsistency: f64,
}

impl StructuralMetrics {
    pub(crate) fn measure(scan: &WorkbookScan<'_>, findings: &mut Vec<Finding>) -> Self {
        let model = scan.model;
        let sheet_count = scan.sheet_count();

        let mut hidden_sheets = 0;
        let mut very_hidden_sheets = 0;
        let mut protected_sheets = 0;
        let mut merged_ranges = 0;
        let mut max_merged_density: f64 = 0.0;
        let mut sheet_named = 0;
        let mut counts = Vec::new();

        for sheet in &scan.sheets {
            let model_sheet = sheet.sheet;
            match model_sheet.visibility {
                SheetVisibility::Visible => {}
                SheetVisibility::Hidden => hidden_sheets += 1,
                SheetVisibility::VeryHidden => very_hidden_sheets += 1,
            }
            protected_sheets += usize::from(model_sheet.is_protected);
            sheet_named += model_sheet.named_ranges.len();

            for range in model_sheet.merged_ranges.iter().filter(|r| r.is_inverted()) {
                findings.push(Finding::new(
                    FindingKind::MetricOutOfBounds,
                    format!(
                        "{}: merged range rows {}-{} cols {}-{} is inverted; normalized",
                        sheet.name(),
                        range.start_row,
                        range.end_row,
                        range.start_col,
                        range.end_col
                    ),
                ));
            }

            let merges = model_sheet.merged_ranges.len();
            merged_ranges += merges;
            if merges > 0 {
                let density = if sheet.populated == 0 {
                    f64::INFINITY
                } else {
                    merges as f64 / sheet.populated as f64
                };
                let density = if density > 1.0 {
                    findings.push(Finding::new(
                        FindingKind::MetricOutOfBounds,
                        format!(
                            "{}: {merges} merged ranges over {} populated cells; density clamped to 1",
                            sheet.name(),
                            sheet.populated
                        ),
                    ));
                    1.0
                } else {
                    density
                };
                max_merged_density = max_merged_density.max(density);
            }

            if let Some((rows, cols)) = model_sheet.dimensions {
                let (max_row, max_col) = sheet.extent;
                if rows < max_row || cols < max_col {
                    findings.push(Finding::new(
                        FindingKind::MetricOutOfBounds,
                        format!(
                            "{}: declared dimensions {rows}x{cols} are smaller than populated extent {max_row}x{max_col}",
                            sheet.name()
                        ),
                    ));
                }
            }

            if sheet.populated > 0 {
                counts.push(sheet.populated as f64);
            }
        }

        let hidden_ratio = if sheet_count == 0 {
            0.0
        } else {
            (hidden_sheets + very_hidden_sheets) as f64 / sheet_count as f64
        };
        let irregularity = coefficient_of_variation(&counts);
        let inconsistency = (0.5 * irregularity.min(1.0)
            + 0.3 * (max_merged_density / 0.2).min(1.0)
            + 0.2 * hidden_ratio)
            .clamp(0.0, 1.0);

        Self {
            sheet_count,
            hidden_sheets,
            very_hidden_sheets,
            hidden_ratio,
            protected_sheets,
            merged_ranges,
            max_merged_density,
            named_ranges: model.named_ranges.len() + sheet_named,
            populated_cells: scan.populated_cells(),
            irregularity,
            file_size_mb: model.metadata.size_bytes as f64 / BYTES_PER_MB,
            inconsistency,
        }
    }

    /// STRUCTURE score: deductions never take the running score below the
    /// floor, and the named-range bonus is capped.
    pub fn score(&self, policy: &StructurePolicy) -> SubScore {
        let mut score = ScoreBuilder::new(Component::Structure, 100.0);
        let deduct = |score: &mut ScoreBuilder, points: f64, message: String| {
            let allowed = (score.value() - policy.floor).max(0.0);
            score.apply(FindingKind::Metric, -points.min(allowed), message);
        };

        if let Some(step) = Step::lookup(&policy.sheet_count_steps, self.sheet_count as f64) {
            deduct(
                &mut score,
                step.points,
                format!("sheet count {} exceeds {}", self.sheet_count, step.above),
            );
        }

        let hidden = (self.hidden_ratio * policy.hidden_ratio_weight
            + self.very_hidden_sheets as f64 * policy.very_hidden_points)
            .min(policy.hidden_cap);
        if hidden > 0.0 {
            deduct(
                &mut score,
                hidden,
                format!(
                    "{} of {} sheets hidden ({} very hidden), ratio {:.2}",
                    self.hidden_sheets + self.very_hidden_sheets,
                    self.sheet_count,
                    self.very_hidden_sheets,
                    self.hidden_ratio
                ),
            );
        }

        if let Some(step) = Step::lookup(&policy.merged_density_steps, self.max_merged_density) {
            deduct(
                &mut score,
                step.points,
                format!(
                    "{} merged ranges, max density {:.3} per populated cell",
                    self.merged_ranges, self.max_merged_density
                ),
            );
        }

        if self.irregularity > policy.irregularity_cv {
            let points = (self.irregularity * policy.irregularity_factor).min(policy.irregularity_cap);
            deduct(
                &mut score,
                points,
                format!("sheet size irregularity (CV) {:.2}", self.irregularity),
            );
        }

        if self.file_size_mb > policy.large_file_mb {
            deduct(
                &mut score,
                policy.large_file_points,
                format!("file size {:.1} MB exceeds {} MB", self.file_size_mb, policy.large_file_mb),
            );
        }

        let bonus = match self.named_ranges {
            0 => 0.0,
            n if n <= policy.named_ranges_few => policy.named_ranges_bonus,
            _ => policy.named_ranges_many_bonus,
        };
        score.apply(
            FindingKind::Metric,
            bonus.min(policy.bonus_ceiling),
            format!("{} named ranges", self.named_ranges),
        );

        score.finish()
    }
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}
