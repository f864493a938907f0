//! Automation blockers and hazards. Each rule deducts independently from 100.

use std::fmt;

use serde::Serialize;
use sheetscout_model::WorkbookModel;

use crate::classifier::ComplexityTier;
use crate::findings::FindingKind;
use crate::formula::FormulaAnalysis;
use crate::policy::RiskPolicy;
use crate::scan::{SheetScan, WorkbookScan};
use crate::score::{Component, ScoreBuilder, SubScore};
use crate::structure::StructuralMetrics;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskRule {
    Macros,
    PasswordProtection,
    ProtectedSheets,
    ExternalLinks,
    VolatileOrExternal,
    StructuralInconsistency,
    VeryHiddenSheets,
    LargeFile,
    FormulaVolume,
    SparseData,
    FormulaHeavy,
}

impl RiskRule {
    pub fn label(&self) -> &'static str {
        match self {
            RiskRule::Macros => "macros",
            RiskRule::PasswordProtection => "password protection",
            RiskRule::ProtectedSheets => "protected sheets",
            RiskRule::ExternalLinks => "external links",
            RiskRule::VolatileOrExternal => "volatile or external formulas",
            RiskRule::StructuralInconsistency => "structural inconsistency",
            RiskRule::VeryHiddenSheets => "very hidden sheets",
            RiskRule::LargeFile => "large file",
            RiskRule::FormulaVolume => "formula volume",
            RiskRule::SparseData => "sparse data",
            RiskRule::FormulaHeavy => "formula-heavy sheets",
        }
    }
}

impl fmt::Display for RiskRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskFinding {
    pub rule: RiskRule,
    pub severity: Severity,
    /// Blocking findings force the effort estimate to at least HIGH.
    pub blocking: bool,
    pub deduction: f64,
    pub rationale: String,
}

pub(crate) struct RiskInput<'s> {
    pub model: &'s WorkbookModel,
    pub scan: &'s WorkbookScan<'s>,
    pub metrics: &'s StructuralMetrics,
    pub formulas: &'s FormulaAnalysis,
    pub policy: &'s RiskPolicy,
}

struct RiskRuleDef {
    rule: RiskRule,
    severity: Severity,
    blocking: bool,
    /// Deduction and rationale when the rule fires.
    evaluate: fn(&RiskInput<'_>) -> Option<(f64, String)>,
}

const RULES: &[RiskRuleDef] = &[
    RiskRuleDef {
        rule: RiskRule::Macros,
        severity: Severity::Critical,
        blocking: true,
        evaluate: macros,
    },
    RiskRuleDef {
        rule: RiskRule::PasswordProtection,
        severity: Severity::High,
        blocking: true,
        evaluate: |i| {
            i.model.is_password_protected.then(|| {
                (
                    i.policy.password,
                    "workbook structure is password protected".to_string(),
                )
            })
        },
    },
    RiskRuleDef {
        rule: RiskRule::ProtectedSheets,
        severity: Severity::Medium,
        blocking: false,
        evaluate: |i| {
            let n = i.metrics.protected_sheets;
            (n > 0).then(|| {
                (
                    (n as f64 * i.policy.protected_sheet).min(i.policy.protected_cap),
                    format!("{n} protected sheet(s)"),
                )
            })
        },
    },
    RiskRuleDef {
        rule: RiskRule::ExternalLinks,
        severity: Severity::High,
        blocking: false,
        evaluate: external_links,
    },
    RiskRuleDef {
        rule: RiskRule::VolatileOrExternal,
        severity: Severity::Medium,
        blocking: false,
        evaluate: volatile_or_external,
    },
    RiskRuleDef {
        rule: RiskRule::StructuralInconsistency,
        severity: Severity::Low,
        blocking: false,
        evaluate: |i| {
            let s = i.metrics.inconsistency;
            (s >= i.policy.inconsistency_threshold).then(|| {
                (
                    i.policy.inconsistency,
                    format!("structural inconsistency {s:.2}"),
                )
            })
        },
    },
    RiskRuleDef {
        rule: RiskRule::VeryHiddenSheets,
        severity: Severity::Medium,
        blocking: false,
        evaluate: |i| {
            let n = i.metrics.very_hidden_sheets;
            (n > 0).then(|| {
                (
                    i.policy.very_hidden,
                    format!("{n} very hidden sheet(s), only reachable from code"),
                )
            })
        },
    },
    RiskRuleDef {
        rule: RiskRule::LargeFile,
        severity: Severity::Medium,
        blocking: false,
        evaluate: |i| {
            let mb = i.model.metadata.size_bytes as f64 / BYTES_PER_MB;
            (mb > i.policy.large_file_mb).then(|| {
                (
                    i.policy.large_file,
                    format!("file is {mb:.1} MB, over {} MB", i.policy.large_file_mb),
                )
            })
        },
    },
    RiskRuleDef {
        rule: RiskRule::FormulaVolume,
        severity: Severity::Low,
        blocking: false,
        evaluate: |i| {
            let n = i.formulas.formula_cells;
            (n > i.policy.formula_volume).then(|| {
                (
                    i.policy.formula_volume_points,
                    format!("{n} formula cells, over {}", i.policy.formula_volume),
                )
            })
        },
    },
    RiskRuleDef {
        rule: RiskRule::SparseData,
        severity: Severity::Low,
        blocking: false,
        evaluate: sparse_data,
    },
    RiskRuleDef {
        rule: RiskRule::FormulaHeavy,
        severity: Severity::Medium,
        blocking: false,
        evaluate: formula_heavy,
    },
];

fn macros(i: &RiskInput<'_>) -> Option<(f64, String)> {
    let calls = i.formulas.macro_call_cells;
    let project = if i.model.has_macros {
        "workbook contains a VBA project"
    } else {
        "workbook is saved as macro-enabled .xlsm"
    };
    let rationale = match (i.model.is_macro_enabled(), calls) {
        (false, 0) => return None,
        (true, 0) => project.to_string(),
        (true, n) => format!("{project} and {n} formula(s) call code"),
        (false, n) => format!("{n} formula(s) call code via CALL/REGISTER/RUN"),
    };
    Some((i.policy.macros, rationale))
}

/// Every cell of the volatile/external tier costs something. Cells that are
/// only external cost `external_per_cell`, as `ExternalLinks` also fires for
/// them.
fn volatile_or_external(i: &RiskInput<'_>) -> Option<(f64, String)> {
    let tier_cells = i.formulas.tier_cells(ComplexityTier::VolatileOrExternal);
    if tier_cells == 0 {
        return None;
    }
    let volatile = i.formulas.volatile_cells.min(tier_cells);
    let external = tier_cells - volatile;
    let p = i.policy;
    let deduction = (p.volatile_base
        + volatile as f64 * p.volatile_per_cell
        + external as f64 * p.external_per_cell)
        .min(p.volatile_cap);
    Some((
        deduction,
        format!(
            "{tier_cells} formula cell(s) are volatile or reach other workbooks \
             ({volatile} volatile, {external} external only)"
        ),
    ))
}

/// Cell area spanned by the declared dimensions or the used extent,
/// whichever reaches further on each axis.
fn sheet_area(sheet: &SheetScan<'_>) -> u64 {
    let (rows, cols) = sheet.sheet.dimensions.unwrap_or((0, 0));
    u64::from(rows.max(sheet.extent.0)) * u64::from(cols.max(sheet.extent.1))
}

fn sparse_data(i: &RiskInput<'_>) -> Option<(f64, String)> {
    let p = i.policy;
    let sparse: Vec<&str> = i
        .scan
        .sheets
        .iter()
        .filter(|sheet| {
            let area = sheet_area(sheet);
            sheet.populated > 0
                && area > p.sparse_min_area
                && (sheet.populated as f64 / area as f64) < p.sparse_density
        })
        .map(|sheet| sheet.name())
        .collect();
    if sparse.is_empty() {
        return None;
    }
    Some((
        p.sparse_data,
        format!(
            "{} sheet(s) use under {:.0}% of their area ({})",
            sparse.len(),
            p.sparse_density * 100.0,
            sparse.join(", ")
        ),
    ))
}

fn formula_heavy(i: &RiskInput<'_>) -> Option<(f64, String)> {
    let p = i.policy;
    let heavy = i
        .scan
        .sheets
        .iter()
        .zip(&i.formulas.per_sheet)
        .filter(|(sheet, formulas)| {
            sheet.populated > p.formula_heavy_cells
                && formulas.len() as f64 / sheet.populated as f64 > p.formula_heavy_ratio
        })
        .count();
    let analyzed = i.scan.sheet_count();
    if heavy == 0 || heavy as f64 <= analyzed as f64 * p.formula_heavy_share {
        return None;
    }
    Some((
        p.formula_heavy,
        format!("{heavy} of {analyzed} sheet(s) are mostly formulas"),
    ))
}

fn external_links(i: &RiskInput<'_>) -> Option<(f64, String)> {
    let cells = i.formulas.external_cells;
    let rationale = match (i.model.has_external_links, cells) {
        (false, 0) => return None,
        (true, 0) => "workbook declares external workbook links".to_string(),
        (_, n) => format!("{n} formula cell(s) reference other workbooks"),
    };
    Some((i.policy.external_links, rationale))
}

#[derive(Debug)]
pub(crate) struct RiskAssessment {
    pub findings: Vec<RiskFinding>,
    pub subscore: SubScore,
}

impl RiskAssessment {
    pub fn has_blocking(&self) -> bool {
        self.findings.iter().any(|f| f.blocking)
    }

    pub fn has(&self, rule: RiskRule) -> bool {
        self.findings.iter().any(|f| f.rule == rule)
    }

    /// Sum of deductions from every rule other than `rule`.
    pub fn deductions_except(&self, rule: RiskRule) -> f64 {
        self.findings
            .iter()
            .filter(|f| f.rule != rule)
            .map(|f| f.deduction)
            .sum()
    }
}

pub(crate) fn assess(input: &RiskInput<'_>) -> RiskAssessment {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("risk_assessment").entered();

    let mut score = ScoreBuilder::new(Component::Risk, 100.0);
    let mut findings = Vec::new();
    for def in RULES {
        let Some((deduction, rationale)) = (def.evaluate)(input) else {
            continue;
        };
        let deduction = deduction.max(0.0);
        score.apply(
            FindingKind::Risk,
            -deduction,
            format!("{} [{}]: {rationale}", def.rule, def.severity),
        );
        findings.push(RiskFinding {
            rule: def.rule,
            severity: def.severity,
            blocking: def.blocking,
            deduction,
            rationale,
        });
    }
    if findings.is_empty() {
        score.note("no automation risks found");
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(fired = findings.len(), "risk rules evaluated");

    RiskAssessment {
        findings,
        subscore: score.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ExcelFormulaClassifier, FeatureCache};
    use crate::policy::{AnalysisLimits, FormulaPolicy};
    use crate::scan::WorkbookScan;
    use sheetscout_model::{FormatVariant, SheetBuilder, WorkbookBuilder};

    fn run(wb: &WorkbookModel) -> RiskAssessment {
        let classifier = ExcelFormulaClassifier::default();
        let mut cache = FeatureCache::new(&classifier);
        let mut findings = Vec::new();
        let scan = WorkbookScan::new(wb, &AnalysisLimits::default(), &mut findings);
        let formulas =
            FormulaAnalysis::run(&scan, &mut cache, &FormulaPolicy::default(), &mut findings);
        let metrics = StructuralMetrics::measure(&scan, &mut findings);
        assess(&RiskInput {
            model: wb,
            scan: &scan,
            metrics: &metrics,
            formulas: &formulas,
            policy: &RiskPolicy::default(),
        })
    }

    #[test]
    fn clean_workbook_has_no_risk() {
        let wb = WorkbookBuilder::new()
            .sheet(SheetBuilder::new("Data").value(1, 1, 1).build())
            .build();
        let risk = run(&wb);
        assert!(risk.findings.is_empty());
        assert_eq!(risk.subscore.value(), 100.0);
    }

    #[test]
    fn macros_alone_zero_the_score() {
        let wb = WorkbookBuilder::new()
            .sheet(SheetBuilder::new("Data").value(1, 1, 1).build())
            .macros(true)
            .build();
        let risk = run(&wb);
        assert!(risk.has_blocking());
        assert_eq!(risk.findings[0].severity, Severity::Critical);
        assert_eq!(risk.subscore.value(), 0.0);
    }

    #[test]
    fn formula_driven_rules() {
        let wb = WorkbookBuilder::new()
            .sheet(
                SheetBuilder::new("Calc")
                    .protected(true)
                    .formula(1, 1, "=NOW()")
                    .formula(2, 1, "=TODAY()+1")
                    .formula(3, 1, "=[Rates.xlsx]Fx!B2*2")
                    .build(),
            )
            .build();
        let risk = run(&wb);
        let rules: Vec<RiskRule> = risk.findings.iter().map(|f| f.rule).collect();
        assert_eq!(
            rules,
            vec![
                RiskRule::ProtectedSheets,
                RiskRule::ExternalLinks,
                RiskRule::VolatileOrExternal
            ]
        );
        // 10 + 20 + (5 + 2 + 0.5)
        assert_eq!(risk.subscore.value(), 62.5);
        assert!(!risk.has_blocking());
        assert_eq!(risk.deductions_except(RiskRule::ExternalLinks), 17.5);
    }

    fn external_cells(n: u32) -> WorkbookModel {
        let mut sheet = SheetBuilder::new("Feed");
        for row in 1..=n {
            sheet = sheet.formula(row, 1, format!("=[Rates.xlsx]Fx!B{row}"));
        }
        WorkbookBuilder::new().sheet(sheet.build()).build()
    }

    #[test]
    fn external_only_cells_scale_the_tier_deduction() {
        let one = run(&external_cells(1));
        let many = run(&external_cells(40));
        let tier = |r: &RiskAssessment| {
            r.findings
                .iter()
                .find(|f| f.rule == RiskRule::VolatileOrExternal)
                .map(|f| f.deduction)
        };
        assert_eq!(tier(&one), Some(5.5));
        assert_eq!(tier(&many), Some(25.0));
        assert!(many.subscore.value() < one.subscore.value());
    }

    #[test]
    fn xlsm_format_is_a_macro_signal() {
        let wb = WorkbookBuilder::new()
            .sheet(SheetBuilder::new("Data").value(1, 1, 1).build())
            .metadata("book.xlsm", 1024, FormatVariant::Xlsm)
            .build();
        let risk = run(&wb);
        assert!(risk.has(RiskRule::Macros));
        assert!(risk.has_blocking());
        assert_eq!(
            risk.findings[0].rationale,
            "workbook is saved as macro-enabled .xlsm"
        );
    }

    #[test]
    fn sparse_sheet_needs_large_area_and_low_density() {
        let sparse = WorkbookBuilder::new()
            .sheet(
                SheetBuilder::new("Grid")
                    .dimensions(100, 20)
                    .value(1, 1, 1)
                    .value(100, 20, 2)
                    .build(),
            )
            .build();
        let risk = run(&sparse);
        assert!(risk.has(RiskRule::SparseData));

        // 30 x 30 = 900 cells is too small to judge.
        let small = WorkbookBuilder::new()
            .sheet(
                SheetBuilder::new("Grid")
                    .value(1, 1, 1)
                    .value(30, 30, 2)
                    .build(),
            )
            .build();
        assert!(!run(&small).has(RiskRule::SparseData));
    }

    #[test]
    fn formula_heavy_needs_most_sheets() {
        let heavy = || {
            let mut sheet = SheetBuilder::new("Calc");
            for row in 1..=101 {
                sheet = sheet.formula(row, 1, format!("=B{row}*2"));
            }
            sheet.build()
        };
        let wb = WorkbookBuilder::new()
            .sheet(heavy())
            .sheet(SheetBuilder::new("Notes").value(1, 1, "x").build())
            .build();
        assert!(!run(&wb).has(RiskRule::FormulaHeavy));

        let wb = WorkbookBuilder::new().sheet(heavy()).build();
        let risk = run(&wb);
        let finding = risk
            .findings
            .iter()
            .find(|f| f.rule == RiskRule::FormulaHeavy)
            .expect("formula-heavy fires");
        assert_eq!(finding.rationale, "1 of 1 sheet(s) are mostly formulas");
        assert_eq!(finding.deduction, 10.0);
    }

    #[test]
    fn macro_calls_in_formulas_count_as_macros() {
        let wb = WorkbookBuilder::new()
            .sheet(
                SheetBuilder::new("Calc")
                    .formula(1, 1, "=CALL(\"user32\",\"MessageBoxA\",\"JJCCJ\",0,\"x\",\"y\",0)")
                    .build(),
            )
            .build();
        let risk = run(&wb);
        assert!(risk.has(RiskRule::Macros));
    }
}
