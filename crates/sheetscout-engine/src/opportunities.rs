use crate::classifier::ComplexityTier;
use crate::formula::FormulaAnalysis;
use crate::patterns::{Pattern, PatternAnalysis, SheetRole};
use crate::structure::StructuralMetrics;

pub(crate) struct OpportunityInput<'s> {
    pub metrics: &'s StructuralMetrics,
    pub formulas: &'s FormulaAnalysis,
    pub patterns: &'s PatternAnalysis,
}

struct OpportunityRule {
    text: &'static str,
    applies: fn(&OpportunityInput<'_>) -> bool,
}

const RULES: &[OpportunityRule] = &[
    OpportunityRule {
        text: "Monthly/quarterly reporting can be fully automated with templates",
        applies: |i| i.patterns.has(Pattern::PeriodicReport),
    },
    OpportunityRule {
        text: "Data consolidation process has high ROI automation potential",
        applies: |i| i.patterns.has(Pattern::Consolidation),
    },
    OpportunityRule {
        text: "Repeated sheet structures can use template-based automation",
        applies: |i| {
            i.patterns.has(Pattern::TemplatedLayout) || i.patterns.has(Pattern::RepeatedNaming)
        },
    },
    OpportunityRule {
        text: "Named ranges indicate well-structured data - easier automation implementation",
        applies: |i| i.metrics.named_ranges > 0,
    },
    OpportunityRule {
        text: "Manageable number of sheets - straightforward automation scope",
        applies: |i| (1..=10).contains(&i.metrics.sheet_count),
    },
    OpportunityRule {
        text: "Majority of formulas are simple - easy to replicate in automation",
        applies: |i| {
            i.formulas
                .share_at_most(ComplexityTier::Basic)
                .is_some_and(|share| share > 0.7)
        },
    },
    OpportunityRule {
        text: "Low formula volume - minimal logic replication required",
        applies: |i| i.formulas.formula_cells < 100,
    },
    OpportunityRule {
        text: "Complete workflow automation possible - high impact potential",
        applies: |i| i.patterns.has(Pattern::ProcessPipeline),
    },
    OpportunityRule {
        text: "Data integration automation can eliminate manual consolidation",
        applies: |i| {
            let outputs = i.patterns.role_count(SheetRole::Reporting)
                + i.patterns.role_count(SheetRole::Summary);
            i.patterns.role_count(SheetRole::Input) >= 2 && outputs >= 1
        },
    },
    OpportunityRule {
        text: "Small file size enables cloud-based automation solutions",
        applies: |i| i.metrics.file_size_mb < 10.0,
    },
    OpportunityRule {
        text: "Master templates detected - can standardize and automate variations",
        applies: |i| i.patterns.role_count(SheetRole::Template) > 0,
    },
    OpportunityRule {
        text: "Data entry processes can be automated with forms or APIs",
        applies: |i| i.patterns.role_count(SheetRole::Input) > 0,
    },
    OpportunityRule {
        text: "Report generation can be automated with scheduled processes",
        applies: |i| i.patterns.role_count(SheetRole::Reporting) > 0,
    },
];

/// Opportunity lines in rule order, followed by an ROI line when three or
/// more apply.
pub(crate) fn identify(input: &OpportunityInput<'_>) -> Vec<String> {
    let mut found: Vec<String> = RULES
        .iter()
        .filter(|rule| (rule.applies)(input))
        .map(|rule| rule.text.to_string())
        .collect();
    match found.len() {
        n if n >= 5 => {
            found.push("Multiple automation opportunities identified - high ROI potential".into())
        }
        n if n >= 3 => found.push("Several automation opportunities - good ROI potential".into()),
        _ => {}
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ExcelFormulaClassifier, FeatureCache};
    use crate::patterns;
    use crate::policy::{AnalysisLimits, FormulaPolicy, PatternPolicy};
    use crate::scan::WorkbookScan;
    use sheetscout_model::{FormatVariant, SheetBuilder, WorkbookBuilder, WorkbookModel};

    fn run(wb: &WorkbookModel) -> Vec<String> {
        let classifier = ExcelFormulaClassifier::default();
        let mut cache = FeatureCache::new(&classifier);
        let mut findings = Vec::new();
        let scan = WorkbookScan::new(wb, &AnalysisLimits::default(), &mut findings);
        let formulas =
            FormulaAnalysis::run(&scan, &mut cache, &FormulaPolicy::default(), &mut findings);
        let metrics = StructuralMetrics::measure(&scan, &mut findings);
        let patterns = patterns::detect(&scan, &formulas, &PatternPolicy::default());
        identify(&OpportunityInput {
            metrics: &metrics,
            formulas: &formulas,
            patterns: &patterns,
        })
    }

    #[test]
    fn small_plain_workbook() {
        let wb = WorkbookBuilder::new()
            .sheet(SheetBuilder::new("Data").formula(1, 1, "=SUM(B1:B4)").build())
            .build();
        let found = run(&wb);
        assert_eq!(
            found,
            vec![
                "Manageable number of sheets - straightforward automation scope",
                "Majority of formulas are simple - easy to replicate in automation",
                "Low formula volume - minimal logic replication required",
                "Small file size enables cloud-based automation solutions",
                "Data entry processes can be automated with forms or APIs",
                "Multiple automation opportunities identified - high ROI potential",
            ]
        );
    }

    #[test]
    fn sheet_roles_drive_process_opportunities() {
        let wb = WorkbookBuilder::new()
            .metadata("ops.xlsx", 12 * 1024 * 1024, FormatVariant::Xlsx)
            .sheet(SheetBuilder::new("Input North").value(1, 1, 1).build())
            .sheet(SheetBuilder::new("Input South").value(1, 1, 2).build())
            .sheet(SheetBuilder::new("Master").value(1, 1, 3).build())
            .sheet(SheetBuilder::new("Results").value(1, 1, 4).build())
            .build();
        let found = run(&wb);
        for line in [
            "Data integration automation can eliminate manual consolidation",
            "Master templates detected - can standardize and automate variations",
            "Data entry processes can be automated with forms or APIs",
            "Report generation can be automated with scheduled processes",
        ] {
            assert!(found.iter().any(|f| f == line), "{line} in {found:?}");
        }
        assert!(!found.iter().any(|f| f.starts_with("Small file")));
    }

    #[test]
    fn one_input_sheet_is_not_integration() {
        let wb = WorkbookBuilder::new()
            .sheet(SheetBuilder::new("Raw").value(1, 1, 1).build())
            .sheet(SheetBuilder::new("Overview").value(1, 1, 2).build())
            .build();
        let found = run(&wb);
        assert!(!found.iter().any(|f| f.starts_with("Data integration")));
        assert!(found.iter().any(|f| f.starts_with("Data entry")));
        assert!(!found.iter().any(|f| f.starts_with("Report generation")));
    }

    #[test]
    fn large_workbook_has_few_opportunities() {
        let mut wb = WorkbookBuilder::new().metadata("big.xlsx", 40 * 1024 * 1024, FormatVariant::Xlsx);
        for letter in b'A'..b'M' {
            wb = wb.sheet(
                SheetBuilder::new(format!("Area {}", char::from(letter)))
                    .formula(1, 1, "=IF(A2>0,1,0)")
                    .build(),
            );
        }
        let found = run(&wb.build());
        assert_eq!(found, vec!["Low formula volume - minimal logic replication required"]);
    }
}
