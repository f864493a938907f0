use proptest::prelude::*;
use sheetscout_common::CellRange;
use sheetscout_engine::{
    Component, ComplexityTier, ExcelFormulaClassifier, FeasibilityEngine, FormulaClassifier,
};
use sheetscout_model::{FormatVariant, SheetBuilder, SheetVisibility, WorkbookBuilder, WorkbookModel};

const FORMULAS: &[&str] = &[
    "=A1+B1",
    "=SUM(A1:A9)",
    "=VLOOKUP(A1,Rates!A:B,2,FALSE)",
    "=IF(A1>0,SUM(B1:B3),0)",
    "=SUMIFS(C:C,A:A,\"x\")",
    "=_xlfn.FILTER(A1:A9,B1:B9>0)",
    "=NOW()",
    "=INDIRECT(\"A\"&ROW())",
    "=[Other.xlsx]Sheet1!A1",
    "=SUM(Jan:Dec!B2)",
    "=SUM(A1",
    "=CALL(\"x\")",
    "={1,2;3,4}",
];

const NAMES: &[&str] = &[
    "Data", "Jan", "Feb", "Summary", "Input", "Calc", "Report", "Store 1", "Store 2", "Rates",
    "Dec", "Q1 2024",
];

#[derive(Debug, Clone)]
struct SheetLayout {
    name: usize,
    visibility: u8,
    protected: bool,
    cells: Vec<(u32, u32, Option<usize>, i32)>,
    merges: Vec<(u32, u32, u32, u32)>,
}

fn sheet_layout() -> impl Strategy<Value = SheetLayout> {
    (
        0..NAMES.len(),
        0u8..3,
        any::<bool>(),
        prop::collection::vec(
            (1u32..40, 1u32..8, prop::option::of(0..FORMULAS.len()), -50i32..50),
            0..30,
        ),
        prop::collection::vec((1u32..20, 1u32..6, 1u32..20, 1u32..6), 0..4),
    )
        .prop_map(|(name, visibility, protected, cells, merges)| SheetLayout {
            name,
            visibility,
            protected,
            cells,
            merges,
        })
}

fn workbook() -> impl Strategy<Value = WorkbookModel> {
    (
        prop::collection::vec(sheet_layout(), 0..6),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0u64..300 * 1024 * 1024,
        0usize..15,
    )
        .prop_map(|(sheets, macros, password, links, size, names)| {
            let mut wb = WorkbookBuilder::new()
                .macros(macros)
                .password_protected(password)
                .external_links(links)
                .metadata("generated.xlsx", size, FormatVariant::Xlsx);
            for i in 0..names {
                wb = wb.named_range(format!("Name{i}"), "Data!$A$1");
            }
            for (i, layout) in sheets.into_iter().enumerate() {
                let visibility = match layout.visibility {
                    0 => SheetVisibility::Visible,
                    1 => SheetVisibility::Hidden,
                    _ => SheetVisibility::VeryHidden,
                };
                let mut sheet = SheetBuilder::new(format!("{} {i}", NAMES[layout.name]))
                    .visibility(visibility)
                    .protected(layout.protected);
                for (row, col, formula, value) in layout.cells {
                    sheet = match formula {
                        Some(f) => sheet.formula(row, col, FORMULAS[f]),
                        None => sheet.value(row, col, value),
                    };
                }
                for (r1, c1, r2, c2) in layout.merges {
                    sheet = sheet.merge(CellRange::new(r1, c1, r2, c2));
                }
                wb = wb.sheet(sheet.build());
            }
            wb.build()
        })
}

fn in_bounds(v: f64) -> bool {
    (0.0..=100.0).contains(&v)
}

proptest! {
    #[test]
    fn scores_stay_within_bounds(wb in workbook()) {
        let report = FeasibilityEngine::default().analyze(&wb);
        prop_assert!(in_bounds(report.composite()));
        for component in Component::ALL {
            prop_assert!(in_bounds(report.subscore(component).value()));
        }
        for rec in report.recommendations() {
            prop_assert!(in_bounds(rec.suitability));
        }
        if wb.sheets.is_empty() {
            prop_assert_eq!(report.engine_findings().len(), 1);
        } else {
            prop_assert_eq!(report.recommendations().len(), 4);
        }
    }

    #[test]
    fn adding_risk_conditions_never_raises_risk(wb in workbook(), which in 0usize..5) {
        let engine = FeasibilityEngine::default();
        let before = engine.analyze(&wb).subscore(Component::Risk).value();

        let mut riskier = wb.clone();
        match which {
            0 => riskier.has_macros = true,
            1 => riskier.is_password_protected = true,
            2 => riskier.has_external_links = true,
            3 => riskier.metadata.size_bytes += 200 * 1024 * 1024,
            _ => {
                if let Some(sheet) = riskier.sheets.first_mut() {
                    sheet.is_protected = true;
                }
            }
        }
        let after = engine.analyze(&riskier).subscore(Component::Risk).value();
        prop_assert!(after <= before, "risk rose from {} to {}", before, after);
    }

    #[test]
    fn volatile_functions_dominate(prefix in "[A-C][1-9]", func in prop::sample::select(vec!["NOW()", "TODAY()", "RAND()", "OFFSET(A1,1,1)", "INDIRECT(\"B2\")"])) {
        let classifier = ExcelFormulaClassifier::default();
        let formula = format!("=IF({prefix}>0,SUM({prefix}:D9)+{func},_xlfn.UNIQUE(A1:A9))");
        let features = classifier.classify(&formula);
        prop_assert_eq!(features.tier, ComplexityTier::VolatileOrExternal);
        prop_assert!(features.volatile);
        prop_assert_eq!(classifier.classify(&formula), features);
    }
}
