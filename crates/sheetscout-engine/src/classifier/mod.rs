//! Formula complexity classification.
//!
//! A formula's tier is the most severe feature found in it. Classification
//! is context-free: the same text always yields the same
//! [`FormulaFeatures`], which is what makes per-run caching by formula text
//! sound.

pub mod cache;
pub mod catalog;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use sheetscout_parse::{Reference, ReferenceKind, TokenSubType, TokenType, Tokenizer};
use smallvec::SmallVec;

use crate::policy::{AnalysisLimits, FormulaPolicy, ScoringPolicy};
use catalog::{FunctionFamily, family_of, is_macro_call, normalize_function_name};

pub use cache::FeatureCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplexityTier {
    Trivial,
    Basic,
    Lookup,
    Conditional,
    ArrayOrNested,
    VolatileOrExternal,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 6] = [
        ComplexityTier::Trivial,
        ComplexityTier::Basic,
        ComplexityTier::Lookup,
        ComplexityTier::Conditional,
        ComplexityTier::ArrayOrNested,
        ComplexityTier::VolatileOrExternal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ComplexityTier::Trivial => "trivial",
            ComplexityTier::Basic => "basic",
            ComplexityTier::Lookup => "lookup",
            ComplexityTier::Conditional => "conditional",
            ComplexityTier::ArrayOrNested => "array/nested",
            ComplexityTier::VolatileOrExternal => "volatile/external",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How far a formula's references reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceSpan {
    #[default]
    SameSheet,
    CrossSheet,
    CrossWorkbook,
}

/// A sheet-qualified reference target; `last` is set for 3-D references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SheetTarget {
    pub first: String,
    pub last: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ClassifyFailure {
    Unparsable { message: String },
    TooLong { len: usize, limit: usize },
}

impl fmt::Display for ClassifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyFailure::Unparsable { message } => write!(f, "{message}"),
            ClassifyFailure::TooLong { len, limit } => {
                write!(f, "formula is {len} characters, limit is {limit}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormulaFeatures {
    pub tier: ComplexityTier,
    /// Normalized names of every function called.
    pub functions: BTreeSet<String>,
    pub span: ReferenceSpan,
    /// Uses a volatile or environment function.
    pub volatile: bool,
    /// Calls code outside the formula language (`CALL`, `REGISTER`, `RUN`).
    pub macro_calls: bool,
    /// Deepest function-call nesting; `SUM(A1)` is 1.
    pub max_depth: u32,
    pub sheets: BTreeSet<SheetTarget>,
    pub workbooks: BTreeSet<String>,
    pub failure: Option<ClassifyFailure>,
}

impl FormulaFeatures {
    fn empty() -> Self {
        Self {
            tier: ComplexityTier::Trivial,
            functions: BTreeSet::new(),
            span: ReferenceSpan::SameSheet,
            volatile: false,
            macro_calls: false,
            max_depth: 0,
            sheets: BTreeSet::new(),
            workbooks: BTreeSet::new(),
            failure: None,
        }
    }

    fn failed(failure: ClassifyFailure) -> Self {
        Self {
            tier: ComplexityTier::ArrayOrNested,
            failure: Some(failure),
            ..Self::empty()
        }
    }

    fn raise(&mut self, tier: ComplexityTier) {
        self.tier = self.tier.max(tier);
    }

    fn widen(&mut self, span: ReferenceSpan) {
        self.span = self.span.max(span);
    }
}

/// Classifies one formula string. Implementations must be deterministic.
pub trait FormulaClassifier {
    fn classify(&self, formula: &str) -> FormulaFeatures;
}

/// Classifier over the Excel tokenizer, driven by the formula section of a
/// [`ScoringPolicy`].
#[derive(Debug, Clone)]
pub struct ExcelFormulaClassifier {
    long_formula_len: usize,
    max_formula_len: usize,
    conditional_depth: u32,
    nested_depth: u32,
}

impl Default for ExcelFormulaClassifier {
    fn default() -> Self {
        Self::from_policy(&ScoringPolicy::default())
    }
}

impl ExcelFormulaClassifier {
    pub fn new(formula: &FormulaPolicy, limits: &AnalysisLimits) -> Self {
        Self {
            long_formula_len: formula.long_formula_len,
            max_formula_len: limits.max_formula_len,
            conditional_depth: formula.conditional_depth,
            nested_depth: formula.nested_depth,
        }
    }

    pub fn from_policy(policy: &ScoringPolicy) -> Self {
        Self::new(&policy.formula, &policy.limits)
    }

    fn apply_function(features: &mut FormulaFeatures, raw_name: &str) {
        let name = normalize_function_name(raw_name);
        let tier = match family_of(&name) {
            Some(FunctionFamily::Aggregate | FunctionFamily::Scalar) => ComplexityTier::Basic,
            Some(FunctionFamily::Lookup) => ComplexityTier::Lookup,
            Some(FunctionFamily::Conditional) | None => ComplexityTier::Conditional,
            Some(FunctionFamily::DynamicArray) => ComplexityTier::ArrayOrNested,
            Some(FunctionFamily::Volatile | FunctionFamily::Environment) => {
                features.volatile = true;
                ComplexityTier::VolatileOrExternal
            }
        };
        if is_macro_call(&name) {
            features.macro_calls = true;
        }
        features.raise(tier);
        features.functions.insert(name);
    }

    fn apply_reference(features: &mut FormulaFeatures, operand: &str) {
        let reference = Reference::parse(operand);
        if reference.kind == ReferenceKind::Spill {
            features.raise(ComplexityTier::ArrayOrNested);
        }
        if let Some(book) = &reference.workbook {
            features.widen(ReferenceSpan::CrossWorkbook);
            features.raise(ComplexityTier::VolatileOrExternal);
            features.workbooks.insert(book.clone());
        } else if let Some(first) = reference.first_sheet {
            features.widen(ReferenceSpan::CrossSheet);
            features.raise(ComplexityTier::Lookup);
            features.sheets.insert(SheetTarget {
                first,
                last: reference.last_sheet,
            });
        }
    }
}

impl FormulaClassifier for ExcelFormulaClassifier {
    fn classify(&self, formula: &str) -> FormulaFeatures {
        let trimmed = formula.trim();
        let len = trimmed.chars().count();
        if len > self.max_formula_len {
            return FormulaFeatures::failed(ClassifyFailure::TooLong {
                len,
                limit: self.max_formula_len,
            });
        }

        let mut features = FormulaFeatures::empty();

        // `{=SUM(A1:A3*B1:B3)}` is how legacy array formulas are displayed.
        let body = match trimmed.strip_prefix("{=").and_then(|s| s.strip_suffix('}')) {
            Some(inner) => {
                features.raise(ComplexityTier::ArrayOrNested);
                format!("={inner}")
            }
            None if trimmed.starts_with('=') => trimmed.to_string(),
            None => format!("={trimmed}"),
        };

        let tokenizer = match Tokenizer::new(&body) {
            Ok(t) => t,
            Err(e) => {
                return FormulaFeatures::failed(ClassifyFailure::Unparsable {
                    message: e.to_string(),
                });
            }
        };

        let mut openers: SmallVec<[bool; 16]> = SmallVec::new();
        let mut depth = 0u32;
        for token in tokenizer.tokens() {
            match (token.token_type, token.subtype) {
                (TokenType::Func, TokenSubType::Open) => {
                    depth += 1;
                    features.max_depth = features.max_depth.max(depth);
                    openers.push(true);
                    if let Some(name) = token.function_name() {
                        Self::apply_function(&mut features, name);
                    }
                }
                (TokenType::Paren | TokenType::Array, TokenSubType::Open) => {
                    if token.token_type == TokenType::Array {
                        features.raise(ComplexityTier::ArrayOrNested);
                    }
                    openers.push(false);
                }
                (_, TokenSubType::Close) => {
                    if openers.pop() == Some(true) {
                        depth = depth.saturating_sub(1);
                    }
                }
                (TokenType::Operand, TokenSubType::Range) => {
                    Self::apply_reference(&mut features, &token.value);
                }
                _ => {}
            }
        }

        if features.max_depth >= self.nested_depth {
            features.raise(ComplexityTier::ArrayOrNested);
        } else if features.max_depth >= self.conditional_depth {
            features.raise(ComplexityTier::Conditional);
        }
        if len > self.long_formula_len {
            features.raise(ComplexityTier::ArrayOrNested);
        }

        features
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(formula: &str) -> ComplexityTier {
        ExcelFormulaClassifier::default().classify(formula).tier
    }

    #[test]
    fn tiers_follow_the_most_severe_feature() {
        assert_eq!(tier("=A1+B1*2"), ComplexityTier::Trivial);
        assert_eq!(tier("=SUM(A1:A10)"), ComplexityTier::Basic);
        assert_eq!(tier("=VLOOKUP(A1,B:C,2,FALSE)"), ComplexityTier::Lookup);
        assert_eq!(tier("=Inputs!B2*1.2"), ComplexityTier::Lookup);
        assert_eq!(tier("=SUMIFS(C:C,A:A,\"x\")"), ComplexityTier::Conditional);
        assert_eq!(tier("=ROUND(SUM(A1:A3),2)"), ComplexityTier::Conditional);
        assert_eq!(tier("=MYUDF(A1)"), ComplexityTier::Conditional);
        assert_eq!(tier("=SUM({1,2,3})"), ComplexityTier::ArrayOrNested);
        assert_eq!(tier("=_xlfn.UNIQUE(A1:A9)"), ComplexityTier::ArrayOrNested);
        assert_eq!(tier("=SUM(A2#)"), ComplexityTier::ArrayOrNested);
        assert_eq!(tier("{=SUM(A1:A3*B1:B3)}"), ComplexityTier::ArrayOrNested);
        assert_eq!(
            tier("=ROUND(ABS(INT(SUM(A1:A3))),1)"),
            ComplexityTier::ArrayOrNested
        );
        assert_eq!(tier("=NOW()"), ComplexityTier::VolatileOrExternal);
        assert_eq!(tier("=[Prices.xlsx]Rates!A1"), ComplexityTier::VolatileOrExternal);
    }

    #[test]
    fn range_ending_in_a_call_is_a_lookup() {
        assert_eq!(tier("=A1:INDEX(B:B,3)"), ComplexityTier::Lookup);
        let f = ExcelFormulaClassifier::default().classify("=Data!A1:INDEX(B:B,3)");
        assert_eq!(f.span, ReferenceSpan::CrossSheet);
        assert!(f.functions.contains("INDEX"));
        assert!(!f.functions.iter().any(|name| name.contains(':')));
        let firsts: Vec<&str> = f.sheets.iter().map(|s| s.first.as_str()).collect();
        assert_eq!(firsts, vec!["Data"]);
    }

    #[test]
    fn long_formula_is_array_or_nested() {
        let formula = format!("={}", vec!["A1"; 100].join("+"));
        assert_eq!(tier(&formula), ComplexityTier::ArrayOrNested);
    }

    #[test]
    fn over_limit_formula_is_not_tokenized() {
        let classifier = ExcelFormulaClassifier {
            max_formula_len: 10,
            ..ExcelFormulaClassifier::default()
        };
        let features = classifier.classify("=NOW()+A1+A2+A3");
        assert_eq!(features.tier, ComplexityTier::ArrayOrNested);
        assert!(matches!(features.failure, Some(ClassifyFailure::TooLong { .. })));
        assert!(features.functions.is_empty());
    }

    #[test]
    fn unparsable_formula_is_array_or_nested() {
        let features = ExcelFormulaClassifier::default().classify("=SUM(A1");
        assert_eq!(features.tier, ComplexityTier::ArrayOrNested);
        assert!(matches!(features.failure, Some(ClassifyFailure::Unparsable { .. })));
    }

    #[test]
    fn references_and_spans() {
        let f = ExcelFormulaClassifier::default()
            .classify("=SUM(Jan:Dec!B2)+'Q1 Data'!A1+IF(CALL(\"x\"),1,0)");
        assert_eq!(f.span, ReferenceSpan::CrossSheet);
        assert!(f.macro_calls);
        assert!(f.volatile);
        assert_eq!(f.max_depth, 2);
        let firsts: Vec<&str> = f.sheets.iter().map(|s| s.first.as_str()).collect();
        assert_eq!(firsts, vec!["Jan", "Q1 Data"]);
        assert_eq!(
            f.sheets.iter().next().and_then(|s| s.last.as_deref()),
            Some("Dec")
        );
    }
}
