//! Every numeric constant the engine scores with.
//!
//! A [`ScoringPolicy`] can be written as YAML; omitted sections and fields
//! fall back to the defaults documented on each field.
//!
//! ```yaml
//! weights:
//!   risk: 0.5
//! limits:
//!   max_sheets: 50
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// One entry of a descending threshold table: values strictly above
/// `above` cost (or earn) `points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub above: f64,
    pub points: f64,
}

impl Step {
    pub const fn new(above: f64, points: f64) -> Self {
        Self { above, points }
    }

    /// First step whose threshold `value` exceeds. Tables are ordered from
    /// the highest threshold down.
    pub fn lookup(steps: &[Step], value: f64) -> Option<&Step> {
        steps.iter().find(|s| value > s.above)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub structure: f64,
    pub formula: f64,
    pub pattern: f64,
    pub risk: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            structure: 0.20,
            formula: 0.30,
            pattern: 0.15,
            risk: 0.35,
        }
    }
}

impl Weights {
    pub fn total(&self) -> f64 {
        self.structure + self.formula + self.pattern + self.risk
    }
}

/// Lower bounds of the effort bands. Below `high` the effort is very high.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffortThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for EffortThresholds {
    fn default() -> Self {
        Self {
            low: 75.0,
            medium: 55.0,
            high: 35.0,
        }
    }
}

/// Soft limits. Past a limit the engine stops scanning and records a
/// `Truncated` finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisLimits {
    /// Formulas longer than this are not tokenized.
    pub max_formula_len: usize,
    /// Cells scanned across the whole workbook.
    pub max_cells: usize,
    pub max_sheets: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        Self {
            max_formula_len: 8192,
            max_cells: 500_000,
            max_sheets: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierPenalties {
    pub trivial: f64,
    pub basic: f64,
    pub lookup: f64,
    pub conditional: f64,
    pub array_or_nested: f64,
    pub volatile_or_external: f64,
}

impl Default for TierPenalties {
    fn default() -> Self {
        Self {
            trivial: 0.0,
            basic: 5.0,
            lookup: 25.0,
            conditional: 35.0,
            array_or_nested: 60.0,
            volatile_or_external: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormulaPolicy {
    /// Formulas longer than this count as array/nested.
    pub long_formula_len: usize,
    /// Function nesting depth that makes a formula conditional.
    pub conditional_depth: u32,
    /// Function nesting depth that makes a formula array/nested.
    pub nested_depth: u32,
    pub penalties: TierPenalties,
    /// Deduction by number of formula cells.
    pub volume_steps: Vec<Step>,
}

impl Default for FormulaPolicy {
    fn default() -> Self {
        Self {
            long_formula_len: 256,
            conditional_depth: 2,
            nested_depth: 4,
            penalties: TierPenalties::default(),
            volume_steps: vec![Step::new(1000.0, 10.0), Step::new(100.0, 5.0)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructurePolicy {
    /// No single metric may take the score below this.
    pub floor: f64,
    pub bonus_ceiling: f64,
    pub sheet_count_steps: Vec<Step>,
    /// Deduction per unit of hidden-sheet ratio.
    pub hidden_ratio_weight: f64,
    pub very_hidden_points: f64,
    pub hidden_cap: f64,
    /// Keyed by merged ranges per populated cell on the densest sheet.
    pub merged_density_steps: Vec<Step>,
    pub irregularity_cv: f64,
    pub irregularity_factor: f64,
    pub irregularity_cap: f64,
    pub large_file_mb: f64,
    pub large_file_points: f64,
    /// Up to this many named ranges earns `named_ranges_bonus`.
    pub named_ranges_few: usize,
    pub named_ranges_bonus: f64,
    pub named_ranges_many_bonus: f64,
}

impl Default for StructurePolicy {
    fn default() -> Self {
        Self {
            floor: 10.0,
            bonus_ceiling: 10.0,
            sheet_count_steps: vec![
                Step::new(30.0, 20.0),
                Step::new(20.0, 10.0),
                Step::new(10.0, 5.0),
            ],
            hidden_ratio_weight: 30.0,
            very_hidden_points: 5.0,
            hidden_cap: 25.0,
            merged_density_steps: vec![
                Step::new(0.2, 25.0),
                Step::new(0.1, 15.0),
                Step::new(0.0, 5.0),
            ],
            irregularity_cv: 0.5,
            irregularity_factor: 20.0,
            irregularity_cap: 20.0,
            large_file_mb: 50.0,
            large_file_points: 15.0,
            named_ranges_few: 10,
            named_ranges_bonus: 10.0,
            named_ranges_many_bonus: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternPolicy {
    pub templated_bonus: f64,
    /// Jaccard similarity of header sets for two sheets to share a template.
    pub header_similarity: f64,
    pub column_tolerance: u32,
    /// Header rows shorter than this are not compared.
    pub min_header_cells: usize,
    pub periodic_bonus: f64,
    pub min_periodic_sheets: usize,
    pub consolidation_bonus: f64,
    pub fan_in_ratio: f64,
    pub min_fan_in: usize,
    pub pipeline_bonus: f64,
    pub repeated_naming_bonus: f64,
    pub min_repeated_names: usize,
    /// Template-named sheet plus at least two other sheets.
    pub master_template_bonus: f64,
}

impl Default for PatternPolicy {
    fn default() -> Self {
        Self {
            templated_bonus: 35.0,
            header_similarity: 0.8,
            column_tolerance: 1,
            min_header_cells: 2,
            periodic_bonus: 30.0,
            min_periodic_sheets: 2,
            consolidation_bonus: 30.0,
            fan_in_ratio: 0.5,
            min_fan_in: 2,
            pipeline_bonus: 15.0,
            repeated_naming_bonus: 10.0,
            min_repeated_names: 3,
            master_template_bonus: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub macros: f64,
    pub password: f64,
    pub protected_sheet: f64,
    pub protected_cap: f64,
    pub external_links: f64,
    /// Base of the volatile/external-tier deduction.
    pub volatile_base: f64,
    pub volatile_per_cell: f64,
    /// Per tier cell that reaches another workbook without being volatile.
    /// Kept below `volatile_per_cell` since `external_links` already fires.
    pub external_per_cell: f64,
    pub volatile_cap: f64,
    pub inconsistency_threshold: f64,
    pub inconsistency: f64,
    pub very_hidden: f64,
    pub large_file_mb: f64,
    pub large_file: f64,
    pub formula_volume: usize,
    pub formula_volume_points: f64,
    /// Populated share of a sheet's area below which the sheet is sparse.
    pub sparse_density: f64,
    /// Sheets with a smaller area are never sparse.
    pub sparse_min_area: u64,
    pub sparse_data: f64,
    /// A sheet with more populated cells than this is formula-heavy when
    /// over `formula_heavy_ratio` of them hold formulas.
    pub formula_heavy_cells: usize,
    pub formula_heavy_ratio: f64,
    /// Share of analyzed sheets that must be formula-heavy.
    pub formula_heavy_share: f64,
    pub formula_heavy: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            macros: 100.0,
            password: 40.0,
            protected_sheet: 10.0,
            protected_cap: 25.0,
            external_links: 20.0,
            volatile_base: 5.0,
            volatile_per_cell: 1.0,
            external_per_cell: 0.5,
            volatile_cap: 30.0,
            inconsistency_threshold: 0.5,
            inconsistency: 10.0,
            very_hidden: 10.0,
            large_file_mb: 100.0,
            large_file: 10.0,
            formula_volume: 2000,
            formula_volume_points: 5.0,
            sparse_density: 0.05,
            sparse_min_area: 1000,
            sparse_data: 5.0,
            formula_heavy_cells: 100,
            formula_heavy_ratio: 0.7,
            formula_heavy_share: 0.5,
            formula_heavy: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub weights: Weights,
    pub effort: EffortThresholds,
    pub limits: AnalysisLimits,
    pub formula: FormulaPolicy,
    pub structure: StructurePolicy,
    pub pattern: PatternPolicy,
    pub risk: RiskPolicy,
}

/// A single problem found while validating a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyIssue {
    pub path: String,
    pub message: String,
}

impl PolicyIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PolicyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn join_issues(issues: &[PolicyIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to parse scoring policy: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid scoring policy: {}", join_issues(.issues))]
    Invalid { issues: Vec<PolicyIssue> },
}

impl ScoringPolicy {
    /// Parse and validate a YAML policy.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PolicyError> {
        let policy: ScoringPolicy = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_yaml_reader<R: std::io::Read>(reader: R) -> Result<Self, PolicyError> {
        let policy: ScoringPolicy = serde_yaml::from_reader(reader)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check every invariant and report all violations at once.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let mut issues = Vec::new();

        let w = &self.weights;
        non_negative(
            &mut issues,
            "weights",
            &[
                ("structure", w.structure),
                ("formula", w.formula),
                ("pattern", w.pattern),
                ("risk", w.risk),
            ],
        );
        if !(w.total() > 0.0) {
            issues.push(PolicyIssue::new("weights", "weights must not all be zero"));
        }

        let e = &self.effort;
        if !(e.low > e.medium && e.medium > e.high) {
            issues.push(PolicyIssue::new(
                "effort",
                format!(
                    "thresholds must descend (low > medium > high), found {} / {} / {}",
                    e.low, e.medium, e.high
                ),
            ));
        }
        for (name, value) in [("low", e.low), ("medium", e.medium), ("high", e.high)] {
            if !(0.0..=100.0).contains(&value) {
                issues.push(PolicyIssue::new(
                    format!("effort.{name}"),
                    format!("threshold must be within 0..=100, found {value}"),
                ));
            }
        }

        let l = &self.limits;
        for (name, value) in [
            ("max_formula_len", l.max_formula_len),
            ("max_cells", l.max_cells),
            ("max_sheets", l.max_sheets),
        ] {
            if value == 0 {
                issues.push(PolicyIssue::new(
                    format!("limits.{name}"),
                    "limit must be greater than zero",
                ));
            }
        }

        let p = &self.formula.penalties;
        for (name, value) in [
            ("trivial", p.trivial),
            ("basic", p.basic),
            ("lookup", p.lookup),
            ("conditional", p.conditional),
            ("array_or_nested", p.array_or_nested),
            ("volatile_or_external", p.volatile_or_external),
        ] {
            if !(0.0..=100.0).contains(&value) {
                issues.push(PolicyIssue::new(
                    format!("formula.penalties.{name}"),
                    format!("penalty must be within 0..=100, found {value}"),
                ));
            }
        }
        if self.formula.conditional_depth == 0
            || self.formula.nested_depth < self.formula.conditional_depth
        {
            issues.push(PolicyIssue::new(
                "formula.nested_depth",
                "nested_depth must be at least conditional_depth, and both above zero",
            ));
        }

        for (path, steps) in [
            ("formula.volume_steps", &self.formula.volume_steps),
            ("structure.sheet_count_steps", &self.structure.sheet_count_steps),
            (
                "structure.merged_density_steps",
                &self.structure.merged_density_steps,
            ),
        ] {
            if steps.windows(2).any(|pair| !(pair[0].above > pair[1].above)) {
                issues.push(PolicyIssue::new(
                    path,
                    "steps must be listed from the highest threshold down",
                ));
            }
            if steps
                .iter()
                .any(|s| !s.above.is_finite() || !s.points.is_finite() || s.points < 0.0)
            {
                issues.push(PolicyIssue::new(
                    path,
                    "step thresholds must be numbers and points non-negative",
                ));
            }
        }

        let st = &self.structure;
        non_negative(
            &mut issues,
            "structure",
            &[
                ("bonus_ceiling", st.bonus_ceiling),
                ("hidden_ratio_weight", st.hidden_ratio_weight),
                ("very_hidden_points", st.very_hidden_points),
                ("hidden_cap", st.hidden_cap),
                ("irregularity_cv", st.irregularity_cv),
                ("irregularity_factor", st.irregularity_factor),
                ("irregularity_cap", st.irregularity_cap),
                ("large_file_mb", st.large_file_mb),
                ("large_file_points", st.large_file_points),
                ("named_ranges_bonus", st.named_ranges_bonus),
                ("named_ranges_many_bonus", st.named_ranges_many_bonus),
            ],
        );

        let pt = &self.pattern;
        non_negative(
            &mut issues,
            "pattern",
            &[
                ("templated_bonus", pt.templated_bonus),
                ("periodic_bonus", pt.periodic_bonus),
                ("consolidation_bonus", pt.consolidation_bonus),
                ("pipeline_bonus", pt.pipeline_bonus),
                ("repeated_naming_bonus", pt.repeated_naming_bonus),
                ("master_template_bonus", pt.master_template_bonus),
            ],
        );
        fraction(&mut issues, "pattern", &[("fan_in_ratio", pt.fan_in_ratio)]);

        let r = &self.risk;
        non_negative(
            &mut issues,
            "risk",
            &[
                ("macros", r.macros),
                ("password", r.password),
                ("protected_sheet", r.protected_sheet),
                ("protected_cap", r.protected_cap),
                ("external_links", r.external_links),
                ("volatile_base", r.volatile_base),
                ("volatile_per_cell", r.volatile_per_cell),
                ("external_per_cell", r.external_per_cell),
                ("volatile_cap", r.volatile_cap),
                ("inconsistency", r.inconsistency),
                ("very_hidden", r.very_hidden),
                ("large_file_mb", r.large_file_mb),
                ("large_file", r.large_file),
                ("formula_volume_points", r.formula_volume_points),
                ("sparse_data", r.sparse_data),
                ("formula_heavy", r.formula_heavy),
            ],
        );
        fraction(
            &mut issues,
            "risk",
            &[
                ("inconsistency_threshold", r.inconsistency_threshold),
                ("sparse_density", r.sparse_density),
                ("formula_heavy_ratio", r.formula_heavy_ratio),
                ("formula_heavy_share", r.formula_heavy_share),
            ],
        );

        let similarity = self.pattern.header_similarity;
        if !(similarity > 0.0 && similarity <= 1.0) {
            issues.push(PolicyIssue::new(
                "pattern.header_similarity",
                format!("similarity must be within (0, 1], found {similarity}"),
            ));
        }
        let floor = self.structure.floor;
        if !(0.0..=100.0).contains(&floor) {
            issues.push(PolicyIssue::new(
                "structure.floor",
                format!("floor must be within 0..=100, found {floor}"),
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(PolicyError::Invalid { issues })
        }
    }
}

/// Bonuses, deductions and weights: finite and not below zero.
fn non_negative(issues: &mut Vec<PolicyIssue>, section: &str, fields: &[(&str, f64)]) {
    for &(name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            issues.push(PolicyIssue::new(
                format!("{section}.{name}"),
                format!("must be a non-negative number, found {value}"),
            ));
        }
    }
}

fn fraction(issues: &mut Vec<PolicyIssue>, section: &str, fields: &[(&str, f64)]) {
    for &(name, value) in fields {
        if !(0.0..=1.0).contains(&value) {
            issues.push(PolicyIssue::new(
                format!("{section}.{name}"),
                format!("must be within 0..=1, found {value}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_paths(policy: &ScoringPolicy) -> Vec<String> {
        match policy.validate() {
            Err(PolicyError::Invalid { issues }) => issues.into_iter().map(|i| i.path).collect(),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_valid() {
        ScoringPolicy::default().validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let policy = ScoringPolicy::from_yaml_str(
            "weights:\n  risk: 0.5\nlimits:\n  max_sheets: 12\n",
        )
        .unwrap();
        assert_eq!(policy.weights.risk, 0.5);
        assert_eq!(policy.weights.formula, 0.30);
        assert_eq!(policy.limits.max_sheets, 12);
        assert_eq!(policy.limits.max_cells, 500_000);
    }

    #[test]
    fn validation_collects_every_issue() {
        let yaml = "weights: { structure: -1, formula: 0, pattern: 0, risk: 0 }\n\
                    effort: { low: 40, medium: 60, high: 20 }\n\
                    limits: { max_cells: 0 }\n";
        let Err(PolicyError::Invalid { issues }) = ScoringPolicy::from_yaml_str(yaml) else {
            panic!("expected validation failure");
        };
        let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"weights.structure"));
        assert!(paths.contains(&"weights"));
        assert!(paths.contains(&"effort"));
        assert!(paths.contains(&"limits.max_cells"));
    }

    #[test]
    fn unsorted_steps_are_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.structure.sheet_count_steps = vec![Step::new(10.0, 5.0), Step::new(30.0, 20.0)];
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::Invalid { .. })
        ));
    }

    #[test]
    fn nan_floor_is_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.structure.floor = f64::NAN;
        assert_eq!(issue_paths(&policy), vec!["structure.floor"]);
    }

    #[test]
    fn negative_bonuses_and_deductions_are_rejected() {
        let mut policy = ScoringPolicy::default();
        policy.structure.named_ranges_bonus = -5.0;
        policy.pattern.periodic_bonus = -30.0;
        policy.risk.password = -40.0;
        policy.risk.volatile_per_cell = f64::INFINITY;
        policy.formula.volume_steps = vec![Step::new(100.0, -5.0)];
        let paths = issue_paths(&policy);
        for expected in [
            "structure.named_ranges_bonus",
            "pattern.periodic_bonus",
            "risk.password",
            "risk.volatile_per_cell",
            "formula.volume_steps",
        ] {
            assert!(paths.iter().any(|p| p == expected), "{expected} in {paths:?}");
        }
    }

    #[test]
    fn ratios_must_be_fractions() {
        let mut policy = ScoringPolicy::default();
        policy.risk.sparse_density = 1.5;
        policy.pattern.fan_in_ratio = f64::NAN;
        let paths = issue_paths(&policy);
        assert!(paths.contains(&"risk.sparse_density".to_string()));
        assert!(paths.contains(&"pattern.fan_in_ratio".to_string()));
    }

    #[test]
    fn step_lookup_picks_highest_exceeded() {
        let steps = StructurePolicy::default().sheet_count_steps;
        assert_eq!(Step::lookup(&steps, 10.0), None);
        assert_eq!(Step::lookup(&steps, 11.0).map(|s| s.points), Some(5.0));
        assert_eq!(Step::lookup(&steps, 31.0).map(|s| s.points), Some(20.0));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            ScoringPolicy::from_yaml_str("weights: [1, 2"),
            Err(PolicyError::Yaml(_))
        ));
    }
}
