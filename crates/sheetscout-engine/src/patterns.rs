//! Automation-favorable workbook patterns, evaluated from a rule table.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::findings::FindingKind;
use crate::formula::FormulaAnalysis;
use crate::policy::PatternPolicy;
use crate::scan::WorkbookScan;
use crate::score::{Component, ScoreBuilder, SubScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pattern {
    TemplatedLayout,
    PeriodicReport,
    Consolidation,
    ProcessPipeline,
    RepeatedNaming,
    MasterTemplate,
}

impl Pattern {
    pub fn label(&self) -> &'static str {
        match self {
            Pattern::TemplatedLayout => "templated layout",
            Pattern::PeriodicReport => "periodic report",
            Pattern::Consolidation => "consolidation",
            Pattern::ProcessPipeline => "process pipeline",
            Pattern::RepeatedNaming => "repeated naming",
            Pattern::MasterTemplate => "master template",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedPattern {
    pub pattern: Pattern,
    pub bonus: f64,
    pub evidence: String,
}

static PERIOD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[^a-z])(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t|tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?|q[1-4]|quarter(?:ly)?|fy|week(?:ly)?|daily|monthly|annual|yearly)(?:$|[^a-z])",
    )
    .expect("period regex must compile")
});

static YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(?:19|20)\d{2}(?:$|\D)").expect("year regex must compile")
});

/// A whole word that only names a period.
static PERIOD_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t|tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?|q[1-4]|fy\d*|h[12]|week(?:ly)?|daily|monthly|annual|yearly|\d+)$",
    )
    .expect("period word regex must compile")
});

pub(crate) fn is_periodic_label(text: &str) -> bool {
    PERIOD.is_match(text) || YEAR.is_match(text)
}

/// What a sheet is for, judged from keywords in its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SheetRole {
    Input,
    Calculation,
    Reporting,
    Template,
    Summary,
}

impl SheetRole {
    /// Checked in order; a sheet takes the first role whose keywords match.
    const KEYWORDS: [(SheetRole, &'static [&'static str]); 5] = [
        (
            SheetRole::Input,
            &["input", "entry", "data", "raw", "import", "source", "form"],
        ),
        (
            SheetRole::Calculation,
            &["calc", "calculation", "compute", "process", "analysis", "logic"],
        ),
        (
            SheetRole::Reporting,
            &["report", "summary", "dashboard", "output", "results", "final"],
        ),
        (
            SheetRole::Template,
            &["template", "master", "base", "model", "standard"],
        ),
        (
            SheetRole::Summary,
            &["summary", "total", "consolidated", "overview", "aggregate"],
        ),
    ];

    pub fn of(sheet_name: &str) -> Option<SheetRole> {
        let lower = sheet_name.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(role, _)| *role)
    }
}

/// Everything a pattern rule may look at.
pub(crate) struct PatternInput<'s, 'a> {
    scan: &'s WorkbookScan<'a>,
    formulas: &'s FormulaAnalysis,
    policy: &'s PatternPolicy,
    headers: Vec<Vec<String>>,
    /// Indexed like `WorkbookScan::sheets`.
    roles: Vec<Option<SheetRole>>,
}

struct PatternRule {
    pattern: Pattern,
    bonus: fn(&PatternPolicy) -> f64,
    detect: fn(&PatternInput<'_, '_>) -> Option<String>,
}

const RULES: &[PatternRule] = &[
    PatternRule {
        pattern: Pattern::TemplatedLayout,
        bonus: |p| p.templated_bonus,
        detect: detect_templated,
    },
    PatternRule {
        pattern: Pattern::PeriodicReport,
        bonus: |p| p.periodic_bonus,
        detect: detect_periodic,
    },
    PatternRule {
        pattern: Pattern::Consolidation,
        bonus: |p| p.consolidation_bonus,
        detect: detect_consolidation,
    },
    PatternRule {
        pattern: Pattern::ProcessPipeline,
        bonus: |p| p.pipeline_bonus,
        detect: detect_pipeline,
    },
    PatternRule {
        pattern: Pattern::RepeatedNaming,
        bonus: |p| p.repeated_naming_bonus,
        detect: detect_repeated_naming,
    },
    PatternRule {
        pattern: Pattern::MasterTemplate,
        bonus: |p| p.master_template_bonus,
        detect: detect_master_template,
    },
];

#[derive(Debug)]
pub(crate) struct PatternAnalysis {
    pub detected: Vec<DetectedPattern>,
    pub roles: Vec<Option<SheetRole>>,
    pub subscore: SubScore,
}

impl PatternAnalysis {
    pub fn has(&self, pattern: Pattern) -> bool {
        self.detected.iter().any(|d| d.pattern == pattern)
    }

    pub fn role_count(&self, role: SheetRole) -> usize {
        count_role(&self.roles, role)
    }
}

fn count_role(roles: &[Option<SheetRole>], role: SheetRole) -> usize {
    roles.iter().filter(|r| **r == Some(role)).count()
}

pub(crate) fn detect(
    scan: &WorkbookScan<'_>,
    formulas: &FormulaAnalysis,
    policy: &PatternPolicy,
) -> PatternAnalysis {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("pattern_detection").entered();

    let input = PatternInput {
        scan,
        formulas,
        policy,
        headers: scan.sheets.iter().map(|s| s.header_texts()).collect(),
        roles: scan.sheets.iter().map(|s| SheetRole::of(s.name())).collect(),
    };

    let mut score = ScoreBuilder::new(Component::Pattern, 0.0);
    let mut detected = Vec::new();
    for rule in RULES {
        if let Some(evidence) = (rule.detect)(&input) {
            let bonus = (rule.bonus)(policy);
            score.apply(
                FindingKind::Pattern,
                bonus,
                format!("{}: {evidence}", rule.pattern),
            );
            detected.push(DetectedPattern {
                pattern: rule.pattern,
                bonus,
                evidence,
            });
        }
    }
    if detected.is_empty() {
        score.note("no automation-favorable patterns detected");
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(patterns = detected.len(), "patterns evaluated");

    PatternAnalysis {
        detected,
        roles: input.roles,
        subscore: score.finish(),
    }
}

fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn name_list(names: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    names
        .into_iter()
        .map(|n| n.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn detect_templated(input: &PatternInput<'_, '_>) -> Option<String> {
    let policy = input.policy;
    let candidates: Vec<(usize, BTreeSet<&str>)> = input
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.len() >= policy.min_header_cells)
        .map(|(i, h)| (i, h.iter().map(String::as_str).collect()))
        .collect();

    let mut matched = BTreeSet::new();
    for (pos, (i, a)) in candidates.iter().enumerate() {
        for (j, b) in &candidates[pos + 1..] {
            let cols_i = input.scan.sheets[*i].extent.1;
            let cols_j = input.scan.sheets[*j].extent.1;
            if jaccard(a, b) >= policy.header_similarity
                && cols_i.abs_diff(cols_j) <= policy.column_tolerance
            {
                matched.insert(*i);
                matched.insert(*j);
            }
        }
    }
    if matched.len() < 2 {
        return None;
    }
    Some(format!(
        "{} sheets share a header layout ({})",
        matched.len(),
        name_list(matched.iter().map(|i| input.scan.sheets[*i].name()))
    ))
}

fn detect_periodic(input: &PatternInput<'_, '_>) -> Option<String> {
    let min = input.policy.min_periodic_sheets;
    let named: Vec<&str> = input
        .scan
        .sheets
        .iter()
        .map(|s| s.name())
        .filter(|n| is_periodic_label(n))
        .collect();
    if named.len() >= min {
        return Some(format!(
            "{} sheet names follow a period convention ({})",
            named.len(),
            name_list(&named)
        ));
    }

    let headed = input
        .scan
        .sheets
        .iter()
        .zip(&input.headers)
        .filter(|(sheet, texts)| {
            texts.iter().any(|t| is_periodic_label(t))
                || sheet.header_cells().iter().any(|c| c.value.is_date())
        })
        .count();
    (headed >= min).then(|| format!("{headed} sheets have period headers"))
}

fn detect_consolidation(input: &PatternInput<'_, '_>) -> Option<String> {
    let sheet_count = input.scan.sheet_count();
    if sheet_count < 2 {
        return None;
    }
    let positions = input.scan.model.sheet_positions();
    let mut fan_in: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); sheet_count];
    for (index, features) in input.formulas.sites() {
        for target in &features.sheets {
            for referenced in expand_target(&positions, &target.first, target.last.as_deref()) {
                if referenced != index && referenced < sheet_count {
                    fan_in[index].insert(referenced);
                }
            }
        }
    }

    let others = (sheet_count - 1) as f64;
    let (index, referenced) = fan_in
        .iter()
        .enumerate()
        .max_by_key(|(i, refs)| (refs.len(), std::cmp::Reverse(*i)))?;
    let ratio = referenced.len() as f64 / others;
    if referenced.len() < input.policy.min_fan_in || ratio <= input.policy.fan_in_ratio {
        return None;
    }
    Some(format!(
        "{} pulls from {} of {} other sheets",
        input.scan.sheets[index].name(),
        referenced.len(),
        sheet_count - 1
    ))
}

/// Sheet positions covered by `first` or the 3-D span `first:last`.
fn expand_target(positions: &FxHashMap<String, usize>, first: &str, last: Option<&str>) -> Vec<usize> {
    let Some(&start) = positions.get(&first.to_uppercase()) else {
        return Vec::new();
    };
    match last.and_then(|l| positions.get(&l.to_uppercase())) {
        Some(&end) => (start.min(end)..=start.max(end)).collect(),
        None => vec![start],
    }
}

/// First sheet holding `role`.
fn sheet_with_role<'a>(input: &PatternInput<'_, 'a>, role: SheetRole) -> Option<&'a str> {
    input
        .roles
        .iter()
        .position(|r| *r == Some(role))
        .map(|i| input.scan.sheets[i].name())
}

/// Each sheet holds one role, so the three stages are distinct sheets.
fn detect_pipeline(input: &PatternInput<'_, '_>) -> Option<String> {
    let input_sheet = sheet_with_role(input, SheetRole::Input)?;
    let calc_sheet = sheet_with_role(input, SheetRole::Calculation)?;
    let report_sheet = sheet_with_role(input, SheetRole::Reporting)?;
    Some(format!(
        "input ({input_sheet}), calculation ({calc_sheet}) and reporting ({report_sheet}) sheets"
    ))
}

fn detect_master_template(input: &PatternInput<'_, '_>) -> Option<String> {
    let templates = count_role(&input.roles, SheetRole::Template);
    let variations = input.scan.sheet_count() - templates;
    if templates == 0 || variations < 2 {
        return None;
    }
    let master = sheet_with_role(input, SheetRole::Template)?;
    Some(format!("{master} with {variations} variation sheet(s)"))
}

/// Sheet name with period words and digits removed, lower-cased.
pub(crate) fn base_name(name: &str) -> String {
    let lower = name.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !PERIOD_WORD.is_match(w))
        .map(|w| w.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn detect_repeated_naming(input: &PatternInput<'_, '_>) -> Option<String> {
    let mut groups: FxHashMap<String, usize> = FxHashMap::default();
    for sheet in &input.scan.sheets {
        let base = base_name(sheet.name());
        if base.chars().count() >= 2 {
            *groups.entry(base).or_default() += 1;
        }
    }
    let (base, count) = groups
        .into_iter()
        .filter(|(_, n)| *n >= input.policy.min_repeated_names)
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))?;
    Some(format!("{count} sheets named after \"{base}\""))
}
