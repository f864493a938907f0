//! Composite score, effort band, feasibility level and tool ranking.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::policy::{EffortThresholds, Weights};
use crate::risk::{RiskAssessment, RiskRule};
use crate::score::{SubScore, clamp_score};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffortCategory {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl EffortCategory {
    pub fn from_composite(composite: f64, thresholds: &EffortThresholds) -> Self {
        if composite >= thresholds.low {
            EffortCategory::Low
        } else if composite >= thresholds.medium {
            EffortCategory::Medium
        } else if composite >= thresholds.high {
            EffortCategory::High
        } else {
            EffortCategory::VeryHigh
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EffortCategory::Low => "LOW",
            EffortCategory::Medium => "MEDIUM",
            EffortCategory::High => "HIGH",
            EffortCategory::VeryHigh => "VERY_HIGH",
        }
    }
}

impl fmt::Display for EffortCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeasibilityLevel {
    High,
    MediumHigh,
    Medium,
    LowMedium,
    Low,
}

impl FeasibilityLevel {
    pub fn from_composite(composite: f64) -> Self {
        match composite {
            c if c >= 80.0 => FeasibilityLevel::High,
            c if c >= 65.0 => FeasibilityLevel::MediumHigh,
            c if c >= 50.0 => FeasibilityLevel::Medium,
            c if c >= 35.0 => FeasibilityLevel::LowMedium,
            _ => FeasibilityLevel::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeasibilityLevel::High => "HIGH",
            FeasibilityLevel::MediumHigh => "MEDIUM-HIGH",
            FeasibilityLevel::Medium => "MEDIUM",
            FeasibilityLevel::LowMedium => "LOW-MEDIUM",
            FeasibilityLevel::Low => "LOW",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FeasibilityLevel::High => "Excellent automation candidate",
            FeasibilityLevel::MediumHigh => "Very good automation potential",
            FeasibilityLevel::Medium => "Good automation potential with preparation",
            FeasibilityLevel::LowMedium => "Possible but requires significant restructuring",
            FeasibilityLevel::Low => "Not recommended for automation in current state",
        }
    }

    /// Rough delivery estimate for the level.
    pub fn effort_text(&self) -> &'static str {
        match self {
            FeasibilityLevel::High => "2-4 weeks development + 1 week testing",
            FeasibilityLevel::MediumHigh => "1-2 months development + 2 weeks testing",
            FeasibilityLevel::Medium => "2-3 months development + 3 weeks testing",
            FeasibilityLevel::LowMedium => "3-4 months development + 1 month testing",
            FeasibilityLevel::Low => "6+ months or complete redesign recommended",
        }
    }
}

impl fmt::Display for FeasibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.label(), self.description())
    }
}

/// Tool families, in catalog order. The order also breaks exact ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tool {
    Scripting,
    MacroAutomation,
    LowCode,
    Rpa,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Scripting, Tool::MacroAutomation, Tool::LowCode, Tool::Rpa];

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Scripting => "Lightweight scripting (Python + pandas/openpyxl)",
            Tool::MacroAutomation => "Macro-based automation (VBA / Office Scripts)",
            Tool::LowCode => "Low-code platform (Power Automate / Power Query)",
            Tool::Rpa => "Robotic process automation",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolRecommendation {
    pub tool: Tool,
    pub suitability: f64,
    pub rationale: String,
}

/// The four component scores plus the risk facts the tool rules read.
pub(crate) struct Scores<'s> {
    pub structure: f64,
    pub formula: f64,
    pub pattern: f64,
    pub risk: f64,
    pub assessment: &'s RiskAssessment,
}

impl<'s> Scores<'s> {
    pub fn new(
        structure: &SubScore,
        formula: &SubScore,
        pattern: &SubScore,
        risk: &SubScore,
        assessment: &'s RiskAssessment,
    ) -> Self {
        Self {
            structure: structure.value(),
            formula: formula.value(),
            pattern: pattern.value(),
            risk: risk.value(),
            assessment,
        }
    }

    fn macros(&self) -> bool {
        self.assessment.has(RiskRule::Macros)
    }
}

/// Weighted mean of the component scores.
pub(crate) fn composite(scores: &Scores<'_>, weights: &Weights) -> f64 {
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }
    clamp_score(
        (weights.structure * scores.structure
            + weights.formula * scores.formula
            + weights.pattern * scores.pattern
            + weights.risk * scores.risk)
            / total,
    )
}

/// Effort from the composite, raised to at least HIGH by blocking risks.
pub(crate) fn effort(composite: f64, thresholds: &EffortThresholds, blocking: bool) -> EffortCategory {
    let effort = EffortCategory::from_composite(composite, thresholds);
    if blocking {
        effort.max(EffortCategory::High)
    } else {
        effort
    }
}

struct ToolRule {
    tool: Tool,
    suitability: fn(&Scores<'_>) -> (f64, String),
}

const TOOL_RULES: &[ToolRule] = &[
    ToolRule {
        tool: Tool::Scripting,
        suitability: |s| {
            let base = 0.45 * s.formula + 0.35 * s.structure + 0.20 * s.risk;
            if s.macros() {
                (base - 40.0, "macros must be ported before scripts can take over".into())
            } else {
                (base, "formulas and layout translate directly to dataframe code".into())
            }
        },
    },
    ToolRule {
        tool: Tool::MacroAutomation,
        suitability: |s| {
            if s.macros() {
                let other = s.assessment.deductions_except(RiskRule::Macros);
                (
                    60.0 + 0.4 * (100.0 - other),
                    "existing VBA project can be extended in place".into(),
                )
            } else {
                (
                    20.0 + 0.3 * (100.0 - s.formula),
                    "no existing macros; only worthwhile for formula-heavy logic".into(),
                )
            }
        },
    },
    ToolRule {
        tool: Tool::LowCode,
        suitability: |s| {
            let mut value = 0.4 * s.pattern + 0.3 * s.structure + 0.3 * s.risk;
            let mut rationale = "repeatable patterns map onto connectors and flows".to_string();
            if s.assessment.has_blocking() {
                value -= 30.0;
                rationale.push_str("; blocking risks limit connector access");
            }
            if s.formula < 50.0 {
                value -= 15.0;
                rationale.push_str("; complex formulas are awkward to express");
            }
            (value, rationale)
        },
    },
    ToolRule {
        tool: Tool::Rpa,
        suitability: |s| {
            (
                0.5 * (100.0 - s.structure) + 0.3 * s.pattern + 0.2 * (100.0 - s.formula),
                "drives the workbook through its UI when the structure resists direct access"
                    .into(),
            )
        },
    },
];

/// Every catalog tool, best first; exact ties keep catalog order.
pub(crate) fn rank_tools(scores: &Scores<'_>) -> Vec<ToolRecommendation> {
    let mut ranked: Vec<ToolRecommendation> = TOOL_RULES
        .iter()
        .map(|rule| {
            let (value, rationale) = (rule.suitability)(scores);
            ToolRecommendation {
                tool: rule.tool,
                suitability: clamp_score(value),
                rationale,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.suitability
            .partial_cmp(&a.suitability)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.tool.cmp(&b.tool))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{RiskFinding, Severity};
    use crate::score::{Component, ScoreBuilder};

    fn subscore(component: Component, value: f64) -> SubScore {
        ScoreBuilder::new(component, value).finish()
    }

    fn assessment(findings: Vec<RiskFinding>) -> RiskAssessment {
        RiskAssessment {
            findings,
            subscore: subscore(Component::Risk, 100.0),
        }
    }

    fn macro_finding() -> RiskFinding {
        RiskFinding {
            rule: RiskRule::Macros,
            severity: Severity::Critical,
            blocking: true,
            deduction: 100.0,
            rationale: "vba".into(),
        }
    }

    #[test]
    fn effort_bands_and_blocking_override() {
        let t = EffortThresholds::default();
        assert_eq!(effort(80.0, &t, false), EffortCategory::Low);
        assert_eq!(effort(55.0, &t, false), EffortCategory::Medium);
        assert_eq!(effort(35.0, &t, false), EffortCategory::High);
        assert_eq!(effort(34.9, &t, false), EffortCategory::VeryHigh);
        assert_eq!(effort(90.0, &t, true), EffortCategory::High);
        assert_eq!(effort(10.0, &t, true), EffortCategory::VeryHigh);
    }

    #[test]
    fn feasibility_levels() {
        assert_eq!(FeasibilityLevel::from_composite(80.0), FeasibilityLevel::High);
        assert_eq!(FeasibilityLevel::from_composite(64.9), FeasibilityLevel::Medium);
        assert_eq!(FeasibilityLevel::from_composite(0.0), FeasibilityLevel::Low);
        assert_eq!(
            FeasibilityLevel::MediumHigh.to_string(),
            "MEDIUM-HIGH - Very good automation potential"
        );
    }

    #[test]
    fn composite_is_weighted_mean() {
        let risk = assessment(Vec::new());
        let scores = Scores::new(
            &subscore(Component::Structure, 100.0),
            &subscore(Component::Formula, 100.0),
            &subscore(Component::Pattern, 0.0),
            &subscore(Component::Risk, 100.0),
            &risk,
        );
        assert!((composite(&scores, &Weights::default()) - 85.0).abs() < 1e-9);
    }

    #[test]
    fn plain_workbook_prefers_scripting() {
        let risk = assessment(Vec::new());
        let scores = Scores::new(
            &subscore(Component::Structure, 100.0),
            &subscore(Component::Formula, 100.0),
            &subscore(Component::Pattern, 0.0),
            &subscore(Component::Risk, 100.0),
            &risk,
        );
        let ranked = rank_tools(&scores);
        assert_eq!(ranked[0].tool, Tool::Scripting);
        assert!((ranked[0].suitability - 100.0).abs() < 1e-9);
        assert_eq!(ranked.len(), 4);
    }

    #[test]
    fn macros_favor_macro_automation() {
        let risk = assessment(vec![macro_finding()]);
        let scores = Scores::new(
            &subscore(Component::Structure, 90.0),
            &subscore(Component::Formula, 90.0),
            &subscore(Component::Pattern, 35.0),
            &subscore(Component::Risk, 0.0),
            &risk,
        );
        let ranked = rank_tools(&scores);
        assert_eq!(ranked[0].tool, Tool::MacroAutomation);
        assert_eq!(ranked[0].suitability, 100.0);
    }

    #[test]
    fn exact_ties_keep_catalog_order() {
        let none = assessment(Vec::new());
        let scores = Scores {
            structure: 0.0,
            formula: 0.0,
            pattern: 0.0,
            risk: 0.0,
            assessment: &none,
        };
        // rpa 70, macro 50, scripting 0, low-code clamped from -15 to 0
        let order: Vec<Tool> = rank_tools(&scores).iter().map(|r| r.tool).collect();
        assert_eq!(
            order,
            vec![Tool::Rpa, Tool::MacroAutomation, Tool::Scripting, Tool::LowCode]
        );
    }
}
