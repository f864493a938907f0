use std::fmt;

use serde::Serialize;

use crate::findings::{Finding, FindingKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Component {
    Structure,
    Formula,
    Pattern,
    Risk,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Structure,
        Component::Formula,
        Component::Pattern,
        Component::Risk,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Component::Structure => "Structure",
            Component::Formula => "Formula",
            Component::Pattern => "Pattern",
            Component::Risk => "Risk",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// One component score in `[0, 100]` with the findings that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScore {
    component: Component,
    value: f64,
    findings: Vec<Finding>,
}

impl SubScore {
    pub(crate) fn zero(component: Component) -> Self {
        Self {
            component,
            value: 0.0,
            findings: Vec::new(),
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }
}

/// Accumulates deltas and findings; [`finish`](Self::finish) clamps once.
#[derive(Debug)]
pub(crate) struct ScoreBuilder {
    component: Component,
    value: f64,
    findings: Vec<Finding>,
}

impl ScoreBuilder {
    pub fn new(component: Component, start: f64) -> Self {
        Self {
            component,
            value: start,
            findings: Vec::new(),
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply `delta` and record why. Zero deltas are not recorded.
    pub fn apply(&mut self, kind: FindingKind, delta: f64, message: impl Into<String>) {
        if delta == 0.0 {
            return;
        }
        self.value += delta;
        self.findings
            .push(Finding::new(kind, message).with_delta(round1(delta)));
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.findings.push(Finding::note(message));
    }

    pub fn finish(self) -> SubScore {
        SubScore {
            component: self.component,
            value: clamp_score(self.value),
            findings: self.findings,
        }
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_and_skips_zero_deltas() {
        let mut b = ScoreBuilder::new(Component::Risk, 100.0);
        b.apply(FindingKind::Risk, 0.0, "nothing");
        b.apply(FindingKind::Risk, -140.0, "macros and password");
        let score = b.finish();
        assert_eq!(score.value(), 0.0);
        assert_eq!(score.findings().len(), 1);
        assert_eq!(score.findings()[0].delta, Some(-140.0));
    }

    #[test]
    fn nan_clamps_to_zero() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(120.0), 100.0);
    }
}
