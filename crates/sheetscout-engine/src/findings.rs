use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingKind {
    /// A measured metric moved a score.
    Metric,
    /// A recognised workbook pattern.
    Pattern,
    /// A fired risk rule.
    Risk,
    /// Informational; no score change.
    Note,
    InputDegenerate,
    FormulaUnparsable,
    MetricOutOfBounds,
    Truncated,
}

impl FindingKind {
    /// Kinds the engine reports about its own input handling rather than
    /// about the workbook's automation potential.
    pub fn is_engine(&self) -> bool {
        matches!(
            self,
            FindingKind::InputDegenerate
                | FindingKind::FormulaUnparsable
                | FindingKind::MetricOutOfBounds
                | FindingKind::Truncated
        )
    }
}

/// Evidence behind a score: what was seen and how many points it moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            delta: None,
        }
    }

    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(FindingKind::Note, message)
    }
}
