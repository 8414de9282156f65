//! Insight statements produced by the synthesis step.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docboard_ingest::SectionLabel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Summary,
    #[default]
    Finding,
    Trend,
    Risk,
    Recommendation,
}

impl InsightCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightCategory::Summary => "summary",
            InsightCategory::Finding => "finding",
            InsightCategory::Trend => "trend",
            InsightCategory::Risk => "risk",
            InsightCategory::Recommendation => "recommendation",
        }
    }
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InsightCategory {
    type Err = String;

    /// Lenient: model output uses many near-synonyms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "summary" | "overview" | "abstract" => Ok(InsightCategory::Summary),
            "finding" | "findings" | "result" | "observation" | "fact" => {
                Ok(InsightCategory::Finding)
            }
            "trend" | "change" | "growth" | "pattern" => Ok(InsightCategory::Trend),
            "risk" | "warning" | "limitation" | "concern" => Ok(InsightCategory::Risk),
            "recommendation" | "action" | "next step" | "suggestion" => {
                Ok(InsightCategory::Recommendation)
            }
            other => Err(format!("unknown insight category: {other}")),
        }
    }
}

/// What an insight is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightRef {
    Section { index: usize, label: SectionLabel },
    Series { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub statement: String,
    pub category: InsightCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports: Option<InsightRef>,
}

impl Insight {
    pub fn new(statement: impl Into<String>, category: InsightCategory) -> Self {
        Self {
            statement: statement.into(),
            category,
            confidence: None,
            supports: None,
        }
    }

    /// Clamp into `[0, 1]`; non-finite values are dropped.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.is_finite().then(|| confidence.clamp(0.0, 1.0));
        self
    }

    pub fn supporting(mut self, target: InsightRef) -> Self {
        self.supports = Some(target);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_synonyms() {
        assert_eq!("Findings".parse::<InsightCategory>(), Ok(InsightCategory::Finding));
        assert_eq!("limitation".parse::<InsightCategory>(), Ok(InsightCategory::Risk));
        assert!("banana".parse::<InsightCategory>().is_err());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let insight = Insight::new("x", InsightCategory::Trend).with_confidence(1.7);
        assert_eq!(insight.confidence, Some(1.0));
        let insight = Insight::new("x", InsightCategory::Trend).with_confidence(f32::NAN);
        assert_eq!(insight.confidence, None);
    }

    #[test]
    fn test_ref_serialization_is_tagged() {
        let json = serde_json::to_value(InsightRef::Series {
            name: "accuracy".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "series");
        assert_eq!(json["name"], "accuracy");
    }
}
