use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Revise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    fn from_score(score: u8) -> Self {
        match score {
            7..=10 => Self::Low,
            4..=6 => Self::Medium,
            _ => Self::High,
        }
    }
}

/// A critic's judgement of one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CritiquePayload {
    pub verdict: Verdict,
    pub feedback: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl CritiquePayload {
    pub fn approve(feedback: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Approve,
            feedback: feedback.into(),
            severity: Severity::Low,
            score: None,
            suggestions: Vec::new(),
        }
    }

    pub fn revise(feedback: impl Into<String>, severity: Severity) -> Self {
        Self {
            verdict: Verdict::Revise,
            feedback: feedback.into(),
            severity,
            score: None,
            suggestions: Vec::new(),
        }
    }

    /// Verdict used when a critique cannot be understood: never accept silently.
    pub fn fail_safe(reason: &str) -> Self {
        Self::revise(
            format!("Critique could not be parsed: {reason}"),
            Severity::High,
        )
    }

    pub fn is_approved(&self) -> bool {
        self.verdict == Verdict::Approve
    }
}

lazy_static! {
    static ref FENCED_BLOCK: Regex =
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid fence regex");
}

#[derive(Debug, Deserialize)]
struct RawCritique {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    approved: Option<bool>,
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    suggestions: Option<Vec<String>>,
    #[serde(default)]
    severity: Option<String>,
}

/// Parse a model's critique response.
///
/// Accepts bare JSON, JSON wrapped in markdown fences, or JSON embedded in
/// surrounding prose. A missing `verdict` is derived from `score` against
/// `approval_threshold`; a missing `severity` is derived from the score.
pub fn parse_critique(text: &str, approval_threshold: u8) -> Result<CritiquePayload, AgentError> {
    let body = extract_json(text)
        .ok_or_else(|| AgentError::CritiqueParse("no JSON object in response".into()))?;
    let raw: RawCritique =
        serde_json::from_str(body).map_err(|e| AgentError::CritiqueParse(e.to_string()))?;

    let score = raw.score.map(|s| s.round().clamp(1.0, 10.0) as u8);

    let verdict = match raw.verdict.as_deref().map(str::trim) {
        Some(v) => parse_verdict(v)?,
        None => match (raw.approved, score) {
            (Some(true), _) => Verdict::Approve,
            (Some(false), _) => Verdict::Revise,
            (None, Some(s)) if s >= approval_threshold => Verdict::Approve,
            (None, Some(_)) => Verdict::Revise,
            (None, None) => {
                return Err(AgentError::CritiqueParse(
                    "response carries neither verdict nor score".into(),
                ))
            }
        },
    };

    let severity = match raw.severity.as_deref().map(str::trim) {
        Some(s) => parse_severity(s)?,
        None => match (score, verdict) {
            (Some(s), _) => Severity::from_score(s),
            (None, Verdict::Approve) => Severity::Low,
            (None, Verdict::Revise) => Severity::Medium,
        },
    };

    Ok(CritiquePayload {
        verdict,
        feedback: raw.feedback.unwrap_or_default(),
        severity,
        score,
        suggestions: raw.suggestions.unwrap_or_default(),
    })
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_BLOCK.captures(text) {
        if let Some(m) = caps.get(1) {
            let inner = m.as_str().trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_verdict(v: &str) -> Result<Verdict, AgentError> {
    match v.to_ascii_lowercase().as_str() {
        "approve" | "approved" | "accept" | "pass" => Ok(Verdict::Approve),
        "revise" | "reject" | "needs_revision" | "fail" => Ok(Verdict::Revise),
        other => Err(AgentError::CritiqueParse(format!("unknown verdict '{other}'"))),
    }
}

fn parse_severity(s: &str) -> Result<Severity, AgentError> {
    match s.to_ascii_lowercase().as_str() {
        "low" | "minor" => Ok(Severity::Low),
        "medium" | "moderate" => Ok(Severity::Medium),
        "high" | "major" | "critical" => Ok(Severity::High),
        other => Err(AgentError::CritiqueParse(format!("unknown severity '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_above_threshold_approves() {
        let c = parse_critique(
            r#"{"score": 8, "feedback": "Strong imagery", "suggestions": ["Add dialogue"]}"#,
            7,
        )
        .unwrap();
        assert_eq!(c.verdict, Verdict::Approve);
        assert_eq!(c.severity, Severity::Low);
        assert_eq!(c.score, Some(8));
        assert_eq!(c.suggestions, vec!["Add dialogue".to_string()]);
    }

    #[test]
    fn score_below_threshold_requests_revision() {
        let c = parse_critique(r#"{"score": 3, "feedback": "Flat"}"#, 7).unwrap();
        assert_eq!(c.verdict, Verdict::Revise);
        assert_eq!(c.severity, Severity::High);
    }

    #[test]
    fn explicit_fields_win_over_score() {
        let c = parse_critique(
            r#"{"score": 9, "verdict": "revise", "severity": "medium", "feedback": "Tighten the ending"}"#,
            7,
        )
        .unwrap();
        assert_eq!(c.verdict, Verdict::Revise);
        assert_eq!(c.severity, Severity::Medium);
    }

    #[test]
    fn strips_markdown_fences() {
        let text = "Here is my review:\n```json\n{\"score\": 7, \"feedback\": \"ok\"}\n```\n";
        let c = parse_critique(text, 7).unwrap();
        assert!(c.is_approved());
    }

    #[test]
    fn finds_json_inside_prose() {
        let text = "Verdict follows {\"verdict\": \"approve\", \"feedback\": \"fine\"} thanks";
        let c = parse_critique(text, 7).unwrap();
        assert!(c.is_approved());
        assert_eq!(c.score, None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            parse_critique("looks great to me!", 7),
            Err(AgentError::CritiqueParse(_))
        ));
        assert!(matches!(
            parse_critique(r#"{"feedback": "no verdict here"}"#, 7),
            Err(AgentError::CritiqueParse(_))
        ));
        assert!(matches!(
            parse_critique(r#"{"verdict": "maybe"}"#, 7),
            Err(AgentError::CritiqueParse(_))
        ));
    }

    #[test]
    fn fail_safe_requests_high_severity_revision() {
        let c = CritiquePayload::fail_safe("truncated");
        assert_eq!(c.verdict, Verdict::Revise);
        assert_eq!(c.severity, Severity::High);
        assert!(c.feedback.contains("truncated"));
    }
}
