use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of analysis agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Behavioral,
    Security,
    Pattern,
    Metrics,
    Dependency,
}

impl AgentKind {
    pub const ALL: [Self; 5] = [
        Self::Behavioral,
        Self::Security,
        Self::Pattern,
        Self::Metrics,
        Self::Dependency,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Behavioral => "behavioral",
            Self::Security => "security",
            Self::Pattern => "pattern",
            Self::Metrics => "metrics",
            Self::Dependency => "dependency",
        }
    }

    /// Name the agent reports under
    pub const fn agent_name(self) -> &'static str {
        match self {
            Self::Behavioral => "behavioral_analyzer",
            Self::Security => "security_analyzer",
            Self::Pattern => "pattern_analyzer",
            Self::Metrics => "metrics_analyzer",
            Self::Dependency => "dependency_analyzer",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Depth of understanding an analysis reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnderstandingLevel {
    /// Syntax and structure
    Surface,
    /// Meaning and purpose
    Semantic,
    /// Relationship with other code
    Contextual,
    /// System-level implications
    Architectural,
    /// Runtime behavior and side effects
    Behavioral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityIssue {
    pub severity: Severity,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(default)]
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignPattern {
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    /// Cyclomatic complexity
    pub complexity: u32,
    /// Maintainability index, 0 to 100
    pub maintainability: f64,
    pub cognitive_complexity: u32,
    pub lines_of_code: usize,
    /// Comment lines over code lines, 0 to 1
    pub comment_ratio: f64,
}

impl CodeMetrics {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.maintainability) {
            return Err(format!(
                "maintainability {} outside [0, 100]",
                self.maintainability
            ));
        }
        if !(0.0..=1.0).contains(&self.comment_ratio) {
            return Err(format!("comment_ratio {} outside [0, 1]", self.comment_ratio));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyInfo {
    pub direct_deps: Vec<String>,
    pub indirect_deps: Vec<String>,
    pub circular_deps: Vec<Vec<String>>,
    /// Package name to version requirement
    pub external_deps: BTreeMap<String, String>,
}

impl DependencyInfo {
    pub fn total(&self) -> usize {
        self.direct_deps.len() + self.indirect_deps.len() + self.external_deps.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralFindings {
    pub runtime_behavior: Vec<String>,
    pub side_effects: Vec<String>,
    pub error_handling: Vec<String>,
    pub performance: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityFindings {
    pub issues: Vec<SecurityIssue>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternFindings {
    pub patterns: Vec<DesignPattern>,
    pub recommendations: Vec<String>,
}

/// Typed result of one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Findings {
    Behavioral(BehavioralFindings),
    Security(SecurityFindings),
    Pattern(PatternFindings),
    Metrics(CodeMetrics),
    Dependency(DependencyInfo),
    Failed { reason: String },
}

impl Findings {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// What one agent concluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub agent_name: String,
    pub kind: AgentKind,
    pub understanding_level: UnderstandingLevel,
    pub findings: Findings,
    /// In [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Tokens consumed per model
    #[serde(default)]
    pub token_usage: BTreeMap<String, u64>,
}

impl AgentAnalysis {
    /// Zero-confidence placeholder for an agent that could not finish
    pub fn failed(kind: AgentKind, reason: impl Into<String>, warning: impl Into<String>) -> Self {
        Self {
            agent_name: kind.agent_name().to_string(),
            kind,
            understanding_level: UnderstandingLevel::Surface,
            findings: Findings::Failed {
                reason: reason.into(),
            },
            confidence: 0.0,
            supporting_evidence: Vec::new(),
            warnings: vec![warning.into()],
            token_usage: BTreeMap::new(),
        }
    }

    pub fn tokens_used(&self) -> u64 {
        self.token_usage.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn findings_are_tagged_by_kind() {
        let findings = Findings::Failed {
            reason: "Analysis timed out".into(),
        };
        assert_eq!(
            serde_json::to_value(&findings).unwrap(),
            json!({"kind": "failed", "reason": "Analysis timed out"})
        );

        let parsed: Findings = serde_json::from_value(json!({
            "kind": "security",
            "issues": [{
                "severity": "high",
                "type": "sql_injection",
                "description": "query built from user input",
                "line_number": 12
            }]
        }))
        .unwrap();
        let Findings::Security(security) = parsed else {
            panic!("expected security findings");
        };
        assert_eq!(security.issues[0].severity, Severity::High);
        assert_eq!(security.issues[0].kind, "sql_injection");
        assert!(security.recommendations.is_empty());
    }

    #[test]
    fn metrics_ranges_are_checked() {
        let mut metrics = CodeMetrics {
            complexity: 3,
            maintainability: 80.0,
            cognitive_complexity: 2,
            lines_of_code: 40,
            comment_ratio: 0.2,
        };
        assert!(metrics.validate().is_ok());
        metrics.comment_ratio = 1.5;
        assert!(metrics.validate().is_err());
        metrics.comment_ratio = 0.1;
        metrics.maintainability = 140.0;
        assert!(metrics.validate().is_err());
    }

    #[test]
    fn failed_analysis_has_no_confidence() {
        let analysis = AgentAnalysis::failed(AgentKind::Metrics, "boom", "Agent failed: boom");
        assert_eq!(analysis.agent_name, "metrics_analyzer");
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.findings.is_failed());
        assert_eq!(analysis.tokens_used(), 0);
    }
}
