use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Isolated namespaces of the learning store. Every pattern and decision
/// belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningDomain {
    /// Accept/reject decisions on reported issues.
    DocumentFindings,
    RoleCandidates,
    AcronymCandidates,
    LinkDomains,
    ComparisonCorrections,
}

impl LearningDomain {
    pub const ALL: [LearningDomain; 5] = [
        LearningDomain::DocumentFindings,
        LearningDomain::RoleCandidates,
        LearningDomain::AcronymCandidates,
        LearningDomain::LinkDomains,
        LearningDomain::ComparisonCorrections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentFindings => "document_findings",
            Self::RoleCandidates => "role_candidates",
            Self::AcronymCandidates => "acronym_candidates",
            Self::LinkDomains => "link_domains",
            Self::ComparisonCorrections => "comparison_corrections",
        }
    }
}

impl std::fmt::Display for LearningDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LearningDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| format!("unknown learning domain: {s}"))
    }
}

/// A user's verdict on a flagged candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The flag was right; raise confidence.
    Accept,
    /// False positive; lower confidence.
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// Aggregated decisions for one pattern key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPattern {
    pub domain: LearningDomain,
    pub key: String,
    pub accept_count: u32,
    pub reject_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl LearningPattern {
    pub fn observations(&self) -> u32 {
        self.accept_count + self.reject_count
    }
}

/// One recorded decision. Never modified after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningDecision {
    pub id: Uuid,
    pub domain: LearningDomain,
    pub pattern_key: String,
    pub decision: Decision,
    /// Context tokens at decision time (document kind, checker, nearby words).
    pub context: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Portable snapshot of one or more domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningBundle {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub patterns: Vec<LearningPattern>,
    pub decisions: Vec<LearningDecision>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub decisions_imported: usize,
    /// Already present locally.
    pub decisions_skipped: usize,
    /// Decision-less bundle patterns inserted because the key was new.
    pub patterns_created: usize,
    pub patterns_skipped: usize,
}

impl ImportSummary {
    pub fn changed_anything(&self) -> bool {
        self.decisions_imported > 0 || self.patterns_created > 0
    }
}
