//! Compliance judgment types.
//!
//! - [`FindingStatus`]: closed set of judgment outcomes for a clause
//! - [`Finding`]: one structured judgment, with citation and supporting quote
//! - [`VerificationResult`]: the reflector's verdict on a finding's quote
//!
//! ## Example
//!
//! ```
//! use clause_audit::finding::{Finding, FindingStatus};
//!
//! let finding = Finding::new("8.1", FindingStatus::Violation)
//!     .with_law_reference("UAE Labour Law Art. 43")
//!     .with_reasoning("Notice period below the 30 day minimum")
//!     .with_quote("Notice period shall be 1 week.");
//!
//! assert!(finding.expects_quote());
//! assert!(finding.has_quote());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Judgment status for a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingStatus {
    /// Clause satisfies the applicable law.
    Compliant,
    /// Clause contradicts the applicable law.
    Violation,
    /// A required clause is absent from the contract.
    Missing,
    /// The reasoning service failed; no judgment was made.
    Error,
}

impl FindingStatus {
    /// Whether a verbatim supporting quote is required for this status.
    ///
    /// ```
    /// use clause_audit::finding::FindingStatus;
    ///
    /// assert!(FindingStatus::Violation.expects_quote());
    /// assert!(!FindingStatus::Missing.expects_quote());
    /// ```
    pub fn expects_quote(&self) -> bool {
        match self {
            Self::Compliant | Self::Violation => true,
            Self::Missing | Self::Error => false,
        }
    }

    /// Get the emoji indicator used in reports.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Compliant => "🟢",
            Self::Violation => "🔴",
            Self::Missing => "⚠️",
            Self::Error => "❔",
        }
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Compliant => "COMPLIANT",
            Self::Violation => "VIOLATION",
            Self::Missing => "MISSING",
            Self::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FindingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COMPLIANT" => Ok(Self::Compliant),
            "VIOLATION" => Ok(Self::Violation),
            "MISSING" => Ok(Self::Missing),
            "ERROR" => Ok(Self::Error),
            other => Err(format!(
                "unrecognized finding status '{}'. Valid values: COMPLIANT, VIOLATION, MISSING, ERROR",
                other
            )),
        }
    }
}

/// A structured compliance judgment about one clause.
///
/// For COMPLIANT and VIOLATION findings the reasoning service is required to
/// copy `source_quote` verbatim from the audited clause. Nothing here
/// enforces that; the reflector is what catches violations of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub clause_id: String,
    pub status: FindingStatus,
    #[serde(default)]
    pub law_reference: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub source_quote: String,
}

impl Finding {
    pub fn new(clause_id: &str, status: FindingStatus) -> Self {
        Self {
            clause_id: clause_id.to_string(),
            status,
            law_reference: String::new(),
            reasoning: String::new(),
            source_quote: String::new(),
        }
    }

    /// Build the ERROR finding that stands in for a failed reasoning call.
    pub fn error(clause_id: &str, detail: impl Into<String>) -> Self {
        Self::new(clause_id, FindingStatus::Error).with_reasoning(detail)
    }

    pub fn with_law_reference(mut self, law_reference: impl Into<String>) -> Self {
        self.law_reference = law_reference.into();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.source_quote = quote.into();
        self
    }

    pub fn expects_quote(&self) -> bool {
        self.status.expects_quote()
    }

    /// Whether a non-blank quote was supplied.
    pub fn has_quote(&self) -> bool {
        !self.source_quote.trim().is_empty()
    }

    pub fn is_violation(&self) -> bool {
        self.status == FindingStatus::Violation
    }

    pub fn is_error(&self) -> bool {
        self.status == FindingStatus::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] clause {}", self.status, self.clause_id)?;
        if !self.law_reference.is_empty() {
            write!(f, " ({})", self.law_reference)?;
        }
        Ok(())
    }
}

/// Outcome of checking a finding's quote against the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub reason: String,
    /// Best similarity score observed, when a query was issued and matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl VerificationResult {
    pub fn verified(reason: impl Into<String>) -> Self {
        Self {
            verified: true,
            reason: reason.into(),
            similarity_score: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            reason: reason.into(),
            similarity_score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.similarity_score = Some(score);
        self
    }
}

impl fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = if self.verified { "verified" } else { "unverified" };
        write!(f, "{}: {}", label, self.reason)?;
        if let Some(score) = self.similarity_score {
            write!(f, " (score {:.3})", score)?;
        }
        Ok(())
    }
}
