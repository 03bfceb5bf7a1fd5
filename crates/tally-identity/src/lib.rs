//! Counterparty identity resolution.
//!
//! Legacy records often point at a client or supplier only through a tax id
//! string or a free-text name. This crate maps such an [`ExternalRef`] onto a
//! canonical [`CounterpartyCandidate`], or reports that it cannot.
//!
//! # Rules
//!
//! Rules are tried in order and the first one that matches wins:
//!
//! | Rule | Matches when |
//! |------|--------------|
//! | [`MatchRule::TaxId`] | the tax id equals a candidate's tax id, ignoring case |
//! | [`MatchRule::Name`] | the name is contained in a candidate's name, ignoring case |
//!
//! Placeholder values ("TEST", very short strings) never match. When several
//! candidates match under the same rule, the first one in the supplied order
//! is chosen. There is no scoring: two candidates sharing a substring will
//! resolve to whichever comes first.
//!
//! # Example
//!
//! ```
//! use tally_core::{CounterpartyCandidate, ExternalRef};
//! use tally_identity::{resolve, MatchRule, Resolution};
//!
//! let candidates = vec![
//!     CounterpartyCandidate::new("C1", "Acme Industrial Ltd"),
//!     CounterpartyCandidate::new("C2", "Globex").with_tax_id("12.345.678/0001-90"),
//! ];
//!
//! let by_tax = ExternalRef::new().with_tax_id("12.345.678/0001-90").with_name("Acme");
//! let resolution = resolve(&by_tax, &candidates);
//! assert_eq!(resolution.candidate().map(|c| c.as_str()), Some("C2"));
//!
//! let by_name = ExternalRef::new().with_name("acme");
//! assert!(matches!(
//!     resolve(&by_name, &candidates),
//!     Resolution::Resolved { rule: MatchRule::Name, .. }
//! ));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use serde::Serialize;
use std::fmt;
use tally_core::{CounterpartyCandidate, CounterpartyId, ExternalRef};

/// Tax ids this short or shorter are treated as absent.
pub const MAX_PLACEHOLDER_TAX_ID_LEN: usize = 3;

/// Names this short or shorter are treated as absent.
pub const MAX_PLACEHOLDER_NAME_LEN: usize = 2;

/// The rule that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRule {
    /// Exact tax id, case-insensitive.
    TaxId,
    /// Name containment, case-insensitive.
    Name,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaxId => write!(f, "tax id"),
            Self::Name => write!(f, "name"),
        }
    }
}

/// Outcome of resolving one external reference.
///
/// `Unresolved` is not an error: it means the record needs manual attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// A candidate matched.
    Resolved {
        /// The matched counterparty.
        candidate: CounterpartyId,
        /// Which rule matched.
        rule: MatchRule,
    },
    /// No usable identifier matched any candidate.
    Unresolved,
}

impl Resolution {
    /// Check if a candidate was found.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// The matched counterparty, if any.
    #[must_use]
    pub const fn candidate(&self) -> Option<&CounterpartyId> {
        match self {
            Self::Resolved { candidate, .. } => Some(candidate),
            Self::Unresolved => None,
        }
    }
}

/// Placeholder values that must never be matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Tax id sentinels, compared case-insensitively.
    pub tax_id_placeholders: Vec<String>,
    /// Name sentinels, compared case-insensitively.
    pub name_placeholders: Vec<String>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            tax_id_placeholders: vec!["TEST".to_string()],
            name_placeholders: vec!["test".to_string()],
        }
    }
}

impl ResolverOptions {
    /// Add a tax id sentinel.
    #[must_use]
    pub fn with_tax_id_placeholder(mut self, value: impl Into<String>) -> Self {
        self.tax_id_placeholders.push(value.into());
        self
    }

    /// Add a name sentinel.
    #[must_use]
    pub fn with_name_placeholder(mut self, value: impl Into<String>) -> Self {
        self.name_placeholders.push(value.into());
        self
    }

    /// Check whether a tax id carries no real information.
    #[must_use]
    pub fn is_placeholder_tax_id(&self, tax_id: &str) -> bool {
        is_placeholder(tax_id, MAX_PLACEHOLDER_TAX_ID_LEN, &self.tax_id_placeholders)
    }

    /// Check whether a name carries no real information.
    #[must_use]
    pub fn is_placeholder_name(&self, name: &str) -> bool {
        is_placeholder(name, MAX_PLACEHOLDER_NAME_LEN, &self.name_placeholders)
    }
}

fn is_placeholder(value: &str, max_len: usize, sentinels: &[String]) -> bool {
    let value = value.trim();
    value.chars().count() <= max_len
        || sentinels
            .iter()
            .any(|s| s.trim().to_lowercase() == value.to_lowercase())
}

/// Matches external references against candidates.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    options: ResolverOptions,
}

impl Resolver {
    /// Create a resolver with the default placeholders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with custom placeholders.
    #[must_use]
    pub const fn with_options(options: ResolverOptions) -> Self {
        Self { options }
    }

    /// The placeholder configuration in use.
    #[must_use]
    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve one reference against an ordered candidate list.
    #[must_use]
    pub fn resolve(
        &self,
        reference: &ExternalRef,
        candidates: &[CounterpartyCandidate],
    ) -> Resolution {
        if let Some(candidate) = self.match_tax_id(reference, candidates) {
            return Resolution::Resolved {
                candidate: candidate.id.clone(),
                rule: MatchRule::TaxId,
            };
        }
        if let Some(candidate) = self.match_name(reference, candidates) {
            return Resolution::Resolved {
                candidate: candidate.id.clone(),
                rule: MatchRule::Name,
            };
        }
        Resolution::Unresolved
    }

    fn match_tax_id<'a>(
        &self,
        reference: &ExternalRef,
        candidates: &'a [CounterpartyCandidate],
    ) -> Option<&'a CounterpartyCandidate> {
        let tax_id = reference.tax_id.as_deref()?.trim();
        if self.options.is_placeholder_tax_id(tax_id) {
            return None;
        }
        let needle = tax_id.to_lowercase();
        candidates.iter().find(|c| {
            c.tax_id
                .as_deref()
                .is_some_and(|t| t.trim().to_lowercase() == needle)
        })
    }

    fn match_name<'a>(
        &self,
        reference: &ExternalRef,
        candidates: &'a [CounterpartyCandidate],
    ) -> Option<&'a CounterpartyCandidate> {
        let name = reference.name.as_deref()?.trim();
        if self.options.is_placeholder_name(name) {
            return None;
        }
        let needle = name.to_lowercase();
        candidates
            .iter()
            .find(|c| c.name.to_lowercase().contains(&needle))
    }
}

/// Resolve a reference with the default placeholder rules.
#[must_use]
pub fn resolve(reference: &ExternalRef, candidates: &[CounterpartyCandidate]) -> Resolution {
    Resolver::new().resolve(reference, candidates)
}
