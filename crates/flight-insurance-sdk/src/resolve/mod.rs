//! Claim identifier resolution
//!
//! Picks the identifier a claim should be submitted against. Precedence,
//! first match wins:
//!
//! 1. candidate live and pooled → candidate (`DirectHit`)
//! 2. candidate live, not pooled, some pool member live → first live pool
//!    member (`PoolFallbackDespiteValidCandidate`)
//! 3. candidate live, no pool member live → candidate
//!    (`CandidateOnlyOption`)
//! 4. no usable candidate, some pool member live → last live pool member
//!    (`MostRecentPoolMember`)
//! 5. nothing → no recommendation (`NoValidPolicyFound`)
//!
//! Rule 4 reads recency off pool order, which assumes the pool only ever
//! appends members.

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::types::PoolSnapshot;
use crate::verify::ExistenceVerifier;

/// Why the resolver picked what it picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Rationale {
    DirectHit,
    PoolFallbackDespiteValidCandidate,
    CandidateOnlyOption,
    MostRecentPoolMember,
    NoValidPolicyFound,
}

impl Rationale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectHit => "direct_hit",
            Self::PoolFallbackDespiteValidCandidate => "pool_fallback_despite_valid_candidate",
            Self::CandidateOnlyOption => "candidate_only_option",
            Self::MostRecentPoolMember => "most_recent_pool_member",
            Self::NoValidPolicyFound => "no_valid_policy_found",
        }
    }
}

impl std::fmt::Display for Rationale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory answer for one claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Candidate as given, trimmed
    pub candidate: String,
    pub recommended: Option<String>,
    pub rationale: Rationale,
    /// Whether the recommendation is in the local cache
    pub in_local_cache: bool,
}

impl Resolution {
    pub fn recommended_id(&self) -> Option<&str> {
        self.recommended.as_deref()
    }

    /// The recommendation differs from what the user supplied
    pub fn is_substitution(&self) -> bool {
        !self.candidate.is_empty() && self.recommended.as_deref() != Some(self.candidate.as_str())
    }

    /// User-facing explanation
    pub fn explain(&self) -> String {
        let recommended = self.recommended.as_deref().unwrap_or_default();
        match self.rationale {
            Rationale::DirectHit => format!(
                "Policy {} is live and registered in the insurance pool.",
                recommended
            ),
            Rationale::PoolFallbackDespiteValidCandidate => format!(
                "Policy {} exists but is not registered in the insurance pool; \
                 the first valid pool policy is {}.",
                self.candidate, recommended
            ),
            Rationale::CandidateOnlyOption => format!(
                "Policy {} exists but is not registered in the insurance pool, \
                 and no pool policy verifies; using it as the only option.",
                recommended
            ),
            Rationale::MostRecentPoolMember if self.candidate.is_empty() => format!(
                "No policy id given; the most recent known-good policy is {}.",
                recommended
            ),
            Rationale::MostRecentPoolMember => format!(
                "Policy {} could not be verified; the most recent known-good policy is {}.",
                self.candidate, recommended
            ),
            Rationale::NoValidPolicyFound if self.candidate.is_empty() => {
                "No policy id given and no valid policy found in the insurance pool.".to_string()
            }
            Rationale::NoValidPolicyFound => format!(
                "Policy {} could not be verified and no valid policy was found in the insurance pool.",
                self.candidate
            ),
        }
    }
}

/// Resolves claim identifiers. Never mutates anything, so it is safe to
/// call speculatively.
#[derive(Clone)]
pub struct IdentifierResolver {
    verifier: ExistenceVerifier,
}

impl IdentifierResolver {
    pub fn new(verifier: ExistenceVerifier) -> Self {
        Self { verifier }
    }

    pub async fn resolve(&self, candidate: &str, pool: &PoolSnapshot) -> Resolution {
        self.resolve_with_cache(candidate, pool, &HashSet::new()).await
    }

    /// Resolve, and report whether the answer is in `cached`.
    pub async fn resolve_with_cache(
        &self,
        candidate: &str,
        pool: &PoolSnapshot,
        cached: &HashSet<String>,
    ) -> Resolution {
        let candidate = candidate.trim();
        let candidate_live = !candidate.is_empty() && self.verifier.verify(candidate).await;

        let (recommended, rationale) = if candidate_live {
            if pool.contains(candidate) {
                (Some(candidate.to_string()), Rationale::DirectHit)
            } else {
                match self.first_live(pool.member_ids.iter().map(String::as_str)).await {
                    Some(member) => (Some(member), Rationale::PoolFallbackDespiteValidCandidate),
                    None => (Some(candidate.to_string()), Rationale::CandidateOnlyOption),
                }
            }
        } else {
            debug!(
                candidate,
                "Candidate unusable, scanning pool from the most recent member"
            );
            match self.first_live(pool.most_recent_first()).await {
                Some(member) => (Some(member), Rationale::MostRecentPoolMember),
                None => (None, Rationale::NoValidPolicyFound),
            }
        };

        let in_local_cache = recommended
            .as_ref()
            .map(|id| cached.contains(id))
            .unwrap_or(false);

        debug!(
            candidate,
            recommended = recommended.as_deref().unwrap_or(""),
            rationale = %rationale,
            "Resolved claim identifier"
        );

        Resolution {
            candidate: candidate.to_string(),
            recommended,
            rationale,
            in_local_cache,
        }
    }

    /// First id in iteration order that verifies; stops at the first hit.
    async fn first_live<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Option<String> {
        for id in ids {
            if self.verifier.verify(id).await {
                return Some(id.to_string());
            }
        }
        None
    }
}
