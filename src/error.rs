//! Data-integrity conditions found while resolving.
//!
//! Store and I/O failures are not represented here; they travel through
//! `anyhow` unchanged. These variants describe upstream data that breaks a
//! model invariant and that the resolvers refuse to repair on their own.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityError {
    /// Answer references both a token and a token-set.
    AmbiguousAnswerTarget {
        answer_id: i64,
        token_id: i64,
        tokenset_id: i64,
    },
    /// Answer references neither a token nor a token-set.
    MissingAnswerTarget { answer_id: i64 },
    /// Token-set carries both boundary hints but has no cached membership.
    MissingCacheMembership { tokenset_id: i64 },
    /// Token-set has membership rows in both relations.
    MixedMembership {
        tokenset_id: i64,
        resolved_via: &'static str,
        also_in: &'static str,
    },
    /// Tag family relation loops back onto a tag already on the path.
    TagFamilyCycle { tag_id: i64 },
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityError::AmbiguousAnswerTarget {
                answer_id,
                token_id,
                tokenset_id,
            } => write!(
                f,
                "answer {} targets both token {} and token-set {}",
                answer_id, token_id, tokenset_id
            ),
            IntegrityError::MissingAnswerTarget { answer_id } => {
                write!(f, "answer {} targets neither a token nor a token-set", answer_id)
            }
            IntegrityError::MissingCacheMembership { tokenset_id } => write!(
                f,
                "token-set {} has boundary hints but no rows in tokentoset_cache",
                tokenset_id
            ),
            IntegrityError::MixedMembership {
                tokenset_id,
                resolved_via,
                also_in,
            } => write!(
                f,
                "token-set {} resolved via {} also has rows in {}",
                tokenset_id, resolved_via, also_in
            ),
            IntegrityError::TagFamilyCycle { tag_id } => {
                write!(f, "tag family cycle through tag {}", tag_id)
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Apply the strictness policy to the issues collected by one resolution.
///
/// Strict mode fails on the first issue. Otherwise every issue is logged and
/// handed back so callers can still inspect it.
pub fn enforce(issues: Vec<IntegrityError>, strict: bool) -> anyhow::Result<Vec<IntegrityError>> {
    if strict {
        if let Some(first) = issues.into_iter().next() {
            return Err(first.into());
        }
        return Ok(Vec::new());
    }
    for issue in &issues {
        tracing::warn!(%issue, "data integrity issue");
    }
    Ok(issues)
}
