//! Answers attached to token-sets, flattened onto member tokens.
//!
//! A token-set's members live in one of two relations. Sets that carry both
//! boundary hints are resolved through the precomputed `tokentoset_cache`;
//! every other set through `tokentoset`. The choice is made once per set by
//! [`strategy_for`] and the rest of the module only talks to the
//! [`MembershipStrategy`] it returns.

use std::collections::{BTreeMap, HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::answers::{fetch_answer_tags, reihung_key, ResolveOptions};
use crate::config::Config;
use crate::db::{self, distinct_ids, placeholders, ID_CHUNK};
use crate::error::{enforce, IntegrityError};
use crate::export::print_json;
use crate::models::{Answer, AnswerTagRow, AnswerTarget, TokenSet};

/// One (token-set, member token) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    pub tokenset_id: i64,
    pub token_id: i64,
}

/// A way of listing the member tokens of token-sets.
#[async_trait]
pub trait MembershipStrategy: Send + Sync {
    /// Relation the members are read from.
    fn relation(&self) -> &'static str;

    /// The strategy reading the other relation.
    fn alternate(&self) -> &'static dyn MembershipStrategy;

    /// Members of `set_ids`, ordered by (token-set, token).
    async fn members(&self, pool: &SqlitePool, set_ids: &[i64]) -> Result<Vec<Membership>>;

    /// Which of `set_ids` have at least one row in this relation.
    async fn sets_with_rows(&self, pool: &SqlitePool, set_ids: &[i64]) -> Result<Vec<i64>> {
        let members = fetch_pairs(pool, self.relation(), "id_tokenset", set_ids).await?;
        Ok(distinct_ids(
            &members.iter().map(|m| m.tokenset_id).collect::<Vec<_>>(),
        ))
    }

    /// Token-sets in this relation that contain any of `token_ids`.
    async fn sets_containing(&self, pool: &SqlitePool, token_ids: &[i64]) -> Result<Vec<i64>> {
        let members = fetch_pairs(pool, self.relation(), "id_token", token_ids).await?;
        Ok(distinct_ids(
            &members.iter().map(|m| m.tokenset_id).collect::<Vec<_>>(),
        ))
    }
}

/// Membership through the plain `tokentoset` relation.
pub struct DirectMembership;

/// Membership through `tokentoset_cache`. A set routed here must have rows.
pub struct CachedMembership;

#[async_trait]
impl MembershipStrategy for DirectMembership {
    fn relation(&self) -> &'static str {
        "tokentoset"
    }

    fn alternate(&self) -> &'static dyn MembershipStrategy {
        &CachedMembership
    }

    async fn members(&self, pool: &SqlitePool, set_ids: &[i64]) -> Result<Vec<Membership>> {
        fetch_pairs(pool, self.relation(), "id_tokenset", set_ids).await
    }
}

#[async_trait]
impl MembershipStrategy for CachedMembership {
    fn relation(&self) -> &'static str {
        "tokentoset_cache"
    }

    fn alternate(&self) -> &'static dyn MembershipStrategy {
        &DirectMembership
    }

    async fn members(&self, pool: &SqlitePool, set_ids: &[i64]) -> Result<Vec<Membership>> {
        let members = fetch_pairs(pool, self.relation(), "id_tokenset", set_ids).await?;
        let populated: HashSet<i64> = members.iter().map(|m| m.tokenset_id).collect();
        if let Some(&empty) = distinct_ids(set_ids).iter().find(|id| !populated.contains(*id)) {
            return Err(IntegrityError::MissingCacheMembership { tokenset_id: empty }.into());
        }
        Ok(members)
    }
}

/// Both relations, for lookups that must cover every token-set.
pub const ALL_STRATEGIES: [&dyn MembershipStrategy; 2] = [&DirectMembership, &CachedMembership];

/// Pick the membership relation for a token-set from its boundary hints.
pub fn strategy_for(set: &TokenSet) -> &'static dyn MembershipStrategy {
    if set.has_boundary_hints() {
        &CachedMembership
    } else {
        &DirectMembership
    }
}

async fn fetch_pairs(
    pool: &SqlitePool,
    relation: &str,
    key_column: &str,
    ids: &[i64],
) -> Result<Vec<Membership>> {
    let ids = distinct_ids(ids);
    let mut out = Vec::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT DISTINCT id_tokenset, id_token FROM {} WHERE {} IN ({}) \
             ORDER BY id_tokenset, id_token",
            relation,
            key_column,
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        for row in query.fetch_all(pool).await? {
            out.push(Membership {
                tokenset_id: row.get("id_tokenset"),
                token_id: row.get("id_token"),
            });
        }
    }
    out.sort_by_key(|m| (m.tokenset_id, m.token_id));
    Ok(out)
}

/// Load token-set rows. Ids absent from `tokenset` come back without hints.
pub async fn load_tokensets(pool: &SqlitePool, set_ids: &[i64]) -> Result<Vec<TokenSet>> {
    let ids = distinct_ids(set_ids);
    let mut found: HashMap<i64, TokenSet> = HashMap::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT id, from_token, to_token FROM tokenset WHERE id IN ({})",
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        for row in query.fetch_all(pool).await? {
            let set = TokenSet {
                id: row.get("id"),
                from_token: row.get("from_token"),
                to_token: row.get("to_token"),
            };
            found.insert(set.id, set);
        }
    }
    Ok(ids
        .into_iter()
        .map(|id| {
            found.remove(&id).unwrap_or(TokenSet {
                id,
                from_token: None,
                to_token: None,
            })
        })
        .collect())
}

/// Resolve members of every set, each through its own strategy.
///
/// Returns members keyed by token-set plus any sets that also have rows in
/// the relation their strategy did not use.
pub async fn resolve_members(
    pool: &SqlitePool,
    sets: &[TokenSet],
) -> Result<(BTreeMap<i64, Vec<i64>>, Vec<IntegrityError>)> {
    let mut groups: BTreeMap<&'static str, (&'static dyn MembershipStrategy, Vec<i64>)> =
        BTreeMap::new();
    for set in sets {
        let strategy = strategy_for(set);
        groups
            .entry(strategy.relation())
            .or_insert_with(|| (strategy, Vec::new()))
            .1
            .push(set.id);
    }

    let mut members: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let mut issues = Vec::new();
    for (strategy, ids) in groups.values() {
        for m in strategy.members(pool, ids).await? {
            members.entry(m.tokenset_id).or_default().push(m.token_id);
        }
        let alternate = strategy.alternate();
        for tokenset_id in alternate.sets_with_rows(pool, ids).await? {
            issues.push(IntegrityError::MixedMembership {
                tokenset_id,
                resolved_via: strategy.relation(),
                also_in: alternate.relation(),
            });
        }
        tracing::debug!(relation = strategy.relation(), sets = ids.len(), "resolved membership");
    }

    Ok((members, issues))
}

/// One tag occurrence projected onto one member token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenSetTagRow {
    pub tokenset_id: i64,
    pub token_id: i64,
    pub answer_id: i64,
    pub tag_id: i64,
    pub tag: String,
    pub tag_long: Option<String>,
    pub layer: i64,
    pub reihung: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TokenSetResolution {
    pub rows: Vec<TokenSetTagRow>,
    pub issues: Vec<IntegrityError>,
}

pub async fn resolve_tokenset_answers(
    pool: &SqlitePool,
    set_ids: &[i64],
    opts: &ResolveOptions,
) -> Result<TokenSetResolution> {
    let ids = distinct_ids(set_ids);
    if ids.is_empty() {
        return Ok(TokenSetResolution::default());
    }

    let (answers, mut issues) = fetch_tokenset_answers(pool, &ids).await?;

    let implicated: Vec<i64> = answers
        .iter()
        .filter_map(|a| match a.target {
            AnswerTarget::TokenSet(id) => Some(id),
            AnswerTarget::Token(_) => None,
        })
        .collect();
    let sets = load_tokensets(pool, &implicated).await?;
    let (members, membership_issues) = resolve_members(pool, &sets).await?;
    issues.extend(membership_issues);
    let issues = enforce(issues, opts.strict)?;

    let answer_ids: Vec<i64> = answers.iter().map(|a| a.id).collect();
    let tag_rows = fetch_answer_tags(pool, &answer_ids).await?;

    let rows = project_rows(&answers, &tag_rows, &members);
    tracing::debug!(sets = ids.len(), rows = rows.len(), "resolved token-set answers");
    Ok(TokenSetResolution { rows, issues })
}

async fn fetch_tokenset_answers(
    pool: &SqlitePool,
    set_ids: &[i64],
) -> Result<(Vec<Answer>, Vec<IntegrityError>)> {
    let mut answers = Vec::new();
    let mut issues = Vec::new();

    for chunk in set_ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT id, is_token_id, is_tokenset_id, kommentar FROM antworten \
             WHERE is_tokenset_id IN ({}) ORDER BY id",
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        for row in query.fetch_all(pool).await? {
            let id: i64 = row.get("id");
            let comment: Option<String> = row.get("kommentar");
            match AnswerTarget::from_columns(id, row.get("is_token_id"), row.get("is_tokenset_id")) {
                Ok(target) => answers.push(Answer {
                    id,
                    target,
                    comment,
                }),
                Err(issue @ IntegrityError::AmbiguousAnswerTarget { tokenset_id, .. }) => {
                    answers.push(Answer {
                        id,
                        target: AnswerTarget::TokenSet(tokenset_id),
                        comment,
                    });
                    issues.push(issue);
                }
                Err(issue) => issues.push(issue),
            }
        }
    }

    Ok((answers, issues))
}

/// Cross each answer's tags with its set's members, ordered by token then
/// `reihung`.
pub fn project_rows(
    answers: &[Answer],
    tag_rows: &[AnswerTagRow],
    members: &BTreeMap<i64, Vec<i64>>,
) -> Vec<TokenSetTagRow> {
    let mut tags_by_answer: HashMap<i64, Vec<&AnswerTagRow>> = HashMap::new();
    for row in tag_rows {
        tags_by_answer.entry(row.answer_id).or_default().push(row);
    }

    let mut rows = Vec::new();
    for answer in answers {
        let AnswerTarget::TokenSet(tokenset_id) = answer.target else {
            continue;
        };
        let (Some(tokens), Some(tags)) = (members.get(&tokenset_id), tags_by_answer.get(&answer.id))
        else {
            continue;
        };
        for &token_id in tokens {
            for tag in tags {
                rows.push(TokenSetTagRow {
                    tokenset_id,
                    token_id,
                    answer_id: answer.id,
                    tag_id: tag.tag_id,
                    tag: tag.tag.clone(),
                    tag_long: tag.tag_long.clone(),
                    layer: tag.layer,
                    reihung: tag.reihung,
                });
            }
        }
    }

    rows.sort_by_key(|r| {
        let (reihung, tag_id) = reihung_key(r.reihung, r.tag_id);
        (r.token_id, reihung, r.tokenset_id, r.answer_id, tag_id)
    });
    rows
}

/// CLI entry point: print token-set tag rows as JSON.
pub async fn run_tokenset_answers(
    config: &Config,
    set_ids: &[i64],
    opts: &ResolveOptions,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let resolution = resolve_tokenset_answers(&pool, set_ids, opts).await;
    pool.close().await;
    print_json(&resolution?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(id: i64, from: Option<i64>, to: Option<i64>) -> TokenSet {
        TokenSet {
            id,
            from_token: from,
            to_token: to,
        }
    }

    fn tag_row(answer_id: i64, tag_id: i64, tag: &str, reihung: i64) -> AnswerTagRow {
        AnswerTagRow {
            answer_id,
            tag_id,
            tag: tag.to_string(),
            tag_long: None,
            tag_comment: None,
            layer: 1,
            reihung: Some(reihung),
        }
    }

    #[test]
    fn test_strategy_selection_by_hints() {
        assert_eq!(strategy_for(&set(1, Some(10), Some(20))).relation(), "tokentoset_cache");
        assert_eq!(strategy_for(&set(1, None, None)).relation(), "tokentoset");
        assert_eq!(strategy_for(&set(1, Some(10), None)).relation(), "tokentoset");
        assert_eq!(strategy_for(&set(1, None, Some(20))).relation(), "tokentoset");
    }

    #[test]
    fn test_alternates_point_at_each_other() {
        assert_eq!(DirectMembership.alternate().relation(), "tokentoset_cache");
        assert_eq!(CachedMembership.alternate().relation(), "tokentoset");
    }

    #[test]
    fn test_one_row_per_member_token() {
        let answers = [Answer {
            id: 1,
            target: AnswerTarget::TokenSet(7),
            comment: None,
        }];
        let tags = [tag_row(1, 50, "Z", 1)];
        let members = BTreeMap::from([(7, vec![202, 201])]);
        let rows = project_rows(&answers, &tags, &members);
        let pairs: Vec<(i64, &str)> = rows.iter().map(|r| (r.token_id, r.tag.as_str())).collect();
        assert_eq!(pairs, vec![(201, "Z"), (202, "Z")]);
    }

    #[test]
    fn test_rows_ordered_by_token_then_reihung() {
        let answers = [Answer {
            id: 1,
            target: AnswerTarget::TokenSet(7),
            comment: None,
        }];
        let tags = [tag_row(1, 60, "second", 2), tag_row(1, 50, "first", 1)];
        let members = BTreeMap::from([(7, vec![201, 202])]);
        let rows = project_rows(&answers, &tags, &members);
        let order: Vec<(i64, &str)> = rows.iter().map(|r| (r.token_id, r.tag.as_str())).collect();
        assert_eq!(
            order,
            vec![(201, "first"), (201, "second"), (202, "first"), (202, "second")]
        );
    }

    #[test]
    fn test_set_without_members_yields_no_rows() {
        let answers = [Answer {
            id: 1,
            target: AnswerTarget::TokenSet(8),
            comment: None,
        }];
        let tags = [tag_row(1, 50, "Z", 1)];
        assert!(project_rows(&answers, &tags, &BTreeMap::new()).is_empty());
    }
}
