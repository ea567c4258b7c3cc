//! Answers attached directly to tokens.
//!
//! Resolution runs in three round trips: the answers whose `is_token_id` is
//! in the requested set, the tag rows of those answers, and the child tags of
//! every distinct tag seen. Assembly is pure and lives in [`assemble_answers`]
//! so the ordering rules can be tested without a database.
//!
//! Ordering guarantees:
//!
//! | Level | Order |
//! |-------|-------|
//! | tokens | ascending token id |
//! | answers per token | ascending answer id |
//! | layers per answer | ascending layer id |
//! | tags per layer | ascending `reihung`, then tag id |
//! | children per tag | ascending child tag id |

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::{Config, ResolveConfig};
use crate::db::{self, distinct_ids, placeholders, ID_CHUNK};
use crate::error::{enforce, IntegrityError};
use crate::export::print_json;
use crate::models::{Answer, AnswerTagRow, AnswerTarget, ChildTag};

/// Per-call resolution switches.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub include_empty: bool,
    pub strict: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            include_empty: true,
            strict: true,
        }
    }
}

impl From<&ResolveConfig> for ResolveOptions {
    fn from(cfg: &ResolveConfig) -> Self {
        Self {
            include_empty: cfg.include_empty,
            strict: cfg.strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTag {
    pub tag_id: i64,
    pub tag: String,
    pub tag_long: Option<String>,
    pub comment: Option<String>,
    pub reihung: Option<i64>,
    pub children: Vec<ChildTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAnswer {
    pub id: i64,
    pub comment: Option<String>,
    pub tags_by_layer: BTreeMap<i64, Vec<ResolvedTag>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenAnswers {
    pub token_id: i64,
    pub answers: Vec<ResolvedAnswer>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnswerResolution {
    pub tokens: Vec<TokenAnswers>,
    pub issues: Vec<IntegrityError>,
}

impl AnswerResolution {
    pub fn answers_for(&self, token_id: i64) -> Option<&[ResolvedAnswer]> {
        self.tokens
            .iter()
            .find(|t| t.token_id == token_id)
            .map(|t| t.answers.as_slice())
    }
}

/// Memo of the tag family expansion, keyed by parent tag id.
///
/// Lives for one resolution call. Tag family data can change between calls,
/// so it is never shared across them.
#[derive(Debug, Default)]
pub struct ChildTagCache {
    entries: HashMap<i64, Vec<ChildTag>>,
}

impl ChildTagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids from `tag_ids` that have not been expanded yet, de-duplicated.
    pub fn missing(&self, tag_ids: &[i64]) -> Vec<i64> {
        distinct_ids(tag_ids)
            .into_iter()
            .filter(|id| !self.entries.contains_key(id))
            .collect()
    }

    /// Record the expansion of `requested`; ids without rows get an empty list.
    pub fn insert_loaded(&mut self, requested: &[i64], rows: Vec<(i64, ChildTag)>) {
        for id in requested {
            self.entries.entry(*id).or_default();
        }
        for (parent, child) in rows {
            self.entries.entry(parent).or_default().push(child);
        }
        for children in self.entries.values_mut() {
            children.sort_by_key(|c| c.tag_id);
            children.dedup_by_key(|c| c.tag_id);
        }
    }

    /// Load child tags for every id not yet cached, in batched queries.
    pub async fn prime(&mut self, pool: &SqlitePool, tag_ids: &[i64]) -> Result<()> {
        let missing = self.missing(tag_ids);
        if missing.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::new();
        for chunk in missing.chunks(ID_CHUNK) {
            let sql = format!(
                r#"
                SELECT f.id_parent_tag, t.id, t.tag, t.tag_lang
                FROM tag_familie f
                JOIN tags t ON t.id = f.id_child_tag
                WHERE f.id_parent_tag IN ({})
                ORDER BY f.id_parent_tag, t.id
                "#,
                placeholders(chunk.len())
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            for row in query.fetch_all(pool).await? {
                rows.push((
                    row.get::<i64, _>("id_parent_tag"),
                    ChildTag {
                        tag_id: row.get("id"),
                        tag: row.get("tag"),
                        tag_long: row.get("tag_lang"),
                    },
                ));
            }
        }

        tracing::debug!(parents = missing.len(), children = rows.len(), "expanded tag families");
        self.insert_loaded(&missing, rows);
        Ok(())
    }

    pub fn children(&self, tag_id: i64) -> &[ChildTag] {
        self.entries.get(&tag_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolve the answers attached to each of `token_ids`.
pub async fn resolve_token_answers(
    pool: &SqlitePool,
    token_ids: &[i64],
    opts: &ResolveOptions,
) -> Result<AnswerResolution> {
    let ids = distinct_ids(token_ids);
    if ids.is_empty() {
        return Ok(AnswerResolution::default());
    }

    let (answers, issues) = fetch_token_answers(pool, &ids).await?;
    let issues = enforce(issues, opts.strict)?;

    let answer_ids: Vec<i64> = answers.iter().map(|a| a.id).collect();
    let tag_rows = fetch_answer_tags(pool, &answer_ids).await?;

    let tag_ids: Vec<i64> = tag_rows.iter().map(|r| r.tag_id).collect();
    let mut cache = ChildTagCache::new();
    cache.prime(pool, &tag_ids).await?;

    let tokens = assemble_answers(&ids, &answers, tag_rows, &cache, opts.include_empty);
    tracing::debug!(
        tokens = ids.len(),
        answers = answers.len(),
        distinct_tags = cache.len(),
        "resolved token answers"
    );
    Ok(AnswerResolution { tokens, issues })
}

async fn fetch_token_answers(
    pool: &SqlitePool,
    token_ids: &[i64],
) -> Result<(Vec<Answer>, Vec<IntegrityError>)> {
    let mut answers = Vec::new();
    let mut issues = Vec::new();

    for chunk in token_ids.chunks(ID_CHUNK) {
        let sql = format!(
            "SELECT id, is_token_id, is_tokenset_id, kommentar FROM antworten \
             WHERE is_token_id IN ({}) ORDER BY id",
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
                // Still listed under its token so the duplicate linkage stays visible.
                Err(issue @ IntegrityError::AmbiguousAnswerTarget { token_id, .. }) => {
                    answers.push(Answer {
                        id,
                        target: AnswerTarget::Token(token_id),
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

/// Tag rows of the given answers, joined to their tags.
pub(crate) async fn fetch_answer_tags(
    pool: &SqlitePool,
    answer_ids: &[i64],
) -> Result<Vec<AnswerTagRow>> {
    let ids = distinct_ids(answer_ids);
    let mut out = Vec::new();

    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            r#"
            SELECT at.id_antwort, at.id_tag, at.id_tag_ebene, at.reihung,
                   t.tag, t.tag_lang, t.kommentar
            FROM antworten_tags at
            JOIN tags t ON t.id = at.id_tag
            WHERE at.id_antwort IN ({})
            ORDER BY at.id_antwort, at.id_tag_ebene, at.reihung, at.id_tag
            "#,
            placeholders(chunk.len())
        );
        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        for row in query.fetch_all(pool).await? {
            out.push(AnswerTagRow {
                answer_id: row.get("id_antwort"),
                tag_id: row.get("id_tag"),
                tag: row.get("tag"),
                tag_long: row.get("tag_lang"),
                tag_comment: row.get("kommentar"),
                layer: row.get("id_tag_ebene"),
                reihung: row.get("reihung"),
            });
        }
    }

    Ok(out)
}

/// Sort key for tags within a layer. Rows without a position sort last.
pub(crate) fn reihung_key(reihung: Option<i64>, tag_id: i64) -> (i64, i64) {
    (reihung.unwrap_or(i64::MAX), tag_id)
}

/// Group answers and tag rows into the per-token output.
///
/// Tag lists are sorted by `reihung` here, at the point of grouping, whatever
/// order the rows arrived in.
pub fn assemble_answers(
    token_ids: &[i64],
    answers: &[Answer],
    tag_rows: Vec<AnswerTagRow>,
    cache: &ChildTagCache,
    include_empty: bool,
) -> Vec<TokenAnswers> {
    let mut tags_by_answer: HashMap<i64, BTreeMap<i64, Vec<ResolvedTag>>> = HashMap::new();
    for row in tag_rows {
        let children = cache.children(row.tag_id).to_vec();
        tags_by_answer
            .entry(row.answer_id)
            .or_default()
            .entry(row.layer)
            .or_default()
            .push(ResolvedTag {
                tag_id: row.tag_id,
                tag: row.tag,
                tag_long: row.tag_long,
                comment: row.tag_comment,
                reihung: row.reihung,
                children,
            });
    }
    for layers in tags_by_answer.values_mut() {
        for tags in layers.values_mut() {
            tags.sort_by_key(|t| reihung_key(t.reihung, t.tag_id));
        }
    }

    let mut by_token: BTreeMap<i64, Vec<ResolvedAnswer>> = BTreeMap::new();
    for answer in answers {
        let AnswerTarget::Token(token_id) = answer.target else {
            continue;
        };
        by_token.entry(token_id).or_default().push(ResolvedAnswer {
            id: answer.id,
            comment: answer.comment.clone(),
            tags_by_layer: tags_by_answer.remove(&answer.id).unwrap_or_default(),
        });
    }

    let mut ids = token_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    ids.into_iter()
        .filter_map(|token_id| {
            let mut answers = by_token.remove(&token_id).unwrap_or_default();
            if answers.is_empty() && !include_empty {
                return None;
            }
            answers.sort_by_key(|a| a.id);
            Some(TokenAnswers { token_id, answers })
        })
        .collect()
}

/// CLI entry point: print the answers of the given tokens as JSON.
pub async fn run_answers(config: &Config, token_ids: &[i64], opts: &ResolveOptions) -> Result<()> {
    let pool = db::connect(config).await?;
    let resolution = resolve_token_answers(&pool, token_ids, opts).await;
    pool.close().await;
    print_json(&resolution?)
}
