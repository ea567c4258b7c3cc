//! Token timeline of a transcript.
//!
//! Tokens are returned in reading order: ascending by event start, ties
//! broken by event end, then by token id. Tokens without a timing event are
//! excluded rather than returned with empty timing.

use anyhow::Result;
use chrono::TimeDelta;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::export::print_json;
use crate::models::{Event, Token};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineToken {
    #[serde(flatten)]
    pub token: Token,
    pub event: Event,
    pub transcript_name: Option<String>,
}

/// A run of consecutive tokens spoken by the same informant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub informant_id: Option<i64>,
    pub start_ms: i64,
    pub end_ms: i64,
    pub tokens: Vec<TimelineToken>,
}

pub async fn resolve_timeline(pool: &SqlitePool, transcript_id: i64) -> Result<Vec<TimelineToken>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.transcript_id, t.informant_id, t.text, t.ortho, t.phon,
               t.pos, t.lemma, t.dependency, t.entity_type, t.token_reihung,
               e.id AS event_id, e.start_ms, e.end_ms,
               tr.name AS transcript_name
        FROM token t
        JOIN event e ON e.id = t.event_id
        LEFT JOIN transcript tr ON tr.id = t.transcript_id
        WHERE t.transcript_id = ?
        ORDER BY e.start_ms ASC, e.end_ms ASC, t.id ASC
        "#,
    )
    .bind(transcript_id)
    .fetch_all(pool)
    .await?;

    let tokens: Vec<TimelineToken> = rows
        .iter()
        .map(|row| TimelineToken {
            token: Token {
                id: row.get("id"),
                transcript_id: row.get("transcript_id"),
                informant_id: row.get("informant_id"),
                text: row.get("text"),
                ortho: row.get("ortho"),
                phon: row.get("phon"),
                pos: row.get("pos"),
                lemma: row.get("lemma"),
                dependency: row.get("dependency"),
                entity_type: row.get("entity_type"),
                token_reihung: row.get("token_reihung"),
            },
            event: Event {
                id: row.get("event_id"),
                start_ms: row.get("start_ms"),
                end_ms: row.get("end_ms"),
            },
            transcript_name: row.get("transcript_name"),
        })
        .collect();

    tracing::debug!(transcript_id, tokens = tokens.len(), "resolved timeline");
    Ok(tokens)
}

/// Split a timeline into speaker turns, preserving reading order.
pub fn group_utterances(tokens: &[TimelineToken]) -> Vec<Utterance> {
    let mut utterances: Vec<Utterance> = Vec::new();
    for tok in tokens {
        match utterances.last_mut() {
            Some(current) if current.informant_id == tok.token.informant_id => {
                current.start_ms = current.start_ms.min(tok.event.start_ms);
                current.end_ms = current.end_ms.max(tok.event.end_ms);
                current.tokens.push(tok.clone());
            }
            _ => utterances.push(Utterance {
                informant_id: tok.token.informant_id,
                start_ms: tok.event.start_ms,
                end_ms: tok.event.end_ms,
                tokens: vec![tok.clone()],
            }),
        }
    }
    utterances
}

/// Render a millisecond offset as `H:MM:SS.mmm`.
pub fn format_timestamp(ms: i64) -> String {
    let d = TimeDelta::milliseconds(ms.max(0));
    format!(
        "{}:{:02}:{:02}.{:03}",
        d.num_hours(),
        d.num_minutes() % 60,
        d.num_seconds() % 60,
        d.num_milliseconds() % 1000
    )
}

/// CLI entry point: print the timeline, optionally grouped into speaker turns.
pub async fn run_timeline(config: &Config, transcript_id: i64, utterances: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let tokens = resolve_timeline(&pool, transcript_id).await;
    pool.close().await;
    let tokens = tokens?;
    if utterances {
        print_json(&group_utterances(&tokens))
    } else {
        print_json(&tokens)
    }
}
