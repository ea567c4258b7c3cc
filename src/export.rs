//! Export a transcript as JSON documents for the TEI stage.
//!
//! Writes three files into the output directory:
//!
//! | File | Content |
//! |------|---------|
//! | `informants.json` | `{"informants": [...]}` for every speaker of the transcript |
//! | `transcript_<id>.json` | speaker turns with tokens, their kind, timing, answers and token-set tags |
//! | `tags.json` | the tag family tree |
//!
//! Output is deterministic for an unchanged store. Each written file is
//! listed with its SHA-256 so two exports can be compared.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::answers::{resolve_token_answers, ResolveOptions, ResolvedAnswer};
use crate::config::Config;
use crate::db;
use crate::error::IntegrityError;
use crate::informants::{resolve_informants, InformantRecord};
use crate::models::TokenKind;
use crate::tags::{build_tag_tree, tag_catalog, TagNode};
use crate::timeline::{format_timestamp, group_utterances, resolve_timeline, TimelineToken};
use crate::tokensets::{resolve_tokenset_answers, TokenSetTagRow, ALL_STRATEGIES};

#[derive(Debug, Serialize)]
pub struct InformantsDoc {
    pub informants: Vec<InformantRecord>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptHeader {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExportToken {
    #[serde(flatten)]
    pub timeline: TimelineToken,
    pub kind: TokenKind,
    pub start: String,
    pub end: String,
    pub answers: Vec<ResolvedAnswer>,
    pub tokenset_tags: Vec<TokenSetTagRow>,
}

#[derive(Debug, Serialize)]
pub struct ExportUtterance {
    pub informant_id: Option<i64>,
    pub start: String,
    pub end: String,
    pub tokens: Vec<ExportToken>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptDoc {
    pub transcript: TranscriptHeader,
    pub utterances: Vec<ExportUtterance>,
}

#[derive(Debug, Serialize)]
pub struct TagsDoc {
    pub tags: Vec<TagNode>,
}

/// Everything one export writes, before serialization.
#[derive(Debug)]
pub struct ExportBundle {
    pub informants: InformantsDoc,
    pub transcript: TranscriptDoc,
    pub tags: TagsDoc,
    pub issues: Vec<IntegrityError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub path: PathBuf,
    pub sha256: String,
}

pub async fn build_bundle(
    pool: &SqlitePool,
    transcript_id: i64,
    opts: &ResolveOptions,
) -> Result<ExportBundle> {
    let timeline = resolve_timeline(pool, transcript_id).await?;
    if timeline.is_empty() {
        bail!("transcript {} has no timed tokens", transcript_id);
    }
    let token_ids: Vec<i64> = timeline.iter().map(|t| t.token.id).collect();

    // Every token stays in the export, so empty answer lists are always kept.
    let answer_opts = ResolveOptions {
        include_empty: true,
        ..*opts
    };
    let answers = resolve_token_answers(pool, &token_ids, &answer_opts).await?;
    let mut answers_by_token: BTreeMap<i64, Vec<ResolvedAnswer>> = answers
        .tokens
        .into_iter()
        .map(|t| (t.token_id, t.answers))
        .collect();

    let mut set_ids = Vec::new();
    for strategy in ALL_STRATEGIES {
        set_ids.extend(strategy.sets_containing(pool, &token_ids).await?);
    }
    let set_answers = resolve_tokenset_answers(pool, &set_ids, opts).await?;
    let mut set_tags_by_token: BTreeMap<i64, Vec<TokenSetTagRow>> = BTreeMap::new();
    for row in set_answers.rows {
        set_tags_by_token.entry(row.token_id).or_default().push(row);
    }

    let mut informant_ids: Vec<i64> = timeline.iter().filter_map(|t| t.token.informant_id).collect();
    informant_ids.sort_unstable();
    informant_ids.dedup();
    let informants = resolve_informants(pool, &informant_ids).await?;

    let tree = build_tag_tree(&tag_catalog(pool).await?)?;

    let name = timeline[0].transcript_name.clone();
    let utterances = group_utterances(&timeline)
        .into_iter()
        .map(|utt| ExportUtterance {
            informant_id: utt.informant_id,
            start: format_timestamp(utt.start_ms),
            end: format_timestamp(utt.end_ms),
            tokens: utt
                .tokens
                .into_iter()
                .map(|tok| {
                    let id = tok.token.id;
                    ExportToken {
                        kind: tok.token.kind(),
                        start: format_timestamp(tok.event.start_ms),
                        end: format_timestamp(tok.event.end_ms),
                        timeline: tok,
                        answers: answers_by_token.remove(&id).unwrap_or_default(),
                        tokenset_tags: set_tags_by_token.remove(&id).unwrap_or_default(),
                    }
                })
                .collect(),
        })
        .collect();

    let mut issues = answers.issues;
    issues.extend(set_answers.issues);

    Ok(ExportBundle {
        informants: InformantsDoc { informants },
        transcript: TranscriptDoc {
            transcript: TranscriptHeader {
                id: transcript_id,
                name,
            },
            utterances,
        },
        tags: TagsDoc { tags: tree },
        issues,
    })
}

fn write_json<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<ManifestEntry> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    let path = dir.join(file_name);
    std::fs::write(&path, &json)?;
    Ok(ManifestEntry {
        path,
        sha256: hex::encode(Sha256::digest(json.as_bytes())),
    })
}

/// Write the bundle into `dir`, returning one manifest entry per file.
pub fn write_bundle(bundle: &ExportBundle, dir: &Path) -> Result<Vec<ManifestEntry>> {
    std::fs::create_dir_all(dir)?;
    let transcript_file = format!("transcript_{}.json", bundle.transcript.transcript.id);
    Ok(vec![
        write_json(dir, "informants.json", &bundle.informants)?,
        write_json(dir, &transcript_file, &bundle.transcript)?,
        write_json(dir, "tags.json", &bundle.tags)?,
    ])
}

/// Print a value to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// CLI entry point: export one transcript and print the manifest.
pub async fn run_export(config: &Config, transcript_id: i64, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;
    let opts = ResolveOptions::from(&config.resolve);
    let bundle = build_bundle(&pool, transcript_id, &opts).await;
    pool.close().await;
    let bundle = bundle?;

    let dir = output.unwrap_or(config.export.output_dir.as_path());
    let manifest = write_bundle(&bundle, dir)?;

    for entry in &manifest {
        println!("{}  {}", entry.sha256, entry.path.display());
    }
    tracing::info!(
        transcript_id,
        files = manifest.len(),
        issues = bundle.issues.len(),
        dir = %dir.display(),
        "export complete"
    );
    Ok(())
}
