//! # dioe-tei
//!
//! Read-only resolution of transcript annotations for TEI export.
//!
//! The annotation store holds transcripts, timed tokens, token-sets and the
//! tagged answers annotators attached to them. This crate reads that store
//! and re-projects it into structures a TEI stage can serialize: informant
//! records, the token timeline in reading order, and the answers of each
//! token with their tags grouped by layer and ordered by `reihung`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌────────────┐
//! │ Annotation   │──▶│ Resolvers            │──▶│ JSON for   │
//! │ store (SQL)  │   │ informants/timeline/ │   │ the TEI    │
//! └──────────────┘   │ answers/tokensets    │   │ stage      │
//!                    └──────────────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dtei init                          # create a local mirror schema
//! dtei timeline 239 --utterances     # reading order, grouped by speaker
//! dtei answers 101 102               # answers of two tokens
//! dtei tokenset-answers 7            # token-set tags per member token
//! dtei export 239 --out ./out        # JSON bundle for one transcript
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Mirror schema bootstrap |
//! | [`models`] | Store entities and the answer target |
//! | [`error`] | Data-integrity conditions |
//! | [`informants`] | Informant metadata lookup |
//! | [`timeline`] | Token timeline and speaker turns |
//! | [`answers`] | Answers attached to tokens |
//! | [`tokensets`] | Answers attached to token-sets |
//! | [`tags`] | Tag catalog and family tree |
//! | [`export`] | JSON export bundle |

pub mod answers;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod informants;
pub mod migrate;
pub mod models;
pub mod tags;
pub mod timeline;
pub mod tokensets;
