//! Schema bootstrap for local mirrors of the annotation store.
//!
//! The upstream database is owned by the annotation system; this module only
//! creates the subset of its tables the resolvers read, so that local mirrors
//! and test fixtures share one layout. Every statement is idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS transcript (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS event (
        id INTEGER PRIMARY KEY,
        start_ms INTEGER NOT NULL,
        end_ms INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS token (
        id INTEGER PRIMARY KEY,
        transcript_id INTEGER NOT NULL,
        informant_id INTEGER,
        event_id INTEGER,
        text TEXT,
        ortho TEXT,
        phon TEXT,
        pos TEXT,
        lemma TEXT,
        dependency TEXT,
        entity_type TEXT,
        token_reihung INTEGER,
        FOREIGN KEY (transcript_id) REFERENCES transcript(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokenset (
        id INTEGER PRIMARY KEY,
        from_token INTEGER,
        to_token INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokentoset (
        id_tokenset INTEGER NOT NULL,
        id_token INTEGER NOT NULL,
        UNIQUE(id_tokenset, id_token)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tokentoset_cache (
        id_tokenset INTEGER NOT NULL,
        id_token INTEGER NOT NULL,
        UNIQUE(id_tokenset, id_token)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS antworten (
        id INTEGER PRIMARY KEY,
        is_token_id INTEGER,
        is_tokenset_id INTEGER,
        kommentar TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag_ebene (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY,
        tag TEXT NOT NULL,
        tag_lang TEXT,
        generation INTEGER NOT NULL DEFAULT 0,
        kommentar TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag_ebene_zu_tag (
        id_tag INTEGER NOT NULL,
        id_tag_ebene INTEGER NOT NULL,
        UNIQUE(id_tag, id_tag_ebene)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS antworten_tags (
        id INTEGER PRIMARY KEY,
        id_antwort INTEGER NOT NULL,
        id_tag INTEGER NOT NULL,
        id_tag_ebene INTEGER NOT NULL,
        reihung INTEGER,
        FOREIGN KEY (id_antwort) REFERENCES antworten(id),
        FOREIGN KEY (id_tag) REFERENCES tags(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag_familie (
        id_parent_tag INTEGER NOT NULL,
        id_child_tag INTEGER NOT NULL,
        UNIQUE(id_parent_tag, id_child_tag)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS altersgruppe (
        id INTEGER PRIMARY KEY,
        bezeichnung TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orte (
        id INTEGER PRIMARY KEY,
        ort_namelang TEXT NOT NULL,
        ort_namekurz TEXT,
        lat REAL,
        lon REAL,
        osm_id INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS informanten (
        id INTEGER PRIMARY KEY,
        sigle TEXT NOT NULL,
        geschlecht INTEGER,
        altersgruppe_id INTEGER,
        geburtsort_id INTEGER,
        kommentar TEXT
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_token_transcript ON token(transcript_id)",
    "CREATE INDEX IF NOT EXISTS idx_antworten_token ON antworten(is_token_id)",
    "CREATE INDEX IF NOT EXISTS idx_antworten_tokenset ON antworten(is_tokenset_id)",
    "CREATE INDEX IF NOT EXISTS idx_antworten_tags_antwort ON antworten_tags(id_antwort)",
    "CREATE INDEX IF NOT EXISTS idx_tokentoset_set ON tokentoset(id_tokenset)",
    "CREATE INDEX IF NOT EXISTS idx_tokentoset_cache_set ON tokentoset_cache(id_tokenset)",
    "CREATE INDEX IF NOT EXISTS idx_tag_familie_parent ON tag_familie(id_parent_tag)",
];

/// Create every mirror table and index on an open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for stmt in TABLES.iter().chain(INDEXES.iter()) {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect_writable(config).await?;
    apply_schema(&pool).await?;
    tracing::info!(path = %config.db.path.display(), "schema ready");
    pool.close().await;
    Ok(())
}
