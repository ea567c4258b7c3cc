//! Shared store fixture for the integration tests.
//!
//! Transcript 239 ("0239") with two speakers:
//!
//! | Token | Event (ms) | Speaker | Answers |
//! |-------|-----------|---------|---------|
//! | 101 | 0–500 | 164 | #1: X (r1), Y (r2) |
//! | 102 | 500–900 | 164 | – |
//! | 103 | 500–800 | 164 | #2: B (r2), A (r1), C (r3), stored in that order |
//! | 104 | 1000–1500 | 165 | #3: PARENT on layer 1 |
//! | 105 | 1500–2000 | 165 | #4: PARENT on layer 2 |
//! | 106 | no event | 165 | – |
//! | 201 | 2000–2500 | 165 | – |
//! | 202 | 2500–3000 | 165 | – |
//!
//! Token-sets: 7 (no hints, direct members 201/202, answer #5 tag Z),
//! 8 (hints 104..105, cached members 104/105, answer #6 tag X),
//! 9 (hints 101..102, no cached members, answer #7 tag Y).

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use dioe_tei::config::{parse_config, Config};
use dioe_tei::{db, migrate};
use sqlx::SqlitePool;

pub fn config_toml(root: &Path) -> String {
    format!(
        r#"[db]
path = "{}/data/dioe.sqlite"

[resolve]
include_empty = true
strict = true

[export]
output_dir = "{}/out"
"#,
        root.display(),
        root.display()
    )
}

pub fn test_config(root: &Path) -> Config {
    parse_config(&config_toml(root)).unwrap()
}

pub fn write_config(root: &Path) -> PathBuf {
    let config_dir = root.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let path = config_dir.join("dtei.toml");
    std::fs::write(&path, config_toml(root)).unwrap();
    path
}

/// Open the fixture database under `root` writable, creating the schema.
pub async fn open_pool(root: &Path) -> SqlitePool {
    let cfg = test_config(root);
    let pool = db::connect_writable(&cfg).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    pool
}

async fn exec(pool: &SqlitePool, statements: &[&str]) {
    for stmt in statements {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .unwrap_or_else(|e| panic!("fixture statement failed: {}: {}", stmt, e));
    }
}

pub async fn seed(pool: &SqlitePool) {
    exec(
        pool,
        &[
            "INSERT INTO transcript (id, name) VALUES (239, '0239')",
            "INSERT INTO altersgruppe (id, bezeichnung) VALUES (1, 'jung (18-35)')",
            "INSERT INTO orte (id, ort_namelang, ort_namekurz, lat, lon, osm_id) \
             VALUES (10, 'Wien', 'W', 48.2082, 16.3738, 109166)",
            "INSERT INTO informanten (id, sigle, geschlecht, altersgruppe_id, geburtsort_id, kommentar) \
             VALUES (164, '0239', 1, 1, 10, 'erste Aufnahme')",
            "INSERT INTO informanten (id, sigle, geschlecht, altersgruppe_id, geburtsort_id, kommentar) \
             VALUES (165, '0240', 2, NULL, NULL, NULL)",
            "INSERT INTO event (id, start_ms, end_ms) VALUES \
             (1, 0, 500), (2, 500, 900), (3, 500, 800), (4, 1000, 1500), \
             (5, 1500, 2000), (6, 2000, 2500), (7, 2500, 3000)",
            "INSERT INTO token (id, transcript_id, informant_id, event_id, text, ortho, pos, lemma, token_reihung) VALUES \
             (101, 239, 164, 1, 'des', 'Des', 'PRON', 'das', 1), \
             (102, 239, 164, 2, 'is', 'is', 'AUX', 'sein', 3), \
             (103, 239, 164, 3, 'jo', 'jo', 'PART', 'ja', 2), \
             (104, 239, 165, 4, 'guat', 'gut', 'ADJ', 'gut', 4), \
             (105, 239, 165, 5, '.', '.', 'PUNCT', '.', 5), \
             (106, 239, 165, NULL, 'ohne', 'ohne', 'ADP', 'ohne', 6), \
             (201, 239, 165, 6, 'a', 'ein', 'DET', 'ein', 7), \
             (202, 239, 165, 7, 'Haus', 'Haus', 'NOUN', 'Haus', 8)",
            "INSERT INTO tag_ebene (id, name) VALUES (1, 'Phänomen'), (2, 'Variante')",
            "INSERT INTO tags (id, tag, tag_lang, generation, kommentar) VALUES \
             (1, 'X', 'Tag X', 0, NULL), (2, 'Y', 'Tag Y', 0, NULL), \
             (3, 'A', 'Tag A', 0, NULL), (4, 'B', 'Tag B', 0, NULL), \
             (5, 'C', 'Tag C', 0, NULL), (6, 'Z', 'Tag Z', 0, 'Mengen-Tag'), \
             (10, 'PARENT', 'Elterntag', 0, NULL), \
             (11, 'CH1', 'Kind 1', 1, NULL), (12, 'CH2', 'Kind 2', 1, NULL)",
            "INSERT INTO tag_ebene_zu_tag (id_tag, id_tag_ebene) VALUES \
             (1, 1), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1), (10, 1), (10, 2), (11, 2), (12, 1)",
            "INSERT INTO tag_familie (id_parent_tag, id_child_tag) VALUES (10, 12), (10, 11)",
            "INSERT INTO tokenset (id, from_token, to_token) VALUES \
             (7, NULL, NULL), (8, 104, 105), (9, 101, 102)",
            "INSERT INTO tokentoset (id_tokenset, id_token) VALUES (7, 202), (7, 201)",
            "INSERT INTO tokentoset_cache (id_tokenset, id_token) VALUES (8, 105), (8, 104)",
            "INSERT INTO antworten (id, is_token_id, is_tokenset_id, kommentar) VALUES \
             (1, 101, NULL, 'erste Antwort'), (2, 103, NULL, 'Reihung'), \
             (3, 104, NULL, NULL), (4, 105, NULL, NULL), \
             (5, NULL, 7, 'Menge'), (6, NULL, 8, 'Cache-Menge'), (7, NULL, 9, 'ohne Cache')",
            "INSERT INTO antworten_tags (id, id_antwort, id_tag, id_tag_ebene, reihung) VALUES \
             (1, 1, 1, 1, 1), (2, 1, 2, 1, 2), \
             (3, 2, 4, 1, 2), (4, 2, 3, 1, 1), (5, 2, 5, 1, 3), \
             (6, 3, 10, 1, 1), (7, 4, 10, 2, 1), \
             (8, 5, 6, 1, 1), (9, 6, 1, 1, 1), (10, 7, 2, 1, 1)",
        ],
    )
    .await;
}

/// Answer 50 linked to token 102 and token-set 7 at once.
pub async fn add_ambiguous_answer(pool: &SqlitePool) {
    exec(
        pool,
        &[
            "INSERT INTO antworten (id, is_token_id, is_tokenset_id, kommentar) \
             VALUES (50, 102, 7, 'doppelt')",
            "INSERT INTO antworten_tags (id, id_antwort, id_tag, id_tag_ebene, reihung) \
             VALUES (50, 50, 3, 1, 1)",
        ],
    )
    .await;
}

/// Direct membership rows for token-set 8, which resolves through the cache.
pub async fn add_mixed_membership(pool: &SqlitePool) {
    exec(
        pool,
        &["INSERT INTO tokentoset (id_tokenset, id_token) VALUES (8, 104)"],
    )
    .await;
}

/// Answer 60 linked to neither a token nor a token-set.
pub async fn add_untargeted_answer(pool: &SqlitePool) {
    exec(
        pool,
        &[
            "INSERT INTO antworten (id, is_token_id, is_tokenset_id, kommentar) \
             VALUES (60, NULL, NULL, 'verwaist')",
            "INSERT INTO antworten_tags (id, id_antwort, id_tag, id_tag_ebene, reihung) \
             VALUES (60, 60, 3, 1, 1)",
        ],
    )
    .await;
}

/// A fresh, seeded fixture database under `root`.
pub async fn seeded_pool(root: &Path) -> SqlitePool {
    let pool = open_pool(root).await;
    seed(&pool).await;
    pool
}
