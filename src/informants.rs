//! Informant metadata lookup.
//!
//! One record per known informant id. Age group and birthplace are left
//! joined: an informant without them still yields a record, with `None` in
//! the missing fields. Ids that match no informant are omitted.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db::{self, distinct_ids, placeholders, ID_CHUNK};
use crate::export::print_json;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub name: String,
    pub short_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub osm_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InformantRecord {
    pub id: i64,
    pub sigle: String,
    /// Sex flag as stored upstream.
    pub sex: Option<i64>,
    pub age_group: Option<String>,
    pub comment: Option<String>,
    pub birthplace: Option<Place>,
}

pub async fn resolve_informants(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<InformantRecord>> {
    let ids = distinct_ids(ids);
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let sql = format!(
            r#"
            SELECT i.id, i.sigle, i.geschlecht, i.kommentar,
                   a.bezeichnung AS age_group,
                   o.id AS place_id, o.ort_namelang, o.ort_namekurz, o.lat, o.lon, o.osm_id
            FROM informanten i
            LEFT JOIN altersgruppe a ON a.id = i.altersgruppe_id
            LEFT JOIN orte o ON o.id = i.geburtsort_id
            WHERE i.id IN ({})
            "#,
            placeholders(chunk.len())
        );

        let mut query = sqlx::query(&sql);
        for id in chunk {
            query = query.bind(id);
        }
        for row in query.fetch_all(pool).await? {
            let place_id: Option<i64> = row.get("place_id");
            let birthplace = place_id.map(|_| Place {
                name: row.get("ort_namelang"),
                short_name: row.get("ort_namekurz"),
                lat: row.get("lat"),
                lon: row.get("lon"),
                osm_id: row.get("osm_id"),
            });
            records.push(InformantRecord {
                id: row.get("id"),
                sigle: row.get("sigle"),
                sex: row.get("geschlecht"),
                age_group: row.get("age_group"),
                comment: row.get("kommentar"),
                birthplace,
            });
        }
    }
    records.sort_by_key(|r| r.id);

    tracing::debug!(requested = ids.len(), found = records.len(), "resolved informants");
    Ok(records)
}

/// CLI entry point: print informant records as JSON.
pub async fn run_informants(config: &Config, ids: &[i64]) -> Result<()> {
    let pool = db::connect(config).await?;
    let records = resolve_informants(&pool, ids).await;
    pool.close().await;
    let records = records?;
    if records.len() < distinct_ids(ids).len() {
        tracing::info!(
            requested = distinct_ids(ids).len(),
            found = records.len(),
            "some informant ids matched no record"
        );
    }
    print_json(&serde_json::json!({ "informants": records }))
}
