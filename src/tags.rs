//! Tag catalog and the tag family tree.
//!
//! The catalog lists every tag with its layers and child ids. The tree
//! starts from the generation-0 tags and expands children recursively; a
//! tag reachable along several paths appears once per path, each node keyed
//! `tag-<id>_<n>` with `n` counting that tag's occurrences.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::IntegrityError;
use crate::export::print_json;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogTag {
    pub tag_id: i64,
    pub tag: String,
    pub tag_long: Option<String>,
    pub generation: i64,
    pub comment: Option<String>,
    pub layers: Vec<i64>,
    pub children_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagNode {
    pub key: String,
    pub tag_id: i64,
    pub tag: String,
    pub tag_long: Option<String>,
    pub layer: Option<i64>,
    pub children: Vec<TagNode>,
}

pub async fn tag_catalog(pool: &SqlitePool) -> Result<Vec<CatalogTag>> {
    let tag_rows =
        sqlx::query("SELECT id, tag, tag_lang, generation, kommentar FROM tags ORDER BY id")
            .fetch_all(pool)
            .await?;

    let layer_rows = sqlx::query(
        "SELECT id_tag, id_tag_ebene FROM tag_ebene_zu_tag ORDER BY id_tag, id_tag_ebene",
    )
    .fetch_all(pool)
    .await?;

    let family_rows = sqlx::query(
        "SELECT id_parent_tag, id_child_tag FROM tag_familie ORDER BY id_parent_tag, id_child_tag",
    )
    .fetch_all(pool)
    .await?;

    let mut layers: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in &layer_rows {
        layers
            .entry(row.get("id_tag"))
            .or_default()
            .push(row.get("id_tag_ebene"));
    }
    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    for row in &family_rows {
        children
            .entry(row.get("id_parent_tag"))
            .or_default()
            .push(row.get("id_child_tag"));
    }

    let catalog: Vec<CatalogTag> = tag_rows
        .iter()
        .map(|row| {
            let id: i64 = row.get("id");
            CatalogTag {
                tag_id: id,
                tag: row.get("tag"),
                tag_long: row.get("tag_lang"),
                generation: row.get("generation"),
                comment: row.get("kommentar"),
                layers: layers.remove(&id).unwrap_or_default(),
                children_ids: children.remove(&id).unwrap_or_default(),
            }
        })
        .collect();

    tracing::debug!(tags = catalog.len(), "loaded tag catalog");
    Ok(catalog)
}

struct TreeBuilder<'a> {
    by_id: BTreeMap<i64, &'a CatalogTag>,
    occurrences: HashMap<i64, usize>,
    path: Vec<i64>,
}

impl<'a> TreeBuilder<'a> {
    fn expand(
        &mut self,
        tag: &'a CatalogTag,
        parent_layer: Option<i64>,
    ) -> Result<TagNode, IntegrityError> {
        if self.path.contains(&tag.tag_id) {
            return Err(IntegrityError::TagFamilyCycle { tag_id: tag.tag_id });
        }

        let n = self.occurrences.entry(tag.tag_id).or_insert(0);
        *n += 1;
        let key = format!("tag-{}_{}", tag.tag_id, n);

        // Prefer the parent's layer when the tag belongs to several.
        let layer = parent_layer
            .filter(|l| tag.layers.contains(l))
            .or_else(|| tag.layers.first().copied());

        self.path.push(tag.tag_id);
        let mut children = Vec::new();
        for child_id in &tag.children_ids {
            match self.by_id.get(child_id).copied() {
                Some(child) => children.push(self.expand(child, layer)?),
                None => tracing::warn!(
                    child_id,
                    parent_id = tag.tag_id,
                    "child tag not found in catalog"
                ),
            }
        }
        self.path.pop();

        Ok(TagNode {
            key,
            tag_id: tag.tag_id,
            tag: tag.tag.clone(),
            tag_long: tag.tag_long.clone(),
            layer,
            children,
        })
    }
}

/// Expand the catalog into a forest rooted at the generation-0 tags.
pub fn build_tag_tree(catalog: &[CatalogTag]) -> Result<Vec<TagNode>, IntegrityError> {
    let mut builder = TreeBuilder {
        by_id: catalog.iter().map(|t| (t.tag_id, t)).collect(),
        occurrences: HashMap::new(),
        path: Vec::new(),
    };

    let roots: Vec<&CatalogTag> = builder
        .by_id
        .values()
        .copied()
        .filter(|t| t.generation == 0)
        .collect();

    roots
        .into_iter()
        .map(|root| builder.expand(root, None))
        .collect()
}

/// CLI entry point: print the catalog, or the expanded tree with `tree`.
pub async fn run_tags(config: &Config, tree: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let catalog = tag_catalog(&pool).await;
    pool.close().await;
    let catalog = catalog?;
    if tree {
        print_json(&build_tag_tree(&catalog)?)
    } else {
        print_json(&catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: i64, generation: i64, layers: &[i64], children: &[i64]) -> CatalogTag {
        CatalogTag {
            tag_id: id,
            tag: format!("T{}", id),
            tag_long: None,
            generation,
            comment: None,
            layers: layers.to_vec(),
            children_ids: children.to_vec(),
        }
    }

    #[test]
    fn test_tree_roots_are_generation_zero() {
        let catalog = vec![tag(1, 0, &[1], &[2]), tag(2, 1, &[1], &[]), tag(3, 0, &[2], &[])];
        let tree = build_tag_tree(&catalog).unwrap();
        assert_eq!(tree.iter().map(|n| n.tag_id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(tree[0].children[0].tag_id, 2);
    }

    #[test]
    fn test_shared_child_gets_unique_keys() {
        let catalog = vec![tag(1, 0, &[], &[9]), tag(2, 0, &[], &[9]), tag(9, 1, &[], &[])];
        let tree = build_tag_tree(&catalog).unwrap();
        assert_eq!(tree[0].children[0].key, "tag-9_1");
        assert_eq!(tree[1].children[0].key, "tag-9_2");
        assert_eq!(tree[0].key, "tag-1_1");
    }

    #[test]
    fn test_child_prefers_parent_layer() {
        let catalog = vec![tag(1, 0, &[2], &[5]), tag(5, 1, &[1, 2], &[])];
        let tree = build_tag_tree(&catalog).unwrap();
        assert_eq!(tree[0].children[0].layer, Some(2));
    }

    #[test]
    fn test_unknown_child_skipped() {
        let catalog = vec![tag(1, 0, &[], &[42])];
        let tree = build_tag_tree(&catalog).unwrap();
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_cycle_detected() {
        let catalog = vec![tag(1, 0, &[], &[2]), tag(2, 1, &[], &[3]), tag(3, 2, &[], &[2])];
        assert!(matches!(
            build_tag_tree(&catalog),
            Err(IntegrityError::TagFamilyCycle { tag_id: 2 })
        ));
    }
}
