//! Read-only catalog of priced content
//!
//! Loaded once at startup from a manifest, a content directory and a
//! [`PriceTable`]; never mutated afterwards.

pub mod manifest;
pub mod preview;
pub mod pricing;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::prelude::normalize_item_id;

pub use manifest::{ManifestEntry, builtin_manifest, load_manifest};
pub use pricing::{PriceTable, Tier};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("item '{0}' not found")]
    NotFound(String),
    #[error("duplicate item id '{0}'")]
    Duplicate(String),
    #[error("catalog is empty")]
    Empty,
    #[error("price for tier '{0}' must be positive")]
    InvalidPrice(Tier),
    #[error("invalid price override: {0}")]
    InvalidPriceSpec(String),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Manifest(#[source] serde_json::Error),
}

/// One sellable item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub title: String,
    pub tier: Tier,
    /// Satoshis, always positive
    pub price: u64,
    pub preview: String,
    pub content: String,
}

impl CatalogItem {
    pub fn new(id: &str, title: &str, tier: Tier, price: u64, content: String) -> Self {
        let id = normalize_item_id(id);
        Self {
            preview: preview::build_preview(&id, price, &content),
            id,
            title: title.to_string(),
            tier,
            price,
            content,
        }
    }
}

/// Listing row returned by `GET /catalog`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogEntry {
    #[schema(example = "K01")]
    pub id: String,
    #[schema(example = "What is Stress?")]
    pub title: String,
    pub tier: Tier,
    #[schema(example = 50)]
    pub price: u64,
    #[schema(example = "/items/K01")]
    pub endpoint: String,
    #[schema(example = "/items/K01/preview")]
    pub preview: String,
}

#[derive(Debug)]
pub struct CatalogStore {
    items: Vec<Arc<CatalogItem>>,
    index: HashMap<String, usize>,
}

impl CatalogStore {
    /// Build a store from items in listing order
    pub fn new(items: Vec<CatalogItem>) -> Result<Self, CatalogError> {
        if items.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut index = HashMap::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            if item.price == 0 {
                return Err(CatalogError::InvalidPrice(item.tier));
            }
            if index.insert(item.id.clone(), i).is_some() {
                return Err(CatalogError::Duplicate(item.id.clone()));
            }
        }
        Ok(Self {
            items: items.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    /// Load every manifest entry whose content file exists under `content_dir`.
    pub fn load(
        content_dir: &Path,
        manifest: &[ManifestEntry],
        prices: &PriceTable,
    ) -> Result<Self, CatalogError> {
        prices.validate()?;

        let mut items = Vec::with_capacity(manifest.len());
        for entry in manifest {
            let path = content_dir.join(&entry.file);
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(item = %entry.id, path = ?path, "Content file missing, item skipped");
                    continue;
                }
                Err(e) => return Err(CatalogError::Io { path, source: e }),
            };
            items.push(CatalogItem::new(
                &entry.id,
                &entry.title,
                entry.tier,
                prices.price(entry.tier),
                content,
            ));
        }

        let store = Self::new(items)?;
        tracing::info!(items = store.len(), dir = ?content_dir, "Catalog loaded");
        Ok(store)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<CatalogItem>, CatalogError> {
        let id = normalize_item_id(id);
        self.index
            .get(&id)
            .map(|&i| Arc::clone(&self.items[i]))
            .ok_or(CatalogError::NotFound(id))
    }

    pub fn preview(&self, id: &str) -> Result<String, CatalogError> {
        self.lookup(id).map(|item| item.preview.clone())
    }

    pub fn list(&self) -> Vec<CatalogEntry> {
        self.items
            .iter()
            .map(|item| CatalogEntry {
                id: item.id.clone(),
                title: item.title.clone(),
                tier: item.tier,
                price: item.price,
                endpoint: format!("/items/{}", item.id),
                preview: format!("/items/{}/preview", item.id),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
