use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error};

use crate::{
    category::Category,
    error::{BenefitsError, Result},
};

const EMBEDDED_CATALOG: &str = include_str!("../data/benefits.json");

/// A benefit offered under one of the fixed categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitRecord {
    pub id: String,
    pub category: Category,
    pub title: String,
    pub coverage: String,
    pub description: String,
}

/// Read-only access to the full list of benefits
#[async_trait]
pub trait BenefitCatalog: Send + Sync {
    /// Every record, in catalog order
    async fn fetch_all(&self) -> Result<Vec<BenefitRecord>>;
}

/// Parses and validates a catalog document (a JSON array of records)
pub fn parse_catalog(raw: &str) -> Result<Vec<BenefitRecord>> {
    let records: Vec<BenefitRecord> = serde_json::from_str(raw)
        .map_err(|e| BenefitsError::CatalogUnavailable(format!("malformed catalog: {}", e)))?;

    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if record.id.trim().is_empty() {
            return Err(BenefitsError::CatalogUnavailable(
                "record with empty id".to_string(),
            ));
        }
        if !seen.insert(record.id.as_str()) {
            return Err(BenefitsError::CatalogUnavailable(format!(
                "duplicate record id: {}",
                record.id
            )));
        }
    }

    Ok(records)
}

/// Catalog read from a JSON file on every fetch
pub struct FileBenefitCatalog {
    path: PathBuf,
}

impl FileBenefitCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl BenefitCatalog for FileBenefitCatalog {
    async fn fetch_all(&self) -> Result<Vec<BenefitRecord>> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!(path = %self.path.display(), error = %e, "Failed to read benefits catalog");
            BenefitsError::CatalogUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let records = parse_catalog(&raw)?;
        debug!(path = %self.path.display(), count = records.len(), "Loaded benefits catalog");
        Ok(records)
    }
}

/// Catalog held in memory
pub struct InMemoryBenefitCatalog {
    records: Vec<BenefitRecord>,
}

impl InMemoryBenefitCatalog {
    pub fn new(records: Vec<BenefitRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl BenefitCatalog for InMemoryBenefitCatalog {
    async fn fetch_all(&self) -> Result<Vec<BenefitRecord>> {
        Ok(self.records.clone())
    }
}

/// The sample catalog shipped with the crate
pub struct EmbeddedBenefitCatalog;

#[async_trait]
impl BenefitCatalog for EmbeddedBenefitCatalog {
    async fn fetch_all(&self) -> Result<Vec<BenefitRecord>> {
        parse_catalog(EMBEDDED_CATALOG)
    }
}
