/// Read-only access to the water quality data.
///
/// The aggregation layer only ever asks two questions of its store: which
/// providers serve a postal code, and what contaminant rows exist for a set of
/// providers. Classification and ratio derivation never happen here.
///
/// `db::PgStore` answers from PostgreSQL; `MemoryStore` answers from rows held
/// in memory and backs fixture mode and the tests.

use crate::model::{ContaminantRecord, DataSourceError};
use crate::zip::PostalCode;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

pub trait WaterQualityStore: Send + Sync {
    /// Provider ids mapped to `zip`. May contain duplicates; order is not
    /// meaningful.
    fn providers_for_zip(&self, zip: &PostalCode) -> Result<Vec<String>, DataSourceError>;

    /// Every contaminant row for any of `provider_ids`, fetched in one batch.
    fn contaminants_for_providers(
        &self,
        provider_ids: &[String],
    ) -> Result<Vec<ContaminantRecord>, DataSourceError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A store over rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    service_areas: Vec<(String, String)>,
    contaminants: Vec<ContaminantRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `provider_id` to `zip`. The ZIP is normalized on insert so that
    /// lookups line up with `PostalCode` keys.
    pub fn add_service_area(&mut self, zip: &str, provider_id: &str) {
        self.service_areas.push((
            PostalCode::normalize(zip).as_str().to_string(),
            provider_id.to_string(),
        ));
    }

    pub fn add_contaminant(&mut self, record: ContaminantRecord) {
        self.contaminants.push(record);
    }

    pub fn with_service_area(mut self, zip: &str, provider_id: &str) -> Self {
        self.add_service_area(zip, provider_id);
        self
    }

    pub fn with_contaminant(mut self, record: ContaminantRecord) -> Self {
        self.add_contaminant(record);
        self
    }

    pub fn service_area_count(&self) -> usize {
        self.service_areas.len()
    }

    pub fn contaminant_count(&self) -> usize {
        self.contaminants.len()
    }
}

impl WaterQualityStore for MemoryStore {
    fn providers_for_zip(&self, zip: &PostalCode) -> Result<Vec<String>, DataSourceError> {
        Ok(self
            .service_areas
            .iter()
            .filter(|(area_zip, _)| area_zip == zip.as_str())
            .map(|(_, provider)| provider.clone())
            .collect())
    }

    fn contaminants_for_providers(
        &self,
        provider_ids: &[String],
    ) -> Result<Vec<ContaminantRecord>, DataSourceError> {
        Ok(self
            .contaminants
            .iter()
            .filter(|row| provider_ids.contains(&row.provider_id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
