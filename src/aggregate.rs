//! ZIP lookup: providers serving a postal code, joined with their
//! contaminant rows and split into exceeding / other lists.
//!
//! The lookup is a strict two-step pipeline against the store: resolve
//! providers, then fetch every row for those providers in one batch. No
//! state survives between calls, so the result may be cached externally on
//! the normalized ZIP.
//!
//! # Clock injection
//! `build_report_at` takes the generation timestamp as a parameter so tests
//! can pin it. `build_report` is the convenience wrapper using `Utc::now()`.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::logging;
use crate::model::{
    ApiResponse, ContaminantEntry, ContaminantRecord, DataSourceError, Partition,
    ProviderReport, ResponseMeta, SystemEnvelope, ENVELOPE_SUCCESS, ENVELOPE_TITLE, classify,
};
use crate::store::WaterQualityStore;
use crate::zip::PostalCode;

// ---------------------------------------------------------------------------
// Result type
// ---------------------------------------------------------------------------

/// Everything known about one postal code at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct ZipReport {
    pub zip: PostalCode,
    /// In the order the providers were resolved.
    pub providers: Vec<ProviderReport>,
    pub generated_at: DateTime<Utc>,
}

impl ZipReport {
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// The `/api/{zip}` response body for this report.
    pub fn into_response(self) -> ApiResponse {
        let count = self.providers.len();
        let systems = self
            .providers
            .into_iter()
            .map(|information| SystemEnvelope {
                title: ENVELOPE_TITLE.to_string(),
                message: ENVELOPE_SUCCESS.to_string(),
                information,
            })
            .collect();

        ApiResponse {
            zip: self.zip.as_str().to_string(),
            systems,
            meta: ResponseMeta {
                message: ENVELOPE_SUCCESS.to_string(),
                count,
                generated_at: self.generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Builds the report for `raw_zip` as of `now`.
///
/// An unmapped ZIP is a success with no providers. A store fault aborts the
/// whole lookup; no partial report is returned.
pub fn build_report_at<S: WaterQualityStore + ?Sized>(
    store: &S,
    raw_zip: &str,
    now: DateTime<Utc>,
) -> Result<ZipReport, DataSourceError> {
    let zip = PostalCode::normalize(raw_zip);

    let provider_ids = store
        .providers_for_zip(&zip)
        .map(dedup_providers)
        .inspect_err(|e| logging::log_store_failure(zip.as_str(), "provider lookup", e))?;

    if provider_ids.is_empty() {
        logging::log_report_summary(zip.as_str(), 0, 0, 0);
        return Ok(ZipReport {
            zip,
            providers: Vec::new(),
            generated_at: now,
        });
    }

    let rows = store
        .contaminants_for_providers(&provider_ids)
        .inspect_err(|e| logging::log_store_failure(zip.as_str(), "contaminant fetch", e))?;

    let mut groups = group_by_provider(rows);
    let providers: Vec<ProviderReport> = provider_ids
        .into_iter()
        .map(|id| {
            let rows = groups.remove(&id).unwrap_or_default();
            build_provider_report(id, &rows)
        })
        .collect();

    logging::log_report_summary(
        zip.as_str(),
        providers.len(),
        providers.iter().map(|p| p.total_count).sum(),
        providers.iter().map(|p| p.exceeding_count).sum(),
    );

    Ok(ZipReport {
        zip,
        providers,
        generated_at: now,
    })
}

/// Convenience wrapper that stamps the report with the real current time.
/// Use `build_report_at` in tests to keep them deterministic.
pub fn build_report<S: WaterQualityStore + ?Sized>(
    store: &S,
    raw_zip: &str,
) -> Result<ZipReport, DataSourceError> {
    build_report_at(store, raw_zip, Utc::now())
}

// ---------------------------------------------------------------------------
// Grouping and classification
// ---------------------------------------------------------------------------

/// Drops empty and repeated ids, keeping the first occurrence of each.
fn dedup_providers(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Groups rows by provider id, keeping each group in fetch order.
pub fn group_by_provider(rows: Vec<ContaminantRecord>) -> HashMap<String, Vec<ContaminantRecord>> {
    let mut groups: HashMap<String, Vec<ContaminantRecord>> = HashMap::new();
    for row in rows {
        groups.entry(row.provider_id.clone()).or_default().push(row);
    }
    groups
}

/// Splits one provider's rows into exceeding / other and fills in the
/// provider metadata from the first row.
pub fn build_provider_report(provider_id: String, rows: &[ContaminantRecord]) -> ProviderReport {
    let mut exceeding = Vec::new();
    let mut other = Vec::new();

    for row in rows {
        let entry = ContaminantEntry::from_record(row);
        match classify(row) {
            Partition::Exceeding => exceeding.push(entry),
            Partition::Other => other.push(entry),
        }
    }

    let first = rows.first();
    let exceeding_count = exceeding.len();
    let total_count = exceeding_count + other.len();

    ProviderReport {
        provider_id,
        provider_name: first.and_then(|r| r.provider_name.clone()),
        population: first.and_then(|r| r.served_population),
        exceeding,
        other,
        exceeding_count,
        total_count,
        waterdrop_count: 0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    /// A fixed "now" used across all tests: 2024-05-01 13:00:00 UTC.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    fn row(provider: &str, name: &str, measured: Option<f64>, guideline: Option<f64>) -> ContaminantRecord {
        ContaminantRecord {
            provider_id: provider.to_string(),
            code: format!("{}-{}", provider, name),
            name: Some(name.to_string()),
            health_effect: None,
            measured_value: measured,
            measurement_unit: Some("ppb".to_string()),
            legal_limit: None,
            guideline_value: guideline,
            exceedance_ratio: None,
            provider_name: Some(format!("{} Water Co", provider)),
            served_population: Some(10_000),
        }
    }

    fn phoenix_store() -> MemoryStore {
        let mut lead = row("AZ001", "Lead", Some(12.0), Some(1.0));
        lead.legal_limit = Some(15.0);
        MemoryStore::new()
            .with_service_area("85001", "AZ001")
            .with_service_area("85001", "AZ002")
            .with_contaminant(lead)
            .with_contaminant(row("AZ002", "Nitrate", Some(0.5), Some(1.0)))
    }

    // --- Scenarios ----------------------------------------------------------

    #[test]
    fn test_phoenix_zip_splits_providers_and_partitions() {
        let report = build_report_at(&phoenix_store(), "85001", fixed_now()).unwrap();

        assert_eq!(report.provider_count(), 2);
        let az001 = &report.providers[0];
        let az002 = &report.providers[1];

        assert_eq!(az001.provider_id, "AZ001");
        assert_eq!(az001.exceeding.len(), 1);
        assert_eq!(az001.exceeding[0].over_limit_ratio, Some(12.0));
        assert_eq!(az001.total_count, 1);

        assert_eq!(az002.provider_id, "AZ002");
        assert_eq!(az002.other.len(), 1);
        assert_eq!(az002.other[0].over_limit_ratio, Some(0.5));
        assert_eq!(az002.total_count, 1);
    }

    #[test]
    fn test_unmapped_zip_is_empty_success() {
        let report = build_report_at(&phoenix_store(), "10001", fixed_now()).unwrap();
        assert!(report.providers.is_empty());
        assert_eq!(report.into_response().meta.count, 0);
    }

    #[test]
    fn test_short_zip_is_normalized_before_lookup() {
        let store = MemoryStore::new()
            .with_service_area("00850", "PR001")
            .with_contaminant(row("PR001", "Arsenic", Some(2.0), Some(0.004)));
        let report = build_report_at(&store, "850", fixed_now()).unwrap();
        assert_eq!(report.zip.as_str(), "00850");
        assert_eq!(report.provider_count(), 1);
    }

    #[test]
    fn test_provider_without_rows_has_null_metadata() {
        let store = MemoryStore::new().with_service_area("85001", "AZ404");
        let report = build_report_at(&store, "85001", fixed_now()).unwrap();

        let provider = &report.providers[0];
        assert_eq!(provider.provider_name, None);
        assert_eq!(provider.population, None);
        assert_eq!(provider.total_count, 0);
        assert_eq!(provider.exceeding_count, 0);
    }

    #[test]
    fn test_duplicate_mappings_are_collapsed() {
        let store = phoenix_store()
            .with_service_area("85001", "AZ001")
            .with_service_area("85001", "");
        let report = build_report_at(&store, "85001", fixed_now()).unwrap();
        let ids: Vec<_> = report.providers.iter().map(|p| p.provider_id.as_str()).collect();
        assert_eq!(ids, vec!["AZ001", "AZ002"]);
    }

    // --- Provider report ----------------------------------------------------

    #[test]
    fn test_metadata_comes_from_first_row() {
        let mut first = row("AZ001", "Lead", Some(1.0), Some(2.0));
        first.provider_name = Some("City of Phoenix".to_string());
        first.served_population = Some(1_600_000);
        let mut second = row("AZ001", "Arsenic", Some(1.0), Some(2.0));
        second.provider_name = Some("something else".to_string());

        let report = build_provider_report("AZ001".to_string(), &[first, second]);
        assert_eq!(report.provider_name.as_deref(), Some("City of Phoenix"));
        assert_eq!(report.population, Some(1_600_000));
    }

    #[test]
    fn test_counts_cover_every_row() {
        let rows = vec![
            row("AZ001", "Lead", Some(12.0), Some(1.0)),
            row("AZ001", "Arsenic", Some(0.1), Some(1.0)),
            row("AZ001", "Radium", None, Some(1.0)),
            row("AZ001", "Nitrate", Some(5.0), Some(0.0)),
        ];
        let report = build_provider_report("AZ001".to_string(), &rows);

        assert_eq!(report.exceeding_count, report.exceeding.len());
        assert_eq!(report.exceeding_count + report.other.len(), report.total_count);
        assert_eq!(report.total_count, rows.len());
        assert_eq!(report.exceeding_count, 1);
        assert_eq!(report.waterdrop_count, 0);
    }

    #[test]
    fn test_classification_is_deterministic_across_runs() {
        let rows = vec![
            row("AZ001", "Lead", Some(12.0), Some(1.0)),
            row("AZ001", "Arsenic", Some(0.1), Some(1.0)),
            row("AZ001", "Chromium", Some(3.0), Some(0.02)),
        ];
        let a = build_provider_report("AZ001".to_string(), &rows);
        let b = build_provider_report("AZ001".to_string(), &rows);
        assert_eq!(a, b);
    }

    // --- Response envelope --------------------------------------------------

    #[test]
    fn test_response_envelope_shape() {
        let response = build_report_at(&phoenix_store(), "85001", fixed_now())
            .unwrap()
            .into_response();

        assert_eq!(response.zip, "85001");
        assert_eq!(response.meta.count, 2);
        assert_eq!(response.meta.message, "success!");
        assert_eq!(response.meta.generated_at, "2024-05-01T13:00:00.000Z");
        assert!(response.systems.iter().all(|s| s.title == "information data"));
    }
}
