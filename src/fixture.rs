/// Fixture mode: serve ZIP lookups from a TOML file instead of PostgreSQL.
///
/// Useful for development and demos when no database is available. The file
/// lists service areas and contaminant rows using the same column names as
/// the database tables:
///
/// ```toml
/// [[service_area]]
/// zip_code = "85001"
/// pwsid = "AZ001"
///
/// [[contaminant]]
/// pwsid = "AZ001"
/// code = "1030"
/// name = "Lead"
/// this_utility_value = 12.0
/// ewg_guideline_value = 1.0
/// legal_limit_value = 15.0
/// utility_name = "Phoenix Water Services"
/// serves_population = 1600000
/// ```

use serde::Deserialize;
use std::path::Path;

use crate::config::ConfigError;
use crate::logging::{self, Component};
use crate::model::ContaminantRecord;
use crate::store::MemoryStore;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    service_area: Vec<ServiceAreaRow>,
    #[serde(default)]
    contaminant: Vec<ContaminantRow>,
}

#[derive(Debug, Deserialize)]
struct ServiceAreaRow {
    zip_code: String,
    pwsid: String,
}

#[derive(Debug, Deserialize)]
struct ContaminantRow {
    pwsid: String,
    code: Option<String>,
    name: Option<String>,
    potential_effect: Option<String>,
    this_utility_value: Option<f64>,
    this_utility_unit: Option<String>,
    legal_limit_value: Option<f64>,
    ewg_guideline_value: Option<f64>,
    times_above_ewg: Option<f64>,
    utility_name: Option<String>,
    serves_population: Option<i64>,
}

impl From<ContaminantRow> for ContaminantRecord {
    fn from(row: ContaminantRow) -> Self {
        ContaminantRecord {
            provider_id: row.pwsid,
            code: row.code.unwrap_or_default(),
            name: row.name,
            health_effect: row.potential_effect,
            measured_value: row.this_utility_value,
            measurement_unit: row.this_utility_unit,
            legal_limit: row.legal_limit_value,
            guideline_value: row.ewg_guideline_value,
            exceedance_ratio: row.times_above_ewg,
            provider_name: row.utility_name,
            served_population: row.serves_population,
        }
    }
}

/// Parses a fixture document into a store.
pub fn parse_fixture(text: &str) -> Result<MemoryStore, ConfigError> {
    let file: FixtureFile = toml::from_str(text)?;
    let mut store = MemoryStore::new();

    for area in file.service_area {
        if area.pwsid.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "service_area for zip '{}' has an empty pwsid",
                area.zip_code
            )));
        }
        store.add_service_area(&area.zip_code, &area.pwsid);
    }
    for row in file.contaminant {
        store.add_contaminant(row.into());
    }

    Ok(store)
}

/// Loads the fixture file at `path`.
pub fn load_fixture(path: impl AsRef<Path>) -> Result<MemoryStore, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let store = parse_fixture(&text)?;

    logging::info(
        Component::Fixture,
        None,
        &format!(
            "Loaded {} service area(s) and {} contaminant row(s) from {}",
            store.service_area_count(),
            store.contaminant_count(),
            path.display()
        ),
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WaterQualityStore;
    use crate::zip::PostalCode;

    const SAMPLE: &str = r#"
        [[service_area]]
        zip_code = "85001"
        pwsid = "AZ001"

        [[service_area]]
        zip_code = "850"
        pwsid = "PR001"

        [[contaminant]]
        pwsid = "AZ001"
        code = "1030"
        name = "Lead"
        this_utility_value = 12.0
        ewg_guideline_value = 1.0

        [[contaminant]]
        pwsid = "PR001"
        name = "Nitrate"
    "#;

    #[test]
    fn test_parse_fixture_loads_rows() {
        let store = parse_fixture(SAMPLE).expect("sample fixture should parse");
        assert_eq!(store.service_area_count(), 2);
        assert_eq!(store.contaminant_count(), 2);

        let providers = store.providers_for_zip(&PostalCode::normalize("00850")).unwrap();
        assert_eq!(providers, vec!["PR001".to_string()]);
    }

    #[test]
    fn test_missing_code_becomes_empty_string() {
        let store = parse_fixture(SAMPLE).unwrap();
        let rows = store.contaminants_for_providers(&["PR001".to_string()]).unwrap();
        assert_eq!(rows[0].code, "");
        assert_eq!(rows[0].measured_value, None);
    }

    #[test]
    fn test_empty_pwsid_is_rejected() {
        let result = parse_fixture("[[service_area]]\nzip_code = \"85001\"\npwsid = \" \"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bundled_fixture_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/arizona.toml");
        let store = load_fixture(path).expect("bundled fixture should load");
        assert!(store.service_area_count() > 0);
    }
}
