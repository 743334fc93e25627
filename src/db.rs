/// PostgreSQL-backed store.
///
/// Reads the two tables described in `sql/001_base_schema.sql`:
///   - `ewg_zip_pwsids`: postal code to PWS id mapping
///   - `ewg_contaminant_details`: one row per (PWS, contaminant)
///
/// The `postgres` client is synchronous and not `Sync`, so a single
/// connection is opened at startup and shared behind a `Mutex`. Callers on
/// an async runtime must go through `spawn_blocking`. A connection found
/// closed is reopened before the next query; failed queries are not retried.

use std::sync::Mutex;

use postgres::{Client, NoTls, Row};

use crate::logging::{self, Component};
use crate::model::{ContaminantRecord, DataSourceError};
use crate::store::WaterQualityStore;
use crate::zip::PostalCode;

/// Tables the service reads from.
pub const REQUIRED_TABLES: &[&str] = &["ewg_zip_pwsids", "ewg_contaminant_details"];

const PROVIDERS_FOR_ZIP: &str = "
    SELECT DISTINCT pwsid
    FROM ewg_zip_pwsids
    WHERE zip_code = $1
      AND pwsid IS NOT NULL
";

const CONTAMINANTS_FOR_PROVIDERS: &str = "
    SELECT
        pwsid,
        code,
        name,
        potential_effect,
        this_utility_value,
        this_utility_unit,
        legal_limit_value,
        ewg_guideline_value,
        times_above_ewg,
        utility_name,
        serves_population
    FROM ewg_contaminant_details
    WHERE pwsid = ANY($1)
";

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

pub struct PgStore {
    database_url: String,
    client: Mutex<Client>,
}

fn open(database_url: &str) -> Result<Client, DataSourceError> {
    Client::connect(database_url, NoTls).map_err(|e| DataSourceError::Connection(e.to_string()))
}

impl PgStore {
    /// Opens a connection to `database_url`.
    pub fn connect(database_url: &str) -> Result<Self, DataSourceError> {
        let client = open(database_url)?;
        Ok(PgStore {
            database_url: database_url.to_string(),
            client: Mutex::new(client),
        })
    }

    /// Opens a connection and checks that every table in `tables` exists in
    /// the `public` schema.
    pub fn connect_and_verify(database_url: &str, tables: &[&str]) -> Result<Self, DataSourceError> {
        let store = Self::connect(database_url)?;
        let missing = store.missing_tables(tables)?;
        if !missing.is_empty() {
            return Err(DataSourceError::Schema(format!(
                "missing table(s): {}. Apply sql/001_base_schema.sql",
                missing.join(", ")
            )));
        }
        Ok(store)
    }

    fn missing_tables(&self, tables: &[&str]) -> Result<Vec<String>, DataSourceError> {
        let wanted: Vec<String> = tables.iter().map(|t| t.to_string()).collect();
        let rows = self.with_client(|client| {
            client.query(
                "SELECT table_name::text
                 FROM information_schema.tables
                 WHERE table_schema = 'public'
                   AND table_name = ANY($1)",
                &[&wanted],
            )
        })?;

        let present: Vec<String> = rows
            .iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<_, _>>()
            .map_err(|e| DataSourceError::Decode(e.to_string()))?;

        Ok(wanted.into_iter().filter(|t| !present.contains(t)).collect())
    }

    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Client) -> Result<T, postgres::Error>,
    ) -> Result<T, DataSourceError> {
        let mut client = self
            .client
            .lock()
            .map_err(|_| DataSourceError::Connection("database client lock poisoned".to_string()))?;
        if client.is_closed() {
            logging::warn(Component::Database, None, "connection closed, reconnecting");
            *client = open(&self.database_url)?;
            logging::info(Component::Database, None, "reconnected");
        }
        f(&mut *client).map_err(DataSourceError::from)
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn decode_contaminant(row: &Row) -> Result<ContaminantRecord, postgres::Error> {
    Ok(ContaminantRecord {
        provider_id: row.try_get("pwsid")?,
        code: row.try_get::<_, Option<String>>("code")?.unwrap_or_default(),
        name: row.try_get("name")?,
        health_effect: row.try_get("potential_effect")?,
        measured_value: row.try_get("this_utility_value")?,
        measurement_unit: row.try_get("this_utility_unit")?,
        legal_limit: row.try_get("legal_limit_value")?,
        guideline_value: row.try_get("ewg_guideline_value")?,
        exceedance_ratio: row.try_get("times_above_ewg")?,
        provider_name: row.try_get("utility_name")?,
        served_population: row.try_get("serves_population")?,
    })
}

// ---------------------------------------------------------------------------
// Store implementation
// ---------------------------------------------------------------------------

impl WaterQualityStore for PgStore {
    fn providers_for_zip(&self, zip: &PostalCode) -> Result<Vec<String>, DataSourceError> {
        let rows = self.with_client(|client| client.query(PROVIDERS_FOR_ZIP, &[&zip.as_str()]))?;
        rows.iter()
            .map(|row| row.try_get::<_, String>(0))
            .collect::<Result<_, _>>()
            .map_err(|e| DataSourceError::Decode(e.to_string()))
    }

    fn contaminants_for_providers(
        &self,
        provider_ids: &[String],
    ) -> Result<Vec<ContaminantRecord>, DataSourceError> {
        let ids = provider_ids.to_vec();
        let rows = self.with_client(|client| client.query(CONTAMINANTS_FOR_PROVIDERS, &[&ids]))?;
        rows.iter()
            .map(decode_contaminant)
            .collect::<Result<_, _>>()
            .map_err(|e| DataSourceError::Decode(e.to_string()))
    }
}
