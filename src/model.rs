/// Core data types for the tap water quality service.
///
/// This module defines the shared domain model imported by all other modules:
/// the contaminant rows read from the store, the per-provider report built
/// from them, the JSON envelope served at `/api/{zip}`, and the error type
/// for store faults. The only logic here is the two primitives every other
/// module leans on: `ratio_or_null` and `classify`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Envelope constants
// ---------------------------------------------------------------------------

/// `title` attached to every system envelope and error body.
pub const ENVELOPE_TITLE: &str = "information data";

/// `message` attached to successful envelopes.
pub const ENVELOPE_SUCCESS: &str = "success!";

// ---------------------------------------------------------------------------
// Store rows
// ---------------------------------------------------------------------------

/// One measured contaminant for one provider, as read from
/// `ewg_contaminant_details`.
///
/// Every optional field is genuinely optional in the source data:
///   - `legal_limit: None` means no legal limit exists for the contaminant.
///   - `measured_value: None` means the utility did not report a reading.
///   - `guideline_value: None` means there is no health-based guideline.
///   - `exceedance_ratio: None` means the source did not precompute one.
///
/// `provider_name` and `served_population` are provider metadata repeated on
/// every row; only the first row of a provider's group is consulted.
#[derive(Debug, Clone, PartialEq)]
pub struct ContaminantRecord {
    pub provider_id: String,
    pub code: String,
    pub name: Option<String>,
    pub health_effect: Option<String>,
    pub measured_value: Option<f64>,
    pub measurement_unit: Option<String>,
    pub legal_limit: Option<f64>,
    pub guideline_value: Option<f64>,
    pub exceedance_ratio: Option<f64>,
    pub provider_name: Option<String>,
    pub served_population: Option<i64>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Which list of a provider report a contaminant lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    /// Above the health guideline.
    #[serde(rename = "exceeds")]
    Exceeding,
    #[serde(rename = "others")]
    Other,
}

/// `a / b`, or `None` when either side is missing or `b` is zero.
pub fn ratio_or_null(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) if b != 0.0 => Some(a / b),
        _ => None,
    }
}

/// Classifies a row as exceeding or other.
///
/// A row exceeds when its measured value is strictly above a non-zero
/// guideline, or when the source supplied an exceedance ratio above 1. A zero
/// guideline carries no exceedance signal. The derived ratio is never
/// consulted here.
pub fn classify(record: &ContaminantRecord) -> Partition {
    let over_guideline = matches!(
        (record.measured_value, record.guideline_value),
        (Some(measured), Some(guideline)) if guideline != 0.0 && measured > guideline
    );
    let source_ratio_over = record.exceedance_ratio.is_some_and(|r| r > 1.0);

    if over_guideline || source_ratio_over {
        Partition::Exceeding
    } else {
        Partition::Other
    }
}

// ---------------------------------------------------------------------------
// Report types (serialized with the field names the frontend expects)
// ---------------------------------------------------------------------------

/// A contaminant as emitted inside a `ProviderReport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminantEntry {
    #[serde(rename = "ContaminantCode")]
    pub code: String,
    #[serde(rename = "ContaminantName")]
    pub name: Option<String>,
    #[serde(rename = "ContaminantEffect")]
    pub health_effect: Option<String>,
    #[serde(rename = "ContaminantDisplayUnits")]
    pub display_units: Option<String>,
    /// Not sourced; always null on the wire.
    #[serde(rename = "ContaminantUnits")]
    pub units: Option<String>,
    #[serde(rename = "SystemAverage")]
    pub system_average: Option<f64>,
    #[serde(rename = "ContaminantMCLValue")]
    pub legal_limit: Option<f64>,
    #[serde(rename = "ContaminantHGValue")]
    pub guideline: Option<f64>,
    /// Source-supplied ratio, else measured / guideline when computable.
    #[serde(rename = "contaminantOverLimitRatio", default)]
    pub over_limit_ratio: Option<f64>,
}

impl ContaminantEntry {
    /// Builds the emitted form of a store row, deriving the ratio when the
    /// source did not supply one.
    pub fn from_record(record: &ContaminantRecord) -> Self {
        ContaminantEntry {
            code: record.code.clone(),
            name: record.name.clone(),
            health_effect: record.health_effect.clone(),
            display_units: record.measurement_unit.clone(),
            units: None,
            system_average: record.measured_value,
            legal_limit: record.legal_limit,
            guideline: record.guideline_value,
            over_limit_ratio: record
                .exceedance_ratio
                .or_else(|| ratio_or_null(record.measured_value, record.guideline_value)),
        }
    }

    /// The legal limit, if one exists. Negative values in the source mean
    /// "no limit" and are hidden.
    pub fn effective_legal_limit(&self) -> Option<f64> {
        self.legal_limit.filter(|limit| *limit >= 0.0)
    }

    /// Unit label for display, empty when unknown.
    pub fn unit_label(&self) -> &str {
        self.display_units
            .as_deref()
            .or(self.units.as_deref())
            .unwrap_or("")
    }
}

/// The aggregated view of one water provider (PWS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderReport {
    #[serde(rename = "PWS")]
    pub provider_id: String,
    #[serde(rename = "Systemname")]
    pub provider_name: Option<String>,
    #[serde(rename = "Population")]
    pub population: Option<i64>,
    #[serde(rename = "exceedsList")]
    pub exceeding: Vec<ContaminantEntry>,
    #[serde(rename = "othersList")]
    pub other: Vec<ContaminantEntry>,
    #[serde(rename = "totalContaminantsCount")]
    pub exceeding_count: usize,
    #[serde(rename = "totalAllCount")]
    pub total_count: usize,
    /// Reserved; always zero.
    #[serde(rename = "waterdropCount", default)]
    pub waterdrop_count: u32,
}

impl ProviderReport {
    /// Name shown for the provider, falling back to its PWS id.
    pub fn display_name(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(&self.provider_id)
    }

    /// Fraction of detected contaminants above guideline, in [0, 1].
    pub fn exceeding_share(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.exceeding_count as f64 / self.total_count as f64
        }
    }

    pub fn partition(&self, partition: Partition) -> &[ContaminantEntry] {
        match partition {
            Partition::Exceeding => &self.exceeding,
            Partition::Other => &self.other,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP envelope
// ---------------------------------------------------------------------------

/// One element of `systems` in the `/api/{zip}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEnvelope {
    pub title: String,
    pub message: String,
    pub information: ProviderReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub message: String,
    pub count: usize,
    /// ISO 8601, e.g. "2024-05-01T13:00:00.000Z".
    pub generated_at: String,
}

/// Body of a successful `/api/{zip}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub zip: String,
    pub systems: Vec<SystemEnvelope>,
    pub meta: ResponseMeta,
}

impl ApiResponse {
    pub fn providers(&self) -> impl Iterator<Item = &ProviderReport> {
        self.systems.iter().map(|s| &s.information)
    }
}

/// Body of a failed `/api/{zip}` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub title: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            title: ENVELOPE_TITLE.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised by the backing store. Any of these aborts the whole lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSourceError {
    /// The store could not be reached.
    Connection(String),
    /// A query was rejected or failed while executing.
    Query(String),
    /// A returned row did not have the expected shape.
    Decode(String),
    /// Required tables are missing.
    Schema(String),
}

impl DataSourceError {
    /// The underlying message, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            DataSourceError::Connection(msg)
            | DataSourceError::Query(msg)
            | DataSourceError::Decode(msg)
            | DataSourceError::Schema(msg) => msg,
        }
    }
}

impl std::fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceError::Connection(msg) => write!(f, "Connection error: {}", msg),
            DataSourceError::Query(msg) => write!(f, "Query error: {}", msg),
            DataSourceError::Decode(msg) => write!(f, "Decode error: {}", msg),
            DataSourceError::Schema(msg) => write!(f, "Schema error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

impl From<postgres::Error> for DataSourceError {
    fn from(err: postgres::Error) -> Self {
        if err.is_closed() {
            DataSourceError::Connection(err.to_string())
        } else {
            DataSourceError::Query(err.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
