//! Report View: presents one provider report at a time with search, sort and
//! exceeding/other toggles that work purely on data already fetched.
//!
//! The interesting pieces are pure functions:
//!   - `severity_factor` / `SeverityTier::from_factor` / `meter_fraction`
//!     turn a contaminant's ratio fields into a display severity.
//!   - `derive_view` filters and sorts a report's two lists.
//!
//! `ReportView` holds the UI state around them and memoizes `derive_view` on
//! its inputs. Loads are tagged with a `LoadTicket`; a result carrying an
//! older ticket than the current one is dropped, so a slow response for a
//! previous ZIP can never overwrite the current one.

use std::cmp::Ordering;
use std::fmt;

use crate::client::ClientFetchError;
use crate::model::{ApiResponse, ContaminantEntry, Partition, ProviderReport};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity factors at or above this fill the meter.
pub const METER_FULL_SCALE: f64 = 10.0;

/// How many times over its guideline a contaminant is.
///
/// Uses the reported ratio when it is positive, otherwise measured / guideline
/// when the guideline is positive, otherwise 0.
pub fn severity_factor(entry: &ContaminantEntry) -> f64 {
    let factor = match (entry.over_limit_ratio, entry.system_average, entry.guideline) {
        (Some(ratio), _, _) if ratio > 0.0 => ratio,
        (_, Some(measured), Some(guideline)) if guideline > 0.0 => measured / guideline,
        _ => 0.0,
    };
    if factor.is_finite() { factor } else { 0.0 }
}

/// Display tier for a severity factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeverityTier {
    /// 10x the guideline or more
    Critical,
    /// 5x - 10x
    High,
    /// 2x - 5x
    Elevated,
    /// just over the guideline
    Mild,
    AtGuideline,
    /// no ratio available
    Neutral,
    BelowGuideline,
}

impl SeverityTier {
    pub fn from_factor(factor: f64) -> SeverityTier {
        if factor.is_nan() {
            SeverityTier::Neutral
        } else if factor >= 10.0 {
            SeverityTier::Critical
        } else if factor >= 5.0 {
            SeverityTier::High
        } else if factor >= 2.0 {
            SeverityTier::Elevated
        } else if factor > 1.0 {
            SeverityTier::Mild
        } else if factor == 1.0 {
            SeverityTier::AtGuideline
        } else if factor == 0.0 {
            SeverityTier::Neutral
        } else {
            SeverityTier::BelowGuideline
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeverityTier::Critical => "critical",
            SeverityTier::High => "high",
            SeverityTier::Elevated => "elevated",
            SeverityTier::Mild => "mild",
            SeverityTier::AtGuideline => "at guideline",
            SeverityTier::Neutral => "no ratio",
            SeverityTier::BelowGuideline => "below guideline",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Clamps `n` to [0, 1]; non-finite and negative values become 0.
pub fn clamp01(n: f64) -> f64 {
    if !n.is_finite() || n < 0.0 {
        0.0
    } else if n > 1.0 {
        1.0
    } else {
        n
    }
}

/// `n` in [0, 1] as a whole percentage.
pub fn percent(n: f64) -> u8 {
    (clamp01(n) * 100.0).round() as u8
}

/// How full the severity meter is, scaled against 10x the guideline.
pub fn meter_fraction(factor: f64) -> f64 {
    clamp01(factor / METER_FULL_SCALE)
}

// ---------------------------------------------------------------------------
// Derived view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    #[default]
    Severity,
    Name,
}

impl SortKey {
    pub fn parse(text: &str) -> Option<SortKey> {
        match text.trim().to_ascii_lowercase().as_str() {
            "severity" => Some(SortKey::Severity),
            "name" => Some(SortKey::Name),
            _ => None,
        }
    }
}

/// Parses a partition name as typed or passed in a query string.
pub fn parse_partition(text: &str) -> Option<Partition> {
    match text.trim().to_ascii_lowercase().as_str() {
        "exceeds" | "exceeding" => Some(Partition::Exceeding),
        "others" | "other" => Some(Partition::Other),
        _ => None,
    }
}

/// A contaminant with its severity worked out for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewItem {
    pub entry: ContaminantEntry,
    pub factor: f64,
    pub tier: SeverityTier,
    /// Meter fill as a whole percentage.
    pub meter_percent: u8,
}

impl ViewItem {
    fn new(entry: &ContaminantEntry) -> Self {
        let factor = severity_factor(entry);
        ViewItem {
            entry: entry.clone(),
            factor,
            tier: SeverityTier::from_factor(factor),
            meter_percent: percent(meter_fraction(factor)),
        }
    }
}

/// Both lists of one provider after filtering and sorting.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedView {
    pub exceeding: Vec<ViewItem>,
    pub other: Vec<ViewItem>,
}

impl DerivedView {
    pub fn list(&self, partition: Partition) -> &[ViewItem] {
        match partition {
            Partition::Exceeding => &self.exceeding,
            Partition::Other => &self.other,
        }
    }
}

/// True when `query` is blank or occurs, ignoring case, in the contaminant's
/// name or health effect.
pub fn matches_query(entry: &ContaminantEntry, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    [&entry.name, &entry.health_effect]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(&needle))
}

fn compare_items(sort: SortKey, a: &ViewItem, b: &ViewItem) -> Ordering {
    match sort {
        SortKey::Name => {
            let a_name = a.entry.name.as_deref().unwrap_or("").to_lowercase();
            let b_name = b.entry.name.as_deref().unwrap_or("").to_lowercase();
            a_name.cmp(&b_name)
        }
        SortKey::Severity => b.factor.total_cmp(&a.factor),
    }
}

fn derive_list(entries: &[ContaminantEntry], query: &str, sort: SortKey) -> Vec<ViewItem> {
    let mut items: Vec<ViewItem> = entries
        .iter()
        .filter(|entry| matches_query(entry, query))
        .map(ViewItem::new)
        .collect();
    // sort_by is stable: ties keep filter order
    items.sort_by(|a, b| compare_items(sort, a, b));
    items
}

/// Filters and sorts both lists of `report`.
pub fn derive_view(report: &ProviderReport, query: &str, sort: SortKey) -> DerivedView {
    DerivedView {
        exceeding: derive_list(report.partition(Partition::Exceeding), query, sort),
        other: derive_list(report.partition(Partition::Other), query, sort),
    }
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// Identifies one load started by `ReportView::begin_load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Loading,
    Failed(ClientFetchError),
    Loaded(ApiResponse),
}

/// What the view should show right now.
#[derive(Debug, PartialEq)]
pub enum Screen<'a> {
    /// Placeholder skeleton; no data yet.
    Loading,
    /// Terse failure notice; recover by entering another ZIP.
    Failed(&'a ClientFetchError),
    /// The ZIP is served by no provider.
    Empty,
    Report,
}

#[derive(Debug, Clone, PartialEq)]
struct MemoKey {
    generation: u64,
    active: usize,
    query: String,
    sort: SortKey,
}

#[derive(Debug)]
pub struct ReportView {
    zip: String,
    generation: u64,
    state: LoadState,
    active: usize,
    query: String,
    sort: SortKey,
    show: Partition,
    memo: Option<(MemoKey, DerivedView)>,
}

impl ReportView {
    /// A view with nothing loaded yet.
    pub fn new() -> Self {
        ReportView {
            zip: String::new(),
            generation: 0,
            state: LoadState::Loading,
            active: 0,
            query: String::new(),
            sort: SortKey::default(),
            show: Partition::Exceeding,
            memo: None,
        }
    }

    /// Starts loading `zip`. Any load still in flight becomes stale.
    pub fn begin_load(&mut self, zip: &str) -> LoadTicket {
        self.generation += 1;
        self.zip = zip.to_string();
        self.state = LoadState::Loading;
        self.memo = None;
        LoadTicket(self.generation)
    }

    /// Applies the outcome of the load identified by `ticket`. Returns
    /// `false` and leaves the view untouched if a newer load has started.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<ApiResponse, ClientFetchError>,
    ) -> bool {
        if ticket.0 != self.generation {
            return false;
        }
        self.state = match result {
            Ok(response) => {
                self.active = 0;
                LoadState::Loaded(response)
            }
            Err(e) => LoadState::Failed(e),
        };
        self.memo = None;
        true
    }

    pub fn zip(&self) -> &str {
        &self.zip
    }

    pub fn screen(&self) -> Screen<'_> {
        match &self.state {
            LoadState::Loading => Screen::Loading,
            LoadState::Failed(e) => Screen::Failed(e),
            LoadState::Loaded(response) if response.systems.is_empty() => Screen::Empty,
            LoadState::Loaded(_) => Screen::Report,
        }
    }

    pub fn response(&self) -> Option<&ApiResponse> {
        match &self.state {
            LoadState::Loaded(response) => Some(response),
            _ => None,
        }
    }

    pub fn providers(&self) -> Vec<&ProviderReport> {
        self.response().map(|r| r.providers().collect()).unwrap_or_default()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_report(&self) -> Option<&ProviderReport> {
        self.response()
            .and_then(|r| r.systems.get(self.active))
            .map(|s| &s.information)
    }

    /// Switches to provider `index`. Out-of-range indexes are ignored.
    pub fn select_provider(&mut self, index: usize) -> bool {
        let count = self.response().map(|r| r.systems.len()).unwrap_or(0);
        if index < count {
            self.active = index;
            true
        } else {
            false
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    pub fn showing(&self) -> Partition {
        self.show
    }

    pub fn show(&mut self, partition: Partition) {
        self.show = partition;
    }

    /// Filtered and sorted lists for the active provider, recomputed only
    /// when the loaded data, active provider, query or sort key changed.
    pub fn derived(&mut self) -> &DerivedView {
        let key = MemoKey {
            generation: self.generation,
            active: self.active,
            query: self.query.clone(),
            sort: self.sort,
        };
        let view = match self.memo.take() {
            Some((cached, view)) if cached == key => view,
            _ => self
                .active_report()
                .map(|report| derive_view(report, &self.query, self.sort))
                .unwrap_or_default(),
        };
        &self.memo.insert((key, view)).1
    }

    /// The list currently toggled on.
    pub fn visible(&mut self) -> &[ViewItem] {
        let show = self.show;
        self.derived().list(show)
    }
}

impl Default for ReportView {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResponseMeta, SystemEnvelope};

    fn entry(name: Option<&str>, effect: Option<&str>, ratio: Option<f64>) -> ContaminantEntry {
        ContaminantEntry {
            code: name.unwrap_or("").to_string(),
            name: name.map(String::from),
            health_effect: effect.map(String::from),
            display_units: Some("ppb".to_string()),
            units: None,
            system_average: None,
            legal_limit: None,
            guideline: None,
            over_limit_ratio: ratio,
        }
    }

    fn report(id: &str, exceeding: Vec<ContaminantEntry>, other: Vec<ContaminantEntry>) -> ProviderReport {
        ProviderReport {
            provider_id: id.to_string(),
            provider_name: Some(format!("{} Water", id)),
            population: Some(1000),
            exceeding_count: exceeding.len(),
            total_count: exceeding.len() + other.len(),
            exceeding,
            other,
            waterdrop_count: 0,
        }
    }

    fn response(zip: &str, reports: Vec<ProviderReport>) -> ApiResponse {
        ApiResponse {
            zip: zip.to_string(),
            meta: ResponseMeta {
                message: "success!".to_string(),
                count: reports.len(),
                generated_at: "2024-05-01T13:00:00.000Z".to_string(),
            },
            systems: reports
                .into_iter()
                .map(|information| SystemEnvelope {
                    title: "information data".to_string(),
                    message: "success!".to_string(),
                    information,
                })
                .collect(),
        }
    }

    // --- Severity factor ----------------------------------------------------

    #[test]
    fn test_factor_prefers_positive_ratio() {
        let mut e = entry(Some("Lead"), None, Some(12.0));
        e.system_average = Some(1.0);
        e.guideline = Some(1.0);
        assert_eq!(severity_factor(&e), 12.0);
    }

    #[test]
    fn test_factor_falls_back_to_measured_over_guideline() {
        let mut e = entry(Some("Lead"), None, Some(0.0));
        e.system_average = Some(6.0);
        e.guideline = Some(2.0);
        assert_eq!(severity_factor(&e), 3.0);
    }

    #[test]
    fn test_factor_is_zero_without_usable_guideline() {
        let mut e = entry(Some("Lead"), None, None);
        e.system_average = Some(6.0);
        assert_eq!(severity_factor(&e), 0.0);
        e.guideline = Some(0.0);
        assert_eq!(severity_factor(&e), 0.0);
        e.guideline = Some(-1.0);
        assert_eq!(severity_factor(&e), 0.0);
    }

    // --- Tiers --------------------------------------------------------------

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(SeverityTier::from_factor(25.0), SeverityTier::Critical);
        assert_eq!(SeverityTier::from_factor(10.0), SeverityTier::Critical);
        assert_eq!(SeverityTier::from_factor(9.99), SeverityTier::High);
        assert_eq!(SeverityTier::from_factor(5.0), SeverityTier::High);
        assert_eq!(SeverityTier::from_factor(2.0), SeverityTier::Elevated);
        assert_eq!(SeverityTier::from_factor(1.5), SeverityTier::Mild);
        assert_eq!(SeverityTier::from_factor(1.0), SeverityTier::AtGuideline);
        assert_eq!(SeverityTier::from_factor(0.0), SeverityTier::Neutral);
        assert_eq!(SeverityTier::from_factor(0.5), SeverityTier::BelowGuideline);
        assert_eq!(SeverityTier::from_factor(f64::NAN), SeverityTier::Neutral);
    }

    #[test]
    fn test_tier_is_pure() {
        let e = entry(Some("Arsenic"), None, Some(3.3));
        let first = SeverityTier::from_factor(severity_factor(&e));
        let second = SeverityTier::from_factor(severity_factor(&e));
        assert_eq!(first, second);
    }

    // --- Meter --------------------------------------------------------------

    #[test]
    fn test_meter_scales_against_ten_times_guideline() {
        assert_eq!(percent(meter_fraction(5.0)), 50);
        assert_eq!(percent(meter_fraction(12.0)), 100);
        assert_eq!(percent(meter_fraction(0.0)), 0);
        assert_eq!(percent(meter_fraction(-3.0)), 0);
        assert_eq!(percent(meter_fraction(f64::INFINITY)), 0);
    }

    // --- derive_view --------------------------------------------------------

    #[test]
    fn test_search_is_case_insensitive_over_name() {
        let r = report(
            "AZ001",
            vec![entry(Some("Lead"), None, Some(12.0)), entry(Some("Arsenic"), None, Some(3.0))],
            vec![],
        );
        let view = derive_view(&r, "lead", SortKey::Severity);
        assert_eq!(view.exceeding.len(), 1);
        assert_eq!(view.exceeding[0].entry.name.as_deref(), Some("Lead"));

        let view = derive_view(&r, "LEAD", SortKey::Severity);
        assert_eq!(view.exceeding.len(), 1);
    }

    #[test]
    fn test_search_matches_health_effect() {
        let r = report(
            "AZ001",
            vec![],
            vec![
                entry(Some("Nitrate"), Some("Cancer"), None),
                entry(Some("Fluoride"), None, None),
            ],
        );
        let view = derive_view(&r, "cancer", SortKey::Name);
        assert_eq!(view.other.len(), 1);
        assert_eq!(view.other[0].entry.name.as_deref(), Some("Nitrate"));
    }

    #[test]
    fn test_blank_query_keeps_everything() {
        let r = report("AZ001", vec![entry(Some("Lead"), None, None)], vec![entry(None, None, None)]);
        let view = derive_view(&r, "   ", SortKey::Severity);
        assert_eq!(view.exceeding.len(), 1);
        assert_eq!(view.other.len(), 1);
    }

    #[test]
    fn test_severity_sort_is_descending_and_stable() {
        let r = report(
            "AZ001",
            vec![
                entry(Some("A"), None, Some(2.0)),
                entry(Some("B"), None, Some(12.0)),
                entry(Some("C"), None, Some(2.0)),
                entry(Some("D"), None, None),
            ],
            vec![],
        );
        let view = derive_view(&r, "", SortKey::Severity);
        let names: Vec<_> = view.exceeding.iter().map(|i| i.entry.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_name_sort_puts_missing_names_first() {
        let r = report(
            "AZ001",
            vec![],
            vec![
                entry(Some("nitrate"), None, None),
                entry(Some("Arsenic"), None, None),
                entry(None, None, None),
            ],
        );
        let view = derive_view(&r, "", SortKey::Name);
        let names: Vec<_> = view.other.iter().map(|i| i.entry.name.clone()).collect();
        assert_eq!(
            names,
            vec![None, Some("Arsenic".to_string()), Some("nitrate".to_string())]
        );
    }

    // --- ReportView state ---------------------------------------------------

    #[test]
    fn test_defaults() {
        let view = ReportView::new();
        assert_eq!(view.screen(), Screen::Loading);
        assert_eq!(view.sort(), SortKey::Severity);
        assert_eq!(view.showing(), Partition::Exceeding);
        assert_eq!(view.query(), "");
        assert_eq!(view.active_index(), 0);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut view = ReportView::new();
        let first = view.begin_load("85001");
        let second = view.begin_load("85281");

        let applied = view.finish_load(first, Ok(response("85001", vec![report("AZ001", vec![], vec![])])));
        assert!(!applied, "response for the earlier ZIP must not be applied");
        assert_eq!(view.screen(), Screen::Loading);

        assert!(view.finish_load(second, Ok(response("85281", vec![report("AZ003", vec![], vec![])]))));
        assert_eq!(view.active_report().unwrap().provider_id, "AZ003");
    }

    #[test]
    fn test_new_load_resets_active_provider() {
        let mut view = ReportView::new();
        let t = view.begin_load("85001");
        view.finish_load(
            t,
            Ok(response("85001", vec![report("AZ001", vec![], vec![]), report("AZ002", vec![], vec![])])),
        );
        assert!(view.select_provider(1));
        assert_eq!(view.active_report().unwrap().provider_id, "AZ002");

        let t = view.begin_load("85001");
        view.finish_load(
            t,
            Ok(response("85001", vec![report("AZ001", vec![], vec![]), report("AZ002", vec![], vec![])])),
        );
        assert_eq!(view.active_index(), 0);
    }

    #[test]
    fn test_out_of_range_provider_is_ignored() {
        let mut view = ReportView::new();
        let t = view.begin_load("85001");
        view.finish_load(t, Ok(response("85001", vec![report("AZ001", vec![], vec![])])));
        assert!(!view.select_provider(3));
        assert_eq!(view.active_index(), 0);
    }

    #[test]
    fn test_empty_and_failed_screens() {
        let mut view = ReportView::new();
        let t = view.begin_load("99999");
        view.finish_load(t, Ok(response("99999", vec![])));
        assert_eq!(view.screen(), Screen::Empty);

        let t = view.begin_load("85001");
        view.finish_load(t, Err(ClientFetchError::Transport("connection refused".to_string())));
        assert!(matches!(view.screen(), Screen::Failed(_)));
    }

    #[test]
    fn test_derived_view_follows_query_and_toggle() {
        let mut view = ReportView::new();
        let t = view.begin_load("85001");
        view.finish_load(
            t,
            Ok(response(
                "85001",
                vec![report(
                    "AZ001",
                    vec![entry(Some("Lead"), None, Some(12.0)), entry(Some("Arsenic"), None, Some(3.0))],
                    vec![entry(Some("Fluoride"), None, Some(0.2))],
                )],
            )),
        );

        assert_eq!(view.visible().len(), 2);
        view.set_query("lead");
        assert_eq!(view.visible().len(), 1);
        view.show(Partition::Other);
        assert_eq!(view.visible().len(), 0);
        view.set_query("");
        assert_eq!(view.visible().len(), 1);
    }

    #[test]
    fn test_parsers() {
        assert_eq!(SortKey::parse("Name"), Some(SortKey::Name));
        assert_eq!(SortKey::parse("severity"), Some(SortKey::Severity));
        assert_eq!(SortKey::parse("size"), None);
        assert_eq!(parse_partition("exceeds"), Some(Partition::Exceeding));
        assert_eq!(parse_partition("others"), Some(Partition::Other));
        assert_eq!(parse_partition("all"), None);
    }
}
