//! Tap water quality lookup by postal code.
//!
//! - `aggregate` joins provider service areas with contaminant rows and
//!   classifies each contaminant against its health guideline.
//! - `api` serves the result over HTTP.
//! - `view` / `render` / `client` make up the Report View used by the
//!   `explore` binary and the `/explore/{zip}` route.

pub mod aggregate;
pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod fixture;
pub mod logging;
pub mod model;
pub mod render;
pub mod store;
pub mod view;
pub mod zip;
