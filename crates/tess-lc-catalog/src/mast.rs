//! TIC queries against the MAST portal API.
//!
//! One blocking `POST` per object to the `invoke` endpoint with the
//! `Mast.Catalogs.Filtered.Tic` service filtered on `ID`. The first returned
//! row is used.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::record::TicRecord;
use crate::CatalogSource;

/// Default MAST `invoke` endpoint.
pub const MAST_INVOKE_URL: &str = "https://mast.stsci.edu/api/v0/invoke";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking MAST client.
#[derive(Debug, Clone)]
pub struct MastCatalog {
    url: String,
    client: reqwest::blocking::Client,
}

impl MastCatalog {
    /// Client for the public endpoint with [`DEFAULT_TIMEOUT`].
    pub fn new() -> CatalogResult<Self> {
        Self::with_endpoint(MAST_INVOKE_URL, DEFAULT_TIMEOUT)
    }

    /// Client for an arbitrary `invoke` endpoint.
    pub fn with_endpoint(url: &str, timeout: Duration) -> CatalogResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tess-lc/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(MastCatalog { url: url.trim_end_matches('/').to_string(), client })
    }

    /// Endpoint in use.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Request document for the filtered TIC service.
pub(crate) fn request_body(tic_id: u64) -> serde_json::Value {
    json!({
        "service": "Mast.Catalogs.Filtered.Tic",
        "format": "json",
        "params": {
            "columns": "ID,Teff,rad,mass,GAIAmag,d,objType",
            "filters": [{ "paramName": "ID", "values": [tic_id.to_string()] }]
        }
    })
}

#[derive(Debug, Deserialize)]
struct MastResponse {
    #[serde(default)]
    data: Vec<MastRow>,
}

#[derive(Debug, Deserialize)]
struct MastRow {
    #[serde(rename = "Teff", default)]
    teff: Option<f64>,
    #[serde(default)]
    rad: Option<f64>,
    #[serde(default)]
    mass: Option<f64>,
    #[serde(rename = "GAIAmag", default)]
    gaia_mag: Option<f64>,
    #[serde(default)]
    d: Option<f64>,
    #[serde(rename = "objType", default)]
    obj_type: Option<String>,
}

/// Decode an `invoke` response body into the record for `tic_id`.
pub(crate) fn parse_response(tic_id: u64, body: &str) -> CatalogResult<TicRecord> {
    let response: MastResponse = serde_json::from_str(body)?;
    let row = response.data.into_iter().next().ok_or(CatalogError::NotFound { tic_id })?;
    Ok(TicRecord {
        tic_id,
        teff: row.teff,
        radius: row.rad,
        mass: row.mass,
        gaia_mag: row.gaia_mag,
        distance: row.d,
        obj_type: row.obj_type,
    })
}

impl CatalogSource for MastCatalog {
    fn fetch(&self, tic_id: u64) -> CatalogResult<TicRecord> {
        let request = request_body(tic_id).to_string();
        debug!(tic_id, url = %self.url, "querying MAST");
        let response = self.client.post(&self.url).form(&[("request", request)]).send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CatalogError::ServerError { status: status.as_u16(), message });
        }
        let body = response.text()?;
        parse_response(tic_id, &body)
    }
}
