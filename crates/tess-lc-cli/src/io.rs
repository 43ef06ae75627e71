//! JSON file formats read and written by the CLI.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use tess_lc_signal::LightCurveBatch;

/// Light curves on a shared time axis.
///
/// `null` flux entries are missing samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightCurveFile {
    /// Shared, strictly increasing time axis.
    pub time: Vec<f64>,
    /// One row per object, each as long as `time`.
    pub flux: Vec<Vec<Option<f32>>>,
    /// Object identifiers (TIC ids); row numbers when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<u64>>,
    /// Class label per object; enables stratified splitting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<usize>>,
}

impl LightCurveFile {
    /// Validate and convert into a batch plus optional labels.
    pub fn into_batch(self) -> Result<(LightCurveBatch, Option<Vec<usize>>)> {
        let n = self.flux.len();
        let len = self.time.len();
        let mut flat = Vec::with_capacity(n * len);
        for (row, values) in self.flux.iter().enumerate() {
            if values.len() != len {
                bail!("flux row {row} has {} samples, time axis has {len}", values.len());
            }
            flat.extend(values.iter().map(|v| v.unwrap_or(f32::NAN)));
        }
        let flux = Array2::from_shape_vec((n, len), flat)?;
        let time = Array1::from(self.time);
        let batch = match self.ids {
            Some(ids) => LightCurveBatch::with_ids(time, flux, ids)?,
            None => LightCurveBatch::new(time, flux)?,
        };
        Ok((batch, self.labels))
    }
}

/// Latent vectors keyed by object id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentFile {
    /// Object identifier per row.
    pub ids: Vec<u64>,
    /// One latent vector per object.
    pub latent: Vec<Vec<f32>>,
}

impl LatentFile {
    /// Pair ids with the rows of `latent`.
    pub fn new(ids: Vec<u64>, latent: &Array2<f32>) -> Result<Self> {
        if ids.len() != latent.nrows() {
            bail!("{} ids for {} latent vectors", ids.len(), latent.nrows());
        }
        Ok(LatentFile {
            ids,
            latent: latent.rows().into_iter().map(|r| r.to_vec()).collect(),
        })
    }

    /// The latent space as an `[objects, dims]` matrix.
    pub fn to_array(&self) -> Result<Array2<f32>> {
        let n = self.latent.len();
        if self.ids.len() != n {
            bail!("{} ids for {n} latent vectors", self.ids.len());
        }
        let dims = self.latent.first().map_or(0, Vec::len);
        if let Some(row) = self.latent.iter().position(|r| r.len() != dims) {
            bail!("latent vector {row} has {} dimensions, expected {dims}", self.latent[row].len());
        }
        let flat: Vec<f32> = self.latent.iter().flatten().copied().collect();
        Ok(Array2::from_shape_vec((n, dims), flat)?)
    }
}

/// Deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Serialize to pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Print `value` as pretty JSON to stdout, or write it to `path`.
pub fn emit<T: Serialize + ?Sized>(path: Option<&Path>, value: &T) -> Result<()> {
    match path {
        Some(p) => write_json(p, value),
        None => {
            println!("{}", serde_json::to_string_pretty(value)?);
            Ok(())
        }
    }
}
