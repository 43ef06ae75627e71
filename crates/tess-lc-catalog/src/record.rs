//! Catalog record and its plot-title rendering.

use serde::{Deserialize, Serialize};

/// The TIC columns used for annotation. Missing catalog values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicRecord {
    /// TIC identifier.
    pub tic_id: u64,
    /// Effective temperature (K).
    pub teff: Option<f64>,
    /// Stellar radius (solar radii).
    pub radius: Option<f64>,
    /// Stellar mass (solar masses).
    pub mass: Option<f64>,
    /// Gaia G magnitude.
    pub gaia_mag: Option<f64>,
    /// Distance (pc).
    pub distance: Option<f64>,
    /// Object type, e.g. `"STAR"`.
    pub obj_type: Option<String>,
}

impl TicRecord {
    /// A record with every value missing.
    pub fn empty(tic_id: u64) -> Self {
        TicRecord { tic_id, ..Default::default() }
    }

    /// Two-line plot title:
    /// `T_eff:{teff},{type}, G: {gaia}\n Dist: {d}, R:{radius} M:{mass}`.
    ///
    /// Temperature is rounded to whole kelvin, distance to one decimal, the
    /// rest to two. Missing values render as `--`.
    pub fn title(&self) -> String {
        format!(
            "T_eff:{},{}, G: {}\n Dist: {}, R:{} M:{}",
            fmt_rounded(self.teff, 0),
            self.obj_type.as_deref().unwrap_or("--"),
            fmt_rounded(self.gaia_mag, 2),
            fmt_rounded(self.distance, 1),
            fmt_rounded(self.radius, 2),
            fmt_rounded(self.mass, 2),
        )
    }
}

/// Round to `decimals` places; integral results keep one decimal (`5800.0`).
fn fmt_rounded(value: Option<f64>, decimals: i32) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let scale = 10f64.powi(decimals);
            let r = (v * scale).round() / scale;
            if r.fract() == 0.0 {
                format!("{r:.1}")
            } else {
                format!("{r}")
            }
        }
        Some(_) => "nan".to_string(),
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_matches_plot_format() {
        let rec = TicRecord {
            tic_id: 1,
            teff: Some(5772.4),
            radius: Some(1.0049),
            mass: Some(0.987),
            gaia_mag: Some(10.123),
            distance: Some(152.34),
            obj_type: Some("STAR".into()),
        };
        assert_eq!(rec.title(), "T_eff:5772.0,STAR, G: 10.12\n Dist: 152.3, R:1.0 M:0.99");
    }

    #[test]
    fn missing_values_render_as_dashes() {
        assert_eq!(TicRecord::empty(7).title(), "T_eff:--,--, G: --\n Dist: --, R:-- M:--");
    }
}
