//! # TESS Input Catalog lookups
//!
//! Object metadata (effective temperature, radius, mass, Gaia magnitude,
//! distance, object type) for annotating latent-space plots.
//!
//! ```text
//! CatalogLookup<S> ──► S: CatalogSource ──► MastCatalog (HTTP, blocking)
//!       │                                   └► any test double
//!       └──► TicRecord / title(), or the placeholder on any failure
//! ```
//!
//! Lookups never abort the caller: [`CatalogLookup`] turns every
//! [`CatalogError`] into a logged warning and a placeholder.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tess_lc_catalog::{CatalogLookup, MastCatalog};
//!
//! let lookup = CatalogLookup::new(MastCatalog::new().unwrap());
//! println!("{}", lookup.title(261136679));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod lookup;
pub mod mast;
pub mod record;

pub use error::{CatalogError, CatalogResult};
pub use lookup::{CatalogLookup, PLACEHOLDER_TITLE};
pub use mast::{MastCatalog, MAST_INVOKE_URL};
pub use record::TicRecord;

/// A provider of catalog records keyed by TIC identifier.
pub trait CatalogSource {
    /// Fetch the record for `tic_id`.
    fn fetch(&self, tic_id: u64) -> CatalogResult<TicRecord>;
}

impl<S: CatalogSource + ?Sized> CatalogSource for &S {
    fn fetch(&self, tic_id: u64) -> CatalogResult<TicRecord> {
        (**self).fetch(tic_id)
    }
}

impl<S: CatalogSource + ?Sized> CatalogSource for Box<S> {
    fn fetch(&self, tic_id: u64) -> CatalogResult<TicRecord> {
        (**self).fetch(tic_id)
    }
}

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
