//! `catalog` subcommand: TIC metadata for plot annotation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use tess_lc_catalog::{CatalogLookup, MastCatalog, TicRecord, MAST_INVOKE_URL};

use crate::io::emit;

/// Arguments for the catalog command
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// TIC identifiers
    #[arg(required = true)]
    pub tic_ids: Vec<u64>,

    /// MAST `invoke` endpoint
    #[arg(long, default_value = MAST_INVOKE_URL)]
    pub url: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Print full records as JSON instead of plot titles
    #[arg(long)]
    pub json: bool,

    /// Write JSON records here (implies `--json`)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the catalog command.
///
/// Lookup failures never fail the command: titles fall back to the
/// placeholder and records to all-missing values.
pub fn execute(args: CatalogArgs) -> Result<()> {
    let source = MastCatalog::with_endpoint(&args.url, Duration::from_secs(args.timeout))?;
    let lookup = CatalogLookup::new(source);
    if args.json || args.output.is_some() {
        let records: Vec<TicRecord> = args.tic_ids.iter().map(|&id| lookup.record(id)).collect();
        return emit(args.output.as_deref(), &records);
    }
    for (id, title) in args.tic_ids.iter().zip(lookup.titles(&args.tic_ids)) {
        println!("TIC {id}\n{title}\n");
    }
    Ok(())
}
