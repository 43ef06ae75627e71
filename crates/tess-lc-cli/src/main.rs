//! tess-lc CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tess_lc_cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => tess_lc_cli::train::execute(args)?,
        Commands::Cluster(args) => tess_lc_cli::cluster::execute(args)?,
        Commands::Catalog(args) => tess_lc_cli::catalog::execute(args)?,
        Commands::Version => {
            println!("tess-lc {}", env!("CARGO_PKG_VERSION"));
            println!("signal {}", tess_lc_signal::VERSION);
            println!("train {}", tess_lc_train::VERSION);
            println!("cluster {}", tess_lc_cluster::VERSION);
            println!("catalog {}", tess_lc_catalog::VERSION);
        }
    }

    Ok(())
}
