//! Modsys CLI - module resolution tools

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "modsys")]
#[command(about = "Resolve and inspect module configurations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, env = "MODSYS_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List module ids in a library
    List {
        /// Library directory (defaults to the configured library)
        #[arg(long)]
        library: Option<PathBuf>,

        /// Only list modules with this name
        name: Option<String>,
    },

    /// Resolve root modules and print the path configuration
    Resolve {
        /// Library directory (defaults to the configured library)
        #[arg(long)]
        library: Option<PathBuf>,

        /// JSON array of module declarations to compile against the library
        #[arg(long)]
        modules: Option<PathBuf>,

        /// Print the configuration as JSON
        #[arg(long)]
        json: bool,

        /// Root module queries
        #[arg(required = true)]
        roots: Vec<String>,
    },

    /// Check whether a class is accessible from a module
    Access {
        /// Module the access originates from
        #[arg(long)]
        from: String,

        /// Fully qualified class name
        #[arg(long)]
        class: String,

        /// Library directory (defaults to the configured library)
        #[arg(long)]
        library: Option<PathBuf>,

        /// JSON array of module declarations to compile against the library
        #[arg(long)]
        modules: Option<PathBuf>,

        /// Root module queries
        #[arg(required = true)]
        roots: Vec<String>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::List { library, name } => {
            commands::list(&config, library.as_deref(), name.as_deref(), &mut out)?;
        }
        Commands::Resolve {
            library,
            modules,
            json,
            roots,
        } => {
            let sources = commands::Sources {
                library: library.as_deref(),
                modules: modules.as_deref(),
            };
            commands::resolve(&config, &sources, &roots, json, &mut out)?;
        }
        Commands::Access {
            from,
            class,
            library,
            modules,
            roots,
        } => {
            let sources = commands::Sources {
                library: library.as_deref(),
                modules: modules.as_deref(),
            };
            if !commands::access(&config, &sources, &roots, &from, &class, &mut out)? {
                drop(out);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
