//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned human-readable text.
    #[default]
    Human,
    /// One JSON document.
    Json,
}

/// Inputs to check.
#[derive(Debug, Parser)]
pub struct CheckArgs {
    /// Saved fleet state to validate.
    #[arg(short = 's', long = "state", value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Directory of user MIB documents.
    #[arg(short = 'm', long = "mib-dir", value_name = "DIR", default_value = ".mib_store")]
    pub mib_dir: PathBuf,

    /// OIDs to resolve (dotted numbers or names).
    #[arg(value_name = "OID")]
    pub oids: Vec<String>,
}

/// Output and logging options.
#[derive(Debug, Parser)]
pub struct OutputArgs {
    /// Output format.
    #[arg(short = 'O', long = "format", value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Library debug logging.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Library trace logging.
    #[arg(long = "trace")]
    pub trace: bool,
}

impl OutputArgs {
    /// Initialize tracing based on debug/trace flags.
    pub fn init_tracing(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = if self.trace {
            "snmp_fleet=trace"
        } else if self.debug {
            "snmp_fleet=debug"
        } else {
            "snmp_fleet=warn"
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .try_init();
    }
}
