//! fleet-check: validate a saved fleet state and resolve OIDs.
//!
//! Rebuilds every device target from the state file and reports its status,
//! then resolves the given OIDs against the standard and stored MIBs. No
//! requests are sent.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use snmp_fleet::cli::args::{CheckArgs, OutputArgs};
use snmp_fleet::cli::output::{DeviceReport, Report, Resolution};
use snmp_fleet::{Fleet, FleetConfig, FleetState, MockEngine};

/// Validate a fleet state file and resolve OIDs.
#[derive(Debug, Parser)]
#[command(name = "fleet-check", version, about)]
struct Args {
    #[command(flatten)]
    check: CheckArgs,

    #[command(flatten)]
    output: OutputArgs,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.output.init_tracing();

    let config = FleetConfig::default()
        .schema_dir(&args.check.mib_dir)
        .keep_schemas_loaded(true);
    let fleet = Fleet::new(Arc::new(MockEngine::new()), config);
    let mut report = Report::default();

    if let Some(path) = &args.check.state {
        let state = match FleetState::load(path) {
            Ok(state) => state,
            Err(e) => {
                eprintln!("Error: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        };
        if let Err(e) = fleet.restore(state) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
        report.devices = fleet.devices().iter().map(DeviceReport::from).collect();
    }

    match fleet.schema_documents() {
        Ok(names) => report.schema_documents = names,
        Err(e) => eprintln!("Warning: {}", e),
    }

    if !args.check.oids.is_empty() {
        let lease = fleet.schemas().lease();
        let schema = lease.schema(fleet.config().reload_wait).await;
        for input in &args.check.oids {
            let oid = schema
                .as_ref()
                .and_then(|set| set.parse_name(input))
                .or_else(|| input.parse().ok());
            let name = match (&schema, &oid) {
                (Some(set), Some(oid)) => Some(set.resolve(oid)),
                _ => None,
            };
            report.resolutions.push(Resolution {
                input: input.clone(),
                oid: oid.map(|o| o.to_string()),
                name,
            });
        }
    }

    fleet.shutdown();

    if let Err(e) = report.write(args.output.format, &mut io::stdout().lock()) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
