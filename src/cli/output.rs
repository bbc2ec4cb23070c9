//! Report rendering for `fleet-check`.

use std::io::{self, Write};

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::device::Device;

/// One device line of the report.
#[derive(Debug, Serialize)]
pub struct DeviceReport {
    pub name: String,
    pub address: String,
    pub version: String,
    pub status: String,
    pub subscriptions: usize,
}

impl From<&Device> for DeviceReport {
    fn from(device: &Device) -> Self {
        Self {
            name: device.name.clone(),
            address: device.config.address.clone(),
            version: device.config.version.to_string(),
            status: device.status.to_string(),
            subscriptions: device.subscriptions.len(),
        }
    }
}

/// One resolved OID.
#[derive(Debug, Serialize)]
pub struct Resolution {
    pub input: String,
    pub oid: Option<String>,
    pub name: Option<String>,
}

/// Full report.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub devices: Vec<DeviceReport>,
    pub resolutions: Vec<Resolution>,
    pub schema_documents: Vec<String>,
}

impl Report {
    /// Number of devices whose configuration failed.
    pub fn failed(&self) -> usize {
        self.devices.iter().filter(|d| d.status.starts_with("Failed")).count()
    }

    pub fn write(&self, format: OutputFormat, out: &mut impl Write) -> io::Result<()> {
        match format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, self).map_err(io::Error::other)?;
                writeln!(out)
            }
            OutputFormat::Human => self.write_human(out),
        }
    }

    fn write_human(&self, out: &mut impl Write) -> io::Result<()> {
        if !self.devices.is_empty() {
            let width = self.devices.iter().map(|d| d.name.len()).max().unwrap_or(0);
            for d in &self.devices {
                writeln!(
                    out,
                    "{:width$}  {:<24} {:<8} {} ({} subscriptions)",
                    d.name, d.address, d.version, d.status, d.subscriptions
                )?;
            }
        }
        if !self.schema_documents.is_empty() {
            writeln!(out, "schema documents: {}", self.schema_documents.join(", "))?;
        }
        for r in &self.resolutions {
            match (&r.oid, &r.name) {
                (Some(oid), Some(name)) => writeln!(out, "{} = {}", oid, name)?,
                _ => writeln!(out, "{}: not resolvable", r.input)?,
            }
        }
        Ok(())
    }
}
