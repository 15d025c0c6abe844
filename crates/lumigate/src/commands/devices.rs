//! Cross-protocol mapping and adding new lights (serial, touchlink).

use tabled::Tabled;

use lumigate_core::{DeviceMapping, GatewayClient, Reconciler, SerialMatch};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct MappingRow {
    #[tabled(rename = "Resource ID")]
    modern_id: String,
    #[tabled(rename = "Legacy ID")]
    legacy_id: String,
    #[tabled(rename = "MAC suffix")]
    mac_suffix: String,
    #[tabled(rename = "Matched by")]
    rule: String,
}

impl From<&DeviceMapping> for MappingRow {
    fn from(m: &DeviceMapping) -> Self {
        Self {
            modern_id: m.modern_id.clone(),
            legacy_id: m.legacy_id.clone(),
            mac_suffix: m.mac_suffix.clone().unwrap_or_default(),
            rule: m.rule.to_string(),
        }
    }
}

#[derive(Tabled)]
struct SerialRow {
    #[tabled(rename = "Legacy ID")]
    legacy_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Source")]
    source: String,
}

impl From<&SerialMatch> for SerialRow {
    fn from(m: &SerialMatch) -> Self {
        Self {
            legacy_id: m.legacy_id.clone(),
            name: m.name.clone(),
            serial: m.serial.clone(),
            source: match m.source {
                lumigate_core::SerialMatchSource::Search => "new".into(),
                lumigate_core::SerialMatchSource::Existing => "existing".into(),
            },
        }
    }
}

pub async fn handle_reconcile(
    gateway: &GatewayClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mappings = Reconciler::new(gateway).mappings().await?;
    let out = output::render_list(&global.output, &mappings, |m| MappingRow::from(m), |m| {
        format!("{}\t{}", m.modern_id, m.legacy_id)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle_add_serial(
    gateway: &GatewayClient,
    serial: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !global.quiet {
        eprintln!(
            "Searching for {serial} (up to {}s)...",
            gateway.settings().serial_search_timeout.as_secs()
        );
    }
    let found = Reconciler::new(gateway).add_by_serial(serial).await?;
    let out = output::render_list(&global.output, &found, |m| SerialRow::from(m), |m| {
        m.legacy_id.clone()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle_touchlink(
    gateway: &GatewayClient,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    gateway.touchlink().await?;
    if !global.quiet {
        eprintln!("Touchlink started; hold the light within 30cm of the bridge.");
    }
    Ok(())
}
