//! Bridge discovery command.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Tabled;

use lumigate_core::{Bridge, Discovery};

use crate::cli::{DiscoverArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct BridgeRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "API")]
    api: String,
    #[tabled(rename = "Found by")]
    source: String,
}

impl From<&Bridge> for BridgeRow {
    fn from(b: &Bridge) -> Self {
        Self {
            id: b.id.clone(),
            name: b.name.clone().unwrap_or_default(),
            address: format!("{}:{}", b.address, b.port),
            model: b.model.clone().unwrap_or_default(),
            api: b.api_version.clone().unwrap_or_default(),
            source: b.source.to_string(),
        }
    }
}

pub async fn handle(args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut loaded = util::load(global)?;

    let mut settings = loaded.config.discovery_settings();
    if let Some(secs) = args.timeout {
        settings.timeout = Duration::from_secs(secs);
    }
    if args.first {
        settings.sufficient_results = Some(1);
    }
    settings.cloud &= !args.no_cloud;
    settings.ip_scan &= !args.no_scan;
    settings.service_browse &= !args.no_browse;
    settings.multicast &= !args.no_multicast;
    if !args.probe.is_empty() {
        let mut addresses = args.probe.clone();
        addresses.append(&mut settings.scan_addresses);
        settings.scan_addresses = addresses;
    }

    let discovery = Discovery::new(&settings)?;

    let spinner = (!global.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "Searching for bridges (up to {}s)",
            discovery.timeout().as_secs()
        ));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let bridges = discovery.discover().await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if bridges.is_empty() {
        if !global.quiet {
            eprintln!("No bridges found.");
        }
        return Ok(());
    }

    if args.save {
        for bridge in &bridges {
            let mut name = util::profile_name(bridge);
            let taken = loaded
                .config
                .bridges
                .get(&name)
                .is_some_and(|existing| existing.id != bridge.id);
            if taken {
                name = format!("{name}-{}", bridge.id.to_ascii_lowercase());
            }
            loaded.config.upsert_bridge(&name, bridge);
        }
        util::save(&loaded.config, &loaded.path)?;
        if !global.quiet {
            eprintln!(
                "Saved {} bridge(s) to {}",
                bridges.len(),
                loaded.path.display()
            );
        }
    }

    let out = output::render_list(&global.output, &bridges, |b| BridgeRow::from(b), |b| b.id.clone());
    output::print_output(&out, global.quiet);
    Ok(())
}
