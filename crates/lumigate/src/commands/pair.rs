//! Pairing, unpairing, and the unauthenticated bridge info view.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use lumigate_core::{GatewayClient, ensure_supported_version};

use crate::cli::{GlobalOpts, PairArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Pair ─────────────────────────────────────────────────────────────

pub async fn handle_pair(
    gateway: &GatewayClient,
    args: PairArgs,
    app_id: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let app_id = args.app_id.as_deref().unwrap_or(app_id);
    let bridge = gateway.bridge().display_name().to_owned();

    if args.once {
        gateway.pair(app_id).await?;
    } else {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_signal.cancel();
            }
        });

        let spinner = (!global.quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.set_message(format!(
                "Press the link button on {bridge} (Ctrl-C to stop)"
            ));
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });

        let result = gateway.pair_until_confirmed(app_id, &cancel).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        result?;
    }

    if !global.quiet {
        eprintln!("Paired with {bridge}; credentials stored in the system keyring.");
    }
    Ok(())
}

pub async fn handle_forget(gateway: &GatewayClient, global: &GlobalOpts) -> Result<(), CliError> {
    gateway.forget().await?;
    if !global.quiet {
        eprintln!(
            "Removed credentials for {}",
            gateway.bridge().display_name()
        );
    }
    Ok(())
}

// ── Info ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct BridgeInfo {
    id: Option<String>,
    name: Option<String>,
    model: Option<String>,
    software: Option<String>,
    api_version: Option<String>,
    mac: Option<String>,
    address: String,
    supported: bool,
}

/// Status and firmware gate, straight from the unauthenticated endpoint.
pub async fn handle_info(global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = util::load(global)?;
    let (address, port) = match global.address.as_deref() {
        Some(address) => (address.to_owned(), global.port),
        None => {
            let bridge = util::resolve_bridge(global, &loaded.config).await?;
            (bridge.address, bridge.port)
        }
    };

    let (_, status) = util::probe_status(&loaded.config, &address, port).await?;
    let supported = ensure_supported_version(status.apiversion.clone());

    let info = BridgeInfo {
        id: status.bridgeid.map(|id| id.to_ascii_uppercase()),
        name: status.name,
        model: status.modelid,
        software: status.swversion,
        api_version: status.apiversion,
        mac: status.mac,
        address: format!("{address}:{port}"),
        supported: supported.is_ok(),
    };

    let out = output::render_single(&global.output, &info, detail, |i| {
        i.id.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);

    supported.map(|_| ()).map_err(CliError::from)
}

fn detail(info: &BridgeInfo) -> String {
    output::detail_lines(&[
        ("ID", info.id.clone()),
        ("Name", info.name.clone()),
        ("Model", info.model.clone()),
        ("Software", info.software.clone()),
        ("API", info.api_version.clone()),
        ("MAC", info.mac.clone()),
        ("Address", Some(info.address.clone())),
        (
            "Supported",
            Some(if info.supported { "yes" } else { "no" }.to_owned()),
        ),
    ])
}
