//! Light commands: reconciled listing, single-light get/set, blink.

use std::time::Duration;

use tabled::Tabled;

use lumigate_core::{GatewayClient, Light, LightColor, LightUpdate, Reconciler};

use crate::cli::{GlobalOpts, LightArgs, LightCommand, LightSetArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct LightRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "On")]
    on: String,
    #[tabled(rename = "Bri")]
    brightness: String,
    #[tabled(rename = "Color")]
    color: String,
    #[tabled(rename = "Reachable")]
    reachability: String,
}

fn light_row(light: &Light, color: bool) -> LightRow {
    LightRow {
        id: light.id.clone(),
        name: light.name.clone(),
        on: if light.on { "on" } else { "off" }.into(),
        brightness: light
            .brightness
            .map(|b| format!("{b:.0}%"))
            .unwrap_or_default(),
        color: light.color.map(color_label).unwrap_or_default(),
        reachability: output::reachability_cell(light.reachability, color),
    }
}

fn color_label(color: LightColor) -> String {
    match color {
        LightColor::Xy { x, y } => format!("xy {x:.3},{y:.3}"),
        LightColor::Temperature { mirek } => format!("{mirek} mirek"),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn handle_list(gateway: &GatewayClient, global: &GlobalOpts) -> Result<(), CliError> {
    let (lights, mappings) = Reconciler::new(gateway).lights().await?;
    tracing::debug!(lights = lights.len(), mapped = mappings.len(), "lights reconciled");

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &lights,
        |l| light_row(l, color),
        |l| l.id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle_light(
    gateway: &GatewayClient,
    args: LightArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        LightCommand::Get { id } => {
            let light = gateway.get_light(&id).await?;
            let out = output::render_single(
                &global.output,
                &light,
                |l| {
                    output::detail_lines(&[
                        ("ID", Some(l.id.clone())),
                        ("Name", Some(l.metadata.name.clone())),
                        ("Archetype", l.metadata.archetype.clone()),
                        ("On", Some(l.on.on.to_string())),
                        ("Brightness", l.dimming.as_ref().map(|d| format!("{:.0}%", d.brightness))),
                        (
                            "Color",
                            l.color
                                .as_ref()
                                .map(|c| format!("xy {:.3},{:.3}", c.xy.x, c.xy.y)),
                        ),
                        (
                            "Mirek",
                            l.color_temperature
                                .as_ref()
                                .and_then(|t| t.mirek)
                                .map(|m| m.to_string()),
                        ),
                        ("Device", l.owner.as_ref().map(|o| o.rid.clone())),
                    ])
                },
                |l| l.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        LightCommand::Set(set) => {
            let update = build_update(&set)?;
            gateway.update_light(&set.id, &update).await?;
            if !global.quiet {
                eprintln!("Updated light {}", set.id);
            }
            Ok(())
        }
    }
}

fn build_update(args: &LightSetArgs) -> Result<LightUpdate, CliError> {
    let mut update = LightUpdate::new();
    if args.on {
        update = update.on(true);
    }
    if args.off {
        update = update.on(false);
    }
    if let Some(brightness) = args.brightness {
        if !(0.0..=100.0).contains(&brightness) {
            return Err(CliError::Validation {
                field: "brightness".into(),
                reason: format!("{brightness} is outside 0-100"),
            });
        }
        update = update.brightness(brightness);
    }
    if let Some(xy) = args.xy.as_deref() {
        let [x, y] = xy else {
            return Err(CliError::Validation {
                field: "xy".into(),
                reason: "expected two values, e.g. 0.31,0.33".into(),
            });
        };
        if !(0.0..=1.0).contains(x) || !(0.0..=1.0).contains(y) {
            return Err(CliError::Validation {
                field: "xy".into(),
                reason: "coordinates must be within 0-1".into(),
            });
        }
        update = update.xy(*x, *y);
    }
    if let Some(mirek) = args.mirek {
        update = update.mirek(mirek);
    }
    if let Some(ms) = args.transition_ms {
        update = update.transition(Duration::from_millis(ms));
    }
    if update.is_empty() {
        return Err(CliError::Validation {
            field: "light".into(),
            reason: "nothing to change; pass --on, --off, --brightness, --xy or --mirek".into(),
        });
    }
    Ok(update)
}

pub async fn handle_blink(
    gateway: &GatewayClient,
    id: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let outcome = gateway.blink(id).await?;
    match (outcome.transient_error, outcome.restore_error) {
        (None, None) => {
            if !global.quiet {
                eprintln!("Blinked {id}");
            }
            Ok(())
        }
        (Some(err), None) => Err(err.into()),
        (Some(err), Some(restore)) => {
            eprintln!("Could not blink {id}; restoring its previous state also failed: {restore}");
            Err(err.into())
        }
        (None, Some(restore)) => {
            eprintln!("Blinked {id}, but restoring its previous state failed");
            Err(restore.into())
        }
    }
}
