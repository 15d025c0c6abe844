//! Follow the bridge's event stream until Ctrl-C, disconnect, or `--count`.

use chrono::Local;

use lumigate_core::{DomainEvent, GatewayClient, StreamEvent};

use crate::cli::{EventsArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    gateway: &GatewayClient,
    args: EventsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut stream = gateway.event_stream().await?;
    if !global.quiet {
        eprintln!(
            "Listening to {} (Ctrl-C to stop)",
            gateway.bridge().display_name()
        );
    }

    let mut seen = 0usize;
    loop {
        if args.count.is_some_and(|limit| seen >= limit) {
            break;
        }
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = stream.recv() => event,
        };
        let Some(event) = event else {
            if !global.quiet {
                eprintln!("Event stream closed by the bridge");
            }
            break;
        };
        seen += 1;

        let line = if args.raw {
            render_raw(&event, &global.output)
        } else {
            render_decoded(&DomainEvent::from(event.as_ref()), &global.output)
        };
        output::print_output(&line, false);
    }

    stream.cancel();
    tracing::debug!(events = seen, "event stream stopped");
    Ok(())
}

fn render_raw(event: &StreamEvent, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{} {:<7} {:<20} {}",
            Local::now().format("%H:%M:%S"),
            event.change,
            event.kind,
            event.id
        ),
        OutputFormat::Yaml => output::render_yaml(event),
        // One object per line keeps the stream greppable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
    }
}

fn render_decoded(event: &DomainEvent, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => {
            format!("{} {}", Local::now().format("%H:%M:%S"), summary(event))
        }
        OutputFormat::Yaml => output::render_yaml(event),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
    }
}

fn summary(event: &DomainEvent) -> String {
    match event {
        DomainEvent::LightChanged {
            id,
            on,
            brightness,
            color,
        } => {
            let mut parts = Vec::new();
            if let Some(on) = on {
                parts.push(if *on { "on".to_owned() } else { "off".to_owned() });
            }
            if let Some(b) = brightness {
                parts.push(format!("{b:.0}%"));
            }
            if let Some(c) = color {
                parts.push(format!("{c:?}"));
            }
            format!("light {id}: {}", parts.join(" "))
        }
        DomainEvent::Connectivity {
            id,
            device_id,
            reachability,
        } => format!(
            "connectivity {}: {reachability}",
            device_id.as_deref().unwrap_or(id)
        ),
        DomainEvent::Added { id, kind } => format!("added {kind} {id}"),
        DomainEvent::Removed { id, kind } => format!("removed {kind} {id}"),
        DomainEvent::Other { id, kind, change } => format!("{change} {kind} {id}"),
    }
}
