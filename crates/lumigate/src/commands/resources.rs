//! Raw resource CRUD by family and wire kind.

use serde::Deserialize;
use tabled::Tabled;

use lumigate_api::modern::types::Resource;
use lumigate_core::{BatchItem, GatewayClient, ResourceFamily, ResourceKind};

use crate::cli::{GlobalOpts, ResourcesArgs, ResourcesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&Resource> for ResourceRow {
    fn from(r: &Resource) -> Self {
        Self {
            id: r.id.clone(),
            kind: r.kind.clone(),
            name: r.name().unwrap_or_default().to_owned(),
        }
    }
}

fn detail(r: &Resource) -> String {
    let body = output::render_json(&r.body, false);
    format!(
        "{}\n\n{body}",
        output::detail_lines(&[
            ("ID", Some(r.id.clone())),
            ("Type", Some(r.kind.clone())),
            ("Name", r.name().map(str::to_owned)),
        ])
    )
}

pub async fn handle(
    gateway: &GatewayClient,
    args: ResourcesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ResourcesCommand::List { family } => {
            let family = ResourceFamily::from(family);
            let resources = gateway.list(family).await?;
            let out = output::render_list(
                &global.output,
                &resources,
                |r| ResourceRow::from(r),
                |r| r.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
        ResourcesCommand::Get { kind, id } => {
            let resource = gateway.get(kind, &id).await?;
            let out = output::render_single(&global.output, &resource, detail, |r| r.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }
        ResourcesCommand::Create { kind, data } => {
            let body = util::read_json_arg(&data)?;
            let created = gateway.create(kind, &body).await?;
            if !global.quiet {
                eprintln!("Created {kind}");
            }
            output::print_output(&created.rid, global.quiet);
            Ok(())
        }
        ResourcesCommand::Update { kind, id, data } => {
            let body = util::read_json_arg(&data)?;
            gateway.update(kind, &id, &body).await?;
            if !global.quiet {
                eprintln!("Updated {kind} {id}");
            }
            Ok(())
        }
        ResourcesCommand::Batch { data } => {
            let items = parse_batch(util::read_json_arg(&data)?)?;
            let outcome = gateway.batch_update(&items).await?;
            for (id, err) in &outcome.failed {
                eprintln!("{id}: {err}");
            }
            output::print_output(&outcome.applied.join("\n"), global.quiet);
            if outcome.is_complete() {
                Ok(())
            } else {
                Err(CliError::Api {
                    code: "batch".into(),
                    message: format!(
                        "{} of {} updates failed",
                        outcome.failed.len(),
                        items.len()
                    ),
                })
            }
        }
        ResourcesCommand::Delete { kind, id } => {
            gateway.delete(kind, &id).await?;
            if !global.quiet {
                eprintln!("Deleted {kind} {id}");
            }
            Ok(())
        }
    }
}

#[derive(Deserialize)]
struct BatchEntry {
    kind: ResourceKind,
    id: String,
    body: serde_json::Value,
}

/// `[{"kind": "light", "id": "...", "body": {...}}, ...]`
fn parse_batch(value: serde_json::Value) -> Result<Vec<BatchItem>, CliError> {
    let entries: Vec<BatchEntry> = serde_json::from_value(value)?;
    if entries.is_empty() {
        return Err(CliError::Validation {
            field: "data".into(),
            reason: "batch is empty".into(),
        });
    }
    Ok(entries
        .into_iter()
        .map(|e| BatchItem {
            kind: e.kind,
            id: e.id,
            body: e.body,
        })
        .collect())
}
