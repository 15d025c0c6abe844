//! Config subcommand handlers. None of these touch the network.

use tabled::Tabled;

use lumigate_config::BridgeProfile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(serde::Serialize)]
struct NamedProfile<'a> {
    name: &'a str,
    default: bool,
    #[serde(flatten)]
    profile: &'a BridgeProfile,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Default")]
    default: String,
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            let path = global
                .config
                .clone()
                .unwrap_or_else(lumigate_config::config_path);
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let loaded = util::load(global)?;
            let out = match global.output {
                OutputFormat::Json => output::render_json(&loaded.config, false),
                OutputFormat::JsonCompact => output::render_json(&loaded.config, true),
                OutputFormat::Yaml => output::render_yaml(&loaded.config),
                OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&loaded.config)
                    .map_err(|e| CliError::Config {
                        message: e.to_string(),
                    })?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }
        ConfigCommand::Bridges => {
            let loaded = util::load(global)?;
            let default = loaded.config.default_bridge.as_deref();
            let profiles: Vec<NamedProfile<'_>> = loaded
                .config
                .bridges
                .iter()
                .map(|(name, profile)| NamedProfile {
                    name,
                    default: Some(name.as_str()) == default,
                    profile,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &profiles,
                |p| ProfileRow {
                    name: p.name.to_owned(),
                    id: p.profile.id.clone(),
                    address: format!("{}:{}", p.profile.address, p.profile.port),
                    default: if p.default { "*".into() } else { String::new() },
                },
                |p| p.name.to_owned(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
