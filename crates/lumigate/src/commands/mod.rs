//! Command dispatch: CLI args -> gateway calls -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod discover;
pub mod events;
pub mod lights;
pub mod pair;
pub mod resources;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a bridge-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = util::load(global)?;
    let gateway = util::gateway(global, &loaded.config).await?;
    tracing::debug!(bridge = %gateway.bridge().id, "gateway ready");

    match cmd {
        Command::Pair(args) => {
            pair::handle_pair(&gateway, args, &loaded.config.defaults.app_id, global).await
        }
        Command::Forget => pair::handle_forget(&gateway, global).await,
        Command::Lights => lights::handle_list(&gateway, global).await,
        Command::Light(args) => lights::handle_light(&gateway, args, global).await,
        Command::Blink { id } => lights::handle_blink(&gateway, &id, global).await,
        Command::Resources(args) => resources::handle(&gateway, args, global).await,
        Command::Reconcile => devices::handle_reconcile(&gateway, global).await,
        Command::AddSerial { serial } => devices::handle_add_serial(&gateway, &serial, global).await,
        Command::Touchlink => devices::handle_touchlink(&gateway, global).await,
        Command::Events(args) => events::handle(&gateway, args, global).await,
        // Handled before a gateway is built
        Command::Discover(_) | Command::Info | Command::Config(_) | Command::Completions(_) => {
            unreachable!()
        }
    }
}
