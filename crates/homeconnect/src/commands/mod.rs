//! Command dispatch: bridges CLI args -> API calls -> output formatting.

pub mod appliances;
pub mod config_cmd;
pub mod power;
pub mod programs;
pub mod settings;
pub mod status;
pub mod watch;

use homeconnect_core::Bridge;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an API-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, bridge: &Bridge, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Appliances => appliances::list(bridge, global).await,
        Command::Appliance(args) => appliances::show(bridge, args, global).await,
        Command::Setting(args) => settings::handle(bridge, args, global).await,
        Command::Status(args) => status::handle(bridge, args, global).await,
        Command::Program(args) => programs::handle(bridge, args, global).await,
        Command::Power(args) => power::handle(bridge, args, global).await,
        Command::Watch(args) => watch::handle(bridge, args, global).await,
        // Handled before a bridge is built
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
