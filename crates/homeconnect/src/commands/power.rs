//! Power command handler.

use homeconnect_core::{Bridge, keys};

use crate::cli::{GlobalOpts, PowerArgs, PowerState};
use crate::error::CliError;

pub async fn handle(bridge: &Bridge, args: PowerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let value = match args.state {
        PowerState::On => keys::POWER_STATE_ON,
        PowerState::Off => keys::POWER_STATE_OFF,
        PowerState::Standby => keys::POWER_STATE_STANDBY,
    };
    bridge.api().set_power_state(&args.ha_id, value).await?;
    if !global.quiet {
        eprintln!("{} switched to {:?}", args.ha_id, args.state);
    }
    Ok(())
}
