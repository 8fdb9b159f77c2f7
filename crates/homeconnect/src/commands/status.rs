//! Status command handler.

use homeconnect_core::Bridge;

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(bridge: &Bridge, args: StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = match args.key {
        Some(key) => {
            let status = bridge.api().get_status(&args.ha_id, &key).await?;
            output::render_data(global.output, &status)?
        }
        None => {
            let statuses = bridge.api().get_statuses(&args.ha_id).await?;
            output::render_data_list(global.output, &statuses)?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}
