//! Appliance listing and detail.

use tabled::Tabled;

use homeconnect_core::{Bridge, HomeAppliance};

use crate::cli::{ApplianceArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ApplianceRow {
    #[tabled(rename = "haId")]
    ha_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Brand")]
    brand: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Connected")]
    connected: String,
}

pub async fn list(bridge: &Bridge, global: &GlobalOpts) -> Result<(), CliError> {
    let appliances = bridge.api().list_appliances().await?;
    let color = output::should_color(global.color);

    let rendered = output::render_list(
        global.output,
        &appliances,
        |a| ApplianceRow {
            ha_id: a.ha_id.clone(),
            name: a.name.clone(),
            brand: a.brand.clone(),
            kind: a.appliance_type.clone(),
            connected: output::yes_no(a.connected, color),
        },
        |a| a.ha_id.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn show(bridge: &Bridge, args: ApplianceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let appliance = bridge.api().get_appliance(&args.ha_id).await?;
    let color = output::should_color(global.color);

    let rendered = output::render_single(
        global.output,
        &appliance,
        |a| detail(a, color),
        |a| a.ha_id.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn detail(a: &HomeAppliance, color: bool) -> String {
    [
        format!("haId:      {}", a.ha_id),
        format!("Name:      {}", a.name),
        format!("Brand:     {}", a.brand),
        format!("Type:      {}", a.appliance_type),
        format!("Model:     {}", a.vib),
        format!("E-Number:  {}", a.enumber),
        format!("Connected: {}", output::yes_no(a.connected, color)),
    ]
    .join("\n")
}
