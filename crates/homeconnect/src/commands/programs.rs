//! Program command handlers.

use homeconnect_core::{Bridge, Program};

use crate::cli::{GlobalOpts, OutputFormat, ProgramArgs, ProgramCommand};
use crate::error::CliError;
use crate::output;

pub async fn handle(bridge: &Bridge, args: ProgramArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (program, what) = match args.command {
        ProgramCommand::Active { ha_id } => (bridge.api().get_active_program(&ha_id).await?, "active"),
        ProgramCommand::Selected { ha_id } => {
            (bridge.api().get_selected_program(&ha_id).await?, "selected")
        }
    };

    let Some(program) = program else {
        // JSON consumers get an explicit null rather than nothing.
        match global.output {
            OutputFormat::Json | OutputFormat::JsonCompact => output::print_output("null", global.quiet),
            OutputFormat::Table | OutputFormat::Plain => {
                if !global.quiet {
                    eprintln!("No {what} program");
                }
            }
        }
        return Ok(());
    };

    let rendered = output::render_single(global.output, &program, detail, |p| p.key.clone())?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn detail(program: &Program) -> String {
    let mut lines = vec![format!("Program: {}", program.key)];
    lines.extend(program.options.iter().map(|option| {
        let value = option.value.as_deref().map_or("-", output::short_value);
        match &option.unit {
            Some(unit) => format!("  {}: {value} {unit}", option.key),
            None => format!("  {}: {value}", option.key),
        }
    }));
    lines.join("\n")
}
