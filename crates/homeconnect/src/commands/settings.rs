//! Setting command handlers.

use serde_json::Value;

use homeconnect_core::Bridge;

use crate::cli::{GlobalOpts, SettingArgs, SettingCommand};
use crate::error::CliError;
use crate::output;

pub async fn handle(bridge: &Bridge, args: SettingArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SettingCommand::Get { ha_id, key: Some(key) } => {
            let setting = bridge.api().get_setting(&ha_id, &key).await?;
            let rendered = output::render_data(global.output, &setting)?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        SettingCommand::Get { ha_id, key: None } => {
            let settings = bridge.api().get_settings(&ha_id).await?;
            let rendered = output::render_data_list(global.output, &settings)?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        SettingCommand::Set { ha_id, key, value } => {
            let value = parse_value(&value);
            bridge.api().put_setting(&ha_id, &key, &value).await?;
            if !global.quiet {
                eprintln!("Setting {key} updated");
            }
            Ok(())
        }
    }
}

/// JSON literals are sent typed; anything else goes out as a string.
fn parse_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        _ => Value::String(raw.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_value;

    #[test]
    fn scalars_are_sent_typed() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("-18.5"), json!(-18.5));
        assert_eq!(parse_value("4"), json!(4));
    }

    #[test]
    fn everything_else_is_a_string() {
        assert_eq!(
            parse_value("BSH.Common.EnumType.PowerState.On"),
            json!("BSH.Common.EnumType.PowerState.On")
        );
        assert_eq!(parse_value("{\"a\":1}"), json!("{\"a\":1}"));
        assert_eq!(parse_value("null"), json!("null"));
    }
}
