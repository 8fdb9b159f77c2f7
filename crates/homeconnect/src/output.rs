//! Output formatting: table, JSON, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use homeconnect_core::Data;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Render a boolean as a colored yes/no marker.
pub fn yes_no(value: bool, color: bool) -> String {
    match (value, color) {
        (true, true) => "yes".green().to_string(),
        (false, true) => "no".red().to_string(),
        (true, false) => "yes".into(),
        (false, false) => "no".into(),
    }
}

/// Strip the namespace from enum values:
/// `BSH.Common.EnumType.PowerState.On` becomes `On`.
pub fn short_value(value: &str) -> &str {
    if value.contains(".EnumType.") {
        value.rsplit('.').next().unwrap_or(value)
    } else {
        value
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the data itself via serde
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => Ok(data.iter().map(id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views are key/value
/// blocks rather than tables.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Data values ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DataRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: String,
}

fn data_row(d: &Data) -> DataRow {
    DataRow {
        key: d.key.clone(),
        value: d.value.as_deref().map_or("-", short_value).to_owned(),
        unit: d.unit.clone().unwrap_or_default(),
    }
}

/// Settings, status values, and program options share one shape.
pub fn render_data_list(format: OutputFormat, data: &[Data]) -> Result<String, CliError> {
    render_list(format, data, data_row, |d| {
        format!("{}={}", d.key, d.value.as_deref().unwrap_or_default())
    })
}

pub fn render_data(format: OutputFormat, data: &Data) -> Result<String, CliError> {
    render_single(
        format,
        data,
        |d| {
            let value = d.value.as_deref().map_or("-", short_value);
            match &d.unit {
                Some(unit) => format!("{}: {value} {unit}", d.key),
                None => format!("{}: {value}", d.key),
            }
        },
        |d| d.value.clone().unwrap_or_default(),
    )
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> Vec<Data> {
        vec![
            Data::new(
                "BSH.Common.Setting.PowerState",
                Some("BSH.Common.EnumType.PowerState.On".into()),
                None,
            ),
            Data::new(
                "Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer",
                Some("-18".into()),
                Some("°C".into()),
            ),
        ]
    }

    #[test]
    fn short_value_strips_enum_namespace_only() {
        assert_eq!(short_value("BSH.Common.EnumType.DoorState.Open"), "Open");
        assert_eq!(short_value("-18.5"), "-18.5");
        assert_eq!(short_value("Cooking.Oven.Program.HeatingMode"), "Cooking.Oven.Program.HeatingMode");
    }

    #[test]
    fn plain_output_is_key_value_lines() {
        let out = render_data_list(OutputFormat::Plain, &sample()).unwrap();
        assert_eq!(
            out,
            "BSH.Common.Setting.PowerState=BSH.Common.EnumType.PowerState.On\n\
             Refrigeration.FridgeFreezer.Setting.SetpointTemperatureFreezer=-18"
        );
    }

    #[test]
    fn table_output_shortens_enum_values() {
        let out = render_data_list(OutputFormat::Table, &sample()).unwrap();
        assert!(out.contains("│ On "), "table:\n{out}");
        assert!(out.contains("°C"));
    }

    #[test]
    fn compact_json_keeps_full_values() {
        let out = render_data(OutputFormat::JsonCompact, &sample()[0]).unwrap();
        assert_eq!(
            out,
            r#"{"key":"BSH.Common.Setting.PowerState","value":"BSH.Common.EnumType.PowerState.On"}"#
        );
    }

    #[test]
    fn single_value_detail_includes_unit() {
        let out = render_data(OutputFormat::Table, &sample()[1]).unwrap();
        assert!(out.ends_with(": -18 °C"), "detail: {out}");
    }
}
