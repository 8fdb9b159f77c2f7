//! Live event streaming.
//!
//! Subscribes to every requested appliance, prints events as they arrive,
//! and runs until Ctrl-C or until every stream has given up.

use std::io::Write;
use std::sync::Arc;

use chrono::{Local, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use tokio::sync::watch;

use homeconnect_core::{Bridge, Event, EventListener, StreamState};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(bridge: &Bridge, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let mut states = Vec::with_capacity(args.ha_ids.len());

    for ha_id in &args.ha_ids {
        let printer = Arc::new(EventPrinter {
            ha_id: ha_id.clone(),
            key_prefix: args.key_prefix.clone(),
            format: global.output,
            color,
        });
        if let Err(e) = bridge.events().subscribe(ha_id, printer).await {
            bridge.shutdown().await;
            return Err(e.into());
        }
        // Taken right away: a stream that gives up drops its registration.
        if let Some(state) = bridge.events().state(ha_id) {
            states.push(state);
        }
        if !global.quiet {
            eprintln!("Watching {ha_id}");
        }
    }

    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!("interrupted");
        }
        () = all_closed(states) => {
            if !global.quiet {
                eprintln!("All event streams closed");
            }
        }
    }

    bridge.shutdown().await;
    Ok(())
}

async fn all_closed(states: Vec<watch::Receiver<StreamState>>) {
    for mut state in states {
        // A dropped sender means the stream task is gone.
        let _ = state.wait_for(|s| *s == StreamState::Closed).await;
    }
}

// ── Printer ──────────────────────────────────────────────────────────

struct EventPrinter {
    ha_id: String,
    key_prefix: Option<String>,
    format: OutputFormat,
    color: bool,
}

#[derive(Serialize)]
struct EventLine<'a> {
    timestamp: String,
    ha_id: &'a str,
    #[serde(flatten)]
    event: &'a Event,
}

impl EventPrinter {
    fn render(&self, event: &Event) -> Option<String> {
        if self
            .key_prefix
            .as_deref()
            .is_some_and(|prefix| !event.key.starts_with(prefix))
        {
            return None;
        }

        let value = event.value.as_deref().unwrap_or("-");
        let line = match self.format {
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&EventLine {
                timestamp: Utc::now().to_rfc3339(),
                ha_id: &self.ha_id,
                event,
            })
            .ok()?,
            OutputFormat::Plain => format!("{} {}={value}", self.ha_id, event.key),
            OutputFormat::Table => {
                let time = Local::now().format("%H:%M:%S").to_string();
                let value = output::short_value(value);
                let unit = event.unit.as_deref().unwrap_or_default();
                if self.color {
                    format!(
                        "{} {} {} = {} {unit}",
                        time.dimmed(),
                        self.ha_id.cyan(),
                        event.key,
                        value.bold()
                    )
                } else {
                    format!("{time} {} {} = {value} {unit}", self.ha_id, event.key)
                }
            }
        };
        Some(line.trim_end().to_owned())
    }
}

impl EventListener for EventPrinter {
    fn on_event(&self, event: &Event) {
        if let Some(line) = self.render(event) {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{line}");
        }
    }

    fn on_reconnect(&self) {
        if matches!(self.format, OutputFormat::Table) {
            eprintln!("{}: stream reconnecting, events may have been missed", self.ha_id);
        }
    }
}
