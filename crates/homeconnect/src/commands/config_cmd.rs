//! Config subcommand handlers.
//!
//! These never touch the network, so they run without a bridge.

use tabled::Tabled;

use homeconnect_config::{Config, Profile, SecretKind};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, InitArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_file(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(config::load(global)?);
            let rendered = output::render_single(global.output, &cfg, summary, |c| {
                c.default_profile.clone().unwrap_or_default()
            })?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load(global)?;
            let rows = profile_rows(&cfg);
            let rendered =
                output::render_list(global.output, &rows, ProfileRow::clone, |r| r.name.clone())?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load(global)?;
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            homeconnect_config::save_config_to(&cfg, &config::config_file(global))?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::Init(init) => handle_init(init, global),
    }
}

fn handle_init(init: InitArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_file(global);
    let mut cfg = config::load(global)?;

    let mut profile = Profile {
        client_id: Some(init.client_id),
        simulator: init.simulator,
        ..cfg.profiles.get(&init.name).cloned().unwrap_or_default()
    };

    for (kind, value) in [
        (SecretKind::ClientSecret, init.client_secret),
        (SecretKind::RefreshToken, init.refresh_token),
    ] {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        let plaintext = if init.keyring {
            homeconnect_config::store_secret(&init.name, kind, &value)?;
            if !global.quiet {
                eprintln!("Stored {} in the system keyring", kind.as_str());
            }
            None
        } else {
            Some(value)
        };
        match kind {
            SecretKind::ClientSecret => profile.client_secret = plaintext,
            SecretKind::RefreshToken => profile.refresh_token = plaintext,
        }
    }

    let first_profile = cfg.profiles.is_empty();
    cfg.profiles.insert(init.name.clone(), profile);
    if first_profile || cfg.default_profile.is_none() {
        cfg.default_profile = Some(init.name.clone());
    }

    homeconnect_config::save_config_to(&cfg, &path)?;
    if !global.quiet {
        eprintln!("Profile '{}' written to {}", init.name, path.display());
    }
    Ok(())
}

// ── Rendering ────────────────────────────────────────────────────────

fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        for secret in [&mut profile.client_secret, &mut profile.refresh_token] {
            if secret.is_some() {
                *secret = Some(REDACTED.into());
            }
        }
    }
    cfg
}

fn summary(cfg: &Config) -> String {
    let mut lines = vec![
        format!(
            "Default profile: {}",
            cfg.default_profile.as_deref().unwrap_or("(none)")
        ),
        format!(
            "Defaults:        output={} timeout={}s idle_timeout={}s",
            cfg.defaults.output, cfg.defaults.timeout, cfg.defaults.idle_timeout
        ),
    ];
    for row in profile_rows(cfg) {
        lines.push(format!(
            "[{}] client_id={} simulator={} client_secret={} refresh_token={}",
            row.name, row.client_id, row.simulator, row.client_secret, row.refresh_token
        ));
    }
    lines.join("\n")
}

#[derive(Clone, Tabled, serde::Serialize)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Default")]
    default: bool,
    #[tabled(rename = "Client ID")]
    client_id: String,
    #[tabled(rename = "Simulator")]
    simulator: bool,
    #[tabled(rename = "Client Secret")]
    client_secret: &'static str,
    #[tabled(rename = "Refresh Token")]
    refresh_token: &'static str,
}

/// Where a secret comes from, without revealing it.
fn secret_source(env: Option<&str>, plaintext: Option<&str>) -> &'static str {
    match (env, plaintext) {
        (Some(_), _) => "env",
        (None, Some(_)) => "config",
        (None, None) => "keyring/none",
    }
}

fn profile_rows(cfg: &Config) -> Vec<ProfileRow> {
    let mut rows: Vec<ProfileRow> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileRow {
            name: name.clone(),
            default: cfg.default_profile.as_deref() == Some(name.as_str()),
            client_id: p.client_id.clone().unwrap_or_default(),
            simulator: p.simulator,
            client_secret: secret_source(
                p.client_secret_env.as_deref(),
                p.client_secret.as_deref(),
            ),
            refresh_token: secret_source(
                p.refresh_token_env.as_deref(),
                p.refresh_token.as_deref(),
            ),
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}
