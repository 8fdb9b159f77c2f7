//! Flag-aware configuration: loads the shared TOML profiles and layers the
//! global CLI flags over them to produce a `BridgeConfig`.

use std::path::PathBuf;

use homeconnect_config::{Config, Profile};
use homeconnect_core::BridgeConfig;
use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config`, else the platform location.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(homeconnect_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(homeconnect_config::load_config_from(&config_file(global))?)
}

/// Build the bridge configuration for a command.
///
/// An explicitly requested profile must exist. Without one, a missing
/// default profile is fine as long as the flags carry the credentials.
pub fn build_bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let cfg = load(global)?;
    let name = cfg.active_profile_name(global.profile.as_deref());

    let mut profile = if global.profile.is_some() {
        cfg.profile(&name)?.clone()
    } else {
        cfg.profiles.get(&name).cloned().unwrap_or_default()
    };
    apply_overrides(&mut profile, global);

    let mut bridge = homeconnect_config::profile_to_bridge_config(&profile, &name, &cfg.defaults)?;

    // Flag secrets win over anything the profile's secret chain found.
    if let Some(secret) = non_blank(global.client_secret.as_deref()) {
        bridge.client_secret = SecretString::from(secret.to_owned());
    }
    if let Some(token) = non_blank(global.refresh_token.as_deref()) {
        bridge.refresh_token = Some(SecretString::from(token.to_owned()));
    }

    tracing::debug!(
        profile = %name,
        simulation = bridge.simulation,
        base_url = ?bridge.base_url,
        "bridge configuration resolved"
    );
    Ok(bridge)
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(id) = non_blank(global.client_id.as_deref()) {
        profile.client_id = Some(id.to_owned());
    }
    // Satisfies the profile's "secret required" check; the real value is
    // applied after translation.
    if let Some(secret) = non_blank(global.client_secret.as_deref()) {
        profile.client_secret = Some(secret.to_owned());
    }
    if global.simulator {
        profile.simulator = true;
    }
    if let Some(url) = &global.base_url {
        profile.base_url = Some(url.clone());
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn global(config: &std::path::Path, extra: &[&str]) -> GlobalOpts {
        let mut args = vec!["hc", "--config", config.to_str().unwrap()];
        args.extend_from_slice(extra);
        args.push("appliances");
        Cli::try_parse_from(args).unwrap().global
    }

    fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn flags_alone_are_enough_without_a_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let opts = global(
            &path,
            &["--client-id", "cid", "--client-secret", "shh", "--refresh-token", "rt"],
        );

        let bridge = build_bridge_config(&opts).unwrap();
        assert_eq!(bridge.client_id, "cid");
        assert_eq!(bridge.client_secret.expose_secret(), "shh");
        assert_eq!(bridge.refresh_token.unwrap().expose_secret(), "rt");
        assert!(!bridge.simulation);
    }

    #[test]
    fn flags_override_profile_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
default_profile = "home"

[profiles.home]
client_id = "from-file"
client_secret = "file-secret"
refresh_token = "file-token"
timeout = 5
"#,
        );
        let opts = global(
            &path,
            &["--client-secret", "flag-secret", "--timeout", "9", "--base-url", "http://localhost:9"],
        );

        let bridge = build_bridge_config(&opts).unwrap();
        assert_eq!(bridge.client_id, "from-file");
        assert_eq!(bridge.client_secret.expose_secret(), "flag-secret");
        assert_eq!(
            bridge.refresh_token.as_ref().unwrap().expose_secret(),
            "file-token"
        );
        assert_eq!(bridge.timeout, Duration::from_secs(9));
        assert_eq!(
            bridge.effective_base_url().unwrap().as_str(),
            "http://localhost:9/"
        );
    }

    #[test]
    fn requested_profile_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[profiles.home]\nclient_id = \"x\"\n");
        let opts = global(&path, &["--profile", "work", "--client-id", "cid"]);

        let err = build_bridge_config(&opts).unwrap_err();
        assert!(matches!(err, CliError::ProfileNotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn simulator_flag_needs_no_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let opts = global(&path, &["--simulator", "--client-id", "sim-client"]);

        let bridge = build_bridge_config(&opts).unwrap();
        assert!(bridge.simulation);
        assert!(bridge.refresh_token.is_none());
    }

    #[test]
    fn missing_client_id_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let opts = global(&path, &["--client-secret", "shh"]);

        let err = build_bridge_config(&opts).unwrap_err();
        assert!(matches!(err, CliError::NoCredentials { .. }), "got: {err:?}");
    }
}
