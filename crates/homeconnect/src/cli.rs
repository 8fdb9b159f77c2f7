//! Clap derive structures for the `hc` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hc -- query and control Home Connect appliances
#[derive(Debug, Parser)]
#[command(
    name = "hc",
    version,
    about = "Query and control Home Connect appliances from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "HOMECONNECT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Account profile to use
    #[arg(long, short = 'p', env = "HOMECONNECT_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Talk to the simulator (authorization-code flow, no refresh token)
    #[arg(long, env = "HOMECONNECT_SIMULATOR", global = true)]
    pub simulator: bool,

    /// OAuth client id (overrides profile)
    #[arg(long, env = "HOMECONNECT_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// OAuth client secret (overrides profile)
    #[arg(long, env = "HOMECONNECT_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth refresh token (overrides profile)
    #[arg(long, env = "HOMECONNECT_REFRESH_TOKEN", global = true, hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// API base URL (overrides the production/simulator host)
    #[arg(long, env = "HOMECONNECT_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMECONNECT_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HOMECONNECT_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List paired appliances
    #[command(alias = "ls")]
    Appliances,

    /// Show one appliance
    Appliance(ApplianceArgs),

    /// Read or change appliance settings
    Setting(SettingArgs),

    /// Read appliance status values
    Status(StatusArgs),

    /// Show the active or selected program
    #[command(alias = "prog")]
    Program(ProgramArgs),

    /// Switch an appliance on, off, or to standby
    Power(PowerArgs),

    /// Stream appliance events until interrupted
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Appliances ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApplianceArgs {
    /// Appliance id (haId)
    pub ha_id: String,
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingArgs {
    #[command(subcommand)]
    pub command: SettingCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingCommand {
    /// Read one setting, or all settings when no key is given
    Get {
        /// Appliance id (haId)
        ha_id: String,
        /// Setting key, e.g. BSH.Common.Setting.PowerState
        key: Option<String>,
    },

    /// Change a setting
    Set {
        /// Appliance id (haId)
        ha_id: String,
        /// Setting key
        key: String,
        /// New value; JSON literals (true, 4, -18.5) are sent typed,
        /// anything else as a string
        value: String,
    },
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Appliance id (haId)
    pub ha_id: String,
    /// Status key; all status values when omitted
    pub key: Option<String>,
}

// ── Programs ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProgramArgs {
    #[command(subcommand)]
    pub command: ProgramCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProgramCommand {
    /// The program currently running
    Active {
        /// Appliance id (haId)
        ha_id: String,
    },
    /// The program selected on the appliance
    Selected {
        /// Appliance id (haId)
        ha_id: String,
    },
}

// ── Power ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PowerArgs {
    /// Target power state
    pub state: PowerState,
    /// Appliance id (haId)
    pub ha_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
    Standby,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Appliance ids (haId) to watch
    #[arg(required = true)]
    pub ha_ids: Vec<String>,

    /// Only print events whose key starts with this prefix
    #[arg(long, short = 'k')]
    pub key_prefix: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Create or replace a profile
    Init(InitArgs),

    /// List profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub name: String,

    /// OAuth client id
    #[arg(long = "id")]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long = "secret")]
    pub client_secret: Option<String>,

    /// OAuth refresh token
    #[arg(long = "token")]
    pub refresh_token: Option<String>,

    /// Profile talks to the simulator
    #[arg(long = "sim")]
    pub simulator: bool,

    /// Store secrets in the system keyring instead of the config file
    #[arg(long)]
    pub keyring: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
