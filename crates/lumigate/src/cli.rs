//! Clap derive structures for the `lumigate` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use lumigate_core::{ResourceFamily, ResourceKind};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lumigate -- find, pair and drive local lighting bridges
#[derive(Debug, Parser)]
#[command(
    name = "lumigate",
    version,
    about = "Discover and control local lighting bridges",
    long_about = "Finds bridges on the local network, pairs with them, and talks to both\n\
        the legacy and the resource protocol. Light identities are reconciled\n\
        across the two so reachability and serial lookups work everywhere.",
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
    /// Bridge name from the config file
    #[arg(long, short = 'b', env = "LUMIGATE_BRIDGE", global = true)]
    pub bridge: Option<String>,

    /// Bridge address (skips the config file)
    #[arg(long, short = 'a', env = "LUMIGATE_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Bridge HTTP port, used with --address
    #[arg(long, default_value_t = 80, global = true)]
    pub port: u16,

    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "LUMIGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// How results are printed
    #[arg(
        long,
        short = 'o',
        env = "LUMIGATE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Colorize tables
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Rounded table
    Table,
    /// Indented JSON
    Json,
    /// One-line JSON
    JsonCompact,
    Yaml,
    /// Bare ids, one per line
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Color when stdout is a terminal and NO_COLOR is unset
    Auto,
    Always,
    Never,
}

/// Resource families exposed for CRUD.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Family {
    Lights,
    Groups,
    Scenes,
    Sensors,
    Automations,
}

impl From<Family> for ResourceFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Lights => Self::Lights,
            Family::Groups => Self::Groups,
            Family::Scenes => Self::Scenes,
            Family::Sensors => Self::Sensors,
            Family::Automations => Self::Automations,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search the local network for bridges
    #[command(alias = "find")]
    Discover(DiscoverArgs),

    /// Show a bridge's identity and firmware without pairing
    Info,

    /// Pair with a bridge (press its link button)
    Pair(PairArgs),

    /// Remove stored credentials for a bridge
    Forget,

    /// List lights with reachability
    #[command(alias = "ls")]
    Lights,

    /// Inspect or change one light
    Light(LightArgs),

    /// Flash a light and put it back
    Blink {
        /// Light id (resource protocol)
        id: String,
    },

    /// Raw resource access by family
    #[command(alias = "res")]
    Resources(ResourcesArgs),

    /// Show how legacy and resource-protocol lights map onto each other
    Reconcile,

    /// Add a light by the six-character serial printed on it
    AddSerial {
        /// Serial, separators allowed (e.g. 0A:0B:0C)
        serial: String,
    },

    /// Start proximity pairing for lights held close to the bridge
    Touchlink,

    /// Follow the bridge's event stream
    Events(EventsArgs),

    /// Config file helpers
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Discover ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Global deadline in seconds (10-40)
    #[arg(long, short = 't')]
    pub timeout: Option<u64>,

    /// Stop as soon as one bridge is confirmed
    #[arg(long)]
    pub first: bool,

    /// Save results to the config file
    #[arg(long)]
    pub save: bool,

    /// Skip the cloud lookup
    #[arg(long)]
    pub no_cloud: bool,

    /// Skip the IP scan
    #[arg(long)]
    pub no_scan: bool,

    /// Skip the mDNS browse
    #[arg(long)]
    pub no_browse: bool,

    /// Skip SSDP
    #[arg(long)]
    pub no_multicast: bool,

    /// Extra address to probe (repeatable, host or host:port)
    #[arg(long = "probe", value_name = "ADDR")]
    pub probe: Vec<String>,
}

// ── Pair ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PairArgs {
    /// Application id sent to the bridge
    #[arg(long)]
    pub app_id: Option<String>,

    /// Make a single attempt instead of waiting for the link button
    #[arg(long)]
    pub once: bool,
}

// ── Light ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LightArgs {
    #[command(subcommand)]
    pub command: LightCommand,
}

#[derive(Debug, Subcommand)]
pub enum LightCommand {
    /// Show one light
    Get { id: String },

    /// Change on/off, brightness or color
    Set(LightSetArgs),
}

#[derive(Debug, Args)]
pub struct LightSetArgs {
    /// Light id (resource protocol)
    pub id: String,

    #[arg(long, conflicts_with = "off")]
    pub on: bool,

    #[arg(long)]
    pub off: bool,

    /// Brightness percent (0-100)
    #[arg(long, short = 'B')]
    pub brightness: Option<f64>,

    /// CIE xy chromaticity, e.g. 0.31,0.33
    #[arg(long, value_delimiter = ',', num_args = 2, conflicts_with = "mirek")]
    pub xy: Option<Vec<f64>>,

    /// Color temperature in mirek (153-500)
    #[arg(long)]
    pub mirek: Option<u16>,

    /// Transition time in milliseconds
    #[arg(long)]
    pub transition_ms: Option<u64>,
}

// ── Resources ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ResourcesArgs {
    #[command(subcommand)]
    pub command: ResourcesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ResourcesCommand {
    /// List every resource in a family
    List { family: Family },

    /// Fetch one resource
    Get { kind: ResourceKind, id: String },

    /// Create a resource from a JSON body
    Create {
        kind: ResourceKind,
        /// JSON body, or @path to read it from a file
        #[arg(long)]
        data: String,
    },

    /// Update a resource with a JSON body
    Update {
        kind: ResourceKind,
        id: String,
        /// JSON body, or @path to read it from a file
        #[arg(long)]
        data: String,
    },

    /// Apply several updates at once from a JSON array of {kind, id, body}
    Batch {
        /// JSON array, or @path to read it from a file
        #[arg(long)]
        data: String,
    },

    /// Delete a resource
    Delete { kind: ResourceKind, id: String },
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Print raw events instead of decoded ones
    #[arg(long)]
    pub raw: bool,

    /// Stop after this many events
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// List remembered bridges
    Bridges,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    pub shell: clap_complete::Shell,
}
