//! CLI argument definitions using Clap

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::application::ports::FormFields;
use crate::domain::config::{AppConfig, SubmitMode};

/// recform - record audio and attach it to a form submission
#[derive(Parser, Debug)]
#[command(name = "recform")]
#[command(version)]
#[command(about = "Record microphone and system audio and submit it with a form")]
#[command(long_about = None)]
pub struct Cli {
    /// Do not capture the microphone
    #[arg(long)]
    pub no_mic: bool,

    /// Capture system audio (loopback / monitor source)
    #[arg(short = 's', long)]
    pub system_audio: bool,

    /// Exact microphone device id (see `recform devices`)
    #[arg(short = 'D', long, value_name = "ID")]
    pub device: Option<String>,

    /// Form endpoint the recording is submitted to
    #[arg(short = 'e', long, value_name = "URL", global = true)]
    pub endpoint: Option<String>,

    /// Submit right after recording, or wait for `submit`
    #[arg(short = 'm', long, value_name = "MODE")]
    pub mode: Option<SubmitModeArg>,

    /// Context name used in the downloaded file name
    #[arg(short = 'c', long, value_name = "NAME")]
    pub context: Option<String>,

    /// Extra form field sent with the submission (repeatable)
    #[arg(
        short = 'f',
        long = "field",
        value_name = "NAME=VALUE",
        value_parser = FormFields::parse_pair,
        global = true
    )]
    pub fields: Vec<(String, String)>,

    /// Directory finished recordings are saved to
    #[arg(long, value_name = "DIR")]
    pub download_dir: Option<String>,

    /// Do not save a local copy of the recording
    #[arg(long)]
    pub no_download: bool,

    /// Encoder chunk interval in milliseconds (0 = one continuous chunk)
    #[arg(long, value_name = "MS")]
    pub timeslice_ms: Option<u64>,

    /// Use a simulated capture backend instead of real devices
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Config layer built from the command line. Unset flags stay `None`
    /// so file values survive the merge.
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            endpoint: self.endpoint.clone(),
            context_name: self.context.clone(),
            submit_mode: self.mode.map(|m| SubmitMode::from(m).to_string()),
            timeslice_ms: self.timeslice_ms,
            download: if self.no_download { Some(false) } else { None },
            download_dir: self.download_dir.clone(),
            microphone: if self.no_mic { Some(false) } else { None },
            system_audio: if self.system_audio { Some(true) } else { None },
            device_id: self.device.clone(),
            form: if self.fields.is_empty() {
                None
            } else {
                Some(self.fields.iter().cloned().collect::<BTreeMap<_, _>>())
            },
            ..AppConfig::empty()
        }
    }
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available microphones
    Devices,
    /// Show which recording formats are supported
    Formats,
    /// Submit an existing audio file with the form
    Send {
        /// Audio file; its extension decides the MIME type
        path: PathBuf,
        /// Multipart field carrying the file
        #[arg(long, value_name = "NAME")]
        file_field: Option<String>,
        /// Field marking that a file accompanies the form
        #[arg(long, value_name = "NAME")]
        marker_field: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Submit mode argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum SubmitModeArg {
    Auto,
    Manual,
}

impl From<SubmitModeArg> for SubmitMode {
    fn from(arg: SubmitModeArg) -> Self {
        match arg {
            SubmitModeArg::Auto => SubmitMode::Auto,
            SubmitModeArg::Manual => SubmitMode::Manual,
        }
    }
}

/// Valid config keys. `form.<name>` keys are accepted on top of these.
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "endpoint",
    "context_name",
    "submit_mode",
    "formats",
    "timeslice_ms",
    "download",
    "download_dir",
    "file_field",
    "marker_field",
    "microphone",
    "system_audio",
    "device_id",
    "warn_discarded_video",
];

/// Prefix of static form field keys
pub const FORM_KEY_PREFIX: &str = "form.";

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
        || key
            .strip_prefix(FORM_KEY_PREFIX)
            .is_some_and(|name| !name.trim().is_empty())
}
