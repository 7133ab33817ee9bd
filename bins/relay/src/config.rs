use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

pub use pipeline::config::{ForwardConfig, InputConfig, LogConfig};

use crate::error::RunError;

#[derive(Parser)]
#[command(name = "serial-relay", about = "Serial телеметрия → CSV лог + downsampled relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Читать устройство до EOF или Ctrl+C
    Run(RunArgs),
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Путь к TOML конфиг файлу (если файла нет — значения по умолчанию)
    #[arg(long, default_value = "relay.toml", env = "RELAY_CONFIG")]
    pub config: String,

    /// Устройство, "-" = stdin
    #[arg(long)]
    pub device: Option<String>,

    /// Relay target: unix:/path или tcp:host:port
    #[arg(long)]
    pub target: Option<String>,

    /// Каталог CSV логов
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
}

impl RelayConfig {
    /// Отсутствующий файл — значения по умолчанию (с предупреждением);
    /// нечитаемый или невалидный — ошибка.
    pub fn load(path: &str) -> Result<Self, RunError> {
        if !Path::new(path).exists() {
            tracing::warn!(config = %path, "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| RunError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content).map_err(|detail| RunError::Config { context: "parse", detail: format!("'{path}': {detail}") })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// CLI < TOML: флаги командной строки перекрывают файл.
    pub fn apply_args(&mut self, args: &RunArgs) {
        if let Some(device) = &args.device {
            self.input.device = device.clone();
        }
        if let Some(target) = &args.target {
            self.forward.target = target.clone();
        }
        if let Some(dir) = &args.data_dir {
            self.log.data_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), RunError> {
        self.input
            .validate()
            .and_then(|()| self.log.validate())
            .and_then(|()| self.forward.validate())
            .map_err(|detail| RunError::Config { context: "validate", detail })
    }
}
