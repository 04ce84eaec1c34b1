//! FieldOps crash log CLI
//!
//! Thin wrapper around `fieldops_core` for driving and inspecting a crash log
//! from a terminal.
//!
//! ## Usage
//!
//! ```bash
//! # Append an entry
//! fieldops --log-dir /tmp/crash log warning "gps signal lost" --meta ticketId=INC-7
//!
//! # Print the whole file
//! fieldops --log-dir /tmp/crash show
//!
//! # Truncate to a fresh header
//! fieldops --log-dir /tmp/crash clear
//!
//! # Demonstrate panic capture
//! fieldops --log-dir /tmp/crash panic
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use fieldops_core::crash_log::install_panic_hook;
use fieldops_core::{
    core_version, default_log_level, init_logging, CrashCapture, CrashLogConfig, CrashLogger,
    ErrorReport, LogKind, Metadata,
};
use serde_json::Value;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LOG_DIR: &str = "crash-logs";
const PANIC_THREAD_NAME: &str = "fieldops-panic-demo";

/// FieldOps crash log tool
#[derive(Parser)]
#[command(name = "fieldops")]
#[command(version)]
#[command(about = "Write, inspect and clear a FieldOps crash log")]
struct Cli {
    /// Crash log directory (default: ./crash-logs)
    #[arg(short, long, global = true)]
    log_dir: Option<PathBuf>,

    /// JSON file with crash log settings; `--log-dir` overrides its `log_dir`
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write rolling diagnostics logs under `<log-dir>/diagnostics`
    #[arg(long, global = true)]
    diagnostics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append one entry
    Log {
        /// Entry kind: error, crash, warning or info
        kind: String,

        /// Entry message
        message: String,

        /// Stack trace text
        #[arg(long)]
        stack: Option<String>,

        /// Metadata field as key=value; JSON values are kept typed
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,

        /// Mark a crash entry as fatal
        #[arg(long)]
        fatal: bool,
    },

    /// Print the crash log
    Show,

    /// Truncate the crash log to a fresh header
    Clear,

    /// Print the crash log size
    Size,

    /// Print the crash log path
    Where,

    /// Print crash log settings and state
    Status,

    /// Panic on a worker thread to show hook capture
    Panic {
        /// Panic message
        #[arg(default_value = "demo panic from fieldops cli")]
        message: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.log_dir)?;
    let logger = CrashLogger::new(config).map_err(|err| anyhow!(err))?;

    if cli.diagnostics {
        let diagnostics_dir = logger.config().log_dir.join("diagnostics");
        init_logging(
            default_log_level(),
            &diagnostics_dir.display().to_string(),
            Some(CrashCapture::from_logger(&logger)),
        )
        .map_err(|err| anyhow!(err))?;
    }

    let outcome = run(&logger, cli.command);
    if !logger.flush(FLUSH_TIMEOUT) {
        eprintln!("warning: {} entries were not written", logger.pending());
    }
    outcome
}

fn run(logger: &Arc<CrashLogger>, command: Commands) -> Result<()> {
    match command {
        Commands::Log {
            kind,
            message,
            stack,
            meta,
            fatal,
        } => {
            let kind = LogKind::parse(&kind)
                .ok_or_else(|| anyhow!("unknown kind `{kind}`; use error|crash|warning|info"))?;
            let metadata = parse_meta(&meta)?;
            let report = ErrorReport::new(message, stack);
            match kind {
                LogKind::Error => logger.log_error_report(report, metadata),
                LogKind::Crash => {
                    if metadata.is_some() {
                        bail!("crash entries carry isFatal/platform metadata only");
                    }
                    logger.log_crash(report, fatal, None)
                }
                LogKind::Warning => logger.log_warning(report.message, metadata),
                LogKind::Info => logger.log_info(report.message, metadata),
            }
            println!("Queued {} entry.", kind.as_str());
        }

        Commands::Show => {
            print!("{}", logger.get_logs());
        }

        Commands::Clear => {
            if !logger.clear_logs() {
                bail!("failed to clear crash log");
            }
            println!("Crash log cleared.");
        }

        Commands::Size => {
            println!("{}", logger.get_log_file_size());
        }

        Commands::Where => match logger.get_log_file_location() {
            Some(path) => println!("{}", path.display()),
            None => println!("(no crash log yet)"),
        },

        Commands::Status => {
            let config = logger.config();
            println!("FieldOps crash log v{}", core_version());
            println!();
            println!("File:     {}", config.log_path().display());
            println!("Backup:   {}", config.backup_path().display());
            println!("Platform: {}", config.platform);
            println!("Rotates:  above {} bytes", config.max_size_bytes);
            println!("Size:     {}", logger.get_log_file_size());
            println!("Has logs: {}", logger.has_logs());
        }

        Commands::Panic { message } => {
            install_panic_hook(logger.clone(), logger.config().platform.clone());
            let worker = thread::Builder::new()
                .name(PANIC_THREAD_NAME.to_string())
                .spawn(move || panic!("{message}"))
                .context("failed to spawn panic thread")?;
            if worker.join().is_ok() {
                bail!("worker thread did not panic");
            }
            println!("Panic captured as a crash entry.");
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>, log_dir: Option<PathBuf>) -> Result<CrashLogConfig> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config `{}`", path.display()))?;
            serde_json::from_str::<CrashLogConfig>(&raw)
                .with_context(|| format!("invalid config `{}`", path.display()))?
        }
        None => CrashLogConfig::default(),
    };

    if let Some(dir) = log_dir {
        config.log_dir = dir;
    } else if config.log_dir.as_os_str().is_empty() {
        config.log_dir = PathBuf::from(DEFAULT_LOG_DIR);
    }
    if config.log_dir.is_relative() {
        let cwd = std::env::current_dir().context("failed to resolve current directory")?;
        config.log_dir = cwd.join(&config.log_dir);
    }
    Ok(config)
}

fn parse_meta(pairs: &[String]) -> Result<Option<Metadata>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("metadata `{pair}` must look like key=value"))?;
        if key.trim().is_empty() {
            bail!("metadata `{pair}` has an empty key");
        }
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        metadata.insert(key.trim().to_string(), value);
    }
    Ok(Some(metadata))
}

#[cfg(test)]
mod tests {
    use super::parse_meta;
    use serde_json::json;

    #[test]
    fn meta_values_keep_json_types() {
        let metadata = parse_meta(&[
            "ticketId=INC-7".to_string(),
            "retries=3".to_string(),
            "offline=true".to_string(),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(metadata.get("ticketId"), Some(&json!("INC-7")));
        assert_eq!(metadata.get("retries"), Some(&json!(3)));
        assert_eq!(metadata.get("offline"), Some(&json!(true)));
    }

    #[test]
    fn meta_rejects_missing_separator() {
        assert!(parse_meta(&["ticketId".to_string()]).is_err());
        assert!(parse_meta(&["=x".to_string()]).is_err());
        assert!(parse_meta(&[]).unwrap().is_none());
    }
}
