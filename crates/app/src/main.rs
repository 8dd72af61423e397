mod config;
mod logging;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use services::{AppServices, Clock};
use storage::repository::Storage;
use web::AppState;

use crate::config::AppConfig;

/// Self-paced study planner with an AI tutor.
#[derive(Debug, Parser)]
#[command(name = "study", version, about)]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true, env = "STUDY_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace or a full directive)
    #[arg(long, global = true, env = "STUDY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Disable colored log output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate the database and serve the HTTP API
    Serve(ServeArgs),
    /// Create or update the database schema, then exit
    Migrate(DbArgs),
}

#[derive(Debug, Args)]
struct DbArgs {
    /// SQLite URL or file path
    #[arg(long)]
    db: Option<String>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    db: DbArgs,

    /// Address to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Directory for uploaded documents
    #[arg(long)]
    upload_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.log_level = Some(level.clone());
        }
        config.no_color |= self.no_color;
        let db = match &self.command {
            Command::Serve(args) => {
                if let Some(bind) = args.bind {
                    config.bind = bind;
                }
                if let Some(dir) = &args.upload_dir {
                    config.upload_dir.clone_from(dir);
                }
                &args.db
            }
            Command::Migrate(args) => args,
        };
        if let Some(url) = &db.db {
            config.db_url.clone_from(url);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.db_url = normalize_sqlite_url(&config.db_url);
    logging::init(config.log_level.as_deref(), config.no_color)?;

    match cli.command {
        Command::Serve(_) => serve(config).await,
        Command::Migrate(_) => migrate(&config).await,
    }
}

async fn migrate(config: &AppConfig) -> Result<()> {
    ensure_db_dir(&config.db_url)?;
    Storage::sqlite(&config.db_url)
        .await
        .with_context(|| format!("could not migrate {}", config.db_url))?;
    info!(db = %config.db_url, "database is up to date");
    Ok(())
}

async fn serve(config: AppConfig) -> Result<()> {
    let services_config = config.services_config()?;
    if services_config.llm.is_none() {
        info!("no AI key configured; tutor, quizzes and summaries use fallback text");
    }
    ensure_db_dir(&config.db_url)?;
    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("could not create {}", config.upload_dir.display()))?;

    let services = AppServices::new_sqlite(&config.db_url, Clock::system(), services_config)
        .await
        .with_context(|| format!("could not open {}", config.db_url))?;
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("could not bind {}", config.bind))?;
    web::serve(listener, AppState::new(services)).await?;
    Ok(())
}

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("sqlite::memory:") || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the directory holding the database file; `SQLite` creates the file.
fn ensure_db_dir(db_url: &str) -> Result<()> {
    if db_url.starts_with("sqlite::memory:") {
        return Ok(());
    }
    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database URL: {db_url}");
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("invalid database URL: {db_url}");
    }
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/a.db"), "sqlite:///tmp/a.db");
        assert_eq!(normalize_sqlite_url("/var/study.db"), "sqlite:///var/study.db");
        assert_eq!(normalize_sqlite_url("sqlite:/var/study.db"), "sqlite:///var/study.db");
        let relative = normalize_sqlite_url("data/study.db");
        assert!(relative.starts_with("sqlite:///"));
        assert!(relative.ends_with("/data/study.db"));
    }

    #[test]
    fn database_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("study.db");
        ensure_db_dir(&format!("sqlite://{}?mode=rwc", file.display())).unwrap();
        assert!(dir.path().join("nested").is_dir());
        assert!(ensure_db_dir("postgres://nope").is_err());
        assert!(ensure_db_dir("sqlite::memory:").is_ok());
    }

    #[test]
    fn flags_override_the_config() {
        let cli = Cli::parse_from([
            "study",
            "--log-level",
            "debug",
            "serve",
            "--db",
            "sqlite://cli.db",
            "--bind",
            "0.0.0.0:9999",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.db_url, "sqlite://cli.db");
        assert_eq!(config.bind.port(), 9999);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.upload_dir, PathBuf::from(config::DEFAULT_UPLOAD_DIR));
    }
}
