use std::time::Duration;

use clap::{Parser, Subcommand};

use securehub_db::DbConfig;
use securehub_service::AttachmentConfig;
use securehub_store::StoreConfig;

#[derive(Debug, Parser)]
#[command(name = "securehub-server", about = "SecureHub attachment lifecycle service")]
pub struct ServerConfig {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to bind the HTTP listener to
    #[arg(long, env = "SECUREHUB_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    #[arg(long, env = "SECUREHUB_PORT", default_value = "3720")]
    pub port: u16,

    /// Postgres connection string; SQLite is used when absent
    #[arg(long, env = "SECUREHUB_DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "SECUREHUB_SQLITE_PATH")]
    pub sqlite_path: Option<String>,

    /// Directory for the local object store (ignored when S3 is configured)
    #[arg(long, env = "SECUREHUB_OBJECT_DIR")]
    pub object_dir: Option<String>,

    /// Seconds between reaper sweeps
    #[arg(long)]
    pub reaper_interval: Option<u64>,

    /// Seconds a record may stay PENDING before the reaper reclaims it
    #[arg(long)]
    pub max_pending_age: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the health endpoint and run the reaper (default)
    Serve,
    /// Run a single reaper sweep and print the report
    Reap,
    /// List attachments of a request, or of one of its comments
    List {
        request_id: String,
        #[arg(long)]
        comment: Option<String>,
    },
}

impl ServerConfig {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    pub fn db_config(&self) -> DbConfig {
        let mut config = DbConfig::from_env();
        if self.database_url.is_some() {
            config.database_url = self.database_url.clone();
        }
        if self.sqlite_path.is_some() {
            config.sqlite_path = self.sqlite_path.clone();
        }
        config
    }

    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::from_env();
        if self.object_dir.is_some() {
            config.local_data_dir = self.object_dir.clone();
        }
        config
    }

    pub fn attachment_config(&self) -> AttachmentConfig {
        let mut config = AttachmentConfig::from_env();
        if let Some(secs) = self.reaper_interval {
            config.reaper_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_pending_age {
            config.max_pending_age = Duration::from_secs(secs);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_serve() {
        let config = ServerConfig::parse_from(["securehub-server"]);
        assert_eq!(config.command(), Command::Serve);
        assert_eq!(config.port, 3720);
    }

    #[test]
    fn list_subcommand() {
        let config =
            ServerConfig::parse_from(["securehub-server", "list", "req-1", "--comment", "com-2"]);
        assert_eq!(
            config.command(),
            Command::List {
                request_id: "req-1".into(),
                comment: Some("com-2".into()),
            }
        );
    }

    #[test]
    fn flags_override_attachment_config() {
        let config = ServerConfig::parse_from([
            "securehub-server",
            "--reaper-interval",
            "60",
            "--max-pending-age",
            "3600",
            "reap",
        ]);
        assert_eq!(config.command(), Command::Reap);
        let attachments = config.attachment_config();
        assert_eq!(attachments.reaper_interval, Duration::from_secs(60));
        assert_eq!(attachments.max_pending_age, Duration::from_secs(3600));
    }

    #[test]
    fn sqlite_path_flag_wins() {
        let config =
            ServerConfig::parse_from(["securehub-server", "--sqlite-path", "/tmp/sh.db"]);
        assert_eq!(config.db_config().sqlite_path.as_deref(), Some("/tmp/sh.db"));
    }
}
