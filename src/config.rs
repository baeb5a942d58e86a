// ⚙️ Configuration & Logging
//
// Settings come from flags, then environment (a `.env` file is honoured),
// then defaults.

use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_DATABASE: &str = "group_budget.db";
pub const DEFAULT_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_LOG_FILTER: &str = "group_budget=info,tower_http=info";

/// Where the SQLite file lives
#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    /// Path to the SQLite database
    #[arg(long = "database", env = "GROUP_BUDGET_DB", default_value = DEFAULT_DATABASE)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Address to listen on
    #[arg(long, env = "GROUP_BUDGET_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,

    /// Emit logs as JSON lines
    #[arg(long, env = "GROUP_BUDGET_LOG_JSON")]
    pub log_json: bool,
}

/// Load `.env` if present. Missing file is fine.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        server: ServerConfig,
    }

    #[test]
    fn test_explicit_flags() {
        let cli = TestCli::parse_from([
            "test",
            "--database",
            "/tmp/budget.db",
            "--addr",
            "127.0.0.1:8080",
            "--log-json",
        ]);
        assert_eq!(cli.server.database.path, PathBuf::from("/tmp/budget.db"));
        assert_eq!(cli.server.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(cli.server.log_json);
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
