// Group Budget - Web Server
// JSON API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use group_budget::config::{self, ServerConfig};
use group_budget::open_database;
use group_budget::server::{router, AppState};
use tracing::info;

#[derive(Parser)]
#[command(name = "group-budget-server", version, about = "Group Budget JSON API")]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_dotenv();
    let cli = Cli::parse();
    config::init_logging(cli.config.log_json)?;

    let db_path = &cli.config.database.path;
    let conn = open_database(db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    info!(path = %db_path.display(), "database opened");

    let app = router(AppState::new(conn));

    let listener = tokio::net::TcpListener::bind(cli.config.addr)
        .await
        .with_context(|| format!("failed to bind {}", cli.config.addr))?;

    info!(addr = %cli.config.addr, version = group_budget::VERSION, "server running");
    axum::serve(listener, app).await?;

    Ok(())
}
