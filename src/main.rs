// Group Budget - Admin CLI
// Database setup and account maintenance without going through the API

use anyhow::Result;
use clap::{Parser, Subcommand};
use group_budget::config::{self, DatabaseConfig};
use group_budget::{identity, open_database};

#[derive(Parser)]
#[command(name = "group-budget", version, about = "Group Budget administration")]
struct Cli {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and its tables
    Init,
    /// Mark an account as confirmed without the emailed token
    Confirm { email: String },
    /// List every account with its group count
    Users,
    /// Delete an account and everything it owns
    DestroyUser { email: String },
}

fn main() -> Result<()> {
    config::load_dotenv();
    let cli = Cli::parse();
    config::init_logging(false)?;

    let db_path = &cli.database.path;
    let conn = open_database(db_path)?;

    match cli.command {
        Command::Init => {
            println!("🗄️  Group Budget - Database");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            println!("✓ Database initialized with WAL mode: {}", db_path.display());
        }
        Command::Confirm { email } => {
            let user = identity::confirm_by_email(&conn, &email)?;
            println!("✓ Confirmed {} <{}>", user.name, user.email);
        }
        Command::Users => {
            let accounts = identity::list_accounts(&conn)?;
            println!("👥 {} account(s)", accounts.len());
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for (user, groups) in accounts {
                let status = if user.is_confirmed() { "✓" } else { "…" };
                println!("{} {:<30} {:<20} {} group(s)", status, user.email, user.name, groups);
            }
        }
        Command::DestroyUser { email } => {
            let user = identity::destroy_by_email(&conn, &email)?;
            println!(
                "🗑️  Destroyed {} <{}> with all groups and movements",
                user.name, user.email
            );
        }
    }

    Ok(())
}
