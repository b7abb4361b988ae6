use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use picsou::cli::{
    handle_account_command, handle_budget_command, handle_info_command, handle_new_command,
    handle_operation_command, handle_payment_method_command, handle_user_command, CliContext,
};
use picsou::config::{PicsouPaths, Settings};
use picsou::crypto::SecureString;

#[derive(Parser)]
#[command(
    name = "picsou",
    author = "koromodako",
    version,
    about = "Password-protected personal finance records",
    long_about = "Picsou keeps accounts, budgets and operations for several users in a \
                  single JSON document. Each user's data is encrypted under a master \
                  key that only their password unwraps."
)]
struct Cli {
    /// Document to work on (defaults to the configured document)
    #[arg(long, global = true, env = "PICSOU_FILE")]
    file: Option<PathBuf>,

    /// User whose data the command reads or changes
    #[arg(short, long, global = true, env = "PICSOU_USER")]
    user: Option<String>,

    /// Password of the user (prompted when absent)
    #[arg(long, global = true, env = "PICSOU_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty document
    New {
        /// Document name
        #[arg(default_value = "Picsou")]
        name: String,
        /// Document description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Show the document header and its users
    Info,

    /// User management commands
    #[command(subcommand)]
    User(picsou::cli::UserCommands),

    /// Budget management commands
    #[command(subcommand)]
    Budget(picsou::cli::BudgetCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(picsou::cli::AccountCommands),

    /// Payment method commands
    #[command(subcommand, name = "pm")]
    PaymentMethod(picsou::cli::PaymentMethodCommands),

    /// Operation commands
    #[command(subcommand, name = "op")]
    Operation(picsou::cli::OperationCommands),

    /// Show current configuration and paths
    Config,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("PICSOU_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let paths = PicsouPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    let document = cli
        .file
        .clone()
        .unwrap_or_else(|| settings.document_path(&paths));

    let ctx = CliContext {
        paths,
        settings,
        document,
        user: cli.user,
        password: cli.password.map(SecureString::from),
    };

    match cli.command {
        Some(Commands::New { name, description }) => handle_new_command(&ctx, &name, &description)?,
        Some(Commands::Info) => handle_info_command(&ctx)?,
        Some(Commands::User(cmd)) => handle_user_command(&ctx, cmd)?,
        Some(Commands::Budget(cmd)) => handle_budget_command(&ctx, cmd)?,
        Some(Commands::Account(cmd)) => handle_account_command(&ctx, cmd)?,
        Some(Commands::PaymentMethod(cmd)) => handle_payment_method_command(&ctx, cmd)?,
        Some(Commands::Operation(cmd)) => handle_operation_command(&ctx, cmd)?,
        Some(Commands::Config) => {
            println!("Picsou Configuration");
            println!("====================");
            println!("Base directory:   {}", ctx.paths.base_dir().display());
            println!("Settings file:    {}", ctx.paths.settings_file().display());
            println!("Document:         {}", ctx.document.display());
            println!();
            println!("Settings:");
            println!(
                "  KDF cost:       memory {} KiB, time {}, parallelism {}",
                ctx.settings.kdf.memory_cost,
                ctx.settings.kdf.time_cost,
                ctx.settings.kdf.parallelism
            );
            println!("  CSV delimiter:  {:?}", ctx.settings.csv_delimiter);
        }
        None => {
            println!("Picsou - password-protected personal finance records");
            println!();
            println!("Run 'picsou --help' for usage information.");
            println!("Run 'picsou new' to create a document.");
        }
    }

    Ok(())
}
