//! Account CLI commands
//!
//! Implements CLI commands for account management.

use clap::Subcommand;

use crate::display::{format_account_details, format_account_list, format_scheduled_list};
use crate::error::{PicsouError, PicsouResult};
use crate::models::Named;

use super::{account_id, parse_amount, user_mut, user_ref, CliContext};

/// Account subcommands
#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Add {
        /// Account name
        name: String,
        /// Initial amount (e.g., "1000.00" or "1000")
        #[arg(short, long, default_value = "0")]
        initial: String,
        /// Free-form notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// List accounts with their balances
    List {
        /// Show archived accounts
        #[arg(short, long)]
        all: bool,
    },
    /// Show account details
    Show {
        /// Account name
        account: String,
    },
    /// Edit an account
    Edit {
        /// Account name
        account: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
        /// New initial amount
        #[arg(short, long)]
        initial: Option<String>,
    },
    /// Archive an account; archived accounts reject changes
    Archive {
        /// Account name
        account: String,
    },
    /// Unarchive an account
    Unarchive {
        /// Account name
        account: String,
    },
    /// Remove an account and its operations
    Remove {
        /// Account name
        account: String,
    },
}

/// Handle an account command
pub fn handle_account_command(ctx: &CliContext, cmd: AccountCommands) -> PicsouResult<()> {
    let mut service = ctx.open()?;
    let uid = ctx.unlock(&mut service)?;

    match cmd {
        AccountCommands::Add {
            name,
            initial,
            notes,
        } => {
            let initial = parse_amount(&initial)?;
            let id = user_mut(&mut service, uid)?.add_account(&name, &notes, false, initial)?;
            service.save()?;

            println!("Created account: {}", name);
            println!("  Initial Amount: {}", initial);
            println!("  ID: {}", id);
        }

        AccountCommands::List { all } => {
            let user = user_ref(&service, uid)?;
            let accounts: Vec<_> = user
                .accounts(true)
                .into_iter()
                .filter(|a| all || !a.is_archived())
                .collect();
            print!("{}", format_account_list(&accounts));
        }

        AccountCommands::Show { account } => {
            let user = user_ref(&service, uid)?;
            let id = account_id(user, &account)?;
            if let Some(found) = user.find_account(id) {
                print!("{}", format_account_details(found));
                let scheduled = found.scheduled_operations(true);
                if !scheduled.is_empty() {
                    println!();
                    print!("{}", format_scheduled_list(&scheduled));
                }
            }
        }

        AccountCommands::Edit {
            account,
            name,
            notes,
            initial,
        } => {
            if name.is_none() && notes.is_none() && initial.is_none() {
                println!("No changes specified. Use --name, --notes or --initial.");
                return Ok(());
            }
            let user = user_mut(&mut service, uid)?;
            let id = account_id(user, &account)?;
            let (current_name, current_notes, archived, current_initial) = match user.find_account(id) {
                Some(a) => (
                    a.name().to_string(),
                    a.notes().to_string(),
                    a.is_archived(),
                    a.initial_amount(),
                ),
                None => return Err(PicsouError::account_not_found(&account)),
            };
            let initial = match initial {
                Some(i) => parse_amount(&i)?,
                None => current_initial,
            };
            let name = name.unwrap_or(current_name);
            let notes = notes.unwrap_or(current_notes);

            user.update_account(id, &name, &notes, archived, initial)?;
            service.save()?;
            println!("Updated account: {}", name);
        }

        AccountCommands::Archive { account } => {
            let user = user_mut(&mut service, uid)?;
            let id = account_id(user, &account)?;
            if let Some(found) = user.find_account_mut(id) {
                found.archive();
            }
            service.save()?;
            println!("Archived account: {}", account);
        }

        AccountCommands::Unarchive { account } => {
            let user = user_mut(&mut service, uid)?;
            let id = account_id(user, &account)?;
            if let Some(found) = user.find_account_mut(id) {
                found.unarchive();
            }
            service.save()?;
            println!("Unarchived account: {}", account);
        }

        AccountCommands::Remove { account } => {
            let user = user_mut(&mut service, uid)?;
            let id = account_id(user, &account)?;
            user.remove_account(id)?;
            service.save()?;
            println!("Removed account: {}", account);
        }
    }

    Ok(())
}
