//! Budget CLI commands
//!
//! Budgets belong to the `--user` user and live in its encrypted payload.

use clap::Subcommand;

use crate::display::format_budget_list;
use crate::error::{PicsouError, PicsouResult};
use crate::models::Named;

use super::{parse_amount, user_mut, user_ref, CliContext};

/// Budget subcommands
#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Create a budget
    Add {
        /// Budget name
        name: String,
        /// Amount (e.g., "400" or "400.00")
        amount: String,
        /// Description
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List budgets
    List,
    /// Change a budget
    Edit {
        /// Budget name
        name: String,
        /// New name
        #[arg(short, long)]
        rename: Option<String>,
        /// New amount
        #[arg(short, long)]
        amount: Option<String>,
        /// New description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Delete a budget
    Remove {
        /// Budget name
        name: String,
    },
}

/// Handle a budget command
pub fn handle_budget_command(ctx: &CliContext, cmd: BudgetCommands) -> PicsouResult<()> {
    let mut service = ctx.open()?;
    let uid = ctx.unlock(&mut service)?;

    match cmd {
        BudgetCommands::Add {
            name,
            amount,
            description,
        } => {
            let amount = parse_amount(&amount)?;
            user_mut(&mut service, uid)?.add_budget(amount, &name, &description)?;
            service.save()?;
            println!("Created budget: {} ({})", name, amount);
        }

        BudgetCommands::List => {
            let user = user_ref(&service, uid)?;
            print!("{}", format_budget_list(&user.budgets(true)));
        }

        BudgetCommands::Edit {
            name,
            rename,
            amount,
            description,
        } => {
            if rename.is_none() && amount.is_none() && description.is_none() {
                println!("No changes specified. Use --rename, --amount or --description.");
                return Ok(());
            }
            let user = user_mut(&mut service, uid)?;
            let budget = user
                .find_budget_by_name(&name)
                .ok_or_else(|| PicsouError::budget_not_found(&name))?;
            let id = budget.id();
            let amount = match amount {
                Some(a) => parse_amount(&a)?,
                None => budget.amount(),
            };
            let new_name = rename.unwrap_or_else(|| budget.name().to_string());
            let description = description.unwrap_or_else(|| budget.description().to_string());

            user.update_budget(id, amount, &new_name, &description)?;
            service.save()?;
            println!("Updated budget: {}", new_name);
        }

        BudgetCommands::Remove { name } => {
            let user = user_mut(&mut service, uid)?;
            let id = user
                .find_budget_by_name(&name)
                .map(|b| b.id())
                .ok_or_else(|| PicsouError::budget_not_found(&name))?;
            user.remove_budget(id)?;
            service.save()?;
            println!("Removed budget: {}", name);
        }
    }

    Ok(())
}
