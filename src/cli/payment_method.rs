//! Payment method CLI commands

use clap::Subcommand;

use crate::error::{PicsouError, PicsouResult};

use super::{account_id, user_mut, user_ref, CliContext};

/// Payment method subcommands
#[derive(Subcommand)]
pub enum PaymentMethodCommands {
    /// Add a payment method to an account
    Add {
        /// Account name
        account: String,
        /// Payment method name (e.g., "Card", "Cheque")
        name: String,
    },
    /// List an account's payment methods
    List {
        /// Account name
        account: String,
    },
    /// Remove a payment method
    Remove {
        /// Account name
        account: String,
        /// Payment method name
        name: String,
    },
}

pub fn handle_payment_method_command(
    ctx: &CliContext,
    cmd: PaymentMethodCommands,
) -> PicsouResult<()> {
    let mut service = ctx.open()?;
    let uid = ctx.unlock(&mut service)?;

    match cmd {
        PaymentMethodCommands::Add { account, name } => {
            let user = user_mut(&mut service, uid)?;
            let id = account_id(user, &account)?;
            user.find_account_mut(id)
                .ok_or_else(|| PicsouError::account_not_found(&account))?
                .add_payment_method(&name)?;
            service.save()?;
            println!("Added payment method '{}' to {}", name, account);
        }

        PaymentMethodCommands::List { account } => {
            let user = user_ref(&service, uid)?;
            let id = account_id(user, &account)?;
            let names = user
                .find_account(id)
                .map(|a| a.payment_method_names(true))
                .unwrap_or_default();
            if names.is_empty() {
                println!("No payment methods found.");
            }
            for name in names {
                println!("  {}", name);
            }
        }

        PaymentMethodCommands::Remove { account, name } => {
            let user = user_mut(&mut service, uid)?;
            let id = account_id(user, &account)?;
            let found = user
                .find_account_mut(id)
                .ok_or_else(|| PicsouError::account_not_found(&account))?;
            let pm = found
                .find_payment_method_by_name(&name)
                .map(|pm| pm.id())
                .ok_or_else(|| PicsouError::payment_method_not_found(&name))?;
            found.remove_payment_method(pm)?;
            service.save()?;
            println!("Removed payment method: {}", name);
        }
    }

    Ok(())
}
