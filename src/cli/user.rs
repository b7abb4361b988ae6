//! User CLI commands

use clap::Subcommand;

use crate::crypto::SecureString;
use crate::error::{PicsouError, PicsouResult};
use crate::models::{Named, User};

use super::{prompt_new_password, CliContext};

/// User subcommands
#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a user with a new password
    Add {
        /// User name
        name: String,
    },
    /// List the document's users
    List,
    /// Change a user's password
    Passwd {
        /// User name
        name: String,
        /// New password (prompted when absent)
        #[arg(long, env = "PICSOU_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
    },
    /// Rename a user
    Rename {
        /// Current name
        name: String,
        /// New name
        new_name: String,
    },
    /// Remove a user and all of their data
    Remove {
        /// User name
        name: String,
    },
}

/// Handle a user command
pub fn handle_user_command(ctx: &CliContext, cmd: UserCommands) -> PicsouResult<()> {
    let mut service = ctx.open()?;

    match cmd {
        UserCommands::Add { name } => {
            let password = match &ctx.password {
                Some(password) => SecureString::new(password.as_str()),
                None => prompt_new_password()?,
            };
            let user = User::new(&name, &password, &ctx.settings.kdf)?;
            service.document_mut()?.add_user(user)?;
            service.save()?;
            println!("Created user: {}", name);
        }

        UserCommands::List => {
            let document = service.document()?;
            let users = document.users(true);
            if users.is_empty() {
                println!("No users found.");
            }
            for user in users {
                println!("  {}", user.name());
            }
        }

        UserCommands::Passwd { name, new_password } => {
            let old = ctx.password(&format!("Current password for {}: ", name))?;
            let new = match new_password {
                Some(password) => SecureString::from(password),
                None => prompt_new_password()?,
            };
            if old.is_empty() || new.is_empty() {
                return Err(PicsouError::Validation(
                    "Both the current and the new password are required".into(),
                ));
            }
            service
                .document_mut()?
                .find_user_by_name_mut(&name)
                .ok_or_else(|| PicsouError::user_not_found(&name))?
                .rewrap(&old, &new)?;
            service.save()?;
            println!("Password changed for: {}", name);
        }

        UserCommands::Rename { name, new_name } => {
            let document = service.document_mut()?;
            let id = document
                .find_user_by_name(&name)
                .map(|u| u.id())
                .ok_or_else(|| PicsouError::user_not_found(&name))?;
            document.update_user(id, &new_name, "", "")?;
            service.save()?;
            println!("Renamed user: {} -> {}", name, new_name);
        }

        UserCommands::Remove { name } => {
            // Removing someone's data requires their password
            let uid = {
                let password = ctx.password(&format!("Password for {}: ", name))?;
                let user = service
                    .document_mut()?
                    .find_user_by_name_mut(&name)
                    .ok_or_else(|| PicsouError::user_not_found(&name))?;
                user.unlock(&password)?;
                user.id()
            };
            service.document_mut()?.remove_user(uid)?;
            service.save()?;
            println!("Removed user: {}", name);
        }
    }

    Ok(())
}
