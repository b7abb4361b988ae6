//! CLI command handlers
//!
//! This module contains the implementation of CLI commands, bridging the
//! clap argument parsing with the document service. Every mutating command
//! opens the document, unlocks the selected user, applies the change and
//! saves.

pub mod account;
pub mod budget;
pub mod document;
pub mod operation;
pub mod payment_method;
pub mod user;

pub use account::{handle_account_command, AccountCommands};
pub use budget::{handle_budget_command, BudgetCommands};
pub use document::{handle_info_command, handle_new_command};
pub use operation::{handle_operation_command, OperationCommands};
pub use payment_method::{handle_payment_method_command, PaymentMethodCommands};
pub use user::{handle_user_command, UserCommands};

use std::path::PathBuf;

use chrono::NaiveDate;

use crate::config::{PicsouPaths, Settings};
use crate::crypto::SecureString;
use crate::error::{PicsouError, PicsouResult};
use crate::models::{AccountId, Amount, User, UserId};
use crate::storage::DocumentService;

/// Everything a command handler needs besides its own arguments
pub struct CliContext {
    pub paths: PicsouPaths,
    pub settings: Settings,
    /// Document file the command works on
    pub document: PathBuf,
    pub user: Option<String>,
    /// Password given through the environment; prompted for otherwise
    pub password: Option<SecureString>,
}

impl CliContext {
    /// Open the selected document
    pub fn open(&self) -> PicsouResult<DocumentService> {
        if !self.document.exists() {
            return Err(PicsouError::Storage(format!(
                "No document at {}. Run 'picsou new' first.",
                self.document.display()
            )));
        }
        let mut service = DocumentService::new();
        service.open(&self.document)?;
        Ok(service)
    }

    pub fn user_name(&self) -> PicsouResult<&str> {
        self.user
            .as_deref()
            .ok_or_else(|| PicsouError::Validation("This command needs --user".into()))
    }

    /// The user's password, from the environment or a hidden prompt
    pub fn password(&self, prompt: &str) -> PicsouResult<SecureString> {
        match &self.password {
            Some(password) => Ok(SecureString::new(password.as_str())),
            None => prompt_password(prompt),
        }
    }

    /// Unlock the `--user` user and return its id
    pub fn unlock(&self, service: &mut DocumentService) -> PicsouResult<UserId> {
        let name = self.user_name()?;
        let password = self.password(&format!("Password for {}: ", name))?;
        let user = service
            .document_mut()?
            .find_user_by_name_mut(name)
            .ok_or_else(|| PicsouError::user_not_found(name))?;
        user.unlock(&password)?;
        Ok(user.id())
    }
}

/// Read a password without echo
pub fn prompt_password(prompt: &str) -> PicsouResult<SecureString> {
    rpassword::prompt_password(prompt)
        .map(SecureString::from)
        .map_err(|e| PicsouError::Io(format!("Failed to read password: {}", e)))
}

/// Prompt twice for a new password until both entries match
pub fn prompt_new_password() -> PicsouResult<SecureString> {
    loop {
        let first = prompt_password("New password: ")?;
        if first.is_empty() {
            println!("Password cannot be empty. Please try again.");
            continue;
        }
        let second = prompt_password("Confirm password: ")?;
        if first.as_str() != second.as_str() {
            println!("Passwords do not match. Please try again.");
            continue;
        }
        return Ok(first);
    }
}

pub(crate) fn user_mut(service: &mut DocumentService, id: UserId) -> PicsouResult<&mut User> {
    service
        .document_mut()?
        .find_user_mut(id)
        .ok_or_else(|| PicsouError::user_not_found(id.to_string()))
}

pub(crate) fn user_ref(service: &DocumentService, id: UserId) -> PicsouResult<&User> {
    service
        .document()?
        .find_user(id)
        .ok_or_else(|| PicsouError::user_not_found(id.to_string()))
}

pub(crate) fn account_id(user: &User, name: &str) -> PicsouResult<AccountId> {
    user.find_account_by_name(name)
        .map(|a| a.id())
        .ok_or_else(|| PicsouError::account_not_found(name))
}

pub(crate) fn parse_amount(s: &str) -> PicsouResult<Amount> {
    Amount::parse(s).map_err(|e| {
        PicsouError::Validation(format!(
            "Invalid amount: '{}'. Use a format like '-20.00' or '1500'. {}",
            s, e
        ))
    })
}

/// Parse `YYYY-MM-DD`, defaulting to today
pub(crate) fn parse_date(s: Option<&str>) -> PicsouResult<NaiveDate> {
    match s {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            PicsouError::Validation(format!("Invalid date format: '{}'. Use YYYY-MM-DD", s))
        }),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
