//! Account display formatting
//!
//! Formats accounts for terminal output in table and detail views.

use tabled::Tabled;

use crate::models::{Account, Amount, Named};

use super::render_table;

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Verified")]
    verified: String,
    #[tabled(rename = "Ops")]
    operations: usize,
    #[tabled(rename = "Status")]
    status: &'static str,
}

/// Format a list of accounts with balances as a table, with a total row
pub fn format_account_list(accounts: &[&Account]) -> String {
    if accounts.is_empty() {
        return "No accounts found.\n".to_string();
    }

    let mut rows: Vec<AccountRow> = accounts
        .iter()
        .map(|a| AccountRow {
            name: a.name().to_string(),
            balance: a.balance().to_string(),
            verified: a.verified_balance().to_string(),
            operations: a.operation_count(),
            status: if a.is_archived() { "Archived" } else { "" },
        })
        .collect();

    let total: Amount = accounts.iter().map(|a| a.balance()).sum();
    let total_verified: Amount = accounts.iter().map(|a| a.verified_balance()).sum();
    rows.push(AccountRow {
        name: "TOTAL".to_string(),
        balance: total.to_string(),
        verified: total_verified.to_string(),
        operations: accounts.iter().map(|a| a.operation_count()).sum(),
        status: "",
    });

    render_table(rows, &[1, 2, 3])
}

/// Format a single account's details
pub fn format_account_details(account: &Account) -> String {
    let mut output = String::new();

    output.push_str(&format!("Account: {}\n", account.name()));
    output.push_str(&format!("  ID:               {}\n", account.id()));
    output.push_str(&format!(
        "  Archived:         {}\n",
        if account.is_archived() { "Yes" } else { "No" }
    ));
    output.push('\n');
    output.push_str(&format!("  Initial Amount:   {}\n", account.initial_amount()));
    output.push_str(&format!("  Balance:          {}\n", account.balance()));
    output.push_str(&format!("  Verified Balance: {}\n", account.verified_balance()));
    output.push_str(&format!("  Operations:       {}\n", account.operation_count()));

    let methods = account.payment_method_names(true);
    if !methods.is_empty() {
        output.push_str(&format!("  Payment Methods:  {}\n", methods.join(", ")));
    }

    if !account.notes().is_empty() {
        output.push('\n');
        output.push_str(&format!("  Notes: {}\n", account.notes()));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfCost;
    use crate::models::{OperationFields, User};
    use chrono::NaiveDate;

    fn user_with_accounts() -> User {
        let mut user = User::new("alice", "pw", &KdfCost::minimal()).unwrap();
        let checking = user
            .add_account("Checking", "main account", false, Amount::from_cents(100000))
            .unwrap();
        user.add_account("Savings", "", false, Amount::from_cents(500000))
            .unwrap();
        let account = user.find_account_mut(checking).unwrap();
        account.add_payment_method("Card").unwrap();
        account
            .add_operation(OperationFields::new(
                Amount::from_cents(-2000),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ))
            .unwrap();
        user
    }

    #[test]
    fn test_format_account_list() {
        let user = user_with_accounts();
        let output = format_account_list(&user.accounts(true));

        assert!(output.contains("Checking"));
        assert!(output.contains("Savings"));
        assert!(output.contains("TOTAL"));
        assert!(output.contains("980.00"));
        assert!(output.contains("5980.00"));
    }

    #[test]
    fn test_format_empty_list() {
        assert!(format_account_list(&[]).contains("No accounts found"));
    }

    #[test]
    fn test_format_account_details() {
        let user = user_with_accounts();
        let account = user.find_account_by_name("Checking").unwrap();
        let output = format_account_details(account);

        assert!(output.contains("Account: Checking"));
        assert!(output.contains("Balance:          980.00"));
        assert!(output.contains("Payment Methods:  Card"));
        assert!(output.contains("main account"));
    }
}
