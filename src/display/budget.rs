//! Budget display formatting

use tabled::Tabled;

use crate::models::{Budget, Named};

use super::{render_table, truncate};

#[derive(Tabled)]
struct BudgetRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Format budgets as a table
pub fn format_budget_list(budgets: &[&Budget]) -> String {
    if budgets.is_empty() {
        return "No budgets found.\n".to_string();
    }
    let rows = budgets
        .iter()
        .map(|b| BudgetRow {
            name: b.name().to_string(),
            amount: b.amount().to_string(),
            description: truncate(b.description(), 40),
        })
        .collect();
    render_table(rows, &[1])
}
