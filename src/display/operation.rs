//! Operation display formatting

use tabled::Tabled;

use crate::models::{Named, Operation, ScheduledOperation};

use super::{render_table, truncate};

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "V")]
    verified: &'static str,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Recipient")]
    srcdst: String,
    #[tabled(rename = "Budget")]
    budget: String,
    #[tabled(rename = "Method")]
    payment_method: String,
    #[tabled(rename = "Description")]
    description: String,
}

/// Format operations as a register
pub fn format_operation_register(ops: &[&Operation]) -> String {
    if ops.is_empty() {
        return "No operations found.\n".to_string();
    }
    let rows = ops
        .iter()
        .map(|op| {
            let f = op.fields();
            OperationRow {
                id: op.id().to_string(),
                verified: if f.verified { "✓" } else { "" },
                date: f.date.format("%Y-%m-%d").to_string(),
                amount: f.amount.to_string(),
                srcdst: truncate(&f.srcdst, 24),
                budget: f.budget.clone(),
                payment_method: f.payment_method.clone(),
                description: truncate(&f.description, 30),
            }
        })
        .collect();
    render_table(rows, &[3])
}

#[derive(Tabled)]
struct ScheduledRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Amount")]
    amount: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
}

pub fn format_scheduled_list(ops: &[&ScheduledOperation]) -> String {
    if ops.is_empty() {
        return "No scheduled operations.\n".to_string();
    }
    let rows = ops
        .iter()
        .map(|s| ScheduledRow {
            name: s.name().to_string(),
            amount: s.fields().amount.to_string(),
            schedule: s.schedule().to_string(),
        })
        .collect();
    render_table(rows, &[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, OperationFields};
    use chrono::NaiveDate;

    #[test]
    fn test_format_register() {
        let op = Operation::new(
            OperationFields::new(
                Amount::from_cents(-2000),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
            .with_srcdst("Grocer")
            .verified(true),
        );
        let output = format_operation_register(&[&op]);

        assert!(output.contains("2024-03-01"));
        assert!(output.contains("-20.00"));
        assert!(output.contains("Grocer"));
        assert!(output.contains('✓'));
    }

    #[test]
    fn test_format_empty_register() {
        assert!(format_operation_register(&[]).contains("No operations found"));
        assert!(format_scheduled_list(&[]).contains("No scheduled operations"));
    }
}
