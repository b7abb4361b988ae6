//! Display formatting for terminal output
//!
//! Lists are rendered as tables with `tabled`; detail views are plain
//! aligned text.

pub mod account;
pub mod budget;
pub mod document;
pub mod operation;

pub use account::{format_account_details, format_account_list};
pub use budget::format_budget_list;
pub use document::format_document_info;
pub use operation::{format_operation_register, format_scheduled_list};

use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

/// Render `rows` with the shared table style, right-aligning `numeric` columns
pub(crate) fn render_table<T: Tabled>(rows: Vec<T>, numeric: &[usize]) -> String {
    let mut table = Table::new(rows);
    table.with(Style::psql());
    for &column in numeric {
        table.with(Modify::new(Columns::single(column)).with(Alignment::right()));
    }
    let mut output = table.to_string();
    output.push('\n');
    output
}

/// Cut `s` to `max` characters, marking the cut with an ellipsis
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Groceries", 20), "Groceries");
        assert_eq!(truncate("Supermarket downtown", 10), "Supermark…");
    }
}
