//! Import/export of operations
//!
//! Supported formats:
//! - CSV: `year,month,day,amount,budget,recipient,payment_method,description`
//! - JSON lines: one operation object per line
//!
//! Imports are all-or-nothing: the first malformed record aborts with
//! `CorruptData` and no operation is returned.

pub mod csv_format;
pub mod json_lines;

use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::{PicsouError, PicsouResult};
use crate::models::{Account, Operation};

/// File format for operation transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    Csv,
    JsonLines,
}

impl TransferFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" | "json" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

impl FromStr for TransferFormat {
    type Err = PicsouError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" | "jsonl" | "json-lines" => Ok(Self::JsonLines),
            other => Err(PicsouError::Validation(format!(
                "Unknown transfer format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::JsonLines => write!(f, "jsonl"),
        }
    }
}

/// Options shared by both formats
#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    pub format: TransferFormat,
    /// CSV field delimiter
    pub delimiter: u8,
}

impl TransferOptions {
    pub fn new(format: TransferFormat) -> Self {
        Self {
            format,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Parse detached operations from `reader`
pub fn load_operations<R: Read>(reader: R, options: &TransferOptions) -> PicsouResult<Vec<Operation>> {
    match options.format {
        TransferFormat::Csv => csv_format::read_operations(reader, options.delimiter),
        TransferFormat::JsonLines => json_lines::read_operations(reader),
    }
}

/// Write `ops` to `writer`
pub fn dump_operations<W: Write>(
    writer: W,
    ops: &[&Operation],
    options: &TransferOptions,
) -> PicsouResult<()> {
    match options.format {
        TransferFormat::Csv => csv_format::write_operations(writer, ops, options.delimiter),
        TransferFormat::JsonLines => json_lines::write_operations(writer, ops),
    }
}

/// Outcome of [`import_into_account`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub duplicates_skipped: usize,
}

/// Add imported operations to `account`, skipping those whose fingerprint
/// matches an operation the account already has
pub fn import_into_account(account: &mut Account, ops: Vec<Operation>) -> PicsouResult<ImportReport> {
    let existing: HashSet<String> = account
        .operations(false)
        .into_iter()
        .map(Operation::fingerprint)
        .collect();

    let (fresh, duplicates): (Vec<Operation>, Vec<Operation>) = ops
        .into_iter()
        .partition(|op| !existing.contains(&op.fingerprint()));

    let report = ImportReport {
        imported: fresh.len(),
        duplicates_skipped: duplicates.len(),
    };
    if !fresh.is_empty() {
        account.add_operations(fresh)?;
    }
    info!(
        imported = report.imported,
        skipped = report.duplicates_skipped,
        "operations imported"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KdfCost;
    use crate::models::{Amount, OperationFields, User};
    use chrono::NaiveDate;

    fn op(cents: i64, day: u32, srcdst: &str) -> OperationFields {
        OperationFields::new(
            Amount::from_cents(cents),
            NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
        )
        .with_srcdst(srcdst)
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(TransferFormat::from_path(Path::new("ops.CSV")), Some(TransferFormat::Csv));
        assert_eq!(
            TransferFormat::from_path(Path::new("ops.jsonl")),
            Some(TransferFormat::JsonLines)
        );
        assert_eq!(TransferFormat::from_path(Path::new("ops.xml")), None);
        assert!("xml".parse::<TransferFormat>().is_err());
    }

    #[test]
    fn test_import_skips_known_operations() {
        let mut user = User::new("alice", "pw", &KdfCost::minimal()).unwrap();
        let id = user.add_account("Checking", "", false, Amount::zero()).unwrap();
        let account = user.find_account_mut(id).unwrap();
        account.add_operation(op(-500, 1, "Bakery")).unwrap();

        let batch = vec![
            Operation::new(op(-500, 1, "Bakery")),
            Operation::new(op(-900, 2, "Grocer")),
            Operation::new(op(-900, 2, "Grocer")),
        ];
        let report = import_into_account(account, batch).unwrap();

        assert_eq!(
            report,
            ImportReport {
                imported: 2,
                duplicates_skipped: 1
            }
        );
        assert_eq!(account.operation_count(), 3);
    }

    #[test]
    fn test_import_of_only_duplicates_is_not_an_error() {
        let mut user = User::new("alice", "pw", &KdfCost::minimal()).unwrap();
        let id = user.add_account("Checking", "", false, Amount::zero()).unwrap();
        let account = user.find_account_mut(id).unwrap();
        account.add_operation(op(-500, 1, "Bakery")).unwrap();

        let report = import_into_account(account, vec![Operation::new(op(-500, 1, "Bakery"))]).unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(account.operation_count(), 1);
    }

    #[test]
    fn test_export_then_import_both_formats() {
        let ops = vec![
            Operation::new(op(-1234, 3, "Cafe, \"downtown\"").with_budget("Food")),
            Operation::new(op(250000, 28, "Employer").with_description("May salary")),
        ];
        let refs: Vec<&Operation> = ops.iter().collect();

        for format in [TransferFormat::Csv, TransferFormat::JsonLines] {
            let options = TransferOptions::new(format);
            let mut buffer = Vec::new();
            dump_operations(&mut buffer, &refs, &options).unwrap();

            let loaded = load_operations(buffer.as_slice(), &options).unwrap();
            assert_eq!(loaded.len(), 2, "format {}", format);
            assert_eq!(loaded[0].fields(), ops[0].fields());
            assert_eq!(loaded[1].fields(), ops[1].fields());
        }
    }
}
