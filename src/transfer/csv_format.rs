//! Headerless CSV operations
//!
//! Column order: year, month, day, amount, budget, recipient,
//! payment method, description. Imported operations are unverified.

use std::io::{Read, Write};

use ::csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use chrono::{Datelike, NaiveDate};

use crate::error::{PicsouError, PicsouResult};
use crate::models::{Amount, Operation, OperationFields};

const COLUMNS: usize = 8;

fn corrupt(row: usize, message: impl std::fmt::Display) -> PicsouError {
    PicsouError::CorruptData(format!("CSV row {}: {}", row + 1, message))
}

fn parse_row(row: usize, record: &StringRecord) -> PicsouResult<OperationFields> {
    if record.len() != COLUMNS {
        return Err(corrupt(
            row,
            format!("expected {} columns, found {}", COLUMNS, record.len()),
        ));
    }
    let number = |index: usize, label: &str| -> PicsouResult<i64> {
        record[index]
            .parse::<i64>()
            .map_err(|_| corrupt(row, format!("invalid {}: '{}'", label, &record[index])))
    };

    let year = number(0, "year")?;
    let month = number(1, "month")?;
    let day = number(2, "day")?;
    let date = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| corrupt(row, format!("invalid date {}-{}-{}", year, month, day)))?;

    let amount = Amount::parse(&record[3]).map_err(|e| corrupt(row, e))?;

    Ok(OperationFields::new(amount, date)
        .with_budget(&record[4])
        .with_srcdst(&record[5])
        .with_payment_method(&record[6])
        .with_description(&record[7]))
}

/// Read every row; the first bad row fails the whole read
pub fn read_operations<R: Read>(reader: R, delimiter: u8) -> PicsouResult<Vec<Operation>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::Fields)
        .from_reader(reader);

    let mut ops = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            if e.is_io_error() {
                PicsouError::Import(e.to_string())
            } else {
                corrupt(row, e)
            }
        })?;
        ops.push(Operation::new(parse_row(row, &record)?));
    }
    Ok(ops)
}

pub fn write_operations<W: Write>(
    writer: W,
    ops: &[&Operation],
    delimiter: u8,
) -> PicsouResult<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .from_writer(writer);
    let export_err = |e: ::csv::Error| PicsouError::Export(e.to_string());

    for op in ops {
        let f = op.fields();
        writer
            .write_record([
                f.date.year().to_string(),
                f.date.month().to_string(),
                f.date.day().to_string(),
                f.amount.to_string(),
                f.budget.clone(),
                f.srcdst.clone(),
                f.payment_method.clone(),
                f.description.clone(),
            ])
            .map_err(export_err)?;
    }
    writer
        .flush()
        .map_err(|e| PicsouError::Export(e.to_string()))
}
