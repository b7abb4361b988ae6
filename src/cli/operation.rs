//! Operation CLI commands
//!
//! Adding, listing and removing operations, scheduled operations, and
//! CSV / JSON-lines import and export.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::display::{format_operation_register, format_scheduled_list};
use crate::error::{PicsouError, PicsouResult};
use crate::models::{
    Account, FrequencyUnit, Named, OperationFields, OperationId, Schedule, ScheduleEnd,
};
use crate::transfer::{
    dump_operations, import_into_account, load_operations, TransferFormat, TransferOptions,
};

use super::{account_id, parse_amount, parse_date, user_mut, user_ref, CliContext};

/// Transfer format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Headerless CSV
    Csv,
    /// One JSON object per line
    Jsonl,
}

impl From<FormatArg> for TransferFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => TransferFormat::Csv,
            FormatArg::Jsonl => TransferFormat::JsonLines,
        }
    }
}

/// Fields shared by `op add` and `op schedule`
#[derive(Args)]
pub struct OperationArgs {
    /// Amount (negative for an expense)
    #[arg(allow_negative_numbers = true)]
    amount: String,
    /// Recipient of an expense or source of an income
    #[arg(short, long, default_value = "")]
    recipient: String,
    /// Budget name
    #[arg(short, long, default_value = "")]
    budget: String,
    /// Payment method name
    #[arg(short, long, default_value = "")]
    payment_method: String,
    /// Description
    #[arg(long, default_value = "")]
    description: String,
}

impl OperationArgs {
    fn into_fields(self, date: NaiveDate, verified: bool) -> PicsouResult<OperationFields> {
        Ok(OperationFields::new(parse_amount(&self.amount)?, date)
            .with_srcdst(self.recipient)
            .with_budget(self.budget)
            .with_payment_method(self.payment_method)
            .with_description(self.description)
            .verified(verified))
    }
}

/// Operation subcommands
#[derive(Subcommand)]
pub enum OperationCommands {
    /// Record an operation
    Add {
        /// Account name
        account: String,
        #[command(flatten)]
        fields: OperationArgs,
        /// Operation date (YYYY-MM-DD, defaults to today)
        #[arg(short, long)]
        date: Option<String>,
        /// Mark as verified against a bank statement
        #[arg(long)]
        verified: bool,
    },
    /// List operations
    List {
        /// Account name
        account: String,
        /// Only this year
        #[arg(short, long)]
        year: Option<i32>,
        /// Only this month (needs --year)
        #[arg(short, long, requires = "year")]
        month: Option<u32>,
    },
    /// Remove an operation by id
    Remove {
        /// Account name
        account: String,
        /// Operation id, as shown by `op list`
        id: String,
    },
    /// Import operations, skipping ones already recorded
    Import {
        /// Account name
        account: String,
        /// Input file
        #[arg(id = "input_file", value_name = "FILE")]
        file: PathBuf,
        /// File format (guessed from the extension when absent)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },
    /// Export operations
    Export {
        /// Account name
        account: String,
        /// Output file
        #[arg(id = "output_file", value_name = "FILE")]
        file: PathBuf,
        /// File format (guessed from the extension when absent)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
        /// Only this year
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Add a recurring operation
    Schedule {
        /// Account name
        account: String,
        /// Scheduled operation name
        name: String,
        #[command(flatten)]
        fields: OperationArgs,
        /// First occurrence (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        from: Option<String>,
        /// Period unit: days, weeks, months, years
        #[arg(long, default_value = "months")]
        unit: String,
        /// Number of units between occurrences
        #[arg(long, default_value = "1")]
        every: u32,
        /// Last possible occurrence (YYYY-MM-DD)
        #[arg(long, conflicts_with = "count")]
        until: Option<String>,
        /// Number of occurrences
        #[arg(long)]
        count: Option<u32>,
    },
    /// List scheduled operations
    Scheduled {
        /// Account name
        account: String,
    },
    /// Record every scheduled occurrence due up to a date
    Apply {
        /// Account name
        account: String,
        /// Last date to consider (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        until: Option<String>,
    },
}

fn transfer_options(
    ctx: &CliContext,
    file: &Path,
    format: Option<FormatArg>,
) -> PicsouResult<TransferOptions> {
    let format = match format {
        Some(f) => f.into(),
        None => TransferFormat::from_path(file).ok_or_else(|| {
            PicsouError::Validation(format!(
                "Cannot guess the format of {}; use --format",
                file.display()
            ))
        })?,
    };
    Ok(TransferOptions::new(format).with_delimiter(ctx.settings.csv_delimiter_byte()?))
}

fn account_mut<'a>(
    user: &'a mut crate::models::User,
    name: &str,
) -> PicsouResult<&'a mut Account> {
    let id = account_id(user, name)?;
    user.find_account_mut(id)
        .ok_or_else(|| PicsouError::account_not_found(name))
}

/// Accept a full UUID or the short `op-xxxxxxxx` form shown in listings
fn resolve_operation(account: &Account, input: &str) -> PicsouResult<OperationId> {
    if let Ok(id) = input.parse::<OperationId>() {
        return Ok(id);
    }
    let short = input.strip_prefix("op-").unwrap_or(input);
    let matches: Vec<OperationId> = account
        .operations(false)
        .into_iter()
        .map(|op| op.id())
        .filter(|id| !short.is_empty() && id.as_uuid().to_string().starts_with(short))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => Err(PicsouError::operation_not_found(input)),
        _ => Err(PicsouError::Validation(format!(
            "Operation id '{}' is ambiguous",
            input
        ))),
    }
}

/// Handle an operation command
pub fn handle_operation_command(ctx: &CliContext, cmd: OperationCommands) -> PicsouResult<()> {
    let mut service = ctx.open()?;
    let uid = ctx.unlock(&mut service)?;

    match cmd {
        OperationCommands::Add {
            account,
            fields,
            date,
            verified,
        } => {
            let fields = fields.into_fields(parse_date(date.as_deref())?, verified)?;
            let summary = format!("{} {}", fields.date, fields.amount);
            let found = account_mut(user_mut(&mut service, uid)?, &account)?;
            let id = found.add_operation(fields)?;
            service.save()?;
            println!("Added operation to {}: {}", account, summary);
            println!("  ID: {}", id);
        }

        OperationCommands::List {
            account,
            year,
            month,
        } => {
            let user = user_ref(&service, uid)?;
            let id = account_id(user, &account)?;
            if let Some(found) = user.find_account(id) {
                let ops = match year {
                    Some(year) => found.operations_in(year, month),
                    None => found.operations(true),
                };
                print!("{}", format_operation_register(&ops));
            }
        }

        OperationCommands::Remove { account, id } => {
            let found = account_mut(user_mut(&mut service, uid)?, &account)?;
            let op = resolve_operation(found, &id)?;
            found.remove_operation(op)?;
            service.save()?;
            println!("Removed operation: {}", id);
        }

        OperationCommands::Import {
            account,
            file,
            format,
        } => {
            let options = transfer_options(ctx, &file, format)?;
            let reader = File::open(&file).map_err(|e| {
                PicsouError::Import(format!("Failed to open {}: {}", file.display(), e))
            })?;
            let ops = load_operations(BufReader::new(reader), &options)?;
            if ops.is_empty() {
                println!("No operations found in {}.", file.display());
                return Ok(());
            }

            let found = account_mut(user_mut(&mut service, uid)?, &account)?;
            let report = import_into_account(found, ops)?;
            if report.imported > 0 {
                service.save()?;
            }

            println!("Import Complete!");
            println!("  Imported:    {}", report.imported);
            println!("  Skipped:     {}", report.duplicates_skipped);
        }

        OperationCommands::Export {
            account,
            file,
            format,
            year,
        } => {
            let options = transfer_options(ctx, &file, format)?;
            let user = user_ref(&service, uid)?;
            let id = account_id(user, &account)?;
            let found = user
                .find_account(id)
                .ok_or_else(|| PicsouError::account_not_found(&account))?;
            let ops = match year {
                Some(year) => found.operations_in(year, None),
                None => found.operations(true),
            };

            let writer = File::create(&file).map_err(|e| {
                PicsouError::Export(format!("Failed to create {}: {}", file.display(), e))
            })?;
            dump_operations(BufWriter::new(writer), &ops, &options)?;
            println!(
                "Exported {} operations to {} ({})",
                ops.len(),
                file.display(),
                options.format
            );
        }

        OperationCommands::Schedule {
            account,
            name,
            fields,
            from,
            unit,
            every,
            until,
            count,
        } => {
            let from = parse_date(from.as_deref())?;
            let unit = FrequencyUnit::parse(&unit).ok_or_else(|| {
                PicsouError::Validation(format!(
                    "Invalid unit: '{}'. Valid units: days, weeks, months, years",
                    unit
                ))
            })?;
            let end = match (until, count) {
                (Some(until), _) => ScheduleEnd::Until(parse_date(Some(&until))?),
                (None, Some(count)) => ScheduleEnd::Count(count),
                (None, None) => ScheduleEnd::Endless,
            };
            let schedule = Schedule::new(from, unit, every, end)?;
            let fields = fields.into_fields(from, false)?;

            account_mut(user_mut(&mut service, uid)?, &account)?
                .add_scheduled_operation(fields, &name, schedule)?;
            service.save()?;
            println!("Scheduled '{}': {}", name, schedule);
        }

        OperationCommands::Scheduled { account } => {
            let user = user_ref(&service, uid)?;
            let id = account_id(user, &account)?;
            if let Some(found) = user.find_account(id) {
                print!("{}", format_scheduled_list(&found.scheduled_operations(true)));
            }
        }

        OperationCommands::Apply { account, until } => {
            let limit = parse_date(until.as_deref())?;
            let found = account_mut(user_mut(&mut service, uid)?, &account)?;
            let due: Vec<_> = found
                .scheduled_operations(true)
                .into_iter()
                .flat_map(|s| s.materialize(limit))
                .collect();
            let names: Vec<String> = found
                .scheduled_operations(true)
                .iter()
                .map(|s| s.name().to_string())
                .collect();

            let report = import_into_account(found, due)?;
            if report.imported > 0 {
                service.save()?;
            }
            println!(
                "Applied {} scheduled operation(s) up to {}: {} recorded, {} already present",
                names.len(),
                limit,
                report.imported,
                report.duplicates_skipped
            );
        }
    }

    Ok(())
}
