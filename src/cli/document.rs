//! Document-level commands: `new` and `info`

use crate::display::format_document_info;
use crate::error::{PicsouError, PicsouResult};
use crate::storage::DocumentService;

use super::CliContext;

/// Create an empty document at the selected path
pub fn handle_new_command(ctx: &CliContext, name: &str, description: &str) -> PicsouResult<()> {
    if ctx.document.exists() {
        return Err(PicsouError::Storage(format!(
            "A document already exists at {}",
            ctx.document.display()
        )));
    }
    let mut service = DocumentService::new();
    service.new_document(&ctx.document, name, description)?;
    service.save()?;

    println!("Created document: {}", name);
    println!("  File: {}", ctx.document.display());
    println!();
    println!("Run 'picsou user add <name>' to add a user.");
    Ok(())
}

pub fn handle_info_command(ctx: &CliContext) -> PicsouResult<()> {
    let service = ctx.open()?;
    print!(
        "{}",
        format_document_info(service.document()?, &ctx.document)
    );
    Ok(())
}
