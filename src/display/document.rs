//! Document summary

use std::path::Path;

use crate::models::{Document, Named};

/// Format the document header and its users
pub fn format_document_info(document: &Document, path: &Path) -> String {
    let (major, minor) = document.version();
    let mut output = String::new();

    output.push_str(&format!("Document: {}\n", document.name()));
    output.push_str(&format!("  File:    {}\n", path.display()));
    output.push_str(&format!("  Format:  {}.{}\n", major, minor));
    if !document.description().is_empty() {
        output.push_str(&format!("  About:   {}\n", document.description()));
    }

    let users = document.users(true);
    if users.is_empty() {
        output.push_str("  Users:   (none)\n");
    } else {
        output.push_str("  Users:\n");
        for user in users {
            output.push_str(&format!("    - {}\n", user.name()));
        }
    }
    output
}
