//! History command - list or export the account's ledger

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;

use super::{finish, get_context, get_logger, login, print_ok};
use crate::output;

pub fn run(username: Option<String>, csv: Option<PathBuf>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let account = login(&ctx, &logger, username, json)?;

    if let Some(path) = csv {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        let rows = finish(
            &logger,
            "export_statement",
            ctx.ledger_service.export_statement(&account, file),
            json,
            |rows| output::success(&format!("Exported {} entries to {}", rows, path.display())),
        )?;
        if json {
            print_ok(json!({ "rows": rows, "path": path.to_string_lossy() }))?;
        }
        return Ok(());
    }

    let entries = finish(&logger, "history", ctx.ledger_service.list_entries(&account), json, |_| {})?;

    if json {
        return print_ok(entries);
    }

    if entries.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }

    println!("{}", output::entries_table(&entries));
    Ok(())
}
