//! Dashboard command - balance, account ID and recent activity

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use atm_core::services::AccountSummary;
use atm_core::LedgerEntry;

use super::{finish, get_context, get_logger, login, print_ok};
use crate::output;

/// Entries shown under the summary
const RECENT_ENTRIES: usize = 5;

#[derive(Serialize)]
struct Dashboard {
    #[serde(flatten)]
    summary: AccountSummary,
    recent: Vec<LedgerEntry>,
}

pub fn run(username: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let account = login(&ctx, &logger, username, json)?;

    let summary = finish(&logger, "dashboard", ctx.account_service.summary(&account), json, |_| {})?;
    let entries = finish(&logger, "history", ctx.ledger_service.list_entries(&account), json, |_| {})?;
    let recent: Vec<LedgerEntry> = entries.into_iter().rev().take(RECENT_ENTRIES).collect();

    if json {
        return print_ok(Dashboard { summary, recent });
    }

    println!("{}", format!("Welcome, {}", summary.username).bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Balance", &output::format_money(summary.balance)]);
    table.add_row(vec!["Account ID", summary.public_id.as_str()]);
    table.add_row(vec!["Ledger entries", &summary.entry_count.to_string()]);
    println!("{}", table);

    if !recent.is_empty() {
        println!();
        println!("{}", "Recent Activity".bold());
        println!("{}", output::entries_table(&recent));
    }

    Ok(())
}
