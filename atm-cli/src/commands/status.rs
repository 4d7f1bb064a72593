//! Status command - store-wide totals

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::{get_context, print_ok};
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        return print_ok(status);
    }

    println!("{}", "ATM Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Ledger entries", &status.total_entries.to_string()]);
    table.add_row(vec!["Transfers", &status.total_transfers.to_string()]);
    table.add_row(vec!["Total holdings", &output::format_money(status.total_holdings)]);

    println!("{}", table);

    Ok(())
}
