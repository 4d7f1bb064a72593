//! Deposit command

use anyhow::Result;
use rust_decimal::Decimal;

use super::{finish, get_context, get_logger, login, print_ok};
use crate::output;

pub fn run(username: Option<String>, amount: Decimal, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let account = login(&ctx, &logger, username, json)?;

    let receipt = finish(
        &logger,
        "deposit",
        ctx.ledger_service.deposit(&account, amount),
        json,
        |receipt| {
            output::success(&format!(
                "Deposited {}. New balance: {}",
                output::format_money(receipt.entry.amount),
                output::format_money(receipt.new_balance)
            ));
        },
    )?;

    if json {
        print_ok(receipt)?;
    }
    Ok(())
}
