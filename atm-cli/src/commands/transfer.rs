//! Transfer command - send money to another account by its account ID

use anyhow::Result;
use dialoguer::Confirm;
use rust_decimal::Decimal;

use super::{finish, get_context, get_logger, login, print_ok};
use crate::output;

pub fn run(
    username: Option<String>,
    recipient: String,
    amount: Decimal,
    force: bool,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();
    let account = login(&ctx, &logger, username, json)?;

    if !force && !json && atty::is(atty::Stream::Stdin) {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Send {} to {}?",
                output::format_money(amount),
                recipient.trim()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let receipt = finish(
        &logger,
        "transfer",
        ctx.ledger_service.transfer(&account, &recipient, amount),
        json,
        |receipt| {
            output::success(&format!(
                "Sent {} to {}. New balance: {}",
                output::format_money(receipt.credit.amount),
                receipt.recipient_public_id,
                output::format_money(receipt.sender_balance)
            ));
        },
    )?;

    if json {
        print_ok(receipt)?;
    }
    Ok(())
}
