//! Register command - open a new account

use anyhow::Result;
use colored::Colorize;

use super::{finish, get_context, get_logger, print_ok, resolve_password, resolve_username};

pub fn run(username: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    let username = resolve_username(username)?;
    let password = resolve_password(true)?;

    let account = finish(
        &logger,
        "register",
        ctx.account_service.register(&username, &password),
        json,
        |account| {
            println!("{}", format!("Account created for {}", account.username).green());
            println!();
            println!("Your account ID is {}", account.public_id.as_str().bold());
            println!("Share it with others so they can send you money.");
        },
    )?;

    if json {
        print_ok(&account)?;
    }
    Ok(())
}
