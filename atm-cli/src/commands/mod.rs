//! CLI command implementations

pub mod dashboard;
pub mod deposit;
pub mod doctor;
pub mod history;
pub mod logs;
pub mod register;
pub mod status;
pub mod transfer;
pub mod withdraw;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use dialoguer::{Input, Password};
use serde::Serialize;

use atm_core::{Account, AtmContext, EntryPoint, LogEvent, LoggingService, OperationResult};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the data directory from ATM_DIR or default to ~/.atm
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("ATM_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".atm"))
        .ok_or_else(|| anyhow!("Could not find home directory; set ATM_DIR"))
}

/// Open the ATM context in the data directory
pub fn get_context() -> Result<AtmContext> {
    let data_dir = get_data_dir()?;
    AtmContext::new(&data_dir).context("Failed to initialize atm context")
}

fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Username from `--username` / ATM_USERNAME, prompting when on a terminal
pub fn resolve_username(username: Option<String>) -> Result<String> {
    if let Some(name) = username {
        return Ok(name);
    }
    if !is_interactive() {
        return Err(anyhow!("No username given; pass --username or set ATM_USERNAME"));
    }
    Ok(Input::<String>::new().with_prompt("Username").interact_text()?)
}

/// Password from ATM_PASSWORD, prompting when on a terminal
pub fn resolve_password(confirm: bool) -> Result<String> {
    if let Ok(password) = std::env::var("ATM_PASSWORD") {
        return Ok(password);
    }
    if !is_interactive() {
        return Err(anyhow!("No password given; set ATM_PASSWORD"));
    }

    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}

/// Authenticate the caller for a command that acts on an account
pub fn login(
    ctx: &AtmContext,
    logger: &Option<LoggingService>,
    username: Option<String>,
    json: bool,
) -> Result<Account> {
    let username = resolve_username(username)?;
    let password = resolve_password(false)?;
    let result = ctx.account_service.authenticate(&username, &password);
    finish(logger, "authenticate", result, json, |_| {})
}

/// Report the outcome of a library operation
///
/// Failures are logged as `<operation>_failed` and, with `--json`, printed
/// as an `OperationResult` envelope before being returned as errors.
/// Successes are printed as an envelope or handed to `render`.
pub fn finish<T: Serialize>(
    logger: &Option<LoggingService>,
    operation: &str,
    result: atm_core::domain::result::Result<T>,
    json: bool,
    render: impl FnOnce(&T),
) -> Result<T> {
    match result {
        Ok(data) => {
            if !json {
                render(&data);
            }
            Ok(data)
        }
        Err(e) => {
            log_event(logger, LogEvent::failure(operation, &e));
            if json {
                print_json(&OperationResult::<T>::from_error(&e));
            }
            Err(e.into())
        }
    }
}

/// Print a successful `OperationResult` envelope
pub fn print_ok<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    if let Ok(text) = serde_json::to_string_pretty(value) {
        println!("{}", text);
    }
}
