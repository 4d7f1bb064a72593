//! Doctor command - run ledger integrity checks

use anyhow::Result;
use colored::Colorize;
use comfy_table::{Table, ContentArrangement, Cell, Color};
use serde_json::Value;

use super::{get_context, print_ok};

/// Format a detail JSON value for display
fn format_detail(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}: {}", k, s),
                _ => format!("{}: {}", k, v),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(s) => s.clone(),
        _ => value.to_string(),
    }
}

pub fn run(verbose: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let result = ctx.doctor_service.run_checks()?;

    if json {
        print_ok(&result)?;
        if !result.is_healthy() {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!("{}", "Ledger Health Check".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Check", "Status", "Message"]);

    let mut checks: Vec<_> = result.checks.iter().collect();
    checks.sort_by(|a, b| a.0.cmp(b.0));

    for (check_name, check_result) in checks {
        let status_cell = match check_result.status.as_str() {
            "pass" => Cell::new("PASS").fg(Color::Green),
            "warning" => Cell::new("WARN").fg(Color::Yellow),
            "error" => Cell::new("ERROR").fg(Color::Red),
            _ => Cell::new(&check_result.status),
        };

        table.add_row(vec![
            Cell::new(check_name),
            status_cell,
            Cell::new(&check_result.message),
        ]);

        if verbose {
            if let Some(details) = &check_result.details {
                for detail in details {
                    let formatted = format_detail(detail);
                    table.add_row(vec![
                        Cell::new(""),
                        Cell::new(""),
                        Cell::new(format!("  - {}", formatted)),
                    ]);
                }
            }
        }
    }

    println!("{}", table);
    println!();

    // Summary
    println!(
        "Summary: {} passed, {} warnings, {} errors",
        result.summary.passed.to_string().green(),
        result.summary.warnings.to_string().yellow(),
        result.summary.errors.to_string().red(),
    );

    if !result.is_healthy() {
        std::process::exit(1);
    }

    Ok(())
}
