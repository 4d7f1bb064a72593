//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use rust_decimal::Decimal;

use atm_core::LedgerEntry;

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format money with a sign and two decimals, e.g. "-$12.50"
pub fn format_money(amount: Decimal) -> String {
    if amount.is_sign_negative() && !amount.is_zero() {
        format!("-${:.2}", amount.abs())
    } else {
        format!("${:.2}", amount)
    }
}

/// Ledger entries as a table, debits in red and credits in green
pub fn entries_table(entries: &[LedgerEntry]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["Date", "Description", "Amount"]);

    for entry in entries {
        let amount = Cell::new(format_money(entry.amount)).fg(if entry.is_debit() {
            Color::Red
        } else {
            Color::Green
        });
        table.add_row(vec![
            Cell::new(entry.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&entry.description),
            amount,
        ]);
    }
    table
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::new(1250, 2)), "$12.50");
        assert_eq!(format_money(Decimal::new(-40, 0)), "-$40.00");
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
