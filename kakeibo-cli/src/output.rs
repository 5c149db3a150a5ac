//! Terminal output: coloured status lines, tables and yen amounts

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Errors and warnings go to stderr so `--json` output stays parseable
pub fn error(msg: &str) {
    eprintln!("{}", msg.red().bold());
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", "!".yellow().bold(), msg.yellow());
}

pub fn info(msg: &str) {
    println!("{}", msg.dimmed());
}

/// Table that wraps to the terminal width
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format whole yen with thousands separators: `¥12,345`
pub fn format_yen(amount: u64) -> String {
    format!("¥{}", group_thousands(amount))
}

/// Signed variant for differences: `+¥1,200`, `-¥300`, `¥0`
pub fn format_yen_signed(amount: i64) -> String {
    match amount {
        0 => "¥0".to_string(),
        a if a > 0 => format!("+{}", format_yen(a.unsigned_abs())),
        a => format!("-{}", format_yen(a.unsigned_abs())),
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
