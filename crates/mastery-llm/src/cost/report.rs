//! Cost report rendering

use super::record::{GroupStats, LedgerSummary};
use std::fmt::Write;

/// Text returned when the ledger holds no calls
pub const NO_CALLS_MESSAGE: &str = "No LLM calls logged yet.";

const WIDTH: usize = 70;

/// Render the fixed-width cost analytics report
#[must_use]
pub fn format_report(summary: &LedgerSummary) -> String {
    if summary.is_empty() {
        return NO_CALLS_MESSAGE.to_string();
    }

    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "LLM COST ANALYTICS REPORT");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out);
    let _ = writeln!(out, "OVERALL SUMMARY");
    let _ = writeln!(out, "{light}");
    let _ = writeln!(
        out,
        "Total API Calls:    {}",
        format_thousands(summary.total_calls)
    );
    let _ = writeln!(
        out,
        "Total Tokens:       {}",
        format_thousands(summary.total_tokens)
    );
    let _ = writeln!(out, "Total Cost:         ${:.4}", summary.total_cost);

    for (title, groups, name_width) in [
        ("BY AGENT", &summary.by_agent, 30),
        ("BY MODEL", &summary.by_model, 30),
        ("BY DAY", &summary.by_day, 0),
    ] {
        let _ = writeln!(out);
        let _ = writeln!(out, "{title}");
        let _ = writeln!(out, "{light}");
        for group in groups {
            let _ = writeln!(out, "{}", format_row(group, name_width));
        }
    }

    out.push_str(&heavy);
    out
}

fn format_row(group: &GroupStats, name_width: usize) -> String {
    format!(
        "  {:name_width$} | Calls: {:4} | Tokens: {:>8} | Cost: ${:7.4}",
        group.key,
        group.calls,
        format_thousands(group.tokens),
        group.cost,
    )
}

/// Format an integer with `,` thousands separators
fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_row_layout() {
        let group = GroupStats {
            key: "StrategyCrew.strategist".to_string(),
            calls: 3,
            tokens: 12500,
            cost: 0.0615,
        };
        assert_eq!(
            format_row(&group, 30),
            "  StrategyCrew.strategist        | Calls:    3 | Tokens:   12,500 | Cost: $ 0.0615"
        );
    }

    #[test]
    fn test_empty_summary_renders_placeholder() {
        assert_eq!(format_report(&LedgerSummary::default()), NO_CALLS_MESSAGE);
    }
}
