//! # stock Subcommand
//!
//! Prints stock on hand per terminal, read straight from the `items` table.

use std::fmt::Write as _;

use anyhow::Context;
use clap::Args;
use portstock_core::report::{stock_summary, StockFilter, StockSummary};
use portstock_core::Category;

use crate::db::DatabaseArgs;

/// Arguments for the stock subcommand.
#[derive(Args, Debug)]
pub struct StockArgs {
    #[command(flatten)]
    pub db: DatabaseArgs,

    /// Only items at or below their reorder level.
    #[arg(long)]
    pub low: bool,

    /// paper, toner, ribbon or other.
    #[arg(long, value_parser = parse_category)]
    pub category: Option<Category>,

    /// Include deactivated items.
    #[arg(long)]
    pub inactive: bool,

    /// Substring of the item code or name.
    #[arg(long)]
    pub search: Option<String>,
}

fn parse_category(s: &str) -> Result<Category, String> {
    s.parse::<Category>().map_err(|e| e.to_string())
}

impl StockArgs {
    pub fn filter(&self) -> StockFilter {
        StockFilter {
            category: self.category,
            low_only: self.low,
            include_inactive: self.inactive,
            search: self.search.clone(),
        }
    }
}

pub async fn run(args: StockArgs) -> anyhow::Result<()> {
    let pool = args.db.connect().await?;
    let items = portstock_api::db::items::load_all(&pool)
        .await
        .context("failed to load items")?;
    print!("{}", render(&stock_summary(&items, &args.filter())));
    Ok(())
}

/// Fixed-width table, one line per item plus a totals line.
pub fn render(summary: &StockSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<32} {:<10} {:>8} {:>8} {:>8} {:>8}",
        "CODE", "NAME", "UNIT", "JCT", "UCT", "TOTAL", "REORDER"
    );
    for row in &summary.rows {
        let mut flags = String::new();
        if row.low {
            flags.push_str(" LOW");
        }
        if !row.active {
            flags.push_str(" INACTIVE");
        }
        let _ = writeln!(
            out,
            "{:<16} {:<32} {:<10} {:>8} {:>8} {:>8} {:>8}{}",
            row.code,
            truncate(&row.name, 32),
            truncate(&row.unit, 10),
            row.jct,
            row.uct,
            row.total,
            row.reorder_level,
            flags
        );
    }
    let _ = writeln!(
        out,
        "{:<16} {:<32} {:<10} {:>8} {:>8} {:>8}",
        "",
        format!("{} items, {} low", summary.rows.len(), summary.low_count),
        "",
        summary.total_jct,
        summary.total_uct,
        summary.total_jct + summary.total_uct
    );
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max - 1).collect();
        cut.push('~');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portstock_core::{ItemCode, ItemId, ItemRecord, StockLevels};

    fn item(code: &str, jct: i64, uct: i64, reorder: i64) -> ItemRecord {
        let now = Utc::now();
        ItemRecord {
            id: ItemId::new(),
            code: ItemCode::new(code).unwrap(),
            name: format!("{code} description"),
            category: Category::Toner,
            unit: "cartridge".into(),
            reorder_level: reorder,
            stock: StockLevels { jct, uct },
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn table_flags_low_items_and_totals_both_terminals() {
        let items = vec![item("TN-1", 2, 1, 5), item("TN-2", 10, 4, 2)];
        let text = render(&stock_summary(&items, &StockFilter::default()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("CODE"));
        assert!(lines[1].starts_with("TN-1") && lines[1].ends_with(" LOW"));
        assert!(!lines[2].contains("LOW"));
        assert!(lines[3].contains("2 items, 1 low"));
        assert!(lines[3].trim_end().ends_with("12        5       17"));
    }

    #[test]
    fn long_names_are_cut() {
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
