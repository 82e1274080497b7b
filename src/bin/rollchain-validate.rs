#![forbid(unsafe_code)]
//! Validate every chain in the configured snapshot store

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use rollchain::cli::{init_tracing, load_registry_from_config};
use std::collections::BTreeMap;

#[derive(Parser)]
#[command(author, version, about = "Validate every chain and parent link", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to ./config.toml)
    #[arg(long)]
    config: Option<String>,
    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let (config, registry) = load_registry_from_config(cli.config.as_deref())?;
    let report = registry.validate_all();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.overall_valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!("{}", "🔗 RollChain Validation".bright_cyan().bold());
    println!(
        "{}",
        format!("Store: {:?} at {}", config.storage.backend, config.storage.path).cyan()
    );
    println!();

    if report.chains_checked() == 0 {
        println!("{}", "📭 No chains found. An empty ledger is valid.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Kind").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Id").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Result").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
        ]);

    add_rows(&mut table, "unit", &report.per_unit);
    add_rows(&mut table, "group", &report.per_group);
    add_rows(&mut table, "member", &report.per_member);
    println!("{}", table);
    println!();

    if report.overall_valid {
        println!(
            "{}",
            format!("✅ All {} chains are valid", report.chains_checked()).green().bold()
        );
        return Ok(());
    }

    println!("{}", "❌ Problems found:".red().bold());
    for error in &report.errors {
        println!("  - {}", error.red());
    }
    std::process::exit(1);
}

fn add_rows(table: &mut Table, kind: &str, results: &BTreeMap<String, bool>) {
    for (id, valid) in results {
        let (label, color) = if *valid {
            ("valid", TableColor::Green)
        } else {
            ("INVALID", TableColor::Red)
        };
        table.add_row(vec![
            Cell::new(kind).fg(TableColor::White),
            Cell::new(id).fg(TableColor::White),
            Cell::new(label).fg(color),
        ]);
    }
}
