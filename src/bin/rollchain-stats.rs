#![forbid(unsafe_code)]
//! Forest-wide statistics

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use rollchain::cli::{init_tracing, load_registry_from_config};

#[derive(Parser)]
#[command(author, version, about = "Print ledger statistics", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to ./config.toml)
    #[arg(long)]
    config: Option<String>,
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let (config, registry) = load_registry_from_config(cli.config.as_deref())?;
    let stats = registry.system_stats();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "📊 RollChain Statistics".bright_cyan().bold());
    println!(
        "{}",
        format!(
            "difficulty {} | enrollment {:?}",
            config.ledger.difficulty, config.ledger.enrollment_policy
        )
        .cyan()
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Layer").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Total").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Active").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
        ]);

    let layers = [
        ("Units", stats.total_units, stats.active_units),
        ("Groups", stats.total_groups, stats.active_groups),
        ("Members", stats.total_members, stats.active_members),
    ];
    for (layer, total, active) in layers {
        table.add_row(vec![
            Cell::new(layer).fg(TableColor::White),
            Cell::new(total).fg(TableColor::White),
            Cell::new(active).fg(TableColor::Green),
        ]);
    }

    println!("{}", table);
    println!();
    println!("  {} {}", "Blocks:".bright_white(), stats.total_blocks);
    println!("  {} {}", "Attendance records:".bright_white(), stats.attendance_records);

    Ok(())
}
