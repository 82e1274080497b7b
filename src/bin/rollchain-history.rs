#![forbid(unsafe_code)]
//! Attendance history and summary of one member

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use rollchain::cli::{format_timestamp, init_tracing, load_registry_from_config, short_hash};
use rollchain::transaction::EventKind;

#[derive(Parser)]
#[command(author, version, about = "Show a member's attendance history", long_about = None)]
struct Cli {
    /// Member id
    member: String,
    /// Path to config.toml (defaults to ./config.toml)
    #[arg(long)]
    config: Option<String>,
    /// Only show the most recent N events
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let (_config, registry) = load_registry_from_config(cli.config.as_deref())?;
    let member = registry.member(&cli.member)?;
    let summary = registry.attendance_summary(&cli.member)?;
    let mut records = registry.attendance_history(&cli.member)?;

    println!("{}", "📜 Attendance History".bright_cyan().bold());
    println!(
        "{}",
        format!(
            "{} ({}) | unit {} | status {}",
            member.entity.name, member.entity.id, member.unit_id, member.entity.status
        )
        .cyan()
    );
    if !member.enrolled_groups.is_empty() {
        println!(
            "{}",
            format!("Enrolled in: {}", member.enrolled_groups.join(", ")).cyan()
        );
    }
    println!();

    if records.is_empty() {
        println!("{}", "📭 No events recorded yet.".yellow());
        return Ok(());
    }

    // newest first
    records.reverse();
    if let Some(limit) = cli.limit {
        records.truncate(limit);
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Block").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Date").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Status").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Group").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Recorded by").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Recorded at").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
            Cell::new("Hash").fg(TableColor::Cyan).add_attribute(Attribute::Bold),
        ]);

    for record in &records {
        let color = match record.kind {
            EventKind::Present => TableColor::Green,
            EventKind::Absent => TableColor::Red,
            EventKind::Leave => TableColor::Yellow,
        };
        table.add_row(vec![
            Cell::new(format!("#{}", record.block_index)).fg(TableColor::White),
            Cell::new(record.date.to_string()).fg(TableColor::White),
            Cell::new(record.kind.as_str()).fg(color),
            Cell::new(record.group_id.as_deref().unwrap_or("-")).fg(TableColor::White),
            Cell::new(&record.recorded_by).fg(TableColor::White),
            Cell::new(format_timestamp(record.recorded_at)).fg(TableColor::Grey),
            Cell::new(short_hash(&record.hash)).fg(TableColor::Grey),
        ]);
    }

    println!("{}", table);
    println!();

    println!("{}", "📊 Summary".bright_blue().bold());
    println!("  {} {}", "Present:".green(), summary.counters.present);
    println!("  {} {}", "Absent: ".red(), summary.counters.absent);
    println!("  {} {}", "Leave:  ".yellow(), summary.counters.leave);
    println!("  {} {}", "Total:  ".blue(), summary.total);
    println!(
        "  {} {}",
        "Attendance:".bright_white().bold(),
        format!("{:.1}%", summary.percentage).bright_white().bold()
    );

    Ok(())
}
