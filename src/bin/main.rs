#![forbid(unsafe_code)]

use colored::*;

fn main() {
    println!("{}", "RollChain CLI".bright_cyan().bold());
    println!("{}", "-------------".bright_cyan());
    println!();
    println!(
        "{}",
        "The ledger is driven through the library; these binaries inspect a saved snapshot.".yellow()
    );
    println!(
        "{}",
        "Use 'cargo run --bin <binary_name>' to run a specific command.".yellow()
    );
    println!();
    println!("{}", "Available binaries:".bright_green().underline());
    println!(
        "  - {}  {}",
        "rollchain-validate".bright_white(),
        "verify every chain and parent link".dimmed()
    );
    println!(
        "  - {}   {}",
        "rollchain-history".bright_white(),
        "attendance history of one member".dimmed()
    );
    println!(
        "  - {}     {}",
        "rollchain-stats".bright_white(),
        "counts across the forest".dimmed()
    );
    println!();
    println!("{}", "Configuration:".bright_green().underline());
    println!(
        "  {} is read from the working directory; {} controls log output.",
        "config.toml".bright_white(),
        "RUST_LOG".bright_white()
    );
    println!();
    println!("{}", "Example:".bright_green().underline());
    println!("{}", "  cargo run --bin rollchain-validate -- --config ./config.toml".italic());
}
