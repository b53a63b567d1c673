//! Languages command - list the selectable recognition languages.

use clap::Args;
use console::style;

use pagescan_core::language::{AUTO_CODE, DEFAULT_ENGINE_LANGUAGE};
use pagescan_core::LANGUAGE_OPTIONS;

/// Arguments for the languages command.
#[derive(Args)]
pub struct LanguagesArgs {
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: LanguagesArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(LANGUAGE_OPTIONS)?);
        return Ok(());
    }

    println!(
        "  {:<8} {} (uses {})",
        style(AUTO_CODE).bold(),
        "Auto-detect",
        DEFAULT_ENGINE_LANGUAGE
    );
    for option in LANGUAGE_OPTIONS {
        println!(
            "  {:<8} {} ({})",
            style(option.code).bold(),
            option.name,
            option.native_name
        );
    }

    Ok(())
}
