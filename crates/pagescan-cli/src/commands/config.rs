//! `config` subcommand: inspect and edit the user config file.
//!
//! Keys are dotted paths into the JSON form of [`PagescanConfig`], e.g.
//! `ocr.default_language` or `pdf.render_scale`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Args, Subcommand};
use console::style;
use serde_json::Value;

use pagescan_core::models::config::PagescanConfig;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a config file holding the defaults
    Init {
        /// Where to write it (defaults to the user config directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print one value, e.g. `pdf.render_scale`
    Get { key: String },

    /// Change one value; bare words are stored as strings
    Set { key: String, value: String },

    /// Restore one value to its default
    Reset { key: String },

    /// Print where the config file lives
    Path,
}

pub async fn run(args: ConfigArgs) -> anyhow::Result<()> {
    let path = default_config_path();

    match args.command {
        ConfigCommand::Show => {
            if !path.exists() {
                println!("{} No config file, showing defaults.", style("ℹ").blue());
            }
            println!("{}", serde_json::to_string_pretty(&read_config(&path)?)?);
        }
        ConfigCommand::Init { output, force } => {
            let target = output.unwrap_or(path);
            if target.exists() && !force {
                bail!(
                    "{} already exists, pass --force to replace it",
                    target.display()
                );
            }
            write_config(&target, &PagescanConfig::default())?;
            println!("{} Wrote defaults to {}", style("✓").green(), target.display());
        }
        ConfigCommand::Get { key } => {
            let tree = serde_json::to_value(read_config(&path)?)?;
            println!("{}", serde_json::to_string_pretty(lookup(&tree, &key)?)?);
        }
        ConfigCommand::Set { key, value } => {
            let value = parse_value(&value);
            let config = update(read_config(&path)?, &key, value.clone())?;
            write_config(&path, &config)?;
            println!("{} {} = {}", style("✓").green(), key, value);
        }
        ConfigCommand::Reset { key } => {
            let defaults = serde_json::to_value(PagescanConfig::default())?;
            let value = lookup(&defaults, &key)?.clone();
            let config = update(read_config(&path)?, &key, value.clone())?;
            write_config(&path, &config)?;
            println!("{} {} = {} (default)", style("✓").green(), key, value);
        }
        ConfigCommand::Path => {
            println!("Configuration file: {}", path.display());
            if path.exists() {
                println!("Status: {}", style("exists").green());
            } else {
                println!("Status: {}", style("not created").yellow());
                println!("Run 'pagescan config init' to create it.");
            }
        }
    }

    Ok(())
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pagescan")
        .join("config.json")
}

fn read_config(path: &Path) -> anyhow::Result<PagescanConfig> {
    if path.exists() {
        PagescanConfig::from_file(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))
    } else {
        Ok(PagescanConfig::default())
    }
}

fn write_config(path: &Path, config: &PagescanConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(path)?;
    Ok(())
}

/// JSON literal if `raw` parses as one, otherwise a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn lookup<'a>(tree: &'a Value, key: &str) -> anyhow::Result<&'a Value> {
    key.split('.')
        .try_fold(tree, |node, part| node.get(part))
        .ok_or_else(|| anyhow!("Configuration key not found: {}", key))
}

/// Replace an existing leaf. New keys are never created.
fn assign(tree: &mut Value, key: &str, value: Value) -> anyhow::Result<()> {
    let slot = key
        .split('.')
        .try_fold(tree, |node, part| node.get_mut(part))
        .ok_or_else(|| anyhow!("Configuration key not found: {}", key))?;

    if slot.is_object() {
        bail!("{} is a section, set one of its keys instead", key);
    }
    *slot = value;
    Ok(())
}

/// Apply one change and check the result is still a usable config.
fn update(config: PagescanConfig, key: &str, value: Value) -> anyhow::Result<PagescanConfig> {
    let mut tree = serde_json::to_value(config)?;
    assign(&mut tree, key, value)?;

    let config: PagescanConfig = serde_json::from_value(tree)
        .with_context(|| format!("Invalid value for {}", key))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("1.5"), json!(1.5));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("deu"), json!("deu"));
    }

    #[test]
    fn test_lookup_nested_key() {
        let tree = json!({"pdf": {"render_scale": 2.0}});
        assert_eq!(lookup(&tree, "pdf.render_scale").unwrap(), &json!(2.0));
        assert!(lookup(&tree, "pdf.dpi").is_err());
    }

    #[test]
    fn test_assign_refuses_sections_and_new_keys() {
        let mut tree = json!({"pdf": {"render_scale": 2.0}});
        assert!(assign(&mut tree, "pdf", json!(1)).is_err());
        assert!(assign(&mut tree, "pdf.dpi", json!(300)).is_err());

        assign(&mut tree, "pdf.render_scale", json!(3.0)).unwrap();
        assert_eq!(tree, json!({"pdf": {"render_scale": 3.0}}));
    }

    #[test]
    fn test_update_validates() {
        let config = update(PagescanConfig::default(), "ocr.default_language", json!("deu")).unwrap();
        assert_eq!(config.ocr.default_language, "deu");

        assert!(update(PagescanConfig::default(), "ocr.default_language", json!("klingon")).is_err());
        assert!(update(PagescanConfig::default(), "pdf.render_scale", json!(0)).is_err());
        assert!(update(PagescanConfig::default(), "pdf.render_scale", json!("big")).is_err());
    }
}
