//! `lineage` command-line tool

mod commands;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lineage_assets::SessionConfig;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let types = Arg::new("types")
        .long("types")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Type schema (YAML)");
    let config = Arg::new("config")
        .long("config")
        .value_parser(value_parser!(PathBuf))
        .help("Session configuration (YAML)");
    let document = Arg::new("document")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Document to read");

    Command::new("lineage")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Inspect and synchronize lineage documents")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("check")
                .about("Load and re-save a document; fail if the bytes differ")
                .arg(types.clone())
                .arg(config.clone())
                .arg(document.clone()),
        )
        .subcommand(
            Command::new("sync")
                .about("Synchronize a derived document with its base")
                .arg(types.clone())
                .arg(config.clone())
                .arg(
                    Arg::new("base")
                        .long("base")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Base document"),
                )
                .arg(document.clone().help("Derived document"))
                .arg(
                    Arg::new("write")
                        .long("write")
                        .action(ArgAction::SetTrue)
                        .help("Write the result back instead of printing it"),
                ),
        )
        .subcommand(
            Command::new("tree")
                .about("Print every node with its override state")
                .arg(types)
                .arg(config)
                .arg(document)
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a PathBuf> {
    args.get_one::<PathBuf>(name)
        .with_context(|| format!("missing --{name}"))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn session_config(args: &ArgMatches) -> Result<SessionConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => Ok(SessionConfig::from_yaml_str(&read(path)?)?),
        None => Ok(SessionConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let Some((name, args)) = matches.subcommand() else {
        return Ok(());
    };
    let registry = commands::registry(&read(path(args, "types")?)?)?;
    let config = session_config(args)?;
    let document = path(args, "document")?;

    match name {
        "check" => {
            let outcome = commands::check(&registry, &read(document)?, &config)?;
            for message in &outcome.report.warnings {
                println!("  warning: {message}");
            }
            if outcome.identical {
                println!("{}: round trip OK", document.display());
            } else {
                println!("{}: re-saved text differs", document.display());
                std::process::exit(1);
            }
        }
        "sync" => {
            let base = read(path(args, "base")?)?;
            let outcome = commands::sync(&registry, &base, &read(document)?, &config)?;
            debug!(
                base = outcome.base_report.warnings.len(),
                derived = outcome.derived_report.warnings.len(),
                sync = outcome.sync.warnings.len(),
                "warnings"
            );
            if args.get_flag("write") {
                std::fs::write(document, &outcome.saved)
                    .with_context(|| format!("writing {}", document.display()))?;
                println!(
                    "{}: {} operation(s) applied",
                    document.display(),
                    outcome.sync.operations.len()
                );
            } else {
                print!("{}", outcome.saved);
            }
        }
        "tree" => {
            let (entries, report) = commands::tree(&registry, &read(document)?, &config)?;
            debug!(warnings = report.warnings.len(), "document loaded");
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print!("{}", commands::render_tree(&entries));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn sync_requires_base() {
        let result = cli().try_get_matches_from(["lineage", "sync", "--types", "t.yaml", "d.yaml"]);
        assert!(result.is_err());
    }

    #[test]
    fn tree_accepts_json_flag() {
        let matches = cli()
            .try_get_matches_from(["lineage", "tree", "--types", "t.yaml", "d.yaml", "--json"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "tree");
        assert!(args.get_flag("json"));
    }
}
