//! Argument parsing.
//!
//! The surface is deliberately small: `pgshape gen` regenerates the schema
//! modules, `pgshape gen init` writes a starter config, and
//! `pgshape gen schema` prints what introspection sees without generating
//! anything. The subcommand (if any) must directly follow `gen`; every flag
//! accepts both `--flag value` and `--flag=value`, and flags that do not
//! apply to the chosen subcommand are rejected rather than ignored.

use crate::write::WriteMode;
use std::iter::Peekable;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "pgshape.toml";

/// A parsed invocation.
#[derive(Debug, Clone)]
pub enum Command {
    /// Print a help page and exit.
    Help(&'static str),
    /// `pgshape gen`
    Generate(GenerateArgs),
    /// `pgshape gen init`
    Init(InitArgs),
    /// `pgshape gen schema`
    Inspect(InspectArgs),
}

#[derive(Debug, Clone)]
pub struct GenerateArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub mode: WriteMode,
}

#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config: PathBuf,
}

#[derive(Debug, Clone)]
pub struct InspectArgs {
    pub config: PathBuf,
    pub database: Option<String>,
    pub schemas: Option<Vec<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum GenSub {
    Generate,
    Init,
    Inspect,
}

pub fn parse_args(argv: &[String]) -> anyhow::Result<Command> {
    let mut tokens = argv.iter().skip(1).map(String::as_str).peekable();
    match tokens.next() {
        None | Some("-h") | Some("--help") => Ok(Command::Help(ROOT_HELP)),
        Some("gen") => parse_gen(tokens),
        Some(other) => anyhow::bail!("unknown command: {other}"),
    }
}

fn parse_gen<'a>(mut tokens: Peekable<impl Iterator<Item = &'a str>>) -> anyhow::Result<Command> {
    let sub = match tokens.peek().copied() {
        Some("init") => {
            tokens.next();
            GenSub::Init
        }
        Some("schema") => {
            tokens.next();
            GenSub::Inspect
        }
        _ => GenSub::Generate,
    };

    let mut config: Option<String> = None;
    let mut database: Option<String> = None;
    let mut dry_run = false;
    let mut check = false;
    let mut schemas: Option<Vec<String>> = None;

    while let Some(token) = tokens.next() {
        if token == "-h" || token == "--help" {
            return Ok(Command::Help(help_page(sub)));
        }
        let (flag, inline) = split_flag(token)?;
        match flag {
            "--config" => config = Some(flag_value(flag, inline, &mut tokens)?),
            "--database" => database = Some(flag_value(flag, inline, &mut tokens)?),
            "--dry-run" => {
                bare_flag(flag, inline)?;
                dry_run = true;
            }
            "--check" => {
                bare_flag(flag, inline)?;
                check = true;
            }
            "--schemas" => schemas = Some(schema_list(&flag_value(flag, inline, &mut tokens)?)?),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    let config = PathBuf::from(config.unwrap_or_else(|| DEFAULT_CONFIG.to_string()));

    match sub {
        GenSub::Generate => {
            if schemas.is_some() {
                anyhow::bail!("--schemas only applies to `gen schema`");
            }
            let mode = match (dry_run, check) {
                (true, true) => anyhow::bail!("--dry-run and --check are mutually exclusive"),
                (true, false) => WriteMode::DryRun,
                (false, true) => WriteMode::Check,
                (false, false) => WriteMode::Write,
            };
            Ok(Command::Generate(GenerateArgs {
                config,
                database,
                mode,
            }))
        }
        GenSub::Init => {
            if database.is_some() || dry_run || check || schemas.is_some() {
                anyhow::bail!("`gen init` only accepts --config");
            }
            Ok(Command::Init(InitArgs { config }))
        }
        GenSub::Inspect => {
            if dry_run || check {
                anyhow::bail!("--dry-run and --check only apply to `gen`");
            }
            Ok(Command::Inspect(InspectArgs {
                config,
                database,
                schemas,
            }))
        }
    }
}

/// Split a `--flag` or `--flag=value` token.
fn split_flag(token: &str) -> anyhow::Result<(&str, Option<&str>)> {
    if !token.starts_with("--") {
        anyhow::bail!("unexpected argument: {token}");
    }
    Ok(match token.split_once('=') {
        Some((flag, value)) => (flag, Some(value)),
        None => (token, None),
    })
}

/// The value of a flag, inline (`--flag=value`) or from the next token.
fn flag_value<'a>(
    flag: &str,
    inline: Option<&'a str>,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<String> {
    if let Some(value) = inline {
        return Ok(value.to_string());
    }
    match tokens.next() {
        Some(value) => Ok(value.to_string()),
        None => anyhow::bail!("{flag} requires a value"),
    }
}

fn bare_flag(flag: &str, inline: Option<&str>) -> anyhow::Result<()> {
    if inline.is_some() {
        anyhow::bail!("{flag} does not take a value");
    }
    Ok(())
}

fn schema_list(raw: &str) -> anyhow::Result<Vec<String>> {
    let schemas: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if schemas.is_empty() {
        anyhow::bail!("--schemas must name at least one schema");
    }
    Ok(schemas)
}

fn help_page(sub: GenSub) -> &'static str {
    match sub {
        GenSub::Generate => GEN_HELP,
        GenSub::Init => INIT_HELP,
        GenSub::Inspect => SCHEMA_HELP,
    }
}

const ROOT_HELP: &str = "\
pgshape - schema codegen for pgshape

USAGE:
  pgshape gen             Regenerate schema modules from the database catalog
  pgshape gen init        Write a starter pgshape.toml
  pgshape gen schema      Print what introspection sees

Run `pgshape gen --help` for flags.";

const GEN_HELP: &str = "\
USAGE:
  pgshape gen [--config <FILE>] [--database <URL>] [--dry-run | --check]

FLAGS:
  --config <FILE>       Config file path (default: pgshape.toml)
  --database <URL>      Override database.url from config
  --dry-run             Report files that would change without writing
  --check               Exit non-zero if any generated file is stale";

const INIT_HELP: &str = "\
USAGE:
  pgshape gen init [--config <FILE>]

FLAGS:
  --config <FILE>       Where to write the starter config (default: pgshape.toml)";

const SCHEMA_HELP: &str = "\
USAGE:
  pgshape gen schema [--config <FILE>] [--database <URL>] [--schemas <CSV>]

FLAGS:
  --config <FILE>       Config file path (default: pgshape.toml)
  --database <URL>      Database URL (usable without any config file)
  --schemas <CSV>       Comma-separated schema list (default: from config, else public)";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tokens: &[&str]) -> anyhow::Result<Command> {
        let argv: Vec<String> = std::iter::once("pgshape")
            .chain(tokens.iter().copied())
            .map(str::to_string)
            .collect();
        parse_args(&argv)
    }

    #[test]
    fn bare_gen_generates_in_write_mode() {
        match parse(&["gen"]).unwrap() {
            Command::Generate(args) => {
                assert_eq!(args.mode, WriteMode::Write);
                assert_eq!(args.config, PathBuf::from("pgshape.toml"));
                assert!(args.database.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn flag_values_inline_or_separate() {
        let inline = parse(&["gen", "--config=a.toml"]).unwrap();
        let separate = parse(&["gen", "--config", "a.toml"]).unwrap();
        for cmd in [inline, separate] {
            match cmd {
                Command::Generate(args) => assert_eq!(args.config, PathBuf::from("a.toml")),
                other => panic!("unexpected command: {other:?}"),
            }
        }
    }

    #[test]
    fn dry_run_and_check_are_exclusive() {
        match parse(&["gen", "--dry-run"]).unwrap() {
            Command::Generate(args) => assert_eq!(args.mode, WriteMode::DryRun),
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(parse(&["gen", "--dry-run", "--check"]).is_err());
    }

    #[test]
    fn bare_flags_reject_inline_values() {
        assert!(parse(&["gen", "--dry-run=1"]).is_err());
    }

    #[test]
    fn schema_subcommand_takes_csv() {
        match parse(&["gen", "schema", "--schemas=public, app"]).unwrap() {
            Command::Inspect(args) => {
                assert_eq!(
                    args.schemas,
                    Some(vec!["public".to_string(), "app".to_string()])
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(parse(&["gen", "schema", "--schemas=,"]).is_err());
    }

    #[test]
    fn flags_outside_their_subcommand_are_rejected() {
        assert!(parse(&["gen", "--schemas=public"]).is_err());
        assert!(parse(&["gen", "init", "--database=postgres://x"]).is_err());
        assert!(parse(&["gen", "schema", "--check"]).is_err());
    }

    #[test]
    fn unknown_tokens_error() {
        assert!(parse(&["frobnicate"]).is_err());
        assert!(parse(&["gen", "--bogus"]).is_err());
        assert!(parse(&["gen", "extra"]).is_err());
    }

    #[test]
    fn help_short_circuits() {
        assert!(matches!(parse(&[]).unwrap(), Command::Help(_)));
        assert!(matches!(parse(&["gen", "--help"]).unwrap(), Command::Help(_)));
        assert!(matches!(
            parse(&["gen", "init", "-h"]).unwrap(),
            Command::Help(_)
        ));
    }
}
