//! `gip` command-line tool
//!
//! Offline checks against contracts, without a producer:
//!
//! ```bash
//! gip validate --contract file_op.json --document reply.txt
//! gip contracts --config gip.toml
//! gip notice --contract file_op.json --document reply.txt
//! ```
//!
//! Exit codes: 0 valid, 1 invalid, 2 usage or configuration error.

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gip_core::{correction_notice, FormatKind, PipelineConfig};
use gip_schema::{Contract, DocumentParser};
use std::io::Read as _;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const EXIT_VALID: i32 = 0;
const EXIT_INVALID: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let code = match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_USAGE
        }
    };
    std::process::exit(code);
}

fn cli() -> Command {
    let contract_arg = Arg::new("contract")
        .long("contract")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON-Schema subset file (.json, .yaml or .yml)");
    let document_arg = Arg::new("document")
        .long("document")
        .value_parser(value_parser!(PathBuf))
        .help("Document to check (reads stdin when omitted)");
    let strict_arg = Arg::new("strict")
        .long("strict")
        .action(ArgAction::SetTrue)
        .help("Reject documents wrapped in Markdown code fences");

    Command::new("gip")
        .version(gip_core::VERSION)
        .about("Guarded instruction pipeline: contract checks for model output")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a document against a contract")
                .arg(contract_arg.clone())
                .arg(document_arg.clone())
                .arg(strict_arg.clone())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the validation outcome as JSON"),
                ),
        )
        .subcommand(
            Command::new("contracts")
                .about("List contracts declared in a configuration file")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Configuration file (.toml, .yaml, .yml or .json)"),
                ),
        )
        .subcommand(
            Command::new("notice")
                .about("Print the correction notice a failing document would trigger")
                .arg(contract_arg)
                .arg(document_arg)
                .arg(strict_arg),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    match matches.subcommand() {
        Some(("validate", args)) => validate(args),
        Some(("contracts", args)) => contracts(args),
        Some(("notice", args)) => notice(args),
        _ => Ok(EXIT_USAGE),
    }
}

fn validate(args: &ArgMatches) -> anyhow::Result<i32> {
    let contract = contract_from(args)?;
    let raw = document_from(args.get_one::<PathBuf>("document"))?;
    let outcome = parser_from(args).validate(&raw, &contract);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.is_valid() {
        println!("valid: document satisfies contract '{}'", contract.name());
    } else {
        println!(
            "invalid: {} violation(s) of contract '{}'",
            outcome.violations().len(),
            contract.name()
        );
        for violation in outcome.violations() {
            println!("  - {violation}");
        }
    }
    Ok(if outcome.is_valid() { EXIT_VALID } else { EXIT_INVALID })
}

fn contracts(args: &ArgMatches) -> anyhow::Result<i32> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("--config is required")?;
    let config = PipelineConfig::from_path(path)?;
    let registry = config.schema_registry()?;

    if registry.is_empty() {
        println!("no contracts declared in {}", path.display());
    }
    for name in registry.names() {
        let contract = registry.get(&name)?;
        match contract.description() {
            Some(description) => println!("{name}\t{}\t{description}", contract.root().describe()),
            None => println!("{name}\t{}", contract.root().describe()),
        }
    }
    Ok(EXIT_VALID)
}

fn notice(args: &ArgMatches) -> anyhow::Result<i32> {
    let contract = contract_from(args)?;
    let raw = document_from(args.get_one::<PathBuf>("document"))?;
    let outcome = parser_from(args).validate(&raw, &contract);

    if outcome.is_valid() {
        println!("document satisfies contract '{}'; no notice needed", contract.name());
        return Ok(EXIT_VALID);
    }
    println!("{}", correction_notice(outcome.violations(), FormatKind::Json));
    Ok(EXIT_INVALID)
}

fn parser_from(args: &ArgMatches) -> DocumentParser {
    DocumentParser::new().with_fenced(!args.get_flag("strict"))
}

fn contract_from(args: &ArgMatches) -> anyhow::Result<Contract> {
    let path = args
        .get_one::<PathBuf>("contract")
        .context("--contract is required")?;
    load_contract(path)
}

/// Contract name is the schema's `title`, else the file stem
fn load_contract(path: &Path) -> anyhow::Result<Contract> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read contract {}", path.display()))?;
    let schema: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&text)?,
        _ => serde_json::from_str(&text)?,
    };
    let name = schema
        .get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "contract".to_string());

    Contract::from_json_schema(name, &schema)
        .with_context(|| format!("invalid contract {}", path.display()))
}

fn document_from(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read document {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read document from stdin")?;
            Ok(text)
        }
    }
}
