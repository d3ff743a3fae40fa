use clap::{Parser, Subcommand};
use colored::Colorize;
use shimkit_core::{
    Contract, DictionaryShim, Error, MapRef, MatchMode, Member, NameResolver, Schema, ShimConfig, ShimRef, Value,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// shimkit - structural-capability shims
///
/// Resolve names, inspect contracts, and read or write JSON documents
/// through dictionary shims.
#[derive(Parser)]
#[command(name = "shimkit", version, about, long_about = None)]
struct Cli {
    /// Shim configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a name against candidate names
    Resolve {
        /// Requested name
        name: String,
        /// Candidate names, in precedence order
        #[arg(required = true)]
        candidates: Vec<String>,
        /// Exact matches only
        #[arg(long)]
        strict: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the members of a contract
    Catalog {
        /// Path to schema .json file
        schema: PathBuf,
        /// Contract name
        contract: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Read a member of a JSON document through a contract
    Get {
        /// Path to schema .json file
        schema: PathBuf,
        /// Contract name
        contract: String,
        /// Path to data .json file
        data: PathBuf,
        /// Member name
        member: String,
        /// Exact matches only
        #[arg(long)]
        strict: bool,
    },

    /// Write a member of a JSON document through a contract
    Set {
        /// Path to schema .json file
        schema: PathBuf,
        /// Contract name
        contract: String,
        /// Path to data .json file
        data: PathBuf,
        /// Member name
        member: String,
        /// New value as JSON
        value: String,
        /// Exact matches only
        #[arg(long)]
        strict: bool,
    },

    /// Show version information
    Version,
}

// ── Failures ──────────────────────────────────────────────

/// Exit 1: the lookup or access itself failed
const EXIT_LOOKUP: i32 = 1;
/// Exit 2: usage, IO, schema or configuration problem
const EXIT_ERROR: i32 = 2;

struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn error(message: impl Into<String>) -> Self {
        Failure {
            code: EXIT_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        let code = match err {
            Error::Schema(_) | Error::Config(_) | Error::InvalidContract { .. } => EXIT_ERROR,
            _ => EXIT_LOOKUP,
        };
        Failure {
            code,
            message: err.to_string(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(failure) => {
            eprintln!("{} {}", "error:".red().bold(), failure.message);
            failure.code
        }
    };

    process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32, Failure> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve {
            name,
            candidates,
            strict,
            json,
        } => resolve(&name, &candidates, mode_for(config, strict).mode, json),
        Commands::Catalog { schema, contract, json } => {
            let contract = load_contract(&schema, &contract)?;
            catalog(&contract, json)
        }
        Commands::Get {
            schema,
            contract,
            data,
            member,
            strict,
        } => {
            let contract = load_contract(&schema, &contract)?;
            let map = load_data(&data)?;
            let shim = DictionaryShim::with_config(vec![map], contract, mode_for(config, strict))?;
            let value = ShimRef::new(shim).get(&member)?;
            println!("{}", pretty(&value)?);
            Ok(0)
        }
        Commands::Set {
            schema,
            contract,
            data,
            member,
            value,
            strict,
        } => {
            let contract = load_contract(&schema, &contract)?;
            let map = load_data(&data)?;
            let json: serde_json::Value = serde_json::from_str(&value)
                .map_err(|e| Failure::error(format!("value is not JSON: {}", e)))?;
            let shim = DictionaryShim::with_config(vec![map.clone()], contract, mode_for(config, strict))?;
            ShimRef::new(shim).set(&member, Value::from_json(&json))?;
            println!("{}", pretty(&Value::Map(map))?);
            Ok(0)
        }
        Commands::Version => {
            println!(
                "shimkit {} (shimkit-core {})",
                env!("CARGO_PKG_VERSION"),
                env!("CARGO_PKG_VERSION")
            );
            Ok(0)
        }
    }
}

// ── Commands ──────────────────────────────────────────────

fn resolve(name: &str, candidates: &[String], mode: MatchMode, json: bool) -> Result<i32, Failure> {
    let resolution = NameResolver::new(mode).resolve(name, candidates);

    if json {
        let out = match &resolution {
            Some(r) => serde_json::json!({
                "matched": true,
                "name": r.name,
                "index": r.index,
                "tier": r.tier.to_string(),
            }),
            None => serde_json::json!({ "matched": false }),
        };
        println!("{}", out);
        return Ok(if resolution.is_some() { 0 } else { EXIT_LOOKUP });
    }

    match resolution {
        Some(r) => {
            println!("{} {} ({})", "✓".green().bold(), r.name, r.tier);
            Ok(0)
        }
        None => {
            eprintln!("{} no candidate matches '{}' ({} mode)", "✗".red().bold(), name, mode);
            Ok(EXIT_LOOKUP)
        }
    }
}

fn catalog(contract: &Contract, json: bool) -> Result<i32, Failure> {
    let catalog = contract.catalog();
    let members: Vec<&Member> = catalog.properties().iter().chain(catalog.all_methods()).collect();

    if json {
        let entries: Vec<serde_json::Value> = members.iter().map(|m| member_json(m)).collect();
        let out = serde_json::json!({
            "contract": contract.name(),
            "fingerprint": contract.fingerprint(),
            "members": entries,
        });
        let text = serde_json::to_string_pretty(&out).map_err(|e| Failure::error(e.to_string()))?;
        println!("{}", text);
        return Ok(0);
    }

    println!("{} {}", "contract".bold(), contract.name().cyan());
    for member in members {
        let line = match member.access() {
            Some(access) => format!("property {}: {} [{}]", member.name(), member.ty(), access),
            None => format!("method   {}", member.signature()),
        };
        println!("  {}", line);
        for (key, value) in member.annotations() {
            println!("    {} {}", format!("@{}", key).dimmed(), value);
        }
    }
    Ok(0)
}

fn member_json(member: &Member) -> serde_json::Value {
    let mut out = serde_json::json!({
        "name": member.name(),
        "kind": if member.is_method() { "method" } else { "property" },
        "type": member.ty().to_string(),
        "annotations": member.annotations(),
    });
    if let Some(access) = member.access() {
        out["access"] = serde_json::Value::String(access.to_string());
    } else {
        out["signature"] = serde_json::Value::String(member.signature());
    }
    out
}

// ── Helpers ───────────────────────────────────────────────

fn read_file(path: &Path) -> Result<String, Failure> {
    std::fs::read_to_string(path)
        .map_err(|e| Failure::error(format!("cannot read {}: {}", path.display(), e)))
}

fn load_config(path: Option<&Path>) -> Result<ShimConfig, Failure> {
    match path {
        Some(path) => Ok(ShimConfig::from_json(&read_file(path)?)?),
        None => Ok(ShimConfig::default()),
    }
}

fn mode_for(config: ShimConfig, strict: bool) -> ShimConfig {
    if strict {
        ShimConfig {
            mode: MatchMode::Strict,
            ..config
        }
    } else {
        config
    }
}

fn load_contract(path: &Path, name: &str) -> Result<Arc<Contract>, Failure> {
    let schema = Schema::from_json(&read_file(path)?)?;
    Ok(schema.contract(name)?)
}

fn load_data(path: &Path) -> Result<MapRef, Failure> {
    let json: serde_json::Value = serde_json::from_str(&read_file(path)?)
        .map_err(|e| Failure::error(format!("{} is not JSON: {}", path.display(), e)))?;
    match Value::from_json(&json) {
        Value::Map(map) => Ok(map),
        other => Err(Failure::error(format!(
            "{} must hold a JSON object, found {}",
            path.display(),
            other.type_name()
        ))),
    }
}

fn pretty(value: &Value) -> Result<String, Failure> {
    serde_json::to_string_pretty(&value.to_json()).map_err(|e| Failure::error(e.to_string()))
}
