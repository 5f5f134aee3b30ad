use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use mlwr_search::{FieldRegistry, ObjectType, QueryNode, QueryTranslator};
use mlwr_server::{MlwrServer, ServerConfig};
use serde_json::json;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Remotes(args) => cmd_remotes(args, format),
        Command::Fields(args) => cmd_fields(args, format),
        Command::Explain(args) => cmd_explain(args, format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if config.users.is_empty() {
        tracing::warn!("no users configured; every API request will be rejected");
    }
    println!(
        "{} {} on {} ({} remotes)",
        "✓".green().bold(),
        config.instance_name.bold(),
        config.bind_addr.to_string().yellow(),
        config.remotes.len()
    );
    MlwrServer::new(config).serve().await?;
    Ok(())
}

fn cmd_remotes(args: ConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    if let OutputFormat::Json = format {
        let remotes: Vec<_> = config
            .remotes
            .iter()
            .map(|r| json!({"name": r.name, "url": r.url}))
            .collect();
        println!("{}", serde_json::to_string_pretty(&remotes)?);
        return Ok(());
    }
    if config.remotes.is_empty() {
        println!("No remotes configured.");
    }
    for remote in &config.remotes {
        println!("{}  {}", remote.name.bold(), remote.url.blue());
    }
    Ok(())
}

fn resolve_type(registry: &FieldRegistry, name: &str) -> anyhow::Result<ObjectType> {
    registry.object_type(name).with_context(|| {
        format!(
            "unknown object type {name:?} (expected one of: {})",
            registry.type_names().join(", ")
        )
    })
}

fn cmd_fields(args: FieldsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let registry = FieldRegistry::with_defaults();
    let names = match &args.object_type {
        Some(name) => {
            resolve_type(&registry, name)?;
            vec![name.as_str()]
        }
        None => registry.type_names(),
    };

    let mut listing = serde_json::Map::new();
    for name in names {
        let ty = resolve_type(&registry, name)?;
        let fields: Vec<_> = registry.fields(ty).collect();
        match format {
            OutputFormat::Json => {
                let table = fields
                    .iter()
                    .map(|(field, kind)| (field.to_string(), json!(kind.describe())))
                    .collect();
                listing.insert(name.to_string(), serde_json::Value::Object(table));
            }
            OutputFormat::Text => {
                println!("{} ({})", name.yellow().bold(), ty);
                for (field, kind) in fields {
                    println!("  {:<16} {}", field, kind.describe().dimmed());
                }
            }
        }
    }
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    }
    Ok(())
}

fn cmd_explain(args: ExplainArgs, format: OutputFormat) -> anyhow::Result<()> {
    let registry = FieldRegistry::with_defaults();
    let queried = resolve_type(&registry, &args.object_type)?;
    let node: QueryNode = serde_json::from_str(&args.query).context("parsing query JSON")?;
    let predicate = QueryTranslator::new(&registry).translate(queried, &node)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({"type": queried.to_string(), "predicate": predicate.to_string()})
        ),
        OutputFormat::Text => println!("{} {}", queried.to_string().cyan(), predicate),
    }
    Ok(())
}
