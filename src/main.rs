use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sluice_config::Recipe;
use sluice_runtime::{PipelineEngine, PreparedPipeline, RuntimeConfig, TriggerRequest};
use sluice_workflow::Plan;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod builtin;

/// Sluice - batch pipeline recipes over a dependency graph
#[derive(Parser)]
#[command(name = "sluice")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Runtime config file (default: ~/.sluice/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a recipe over the payload read from stdin (an object or an array of objects)
  Run {
    recipe_file: PathBuf,

    /// Secret passed to the trigger, as KEY=VALUE
    #[arg(long = "secret", value_parser = parse_secret)]
    secrets: Vec<(String, String)>,
  },

  /// Print the execution groups of a recipe
  Plan { recipe_file: PathBuf },

  /// Validate a recipe without running it
  Check { recipe_file: PathBuf },
}

fn main() -> Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    ))
    .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
    .init();

  let cli = Cli::parse();

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Run {
      recipe_file,
      secrets,
    }) => rt.block_on(run(&recipe_file, secrets, cli.config)),
    Some(Commands::Plan { recipe_file }) => rt.block_on(plan(&recipe_file, cli.config)),
    Some(Commands::Check { recipe_file }) => rt.block_on(check(&recipe_file, cli.config)),
    None => {
      println!("sluice - use --help to see available commands");
      Ok(())
    }
  }
}

async fn run(
  recipe_file: &Path,
  secrets: Vec<(String, String)>,
  config: Option<PathBuf>,
) -> Result<()> {
  let (engine, prepared) = prepare(recipe_file, config).await?;

  let items = match read_payload_from_stdin()? {
    serde_json::Value::Array(items) => items,
    payload => vec![payload],
  };
  let mut request = TriggerRequest::new(items);
  request.secrets.extend(secrets);

  let cancel = CancellationToken::new();
  let ctrl_c = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      ctrl_c.cancel();
    }
  });

  let result = engine
    .execute(&prepared, request, cancel)
    .await
    .context("trigger could not be executed")?;

  println!("{}", serde_json::to_string_pretty(&result)?);
  Ok(())
}

async fn plan(recipe_file: &Path, config: Option<PathBuf>) -> Result<()> {
  let (_, prepared) = prepare(recipe_file, config).await?;
  print_plan(prepared.plan(), 0);
  Ok(())
}

fn print_plan(plan: &Plan, depth: usize) {
  let indent = "  ".repeat(depth);
  for (number, group) in plan.schedule().groups().iter().enumerate() {
    let ids: Vec<&str> = group
      .iter()
      .map(|&slot| plan.dag().component(slot).id.as_str())
      .collect();
    println!("{}group {}: {}", indent, number, ids.join(", "));
    for &slot in group {
      if let Some(body) = plan.nested(slot) {
        println!("{}  {}:", indent, plan.dag().component(slot).id);
        print_plan(body, depth + 2);
      }
    }
  }
}

async fn check(recipe_file: &Path, config: Option<PathBuf>) -> Result<()> {
  let (_, prepared) = prepare(recipe_file, config).await?;
  println!(
    "ok: {} components in {} groups",
    prepared.plan().dag().len(),
    prepared.plan().schedule().len()
  );
  Ok(())
}

async fn prepare(
  recipe_file: &Path,
  config: Option<PathBuf>,
) -> Result<(PipelineEngine, PreparedPipeline)> {
  let config = load_config(config).await?;

  let content = tokio::fs::read_to_string(recipe_file)
    .await
    .with_context(|| format!("failed to read recipe file: {}", recipe_file.display()))?;
  let recipe = Recipe::from_json(&content)
    .with_context(|| format!("failed to parse recipe file: {}", recipe_file.display()))?;

  let engine = PipelineEngine::new(builtin::registry(), config);
  let prepared = engine
    .prepare(recipe)
    .with_context(|| format!("invalid recipe: {}", recipe_file.display()))?;
  Ok((engine, prepared))
}

async fn load_config(path: Option<PathBuf>) -> Result<RuntimeConfig> {
  if let Some(path) = path {
    return RuntimeConfig::load(&path)
      .await
      .with_context(|| format!("failed to load config: {}", path.display()));
  }

  let Some(home) = dirs::home_dir() else {
    return Ok(RuntimeConfig::default());
  };
  let default = home.join(".sluice").join("config.json");
  if !tokio::fs::try_exists(&default).await.unwrap_or(false) {
    return Ok(RuntimeConfig::default());
  }
  RuntimeConfig::load(&default)
    .await
    .with_context(|| format!("failed to load config: {}", default.display()))
}

fn parse_secret(raw: &str) -> Result<(String, String), String> {
  match raw.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("secret must be KEY=VALUE, got '{}'", raw)),
  }
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    // No stdin pipe, use empty object
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_secret() {
    assert_eq!(
      parse_secret("token=a=b").unwrap(),
      ("token".to_string(), "a=b".to_string())
    );
    assert!(parse_secret("token").is_err());
    assert!(parse_secret("=x").is_err());
  }
}
