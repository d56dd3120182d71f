mod console;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dialog_graph::{JsonLocalization, NodeReader, ReaderConfig};
use log::warn;
use serde_json::Value;

const USAGE: &str = "\
Usage: dialog-graph <definition.json> <locale-dir> [namespace] [object]

Example:
  dialog-graph demos/border.json demos/locales/en

The namespace defaults to the definition's file name. Give an object name
to play one entry of a definition that holds several dialogs.

Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output.
Loading: DIALOG_POLICY=permissive tolerates broken links, DIALOG_SEED fixes shuffles.";

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   load summaries + tracker statements
    //   RUST_LOG=debug  + every processed node and delay
    //   RUST_LOG=trace  + every dispatched event
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();

    let definition_path = args.get(1).context(USAGE)?;
    let locale_dir = args.get(2).context(USAGE)?;
    let namespace = match args.get(3) {
        Some(namespace) => namespace.clone(),
        None => Path::new(definition_path)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .context("cannot derive a namespace from the definition path")?,
    };
    let object = args.get(4).cloned().unwrap_or_default();
    let language = Path::new(locale_dir)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("en")
        .to_string();

    let config = ReaderConfig::from_env();

    println!("Loading dialog: {definition_path}");
    println!("  Namespace : {namespace}");
    println!("  Object    : {}", if object.is_empty() { "-" } else { object.as_str() });
    println!("  Language  : {language}");
    println!("  Policy    : {:?}", config.policy);

    let raw = fs::read_to_string(definition_path)
        .with_context(|| format!("failed to read {definition_path}"))?;
    let definition: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {definition_path}"))?;

    let localization =
        JsonLocalization::load_dir(locale_dir, language).context("failed to load translations")?;
    if !localization.has_namespace(&namespace) {
        warn!("No translations for namespace '{namespace}' in {locale_dir}");
    }

    let scenario = console::Scenario {
        definition,
        namespace,
        object,
        localization,
        reader: NodeReader::with_config(config),
    };

    console::run(&scenario)
}
