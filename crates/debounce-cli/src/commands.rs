use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value};
use tracing::debug;

use debounce_core::{DebounceConfig, Debouncer, PayloadShape};
use debounce_store::{AsyncSnapshotStore, FileStore, JsonCodec, PayloadCodec, SnapshotStore};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.envelope.as_deref())?;
    match cli.command {
        Command::Run(args) => cmd_run(args, config, cli.format),
        Command::Key(args) => cmd_key(args, config, cli.format),
        Command::Show(args) => cmd_show(args, config, cli.format),
    }
}

fn load_config(path: Option<&Path>, envelope: Option<&str>) -> anyhow::Result<DebounceConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => DebounceConfig::default(),
    };
    if let Some(field) = envelope {
        config.shape = PayloadShape::enveloped(field);
    }
    debug!(?config, "loaded debounce config");
    Ok(config)
}

/// Counts of what happened to each input payload.
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    sent: usize,
    suppressed: usize,
}

fn cmd_run(args: RunArgs, config: DebounceConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = FileStore::open(&args.store)
        .with_context(|| format!("opening store {}", args.store.display()))?;
    let debouncer = Debouncer::new(config);

    let reader: Box<dyn BufRead> = match args.input.as_deref() {
        Some(path) if path != Path::new("-") => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        _ => Box::new(io::stdin().lock()),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let stdout = io::stdout();
    let summary = runtime.block_on(process(&debouncer, &store, reader, &mut stdout.lock(), format))?;

    if format == OutputFormat::Text {
        eprintln!(
            "{} {} payloads: {} sent, {} suppressed",
            "✓".green().bold(),
            summary.sent + summary.suppressed,
            summary.sent.to_string().green(),
            summary.suppressed.to_string().yellow(),
        );
    }
    Ok(())
}

async fn process<S, R, W>(
    debouncer: &Debouncer,
    store: &S,
    reader: R,
    out: &mut W,
    format: OutputFormat,
) -> anyhow::Result<Summary>
where
    S: AsyncSnapshotStore + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut summary = Summary::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let payload: Value = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid JSON", index + 1))?;
        let key = debouncer.key_for(&payload);
        let emitted = debouncer.debounce(&payload, store).await?;

        match &emitted {
            Some(_) => summary.sent += 1,
            None => summary.suppressed += 1,
        }
        match (format, emitted) {
            (OutputFormat::Json, emitted) => {
                let record = json!({"key": key, "sent": emitted.is_some(), "payload": emitted});
                writeln!(out, "{record}")?;
            }
            (OutputFormat::Text, Some(payload)) => writeln!(out, "{payload}")?,
            (OutputFormat::Text, None) => writeln!(out, "{}", format!("# suppressed {key}").dimmed())?,
        }
    }
    Ok(summary)
}

fn cmd_key(args: KeyArgs, config: DebounceConfig, format: OutputFormat) -> anyhow::Result<()> {
    let payload: Value = serde_json::from_str(&args.payload).context("payload is not valid JSON")?;
    let key = Debouncer::new(config).key_for(&payload);
    match format {
        OutputFormat::Text => println!("{key}"),
        OutputFormat::Json => println!("{}", json!({ "key": key })),
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, config: DebounceConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = FileStore::open(&args.store)
        .with_context(|| format!("opening store {}", args.store.display()))?;
    let key = format!("{}-{}", args.identity, config.key_suffix);
    let snapshot = match SnapshotStore::fetch(&store, &key)? {
        Some(bytes) => Some(JsonCodec.decode(&bytes)?),
        None => None,
    };

    match (format, snapshot) {
        (OutputFormat::Json, snapshot) => println!("{}", json!({"key": key, "snapshot": snapshot})),
        (OutputFormat::Text, Some(snapshot)) => {
            println!("{}", key.cyan());
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        (OutputFormat::Text, None) => println!("No snapshot stored for {}", args.identity.yellow()),
    }
    Ok(())
}
