use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use sws_core::{ReplayEngine, ReplayReport, StoreConfig, SwitchStore};
use sws_record::format_value;
use sws_schema::{AttributeMetadata, ModelInfo};
use sws_types::AttributeValue;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Replay(args) => cmd_replay(args, cli.format),
        Command::DumpInfo(args) => cmd_dump_info(args, cli.format),
        Command::Show(args) => cmd_show(args, cli.format),
    }
}

fn open_store(args: &ModelArgs) -> anyhow::Result<SwitchStore> {
    let model = ModelInfo::from_json_file(&args.model)
        .with_context(|| format!("loading model {}", args.model.display()))?;
    let config = match &args.config {
        Some(path) => StoreConfig::from_toml_file(path)?,
        None => StoreConfig::default(),
    };
    debug!(model = %args.model.display(), recording = config.record.path.is_some(), "opening store");
    Ok(SwitchStore::new(Arc::new(model), config)?)
}

#[derive(Serialize)]
struct ReplaySummary {
    report: ReplayReport,
    objects: usize,
    dumped: Option<u64>,
}

fn cmd_replay(args: ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.model)?;
    let report = ReplayEngine::new(&store)
        .replay_file(&args.log)
        .with_context(|| format!("replaying {}", args.log.display()))?;
    let dumped = match &args.dump {
        Some(path) => Some(store.dump(path)?),
        None => None,
    };
    let summary = ReplaySummary {
        report,
        objects: store.object_count(),
        dumped,
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    let r = &summary.report;
    println!("{} Replayed {}", "✓".green().bold(), args.log.display().to_string().bold());
    println!(
        "  applied: {}  commented: {}  gets: {}  notifies: {}  failed: {}",
        r.applied.to_string().bold(),
        r.commented,
        r.gets,
        r.notifies,
        r.failed_status
    );
    if r.truncated_tail {
        println!("  {}", "truncated final line discarded".yellow());
    }
    println!("  live objects: {}", summary.objects.to_string().bold());
    if let (Some(n), Some(path)) = (summary.dumped, &args.dump) {
        println!("{} Dumped {} objects to {}", "✓".green().bold(), n, path.display());
    }
    Ok(())
}

fn cmd_dump_info(args: DumpInfoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.model)?;
    let total = store
        .restore(&args.dump)
        .with_context(|| format!("restoring {}", args.dump.display()))?;
    let counts = type_counts(&store)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }
    println!("{} {} objects in {}", "✓".green().bold(), total, args.dump.display().to_string().bold());
    for (name, n) in &counts {
        println!("  {:<24} {}", name.cyan(), n);
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.model)?;
    ReplayEngine::new(&store)
        .replay_file(&args.log)
        .with_context(|| format!("replaying {}", args.log.display()))?;
    let objects = collect_objects(&store, args.object_type.as_deref())?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(());
    }
    if objects.is_empty() {
        println!("No objects.");
    }
    for obj in &objects {
        println!("{} {}", obj.object_type.yellow().bold(), obj.id.dimmed());
        for (name, value) in &obj.attrs {
            println!("  {name} = {value}");
        }
    }
    Ok(())
}

/// Live objects per type name, skipping empty types.
fn type_counts(store: &SwitchStore) -> anyhow::Result<BTreeMap<String, usize>> {
    let model = store.model();
    let mut counts = BTreeMap::new();
    for ot in model.object_types() {
        let n = store.get_all_handles(ot)?.len();
        if n > 0 {
            counts.insert(model.object_name(ot).to_string(), n);
        }
    }
    Ok(counts)
}

#[derive(Debug, Serialize)]
struct ObjectView {
    id: String,
    object_type: String,
    attrs: Vec<(String, String)>,
}

fn collect_objects(store: &SwitchStore, type_name: Option<&str>) -> anyhow::Result<Vec<ObjectView>> {
    let model = store.model();
    let types = match type_name {
        Some(name) => vec![model.object_type_by_name(name)?],
        None => model.object_types().collect(),
    };
    let mut out = Vec::new();
    for ot in types {
        for id in store.get_all_handles(ot)? {
            let attrs = store
                .get_all(id)?
                .into_iter()
                .map(|a| {
                    let meta = model.attr(a.id)?;
                    Ok((meta.name.clone(), render(meta, &a.value)))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            out.push(ObjectView {
                id: id.to_string(),
                object_type: model.object_name(ot).to_string(),
                attrs,
            });
        }
    }
    Ok(out)
}

fn render(meta: &AttributeMetadata, value: &AttributeValue) -> String {
    match value {
        AttributeValue::Enum(v) => meta
            .enum_name(*v)
            .map_or_else(|| v.to_string(), str::to_string),
        AttributeValue::String(s) => format!("{s:?}"),
        other => format_value(other),
    }
}
