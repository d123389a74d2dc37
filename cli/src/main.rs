use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Write, stdout},
    path::{Path, PathBuf},
};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use typewright::{infer::Inference, render::Annotation};

#[derive(Parser, Debug)]
#[command(name = "twg")]
struct TypeWright {
    /// input json sample filepaths; each file becomes one top level named
    /// after its file stem
    inputs: Vec<PathBuf>,

    /// codegen language (csharp, typescript)
    #[arg(short, long)]
    lang: Option<String>,

    /// configuration file describing top levels and renderer options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Optional output file; if omitted, prints to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// disable map inference
    #[arg(long)]
    no_maps: bool,
}

#[derive(Deserialize, Debug, Default)]
struct Config {
    language: Option<String>,
    infer_maps: Option<bool>,
    #[serde(default)]
    top_levels: Vec<TopLevel>,
    #[serde(default)]
    renderer_options: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct TopLevel {
    name: Option<String>,
    #[serde(default)]
    samples: Vec<PathBuf>,
    schema: Option<PathBuf>,
    graphql: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env(/* RUST_LOG env var sets logging level */))
        .with_writer(std::io::stderr)
        .init();

    let args = TypeWright::parse();

    let config: Config = match &args.config {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => Config::default(),
    };

    let lang = args
        .lang
        .clone()
        .or_else(|| config.language.clone())
        .context("no target language; pass --lang or set `language` in the config")?;
    let infer_maps = !args.no_maps && config.infer_maps.unwrap_or(true);

    let mut inference = Inference::new(infer_maps);

    for input in &args.inputs {
        let value = read_json(input)?;
        inference.add_sample(&top_level_name(input, &None), &value)?;
    }

    for top_level in &config.top_levels {
        if let Some(path) = &top_level.schema {
            let value = read_json(path)?;
            inference.add_schema(&top_level_name(path, &top_level.name), &value)?;
        } else if let Some(path) = &top_level.graphql {
            let value = read_json(path)?;
            inference.add_graphql(&top_level_name(path, &top_level.name), &value)?;
        } else {
            // several samples under one name unify into one top level
            for path in &top_level.samples {
                let value = read_json(path)?;
                inference.add_sample(&top_level_name(path, &top_level.name), &value)?;
            }
        }
    }

    let (graph, diagnostics) = inference.finish()?;
    for diagnostic in &diagnostics {
        warn!(path = %diagnostic.path, "{}", diagnostic.message);
    }

    let result = match lang.as_str() {
        "csharp" | "cs" => typewright_csharp::codegen(&graph, &config.renderer_options)?,
        "typescript" | "ts" => typewright_typescript::codegen(&graph)?,
        other => bail!("`{other}` language not supported (expected csharp or typescript)"),
    };

    for annotation in &result.annotations {
        if let Annotation::Issue(message) = &annotation.annotation {
            warn!(line = annotation.span.start_line + 1, "{message}");
        }
    }

    let mut out: Box<dyn Write> = match args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(stdout().lock()),
    };
    for line in &result.lines {
        writeln!(out, "{line}")?;
    }

    Ok(())
}

fn top_level_name(path: &Path, given: &Option<String>) -> String {
    match given {
        Some(name) => name.clone(),
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Root")
            .to_string(),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("invalid JSON in {}", path.display()))
}
