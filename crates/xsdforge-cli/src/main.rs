mod registry;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use registry::{
    RunContext, RunOptions, init_run_logging, start_run, write_document, write_report,
    write_resolved_config,
};
use thiserror::Error;
use uuid::Uuid;
use xsdforge_config::{
    CONFIG_VERSION, ConfigError, GeneratorConfig, ValidationReport, config_json_schema_value,
    load_config_value, validate_config_against_schema, validate_config_value,
};
use xsdforge_core::{
    Error as CoreError, SCHEMA_VERSION, SchemaModel, build_type_graph_report, validate_schema,
};
use xsdforge_generate::{GenerateOptions, GenerationEngine, GenerationError, XmlOptions};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "xsdforge", version, about = "Schema-driven XML instance generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one XML document into a new run directory.
    Generate(GenerateArgs),
    /// Validate a generator configuration, optionally against a schema model.
    ValidateConfig(ValidateConfigArgs),
    /// Print the type graph report of a schema model.
    InspectSchema(InspectSchemaArgs),
    /// Print the JSON Schema of the schema model or the configuration.
    EmitJsonSchema(EmitJsonSchemaArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Schema model JSON.
    #[arg(long)]
    schema: PathBuf,
    /// Generator configuration (.json or .toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Global element to generate; overrides `metadata.root_element`.
    #[arg(long)]
    root: Option<String>,
    /// Overrides `generation_settings.deterministic_seed`.
    #[arg(long)]
    seed: Option<u64>,
    /// Overrides `generation_settings.mode`.
    #[arg(long)]
    mode: Option<String>,
    /// Extra output path for the generated document.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Keep the completed part of the document on timeout.
    #[arg(long, default_value_t = false)]
    allow_partial: bool,
    /// Wall-clock deadline for the run.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ValidateConfigArgs {
    #[arg(long)]
    config: PathBuf,
    /// Also check element names and paths against this schema model.
    #[arg(long)]
    schema: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectSchemaArgs {
    #[arg(long)]
    schema: PathBuf,
}

#[derive(Args, Debug)]
struct EmitJsonSchemaArgs {
    #[arg(value_enum)]
    target: SchemaTarget,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SchemaTarget {
    Schema,
    Config,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::ValidateConfig(args) => run_validate_config(args),
        Command::InspectSchema(args) => run_inspect_schema(args),
        Command::EmitJsonSchema(args) => run_emit_json_schema(args),
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        schema,
        config,
        root,
        seed,
        mode,
        out,
        run_dir,
        allow_partial,
        timeout_ms,
    } = args;

    let schema_model = read_schema(&schema)?;
    let mut raw_config = match &config {
        Some(path) => {
            let value = load_config_value(path)?;
            match validate_config_value(&value) {
                Ok(validated) => validated.config,
                Err(report) => {
                    print_issues(&report);
                    return Err(CliError::InvalidConfig(report.summary()));
                }
            }
        }
        None => GeneratorConfig::default(),
    };
    if let Some(seed) = seed {
        raw_config.generation_settings.deterministic_seed = Some(seed);
    }
    if let Some(mode) = &mode {
        raw_config.generation_settings.mode = mode.clone();
    }

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        schema_path: schema,
        config_path: config,
        schema_version: SCHEMA_VERSION.to_string(),
        config_version: CONFIG_VERSION.to_string(),
        run_dir,
        out,
        options: RunOptions {
            root_element: root.clone(),
            seed,
            mode,
            allow_partial,
            timeout_ms,
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, run_dir = %run_paths.root.display());
    let timer = Instant::now();

    write_resolved_config(&run_paths, &raw_config)?;

    let engine = GenerationEngine::new(GenerateOptions {
        root_element: root,
        allow_partial,
        timeout_ms,
        run_id: Some(run_id.clone()),
        ..GenerateOptions::default()
    });

    let result = match engine.run(&schema_model, &raw_config) {
        Ok(result) => result,
        Err(GenerationError::Failed(report)) => {
            write_report(&run_paths, &report)?;
            tracing::info!(event = "run_finished", status = "failed");
            return Err(GenerationError::Failed(report).into());
        }
        Err(GenerationError::Configuration { message, issues }) => {
            for issue in &issues {
                eprintln!("error: {issue}");
            }
            tracing::info!(event = "run_finished", status = "invalid_config");
            return Err(CliError::InvalidConfig(message));
        }
        Err(err) => {
            tracing::info!(event = "run_finished", status = "failed", error = %err);
            return Err(err.into());
        }
    };

    let xml_options = XmlOptions::from_overrides(&result.config.overrides);
    let bytes = write_document(
        &run_paths,
        &result.document,
        &xml_options,
        run_ctx.out.as_deref(),
    )?;
    tracing::info!(
        event = "document_written",
        path = %run_paths.document_path.display(),
        bytes
    );

    write_report(&run_paths, &result.report)?;
    tracing::info!(event = "report_written", path = %run_paths.report_path.display());

    let duration_ms = timer.elapsed().as_millis();
    let status = if result.report.partial { "partial" } else { "success" };
    tracing::info!(event = "run_finished", status, duration_ms = duration_ms);

    println!("{}", run_paths.root.display());
    Ok(())
}

fn run_validate_config(args: ValidateConfigArgs) -> Result<(), CliError> {
    let value = load_config_value(&args.config)?;
    let report = match validate_config_value(&value) {
        Ok(validated) => {
            let mut report = ValidationReport {
                warnings: validated.compiled.warnings.clone(),
                ..ValidationReport::default()
            };
            if let Some(schema_path) = &args.schema {
                let schema = read_schema(schema_path)?;
                report.merge(validate_config_against_schema(&validated.compiled, &schema));
            }
            report
        }
        Err(report) => report,
    };

    print_issues(&report);
    if report.is_ok() {
        println!("configuration ok ({} warnings)", report.warnings.len());
        Ok(())
    } else {
        Err(CliError::InvalidConfig(report.summary()))
    }
}

fn run_inspect_schema(args: InspectSchemaArgs) -> Result<(), CliError> {
    let schema = read_schema(&args.schema)?;
    validate_schema(&schema)?;
    let report = build_type_graph_report(&schema);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_emit_json_schema(args: EmitJsonSchemaArgs) -> Result<(), CliError> {
    let value = match args.target {
        SchemaTarget::Schema => serde_json::to_value(schemars::schema_for!(SchemaModel))?,
        SchemaTarget::Config => config_json_schema_value()?,
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn read_schema(path: &Path) -> Result<SchemaModel, CliError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn print_issues(report: &ValidationReport) {
    for issue in &report.errors {
        eprintln!("error: {issue}");
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
    for issue in &report.warnings {
        eprintln!("warning: {issue}");
    }
}
