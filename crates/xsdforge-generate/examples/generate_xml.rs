use std::env;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;
use xsdforge_config::{GeneratorConfig, load_config};
use xsdforge_core::SchemaModel;
use xsdforge_generate::{GenerateOptions, GenerationEngine, XmlOptions, to_xml_string};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let mut schema_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut seed: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => schema_path = args.next().map(PathBuf::from),
            "--config" => config_path = args.next().map(PathBuf::from),
            "--seed" => seed = args.next().map(|value| value.parse()).transpose()?,
            _ => {
                if schema_path.is_none() {
                    schema_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let schema_path = schema_path.ok_or("missing --schema path")?;
    let schema_json = std::fs::read_to_string(&schema_path)?;
    let schema: SchemaModel = serde_json::from_str(&schema_json)?;
    let config = match config_path {
        Some(path) => load_config(&path)?,
        None => GeneratorConfig::default(),
    };

    let options = GenerateOptions {
        seed,
        ..GenerateOptions::default()
    };
    let engine = GenerationEngine::new(options);
    let result = engine.run(&schema, &config)?;

    let xml_options = XmlOptions::from_overrides(&result.config.overrides);
    print!("{}", to_xml_string(&result.document, &xml_options));
    Ok(())
}
