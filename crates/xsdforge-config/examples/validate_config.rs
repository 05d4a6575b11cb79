use std::env;
use std::path::PathBuf;

use xsdforge_config::{
    ValidationReport, load_config_value, validate_config_against_schema, validate_config_value,
};
use xsdforge_core::SchemaModel;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut schema_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => {
                schema_path = args.next().map(PathBuf::from);
            }
            _ => {
                if config_path.is_none() {
                    config_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let config_path = config_path.ok_or("missing config path")?;
    let config_json = load_config_value(&config_path)?;

    let validated = match validate_config_value(&config_json) {
        Ok(validated) => validated,
        Err(report) => {
            eprintln!("config validation failed");
            print_report(&report);
            std::process::exit(1);
        }
    };

    let mut report = ValidationReport {
        errors: Vec::new(),
        warnings: validated.compiled.warnings.clone(),
    };
    if let Some(schema_path) = schema_path {
        let contents = std::fs::read_to_string(schema_path)?;
        let schema: SchemaModel = serde_json::from_str(&contents)?;
        report.merge(validate_config_against_schema(&validated.compiled, &schema));
    }

    if !report.is_ok() {
        eprintln!("config does not match schema");
        print_report(&report);
        std::process::exit(1);
    }
    if !report.warnings.is_empty() {
        eprintln!("config validated with warnings:");
        print_report(&report);
    } else {
        println!("config validated successfully");
    }

    Ok(())
}

fn print_report(report: &ValidationReport) {
    for issue in report.errors.iter().chain(report.warnings.iter()) {
        eprintln!("{:?} {}", issue.severity, issue);
        if let Some(hint) = &issue.hint {
            eprintln!("  hint: {hint}");
        }
    }
}
