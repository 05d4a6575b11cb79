use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use xsdforge_config::GeneratorConfig;
use xsdforge_generate::{GeneratedDocument, GenerationReport, XmlOptions};

use super::{RegistryError, RegistryResult};

/// Serializable generation options for runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub root_element: Option<String>,
    pub seed: Option<u64>,
    pub mode: Option<String>,
    pub allow_partial: bool,
    pub timeout_ms: Option<u64>,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub schema_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub schema_version: String,
    pub config_version: String,
    pub run_dir: PathBuf,
    pub out: Option<PathBuf>,
    pub options: RunOptions,
}

/// JSON record written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: String,
    pub schema_path: String,
    pub config_path: Option<String>,
    pub schema_version: String,
    pub config_version: String,
    pub options: RunOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub resolved_config_path: PathBuf,
    pub document_path: PathBuf,
    pub report_path: PathBuf,
    pub logs_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let record_path = root.join("run.json");
    let logs_path = root.join("logs.ndjson");

    let record = RunRecord {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        schema_path: ctx.schema_path.display().to_string(),
        config_path: ctx
            .config_path
            .as_ref()
            .map(|path| path.display().to_string()),
        schema_version: ctx.schema_version.clone(),
        config_version: ctx.config_version.clone(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };

    write_json(&record_path, &record)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        resolved_config_path: root.join("resolved_config.json"),
        document_path: root.join("document.xml"),
        report_path: root.join("generation_report.json"),
        logs_path,
        root,
    })
}

/// Configuration after CLI overrides, as the engine saw it.
pub fn write_resolved_config(paths: &RunPaths, config: &GeneratorConfig) -> RegistryResult<()> {
    write_json(&paths.resolved_config_path, config)
}

pub fn write_report(paths: &RunPaths, report: &GenerationReport) -> RegistryResult<()> {
    write_json(&paths.report_path, report)
}

/// Write `document.xml`, and a copy to `out_path` when given. Returns the
/// bytes written to the run directory.
pub fn write_document(
    paths: &RunPaths,
    document: &GeneratedDocument,
    options: &XmlOptions,
    out_path: Option<&Path>,
) -> RegistryResult<u64> {
    let bytes = xsdforge_generate::write_document(&paths.document_path, document, options)?;

    if let Some(out_path) = out_path {
        if let Some(parent) = out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        xsdforge_generate::write_document(out_path, document, options)?;
    }

    Ok(bytes)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xsdforge_generate::GeneratedNode;

    fn context(run_dir: &Path, out: Option<PathBuf>) -> RunContext {
        RunContext {
            run_id: "0000-test".to_string(),
            started_at: DateTime::parse_from_rfc3339("2024-05-01T10:20:30Z")
                .unwrap()
                .with_timezone(&Utc),
            schema_path: PathBuf::from("model.json"),
            config_path: None,
            schema_version: "0.1".to_string(),
            config_version: "0.1".to_string(),
            run_dir: run_dir.to_path_buf(),
            out,
            options: RunOptions {
                root_element: None,
                seed: Some(42),
                mode: None,
                allow_partial: false,
                timeout_ms: None,
            },
        }
    }

    #[test]
    fn run_directory_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = start_run(&context(dir.path(), None)).unwrap();

        assert!(
            paths
                .root
                .ends_with("2024-05-01T10-20-30Z__run_0000-test")
        );
        assert!(paths.root.join("run.json").exists());
        assert!(paths.logs_path.exists());

        let record: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(paths.root.join("run.json")).unwrap())
                .unwrap();
        assert_eq!(record["run_id"], "0000-test");
        assert_eq!(record["options"]["seed"], 42);
    }

    #[test]
    fn document_is_copied_to_out() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out.xml");
        let ctx = context(dir.path(), Some(out.clone()));
        let paths = start_run(&ctx).unwrap();
        let document = GeneratedDocument {
            root: GeneratedNode::new("Root", None),
        };

        let bytes =
            write_document(&paths, &document, &XmlOptions::default(), ctx.out.as_deref()).unwrap();

        assert_eq!(std::fs::metadata(&paths.document_path).unwrap().len(), bytes);
        assert_eq!(
            std::fs::read_to_string(&paths.document_path).unwrap(),
            std::fs::read_to_string(&out).unwrap()
        );
    }
}
