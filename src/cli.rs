//! Command line: load specs → (cpp | python | expand | normalize)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use wrapsmith::backend::write_files;
use wrapsmith::config::{GeneratorConfig, is_yaml};
use wrapsmith::{Backend, CppBackend, PythonBackend};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate C++ or Python wrappers for C libraries from JSON/YAML specs
#[derive(Parser, Debug)]
#[command(version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// log progress (repeat for more detail); RUST_LOG takes precedence
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit C++ classes and a CMakeLists.txt
    Cpp(GenerateOut),
    /// emit a CPython extension module and a setup.py
    Python(GenerateOut),
    /// print documents with templates expanded
    Expand(PrintOut),
    /// print documents in normalized form
    Normalize(PrintOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select the spec inside each document (e.g. /wrapper)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is a spec
    #[arg(long)]
    jq_expr: Option<String>,

    /// generator settings (JSON, or YAML by extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// One or more inputs. May be literal paths or quoted glob patterns.
    /// Files ending in .yml or .yaml are read as YAML, anything else as JSON.
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(clap::Parser, Debug)]
struct PrintOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_config(&self) -> Result<GeneratorConfig> {
        match &self.config {
            Some(path) => GeneratorConfig::load(path),
            None => Ok(GeneratorConfig::default()),
        }
    }

    /// Every spec document named by the inputs, after pointer selection and
    /// jq filtering.
    fn load_documents(&self) -> Result<Vec<(PathBuf, Value)>> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut out = Vec::new();
        for source_path in source_paths {
            let value = read_document(&source_path)?;
            let value = match self.json_pointer.as_deref() {
                None => value,
                Some(pointer) => value
                    .pointer(pointer)
                    .cloned()
                    .with_context(|| format!("{}: nothing at JSON pointer {pointer}", source_path.display()))?,
            };
            match self.jq_expr.as_ref() {
                None => out.push((source_path, value)),
                Some(jq_expr) => {
                    let results = wrapsmith::jq_exec::run_jaq(jq_expr, &value).with_context(|| {
                        format!("failed to apply jq expression to {}", source_path.display())
                    })?;
                    debug!(path = %source_path.display(), documents = results.len(), "jq filter applied");
                    out.extend(results.into_iter().map(|v| (source_path.clone(), v)));
                }
            }
        }
        Ok(out)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Cpp(target) => {
                let config = target.input_settings.load_config()?;
                generate(&target.input_settings, &target.out_dir, &CppBackend::new(config.clone()), &config)
            }
            Command::Python(target) => {
                let config = target.input_settings.load_config()?;
                generate(&target.input_settings, &target.out_dir, &PythonBackend::new(config.clone()), &config)
            }
            Command::Expand(target) => print_documents(target, |doc, _| Ok(wrapsmith::expand(doc)?)),
            Command::Normalize(target) => print_documents(target, |doc, config| {
                Ok(wrapsmith::normalize(doc, &config.normalize_ctx()?)?)
            }),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn generate(settings: &InputSettings, out_dir: &Path, backend: &dyn Backend, config: &GeneratorConfig) -> Result<()> {
    let ctx = config.normalize_ctx()?;
    for (source_path, doc) in settings.load_documents()? {
        let scope = wrapsmith::load_scope(&doc, &ctx).with_context(|| format!("invalid spec {}", source_path.display()))?;
        let files = backend.generate(&scope);
        let written = write_files(out_dir, &files)?;
        info!(spec = %source_path.display(), files = written.len(), "generated");
    }
    Ok(())
}

fn print_documents(
    target: &PrintOut,
    apply: impl Fn(&Value, &GeneratorConfig) -> Result<Value>,
) -> Result<()> {
    let config = target.input_settings.load_config()?;
    let mut outputs = Vec::new();
    for (source_path, doc) in target.input_settings.load_documents()? {
        let value = apply(&doc, &config).with_context(|| format!("invalid spec {}", source_path.display()))?;
        outputs.push(value);
    }
    let result = if outputs.len() == 1 { outputs.remove(0) } else { Value::Array(outputs) };
    let text = serde_json::to_string_pretty(&result)?;
    match target.out.as_ref() {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &text).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn read_document(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    if is_yaml(path) {
        serde_yaml::from_str::<Value>(&source).with_context(|| format!("failed to parse YAML {}", path.display()))
    } else {
        serde_json::from_str::<Value>(&source).with_context(|| format!("failed to parse JSON {}", path.display()))
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
