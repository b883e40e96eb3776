//! Target-language emitters.
//!
//! A backend turns a validated [`Scope`] into a list of files. Emission is
//! infallible; only writing files to disk can fail.
pub mod cpp;
pub mod python;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::OutputError;
use crate::spec::Scope;

pub use cpp::CppBackend;
pub use python::PythonBackend;

/// A generated file: its name relative to the output directory and its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub name: String,
    pub lines: Vec<String>,
}

impl GeneratedFile {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self { name: name.into(), lines }
    }

    pub fn contents(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

pub trait Backend {
    /// Source files generated for the scope, in emission order.
    fn generate_sources(&self, scope: &Scope) -> Vec<GeneratedFile>;

    /// The build descriptor that compiles the generated sources.
    fn package_descriptor(&self, scope: &Scope, sources: &[GeneratedFile]) -> GeneratedFile;

    fn generate(&self, scope: &Scope) -> Vec<GeneratedFile> {
        let mut files = self.generate_sources(scope);
        let descriptor = self.package_descriptor(scope, &files);
        files.push(descriptor);
        files
    }
}

/// Writes every file under `dir`, creating it if needed.
pub fn write_files(dir: &Path, files: &[GeneratedFile]) -> Result<Vec<PathBuf>, OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io { path: dir.to_path_buf(), source })?;
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(&file.name);
        fs::write(&path, file.contents()).map_err(|source| OutputError::Io { path: path.clone(), source })?;
        info!(path = %path.display(), lines = file.lines.len(), "wrote");
        written.push(path);
    }
    Ok(written)
}

/// Appends `text` to `out` at the given indentation depth (two spaces each).
fn push(out: &mut Vec<String>, depth: usize, text: impl AsRef<str>) {
    let text = text.as_ref();
    if text.is_empty() {
        out.push(String::new());
    } else {
        out.push(format!("{}{}", "  ".repeat(depth), text));
    }
}

fn push_all<I, S>(out: &mut Vec<String>, depth: usize, lines: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for line in lines {
        push(out, depth, line);
    }
}
