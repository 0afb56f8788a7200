//! artifact rendering and emission
//!
//! A merged tree is rendered into a self-contained PHP file: a header,
//! a `$baseDir` assignment walking up from the artifact's own directory
//! to the project root, a once-only base dir constant, the preambles
//! selected by [EmitOptions] and finally `return <literal>;`. Marker
//! placeholders inside string literals become `$baseDir` concatenations
//! ([crate::base_dir::rewrite_literals]).
//!
//! Writes are skipped when the target file already has the exact
//! content, so repeated assembly runs do not touch modification times
//! and do not trigger downstream rebuilds.
use crate::base_dir;
use crate::value::Value;
use std::path::{Path, PathBuf};

const HEADER: &str =
    "<?php\n\n/**\n * Assembled configuration. Do not edit, changes will be overwritten.\n */\n\n";
const BASE_DIR_VAR: &str = "$baseDir";
const BASE_DIR_CONSTANT: &str = "CONFAB_BASE_DIR";
const INDENT: &str = "    ";

/// Preamble selection for one emitted unit
#[derive(derive_new::new, Debug, Clone)]
pub struct EmitOptions {
    /// define the shared base dir constant (guarded, at most once per process)
    pub define_base_constant: bool,
    /// merge environment overrides from the sibling `env` artifact
    pub merge_env: bool,
    /// require the sibling `defines` artifact
    pub require_defines: bool,
    /// require the sibling `params` artifact into `$params`
    pub require_params: bool,
}

impl EmitOptions {
    /// Preamble preset for a unit name
    ///
    /// A special unit must not require its own not-yet-written sibling,
    /// so each special only sees the preambles of the specials built
    /// before it.
    pub fn for_unit(name: &str) -> Self {
        match name {
            "env" => Self::new(true, false, false, false),
            "defines" => Self::new(true, true, false, false),
            "params" => Self::new(true, true, true, false),
            _ => Self::new(true, true, true, true),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EmitError {
    #[error("Unable to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to write artifact {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Number of directory levels between `output_path`'s directory and `base_dir`
///
/// Recomputed per output path since different units may be emitted at
/// different depths. An artifact outside the base directory falls back
/// to depth 0.
pub fn depth_below(output_path: &Path, base_dir: &Path) -> usize {
    let output_dir = output_path.parent().unwrap_or(output_path);
    let output_dir = base_dir::normalize_root(&output_dir.to_string_lossy());
    let base = base_dir::normalize_root(&base_dir.to_string_lossy());

    if output_dir == base {
        return 0;
    }

    match output_dir.strip_prefix(&format!("{base}/")) {
        Some(suffix) => suffix.matches('/').count() + 1,
        None => {
            tracing::debug!(output=%output_dir, base=%base, "artifact is outside the base directory");
            0
        }
    }
}

fn base_dir_expression(depth: usize) -> String {
    if depth == 0 {
        return "__DIR__".to_string();
    }

    format!("dirname(__DIR__, {depth})")
}

/// Render a tree as a PHP literal
pub fn render(tree: &Value) -> String {
    let mut rendered = String::new();
    render_value(tree, 0, &mut rendered);
    rendered
}

fn render_value(value: &Value, level: usize, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Boolean(true) => out.push_str("true"),
        Value::Boolean(false) => out.push_str("false"),
        Value::Integer(number) => out.push_str(&number.to_string()),
        Value::Decimal(number) => out.push_str(&number.to_string()),
        Value::String(string) => out.push_str(&quote(string)),
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }

            out.push_str("[\n");
            for item in items {
                pad(level + 1, out);
                render_value(item, level + 1, out);
                out.push_str(",\n");
            }
            pad(level, out);
            out.push(']');
        }
        Value::Object(entries) => {
            if entries.is_empty() {
                out.push_str("[]");
                return;
            }

            out.push_str("[\n");
            for (key, value) in entries {
                pad(level + 1, out);
                out.push_str(&quote(key));
                out.push_str(" => ");
                render_value(value, level + 1, out);
                out.push_str(",\n");
            }
            pad(level, out);
            out.push(']');
        }
    }
}

fn pad(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

/// PHP single-quoted string, only `\` and `'` need escaping
fn quote(string: &str) -> String {
    let escaped = string.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Assemble the full artifact text for a tree emitted `depth` levels below the project root
pub fn assemble(tree: &Value, depth: usize, options: &EmitOptions) -> String {
    let mut text = String::from(HEADER);

    text.push_str(&format!(
        "{BASE_DIR_VAR} = {};\n",
        base_dir_expression(depth)
    ));

    if options.define_base_constant {
        text.push_str(&format!(
            "defined('{BASE_DIR_CONSTANT}') or define('{BASE_DIR_CONSTANT}', {BASE_DIR_VAR});\n"
        ));
    }
    if options.merge_env {
        text.push_str("$_ENV = array_merge($_ENV, require __DIR__ . '/env.php');\n");
    }
    if options.require_defines {
        text.push_str("require_once __DIR__ . '/defines.php';\n");
    }
    if options.require_params {
        text.push_str("$params = require __DIR__ . '/params.php';\n");
    }

    text.push('\n');
    text.push_str("return ");
    text.push_str(&render(tree));
    text.push_str(";\n");

    base_dir::rewrite_literals(&text, BASE_DIR_VAR)
}

/// Emit the artifact for `tree` at `output_path`
///
/// Returns whether a write happened. An existing byte-identical file is
/// left untouched; on failure the previous artifact stays as it was.
pub fn emit(
    output_path: &Path,
    base_dir: &Path,
    tree: &Value,
    options: &EmitOptions,
) -> Result<bool, EmitError> {
    let depth = depth_below(output_path, base_dir);
    let content = assemble(tree, depth, options);

    write_if_changed(output_path, content.as_bytes())
}

fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool, EmitError> {
    if let Ok(existing) = std::fs::read(path) {
        if existing == content {
            tracing::debug!(path=%path.display(), "artifact unchanged");
            return Ok(false);
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| EmitError::CreateDir {
            path: parent.to_owned(),
            source,
        })?;
    }

    // write-then-rename: the previous artifact must survive any failure
    // before the new content is fully on disk
    let staging = path.with_extension("tmp");
    std::fs::write(&staging, content).map_err(|source| EmitError::Write {
        path: path.to_owned(),
        source,
    })?;

    if let Err(source) = std::fs::rename(&staging, path) {
        let _ = std::fs::remove_file(&staging);
        return Err(EmitError::Write {
            path: path.to_owned(),
            source,
        });
    }

    tracing::info!(path=%path.display(), "artifact written");
    Ok(true)
}
