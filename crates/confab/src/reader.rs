//! fragment loading
//!
//! One fragment file is read into a [Value] tree by a [FragmentReader]
//! picked from the file extension. Readers receive the already built
//! special unit values as an explicit [ReadContext]: the HCL reader
//! exposes them as variables to expressions, the plain data formats
//! ignore them.
use crate::value::Value;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// One fragment source location
///
/// A leading `?` in the raw location marks the fragment as skippable:
/// it may be missing without a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub path: PathBuf,
    pub skippable: bool,
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('?') {
            Some(path) => Self {
                path: PathBuf::from(path),
                skippable: true,
            },
            None => Self {
                path: PathBuf::from(raw),
                skippable: false,
            },
        }
    }
}

/// Already built special unit values, passed to readers explicitly
#[derive(derive_new::new, Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    pub values: &'a IndexMap<String, Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    #[error("No reader for fragment format of {0}")]
    UnknownFormat(PathBuf),
    #[error("Unable to read fragment")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse JSON fragment")]
    Json(#[from] serde_json::Error),
    #[error("Unable to parse YAML fragment")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unable to evaluate HCL fragment")]
    Hcl(#[from] hcl::Error),
}

/// Loads one fragment file's contents into a value tree
pub trait FragmentReader {
    fn read(&self, contents: &str, context: ReadContext) -> Result<Value, ReadError>;
}

impl std::fmt::Debug for dyn FragmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FragmentReader")
    }
}

/// Pick a reader by file extension
pub fn reader_for(path: &Path) -> Result<&'static dyn FragmentReader, ReadError> {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("json") => Ok(&JsonReader),
        Some("yaml" | "yml") => Ok(&YamlReader),
        Some("hcl") => Ok(&HclReader),
        _ => Err(ReadError::UnknownFormat(path.to_owned())),
    }
}

/// Read one fragment file from disk
pub fn read_fragment(path: &Path, context: ReadContext) -> Result<Value, ReadError> {
    let reader = reader_for(path)?;
    let contents = std::fs::read_to_string(path)?;
    reader.read(&contents, context)
}

pub struct JsonReader;

impl FragmentReader for JsonReader {
    fn read(&self, contents: &str, _context: ReadContext) -> Result<Value, ReadError> {
        let value: serde_json::Value = serde_json::from_str(contents)?;
        Ok(value.into())
    }
}

pub struct YamlReader;

impl FragmentReader for YamlReader {
    fn read(&self, contents: &str, _context: ReadContext) -> Result<Value, ReadError> {
        // an empty fragment file is permitted
        if contents.trim().is_empty() {
            return Ok(Value::empty());
        }

        let value: serde_yaml::Value = serde_yaml::from_str(contents)?;
        Ok(value.into())
    }
}

pub struct HclReader;

impl FragmentReader for HclReader {
    fn read(&self, contents: &str, context: ReadContext) -> Result<Value, ReadError> {
        let mut eval_context = hcl::eval::Context::new();
        for (name, value) in context.values {
            eval_context.declare_var(
                hcl::Identifier::sanitized(name),
                hcl::Value::from(value.clone()),
            );
        }

        let value: hcl::Value = hcl::eval::from_str(contents, &eval_context)?;
        Ok(value.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn no_context() -> &'static IndexMap<String, Value> {
        static EMPTY: std::sync::OnceLock<IndexMap<String, Value>> = std::sync::OnceLock::new();
        EMPTY.get_or_init(Default::default)
    }

    #[test]
    fn location_parse_strips_the_skippable_marker() {
        let location = Location::parse("?config/params-local.json");
        assert_eq!(location.path, PathBuf::from("config/params-local.json"));
        assert!(location.skippable);

        let location = Location::parse("config/params.json");
        assert!(!location.skippable);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let error = reader_for(Path::new("fragment.ini")).expect_err("must not find a reader");
        assert!(matches!(error, ReadError::UnknownFormat(_)));
    }

    #[test]
    fn json_fragments_keep_key_order() {
        let fragment = JsonReader
            .read(r#"{"zeta": 1, "alpha": [1, 2]}"#, ReadContext::new(no_context()))
            .unwrap();

        let Value::Object(entries) = &fragment else {
            panic!("fragment must be a mapping");
        };
        let keys: Vec<_> = entries.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn empty_yaml_fragments_are_empty_mappings() {
        let fragment = YamlReader
            .read("  \n", ReadContext::new(no_context()))
            .unwrap();
        assert_eq!(fragment, Value::empty());
    }

    #[test]
    fn hcl_fragments_see_special_unit_values() {
        let mut specials = IndexMap::new();
        specials.insert(
            "params".to_string(),
            Value::from(json!({"admin": "root@example.test"})),
        );

        let fragment = HclReader
            .read(
                r#"notify = params.admin"#,
                ReadContext::new(&specials),
            )
            .unwrap();

        assert_eq!(fragment, Value::from(json!({"notify": "root@example.test"})));
    }
}
