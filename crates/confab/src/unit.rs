//! named configuration units and the assembly run
//!
//! A [ConfigUnit] owns the pipeline for one named output: load its
//! fragments, merge them, substitute the base dir marker and emit the
//! artifact. [Assembly] drives all units of one run, building the
//! special units first so their merged values can be injected into
//! every ordinary unit.
use crate::artifact::{self, EmitError, EmitOptions};
use crate::base_dir;
use crate::merge::merge;
use crate::reader::{read_fragment, Location, ReadContext};
use crate::value::Value;
use std::path::PathBuf;

/// Special units, in build order
///
/// Their merged values become implicit low-precedence context for every
/// ordinary unit, so they must be built before anything else.
pub const SPECIAL_UNITS: [&str; 3] = ["env", "defines", "params"];

/// Special units whose merged values are injected into ordinary units
///
/// `env` stays out: its data reaches the artifacts through the
/// environment-merge preamble, not through the merge.
const INJECTED_UNITS: [&str; 2] = ["defines", "params"];

pub fn is_special(name: &str) -> bool {
    SPECIAL_UNITS.contains(&name)
}

/// Warning sink for non-fatal fragment problems
pub trait Reporter {
    fn warning(&self, message: &str);
}

/// Reports through the tracing stack
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Shared state for all units of one assembly run
#[derive(derive_new::new)]
pub struct BuilderContext {
    /// project base directory, the prefix replaced by the marker
    pub base_dir: PathBuf,
    /// directory the artifacts are written to
    pub output_dir: PathBuf,
    /// extra tree merged into every ordinary unit (environment/alias data
    /// not sourced from any fragment file)
    pub addition: Value,
    /// merged values of the special units built so far
    #[new(default)]
    pub specials: indexmap::IndexMap<String, Value>,
    /// warning sink, plain stderr when not set
    #[new(default)]
    pub reporter: Option<Box<dyn Reporter>>,
}

impl BuilderContext {
    pub fn output_path(&self, unit_name: &str) -> PathBuf {
        self.output_dir.join(format!("{unit_name}.php"))
    }

    fn warn(&self, message: &str) {
        match &self.reporter {
            Some(reporter) => reporter.warning(message),
            None => eprintln!("warning: {message}"),
        }
    }
}

/// One loaded fragment
#[derive(derive_new::new, Debug)]
pub struct Fragment {
    pub location: Location,
    pub tree: Value,
}

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("Unit {0} has not been built")]
    NotBuilt(String),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

/// One named configuration output
///
/// Lifecycle: created with its locations, [ConfigUnit::load] reads the
/// fragments, [ConfigUnit::build] derives the merged tree,
/// [ConfigUnit::write] emits the artifact. Each stage may be re-invoked
/// and recomputes from the previous one.
#[derive(Debug)]
pub struct ConfigUnit {
    name: String,
    locations: Vec<Location>,
    fragments: Vec<Fragment>,
    merged: Option<Value>,
}

impl ConfigUnit {
    pub fn new(name: impl Into<String>, locations: Vec<Location>) -> Self {
        Self {
            name: name.into(),
            locations,
            fragments: Vec::new(),
            merged: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn merged(&self) -> Option<&Value> {
        self.merged.as_ref()
    }

    /// Read all fragment locations
    ///
    /// Missing or unreadable fragments degrade to empty mappings so the
    /// run can continue. Only non-skippable ones produce a warning.
    pub fn load(&mut self, context: &BuilderContext) {
        let read_context = ReadContext::new(&context.specials);

        self.fragments = self
            .locations
            .iter()
            .map(|location| {
                let path = context.base_dir.join(&location.path);

                if !path.exists() {
                    if !location.skippable {
                        context.warn(&format!(
                            "{}: fragment {} not found",
                            self.name,
                            path.display()
                        ));
                    }
                    return Fragment::new(location.clone(), Value::empty());
                }

                match read_fragment(&path, read_context) {
                    Ok(tree) => {
                        tracing::debug!(unit=%self.name, path=%path.display(), "fragment loaded");
                        Fragment::new(location.clone(), tree)
                    }
                    Err(error) => {
                        context.warn(&format!(
                            "{}: fragment {}: {error}",
                            self.name,
                            path.display()
                        ));
                        Fragment::new(location.clone(), Value::empty())
                    }
                }
            })
            .collect();
    }

    /// Merge the loaded fragments and substitute the base dir marker
    ///
    /// Ordinary units get the shared addition and the injected special
    /// unit values appended behind their own fragments, lowest to
    /// highest precedence: fragments in given order, addition, defines,
    /// params.
    pub fn build(&mut self, context: &BuilderContext) {
        let mut trees: Vec<Value> = self
            .fragments
            .iter()
            .map(|fragment| fragment.tree.clone())
            .collect();

        if !is_special(&self.name) {
            trees.push(context.addition.clone());
            for special in INJECTED_UNITS {
                if let Some(tree) = context.specials.get(special) {
                    trees.push(tree.clone());
                }
            }
        }

        let merged = merge(trees);
        let root = context.base_dir.to_string_lossy();
        self.merged = Some(base_dir::substitute(merged, &root));
    }

    /// Emit the artifact for this unit
    ///
    /// Returns whether a write happened. Requires a merged tree from a
    /// previous [ConfigUnit::build].
    pub fn write(&self, context: &BuilderContext) -> Result<bool, WriteError> {
        let Some(merged) = &self.merged else {
            return Err(WriteError::NotBuilt(self.name.clone()));
        };

        let output_path = context.output_path(&self.name);
        let options = EmitOptions::for_unit(&self.name);

        Ok(artifact::emit(
            &output_path,
            &context.base_dir,
            merged,
            &options,
        )?)
    }
}

/// All units of one assembly run
pub struct Assembly {
    units: indexmap::IndexMap<String, ConfigUnit>,
}

impl Assembly {
    pub fn new(units: impl IntoIterator<Item = ConfigUnit>) -> Self {
        Self {
            units: units
                .into_iter()
                .map(|unit| (unit.name().to_string(), unit))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ConfigUnit> {
        self.units.get(name)
    }

    pub fn units(&self) -> impl Iterator<Item = &ConfigUnit> {
        self.units.values()
    }

    /// Load and merge every unit, specials first
    ///
    /// Each special publishes its merged value into the context before
    /// the next unit builds, so ordinary units (and later specials'
    /// fragments) see the finished values. A special the run does not
    /// mention is synthesized without fragments: the emitted preambles
    /// require every special sibling, so each one must exist on disk.
    pub fn build_all(&mut self, context: &mut BuilderContext) {
        for special in SPECIAL_UNITS {
            let unit = self
                .units
                .entry(special.to_string())
                .or_insert_with(|| ConfigUnit::new(special, Vec::new()));

            unit.load(context);
            unit.build(context);

            if let Some(merged) = unit.merged() {
                context.specials.insert(special.to_string(), merged.clone());
            }
        }

        for (_, unit) in self
            .units
            .iter_mut()
            .filter(|(name, _)| !is_special(name))
        {
            unit.load(context);
            unit.build(context);
        }
    }

    /// Build and write every unit
    ///
    /// A write failure is reported for its unit and does not stop the
    /// remaining units; the run as a whole errors when any unit failed.
    pub fn run(&mut self, context: &mut BuilderContext) -> anyhow::Result<()> {
        self.build_all(context);

        let mut failures = 0usize;
        for (name, unit) in &self.units {
            match unit.write(context) {
                Ok(true) => tracing::info!(unit=%name, "assembled"),
                Ok(false) => tracing::info!(unit=%name, "unchanged"),
                Err(error) => {
                    tracing::error!(unit=%name, %error, "unable to write artifact");
                    failures += 1;
                }
            }
        }

        anyhow::ensure!(failures == 0, "{failures} unit(s) failed to write");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct CollectingReporter(Arc<Mutex<Vec<String>>>);

    impl Reporter for CollectingReporter {
        fn warning(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn context_for(base_dir: &std::path::Path) -> BuilderContext {
        BuilderContext::new(
            base_dir.to_path_buf(),
            base_dir.join("assembled"),
            Value::empty(),
        )
    }

    #[test]
    fn fragments_merge_and_substitute_end_to_end() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();

        std::fs::write(root.join("one.json"), r#"{"a": 1}"#).unwrap();
        std::fs::write(root.join("two.json"), r#"{"b": [1]}"#).unwrap();
        std::fs::write(
            root.join("three.json"),
            json!({"b": [2], "a": format!("{}/x", root.display())}).to_string(),
        )
        .unwrap();

        let mut unit = ConfigUnit::new(
            "web",
            vec![
                Location::parse("one.json"),
                Location::parse("two.json"),
                Location::parse("three.json"),
            ],
        );

        let context = context_for(root);
        unit.load(&context);
        unit.build(&context);

        assert_eq!(
            unit.merged(),
            Some(&Value::from(json!({"a": "<base-dir>/x", "b": [1, 2]})))
        );
    }

    #[test]
    fn special_values_override_ordinary_fragments() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();

        std::fs::write(root.join("web.json"), r#"{"debug": false, "name": "app"}"#).unwrap();

        let mut context = context_for(root);
        context
            .specials
            .insert("defines".to_string(), Value::from(json!({"debug": true})));
        context.specials.insert(
            "params".to_string(),
            Value::from(json!({"admin": "root@example.test"})),
        );

        let mut unit = ConfigUnit::new("web", vec![Location::parse("web.json")]);
        unit.load(&context);
        unit.build(&context);

        assert_eq!(
            unit.merged(),
            Some(&Value::from(json!({
                "debug": true,
                "name": "app",
                "admin": "root@example.test",
            })))
        );
    }

    #[test]
    fn special_units_do_not_receive_injected_context() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();

        std::fs::write(root.join("params.json"), r#"{"admin": "root@example.test"}"#).unwrap();

        let mut context = context_for(root);
        context
            .specials
            .insert("defines".to_string(), Value::from(json!({"debug": true})));

        let mut unit = ConfigUnit::new("params", vec![Location::parse("params.json")]);
        unit.load(&context);
        unit.build(&context);

        assert_eq!(
            unit.merged(),
            Some(&Value::from(json!({"admin": "root@example.test"})))
        );
    }

    #[test]
    fn missing_fragments_warn_unless_skippable() {
        let project = tempfile::tempdir().unwrap();
        let warnings = Arc::new(Mutex::new(Vec::new()));

        let mut context = context_for(project.path());
        context.reporter = Some(Box::new(CollectingReporter(warnings.clone())));

        let mut unit = ConfigUnit::new(
            "web",
            vec![
                Location::parse("missing.json"),
                Location::parse("?also-missing.json"),
            ],
        );
        unit.load(&context);
        unit.build(&context);

        let warnings = warnings.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing.json"));

        // both degraded to empty fragments
        assert_eq!(unit.merged(), Some(&Value::empty()));
    }

    #[test]
    fn absent_special_units_are_synthesized_and_written() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();

        std::fs::write(root.join("web.json"), r#"{"name": "app"}"#).unwrap();

        let mut context = context_for(root);
        let mut assembly =
            Assembly::new([ConfigUnit::new("web", vec![Location::parse("web.json")])]);

        assembly.run(&mut context).unwrap();

        // every sibling required by the web preambles exists
        for special in SPECIAL_UNITS {
            let artifact =
                std::fs::read_to_string(context.output_path(special)).unwrap();
            assert!(artifact.contains("return [];"));
        }

        assert_eq!(
            assembly.get("env").and_then(ConfigUnit::merged),
            Some(&Value::empty())
        );
    }

    #[test]
    fn tracing_reporter_handles_missing_fragments() {
        let project = tempfile::tempdir().unwrap();

        let mut context = context_for(project.path());
        context.reporter = Some(Box::new(TracingReporter));

        let mut unit = ConfigUnit::new("web", vec![Location::parse("missing.json")]);
        unit.load(&context);
        unit.build(&context);

        assert_eq!(unit.merged(), Some(&Value::empty()));
    }

    #[test]
    fn writing_an_unbuilt_unit_errors() {
        let project = tempfile::tempdir().unwrap();
        let context = context_for(project.path());

        let unit = ConfigUnit::new("web", vec![]);
        let error = unit.write(&context).expect_err("must not write");
        assert!(matches!(error, WriteError::NotBuilt(_)));
    }
}
