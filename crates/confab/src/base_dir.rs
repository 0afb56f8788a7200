//! base directory marker substitution
//!
//! Emitted artifacts must not contain the absolute project path, otherwise
//! they stop working the moment the project is checked out somewhere else.
//! [substitute] walks a merged tree and rewrites every string that starts
//! at the project root so it starts with [BASE_DIR_MARKER] instead. At
//! emission time [rewrite_literals] turns marker-prefixed string literals
//! back into a runtime concatenation with the artifact's own base
//! directory expression.
use crate::value::Value;

/// Placeholder for the project base directory inside merged values
///
/// Not a valid absolute path prefix, which makes [substitute] idempotent:
/// an already substituted tree passes through unchanged.
pub const BASE_DIR_MARKER: &str = "<base-dir>";

/// Prefix marking a path as skippable for the consumer of the artifact
pub const SKIPPABLE_MARKER: char = '?';

const SEPARATOR: char = '/';

/// Normalize a root directory for prefix matching
///
/// Backslashes become `/` and trailing separators are stripped. A bare
/// `/` root is kept as-is.
pub fn normalize_root(root: &str) -> String {
    let mut normalized: String = root
        .chars()
        .map(|c| if c == '\\' { SEPARATOR } else { c })
        .collect();

    while normalized.len() > 1 && normalized.ends_with(SEPARATOR) {
        normalized.pop();
    }

    normalized
}

/// Replace `root` prefixes in all strings of `tree` with [BASE_DIR_MARKER]
///
/// This is a prefix substitution, not a relativization: strings outside
/// `root`, and strings where `root` does not end at a separator boundary,
/// pass through verbatim. Non-string scalars are never touched.
pub fn substitute(tree: Value, root: &str) -> Value {
    let root = normalize_root(root);
    substitute_tree(tree, &root)
}

fn substitute_tree(tree: Value, root: &str) -> Value {
    match tree {
        Value::String(path) => Value::String(substitute_path(path, root)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute_tree(item, root))
                .collect(),
        ),
        Value::Object(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key, substitute_tree(value, root)))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Prefix-substitute a single string
///
/// `root` must already be normalized. A leading [SKIPPABLE_MARKER] is
/// kept out of the match and re-prepended unchanged.
pub fn substitute_path(path: String, root: &str) -> String {
    let (skippable, candidate) = match path.strip_prefix(SKIPPABLE_MARKER) {
        Some(rest) => ("?", rest),
        None => ("", path.as_str()),
    };

    if candidate == root {
        return format!("{skippable}{BASE_DIR_MARKER}");
    }

    if let Some(remainder) = candidate.strip_prefix(root) {
        if remainder.starts_with(SEPARATOR) {
            return format!("{skippable}{BASE_DIR_MARKER}{remainder}");
        }
    }

    path
}

/// Rewrite marker-prefixed string literals into base dir concatenations
///
/// Runs over the fully rendered artifact text, after serialization: the
/// marker must end up unquoted in the generated code, not as a plain
/// string value. `'<base-dir>/x'` becomes `$baseDir . '/x'` and
/// `'?<base-dir>/x'` becomes `'?' . $baseDir . '/x'`. The skippable form
/// is rewritten first; its replacement no longer contains the marker.
pub fn rewrite_literals(rendered: &str, base_var: &str) -> String {
    let skippable = format!("'{SKIPPABLE_MARKER}{BASE_DIR_MARKER}");
    let plain = format!("'{BASE_DIR_MARKER}");

    rendered
        .replace(
            &skippable,
            &format!("'{SKIPPABLE_MARKER}' . {base_var} . '"),
        )
        .replace(&plain, &format!("{base_var} . '"))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree(value: serde_json::Value) -> Value {
        value.into()
    }

    #[test]
    fn normalize_strips_trailing_separators_and_backslashes() {
        assert_eq!(normalize_root("/project/"), "/project");
        assert_eq!(normalize_root("C:\\project\\"), "C:/project");
        assert_eq!(normalize_root("/"), "/");
    }

    #[test]
    fn exact_match_becomes_the_marker() {
        let substituted = substitute(tree(json!({"p": "/proj"})), "/proj");
        assert_eq!(substituted, tree(json!({"p": "<base-dir>"})));
    }

    #[test]
    fn prefix_match_keeps_the_remainder() {
        let substituted = substitute(tree(json!({"p": "/proj/sub/x"})), "/proj");
        assert_eq!(substituted, tree(json!({"p": "<base-dir>/sub/x"})));
    }

    #[test]
    fn skippable_flag_is_preserved() {
        let substituted = substitute(tree(json!({"p": "?/proj/x"})), "/proj");
        assert_eq!(substituted, tree(json!({"p": "?<base-dir>/x"})));
    }

    #[test]
    fn non_boundary_prefix_passes_through() {
        let substituted = substitute(tree(json!({"p": "/project2/x"})), "/project");
        assert_eq!(substituted, tree(json!({"p": "/project2/x"})));
    }

    #[test]
    fn strings_outside_the_root_pass_through() {
        let original = tree(json!({"p": "/elsewhere/x", "n": 17, "b": true}));
        assert_eq!(substitute(original.clone(), "/proj"), original);
    }

    #[test]
    fn substitution_recurses_through_arrays_and_mappings() {
        let substituted = substitute(
            tree(json!({"paths": ["/proj/a", {"deep": "/proj/b"}]})),
            "/proj/",
        );
        assert_eq!(
            substituted,
            tree(json!({"paths": ["<base-dir>/a", {"deep": "<base-dir>/b"}]}))
        );
    }

    #[test]
    fn substitution_is_idempotent() {
        let once = substitute(tree(json!({"p": "/proj/x", "q": "?/proj"})), "/proj");
        let twice = substitute(once.clone(), "/proj");
        assert_eq!(twice, once);
    }

    #[test]
    fn literals_are_rewritten_to_concatenations() {
        let rendered = "'<base-dir>/runtime' and '<base-dir>' and '?<base-dir>/ext'";
        assert_eq!(
            rewrite_literals(rendered, "$baseDir"),
            "$baseDir . '/runtime' and $baseDir . '' and '?' . $baseDir . '/ext'"
        );
    }

    #[test]
    fn mid_string_markers_are_not_rewritten() {
        let rendered = "'x<base-dir>/y'";
        assert_eq!(rewrite_literals(rendered, "$baseDir"), rendered);
    }
}
