//! precedence-aware merge of value trees
//!
//! [merge] folds an ordered sequence of [Value] trees into one, later
//! trees take precedence. Two mappings merge key by key, two arrays
//! concatenate (a "list of contributions" from multiple sources),
//! anything else is a full replace by the later value.
//!
//! The list/mapping distinction is carried by the [Value] variants
//! themselves, so merge behavior never depends on key shapes.
use crate::value::Value;
use indexmap::map::Entry;

/// Merge an ordered sequence of trees, later trees override earlier ones
///
/// Merging nothing yields the empty mapping. Merging a single tree
/// yields that tree unchanged. The operation is total; there are no
/// error conditions.
pub fn merge<I>(trees: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    trees.into_iter().fold(Value::empty(), merge_pair)
}

fn merge_pair(earlier: Value, later: Value) -> Value {
    match (earlier, later) {
        (Value::Object(mut merged), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match merged.entry(key) {
                    Entry::Occupied(mut entry) => {
                        // keep the first-appearance position of the key
                        let existing = std::mem::replace(entry.get_mut(), Value::Null);
                        *entry.get_mut() = merge_pair(existing, value);
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(value);
                    }
                }
            }

            Value::Object(merged)
        }
        (Value::Array(mut merged), Value::Array(additions)) => {
            merged.extend(additions);
            Value::Array(merged)
        }
        (_, later) => later,
    }
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
    fn nothing_yields_the_empty_mapping() {
        assert_eq!(merge(Vec::new()), Value::empty());
    }

    #[test]
    fn single_tree_is_unchanged() {
        let single = tree(json!({"a": [1, {"b": "c"}]}));
        assert_eq!(merge([single.clone()]), single);
    }

    #[test]
    fn later_scalar_wins() {
        let merged = merge([tree(json!({"a": 1})), tree(json!({"a": 2}))]);
        assert_eq!(merged, tree(json!({"a": 2})));
    }

    #[test]
    fn mappings_merge_recursively() {
        let merged = merge([
            tree(json!({"db": {"host": "localhost", "port": 5432}})),
            tree(json!({"db": {"host": "db.example.test", "user": "app"}})),
        ]);

        assert_eq!(
            merged,
            tree(json!({"db": {"host": "db.example.test", "port": 5432, "user": "app"}}))
        );
    }

    #[test]
    fn arrays_concatenate() {
        let merged = merge([tree(json!({"a": [1, 2]})), tree(json!({"a": [3]}))]);
        assert_eq!(merged, tree(json!({"a": [1, 2, 3]})));
    }

    #[test]
    fn mixed_kinds_replace() {
        let merged = merge([tree(json!({"a": [1]})), tree(json!({"a": {"x": 1}}))]);
        assert_eq!(merged, tree(json!({"a": {"x": 1}})));

        let merged = merge([tree(json!({"a": {"x": 1}})), tree(json!({"a": [1]}))]);
        assert_eq!(merged, tree(json!({"a": [1]})));
    }

    #[test]
    fn key_order_is_first_appearance() {
        let merged = merge([
            tree(json!({"one": 1, "two": 2})),
            tree(json!({"two": 22, "three": 3})),
        ]);

        let Value::Object(entries) = merged else {
            panic!("merged tree must be a mapping");
        };

        let keys: Vec<_> = entries.keys().map(String::as_str).collect();
        assert_eq!(keys, ["one", "two", "three"]);
        assert_eq!(entries["two"], Value::Integer(22));
    }

    #[test]
    fn order_is_associative() {
        let a = tree(json!({"x": {"y": 1}, "list": [1]}));
        let b = tree(json!({"x": {"z": 2}, "list": [2]}));
        let c = tree(json!({"x": {"y": 3}, "other": true}));

        assert_eq!(
            merge([a.clone(), b.clone(), c.clone()]),
            merge([merge([a, b]), c])
        );
    }
}
