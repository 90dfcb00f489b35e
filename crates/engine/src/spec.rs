//! Typed, default-aware access to the free-form `spec` map.
//!
//! Engine inputs carry a schema-less key→value map for engine-specific
//! tuning. Consumers go through this extractor instead of poking at the raw
//! values; it owns the coercion quirks JSON decoding introduces (numbers
//! arriving as floats, heterogeneous sequences).

use forge_artifacts::SpecMap;
use serde_json::Value;
use std::collections::BTreeMap;

/// Error returned by the `require_*` readers.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("required field {key:?} is missing or has wrong type (expected {kind})")]
pub struct SpecError {
    key: String,
    kind: &'static str,
}

/// Read-only view over an input's `spec` map. An absent map behaves as a map
/// with no keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct Spec<'a> {
    map: Option<&'a SpecMap>,
}

impl<'a> Spec<'a> {
    pub fn new(map: &'a SpecMap) -> Self {
        Self { map: Some(map) }
    }

    /// A view with no keys.
    pub fn empty() -> Self {
        Self { map: None }
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.map.and_then(|map| map.get(key))
    }

    fn require<T>(value: Option<T>, key: &str, kind: &'static str) -> Result<T, SpecError> {
        value.ok_or_else(|| SpecError { key: key.to_string(), kind })
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.value(key)?.as_str().map(str::to_string)
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn require_string(&self, key: &str) -> Result<String, SpecError> {
        Self::require(self.string(key), key, "string")
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.value(key)?.as_bool()
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.bool(key).unwrap_or(default)
    }

    pub fn require_bool(&self, key: &str) -> Result<bool, SpecError> {
        Self::require(self.bool(key), key, "bool")
    }

    /// Integers may arrive as floats after a JSON decode; a float is accepted
    /// iff it exactly equals its integer truncation.
    pub fn integer(&self, key: &str) -> Option<i64> {
        let value = self.value(key)?;
        if let Some(int) = value.as_i64() {
            return Some(int);
        }
        let float = value.as_f64()?;
        if float.is_finite()
            && float == float.trunc()
            && float >= i64::MIN as f64
            && float < i64::MAX as f64
        {
            return Some(float as i64);
        }
        None
    }

    pub fn integer_or(&self, key: &str, default: i64) -> i64 {
        self.integer(key).unwrap_or(default)
    }

    pub fn require_integer(&self, key: &str) -> Result<i64, SpecError> {
        Self::require(self.integer(key), key, "integer")
    }

    /// A sequence whose elements are all strings. Mixed sequences are
    /// rejected as absent.
    pub fn string_seq(&self, key: &str) -> Option<Vec<String>> {
        let items = self.value(key)?.as_array()?;
        items.iter().map(|item| item.as_str().map(str::to_string)).collect()
    }

    pub fn string_seq_or(&self, key: &str, default: &[&str]) -> Vec<String> {
        self.string_seq(key)
            .unwrap_or_else(|| default.iter().map(|s| (*s).to_string()).collect())
    }

    pub fn require_string_seq(&self, key: &str) -> Result<Vec<String>, SpecError> {
        Self::require(self.string_seq(key), key, "string sequence")
    }

    /// A mapping whose values are all strings. Mixed mappings are rejected as
    /// absent.
    pub fn string_map(&self, key: &str) -> Option<BTreeMap<String, String>> {
        let entries = self.value(key)?.as_object()?;
        entries
            .iter()
            .map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }

    pub fn require_string_map(&self, key: &str) -> Result<BTreeMap<String, String>, SpecError> {
        Self::require(self.string_map(key), key, "string map")
    }

    /// A nested free-form mapping.
    pub fn nested(&self, key: &str) -> Option<SpecMap> {
        self.value(key)?.as_object().cloned()
    }

    pub fn require_nested(&self, key: &str) -> Result<SpecMap, SpecError> {
        Self::require(self.nested(key), key, "mapping")
    }
}

impl<'a> From<&'a SpecMap> for Spec<'a> {
    fn from(map: &'a SpecMap) -> Self {
        Self::new(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn spec_from(value: Value) -> SpecMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reads_json_decoded_shapes() {
        let map = spec_from(json!({
            "timeout": 30,
            "tags": ["a", "b"],
            "env": {"K": "V"},
            "debug": true,
            "values": {"replicas": 2}
        }));
        let spec = Spec::new(&map);

        assert_eq!(spec.integer("timeout"), Some(30));
        assert_eq!(spec.string_seq("tags"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(
            spec.string_map("env"),
            Some(BTreeMap::from([("K".to_string(), "V".to_string())]))
        );
        assert_eq!(spec.bool("debug"), Some(true));
        assert!(spec.nested("values").is_some());
    }

    #[test]
    fn float_integers_coerce() {
        let map = spec_from(json!({"whole": 30.0, "fractional": 30.5}));
        let spec = Spec::new(&map);
        assert_eq!(spec.integer("whole"), Some(30));
        assert_eq!(spec.integer("fractional"), None);
        assert_eq!(spec.integer_or("fractional", 7), 7);
    }

    #[test]
    fn mixed_sequences_are_absent() {
        let map = spec_from(json!({"tags": ["a", 1]}));
        let spec = Spec::new(&map);
        assert_eq!(spec.string_seq("tags"), None);
    }

    #[test]
    fn mixed_maps_are_absent() {
        let map = spec_from(json!({"env": {"K": "V", "N": 3}}));
        let spec = Spec::new(&map);
        assert_eq!(spec.string_map("env"), None);
    }

    #[test]
    fn absent_map_has_no_keys() {
        let spec = Spec::empty();
        assert_eq!(spec.string("anything"), None);
        assert_eq!(spec.string_or("anything", "fallback"), "fallback");
    }

    #[test]
    fn require_has_stable_message() {
        let map = spec_from(json!({"timeout": "soon"}));
        let spec = Spec::new(&map);
        let err = spec.require_integer("timeout").unwrap_err();
        assert_eq!(
            err.to_string(),
            "required field \"timeout\" is missing or has wrong type (expected integer)"
        );
    }

    proptest! {
        #[test]
        fn integral_floats_always_coerce(v in -1_000_000_000i64..1_000_000_000i64) {
            let map = spec_from(json!({"n": v as f64}));
            let spec = Spec::new(&map);
            prop_assert_eq!(spec.integer("n"), Some(v));
        }

        #[test]
        fn fractional_floats_never_coerce(v in -1_000_000i64..1_000_000i64, frac in 1u32..999u32) {
            let value = v as f64 + f64::from(frac) / 1000.0;
            prop_assume!(value != value.trunc());
            let map = spec_from(json!({"n": value}));
            let spec = Spec::new(&map);
            prop_assert_eq!(spec.integer("n"), None);
        }

        #[test]
        fn string_seqs_round_trip(items in proptest::collection::vec("[a-z]{0,8}", 0..8)) {
            let map = spec_from(json!({"items": items.clone()}));
            let spec = Spec::new(&map);
            prop_assert_eq!(spec.string_seq("items"), Some(items));
        }
    }
}
