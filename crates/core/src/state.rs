//! Keyed numeric state for the input form and the derived metrics.

use std::{collections::BTreeMap, fmt, marker::PhantomData};

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::{
    catalog::{INPUT_FIELDS, OUTPUT_FIELDS},
    format,
};

/// Untyped key/value mapping as exchanged with the remote service.
pub type RawFields = BTreeMap<String, Value>;

/// A fixed, ordered set of field keys.
pub trait Catalog {
    /// Name used in log lines.
    const NAME: &'static str;

    /// Keys in catalog order.
    fn keys() -> &'static [&'static str];
}

/// Marker for the input catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inputs;

/// Marker for the output catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Outputs;

const INPUT_KEYS: [&str; INPUT_FIELDS.len()] = {
    let mut keys = [""; INPUT_FIELDS.len()];
    let mut idx = 0;
    while idx < INPUT_FIELDS.len() {
        keys[idx] = INPUT_FIELDS[idx].key;
        idx += 1;
    }
    keys
};

const OUTPUT_KEYS: [&str; OUTPUT_FIELDS.len()] = {
    let mut keys = [""; OUTPUT_FIELDS.len()];
    let mut idx = 0;
    while idx < OUTPUT_FIELDS.len() {
        keys[idx] = OUTPUT_FIELDS[idx].key;
        idx += 1;
    }
    keys
};

impl Catalog for Inputs {
    const NAME: &'static str = "inputs";

    fn keys() -> &'static [&'static str] {
        &INPUT_KEYS
    }
}

impl Catalog for Outputs {
    const NAME: &'static str = "outputs";

    fn keys() -> &'static [&'static str] {
        &OUTPUT_KEYS
    }
}

/// Numeric values for every key of catalog `C`, defaulting to zero.
///
/// The key set is fixed by the catalog: lookups and updates for unknown keys
/// are rejected and merges fill absent keys with `0.0`.
pub struct FieldValues<C: Catalog> {
    values: Vec<f64>,
    _catalog: PhantomData<C>,
}

/// Current input parameters.
pub type InputState = FieldValues<Inputs>;
/// Current derived metrics.
pub type OutputState = FieldValues<Outputs>;

/// Keys a merge had to default or skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Catalog keys absent (or non-numeric) in the remote mapping.
    pub defaulted: Vec<&'static str>,
    /// Remote keys that are not part of the catalog.
    pub ignored: Vec<String>,
}

impl MergeReport {
    /// True when the remote mapping matched the catalog exactly.
    pub fn is_exact(&self) -> bool {
        self.defaulted.is_empty() && self.ignored.is_empty()
    }
}

impl<C: Catalog> FieldValues<C> {
    /// All keys set to zero.
    pub fn new() -> Self {
        Self {
            values: vec![0.0; C::keys().len()],
            _catalog: PhantomData,
        }
    }

    /// Build a state from a remote mapping using [`FieldValues::merge`].
    pub fn from_raw(raw: &RawFields) -> Self {
        let mut state = Self::new();
        state.merge(raw);
        state
    }

    fn index_of(key: &str) -> Option<usize> {
        C::keys().iter().position(|candidate| *candidate == key)
    }

    /// Value stored for `key`, if it belongs to the catalog.
    pub fn get(&self, key: &str) -> Option<f64> {
        Self::index_of(key).map(|idx| self.values[idx])
    }

    /// Store `value` under `key`. Returns `false` for keys outside the catalog.
    pub fn set(&mut self, key: &str, value: f64) -> bool {
        match Self::index_of(key) {
            Some(idx) => {
                self.values[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Iterate `(key, value)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        C::keys().iter().copied().zip(self.values.iter().copied())
    }

    /// Number of catalog keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; catalogs are never empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when every value is strictly greater than zero.
    pub fn all_positive(&self) -> bool {
        self.values.iter().all(|value| *value > 0.0)
    }

    /// Replace every catalog value from `raw`, defaulting absent keys to zero.
    pub fn merge(&mut self, raw: &RawFields) -> MergeReport {
        let mut report = MergeReport::default();
        for (idx, key) in C::keys().iter().enumerate() {
            match raw.get(*key).and_then(numeric_value) {
                Some(value) => self.values[idx] = value,
                None => {
                    self.values[idx] = 0.0;
                    report.defaulted.push(*key);
                }
            }
        }
        report.ignored = raw
            .keys()
            .filter(|key| Self::index_of(key).is_none())
            .cloned()
            .collect();

        if !report.is_exact() {
            debug!(
                catalog = C::NAME,
                defaulted = ?report.defaulted,
                ignored = ?report.ignored,
                "remote mapping did not match catalog"
            );
        }
        report
    }

    /// Convert to the wire mapping.
    pub fn to_raw(&self) -> RawFields {
        self.iter()
            .map(|(key, value)| (key.to_string(), Value::from(value)))
            .collect()
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|v| v.is_finite()),
        Value::String(text) => format::parse_localized(text),
        _ => None,
    }
}

impl<C: Catalog> Default for FieldValues<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Catalog> Clone for FieldValues<C> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            _catalog: PhantomData,
        }
    }
}

impl<C: Catalog> PartialEq for FieldValues<C> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<C: Catalog> fmt::Debug for FieldValues<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<C: Catalog> Serialize for FieldValues<C> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

impl<'de, C: Catalog> Deserialize<'de> for FieldValues<C> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawFields::deserialize(deserializer)?;
        Ok(Self::from_raw(&raw))
    }
}

/// Transient status of the current operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UiStatus {
    /// Message of the last failed operation.
    pub error: Option<String>,
    /// True while a remote chain is in flight.
    pub loading: bool,
}
