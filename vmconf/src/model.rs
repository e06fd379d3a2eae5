//! The configuration model shared by both codecs.
//!
//! A [`ConfigModel`] is an insertion-ordered map from field name to
//! [`FieldValue`]. Keys are open-ended: anything a codec does not recognise is
//! carried through untouched. Absent keys mean "use the caller's default".

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::field_map::render_field;

/// A model value: plain text, or a nested map for materialized sub-structures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Nested(IndexMap<String, FieldValue>),
}

impl FieldValue {
    /// Borrow the text of a [`FieldValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::Nested(_) => None,
        }
    }

    /// Non-empty text, or a nested map with at least one entry.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Text(text) => !text.is_empty(),
            FieldValue::Nested(map) => !map.is_empty(),
        }
    }

    /// Render the value as a single flat-format value string.
    ///
    /// Nested maps become `k=v` pairs joined with `,`.
    pub fn to_flat(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(text) => Cow::Borrowed(text),
            FieldValue::Nested(map) => Cow::Owned(
                map.iter()
                    .map(|(k, v)| format!("{k}={}", v.to_flat()))
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Insertion-ordered configuration fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigModel {
    fields: IndexMap<String, FieldValue>,
}

impl ConfigModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Text of a field, if present and not nested.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Text of a field, or `default` when absent.
    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.text(key).unwrap_or(default)
    }

    /// Flat-format rendering of a field, if present.
    pub fn flat_value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|value| render_field(key, value))
    }

    /// Flat-format rendering of a field, only when its value is truthy.
    pub fn truthy_value(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key)
            .filter(|value| value.is_truthy())
            .map(|value| render_field(key, value))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a new model with `defaults` filled in underneath this one.
    ///
    /// Default keys come first in default order, overridden by this model's
    /// values; keys only this model has follow in their own order.
    pub fn with_defaults(&self, defaults: &ConfigModel) -> ConfigModel {
        let mut merged = defaults.clone();
        for (key, value) in &self.fields {
            merged.fields.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Build a model from a JSON object of edit state.
    ///
    /// Numbers keep their decimal text, booleans become `"1"`/`"0"`, nulls are
    /// dropped, arrays are joined with `,` and objects become nested maps.
    /// Anything other than an object at the top level yields an empty model.
    pub fn from_json_value(value: &Value) -> ConfigModel {
        let mut model = ConfigModel::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                if let Some(field) = json_field(value) {
                    model.insert(key.clone(), field);
                }
            }
        }
        model
    }

    /// Parse JSON edit state. See [`ConfigModel::from_json_value`].
    pub fn from_json_str(raw: &str) -> Result<ConfigModel, serde_json::Error> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_json_value(&value))
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for ConfigModel {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut model = ConfigModel::new();
        for (key, value) in iter {
            model.insert(key, value);
        }
        model
    }
}

fn json_field(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(FieldValue::Text(if *flag { "1" } else { "0" }.to_string())),
        Value::Number(number) => Some(FieldValue::Text(number.to_string())),
        Value::String(text) => Some(FieldValue::Text(text.clone())),
        Value::Array(items) => Some(FieldValue::Text(
            items
                .iter()
                .filter_map(json_field)
                .map(|field| field.to_flat().into_owned())
                .collect::<Vec<_>>()
                .join(","),
        )),
        Value::Object(map) => Some(FieldValue::Nested(
            map.iter()
                .filter_map(|(k, v)| json_field(v).map(|field| (k.clone(), field)))
                .collect(),
        )),
    }
}
