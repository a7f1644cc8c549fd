//! Declarative segment templates.
//!
//! A template is a mapping with an optional `name` and an ordered `segments`
//! list. Each row names a time window and the effect tags the renderer should
//! apply inside it. Templates are validated once at load time so the engine
//! never has to deal with loosely typed documents.

use std::path::Path;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::{AutoCutError, Result};

const DEFAULT_ROW_NAME: &str = "segment";

/// One named time window of a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateRow {
    pub name: String,
    pub start: f64,
    /// Absent when the document omits `end`; the engine then uses `start + 1.0`.
    pub end: Option<f64>,
    pub effects: Vec<String>,
}

impl TemplateRow {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end: Some(end),
            effects: Vec::new(),
        }
    }

    pub fn with_effects<I, S>(mut self, effects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.effects = effects.into_iter().map(Into::into).collect();
        self
    }
}

/// Immutable, validated template document. Only [`Template::load`] and the
/// `from_*_str` constructors read templates; serializing writes the same
/// `segments` layout they accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub name: String,
    #[serde(rename = "segments")]
    pub rows: Vec<TemplateRow>,
}

impl Template {
    pub fn new(name: impl Into<String>, rows: Vec<TemplateRow>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Loads a template from disk. `.json` files are read as JSON, everything
    /// else as YAML. The file stem names the template when the document does
    /// not.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AutoCutError::config(format!("cannot read template {}: {err}", path.display()))
        })?;
        let fallback_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string());

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let template = if is_json {
            Self::from_json_str(&raw, &fallback_name)?
        } else {
            Self::from_yaml_str(&raw, &fallback_name)?
        };

        tracing::debug!(
            path = %path.display(),
            template = %template.name,
            rows = template.rows.len(),
            "loaded template"
        );
        Ok(template)
    }

    pub fn from_yaml_str(raw: &str, fallback_name: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(raw)
            .map_err(|err| AutoCutError::config(format!("malformed template: {err}")))?;
        Self::from_value(value, fallback_name)
    }

    pub fn from_json_str(raw: &str, fallback_name: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(raw)
            .map_err(|err| AutoCutError::config(format!("malformed template: {err}")))?;
        let value = serde_yaml::to_value(json)
            .map_err(|err| AutoCutError::config(format!("malformed template: {err}")))?;
        Self::from_value(value, fallback_name)
    }

    fn from_value(value: Value, fallback_name: &str) -> Result<Self> {
        let Value::Mapping(document) = value else {
            return Err(AutoCutError::config(
                "template document must be a mapping at the top level",
            ));
        };

        let name = match field(&document, "name") {
            None | Some(Value::Null) => fallback_name.to_string(),
            Some(value) => scalar_to_string(value)
                .ok_or_else(|| AutoCutError::config("template `name` must be a scalar"))?,
        };

        let rows = match field(&document, "segments") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(rows)) => rows
                .iter()
                .enumerate()
                .map(|(index, row)| parse_row(index, row))
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(AutoCutError::config("template `segments` must be a list"));
            }
        };

        Ok(Self { name, rows })
    }
}

fn parse_row(index: usize, value: &Value) -> Result<TemplateRow> {
    let Value::Mapping(row) = value else {
        return Err(AutoCutError::config(format!(
            "template row {index} must be a mapping"
        )));
    };

    let name = match field(row, "name") {
        None | Some(Value::Null) => DEFAULT_ROW_NAME.to_string(),
        Some(value) => scalar_to_string(value).ok_or_else(|| {
            AutoCutError::config(format!("template row {index}: `name` must be a scalar"))
        })?,
    };
    let start = match field(row, "start") {
        None | Some(Value::Null) => 0.0,
        Some(value) => parse_seconds(index, "start", value)?,
    };
    let end = match field(row, "end") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_seconds(index, "end", value)?),
    };
    let effects = match field(row, "effects") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(tags)) => tags
            .iter()
            .map(|tag| {
                scalar_to_string(tag).ok_or_else(|| {
                    AutoCutError::config(format!(
                        "template row {index}: effect tags must be scalars"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(AutoCutError::config(format!(
                "template row {index}: `effects` must be a list"
            )));
        }
    };

    Ok(TemplateRow {
        name,
        start,
        end,
        effects,
    })
}

fn field<'a>(mapping: &'a Mapping, key: &str) -> Option<&'a Value> {
    mapping.get(key)
}

fn parse_seconds(index: usize, key: &str, value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|seconds| seconds.is_finite()).ok_or_else(|| {
        AutoCutError::config(format!(
            "template row {index}: `{key}` must be a number of seconds"
        ))
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
