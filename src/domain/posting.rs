//! Normalized job-posting schema and lenient casting of extracted fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Education, major, experience and qualifications for one requirement level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementLevel {
    pub education: Option<String>,
    pub major: Vec<String>,
    pub experience: Option<i64>,
    pub qualifications: Vec<String>,
}

/// A job posting structured into the normalized schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_title: Option<String>,
    pub details: Vec<String>,
    pub required: RequirementLevel,
    pub preferred: RequirementLevel,
    pub benefits: Vec<String>,
    pub salary: Vec<f64>,
    pub wage: Vec<f64>,
    pub entry_level: Option<bool>,
    pub college_degree: Option<bool>,
    pub full_time: Option<bool>,
    pub remote: Option<bool>,
    pub skills: Vec<String>,
    pub occupation: Vec<String>,
}

impl JobPosting {
    /// Builds a posting from an untrusted extraction record.
    ///
    /// Fields that do not cast are left empty; list items that do not cast are dropped.
    pub fn from_extraction(record: &Value) -> Self {
        let empty = Map::new();
        let fields = record.as_object().unwrap_or(&empty);
        Self {
            job_title: field(fields, "job_title", cast_text),
            details: list(fields, "details", cast_text),
            required: RequirementLevel::from_extraction(fields.get("required")),
            preferred: RequirementLevel::from_extraction(fields.get("preferred")),
            benefits: list(fields, "benefits", cast_text),
            salary: list(fields, "salary", cast_float),
            wage: list(fields, "wage", cast_float),
            entry_level: field(fields, "entry_level", cast_bool),
            college_degree: field(fields, "college_degree", cast_bool),
            full_time: field(fields, "full_time", cast_bool),
            remote: field(fields, "remote", cast_bool),
            skills: Vec::new(),
            occupation: Vec::new(),
        }
    }

    /// Text used as input for the skills and occupation prompts.
    pub fn summary_text(&self) -> String {
        [
            self.job_title.clone().unwrap_or_default(),
            self.details.join("\n"),
            self.required.qualifications.join("\n"),
            self.preferred.qualifications.join("\n"),
        ]
        .join("\n\n")
    }
}

impl RequirementLevel {
    fn from_extraction(value: Option<&Value>) -> Self {
        let empty = Map::new();
        let fields = value.and_then(Value::as_object).unwrap_or(&empty);
        Self {
            education: field(fields, "education", cast_text),
            major: list(fields, "major", cast_text),
            experience: field(fields, "experience", cast_int),
            qualifications: list(fields, "qualifications", cast_text),
        }
    }
}

fn field<T>(fields: &Map<String, Value>, key: &str, cast: fn(&Value) -> Option<T>) -> Option<T> {
    let value = fields.get(key)?;
    let cast_value = cast(value);
    if cast_value.is_none() && !value.is_null() {
        debug!("value '{}' for '{}' did not cast", value, key);
    }
    cast_value
}

fn list<T>(fields: &Map<String, Value>, key: &str, cast: fn(&Value) -> Option<T>) -> Vec<T> {
    cast_list(fields.get(key), cast)
}

/// Casts every item of a JSON list, keeping the ones that succeed.
///
/// A scalar is treated as a one-item list.
pub fn cast_list<T>(value: Option<&Value>, cast: fn(&Value) -> Option<T>) -> Vec<T> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let cast_item = cast(item);
                if cast_item.is_none() {
                    debug!("list item '{}' did not cast", item);
                }
                cast_item
            })
            .collect(),
        Some(scalar) => cast(scalar).into_iter().collect(),
    }
}

pub fn cast_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn cast_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn cast_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").trim_start_matches('$').parse().ok(),
        _ => None,
    }
}

pub fn cast_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
