//! Wire codec.
//!
//! Converts domain records to and from a transport-safe `serde_json::Value`
//! tree. Every function here is a deliberate, field-by-field translation so
//! that renamed and optional fields are handled explicitly and each record
//! type can be round-trip tested on its own: `decode(encode(x)) == x` for
//! every valid `x`.
//!
//! Conventions:
//! - Enumerations travel as their symbolic name, never an ordinal.
//! - Timestamps travel as `{"__datetime__": true, "as_str": …}` with a
//!   fixed microsecond-precision format.
//! - Absent optional fields travel as `null`, distinct from a
//!   present-but-empty map.
//! - Distributions are self-describing tagged trees so the exact kind and
//!   bounds are recoverable without an external schema.


use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};

use crate::error::DecodeError;
use crate::storage::types::{Distribution, StudyDirection, StudySummary, Trial, TrialState};

/// Fixed textual timestamp format, microsecond precision.
const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S%.6f";
/// Marker key identifying an encoded timestamp.
const DATETIME_MARKER: &str = "__datetime__";

// --- scalars ---

/// Short rendering of a wire value's shape for error messages.
fn shape(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(map) => {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            format!("object with keys {keys:?}")
        }
    }
}

fn mismatch(expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::Mismatch {
        expected,
        got: shape(value),
    }
}

/// Decode an unsigned integer.
pub fn expect_u64(value: &Value) -> Result<u64, DecodeError> {
    value.as_u64().ok_or_else(|| mismatch("unsigned integer", value))
}

/// Decode a signed integer.
pub fn expect_i64(value: &Value) -> Result<i64, DecodeError> {
    value.as_i64().ok_or_else(|| mismatch("integer", value))
}

/// Decode a float (integers are accepted).
pub fn expect_f64(value: &Value) -> Result<f64, DecodeError> {
    value.as_f64().ok_or_else(|| mismatch("number", value))
}

/// Decode a boolean.
pub fn expect_bool(value: &Value) -> Result<bool, DecodeError> {
    value.as_bool().ok_or_else(|| mismatch("bool", value))
}

/// Decode a string.
pub fn expect_str(value: &Value) -> Result<&str, DecodeError> {
    value.as_str().ok_or_else(|| mismatch("string", value))
}

/// Decode an operation that returns nothing.
pub fn expect_unit(value: &Value) -> Result<(), DecodeError> {
    match value {
        Value::Null => Ok(()),
        other => Err(mismatch("null", other)),
    }
}

/// Decode an array.
pub fn expect_array(value: &Value) -> Result<&Vec<Value>, DecodeError> {
    value.as_array().ok_or_else(|| mismatch("array", value))
}

fn expect_object(value: &Value) -> Result<&Map<String, Value>, DecodeError> {
    value.as_object().ok_or_else(|| mismatch("object", value))
}

fn field<'a>(
    map: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a Value, DecodeError> {
    map.get(name).ok_or(DecodeError::MissingField(name))
}

/// Encode an attribute map. Values are already transport-safe JSON.
pub fn encode_attrs(attrs: &HashMap<String, Value>) -> Value {
    Value::Object(attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// Decode an attribute map.
pub fn decode_attrs(value: &Value) -> Result<HashMap<String, Value>, DecodeError> {
    let map = expect_object(value)?;
    Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

// --- timestamps ---

/// Encode an optional timestamp. `None` becomes `null`.
pub fn encode_datetime(ts: Option<NaiveDateTime>) -> Value {
    match ts {
        None => Value::Null,
        Some(ts) => json!({
            DATETIME_MARKER: true,
            "as_str": ts.format(DATETIME_FORMAT).to_string(),
        }),
    }
}

/// Decode an optional timestamp.
///
/// `null` maps back to `None`; a marker-tagged object is re-parsed with the
/// fixed format; anything else is a mismatch.
pub fn decode_datetime(value: &Value) -> Result<Option<NaiveDateTime>, DecodeError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) if map.contains_key(DATETIME_MARKER) => {
            let text = expect_str(field(map, "as_str")?)?;
            NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
                .map(Some)
                .map_err(|source| DecodeError::Timestamp {
                    text: text.to_string(),
                    source,
                })
        }
        other => Err(mismatch("tagged timestamp or null", other)),
    }
}

// --- enums ---

/// Encode a trial state as its symbolic name.
pub fn encode_state(state: TrialState) -> Value {
    Value::String(state.name().to_string())
}

/// Decode a trial state from its symbolic name.
pub fn decode_state(value: &Value) -> Result<TrialState, DecodeError> {
    let name = expect_str(value)?;
    TrialState::from_name(name).ok_or_else(|| DecodeError::UnknownState(name.to_string()))
}

/// Encode a study direction as its symbolic name.
pub fn encode_direction(direction: StudyDirection) -> Value {
    Value::String(direction.name().to_string())
}

/// Decode a study direction from its symbolic name.
pub fn decode_direction(value: &Value) -> Result<StudyDirection, DecodeError> {
    let name = expect_str(value)?;
    StudyDirection::from_name(name).ok_or_else(|| DecodeError::UnknownDirection(name.to_string()))
}

// --- distributions ---

/// Encode a distribution as a self-describing tagged tree.
pub fn encode_distribution(distribution: &Distribution) -> Value {
    match distribution {
        Distribution::Float {
            low,
            high,
            log_scale,
            step,
        } => json!({
            "name": "FloatDistribution",
            "attributes": {
                "low": low,
                "high": high,
                "log_scale": log_scale,
                "step": step,
            },
        }),
        Distribution::Int {
            low,
            high,
            log_scale,
            step,
        } => json!({
            "name": "IntDistribution",
            "attributes": {
                "low": low,
                "high": high,
                "log_scale": log_scale,
                "step": step,
            },
        }),
        Distribution::Categorical { choices } => json!({
            "name": "CategoricalDistribution",
            "attributes": { "choices": choices },
        }),
    }
}

/// Decode a distribution.
pub fn decode_distribution(value: &Value) -> Result<Distribution, DecodeError> {
    let map = expect_object(value)?;
    let name = expect_str(field(map, "name")?)?;
    let attrs = expect_object(field(map, "attributes")?)?;
    match name {
        "FloatDistribution" => Ok(Distribution::Float {
            low: expect_f64(field(attrs, "low")?)?,
            high: expect_f64(field(attrs, "high")?)?,
            log_scale: expect_bool(field(attrs, "log_scale")?)?,
            step: match field(attrs, "step")? {
                Value::Null => None,
                other => Some(expect_f64(other)?),
            },
        }),
        "IntDistribution" => Ok(Distribution::Int {
            low: expect_i64(field(attrs, "low")?)?,
            high: expect_i64(field(attrs, "high")?)?,
            log_scale: expect_bool(field(attrs, "log_scale")?)?,
            step: match field(attrs, "step")? {
                Value::Null => None,
                other => Some(expect_i64(other)?),
            },
        }),
        "CategoricalDistribution" => Ok(Distribution::Categorical {
            choices: expect_array(field(attrs, "choices")?)?.clone(),
        }),
        other => Err(DecodeError::UnknownDistribution(other.to_string())),
    }
}

// --- trials ---

/// Encode a trial record.
pub fn encode_trial(trial: &Trial) -> Value {
    let distributions: Map<String, Value> = trial
        .distributions
        .iter()
        .map(|(name, d)| (name.clone(), encode_distribution(d)))
        .collect();
    let intermediate: Map<String, Value> = trial
        .intermediate_values
        .iter()
        .map(|(step, v)| (step.to_string(), json!(v)))
        .collect();

    json!({
        "trial_id": trial.trial_id,
        "number": trial.number,
        "state": encode_state(trial.state),
        "params": trial.params,
        "distributions": distributions,
        "value": trial.value,
        "intermediate_values": intermediate,
        "user_attrs": encode_attrs(&trial.user_attrs),
        "system_attrs": encode_attrs(&trial.system_attrs),
        "datetime_start": encode_datetime(trial.datetime_start),
        "datetime_complete": encode_datetime(trial.datetime_complete),
    })
}

/// Decode a trial record.
pub fn decode_trial(value: &Value) -> Result<Trial, DecodeError> {
    let map = expect_object(value)?;

    let mut params = HashMap::new();
    for (name, v) in expect_object(field(map, "params")?)? {
        params.insert(name.clone(), expect_f64(v)?);
    }

    let mut distributions = HashMap::new();
    for (name, v) in expect_object(field(map, "distributions")?)? {
        distributions.insert(name.clone(), decode_distribution(v)?);
    }

    let mut intermediate_values = BTreeMap::new();
    for (key, v) in expect_object(field(map, "intermediate_values")?)? {
        let step = key.parse::<u64>().map_err(|_| DecodeError::Mismatch {
            expected: "integer step key",
            got: format!("key {key:?}"),
        })?;
        intermediate_values.insert(step, expect_f64(v)?);
    }

    let value_field = match field(map, "value")? {
        Value::Null => None,
        other => Some(expect_f64(other)?),
    };

    Ok(Trial {
        trial_id: expect_u64(field(map, "trial_id")?)?,
        number: expect_u64(field(map, "number")?)?,
        state: decode_state(field(map, "state")?)?,
        params,
        distributions,
        value: value_field,
        intermediate_values,
        user_attrs: decode_attrs(field(map, "user_attrs")?)?,
        system_attrs: decode_attrs(field(map, "system_attrs")?)?,
        datetime_start: decode_datetime(field(map, "datetime_start")?)?,
        datetime_complete: decode_datetime(field(map, "datetime_complete")?)?,
    })
}

// --- study summaries ---

/// Encode a study summary.
pub fn encode_summary(summary: &StudySummary) -> Value {
    json!({
        "study_id": summary.study_id,
        "study_name": summary.study_name,
        "direction": encode_direction(summary.direction),
        "best_trial": summary.best_trial.as_ref().map(encode_trial).unwrap_or(Value::Null),
        "user_attrs": encode_attrs(&summary.user_attrs),
        "system_attrs": encode_attrs(&summary.system_attrs),
        "n_trials": summary.n_trials,
        "datetime_start": encode_datetime(summary.datetime_start),
    })
}

/// Decode a study summary.
pub fn decode_summary(value: &Value) -> Result<StudySummary, DecodeError> {
    let map = expect_object(value)?;
    let best_trial = match field(map, "best_trial")? {
        Value::Null => None,
        other => Some(decode_trial(other)?),
    };
    Ok(StudySummary {
        study_id: expect_u64(field(map, "study_id")?)?,
        study_name: expect_str(field(map, "study_name")?)?.to_string(),
        direction: decode_direction(field(map, "direction")?)?,
        best_trial,
        user_attrs: decode_attrs(field(map, "user_attrs")?)?,
        system_attrs: decode_attrs(field(map, "system_attrs")?)?,
        n_trials: expect_u64(field(map, "n_trials")?)? as usize,
        datetime_start: decode_datetime(field(map, "datetime_start")?)?,
    })
}
