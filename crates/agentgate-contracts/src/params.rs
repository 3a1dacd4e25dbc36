//! Typed policy parameter values.
//!
//! Policy configuration arrives from the registry as `RawParam`s: a name, a
//! one-byte type tag and opaque bytes. They are decoded exactly once, during
//! permission resolution, into the closed `ParamValue` type. Nothing
//! downstream ever looks at the raw bytes again.
//!
//! Wire format of `RawParam::value`: UTF-8 JSON text.
//!
//! | tag | name        | JSON accepted                                  |
//! |-----|-------------|------------------------------------------------|
//! | 0   | `int`       | number or decimal string, fits `i128`          |
//! | 1   | `int[]`     | array of the above                             |
//! | 2   | `uint`      | number or decimal string, fits `u128`          |
//! | 3   | `uint[]`    | array of the above                             |
//! | 4   | `bool`      | `true` / `false`                               |
//! | 5   | `bool[]`    | array of booleans                              |
//! | 6   | `address`   | `"0x"` + 40 hex digits                         |
//! | 7   | `address[]` | array of addresses                             |
//! | 8   | `string`    | string                                         |
//! | 9   | `string[]`  | array of strings                               |
//! | 10  | `bytes`     | `"0x"`-prefixed hex string                     |
//! | 11  | `bytes[]`   | array of hex strings                           |

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identity::Address;

/// Declared type of a policy parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamType {
    Int,
    IntArray,
    Uint,
    UintArray,
    Bool,
    BoolArray,
    Address,
    AddressArray,
    String,
    StringArray,
    Bytes,
    BytesArray,
}

impl ParamType {
    const ALL: [ParamType; 12] = [
        ParamType::Int,
        ParamType::IntArray,
        ParamType::Uint,
        ParamType::UintArray,
        ParamType::Bool,
        ParamType::BoolArray,
        ParamType::Address,
        ParamType::AddressArray,
        ParamType::String,
        ParamType::StringArray,
        ParamType::Bytes,
        ParamType::BytesArray,
    ];

    /// The stable on-chain tag for this type.
    pub fn tag(self) -> u8 {
        match self {
            ParamType::Int => 0,
            ParamType::IntArray => 1,
            ParamType::Uint => 2,
            ParamType::UintArray => 3,
            ParamType::Bool => 4,
            ParamType::BoolArray => 5,
            ParamType::Address => 6,
            ParamType::AddressArray => 7,
            ParamType::String => 8,
            ParamType::StringArray => 9,
            ParamType::Bytes => 10,
            ParamType::BytesArray => 11,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Human-readable name, as used in registry fixtures.
    pub fn name(self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::IntArray => "int[]",
            ParamType::Uint => "uint",
            ParamType::UintArray => "uint[]",
            ParamType::Bool => "bool",
            ParamType::BoolArray => "bool[]",
            ParamType::Address => "address",
            ParamType::AddressArray => "address[]",
            ParamType::String => "string",
            ParamType::StringArray => "string[]",
            ParamType::Bytes => "bytes",
            ParamType::BytesArray => "bytes[]",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A policy parameter exactly as stored on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParam {
    pub name: String,
    pub type_tag: u8,
    pub value: Vec<u8>,
}

impl RawParam {
    /// Encode a JSON value under the given type. Used by fixtures and tests
    /// that need to stand in for registry state.
    pub fn encode(name: impl Into<String>, param_type: ParamType, value: &Value) -> Self {
        Self {
            name: name.into(),
            type_tag: param_type.tag(),
            value: value.to_string().into_bytes(),
        }
    }
}

/// Failure to decode a `RawParam` into a `ParamValue`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamDecodeError {
    #[error("parameter '{name}' has unknown type tag {tag}")]
    UnknownTypeTag { name: String, tag: u8 },

    #[error("parameter '{name}' is not a valid {expected}: {reason}")]
    Malformed {
        name: String,
        expected: ParamType,
        reason: String,
    },
}

/// A decoded policy parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Int(i128),
    IntArray(Vec<i128>),
    Uint(u128),
    UintArray(Vec<u128>),
    Bool(bool),
    BoolArray(Vec<bool>),
    Address(Address),
    AddressArray(Vec<Address>),
    String(String),
    StringArray(Vec<String>),
    Bytes(Vec<u8>),
    BytesArray(Vec<Vec<u8>>),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::IntArray(_) => ParamType::IntArray,
            ParamValue::Uint(_) => ParamType::Uint,
            ParamValue::UintArray(_) => ParamType::UintArray,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::BoolArray(_) => ParamType::BoolArray,
            ParamValue::Address(_) => ParamType::Address,
            ParamValue::AddressArray(_) => ParamType::AddressArray,
            ParamValue::String(_) => ParamType::String,
            ParamValue::StringArray(_) => ParamType::StringArray,
            ParamValue::Bytes(_) => ParamType::Bytes,
            ParamValue::BytesArray(_) => ParamType::BytesArray,
        }
    }

    /// Decode a raw on-chain parameter.
    pub fn decode(raw: &RawParam) -> Result<Self, ParamDecodeError> {
        let param_type =
            ParamType::from_tag(raw.type_tag).ok_or_else(|| ParamDecodeError::UnknownTypeTag {
                name: raw.name.clone(),
                tag: raw.type_tag,
            })?;

        let malformed = |reason: String| ParamDecodeError::Malformed {
            name: raw.name.clone(),
            expected: param_type,
            reason,
        };

        let json: Value =
            serde_json::from_slice(&raw.value).map_err(|e| malformed(e.to_string()))?;

        let decoded = match param_type {
            ParamType::Int => ParamValue::Int(int_from_json(&json).map_err(malformed)?),
            ParamType::IntArray => {
                ParamValue::IntArray(array_of(&json, int_from_json).map_err(malformed)?)
            }
            ParamType::Uint => ParamValue::Uint(uint_from_json(&json).map_err(malformed)?),
            ParamType::UintArray => {
                ParamValue::UintArray(array_of(&json, uint_from_json).map_err(malformed)?)
            }
            ParamType::Bool => ParamValue::Bool(bool_from_json(&json).map_err(malformed)?),
            ParamType::BoolArray => {
                ParamValue::BoolArray(array_of(&json, bool_from_json).map_err(malformed)?)
            }
            ParamType::Address => {
                ParamValue::Address(address_from_json(&json).map_err(malformed)?)
            }
            ParamType::AddressArray => {
                ParamValue::AddressArray(array_of(&json, address_from_json).map_err(malformed)?)
            }
            ParamType::String => ParamValue::String(string_from_json(&json).map_err(malformed)?),
            ParamType::StringArray => {
                ParamValue::StringArray(array_of(&json, string_from_json).map_err(malformed)?)
            }
            ParamType::Bytes => ParamValue::Bytes(bytes_from_json(&json).map_err(malformed)?),
            ParamType::BytesArray => {
                ParamValue::BytesArray(array_of(&json, bytes_from_json).map_err(malformed)?)
            }
        };

        Ok(decoded)
    }

    /// Render as JSON for the sandbox context object.
    ///
    /// Integers become decimal strings and bytes become `0x` hex so that no
    /// value loses precision crossing the sandbox boundary.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Int(v) => Value::String(v.to_string()),
            ParamValue::IntArray(vs) => vs.iter().map(|v| Value::String(v.to_string())).collect(),
            ParamValue::Uint(v) => Value::String(v.to_string()),
            ParamValue::UintArray(vs) => vs.iter().map(|v| Value::String(v.to_string())).collect(),
            ParamValue::Bool(v) => Value::Bool(*v),
            ParamValue::BoolArray(vs) => vs.iter().map(|v| Value::Bool(*v)).collect(),
            ParamValue::Address(a) => Value::String(a.0.clone()),
            ParamValue::AddressArray(vs) => vs.iter().map(|a| Value::String(a.0.clone())).collect(),
            ParamValue::String(s) => Value::String(s.clone()),
            ParamValue::StringArray(vs) => vs.iter().map(|s| Value::String(s.clone())).collect(),
            ParamValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
            ParamValue::BytesArray(vs) => vs
                .iter()
                .map(|b| Value::String(format!("0x{}", hex::encode(b))))
                .collect(),
        }
    }
}

/// Decoded policy configuration, keyed by parameter name.
pub type UserParams = BTreeMap<String, ParamValue>;

/// Render decoded user params as a JSON object.
pub fn user_params_to_json(params: &UserParams) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

// ── Element decoders ──────────────────────────────────────────────────────────

fn array_of<T>(
    json: &Value,
    element: fn(&Value) -> Result<T, String>,
) -> Result<Vec<T>, String> {
    let items = json
        .as_array()
        .ok_or_else(|| format!("expected an array, found {json}"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| element(item).map_err(|e| format!("element {i}: {e}")))
        .collect()
}

fn int_from_json(json: &Value) -> Result<i128, String> {
    match json {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .ok_or_else(|| format!("{n} is not an integer")),
        Value::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|e| format!("'{s}': {e}")),
        other => Err(format!("expected an integer, found {other}")),
    }
}

fn uint_from_json(json: &Value) -> Result<u128, String> {
    match json {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("{n} is not an unsigned integer")),
        Value::String(s) => s
            .trim()
            .parse::<u128>()
            .map_err(|e| format!("'{s}': {e}")),
        other => Err(format!("expected an unsigned integer, found {other}")),
    }
}

fn bool_from_json(json: &Value) -> Result<bool, String> {
    json.as_bool()
        .ok_or_else(|| format!("expected a boolean, found {json}"))
}

fn string_from_json(json: &Value) -> Result<String, String> {
    json.as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected a string, found {json}"))
}

fn address_from_json(json: &Value) -> Result<Address, String> {
    let s = string_from_json(json)?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("'{s}' is missing the 0x prefix"))?;
    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'{s}' is not 20 bytes of hex"));
    }
    Ok(Address(format!("0x{}", digits.to_ascii_lowercase())))
}

fn bytes_from_json(json: &Value) -> Result<Vec<u8>, String> {
    let s = string_from_json(json)?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("'{s}' is missing the 0x prefix"))?;
    hex::decode(digits).map_err(|e| format!("'{s}': {e}"))
}
