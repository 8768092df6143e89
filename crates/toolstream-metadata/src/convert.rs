//! Normalization of weakly-typed store tuples.
//!
//! The metadata store returns heterogeneous value lists. This module is the
//! single place where those values are coerced into typed records: anything
//! integer-like becomes a number, anything string-like becomes a string, a
//! struct of strings becomes headers, and unknown kinds decay to zero/empty.

use std::collections::HashMap;

use prost_types::value::Kind;
use prost_types::Value;
use toolstream_proto::metastore::Tuple;

use crate::types::{ExpiredMessage, MessageRecord};

/// Coerce a store value into a u64, defaulting to 0.
pub fn as_u64(value: &Value) -> u64 {
    match &value.kind {
        Some(Kind::NumberValue(n)) if n.is_finite() && *n >= 0.0 => *n as u64,
        Some(Kind::StringValue(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Coerce a store value into an i64, defaulting to 0.
pub fn as_i64(value: &Value) -> i64 {
    match &value.kind {
        Some(Kind::NumberValue(n)) if n.is_finite() => *n as i64,
        Some(Kind::StringValue(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Coerce a store value into a string, defaulting to empty.
pub fn as_string(value: &Value) -> String {
    match &value.kind {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Coerce a store value into a header map; non-string entries are dropped.
pub fn as_headers(value: &Value) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(Kind::StructValue(s)) = &value.kind {
        for (key, field) in &s.fields {
            if let Some(Kind::StringValue(v)) = &field.kind {
                headers.insert(key.clone(), v.clone());
            }
        }
    }
    headers
}

fn field(tuple: &Tuple, index: usize) -> Option<&Value> {
    tuple.fields.get(index)
}

/// Decode a message tuple in the store layout
/// `[sequence, headers, object_name, subject, timestamp_ms]`.
pub fn message_from_tuple(tuple: &Tuple) -> MessageRecord {
    MessageRecord {
        sequence: field(tuple, 0).map(as_u64).unwrap_or(0),
        headers: field(tuple, 1).map(as_headers).unwrap_or_default(),
        object_name: field(tuple, 2).map(as_string).unwrap_or_default(),
        subject: field(tuple, 3).map(as_string).unwrap_or_default(),
        timestamp_ms: field(tuple, 4).map(as_i64).unwrap_or(0),
    }
}

/// Decode an expired-message tuple in the store layout
/// `[sequence, subject, object_name]`.
pub fn expired_from_tuple(tuple: &Tuple) -> ExpiredMessage {
    ExpiredMessage {
        sequence: field(tuple, 0).map(as_u64).unwrap_or(0),
        subject: field(tuple, 1).map(as_string).unwrap_or_default(),
        object_name: field(tuple, 2).map(as_string).unwrap_or_default(),
    }
}
