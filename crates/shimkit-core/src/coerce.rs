//! Value coercion
//!
//! Reshapes a value into a declared type. Rules apply in order:
//!
//! 1. already assignable: unchanged
//! 2. contract target and an object, map or shim value: wrapped in a child shim
//! 3. nullable target: null stays null, anything else converts to the inner type
//! 4. conversions: numeric widening, integral float to integer, string parsing
//!    into scalars, scalars to string, arrays element-wise into lists
//! 5. otherwise the target's default value
//!
//! Coercion never fails. A value that cannot be converted degrades to the
//! default, which is recorded at debug level.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::config::ShimConfig;
use crate::contract::Param;
use crate::resolver::MatchMode;
use crate::shim;
use crate::types::TypeDesc;
use crate::Value;

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Converts values to declared types; child shims inherit its configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct Coercer {
    config: ShimConfig,
}

impl Coercer {
    pub fn new(mode: MatchMode) -> Self {
        Self::with_config(ShimConfig::from(mode))
    }

    pub fn with_config(config: ShimConfig) -> Self {
        Coercer { config }
    }

    pub fn mode(&self) -> MatchMode {
        self.config.mode
    }

    /// Coerce `value` to `target`, degrading to the default when impossible
    pub fn coerce(&self, value: Value, target: &TypeDesc) -> Value {
        let from = value.type_name();
        match self.convert(value, target) {
            Some(converted) => converted,
            None => {
                tracing::debug!(from, to = %target, "coercion degraded to default");
                target.default_value()
            }
        }
    }

    fn convert(&self, value: Value, target: &TypeDesc) -> Option<Value> {
        if target.accepts(&value) {
            return Some(value);
        }
        match (target, value) {
            (TypeDesc::Contract(contract), value @ (Value::Object(_) | Value::Map(_) | Value::Shim(_))) => {
                shim::wrap_with(vec![value], contract, self.config)
                    .map(Value::Shim)
                    .ok()
            }
            (TypeDesc::Nullable(inner), value) => self.convert(value, inner),
            (TypeDesc::Float, Value::Integer(i)) => Some(Value::Float(i as f64)),
            (TypeDesc::Integer, Value::Float(f)) => integral(f).map(Value::Integer),
            (TypeDesc::Integer, Value::String(s)) => s.trim().parse().ok().map(Value::Integer),
            (TypeDesc::Float, Value::String(s)) => s.trim().parse().ok().map(Value::Float),
            (TypeDesc::Boolean, Value::String(s)) => parse_bool(&s).map(Value::Boolean),
            (TypeDesc::Guid, Value::String(s)) => Uuid::parse_str(s.trim()).ok().map(Value::Guid),
            (TypeDesc::DateTime, Value::String(s)) => parse_date_time(&s).map(Value::DateTime),
            (TypeDesc::String, value) => render(&value).map(Value::String),
            (TypeDesc::List(inner), Value::Array(items)) => Some(Value::Array(
                items.into_iter().map(|item| self.coerce(item, inner)).collect(),
            )),
            _ => None,
        }
    }

    /// Coerce call arguments positionally; surplus arguments pass through
    pub fn coerce_args(&self, args: Vec<Value>, params: &[Param]) -> Vec<Value> {
        args.into_iter()
            .enumerate()
            .map(|(i, arg)| match params.get(i) {
                Some(param) => self.coerce(arg, &param.ty),
                None => arg,
            })
            .collect()
    }

    /// Write path: coerce to the contract member type, unwrap shims to
    /// their backing value, then coerce to the backing slot's own type.
    pub fn prepare_write(&self, value: Value, declared: &TypeDesc, backing: &TypeDesc) -> Value {
        let value = unwrap_shim(self.coerce(value, declared));
        self.coerce(value, backing)
    }
}

/// Index of the first argument not assignable to its parameter
pub fn first_mismatch(args: &[Value], params: &[Param]) -> Option<usize> {
    params
        .iter()
        .zip(args)
        .position(|(param, arg)| !param.ty.accepts(arg))
}

/// A shim handle is replaced by its first non-null backing value
pub fn unwrap_shim(value: Value) -> Value {
    match value {
        Value::Shim(shim) => shim.primary_backing(),
        other => other,
    }
}

fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, hence the exclusive bound
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_date_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Boolean(b) => Some(b.to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Guid(g) => Some(g.to_string()),
        Value::DateTime(d) => Some(d.to_rfc3339()),
        _ => None,
    }
}
