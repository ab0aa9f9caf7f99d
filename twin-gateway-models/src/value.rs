use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, sync::Arc};

/// Declared type of a twin resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    /// Unix time in milliseconds.
    Timestamp,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Boolean => "boolean",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Timestamp => "timestamp",
        };
        f.write_str(s)
    }
}

/// Error returned when coercing a [`TwinValue`] to a declared [`DataType`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueCastError {
    #[error("numeric value is not finite")]
    NotFinite,
    #[error("numeric value out of range for {target}")]
    OutOfRange { target: DataType },
    #[error("failed to parse {target} from string: {value}")]
    ParseError { target: DataType, value: String },
    #[error("cannot convert {actual} to {target}")]
    Unconvertible { actual: DataType, target: DataType },
}

/// A strongly-typed runtime value stored in the twin.
///
/// Shared string storage (`Arc<str>`) keeps cloning cheap on the update and
/// notification hot paths.
#[derive(Clone, Debug, PartialEq)]
pub enum TwinValue {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(Arc<str>),
    /// Unix time in milliseconds.
    Timestamp(i64),
}

impl TwinValue {
    /// Return the corresponding [`DataType`] for this value.
    #[inline]
    pub fn data_type(&self) -> DataType {
        match self {
            TwinValue::Boolean(_) => DataType::Boolean,
            TwinValue::Int32(_) => DataType::Int32,
            TwinValue::Int64(_) => DataType::Int64,
            TwinValue::Float32(_) => DataType::Float32,
            TwinValue::Float64(_) => DataType::Float64,
            TwinValue::String(_) => DataType::String,
            TwinValue::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Build a string value from anything stringy.
    #[inline]
    pub fn string(s: impl AsRef<str>) -> Self {
        TwinValue::String(Arc::<str>::from(s.as_ref()))
    }

    /// Coerce this value to the declared `target` type.
    ///
    /// Used by the update pipeline's validation step: a value that cannot be
    /// coerced produces a `TypeConversionFailure` record. Strings parse into
    /// numeric/boolean targets; numerics widen or range-check; floats round
    /// when an integer target is declared.
    pub fn coerce_to(&self, target: DataType) -> Result<TwinValue, ValueCastError> {
        if self.data_type() == target {
            return Ok(self.clone());
        }
        match target {
            DataType::Boolean => self.as_bool().map(TwinValue::Boolean),
            DataType::Int32 => {
                let n = self.as_i64(target)?;
                i32::try_from(n)
                    .map(TwinValue::Int32)
                    .map_err(|_| ValueCastError::OutOfRange { target })
            }
            DataType::Int64 => self.as_i64(target).map(TwinValue::Int64),
            DataType::Float32 => {
                let f = self.as_f64(target)?;
                if f < f32::MIN as f64 || f > f32::MAX as f64 {
                    return Err(ValueCastError::OutOfRange { target });
                }
                Ok(TwinValue::Float32(f as f32))
            }
            DataType::Float64 => self.as_f64(target).map(TwinValue::Float64),
            DataType::String => Ok(TwinValue::string(self.render())),
            DataType::Timestamp => match self {
                TwinValue::String(s) => chrono::DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| TwinValue::Timestamp(dt.timestamp_millis()))
                    .map_err(|_| ValueCastError::ParseError {
                        target,
                        value: s.to_string(),
                    }),
                other => other.as_i64(target).map(TwinValue::Timestamp),
            },
        }
    }

    fn as_bool(&self) -> Result<bool, ValueCastError> {
        match self {
            TwinValue::Boolean(b) => Ok(*b),
            TwinValue::Int32(n) => Ok(*n != 0),
            TwinValue::Int64(n) => Ok(*n != 0),
            TwinValue::Timestamp(n) => Ok(*n != 0),
            TwinValue::Float32(f) => Ok(*f != 0.0),
            TwinValue::Float64(f) => Ok(*f != 0.0),
            TwinValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Ok(true),
                "false" | "0" | "off" | "no" => Ok(false),
                _ => Err(ValueCastError::ParseError {
                    target: DataType::Boolean,
                    value: s.to_string(),
                }),
            },
        }
    }

    fn as_i64(&self, target: DataType) -> Result<i64, ValueCastError> {
        match self {
            TwinValue::Boolean(b) => Ok(*b as i64),
            TwinValue::Int32(n) => Ok(*n as i64),
            TwinValue::Int64(n) => Ok(*n),
            TwinValue::Timestamp(n) => Ok(*n),
            TwinValue::Float32(f) => round_to_i64(*f as f64, target),
            TwinValue::Float64(f) => round_to_i64(*f, target),
            TwinValue::String(s) => {
                let st = s.trim();
                if let Ok(n) = st.parse::<i64>() {
                    return Ok(n);
                }
                // Fall back to float parsing with the same rounding policy.
                let f = st.parse::<f64>().map_err(|_| ValueCastError::ParseError {
                    target,
                    value: st.to_string(),
                })?;
                round_to_i64(f, target)
            }
        }
    }

    fn as_f64(&self, target: DataType) -> Result<f64, ValueCastError> {
        let f = match self {
            TwinValue::Boolean(b) => *b as i64 as f64,
            TwinValue::Int32(n) => *n as f64,
            TwinValue::Int64(n) => *n as f64,
            TwinValue::Timestamp(n) => *n as f64,
            TwinValue::Float32(f) => *f as f64,
            TwinValue::Float64(f) => *f,
            TwinValue::String(s) => {
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| ValueCastError::ParseError {
                        target,
                        value: s.to_string(),
                    })?
            }
        };
        if !f.is_finite() {
            return Err(ValueCastError::NotFinite);
        }
        Ok(f)
    }

    /// Human-readable rendering, also used for `String` coercion.
    pub fn render(&self) -> String {
        match self {
            TwinValue::Boolean(b) => b.to_string(),
            TwinValue::Int32(n) => n.to_string(),
            TwinValue::Int64(n) => n.to_string(),
            TwinValue::Float32(f) => f.to_string(),
            TwinValue::Float64(f) => f.to_string(),
            TwinValue::String(s) => s.to_string(),
            TwinValue::Timestamp(ms) => {
                match chrono::DateTime::<chrono::Utc>::from_timestamp_millis(*ms) {
                    Some(dt) => dt.to_rfc3339(),
                    None => ms.to_string(),
                }
            }
        }
    }

    /// Convert into a `serde_json::Value` for northbound consumers.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            TwinValue::Boolean(b) => serde_json::Value::Bool(*b),
            TwinValue::Int32(n) => serde_json::Value::Number((*n as i64).into()),
            TwinValue::Int64(n) => serde_json::Value::Number((*n).into()),
            TwinValue::Float32(f) => {
                serde_json::Number::from_f64(*f as f64).map_or(serde_json::Value::Null, Into::into)
            }
            TwinValue::Float64(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, Into::into)
            }
            TwinValue::String(s) => serde_json::Value::String(s.to_string()),
            TwinValue::Timestamp(ms) => serde_json::Value::Number((*ms).into()),
        }
    }
}

#[inline]
fn round_to_i64(f: f64, target: DataType) -> Result<i64, ValueCastError> {
    if !f.is_finite() {
        return Err(ValueCastError::NotFinite);
    }
    let r = f.round();
    if r < i64::MIN as f64 || r > i64::MAX as f64 {
        return Err(ValueCastError::OutOfRange { target });
    }
    Ok(r as i64)
}

impl From<bool> for TwinValue {
    fn from(v: bool) -> Self {
        TwinValue::Boolean(v)
    }
}

impl From<i32> for TwinValue {
    fn from(v: i32) -> Self {
        TwinValue::Int32(v)
    }
}

impl From<i64> for TwinValue {
    fn from(v: i64) -> Self {
        TwinValue::Int64(v)
    }
}

impl From<f64> for TwinValue {
    fn from(v: f64) -> Self {
        TwinValue::Float64(v)
    }
}

impl From<&str> for TwinValue {
    fn from(v: &str) -> Self {
        TwinValue::string(v)
    }
}

impl Serialize for TwinValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TwinValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Integer widths cannot be inferred from JSON, so numbers come back as
        // Int64/Float64; the pipeline re-coerces against the declared type.
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::Bool(b) => Ok(TwinValue::Boolean(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(TwinValue::Int64(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(TwinValue::Float64(f))
                } else {
                    Err(de::Error::custom("invalid JSON number"))
                }
            }
            serde_json::Value::String(s) => Ok(TwinValue::String(Arc::<str>::from(s))),
            serde_json::Value::Null => {
                Err(de::Error::custom("null cannot be converted to TwinValue"))
            }
            _ => Err(de::Error::custom(
                "array/object cannot be converted to TwinValue",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_parses_into_declared_integer() {
        let v = TwinValue::string("42");
        assert_eq!(v.coerce_to(DataType::Int32).unwrap(), TwinValue::Int32(42));
    }

    #[test]
    fn non_numeric_string_fails_integer_coercion() {
        let v = TwinValue::string("not-a-number");
        assert!(matches!(
            v.coerce_to(DataType::Int64),
            Err(ValueCastError::ParseError { .. })
        ));
    }

    #[test]
    fn float_rounds_into_integer() {
        let v = TwinValue::Float64(21.7);
        assert_eq!(v.coerce_to(DataType::Int64).unwrap(), TwinValue::Int64(22));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let v = TwinValue::Int64(i64::from(i32::MAX) + 1);
        assert!(matches!(
            v.coerce_to(DataType::Int32),
            Err(ValueCastError::OutOfRange { .. })
        ));
    }

    #[test]
    fn rfc3339_string_coerces_to_timestamp() {
        let v = TwinValue::string("2026-01-02T03:04:05Z");
        match v.coerce_to(DataType::Timestamp).unwrap() {
            TwinValue::Timestamp(ms) => assert!(ms > 0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nan_never_becomes_integer() {
        let v = TwinValue::Float64(f64::NAN);
        assert!(matches!(
            v.coerce_to(DataType::Int64),
            Err(ValueCastError::NotFinite)
        ));
    }
}
