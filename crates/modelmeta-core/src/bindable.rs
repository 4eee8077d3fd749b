//! Addressable field handles.
//!
//! [`Bindable`] is the object-safe view of one field inside a live record:
//! it can report whether it holds its type's zero value, read itself out as a
//! [`Value`], and accept a new value through the generic conversion rules or
//! a custom [`Decode`] hook.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};

use crate::error::{ConvertError, DecodeError};
use crate::shape::{Record, Shaped, TypeShape};
use crate::value::{Value, format_uuid};

/// Custom decode hook, the per-type override of the generic conversion.
///
/// Types implementing it are registered with [`decodable!`](crate::decodable)
/// so the resolver classifies them as storable and the binder delegates to
/// them.
pub trait Decode {
    /// Replace `self` with the decoded form of `raw`.
    fn decode(&mut self, raw: Value) -> Result<(), DecodeError>;

    /// Encode `self` for storage.
    fn encode(&self) -> Value;
}

/// One addressable field of a live record.
pub trait Bindable {
    /// Declared Rust type name, for error messages.
    fn type_name(&self) -> &'static str;

    /// True when the field holds its type's zero/empty value.
    fn is_blank(&self) -> bool;

    /// Current value.
    fn to_value(&self) -> Value;

    /// Generic conversion from `value` into this field's type.
    ///
    /// On failure `self` is left unchanged.
    fn assign(&mut self, value: Value) -> Result<(), ConvertError>;

    /// The custom decode hook, if this type has one.
    fn decoder(&mut self) -> Option<&mut dyn Decode> {
        None
    }

    /// This field as a nested record, if it is one.
    fn as_record(&self) -> Option<&dyn Record> {
        None
    }

    /// This field as a mutable nested record, if it is one.
    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        None
    }
}

/// Register types that implement [`Decode`] as storable field types.
///
/// Each type must also implement `Default` and `PartialEq`; a field is blank
/// when it equals `Default::default()`.
///
/// ```
/// use modelmeta_core::{Decode, DecodeError, Value, decodable};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Cents(i64);
///
/// impl Decode for Cents {
///     fn decode(&mut self, raw: Value) -> Result<(), DecodeError> {
///         match raw {
///             Value::Text(s) => {
///                 let dollars: f64 = s.trim_start_matches('$').parse()?;
///                 self.0 = (dollars * 100.0).round() as i64;
///                 Ok(())
///             }
///             other => Err(format!("unsupported value: {}", other.kind_name()).into()),
///         }
///     }
///
///     fn encode(&self) -> Value {
///         Value::BigInt(self.0)
///     }
/// }
///
/// decodable!(Cents);
/// ```
#[macro_export]
macro_rules! decodable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Shaped for $ty {
                fn type_shape() -> $crate::TypeShape {
                    $crate::TypeShape::Decoder
                }
            }

            impl $crate::Bindable for $ty {
                fn type_name(&self) -> &'static str {
                    ::core::stringify!($ty)
                }

                fn is_blank(&self) -> bool {
                    *self == <$ty as ::core::default::Default>::default()
                }

                fn to_value(&self) -> $crate::Value {
                    $crate::Decode::encode(self)
                }

                fn assign(
                    &mut self,
                    value: $crate::Value,
                ) -> ::core::result::Result<(), $crate::ConvertError> {
                    ::core::result::Result::Err($crate::ConvertError::new(
                        value.kind_name(),
                        ::core::stringify!($ty),
                    ))
                }

                fn decoder(&mut self) -> ::core::option::Option<&mut dyn $crate::Decode> {
                    ::core::option::Option::Some(self)
                }
            }
        )+
    };
}

fn parse_text<T: std::str::FromStr>(value: &Value) -> Option<T> {
    value.as_str().and_then(|s| s.trim().parse().ok())
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_integer(value: f64) -> Option<i128> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i128)
}

macro_rules! bind_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Shaped for $ty {
                fn type_shape() -> TypeShape {
                    TypeShape::Scalar
                }
            }

            impl Bindable for $ty {
                fn type_name(&self) -> &'static str {
                    stringify!($ty)
                }

                fn is_blank(&self) -> bool {
                    *self == 0
                }

                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
                    let converted = match &value {
                        Value::Float(_) | Value::Double(_) => {
                            value.as_float().and_then(float_to_integer)
                        }
                        Value::Text(_) | Value::Decimal(_) => parse_text::<i128>(&value),
                        other => other.as_integer(),
                    };
                    match converted.and_then(|v| <$ty>::try_from(v).ok()) {
                        Some(v) => {
                            *self = v;
                            Ok(())
                        }
                        None => Err(ConvertError::new(value.kind_name(), stringify!($ty))),
                    }
                }
            }
        )*
    };
}

bind_integer!(i8, i16, i32, i64, u8, u16, u32, u64);

macro_rules! bind_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Shaped for $ty {
                fn type_shape() -> TypeShape {
                    TypeShape::Scalar
                }
            }

            impl Bindable for $ty {
                fn type_name(&self) -> &'static str {
                    stringify!($ty)
                }

                fn is_blank(&self) -> bool {
                    *self == 0.0
                }

                fn to_value(&self) -> Value {
                    Value::from(*self)
                }

                #[allow(clippy::cast_possible_truncation)]
                fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
                    let converted = match &value {
                        Value::Text(_) | Value::Decimal(_) => parse_text::<f64>(&value),
                        other => other.as_float(),
                    };
                    match converted {
                        Some(v) => {
                            *self = v as $ty;
                            Ok(())
                        }
                        None => Err(ConvertError::new(value.kind_name(), stringify!($ty))),
                    }
                }
            }
        )*
    };
}

bind_float!(f32, f64);

impl Shaped for bool {
    fn type_shape() -> TypeShape {
        TypeShape::Scalar
    }
}

impl Bindable for bool {
    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn is_blank(&self) -> bool {
        !*self
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
        let converted = match &value {
            Value::Bool(b) => Some(*b),
            Value::Json(serde_json::Value::Bool(b)) => Some(*b),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" => Some(true),
                "false" | "f" | "0" | "no" => Some(false),
                _ => None,
            },
            other => match other.as_integer() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
        };
        match converted {
            Some(b) => {
                *self = b;
                Ok(())
            }
            None => Err(ConvertError::new(value.kind_name(), "bool")),
        }
    }
}

impl Shaped for String {
    fn type_shape() -> TypeShape {
        TypeShape::Scalar
    }
}

impl Bindable for String {
    fn type_name(&self) -> &'static str {
        "String"
    }

    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
        *self = match value {
            Value::Text(s) | Value::Decimal(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::TinyInt(v) => v.to_string(),
            Value::SmallInt(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Uuid(bytes) => format_uuid(&bytes),
            Value::Json(serde_json::Value::String(s)) => s,
            Value::Json(json) => json.to_string(),
            Value::Bytes(bytes) => {
                String::from_utf8(bytes).map_err(|_| ConvertError::new("bytes", "String"))?
            }
            other => return Err(ConvertError::new(other.kind_name(), "String")),
        };
        Ok(())
    }
}

impl Shaped for serde_json::Value {
    fn type_shape() -> TypeShape {
        TypeShape::Scalar
    }
}

impl Bindable for serde_json::Value {
    fn type_name(&self) -> &'static str {
        "serde_json::Value"
    }

    fn is_blank(&self) -> bool {
        self.is_null()
    }

    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }

    fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
        *self = match value {
            Value::Json(json) => json,
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Decimal(s) => serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s)),
            other => match (other.as_integer(), other.as_float()) {
                (Some(i), _) => match i64::try_from(i) {
                    Ok(i) => serde_json::Value::from(i),
                    Err(_) => return Err(ConvertError::new(other.kind_name(), "json")),
                },
                (None, Some(f)) => serde_json::Value::from(f),
                _ => return Err(ConvertError::new(other.kind_name(), "json")),
            },
        };
        Ok(())
    }
}

// ============================================================================
// Temporal types
// ============================================================================

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()))
}

macro_rules! temporal_field {
    ($ty:ty, $name:literal, |$value:ident| $convert:expr, |$this:ident| $encode:expr) => {
        impl Shaped for $ty {
            fn type_shape() -> TypeShape {
                TypeShape::Temporal
            }
        }

        impl Bindable for $ty {
            fn type_name(&self) -> &'static str {
                $name
            }

            fn is_blank(&self) -> bool {
                *self == <$ty>::default()
            }

            fn to_value(&self) -> Value {
                let $this = self;
                $encode
            }

            fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
                let converted: Option<$ty> = {
                    let $value = &value;
                    $convert
                };
                match converted {
                    Some(v) => {
                        *self = v;
                        Ok(())
                    }
                    None => Err(ConvertError::new(value.kind_name(), $name)),
                }
            }
        }
    };
}

temporal_field!(
    NaiveDateTime,
    "NaiveDateTime",
    |value| match value {
        Value::Timestamp(us) | Value::TimestampTz(us) => {
            DateTime::from_timestamp_micros(*us).map(|d| d.naive_utc())
        }
        Value::Text(s) => parse_naive_datetime(s),
        _ => None,
    },
    |this| Value::Timestamp(this.and_utc().timestamp_micros())
);

temporal_field!(
    DateTime<Utc>,
    "DateTime<Utc>",
    |value| match value {
        Value::Timestamp(us) | Value::TimestampTz(us) => DateTime::from_timestamp_micros(*us),
        Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| parse_naive_datetime(s).map(|d| d.and_utc())),
        _ => None,
    },
    |this| Value::TimestampTz(this.timestamp_micros())
);

temporal_field!(
    NaiveDate,
    "NaiveDate",
    |value| match value {
        Value::Date(days) => days
            .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt),
        Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    },
    |this| Value::Date(this.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
);

temporal_field!(
    NaiveTime,
    "NaiveTime",
    |value| match value {
        Value::Time(us) => {
            let secs = us.div_euclid(1_000_000);
            let nanos = us.rem_euclid(1_000_000) * 1_000;
            u32::try_from(secs).ok().and_then(|secs| {
                NaiveTime::from_num_seconds_from_midnight_opt(secs, u32::try_from(nanos).ok()?)
            })
        }
        Value::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").ok(),
        _ => None,
    },
    |this| Value::Time(
        i64::from(this.num_seconds_from_midnight()) * 1_000_000
            + i64::from(this.nanosecond() / 1_000)
    )
);

// ============================================================================
// Indirection and collections
// ============================================================================

impl<T: Shaped> Shaped for Option<T> {
    fn type_shape() -> TypeShape {
        T::type_shape()
    }
}

impl<T: Shaped + ?Sized> Shaped for Box<T> {
    fn type_shape() -> TypeShape {
        T::type_shape()
    }
}

impl<T: Shaped> Shaped for Vec<T> {
    fn type_shape() -> TypeShape {
        match T::type_shape() {
            TypeShape::Record(model) => TypeShape::Sequence(model),
            _ => TypeShape::Scalar,
        }
    }
}

impl<T: Bindable + Shaped + Default> Decode for Option<T> {
    fn decode(&mut self, raw: Value) -> Result<(), DecodeError> {
        if raw.is_null() {
            *self = None;
            return Ok(());
        }
        let inner = self.get_or_insert_with(T::default);
        match inner.decoder() {
            Some(hook) => hook.decode(raw),
            None => inner.assign(raw).map_err(Into::into),
        }
    }

    fn encode(&self) -> Value {
        self.as_ref().map_or(Value::Null, Bindable::to_value)
    }
}

impl<T: Bindable + Shaped + Default> Bindable for Option<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn is_blank(&self) -> bool {
        self.is_none()
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, Bindable::to_value)
    }

    fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        if let Some(inner) = self.as_mut() {
            return inner.assign(value);
        }
        let mut inner = T::default();
        inner.assign(value)?;
        *self = Some(inner);
        Ok(())
    }

    fn decoder(&mut self) -> Option<&mut dyn Decode> {
        if T::type_shape() == TypeShape::Decoder {
            Some(self)
        } else {
            None
        }
    }

    fn as_record(&self) -> Option<&dyn Record> {
        self.as_ref().and_then(|inner| inner.as_record())
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        self.as_mut().and_then(|inner| inner.as_record_mut())
    }
}

impl<T: Bindable> Bindable for Box<T> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn is_blank(&self) -> bool {
        (**self).is_blank()
    }

    fn to_value(&self) -> Value {
        (**self).to_value()
    }

    fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
        (**self).assign(value)
    }

    fn decoder(&mut self) -> Option<&mut dyn Decode> {
        (**self).decoder()
    }

    fn as_record(&self) -> Option<&dyn Record> {
        (**self).as_record()
    }

    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        (**self).as_record_mut()
    }
}

impl<T: Bindable + Default> Bindable for Vec<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(Bindable::to_value).collect())
    }

    fn assign(&mut self, value: Value) -> Result<(), ConvertError> {
        let items: Vec<Value> = match value {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            Value::Bytes(bytes) => bytes.into_iter().map(Value::from).collect(),
            Value::Text(s) => s.into_bytes().into_iter().map(Value::from).collect(),
            other => {
                return Err(ConvertError::new(
                    other.kind_name(),
                    std::any::type_name::<Self>(),
                ));
            }
        };
        let mut converted = Vec::with_capacity(items.len());
        for item in items {
            let mut element = T::default();
            element.assign(item)?;
            converted.push(element);
        }
        *self = converted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversions() {
        let mut n = 0_i64;
        n.assign(Value::Text("42".into())).unwrap();
        assert_eq!(n, 42);
        n.assign(Value::Int(-7)).unwrap();
        assert_eq!(n, -7);
        n.assign(Value::Double(3.0)).unwrap();
        assert_eq!(n, 3);

        assert!(n.assign(Value::Double(3.5)).is_err());
        assert!(n.assign(Value::Bool(true)).is_err());
        assert!(n.assign(Value::Null).is_err());
        assert_eq!(n, 3, "failed assignment leaves the value untouched");
    }

    #[test]
    fn test_integer_range_checked() {
        let mut small = 0_u8;
        assert!(small.assign(Value::BigInt(300)).is_err());
        assert!(small.assign(Value::BigInt(-1)).is_err());
        small.assign(Value::SmallInt(255)).unwrap();
        assert_eq!(small, 255);
    }

    #[test]
    fn test_float_and_bool_conversions() {
        let mut f = 0.0_f64;
        f.assign(Value::Text("2.5".into())).unwrap();
        assert!((f - 2.5).abs() < f64::EPSILON);
        f.assign(Value::BigInt(4)).unwrap();
        assert!((f - 4.0).abs() < f64::EPSILON);

        let mut b = false;
        b.assign(Value::Text("true".into())).unwrap();
        assert!(b);
        b.assign(Value::Int(0)).unwrap();
        assert!(!b);
        assert!(b.assign(Value::Int(2)).is_err());
    }

    #[test]
    fn test_string_conversions() {
        let mut s = String::new();
        s.assign(Value::BigInt(42)).unwrap();
        assert_eq!(s, "42");
        s.assign(Value::Bytes(b"hi".to_vec())).unwrap();
        assert_eq!(s, "hi");
        assert!(s.assign(Value::Bytes(vec![0xff, 0xfe])).is_err());
        assert!(s.assign(Value::Null).is_err());
        assert_eq!(s, "hi");
    }

    #[test]
    fn test_blank_detection() {
        assert!(0_i32.is_blank());
        assert!(!5_i32.is_blank());
        assert!(String::new().is_blank());
        assert!(None::<i64>.is_blank());
        assert!(!Some(0_i64).is_blank());
        assert!(Vec::<u8>::new().is_blank());
        assert!(NaiveDate::default().is_blank());
    }

    #[test]
    fn test_option_assign() {
        let mut opt: Option<i32> = None;
        opt.assign(Value::Text("9".into())).unwrap();
        assert_eq!(opt, Some(9));
        opt.assign(Value::Null).unwrap();
        assert_eq!(opt, None);
        assert!(opt.assign(Value::Bool(true)).is_err());
        assert_eq!(opt, None);
    }

    #[test]
    fn test_bytes_into_vec() {
        let mut bytes: Vec<u8> = Vec::new();
        bytes.assign(Value::Bytes(vec![1, 2, 3])).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        bytes.assign(Value::Text("ab".into())).unwrap();
        assert_eq!(bytes, b"ab".to_vec());
    }

    #[test]
    fn test_temporal_conversions() {
        let mut ts = NaiveDateTime::default();
        ts.assign(Value::Text("2024-03-01 12:30:00".into())).unwrap();
        assert_eq!(ts.to_string(), "2024-03-01 12:30:00");
        let encoded = ts.to_value();
        let mut back = NaiveDateTime::default();
        back.assign(encoded).unwrap();
        assert_eq!(back, ts);

        let mut date = NaiveDate::default();
        date.assign(Value::Date(1)).unwrap();
        assert_eq!(date.to_string(), "1970-01-02");

        let mut utc = DateTime::<Utc>::default();
        utc.assign(Value::Text("2024-03-01T12:30:00+02:00".into()))
            .unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-03-01T10:30:00+00:00");
        assert!(utc.assign(Value::Bool(true)).is_err());
    }

    #[test]
    fn test_json_field() {
        let mut json = serde_json::Value::Null;
        assert!(json.is_blank());
        json.assign(Value::Text(r#"{"a":1}"#.into())).unwrap();
        assert_eq!(json["a"], 1);
        json.assign(Value::BigInt(5)).unwrap();
        assert_eq!(json, serde_json::json!(5));
    }

    #[test]
    fn test_shapes() {
        assert_eq!(<i64 as Shaped>::type_shape(), TypeShape::Scalar);
        assert_eq!(<Option<String> as Shaped>::type_shape(), TypeShape::Scalar);
        assert_eq!(<Vec<u8> as Shaped>::type_shape(), TypeShape::Scalar);
        assert_eq!(<NaiveDateTime as Shaped>::type_shape(), TypeShape::Temporal);
        assert_eq!(
            <Option<Box<DateTime<Utc>>> as Shaped>::type_shape(),
            TypeShape::Temporal
        );
    }
}
