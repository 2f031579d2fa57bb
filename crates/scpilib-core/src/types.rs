//! Wire value kinds and their native values.
//!
//! [`DataType`] is the closed set of kinds a field or argument can declare;
//! [`Value`] is the native value of one field. Each `DataType` owns the rule
//! that turns its tokens into a `Value` and back, delegating the per-token
//! work to [`conversions`](crate::conversions).

use std::fmt;

use crate::conversions::{self, split_tokens};
use crate::enums::{EnumTable, EnumTokens};
use crate::error::{Error, Result};

/// A number, or the instrument's `ON`/`OFF` token in its place.
///
/// Some numeric settings answer `OFF` when the quantity does not apply.
/// The two cases stay distinct: `Bool(false)` is never read as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatOrBool {
    /// A real number.
    Float(f64),
    /// The boolean sentinel.
    Bool(bool),
}

impl FloatOrBool {
    /// The number, if this is not the sentinel.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FloatOrBool::Float(f) => Some(*f),
            FloatOrBool::Bool(_) => None,
        }
    }

    /// The sentinel, if this is not a number.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FloatOrBool::Bool(b) => Some(*b),
            FloatOrBool::Float(_) => None,
        }
    }
}

impl From<f64> for FloatOrBool {
    fn from(value: f64) -> Self {
        FloatOrBool::Float(value)
    }
}

impl From<bool> for FloatOrBool {
    fn from(value: bool) -> Self {
        FloatOrBool::Bool(value)
    }
}

impl fmt::Display for FloatOrBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&conversions::float_or_bool_to_string(*self))
    }
}

/// The kind of value carried by one argument or struct field.
#[derive(Debug, Clone, Copy)]
pub enum DataType {
    /// `ON` / `OFF`.
    Boolean,
    /// Signed integer.
    Integer,
    /// IEEE-754 double.
    Float,
    /// Number or `ON`/`OFF` sentinel.
    FloatOrBool,
    /// Bare text, sent and received as-is.
    RawString,
    /// SCPI string: single-quoted on the wire, quotes stripped on decode.
    QuotedString,
    /// One token from an enum table.
    Enum(&'static dyn EnumTokens),
    /// List of booleans.
    BooleanList,
    /// List of integers.
    IntegerList,
    /// List of floats.
    FloatList,
    /// List of float-or-bool values.
    FloatOrBoolList,
    /// List of bare strings.
    StringList,
    /// List of quoted strings.
    QuotedStringList,
    /// List of enum tokens.
    EnumList(&'static dyn EnumTokens),
}

impl DataType {
    /// Whether values of this kind are lists.
    pub const fn is_list(&self) -> bool {
        matches!(
            self,
            DataType::BooleanList
                | DataType::IntegerList
                | DataType::FloatList
                | DataType::FloatOrBoolList
                | DataType::StringList
                | DataType::QuotedStringList
                | DataType::EnumList(_)
        )
    }

    /// The scalar kind of one list element (identity for scalars).
    pub fn element_type(&self) -> DataType {
        match *self {
            DataType::BooleanList => DataType::Boolean,
            DataType::IntegerList => DataType::Integer,
            DataType::FloatList => DataType::Float,
            DataType::FloatOrBoolList => DataType::FloatOrBool,
            DataType::StringList => DataType::RawString,
            DataType::QuotedStringList => DataType::QuotedString,
            DataType::EnumList(table) => DataType::Enum(table),
            scalar => scalar,
        }
    }

    /// Short name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "Boolean",
            DataType::Integer => "Integer",
            DataType::Float => "Float",
            DataType::FloatOrBool => "FloatOrBool",
            DataType::RawString => "RawString",
            DataType::QuotedString => "QuotedString",
            DataType::Enum(_) => "Enum",
            DataType::BooleanList => "BooleanList",
            DataType::IntegerList => "IntegerList",
            DataType::FloatList => "FloatList",
            DataType::FloatOrBoolList => "FloatOrBoolList",
            DataType::StringList => "StringList",
            DataType::QuotedStringList => "QuotedStringList",
            DataType::EnumList(_) => "EnumList",
        }
    }

    /// Decode one token as this kind's scalar element.
    fn decode_scalar(&self, token: &str) -> Result<Value> {
        match self.element_type() {
            DataType::Boolean => conversions::string_to_bool(token).map(Value::Bool),
            DataType::Integer => conversions::string_to_int(token).map(Value::Int),
            DataType::Float => conversions::string_to_float(token).map(Value::Float),
            DataType::FloatOrBool => {
                conversions::string_to_float_or_bool(token).map(Value::FloatOrBool)
            }
            DataType::RawString => Ok(Value::Str(token.trim().to_string())),
            DataType::QuotedString => Ok(Value::Str(conversions::strip_quotes(token.trim()))),
            DataType::Enum(table) => {
                let t = token.trim();
                if table.contains(t) {
                    Ok(Value::Enum(t.to_string()))
                } else {
                    Err(Error::UnknownEnumValue {
                        enum_name: table.name(),
                        token: t.to_string(),
                    })
                }
            }
            list => unreachable!("element_type() returned list kind {}", list.name()),
        }
    }

    /// Decode a run of tokens.
    ///
    /// Scalars take exactly one token; lists take any number, including
    /// zero.
    pub fn decode_tokens(&self, tokens: &[&str]) -> Result<Value> {
        if !self.is_list() {
            return match tokens {
                [token] => self.decode_scalar(token),
                _ => Err(Error::decode(
                    format!("{} expects one token, got {}", self.name(), tokens.len()),
                    conversions::join_tokens(tokens),
                )),
            };
        }

        let elements = tokens
            .iter()
            .map(|t| self.decode_scalar(t))
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::collect_list(*self, elements))
    }

    /// Decode a whole response payload.
    ///
    /// Lists are split on the token separator; scalars use the trimmed text
    /// as their single token.
    pub fn decode_text(&self, text: &str) -> Result<Value> {
        let result = if self.is_list() {
            self.decode_tokens(&split_tokens(text))
        } else {
            self.decode_scalar(text)
        };
        result.map_err(|e| e.with_raw(text))
    }

    /// Encode a value into its wire tokens.
    ///
    /// Scalars produce one token, lists one token per element. A value of
    /// the wrong kind is [`Error::InvalidParameter`].
    pub fn encode(&self, value: &Value) -> Result<Vec<String>> {
        let mismatch = || {
            Error::InvalidParameter(format!(
                "{} field given a {} value",
                self.name(),
                value.kind_name()
            ))
        };

        let tokens = match (self, value) {
            (DataType::Boolean, Value::Bool(b)) => vec![conversions::bool_to_string(*b).to_string()],
            (DataType::Integer, Value::Int(i)) => vec![conversions::int_to_string(*i)],
            (DataType::Float, Value::Float(f)) => vec![conversions::float_to_string(*f)],
            (DataType::FloatOrBool, Value::FloatOrBool(v)) => {
                vec![conversions::float_or_bool_to_string(*v)]
            }
            (DataType::RawString, Value::Str(s)) => vec![s.clone()],
            (DataType::QuotedString, Value::Str(s)) => vec![conversions::quote_string(s)],
            (DataType::Enum(table), Value::Enum(t)) => vec![checked_enum_token(*table, t)?],
            (DataType::BooleanList, Value::BoolList(v)) => v
                .iter()
                .map(|b| conversions::bool_to_string(*b).to_string())
                .collect(),
            (DataType::IntegerList, Value::IntList(v)) => {
                v.iter().map(|i| conversions::int_to_string(*i)).collect()
            }
            (DataType::FloatList, Value::FloatList(v)) => {
                v.iter().map(|f| conversions::float_to_string(*f)).collect()
            }
            (DataType::FloatOrBoolList, Value::FloatOrBoolList(v)) => v
                .iter()
                .map(|x| conversions::float_or_bool_to_string(*x))
                .collect(),
            (DataType::StringList, Value::StrList(v)) => v.clone(),
            (DataType::QuotedStringList, Value::StrList(v)) => {
                v.iter().map(|s| conversions::quote_string(s)).collect()
            }
            (DataType::EnumList(table), Value::EnumList(v)) => v
                .iter()
                .map(|t| checked_enum_token(*table, t))
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(mismatch()),
        };
        Ok(tokens)
    }
}

fn checked_enum_token(table: &'static dyn EnumTokens, token: &str) -> Result<String> {
    if table.contains(token) {
        Ok(token.to_string())
    } else {
        Err(Error::UnknownEnumValue {
            enum_name: table.name(),
            token: token.to_string(),
        })
    }
}

/// The native value of one argument or struct field.
///
/// Enum values are carried as their wire token; typed record conversions
/// map them back to variants through the caller's
/// [`EnumTable`](crate::enums::EnumTable).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `ON`/`OFF` flag.
    Bool(bool),
    /// Integer in any accepted notation.
    Int(i64),
    /// Float, including `NAN` and `INF`.
    Float(f64),
    /// Number that may be replaced by `ON`/`OFF`.
    FloatOrBool(FloatOrBool),
    /// Raw or quoted string, unquoted.
    Str(String),
    /// Enum wire token.
    Enum(String),
    /// List of flags.
    BoolList(Vec<bool>),
    /// List of integers.
    IntList(Vec<i64>),
    /// List of floats.
    FloatList(Vec<f64>),
    /// List of numbers or flags.
    FloatOrBoolList(Vec<FloatOrBool>),
    /// List of strings, unquoted.
    StrList(Vec<String>),
    /// List of enum wire tokens.
    EnumList(Vec<String>),
}

impl Value {
    /// Short name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::FloatOrBool(_) => "FloatOrBool",
            Value::Str(_) => "Str",
            Value::Enum(_) => "Enum",
            Value::BoolList(_) => "BoolList",
            Value::IntList(_) => "IntList",
            Value::FloatList(_) => "FloatList",
            Value::FloatOrBoolList(_) => "FloatOrBoolList",
            Value::StrList(_) => "StrList",
            Value::EnumList(_) => "EnumList",
        }
    }

    /// Number of elements for lists, 1 for scalars.
    pub fn len(&self) -> usize {
        match self {
            Value::BoolList(v) => v.len(),
            Value::IntList(v) => v.len(),
            Value::FloatList(v) => v.len(),
            Value::FloatOrBoolList(v) => v.len(),
            Value::StrList(v) | Value::EnumList(v) => v.len(),
            _ => 1,
        }
    }

    /// Whether this is an empty list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The wire token of `value`, as an enum value.
    pub fn from_enum<E: Copy + PartialEq>(value: E, table: &EnumTable<E>) -> Result<Value> {
        Ok(Value::Enum(table.token(value)?.to_string()))
    }

    /// The wire tokens of `values`, as an enum list value.
    pub fn from_enum_list<E: Copy + PartialEq>(values: &[E], table: &EnumTable<E>) -> Result<Value> {
        values
            .iter()
            .map(|v| table.token(*v).map(str::to_string))
            .collect::<Result<Vec<_>>>()
            .map(Value::EnumList)
    }

    /// Gather decoded scalar elements into the list value for `list_type`.
    fn collect_list(list_type: DataType, elements: Vec<Value>) -> Value {
        macro_rules! gather {
            ($variant:ident, $list:ident) => {
                Value::$list(
                    elements
                        .into_iter()
                        .filter_map(|e| match e {
                            Value::$variant(x) => Some(x),
                            _ => None,
                        })
                        .collect(),
                )
            };
        }

        match list_type {
            DataType::BooleanList => gather!(Bool, BoolList),
            DataType::IntegerList => gather!(Int, IntList),
            DataType::FloatList => gather!(Float, FloatList),
            DataType::FloatOrBoolList => gather!(FloatOrBool, FloatOrBoolList),
            DataType::StringList | DataType::QuotedStringList => gather!(Str, StrList),
            DataType::EnumList(_) => gather!(Enum, EnumList),
            scalar => unreachable!("collect_list called with scalar kind {}", scalar.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<FloatOrBool> for Value {
    fn from(v: FloatOrBool) -> Self {
        Value::FloatOrBool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<bool>> for Value {
    fn from(v: Vec<bool>) -> Self {
        Value::BoolList(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntList(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatList(v)
    }
}
