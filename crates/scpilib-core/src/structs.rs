//! Multi-value response and write payloads.
//!
//! A [`StructDescriptor`] lists the named, typed fields of a response in
//! wire order. Decoding walks the token stream left to right; encoding is
//! the inverse. Responses carry an implicit leading `Reliability` integer
//! that is decoded into the record but never encoded.
//!
//! Descriptors for generated command groups are `static` items built with
//! the `const` constructors, so a malformed shape (a variable-length list
//! that is not the last field, or a mandatory field after an optional one)
//! fails at compile time:
//!
//! ```
//! use scpilib_core::structs::{ArgStruct, StructDescriptor};
//! use scpilib_core::DataType;
//!
//! static LEVEL_FIELDS: [ArgStruct; 2] = [
//!     ArgStruct::scalar("Enabled", DataType::Boolean),
//!     ArgStruct::scalar("Level", DataType::Float),
//! ];
//! static LEVEL: StructDescriptor = StructDescriptor::new("Level", &LEVEL_FIELDS);
//!
//! let rec = LEVEL.decode("1,ON,-12.5").unwrap();
//! assert_eq!(rec.reliability(), Some(1));
//! assert_eq!(rec.get::<f64>("Level").unwrap(), -12.5);
//! assert_eq!(LEVEL.encode(&rec).unwrap(), "ON,-12.5");
//! ```

use std::borrow::Cow;

use crate::conversions::{join_tokens, split_tokens};
use crate::enums::EnumTable;
use crate::error::{Error, Result};
use crate::types::{DataType, FloatOrBool, Value};

/// Name of the implicit leading field of every response record.
pub const RELIABILITY_FIELD: &str = "Reliability";

/// How many tokens a field takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// One token.
    Scalar,
    /// Exactly this many tokens.
    Fixed(usize),
    /// Every remaining token. Only valid on the last field.
    Variable,
}

/// One field of a struct payload.
#[derive(Debug, Clone)]
pub struct ArgStruct {
    name: &'static str,
    data_type: DataType,
    arity: Arity,
    is_optional: bool,
}

impl ArgStruct {
    /// A single-token field.
    pub const fn scalar(name: &'static str, data_type: DataType) -> Self {
        ArgStruct {
            name,
            data_type,
            arity: Arity::Scalar,
            is_optional: false,
        }
    }

    /// A list field of `count` elements; `count == 0` means variable length.
    pub const fn list(name: &'static str, data_type: DataType, count: usize) -> Self {
        ArgStruct {
            name,
            data_type,
            arity: if count == 0 {
                Arity::Variable
            } else {
                Arity::Fixed(count)
            },
            is_optional: false,
        }
    }

    /// Mark the field optional: it takes tokens only if any remain.
    pub const fn optional(self) -> Self {
        ArgStruct {
            name: self.name,
            data_type: self.data_type,
            arity: self.arity,
            is_optional: true,
        }
    }

    /// Field name used as the record key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wire type of the field's tokens.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// How many tokens the field takes.
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Whether the field may be absent from a response.
    pub fn is_optional(&self) -> bool {
        self.is_optional
    }
}

/// Index and reason of the first shape violation, if any.
const fn shape_error(fields: &[ArgStruct]) -> Option<(usize, &'static str)> {
    let mut seen_optional = false;
    let mut i = 0;
    while i < fields.len() {
        let f = &fields[i];
        if f.is_optional {
            seen_optional = true;
        } else if seen_optional {
            return Some((i, "mandatory field follows an optional field"));
        }
        match f.arity {
            Arity::Scalar => {
                if f.data_type.is_list() {
                    return Some((i, "scalar field declared with a list type"));
                }
            }
            Arity::Fixed(_) => {
                if !f.data_type.is_list() {
                    return Some((i, "list field declared with a scalar type"));
                }
            }
            Arity::Variable => {
                if !f.data_type.is_list() {
                    return Some((i, "list field declared with a scalar type"));
                }
                if i + 1 != fields.len() {
                    return Some((i, "variable-length list is not the last field"));
                }
            }
        }
        i += 1;
    }
    None
}

/// Ordered field layout of a multi-value payload.
#[derive(Debug, Clone)]
pub struct StructDescriptor {
    name: &'static str,
    fields: Cow<'static, [ArgStruct]>,
    reliability: bool,
}

impl StructDescriptor {
    /// A descriptor whose responses begin with the `Reliability` integer.
    ///
    /// Panics (at compile time, in a `static`) if the shape is invalid.
    pub const fn new(name: &'static str, fields: &'static [ArgStruct]) -> Self {
        if shape_error(fields).is_some() {
            panic!("invalid struct descriptor shape");
        }
        StructDescriptor {
            name,
            fields: Cow::Borrowed(fields),
            reliability: true,
        }
    }

    /// Like [`new`](Self::new), for responses without a leading
    /// `Reliability` token.
    pub const fn bare(name: &'static str, fields: &'static [ArgStruct]) -> Self {
        if shape_error(fields).is_some() {
            panic!("invalid struct descriptor shape");
        }
        StructDescriptor {
            name,
            fields: Cow::Borrowed(fields),
            reliability: false,
        }
    }

    /// Build a descriptor at runtime.
    ///
    /// Shape violations and duplicate field names are
    /// [`Error::InvalidParameter`].
    pub fn from_fields(name: &'static str, fields: Vec<ArgStruct>) -> Result<Self> {
        if let Some((i, reason)) = shape_error(&fields) {
            return Err(Error::InvalidParameter(format!(
                "struct {name}, field {}: {reason}",
                fields[i].name
            )));
        }
        for (i, f) in fields.iter().enumerate() {
            if f.name == RELIABILITY_FIELD || fields[..i].iter().any(|g| g.name == f.name) {
                return Err(Error::InvalidParameter(format!(
                    "struct {name}: duplicate field name {}",
                    f.name
                )));
            }
        }
        Ok(StructDescriptor {
            name,
            fields: Cow::Owned(fields),
            reliability: true,
        })
    }

    /// Set whether decoded responses carry the leading `Reliability` token.
    pub fn with_reliability(mut self, reliability: bool) -> Self {
        self.reliability = reliability;
        self
    }

    /// Descriptor name, used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fields in wire order, without `Reliability`.
    pub fn fields(&self) -> &[ArgStruct] {
        &self.fields
    }

    /// Whether responses begin with the `Reliability` token.
    pub fn has_reliability(&self) -> bool {
        self.reliability
    }

    /// Decode a response payload.
    ///
    /// Decode errors carry the full payload as their raw text.
    pub fn decode(&self, text: &str) -> Result<DecodedRecord> {
        self.decode_tokens(&split_tokens(text))
            .map_err(|e| e.with_raw(text))
    }

    /// Decode an already-split token stream.
    pub fn decode_tokens(&self, tokens: &[&str]) -> Result<DecodedRecord> {
        let mut record = DecodedRecord::new();
        let mut pos = 0;

        if self.reliability {
            let token = tokens.first().ok_or(Error::TruncatedResponse {
                field: RELIABILITY_FIELD.to_string(),
                needed: 1,
                available: 0,
            })?;
            record.push(RELIABILITY_FIELD, Some(DataType::Integer.decode_tokens(&[*token])?));
            pos = 1;
        }

        for field in self.fields.iter() {
            let available = tokens.len() - pos;
            if available == 0 && field.is_optional {
                record.push(field.name, None);
                continue;
            }
            let needed = match field.arity {
                Arity::Scalar => 1,
                Arity::Fixed(n) => n,
                Arity::Variable => available,
            };
            if available < needed {
                return Err(Error::TruncatedResponse {
                    field: field.name.to_string(),
                    needed,
                    available,
                });
            }
            let value = field.data_type.decode_tokens(&tokens[pos..pos + needed])?;
            record.push(field.name, Some(value));
            pos += needed;
        }

        if pos < tokens.len() {
            return Err(Error::decode(
                format!(
                    "{} unexpected trailing token(s) after struct {}",
                    tokens.len() - pos,
                    self.name
                ),
                join_tokens(tokens),
            ));
        }
        Ok(record)
    }

    /// Encode a record in field order.
    ///
    /// Optional fields without a value are omitted. The `Reliability`
    /// entry, if present in the record, is ignored.
    pub fn encode(&self, record: &DecodedRecord) -> Result<String> {
        let mut tokens = Vec::new();
        for field in self.fields.iter() {
            let value = match record.value(field.name) {
                Some(v) => v,
                None if field.is_optional => continue,
                None => return Err(Error::MissingMandatoryArgument(field.name.to_string())),
            };
            if let Arity::Fixed(n) = field.arity {
                if value.len() != n {
                    return Err(Error::InvalidParameter(format!(
                        "field {} needs {n} element(s), got {}",
                        field.name,
                        value.len()
                    )));
                }
            }
            let encoded = field.data_type.encode(value).map_err(|e| match e {
                Error::InvalidParameter(msg) => {
                    Error::InvalidParameter(format!("field {}: {msg}", field.name))
                }
                other => other,
            })?;
            tokens.extend(encoded);
        }
        Ok(join_tokens(&tokens))
    }
}

/// Field-name to value mapping produced by a struct decode.
///
/// Entries keep descriptor order. An optional field that was absent on the
/// wire is present with no value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedRecord {
    entries: Vec<(&'static str, Option<Value>)>,
}

impl DecodedRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, replacing any existing entry of the same name.
    pub fn push(&mut self, name: &'static str, value: Option<Value>) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`push`](Self::push) of a present value.
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.push(name, Some(value.into()));
        self
    }

    /// Builder-style [`push`](Self::push) of an optional value.
    pub fn with_opt<V: Into<Value>>(mut self, name: &'static str, value: Option<V>) -> Self {
        self.push(name, value.map(Into::into));
        self
    }

    /// The raw value of `name`, if present and set.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Whether `name` is a field of this record (set or not).
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Field names in order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }

    /// Number of fields, set or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The leading `Reliability` value, if the response carried one.
    pub fn reliability(&self) -> Option<i64> {
        match self.value(RELIABILITY_FIELD) {
            Some(Value::Int(r)) => Some(*r),
            _ => None,
        }
    }

    /// Typed value of a mandatory field.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .value(name)
            .ok_or_else(|| Error::InvalidParameter(format!("record has no value for {name}")))?;
        T::from_value(value).ok_or_else(|| kind_error(name, value))
    }

    /// Typed value of an optional field.
    pub fn get_opt<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        match self.value(name) {
            None => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .ok_or_else(|| kind_error(name, value)),
        }
    }

    /// Enum field mapped back to its variant.
    pub fn get_enum<E: Copy + PartialEq>(&self, name: &str, table: &EnumTable<E>) -> Result<E> {
        let token: String = self.get(name)?;
        table.parse(&token)
    }

    /// Optional enum field mapped back to its variant.
    pub fn get_opt_enum<E: Copy + PartialEq>(
        &self,
        name: &str,
        table: &EnumTable<E>,
    ) -> Result<Option<E>> {
        self.get_opt::<String>(name)?
            .map(|t| table.parse(&t))
            .transpose()
    }

    /// Enum-list field mapped back to its variants.
    pub fn get_enum_list<E: Copy + PartialEq>(
        &self,
        name: &str,
        table: &EnumTable<E>,
    ) -> Result<Vec<E>> {
        let tokens: Vec<String> = self.get(name)?;
        tokens.iter().map(|t| table.parse(t)).collect()
    }
}

fn kind_error(name: &str, value: &Value) -> Error {
    Error::InvalidParameter(format!(
        "field {name} holds a {} value",
        value.kind_name()
    ))
}

/// Extraction of a native value from a [`Value`].
pub trait FromValue: Sized {
    /// `None` if `value` is of another kind.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl FromValue for FloatOrBool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::FloatOrBool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Strings and enum tokens.
impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Str(s) | Value::Enum(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<bool> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::BoolList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<i64> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<f64> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::FloatList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<FloatOrBool> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::FloatOrBoolList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// String lists and enum-token lists.
impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::StrList(v) | Value::EnumList(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// A concrete Rust type with a fixed struct layout.
///
/// Generated command groups define one type per response or write payload
/// and implement this trait so callers work with named fields instead of a
/// [`DecodedRecord`].
pub trait StructRecord: Sized {
    /// The wire layout.
    fn descriptor() -> &'static StructDescriptor;

    /// Build the value from a decoded record.
    fn from_record(record: &DecodedRecord) -> Result<Self>;

    /// Convert the value into a record for encoding.
    fn to_record(&self) -> Result<DecodedRecord>;

    /// Decode straight from a response payload.
    fn decode(text: &str) -> Result<Self> {
        let record = Self::descriptor().decode(text)?;
        Self::from_record(&record).map_err(|e| e.with_raw(text))
    }

    /// Encode into a parameter clause.
    fn encode(&self) -> Result<String> {
        Self::descriptor().encode(&self.to_record()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phy {
        Le1m,
        Le2m,
    }

    static PHY: EnumTable<Phy> = EnumTable::new("Phy", &[(Phy::Le1m, "LE1M"), (Phy::Le2m, "LE2M")]);

    static LEVEL_FIELDS: [ArgStruct; 2] = [
        ArgStruct::scalar("Enabled", DataType::Boolean),
        ArgStruct::scalar("Level", DataType::Float),
    ];
    static LEVEL: StructDescriptor = StructDescriptor::new("Level", &LEVEL_FIELDS);

    static MAND_OPT_FIELDS: [ArgStruct; 2] = [
        ArgStruct::scalar("Count", DataType::Integer),
        ArgStruct::scalar("Offset", DataType::Float).optional(),
    ];
    static MAND_OPT: StructDescriptor = StructDescriptor::bare("MandOpt", &MAND_OPT_FIELDS);

    static TRACE_FIELDS: [ArgStruct; 4] = [
        ArgStruct::scalar("Phy", DataType::Enum(&PHY)),
        ArgStruct::list("Window", DataType::IntegerList, 2),
        ArgStruct::scalar("Limit", DataType::FloatOrBool),
        ArgStruct::list("Points", DataType::FloatList, 0),
    ];
    static TRACE: StructDescriptor = StructDescriptor::new("Trace", &TRACE_FIELDS);

    #[test]
    fn decode_with_reliability() {
        let rec = LEVEL.decode("1,ON,-12.5").unwrap();
        assert_eq!(rec.reliability(), Some(1));
        assert!(rec.get::<bool>("Enabled").unwrap());
        assert_eq!(rec.get::<f64>("Level").unwrap(), -12.5);
        assert_eq!(
            rec.names().collect::<Vec<_>>(),
            vec!["Reliability", "Enabled", "Level"]
        );
    }

    #[test]
    fn optional_field_absent_when_tokens_run_out() {
        let rec = MAND_OPT.decode("4").unwrap();
        assert_eq!(rec.get::<i64>("Count").unwrap(), 4);
        assert!(rec.contains("Offset"));
        assert_eq!(rec.get_opt::<f64>("Offset").unwrap(), None);

        let rec = MAND_OPT.decode("4,0.5").unwrap();
        assert_eq!(rec.get_opt::<f64>("Offset").unwrap(), Some(0.5));
    }

    #[test]
    fn zero_tokens_is_truncated() {
        match MAND_OPT.decode("") {
            Err(Error::TruncatedResponse { field, needed, available }) => {
                assert_eq!(field, "Count");
                assert_eq!(needed, 1);
                assert_eq!(available, 0);
            }
            other => panic!("expected TruncatedResponse, got {other:?}"),
        }
    }

    #[test]
    fn missing_reliability_is_truncated() {
        assert!(matches!(
            LEVEL.decode(""),
            Err(Error::TruncatedResponse { .. })
        ));
    }

    #[test]
    fn leftover_tokens_are_decode_error() {
        match LEVEL.decode("0,ON,1.0,extra") {
            Err(Error::Decode { raw, .. }) => assert_eq!(raw, "0,ON,1.0,extra"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn bad_token_error_carries_full_payload() {
        match LEVEL.decode("0,MAYBE,1.0") {
            Err(Error::Decode { raw, .. }) => assert_eq!(raw, "0,MAYBE,1.0"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn fixed_and_variable_lists() {
        let rec = TRACE.decode("0,LE2M,10,20,OFF,1.5,2.5,3.5").unwrap();
        assert_eq!(rec.get_enum("Phy", &PHY).unwrap(), Phy::Le2m);
        assert_eq!(rec.get::<Vec<i64>>("Window").unwrap(), vec![10, 20]);
        assert_eq!(
            rec.get::<FloatOrBool>("Limit").unwrap(),
            FloatOrBool::Bool(false)
        );
        assert_eq!(rec.get::<Vec<f64>>("Points").unwrap(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn variable_list_may_be_empty() {
        let rec = TRACE.decode("0,LE1M,1,2,3.5").unwrap();
        assert_eq!(rec.get::<Vec<f64>>("Points").unwrap(), Vec::<f64>::new());
        assert_eq!(
            rec.get::<FloatOrBool>("Limit").unwrap(),
            FloatOrBool::Float(3.5)
        );
    }

    #[test]
    fn short_fixed_list_is_truncated() {
        match TRACE.decode("0,LE1M,1") {
            Err(Error::TruncatedResponse { field, needed, available }) => {
                assert_eq!(field, "Window");
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected TruncatedResponse, got {other:?}"),
        }
    }

    #[test]
    fn encode_skips_reliability_and_absent_optionals() {
        let rec = LEVEL.decode("1,OFF,3").unwrap();
        assert_eq!(LEVEL.encode(&rec).unwrap(), "OFF,3");

        let rec = DecodedRecord::new()
            .with("Count", 9i64)
            .with_opt("Offset", None::<f64>);
        assert_eq!(MAND_OPT.encode(&rec).unwrap(), "9");
    }

    #[test]
    fn encode_round_trips_decode() {
        let payload = "LE1M,1,2,ON,0.5,0.25";
        let rec = TRACE.decode(&format!("0,{payload}")).unwrap();
        assert_eq!(TRACE.encode(&rec).unwrap(), payload);
    }

    #[test]
    fn encode_missing_mandatory() {
        let rec = DecodedRecord::new().with("Enabled", true);
        assert!(matches!(
            LEVEL.encode(&rec),
            Err(Error::MissingMandatoryArgument(name)) if name == "Level"
        ));
    }

    #[test]
    fn encode_fixed_list_wrong_length() {
        let rec = DecodedRecord::new()
            .with("Phy", Value::Enum("LE1M".into()))
            .with("Window", vec![1i64, 2, 3])
            .with("Limit", FloatOrBool::Float(1.0))
            .with("Points", Vec::<f64>::new());
        assert!(matches!(
            TRACE.encode(&rec),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn runtime_descriptor_rejects_variable_list_not_last() {
        let result = StructDescriptor::from_fields(
            "Bad",
            vec![
                ArgStruct::list("Points", DataType::FloatList, 0),
                ArgStruct::scalar("Level", DataType::Float),
            ],
        );
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn runtime_descriptor_rejects_mandatory_after_optional() {
        let result = StructDescriptor::from_fields(
            "Bad",
            vec![
                ArgStruct::scalar("Offset", DataType::Float).optional(),
                ArgStruct::scalar("Count", DataType::Integer),
            ],
        );
        match result {
            Err(Error::InvalidParameter(msg)) => assert!(msg.contains("Count"), "{msg}"),
            other => panic!("expected InvalidParameter, got {other:?}"),
        }

        assert!(StructDescriptor::from_fields(
            "Good",
            vec![
                ArgStruct::scalar("Count", DataType::Integer),
                ArgStruct::scalar("Offset", DataType::Float).optional(),
                ArgStruct::scalar("Gain", DataType::Float).optional(),
            ],
        )
        .is_ok());
    }

    #[test]
    fn runtime_descriptor_rejects_duplicates_and_type_mismatch() {
        assert!(StructDescriptor::from_fields(
            "Dup",
            vec![
                ArgStruct::scalar("A", DataType::Float),
                ArgStruct::scalar("A", DataType::Float),
            ],
        )
        .is_err());
        assert!(StructDescriptor::from_fields(
            "Rel",
            vec![ArgStruct::scalar("Reliability", DataType::Integer)],
        )
        .is_err());
        assert!(StructDescriptor::from_fields(
            "Kind",
            vec![ArgStruct::scalar("A", DataType::FloatList)],
        )
        .is_err());
    }

    #[test]
    fn runtime_descriptor_without_reliability() {
        let d = StructDescriptor::from_fields(
            "Pair",
            vec![
                ArgStruct::scalar("A", DataType::Integer),
                ArgStruct::scalar("B", DataType::Integer),
            ],
        )
        .unwrap()
        .with_reliability(false);
        let rec = d.decode("1,2").unwrap();
        assert_eq!(rec.reliability(), None);
        assert_eq!(rec.get::<i64>("B").unwrap(), 2);
    }

    #[test]
    fn typed_get_wrong_kind() {
        let rec = LEVEL.decode("0,ON,1").unwrap();
        assert!(matches!(
            rec.get::<i64>("Level"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(rec.get::<f64>("Nope").is_err());
    }

    // ---------------------------------------------------------------
    // StructRecord
    // ---------------------------------------------------------------

    #[derive(Debug, PartialEq)]
    struct Level {
        enabled: bool,
        level: f64,
    }

    impl StructRecord for Level {
        fn descriptor() -> &'static StructDescriptor {
            &LEVEL
        }

        fn from_record(record: &DecodedRecord) -> Result<Self> {
            Ok(Level {
                enabled: record.get("Enabled")?,
                level: record.get("Level")?,
            })
        }

        fn to_record(&self) -> Result<DecodedRecord> {
            Ok(DecodedRecord::new()
                .with("Enabled", self.enabled)
                .with("Level", self.level))
        }
    }

    #[test]
    fn struct_record_decode_and_encode() {
        let level = Level::decode("1,ON,-12.5").unwrap();
        assert_eq!(
            level,
            Level {
                enabled: true,
                level: -12.5
            }
        );
        assert_eq!(level.encode().unwrap(), "ON,-12.5");
    }
}
