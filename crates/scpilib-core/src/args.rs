//! Command parameter composition.
//!
//! An [`ArgSingleList`] is the ordered parameter list of one command. Each
//! [`ArgSingle`] carries its value (if any), its [`DataType`], and whether it
//! may be omitted. Composition is deterministic: the same arguments always
//! produce the same clause.
//!
//! # Example
//!
//! ```
//! use scpilib_core::args::{compose_cmd, ArgSingle, ArgSingleList};
//! use scpilib_core::DataType;
//!
//! let args = ArgSingleList::new(vec![
//!     ArgSingle::mandatory("Level", DataType::Float, -12.5),
//!     ArgSingle::optional("Enable", DataType::Boolean, None::<bool>),
//! ])
//! .unwrap();
//! assert_eq!(compose_cmd("SOUR:POW", &args).unwrap(), "SOUR:POW -12.5");
//! ```

use crate::conversions::join_tokens;
use crate::error::{Error, Result};
use crate::types::{DataType, Value};

/// One command argument.
#[derive(Debug, Clone)]
pub struct ArgSingle {
    name: String,
    data_type: DataType,
    value: Option<Value>,
    is_optional: bool,
    is_open_list: bool,
}

impl ArgSingle {
    /// A mandatory argument.
    pub fn mandatory(name: impl Into<String>, data_type: DataType, value: impl Into<Value>) -> Self {
        ArgSingle {
            name: name.into(),
            data_type,
            value: Some(value.into()),
            is_optional: false,
            is_open_list: false,
        }
    }

    /// An optional argument; `None` omits it from the clause.
    pub fn optional<V: Into<Value>>(
        name: impl Into<String>,
        data_type: DataType,
        value: Option<V>,
    ) -> Self {
        ArgSingle {
            name: name.into(),
            data_type,
            value: value.map(Into::into),
            is_optional: true,
            is_open_list: false,
        }
    }

    /// A mandatory argument whose value may be missing.
    ///
    /// Composing it without a value fails with
    /// [`Error::MissingMandatoryArgument`].
    pub fn required(name: impl Into<String>, data_type: DataType, value: Option<Value>) -> Self {
        ArgSingle {
            name: name.into(),
            data_type,
            value,
            is_optional: false,
            is_open_list: false,
        }
    }

    /// Mark a list argument as open: a variable number of trailing tokens.
    /// An empty open list contributes nothing.
    pub fn open_list(mut self) -> Self {
        self.is_open_list = true;
        self
    }

    /// Argument name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire type of the argument.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The value to send, if one was given.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the argument may be omitted.
    pub fn is_optional(&self) -> bool {
        self.is_optional
    }

    /// Whether the argument is a variable-length trailing list.
    pub fn is_open_list(&self) -> bool {
        self.is_open_list
    }

    /// Wire tokens for this argument; empty when an optional or open-list
    /// argument has nothing to send.
    fn tokens(&self) -> Result<Vec<String>> {
        match &self.value {
            Some(value) => {
                let tokens = self
                    .data_type
                    .encode(value)
                    .map_err(|e| match e {
                        Error::InvalidParameter(msg) => {
                            Error::InvalidParameter(format!("argument {}: {msg}", self.name))
                        }
                        other => other,
                    })?;
                if tokens.is_empty() && !self.is_optional && !self.is_open_list {
                    return Err(Error::MissingMandatoryArgument(self.name.clone()));
                }
                Ok(tokens)
            }
            None if self.is_optional => Ok(Vec::new()),
            None => Err(Error::MissingMandatoryArgument(self.name.clone())),
        }
    }
}

/// The ordered parameter list of one command.
#[derive(Debug, Clone, Default)]
pub struct ArgSingleList {
    args: Vec<ArgSingle>,
}

impl ArgSingleList {
    /// Build a list, checking its shape.
    ///
    /// Mandatory arguments may not follow an optional one, and an open list
    /// may only be the last argument.
    pub fn new(args: Vec<ArgSingle>) -> Result<Self> {
        let mut seen_optional: Option<&str> = None;
        for (i, arg) in args.iter().enumerate() {
            if arg.is_optional {
                if seen_optional.is_none() {
                    seen_optional = Some(&arg.name);
                }
            } else if let Some(opt) = seen_optional {
                return Err(Error::InvalidParameter(format!(
                    "mandatory argument {} follows optional argument {opt}",
                    arg.name
                )));
            }
            if arg.is_open_list {
                if !arg.data_type.is_list() {
                    return Err(Error::InvalidParameter(format!(
                        "open-list argument {} has scalar type {}",
                        arg.name,
                        arg.data_type.name()
                    )));
                }
                if i + 1 != args.len() {
                    return Err(Error::InvalidParameter(format!(
                        "open-list argument {} is not last",
                        arg.name
                    )));
                }
            }
        }
        Ok(ArgSingleList { args })
    }

    /// A list with a single argument.
    pub fn single(arg: ArgSingle) -> Result<Self> {
        Self::new(vec![arg])
    }

    /// Arguments in wire order.
    pub fn args(&self) -> &[ArgSingle] {
        &self.args
    }

    /// Whether the list declares no arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Compose the parameter clause.
    ///
    /// Omitted optionals leave no gap. Trailing arguments that encode to
    /// nothing but empty tokens are dropped, so the clause never ends in a
    /// bare separator; separators inside a value are kept.
    pub fn compose(&self) -> Result<String> {
        let mut per_arg = self
            .args
            .iter()
            .map(ArgSingle::tokens)
            .collect::<Result<Vec<_>>>()?;
        while per_arg
            .last()
            .is_some_and(|tokens| tokens.iter().all(String::is_empty))
        {
            per_arg.pop();
        }
        let tokens: Vec<String> = per_arg.into_iter().flatten().collect();
        Ok(join_tokens(&tokens))
    }
}

/// `"<mnemonic> <params>"`, or the bare mnemonic when there are no
/// parameters.
pub fn compose_cmd(mnemonic: &str, args: &ArgSingleList) -> Result<String> {
    let params = args.compose()?;
    if params.is_empty() {
        Ok(mnemonic.to_string())
    } else {
        Ok(format!("{mnemonic} {params}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::EnumTable;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Auto,
        Manual,
    }

    static MODE: EnumTable<Mode> =
        EnumTable::new("Mode", &[(Mode::Auto, "AUTO"), (Mode::Manual, "MANual")]);

    #[test]
    fn mandatory_arguments_in_order() {
        let args = ArgSingleList::new(vec![
            ArgSingle::mandatory("Mode", DataType::Enum(&MODE), Value::Enum("MANual".into())),
            ArgSingle::mandatory("Count", DataType::Integer, 3i64),
            ArgSingle::mandatory("Name", DataType::QuotedString, "burst"),
        ])
        .unwrap();
        assert_eq!(args.compose().unwrap(), "MANual,3,'burst'");
    }

    #[test]
    fn composition_is_deterministic() {
        let args = ArgSingleList::new(vec![
            ArgSingle::mandatory("A", DataType::Float, 1.5),
            ArgSingle::optional("B", DataType::Boolean, Some(true)),
        ])
        .unwrap();
        assert_eq!(args.compose().unwrap(), args.compose().unwrap());
    }

    #[test]
    fn absent_optional_matches_undeclared() {
        let with_absent = ArgSingleList::new(vec![
            ArgSingle::mandatory("A", DataType::Integer, 7i64),
            ArgSingle::optional("B", DataType::Integer, None::<i64>),
        ])
        .unwrap();
        let without = ArgSingleList::single(ArgSingle::mandatory("A", DataType::Integer, 7i64))
            .unwrap();
        assert_eq!(with_absent.compose().unwrap(), without.compose().unwrap());
        assert_eq!(
            compose_cmd("CONF:X", &with_absent).unwrap(),
            compose_cmd("CONF:X", &without).unwrap()
        );
    }

    #[test]
    fn missing_mandatory_value() {
        let args =
            ArgSingleList::single(ArgSingle::required("Level", DataType::Float, None)).unwrap();
        match args.compose() {
            Err(Error::MissingMandatoryArgument(name)) => assert_eq!(name, "Level"),
            other => panic!("expected MissingMandatoryArgument, got {other:?}"),
        }
    }

    #[test]
    fn mandatory_after_optional_rejected() {
        let result = ArgSingleList::new(vec![
            ArgSingle::optional("A", DataType::Integer, Some(1i64)),
            ArgSingle::mandatory("B", DataType::Integer, 2i64),
        ]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn open_list_flattens() {
        let args = ArgSingleList::new(vec![
            ArgSingle::mandatory("Slot", DataType::Integer, 2i64),
            ArgSingle::mandatory("Freqs", DataType::FloatList, vec![1e6, 2.5e6]).open_list(),
        ])
        .unwrap();
        assert_eq!(args.compose().unwrap(), "2,1000000,2500000");
    }

    #[test]
    fn empty_open_list_leaves_no_separator() {
        let args = ArgSingleList::new(vec![
            ArgSingle::mandatory("Slot", DataType::Integer, 2i64),
            ArgSingle::mandatory("Freqs", DataType::FloatList, Vec::<f64>::new()).open_list(),
        ])
        .unwrap();
        assert_eq!(args.compose().unwrap(), "2");
    }

    #[test]
    fn separators_inside_values_are_kept() {
        let raw = ArgSingleList::single(ArgSingle::mandatory("Filter", DataType::RawString, "A,B,"))
            .unwrap();
        assert_eq!(raw.compose().unwrap(), "A,B,");

        let names = ArgSingleList::single(ArgSingle::mandatory(
            "Names",
            DataType::StringList,
            Value::StrList(vec!["A".into(), String::new()]),
        ))
        .unwrap();
        assert_eq!(names.compose().unwrap(), "A,");
    }

    #[test]
    fn empty_trailing_optional_is_dropped() {
        let args = ArgSingleList::new(vec![
            ArgSingle::mandatory("Slot", DataType::Integer, 2i64),
            ArgSingle::optional("Label", DataType::RawString, Some("")),
        ])
        .unwrap();
        assert_eq!(args.compose().unwrap(), "2");
    }

    #[test]
    fn empty_closed_list_is_missing() {
        let args = ArgSingleList::single(ArgSingle::mandatory(
            "Freqs",
            DataType::FloatList,
            Vec::<f64>::new(),
        ))
        .unwrap();
        assert!(matches!(
            args.compose(),
            Err(Error::MissingMandatoryArgument(_))
        ));
    }

    #[test]
    fn open_list_must_be_last() {
        let result = ArgSingleList::new(vec![
            ArgSingle::mandatory("Freqs", DataType::FloatList, vec![1.0]).open_list(),
            ArgSingle::mandatory("Slot", DataType::Integer, 2i64),
        ]);
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn wrong_value_kind_names_argument() {
        let args =
            ArgSingleList::single(ArgSingle::mandatory("Count", DataType::Integer, 1.5)).unwrap();
        match args.compose() {
            Err(Error::InvalidParameter(msg)) => assert!(msg.contains("Count")),
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn compose_cmd_bare_mnemonic() {
        assert_eq!(
            compose_cmd("*RST", &ArgSingleList::default()).unwrap(),
            "*RST"
        );
    }
}
