//! Leading-token suppression for homogeneous list responses.
//!
//! Measurement queries often prefix their payload with one or more status
//! tokens (normally the `Reliability` indicator). [`ArgSingleSuppressed`]
//! drops those before decoding the rest as a flat list.

use crate::conversions::{join_tokens, split_tokens};
use crate::error::{Error, Result};
use crate::structs::FromValue;
use crate::types::{DataType, Value};

/// Describes how many leading tokens to discard and how to decode the rest.
#[derive(Debug, Clone, Copy)]
pub struct ArgSingleSuppressed {
    data_type: DataType,
    suppressed: usize,
}

impl ArgSingleSuppressed {
    /// Discard the leading `Reliability` token, decode the rest as
    /// `data_type` (a list kind).
    pub const fn new(data_type: DataType) -> Self {
        Self::with_count(data_type, 1)
    }

    /// Discard `suppressed` leading tokens.
    pub const fn with_count(data_type: DataType, suppressed: usize) -> Self {
        ArgSingleSuppressed {
            data_type,
            suppressed,
        }
    }

    /// List kind of the kept elements.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of leading elements discarded.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    /// Split off the suppressed prefix of any element sequence.
    ///
    /// Used for binary blocks, where the prefix arrives as ordinary
    /// elements. Fewer elements than the prefix is
    /// [`Error::TruncatedResponse`].
    pub fn strip<T>(&self, mut elements: Vec<T>) -> Result<Vec<T>> {
        if elements.len() < self.suppressed {
            return Err(self.truncated(elements.len()));
        }
        Ok(elements.split_off(self.suppressed))
    }

    /// Decode a token stream.
    pub fn decode_tokens(&self, tokens: &[&str]) -> Result<Value> {
        if tokens.len() < self.suppressed {
            return Err(self.truncated(tokens.len()));
        }
        let list_type = if self.data_type.is_list() {
            self.data_type
        } else {
            return Err(Error::InvalidParameter(format!(
                "suppressed decode needs a list type, got {}",
                self.data_type.name()
            )));
        };
        list_type
            .decode_tokens(&tokens[self.suppressed..])
            .map_err(|e| e.with_raw(&join_tokens(tokens)))
    }

    /// Decode an ASCII payload.
    pub fn decode_text(&self, text: &str) -> Result<Value> {
        self.decode_tokens(&split_tokens(text))
            .map_err(|e| e.with_raw(text))
    }

    /// Decode an ASCII payload into a native list.
    pub fn decode_as<T: FromValue>(&self, text: &str) -> Result<T> {
        let value = self.decode_text(text)?;
        T::from_value(&value).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "suppressed {} payload requested as another kind",
                value.kind_name()
            ))
        })
    }

    fn truncated(&self, available: usize) -> Error {
        Error::TruncatedResponse {
            field: "suppressed prefix".to_string(),
            needed: self.suppressed,
            available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_tokens_suppress_one() {
        let s = ArgSingleSuppressed::new(DataType::FloatList);
        let v: Vec<f64> = s.decode_as("0,1.5,2.5,3.5,4.5").unwrap();
        assert_eq!(v, vec![1.5, 2.5, 3.5, 4.5]);
    }

    #[test]
    fn suppress_several() {
        let s = ArgSingleSuppressed::with_count(DataType::IntegerList, 2);
        assert_eq!(
            s.decode_text("0,7,1,2").unwrap(),
            Value::IntList(vec![1, 2])
        );
    }

    #[test]
    fn only_prefix_gives_empty_list() {
        let s = ArgSingleSuppressed::new(DataType::FloatList);
        assert_eq!(s.decode_text("3").unwrap(), Value::FloatList(vec![]));
    }

    #[test]
    fn short_prefix_is_truncated() {
        let s = ArgSingleSuppressed::with_count(DataType::FloatList, 2);
        assert!(matches!(
            s.decode_text("0"),
            Err(Error::TruncatedResponse { needed: 2, available: 1, .. })
        ));
        assert!(matches!(
            s.strip(vec![1.0f64]),
            Err(Error::TruncatedResponse { .. })
        ));
    }

    #[test]
    fn strip_binary_elements() {
        let s = ArgSingleSuppressed::new(DataType::FloatList);
        assert_eq!(s.strip(vec![0.0f64, 1.0, 2.0]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn bad_element_carries_payload() {
        let s = ArgSingleSuppressed::new(DataType::FloatList);
        match s.decode_text("0,1.0,nope") {
            Err(Error::Decode { raw, .. }) => assert_eq!(raw, "0,1.0,nope"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn scalar_type_rejected() {
        let s = ArgSingleSuppressed::new(DataType::Float);
        assert!(matches!(
            s.decode_text("0,1"),
            Err(Error::InvalidParameter(_))
        ));
    }
}
