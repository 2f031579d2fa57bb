//! Injectable enum tables.
//!
//! Every enum that crosses the wire is described by an [`EnumTable`]: an
//! ordered list of `(variant, token)` pairs owned by the caller and passed
//! explicitly to the conversion functions. There is no global registry.
//!
//! Tables must be total (every variant listed) and one-to-one (no variant
//! or token listed twice). [`EnumTable::validate`] checks the second
//! property; generated tables are expected to be covered by a unit test
//! that calls it.
//!
//! # Example
//!
//! ```
//! use scpilib_core::enums::EnumTable;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Role {
//!     Initiator,
//!     Reflector,
//! }
//!
//! static ROLE: EnumTable<Role> = EnumTable::new(
//!     "Role",
//!     &[(Role::Initiator, "INITiator"), (Role::Reflector, "REFLector")],
//! );
//!
//! assert_eq!(ROLE.token(Role::Reflector).unwrap(), "REFLector");
//! assert_eq!(ROLE.parse("INITiator").unwrap(), Role::Initiator);
//! assert!(ROLE.parse("initiator").is_err());
//! ```

use std::fmt;

use crate::error::{Error, Result};

/// Mapping between the variants of `E` and their wire tokens.
pub struct EnumTable<E: 'static> {
    name: &'static str,
    entries: &'static [(E, &'static str)],
}

impl<E> EnumTable<E> {
    /// Create a table. Usable in `static` items.
    pub const fn new(name: &'static str, entries: &'static [(E, &'static str)]) -> Self {
        EnumTable { name, entries }
    }

    /// Table name, reported in [`Error::UnknownEnumValue`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// All wire tokens in declaration order.
    pub fn tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(_, t)| *t)
    }

    /// Number of variants in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of `token` in the table (case-sensitive exact match).
    pub fn index_of_token(&self, token: &str) -> Option<usize> {
        self.entries.iter().position(|(_, t)| *t == token)
    }

    /// Token at `index`.
    pub fn token_at(&self, index: usize) -> Option<&'static str> {
        self.entries.get(index).map(|(_, t)| *t)
    }
}

impl<E: Copy + PartialEq> EnumTable<E> {
    /// Wire token for `value`.
    ///
    /// A variant missing from the table means the table is not total; that
    /// is reported as [`Error::InvalidParameter`].
    pub fn token(&self, value: E) -> Result<&'static str> {
        self.entries
            .iter()
            .find(|(v, _)| *v == value)
            .map(|(_, t)| *t)
            .ok_or_else(|| {
                Error::InvalidParameter(format!("enum table {} is missing a variant", self.name))
            })
    }

    /// Variant for `token` (case-sensitive exact match).
    pub fn parse(&self, token: &str) -> Result<E> {
        self.entries
            .iter()
            .find(|(_, t)| *t == token)
            .map(|(v, _)| *v)
            .ok_or_else(|| Error::UnknownEnumValue {
                enum_name: self.name,
                token: token.to_string(),
            })
    }

    /// Position of `value` in the table.
    pub fn index_of(&self, value: E) -> Option<usize> {
        self.entries.iter().position(|(v, _)| *v == value)
    }

    /// Variant at `index`.
    pub fn value_at(&self, index: usize) -> Option<E> {
        self.entries.get(index).map(|(v, _)| *v)
    }

    /// Check that no variant and no token appears twice.
    pub fn validate(&self) -> Result<()> {
        for (i, (value, token)) in self.entries.iter().enumerate() {
            for (other_value, other_token) in &self.entries[i + 1..] {
                if other_value == value {
                    return Err(Error::InvalidParameter(format!(
                        "enum table {}: variant listed twice ({token} / {other_token})",
                        self.name
                    )));
                }
                if other_token == token {
                    return Err(Error::InvalidParameter(format!(
                        "enum table {}: token {token} listed twice",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<E> fmt::Debug for EnumTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumTable")
            .field("name", &self.name)
            .field("tokens", &self.tokens().collect::<Vec<_>>())
            .finish()
    }
}

/// Type-erased view of an [`EnumTable`], used where the variant type is not
/// known statically (struct field descriptors, argument values).
pub trait EnumTokens: Send + Sync {
    /// Table name.
    fn name(&self) -> &'static str;

    /// Whether `token` is one of the table's wire tokens.
    fn contains(&self, token: &str) -> bool {
        self.position(token).is_some()
    }

    /// Position of `token` in the table.
    fn position(&self, token: &str) -> Option<usize>;

    /// Token at `index`.
    fn token_by_index(&self, index: usize) -> Option<&'static str>;
}

impl<E: Send + Sync> EnumTokens for EnumTable<E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn position(&self, token: &str) -> Option<usize> {
        self.index_of_token(token)
    }

    fn token_by_index(&self, index: usize) -> Option<&'static str> {
        self.token_at(index)
    }
}

impl fmt::Debug for dyn EnumTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnumTokens({})", self.name())
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

    #[test]
    fn token_and_parse_are_inverse() {
        for v in [Phy::Le1m, Phy::Le2m] {
            let t = PHY.token(v).unwrap();
            assert_eq!(PHY.parse(t).unwrap(), v);
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        let err = PHY.parse("le1m").unwrap_err();
        match err {
            Error::UnknownEnumValue { enum_name, token } => {
                assert_eq!(enum_name, "Phy");
                assert_eq!(token, "le1m");
            }
            other => panic!("expected UnknownEnumValue, got {other:?}"),
        }
    }

    #[test]
    fn missing_variant_is_reported() {
        static PARTIAL: EnumTable<Phy> = EnumTable::new("Phy", &[(Phy::Le1m, "LE1M")]);
        assert!(matches!(
            PARTIAL.token(Phy::Le2m),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn validate_accepts_one_to_one() {
        assert!(PHY.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_token() {
        static DUP: EnumTable<Phy> =
            EnumTable::new("Phy", &[(Phy::Le1m, "LE1M"), (Phy::Le2m, "LE1M")]);
        assert!(DUP.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_variant() {
        static DUP: EnumTable<Phy> =
            EnumTable::new("Phy", &[(Phy::Le1m, "LE1M"), (Phy::Le1m, "LE2M")]);
        assert!(DUP.validate().is_err());
    }

    #[test]
    fn erased_view() {
        let erased: &dyn EnumTokens = &PHY;
        assert_eq!(erased.name(), "Phy");
        assert!(erased.contains("LE2M"));
        assert!(!erased.contains("LE3M"));
        assert_eq!(erased.position("LE2M"), Some(1));
        assert_eq!(erased.token_by_index(0), Some("LE1M"));
    }

    #[test]
    fn indexes() {
        assert_eq!(PHY.index_of(Phy::Le2m), Some(1));
        assert_eq!(PHY.value_at(0), Some(Phy::Le1m));
        assert_eq!(PHY.token_at(1), Some("LE2M"));
        assert_eq!(PHY.index_of_token("LE2M"), Some(1));
        assert_eq!(PHY.len(), 2);
    }
}
