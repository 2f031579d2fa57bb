//! Stateless text/value conversions for SCPI tokens.
//!
//! These are the only functions that know how a native value is spelled on
//! the wire. Every decode failure is a hard error: nothing here falls back
//! to a default value.
//!
//! # Example
//!
//! ```
//! use scpilib_core::conversions::*;
//! use scpilib_core::FloatOrBool;
//!
//! assert!(string_to_bool("ON").unwrap());
//! assert_eq!(bool_to_string(false), "OFF");
//! assert_eq!(string_to_int("#H1F").unwrap(), 31);
//! assert_eq!(string_to_float_or_bool("OFF").unwrap(), FloatOrBool::Bool(false));
//! assert_eq!(string_to_float_list("1.5, -2,3e2").unwrap(), vec![1.5, -2.0, 300.0]);
//! ```

use crate::enums::EnumTable;
use crate::error::{Error, Result};
use crate::types::FloatOrBool;

/// Separator between tokens in a parameter clause or a response.
pub const TOKEN_SEPARATOR: char = ',';

// ---------------------------------------------------------------
// Tokenizing
// ---------------------------------------------------------------

/// Split a response payload into trimmed tokens.
///
/// Commas inside single- or double-quoted strings do not split. An empty
/// (or all-whitespace) payload yields no tokens.
pub fn split_tokens(text: &str) -> Vec<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut tokens = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == TOKEN_SEPARATOR => {
                tokens.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            None => {}
        }
    }
    tokens.push(text[start..].trim());
    tokens
}

/// Join tokens with the token separator.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::new();
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(TOKEN_SEPARATOR);
        }
        out.push_str(t.as_ref());
    }
    out
}

/// Trim a string response: whitespace, line terminators, and one pair of
/// enclosing quotes.
pub fn trim_str_response(text: &str) -> String {
    strip_quotes(text.trim())
}

// ---------------------------------------------------------------
// Boolean
// ---------------------------------------------------------------

/// Decode `ON` / `OFF` (case-insensitive).
pub fn string_to_bool(text: &str) -> Result<bool> {
    let t = text.trim();
    if t.eq_ignore_ascii_case("ON") {
        Ok(true)
    } else if t.eq_ignore_ascii_case("OFF") {
        Ok(false)
    } else {
        Err(Error::decode("expected ON or OFF", text))
    }
}

/// Encode a boolean as `ON` / `OFF`.
pub fn bool_to_string(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}

// ---------------------------------------------------------------
// Integer
// ---------------------------------------------------------------

/// Decode an integer.
///
/// Accepts plain decimal, the IEEE 488.2 non-decimal forms `#H`, `#Q` and
/// `#B`, and integral values written in float notation (`1.000000E+01`).
pub fn string_to_int(text: &str) -> Result<i64> {
    let t = text.trim();
    if t.is_empty() {
        return Err(Error::decode("empty integer token", text));
    }

    if let Some(rest) = t.strip_prefix('#') {
        let mut chars = rest.chars();
        let radix = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('H') => 16,
            Some('Q') => 8,
            Some('B') => 2,
            _ => return Err(Error::decode("unknown non-decimal prefix", text)),
        };
        return i64::from_str_radix(chars.as_str(), radix)
            .map_err(|e| Error::decode(format!("invalid base-{radix} integer: {e}"), text));
    }

    if let Ok(v) = t.parse::<i64>() {
        return Ok(v);
    }

    let f: f64 = t
        .parse()
        .map_err(|_| Error::decode("not an integer", text))?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64
        // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
        && f < i64::MAX as f64
    {
        Ok(f as i64)
    } else {
        Err(Error::decode("not an integral value", text))
    }
}

/// Encode an integer in decimal.
pub fn int_to_string(value: i64) -> String {
    value.to_string()
}

// ---------------------------------------------------------------
// Float
// ---------------------------------------------------------------

/// Decode a float. `NAN`, `INF` and `-INF` are accepted.
pub fn string_to_float(text: &str) -> Result<f64> {
    let t = text.trim();
    if t.is_empty() {
        return Err(Error::decode("empty float token", text));
    }
    t.parse::<f64>()
        .map_err(|_| Error::decode("not a float", text))
}

/// Encode a float using the shortest representation that parses back to
/// the same value.
pub fn float_to_string(value: f64) -> String {
    if value.is_nan() {
        "NAN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        format!("{value}")
    }
}

// ---------------------------------------------------------------
// Float-or-bool sentinel
// ---------------------------------------------------------------

/// Decode a numeric token that may instead carry the `ON`/`OFF` sentinel.
///
/// The boolean decode is attempted first; `"abc"` fails both and is a
/// decode error.
pub fn string_to_float_or_bool(text: &str) -> Result<FloatOrBool> {
    if let Ok(b) = string_to_bool(text) {
        return Ok(FloatOrBool::Bool(b));
    }
    string_to_float(text)
        .map(FloatOrBool::Float)
        .map_err(|_| Error::decode("expected a number, ON or OFF", text))
}

/// Encode a [`FloatOrBool`].
pub fn float_or_bool_to_string(value: FloatOrBool) -> String {
    match value {
        FloatOrBool::Float(f) => float_to_string(f),
        FloatOrBool::Bool(b) => bool_to_string(b).to_string(),
    }
}

// ---------------------------------------------------------------
// Strings
// ---------------------------------------------------------------

/// Wrap `value` in single quotes, doubling embedded single quotes.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Remove one pair of enclosing single or double quotes and undouble the
/// embedded quote character. Unquoted text is returned unchanged.
pub fn strip_quotes(text: &str) -> String {
    for q in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(q) && text.ends_with(q) {
            let inner = &text[1..text.len() - 1];
            let doubled: String = [q, q].iter().collect();
            return inner.replace(&doubled, &q.to_string());
        }
    }
    text.to_string()
}

// ---------------------------------------------------------------
// Enums
// ---------------------------------------------------------------

/// Decode an enum token against `table` (case-sensitive exact match).
pub fn string_to_scalar_enum<E: Copy + PartialEq>(text: &str, table: &EnumTable<E>) -> Result<E> {
    table.parse(text.trim())
}

/// Encode an enum value through `table`.
pub fn enum_scalar_to_string<E: Copy + PartialEq>(value: E, table: &EnumTable<E>) -> Result<&'static str> {
    table.token(value)
}

// ---------------------------------------------------------------
// Lists
// ---------------------------------------------------------------

fn map_list<T>(text: &str, f: impl Fn(&str) -> Result<T>) -> Result<Vec<T>> {
    split_tokens(text)
        .into_iter()
        .map(|t| f(t).map_err(|e| e.with_raw(text)))
        .collect()
}

/// Decode a comma-separated list of `ON`/`OFF` tokens.
pub fn string_to_bool_list(text: &str) -> Result<Vec<bool>> {
    map_list(text, string_to_bool)
}

/// Decode a comma-separated list of integers.
pub fn string_to_int_list(text: &str) -> Result<Vec<i64>> {
    map_list(text, string_to_int)
}

/// Decode a comma-separated list of floats.
pub fn string_to_float_list(text: &str) -> Result<Vec<f64>> {
    map_list(text, string_to_float)
}

/// Decode a comma-separated list of float-or-bool tokens.
pub fn string_to_float_or_bool_list(text: &str) -> Result<Vec<FloatOrBool>> {
    map_list(text, string_to_float_or_bool)
}

/// Decode a comma-separated list of strings, stripping quotes.
pub fn string_to_str_list(text: &str) -> Result<Vec<String>> {
    map_list(text, |t| Ok(strip_quotes(t)))
}

/// Decode a comma-separated list of enum tokens.
pub fn string_to_list_enum<E: Copy + PartialEq>(text: &str, table: &EnumTable<E>) -> Result<Vec<E>> {
    map_list(text, |t| table.parse(t))
}

/// Encode a list of enum values.
pub fn enum_list_to_string<E: Copy + PartialEq>(values: &[E], table: &EnumTable<E>) -> Result<String> {
    let tokens = values
        .iter()
        .map(|v| table.token(*v))
        .collect::<Result<Vec<_>>>()?;
    Ok(join_tokens(&tokens))
}

/// Encode a list of booleans.
pub fn bool_list_to_string(values: &[bool]) -> String {
    let tokens: Vec<&str> = values.iter().map(|v| bool_to_string(*v)).collect();
    join_tokens(&tokens)
}

/// Encode a list of integers.
pub fn int_list_to_string(values: &[i64]) -> String {
    let tokens: Vec<String> = values.iter().map(|v| int_to_string(*v)).collect();
    join_tokens(&tokens)
}

/// Encode a list of floats.
pub fn float_list_to_string(values: &[f64]) -> String {
    let tokens: Vec<String> = values.iter().map(|v| float_to_string(*v)).collect();
    join_tokens(&tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Tokenizing
    // -----------------------------------------------------------------------

    #[test]
    fn split_empty_payload() {
        assert!(split_tokens("").is_empty());
        assert!(split_tokens("  \r\n").is_empty());
    }

    #[test]
    fn split_trims_tokens() {
        assert_eq!(split_tokens(" 1 , ON,-12.5\n"), vec!["1", "ON", "-12.5"]);
    }

    #[test]
    fn split_respects_quotes() {
        assert_eq!(
            split_tokens("'a,b',\"c,d\",e"),
            vec!["'a,b'", "\"c,d\"", "e"]
        );
    }

    #[test]
    fn split_keeps_empty_inner_tokens() {
        assert_eq!(split_tokens("1,,3"), vec!["1", "", "3"]);
    }

    #[test]
    fn join_round_trip() {
        assert_eq!(join_tokens(&["1", "ON", "-12.5"]), "1,ON,-12.5");
        assert_eq!(join_tokens::<&str>(&[]), "");
    }

    // -----------------------------------------------------------------------
    // Boolean
    // -----------------------------------------------------------------------

    #[test]
    fn bool_decode_case_insensitive() {
        assert!(string_to_bool("ON").unwrap());
        assert!(string_to_bool("on").unwrap());
        assert!(!string_to_bool("Off").unwrap());
    }

    #[test]
    fn bool_decode_rejects_other_tokens() {
        for t in ["1", "0", "TRUE", "", "ONN"] {
            assert!(matches!(string_to_bool(t), Err(Error::Decode { .. })), "{t}");
        }
    }

    #[test]
    fn bool_round_trip() {
        for v in [true, false] {
            assert_eq!(string_to_bool(bool_to_string(v)).unwrap(), v);
        }
    }

    // -----------------------------------------------------------------------
    // Integer
    // -----------------------------------------------------------------------

    #[test]
    fn int_decode_decimal() {
        assert_eq!(string_to_int("42").unwrap(), 42);
        assert_eq!(string_to_int(" -7\n").unwrap(), -7);
        assert_eq!(string_to_int("+3").unwrap(), 3);
    }

    #[test]
    fn int_decode_non_decimal() {
        assert_eq!(string_to_int("#HFF").unwrap(), 255);
        assert_eq!(string_to_int("#h10").unwrap(), 16);
        assert_eq!(string_to_int("#Q17").unwrap(), 15);
        assert_eq!(string_to_int("#B101").unwrap(), 5);
        assert!(string_to_int("#X12").is_err());
        assert!(string_to_int("#HZZ").is_err());
    }

    #[test]
    fn int_decode_float_notation() {
        assert_eq!(string_to_int("1.000000E+01").unwrap(), 10);
        assert!(string_to_int("1.5").is_err());
        assert!(string_to_int("NAN").is_err());
    }

    #[test]
    fn int_decode_errors() {
        assert!(matches!(string_to_int(""), Err(Error::Decode { .. })));
        assert!(matches!(string_to_int("abc"), Err(Error::Decode { .. })));
    }

    #[test]
    fn int_decode_out_of_range() {
        for t in ["9223372036854775808", "9.223372036854775808E+18", "1E+19", "-1E+19"] {
            assert!(
                matches!(string_to_int(t), Err(Error::Decode { .. })),
                "{t} decoded"
            );
        }
        assert_eq!(string_to_int("-9223372036854775808").unwrap(), i64::MIN);
    }

    #[test]
    fn int_round_trip() {
        for v in [0, 1, -1, i64::MAX, i64::MIN] {
            assert_eq!(string_to_int(&int_to_string(v)).unwrap(), v);
        }
    }

    // -----------------------------------------------------------------------
    // Float
    // -----------------------------------------------------------------------

    #[test]
    fn float_decode() {
        assert_eq!(string_to_float("-12.5").unwrap(), -12.5);
        assert_eq!(string_to_float("9.91E37").unwrap(), 9.91e37);
        assert!(string_to_float("NAN").unwrap().is_nan());
        assert_eq!(string_to_float("-INF").unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn float_decode_errors() {
        assert!(matches!(string_to_float(""), Err(Error::Decode { .. })));
        assert!(matches!(string_to_float("1.2.3"), Err(Error::Decode { .. })));
    }

    #[test]
    fn float_round_trip() {
        for v in [0.0, -12.5, 3.5, 1e-9, 123456789.125, f64::MAX, f64::MIN_POSITIVE] {
            assert_eq!(string_to_float(&float_to_string(v)).unwrap(), v);
        }
        assert_eq!(float_to_string(3.5), "3.5");
        assert_eq!(float_to_string(f64::INFINITY), "INF");
        assert_eq!(float_to_string(f64::NAN), "NAN");
    }

    // -----------------------------------------------------------------------
    // Float-or-bool sentinel
    // -----------------------------------------------------------------------

    #[test]
    fn float_or_bool_sentinel() {
        assert_eq!(string_to_float_or_bool("OFF").unwrap(), FloatOrBool::Bool(false));
        assert_eq!(string_to_float_or_bool("ON").unwrap(), FloatOrBool::Bool(true));
        assert_eq!(string_to_float_or_bool("3.5").unwrap(), FloatOrBool::Float(3.5));
        assert!(matches!(
            string_to_float_or_bool("abc"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn float_or_bool_zero_is_not_off() {
        assert_eq!(string_to_float_or_bool("0").unwrap(), FloatOrBool::Float(0.0));
    }

    #[test]
    fn float_or_bool_encode() {
        assert_eq!(float_or_bool_to_string(FloatOrBool::Bool(false)), "OFF");
        assert_eq!(float_or_bool_to_string(FloatOrBool::Float(-1.25)), "-1.25");
    }

    // -----------------------------------------------------------------------
    // Strings
    // -----------------------------------------------------------------------

    #[test]
    fn quoting() {
        assert_eq!(quote_string("abc"), "'abc'");
        assert_eq!(quote_string("it's"), "'it''s'");
        assert_eq!(strip_quotes("'it''s'"), "it's");
        assert_eq!(strip_quotes("\"x\""), "x");
        assert_eq!(strip_quotes("raw"), "raw");
        assert_eq!(strip_quotes("'"), "'");
    }

    #[test]
    fn trim_response() {
        assert_eq!(trim_str_response("\"Rohde,CMW\"\n"), "Rohde,CMW");
        assert_eq!(trim_str_response("  #H8E89BED6\r\n"), "#H8E89BED6");
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    #[test]
    fn lists_decode_in_order() {
        assert_eq!(string_to_bool_list("ON,OFF,on").unwrap(), vec![true, false, true]);
        assert_eq!(string_to_int_list("3,1,2").unwrap(), vec![3, 1, 2]);
        assert_eq!(string_to_str_list("'a','b,c'").unwrap(), vec!["a", "b,c"]);
    }

    #[test]
    fn lists_empty_payload_is_empty() {
        assert!(string_to_float_list("").unwrap().is_empty());
        assert!(string_to_int_list("\n").unwrap().is_empty());
    }

    #[test]
    fn list_error_carries_full_payload() {
        match string_to_int_list("1,x,3") {
            Err(Error::Decode { raw, .. }) => assert_eq!(raw, "1,x,3"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn list_encoders() {
        assert_eq!(bool_list_to_string(&[true, false]), "ON,OFF");
        assert_eq!(int_list_to_string(&[1, -2]), "1,-2");
        assert_eq!(float_list_to_string(&[0.5, 2.0]), "0.5,2");
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Tswitch {
        T0,
        T10,
    }

    static TSWITCH: EnumTable<Tswitch> =
        EnumTable::new("Tswitch", &[(Tswitch::T0, "T0"), (Tswitch::T10, "T10")]);

    #[test]
    fn enum_scalar_and_list() {
        assert_eq!(string_to_scalar_enum("T10\n", &TSWITCH).unwrap(), Tswitch::T10);
        assert!(matches!(
            string_to_scalar_enum("T5", &TSWITCH),
            Err(Error::UnknownEnumValue { .. })
        ));
        assert_eq!(enum_scalar_to_string(Tswitch::T0, &TSWITCH).unwrap(), "T0");
        assert_eq!(
            string_to_list_enum("T0,T10", &TSWITCH).unwrap(),
            vec![Tswitch::T0, Tswitch::T10]
        );
        assert_eq!(
            enum_list_to_string(&[Tswitch::T10, Tswitch::T0], &TSWITCH).unwrap(),
            "T10,T0"
        );
    }
}
