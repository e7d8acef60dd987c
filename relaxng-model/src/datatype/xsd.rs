//! A trimmed XSD built-in datatype library behind the `Datatype` façade.
//!
//! Covers the built-in types that show up validating real-world schemas
//! (Atom, XHTML 1.0 Strict, DocBook 5) rather than the full XSD 1.0 type
//! hierarchy: string-ish types, the integer/decimal/float family, the
//! date/time family, and facet application (`minInclusive`/`maxInclusive`,
//! `pattern`, length facets).

use super::{Datatype, DatatypeError, Namespaces};
use lazy_static::lazy_static;
use std::rc::Rc;
use std::str::FromStr;

pub const NAMESPACE_URI: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

use crate::datatype::relax::normalize_whitespace;

lazy_static! {
    static ref DATETIME_RE: regex::Regex = regex::Regex::new(
        r"^-?\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$"
    )
    .unwrap();
    static ref DATE_RE: regex::Regex =
        regex::Regex::new(r"^-?\d{4}-\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref TIME_RE: regex::Regex =
        regex::Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref DURATION_RE: regex::Regex = regex::Regex::new(
        r"^-?P([0-9]+Y)?([0-9]+M)?([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?$"
    )
    .unwrap();
    static ref GYEAR_RE: regex::Regex =
        regex::Regex::new(r"^-?\d{4,}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GYEARMONTH_RE: regex::Regex =
        regex::Regex::new(r"^-?\d{4,}-\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GMONTH_RE: regex::Regex = regex::Regex::new(r"^--\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GMONTHDAY_RE: regex::Regex =
        regex::Regex::new(r"^--\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GDAY_RE: regex::Regex = regex::Regex::new(r"^---\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref LANGUAGE_RE: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap();
    static ref NCNAME_RE: regex::Regex =
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap();
    static ref NAME_RE: regex::Regex =
        regex::Regex::new(r"^[A-Za-z_:][A-Za-z0-9_.\-:]*$").unwrap();
    static ref NMTOKEN_RE: regex::Regex = regex::Regex::new(r"^[A-Za-z0-9_.\-:]+$").unwrap();
    static ref ANYURI_RE: regex::Regex = regex::Regex::new(r"^\S*$").unwrap();
}

/// A length facet, applied in Unicode codepoints (NMTOKENS counts tokens
/// instead; handled separately in `XsdDatatype::disallows`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthFacet {
    min: Option<usize>,
    max: Option<usize>,
    exact: Option<usize>,
}

impl LengthFacet {
    fn is_valid(&self, count: usize) -> bool {
        if let Some(exact) = self.exact {
            return count == exact;
        }
        self.min.is_none_or(|m| count >= m) && self.max.is_none_or(|m| count <= m)
    }
}

/// A min/max facet over an orderable numeric type.
#[derive(Debug, Clone)]
pub struct MinMaxFacet<T> {
    min_inclusive: Option<T>,
    max_inclusive: Option<T>,
    min_exclusive: Option<T>,
    max_exclusive: Option<T>,
}

impl<T> Default for MinMaxFacet<T> {
    fn default() -> Self {
        MinMaxFacet {
            min_inclusive: None,
            max_inclusive: None,
            min_exclusive: None,
            max_exclusive: None,
        }
    }
}

impl<T: PartialOrd> MinMaxFacet<T> {
    fn is_valid(&self, v: &T) -> bool {
        self.min_inclusive.as_ref().is_none_or(|m| v >= m)
            && self.max_inclusive.as_ref().is_none_or(|m| v <= m)
            && self.min_exclusive.as_ref().is_none_or(|m| v > m)
            && self.max_exclusive.as_ref().is_none_or(|m| v < m)
    }
}

#[derive(Debug, Clone)]
pub struct PatternFacet(regex::Regex);

impl PatternFacet {
    fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

fn find_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn parse_length_facet(
    datatype: &str,
    params: &[(String, String)],
) -> Result<LengthFacet, DatatypeError> {
    let parse = |name: &str| -> Result<Option<usize>, DatatypeError> {
        find_param(params, name)
            .map(|v| {
                v.parse().map_err(|_| DatatypeError::InvalidParameter {
                    datatype: datatype.to_string(),
                    name: name.to_string(),
                    value: v.to_string(),
                    reason: "expected a non-negative integer".to_string(),
                })
            })
            .transpose()
    };
    Ok(LengthFacet {
        min: parse("minLength")?,
        max: parse("maxLength")?,
        exact: parse("length")?,
    })
}

fn parse_min_max_facet<T: FromStr>(
    datatype: &str,
    params: &[(String, String)],
) -> Result<MinMaxFacet<T>, DatatypeError> {
    let parse = |name: &str| -> Result<Option<T>, DatatypeError> {
        find_param(params, name)
            .map(|v| {
                v.parse().map_err(|_| DatatypeError::InvalidParameter {
                    datatype: datatype.to_string(),
                    name: name.to_string(),
                    value: v.to_string(),
                    reason: "could not parse bound".to_string(),
                })
            })
            .transpose()
    };
    Ok(MinMaxFacet {
        min_inclusive: parse("minInclusive")?,
        max_inclusive: parse("maxInclusive")?,
        min_exclusive: parse("minExclusive")?,
        max_exclusive: parse("maxExclusive")?,
    })
}

fn parse_pattern_facet(
    datatype: &str,
    params: &[(String, String)],
) -> Result<Option<PatternFacet>, DatatypeError> {
    find_param(params, "pattern")
        .map(|p| {
            // XSD patterns are implicitly anchored; the document's value
            // must match the whole pattern, not a substring of it.
            let anchored = format!("^(?:{p})$");
            regex::Regex::new(&anchored)
                .map(PatternFacet)
                .map_err(|e| DatatypeError::InvalidParameter {
                    datatype: datatype.to_string(),
                    name: "pattern".to_string(),
                    value: p.to_string(),
                    reason: e.to_string(),
                })
        })
        .transpose()
}

#[derive(Debug, Clone)]
pub enum XsdDatatype {
    String(LengthFacet),
    NormalizedString(LengthFacet),
    Token(LengthFacet),
    NmToken(LengthFacet),
    NmTokens(LengthFacet),
    NcName(LengthFacet),
    Name(LengthFacet),
    Id(LengthFacet),
    IdRef(LengthFacet),
    Entity(LengthFacet),
    Language,
    Boolean,
    AnyUri,
    QName,
    Decimal(MinMaxFacet<bigdecimal::BigDecimal>, Option<PatternFacet>),
    Integer(MinMaxFacet<num_bigint::BigInt>, Option<PatternFacet>),
    Int(MinMaxFacet<i32>, Option<PatternFacet>),
    Long(MinMaxFacet<i64>, Option<PatternFacet>),
    Short(MinMaxFacet<i16>, Option<PatternFacet>),
    Byte(MinMaxFacet<i8>, Option<PatternFacet>),
    NonNegativeInteger(MinMaxFacet<num_bigint::BigUint>, Option<PatternFacet>),
    PositiveInteger(MinMaxFacet<num_bigint::BigUint>, Option<PatternFacet>),
    UnsignedLong(MinMaxFacet<u64>, Option<PatternFacet>),
    UnsignedInt(MinMaxFacet<u32>, Option<PatternFacet>),
    UnsignedShort(MinMaxFacet<u16>, Option<PatternFacet>),
    UnsignedByte(MinMaxFacet<u8>, Option<PatternFacet>),
    Double(Option<PatternFacet>),
    Float(Option<PatternFacet>),
    Duration(Option<PatternFacet>),
    Date(Option<PatternFacet>),
    DateTime(Option<PatternFacet>),
    Time(Option<PatternFacet>),
    GYear(Option<PatternFacet>),
    GYearMonth(Option<PatternFacet>),
    GMonth(Option<PatternFacet>),
    GMonthDay(Option<PatternFacet>),
    GDay(Option<PatternFacet>),
}

macro_rules! numeric_variant {
    ($value:expr, $ty:ty, $min_max:expr, $pattern:expr) => {{
        <$ty>::from_str($value)
            .ok()
            .is_some_and(|v| $min_max.is_valid(&v))
            && $pattern.as_ref().is_none_or(|p: &PatternFacet| p.is_match($value))
    }};
}

impl Datatype for XsdDatatype {
    fn disallows(&self, value: &str) -> bool {
        !match self {
            XsdDatatype::String(len) => len.is_valid(value.chars().count()),
            XsdDatatype::NormalizedString(len) => {
                !value.contains(['\t', '\n', '\r']) && len.is_valid(value.chars().count())
            }
            XsdDatatype::Token(len) => {
                normalize_whitespace(value) == value && len.is_valid(value.chars().count())
            }
            XsdDatatype::NmToken(len) => {
                NMTOKEN_RE.is_match(value) && len.is_valid(value.chars().count())
            }
            XsdDatatype::NmTokens(len) => {
                !value.trim().is_empty()
                    && value.split_ascii_whitespace().all(|t| NMTOKEN_RE.is_match(t))
                    && len.is_valid(value.split_ascii_whitespace().count())
            }
            XsdDatatype::NcName(len) => {
                NCNAME_RE.is_match(value) && len.is_valid(value.chars().count())
            }
            XsdDatatype::Name(len) => {
                NAME_RE.is_match(value) && len.is_valid(value.chars().count())
            }
            XsdDatatype::Id(len) | XsdDatatype::IdRef(len) | XsdDatatype::Entity(len) => {
                NCNAME_RE.is_match(value) && len.is_valid(value.chars().count())
            }
            XsdDatatype::Language => LANGUAGE_RE.is_match(value),
            XsdDatatype::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            XsdDatatype::AnyUri => ANYURI_RE.is_match(value),
            // QName lexical validity (ignoring namespace resolution, which
            // `equal` needs a resolver for) is just "is it an NCName or
            // prefix:local".
            XsdDatatype::QName => value
                .split_once(':')
                .map(|(p, l)| NCNAME_RE.is_match(p) && NCNAME_RE.is_match(l))
                .unwrap_or_else(|| NCNAME_RE.is_match(value)),
            XsdDatatype::Decimal(mm, pat) => numeric_variant!(value, bigdecimal::BigDecimal, mm, pat),
            XsdDatatype::Integer(mm, pat) => numeric_variant!(value, num_bigint::BigInt, mm, pat),
            XsdDatatype::Int(mm, pat) => numeric_variant!(value, i32, mm, pat),
            XsdDatatype::Long(mm, pat) => numeric_variant!(value, i64, mm, pat),
            XsdDatatype::Short(mm, pat) => numeric_variant!(value, i16, mm, pat),
            XsdDatatype::Byte(mm, pat) => numeric_variant!(value, i8, mm, pat),
            XsdDatatype::NonNegativeInteger(mm, pat) => {
                numeric_variant!(value, num_bigint::BigUint, mm, pat)
            }
            XsdDatatype::PositiveInteger(mm, pat) => {
                num_bigint::BigUint::from_str(value)
                    .ok()
                    .is_some_and(|v| v >= num_bigint::BigUint::from(1u32) && mm.is_valid(&v))
                    && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::UnsignedLong(mm, pat) => numeric_variant!(value, u64, mm, pat),
            XsdDatatype::UnsignedInt(mm, pat) => numeric_variant!(value, u32, mm, pat),
            XsdDatatype::UnsignedShort(mm, pat) => numeric_variant!(value, u16, mm, pat),
            XsdDatatype::UnsignedByte(mm, pat) => numeric_variant!(value, u8, mm, pat),
            XsdDatatype::Double(pat) | XsdDatatype::Float(pat) => {
                value.parse::<f64>().is_ok() && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::Duration(pat) => {
                DURATION_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::Date(pat) => {
                // DATE_RE fixes the calendar digits to the leading 10 bytes
                // (11 with a sign); chrono catches shapes that pass the
                // regex but aren't real calendar dates, e.g. 2021-02-30.
                let core_len = if value.starts_with('-') { 11 } else { 10 };
                let calendar = value.get(..core_len).unwrap_or(value);
                DATE_RE.is_match(value)
                    && chrono::NaiveDate::parse_from_str(calendar, "%Y-%m-%d").is_ok()
                    && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::DateTime(pat) => {
                DATETIME_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::Time(pat) => {
                TIME_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::GYear(pat) => {
                GYEAR_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::GYearMonth(pat) => {
                GYEARMONTH_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::GMonth(pat) => {
                GMONTH_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::GMonthDay(pat) => {
                GMONTHDAY_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
            XsdDatatype::GDay(pat) => {
                GDAY_RE.is_match(value) && pat.as_ref().is_none_or(|p| p.is_match(value))
            }
        }
    }

    fn canonical(&self, value: &str) -> String {
        match self {
            XsdDatatype::Token(_)
            | XsdDatatype::NmToken(_)
            | XsdDatatype::NmTokens(_)
            | XsdDatatype::NcName(_)
            | XsdDatatype::Name(_)
            | XsdDatatype::Id(_)
            | XsdDatatype::IdRef(_)
            | XsdDatatype::Entity(_)
            | XsdDatatype::Language
            | XsdDatatype::NormalizedString(_) => normalize_whitespace(value),
            XsdDatatype::Boolean => match value.trim() {
                "1" => "true".to_string(),
                "0" => "false".to_string(),
                other => other.to_string(),
            },
            XsdDatatype::Decimal(..) => bigdecimal::BigDecimal::from_str(value.trim())
                .map(|v| v.to_string())
                .unwrap_or_else(|_| value.to_string()),
            XsdDatatype::Integer(..) => value.trim().trim_start_matches('+').to_string(),
            _ => value.trim().to_string(),
        }
    }

    fn equal(&self, value: &str, other: &str, ctx: &dyn Namespaces) -> bool {
        if let XsdDatatype::QName = self {
            return match (
                QNameValue::resolve(value, ctx),
                QNameValue::resolve(other, ctx),
            ) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
        }
        !self.disallows(value) && !self.disallows(other) && self.canonical(value) == self.canonical(other)
    }
}

/// A resolved QName value: an expanded (namespace, local) pair. `equal`
/// compares these rather than the lexical prefix:local text, since two
/// different prefixes may be bound to the same namespace.
#[derive(PartialEq, Eq, Debug)]
struct QNameValue {
    namespace_uri: String,
    local_name: String,
}

impl QNameValue {
    fn resolve(value: &str, ctx: &dyn Namespaces) -> Option<QNameValue> {
        let value = value.trim();
        match value.split_once(':') {
            Some((prefix, local)) => {
                if !NCNAME_RE.is_match(prefix) || !NCNAME_RE.is_match(local) {
                    return None;
                }
                ctx.resolve(prefix).map(|ns| QNameValue {
                    namespace_uri: ns.to_string(),
                    local_name: local.to_string(),
                })
            }
            None => {
                if !NCNAME_RE.is_match(value) {
                    return None;
                }
                Some(QNameValue {
                    namespace_uri: ctx.resolve("").unwrap_or("").to_string(),
                    local_name: value.to_string(),
                })
            }
        }
    }
}

pub fn build(local_name: &str, params: &[(String, String)]) -> Result<Rc<dyn Datatype>, DatatypeError> {
    let len = || parse_length_facet(local_name, params);
    let pattern = || parse_pattern_facet(local_name, params);
    let mm = || parse_min_max_facet(local_name, params);

    let dt: XsdDatatype = match local_name {
        "string" => XsdDatatype::String(len()?),
        "normalizedString" => XsdDatatype::NormalizedString(len()?),
        "token" => XsdDatatype::Token(len()?),
        "NMTOKEN" => XsdDatatype::NmToken(len()?),
        "NMTOKENS" => XsdDatatype::NmTokens(len()?),
        "NCName" => XsdDatatype::NcName(len()?),
        "Name" => XsdDatatype::Name(len()?),
        "ID" => XsdDatatype::Id(len()?),
        "IDREF" => XsdDatatype::IdRef(len()?),
        "ENTITY" => XsdDatatype::Entity(len()?),
        "language" => XsdDatatype::Language,
        "boolean" => XsdDatatype::Boolean,
        "anyURI" => XsdDatatype::AnyUri,
        "QName" => XsdDatatype::QName,
        "decimal" => XsdDatatype::Decimal(mm()?, pattern()?),
        "integer" => XsdDatatype::Integer(mm()?, pattern()?),
        "int" => XsdDatatype::Int(mm()?, pattern()?),
        "long" => XsdDatatype::Long(mm()?, pattern()?),
        "short" => XsdDatatype::Short(mm()?, pattern()?),
        "byte" => XsdDatatype::Byte(mm()?, pattern()?),
        "nonNegativeInteger" => XsdDatatype::NonNegativeInteger(mm()?, pattern()?),
        "positiveInteger" => XsdDatatype::PositiveInteger(mm()?, pattern()?),
        "unsignedLong" => XsdDatatype::UnsignedLong(mm()?, pattern()?),
        "unsignedInt" => XsdDatatype::UnsignedInt(mm()?, pattern()?),
        "unsignedShort" => XsdDatatype::UnsignedShort(mm()?, pattern()?),
        "unsignedByte" => XsdDatatype::UnsignedByte(mm()?, pattern()?),
        "double" => XsdDatatype::Double(pattern()?),
        "float" => XsdDatatype::Float(pattern()?),
        "duration" => XsdDatatype::Duration(pattern()?),
        "date" => XsdDatatype::Date(pattern()?),
        "dateTime" => XsdDatatype::DateTime(pattern()?),
        "time" => XsdDatatype::Time(pattern()?),
        "gYear" => XsdDatatype::GYear(pattern()?),
        "gYearMonth" => XsdDatatype::GYearMonth(pattern()?),
        "gMonth" => XsdDatatype::GMonth(pattern()?),
        "gMonthDay" => XsdDatatype::GMonthDay(pattern()?),
        "gDay" => XsdDatatype::GDay(pattern()?),
        other => return Err(DatatypeError::UnknownDatatype(other.to_string())),
    };
    Ok(Rc::new(dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoNs;
    impl Namespaces for NoNs {
        fn resolve(&self, _p: &str) -> Option<&str> {
            None
        }
    }
    struct FooNs;
    impl Namespaces for FooNs {
        fn resolve(&self, p: &str) -> Option<&str> {
            if p == "f" { Some("urn:foo") } else { None }
        }
    }

    #[test]
    fn int_with_min_max() {
        let dt = build(
            "int",
            &[("minInclusive".into(), "0".into()), ("maxInclusive".into(), "10".into())],
        )
        .unwrap();
        assert!(!dt.disallows("5"));
        assert!(dt.disallows("-1"));
        assert!(dt.disallows("11"));
        assert!(dt.disallows("not a number"));
    }

    #[test]
    fn positive_integer_excludes_zero() {
        let dt = build("positiveInteger", &[]).unwrap();
        assert!(dt.disallows("0"));
        assert!(!dt.disallows("1"));
    }

    #[test]
    fn gyear_rejects_malformed() {
        let dt = build("gYear", &[]).unwrap();
        assert!(!dt.disallows("2012"));
        assert!(dt.disallows("not-a-year"));
    }

    #[test]
    fn pattern_facet_is_anchored() {
        let dt = build("string", &[("pattern".into(), "[a-z]+".into())]).unwrap();
        assert!(!dt.disallows("abc"));
        assert!(dt.disallows("abc123"));
    }

    #[test]
    fn qname_equal_resolves_prefixes() {
        let dt = build("QName", &[]).unwrap();
        assert!(dt.equal("f:bar", "f:bar", &FooNs));
        assert!(!dt.equal("f:bar", "g:bar", &NoNs));
    }

    #[test]
    fn nmtokens_length_counts_tokens() {
        let dt = build("NMTOKENS", &[("minLength".into(), "2".into())]).unwrap();
        assert!(dt.disallows("one"));
        assert!(!dt.disallows("one two"));
    }
}
