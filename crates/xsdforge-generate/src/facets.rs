use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use xsdforge_core::{PrimitiveType, SimpleTypeFacets};

/// Compiled pattern facets, shared by checks and generators.
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: HashMap<String, Option<Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchored regex for an XSD pattern; `None` when it does not compile.
    pub fn get(&mut self, pattern: &str) -> Option<&Regex> {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(&format!("^(?:{pattern})$")).ok())
            .as_ref()
    }
}

/// Check a lexical value against a simple type. The error names the first
/// facet that fails.
pub fn check_value(
    value: &str,
    facets: &SimpleTypeFacets,
    patterns: &mut PatternCache,
) -> Result<(), String> {
    check_lexical(value, facets.base)?;

    if !facets.enumeration.is_empty() && !facets.enumeration.iter().any(|item| item == value) {
        return Err(format!("'{value}' is not one of the enumerated values"));
    }

    let (min_len, max_len) = facets.length_bounds();
    let length = value_length(value, facets.base);
    if let Some(min) = min_len
        && length < min as usize
    {
        return Err(format!("length {length} is below minimum {min}"));
    }
    if let Some(max) = max_len
        && length > max as usize
    {
        return Err(format!("length {length} exceeds maximum {max}"));
    }

    if let Some(pattern) = facets.pattern.as_deref()
        && let Some(regex) = patterns.get(pattern)
        && !regex.is_match(value)
    {
        return Err(format!("'{value}' does not match pattern '{pattern}'"));
    }

    check_bounds(value, facets)?;
    check_digits(value, facets)?;
    Ok(())
}

/// Octets for binary types, characters otherwise.
fn value_length(value: &str, base: PrimitiveType) -> usize {
    match base {
        PrimitiveType::HexBinary => value.len() / 2,
        PrimitiveType::Base64Binary => BASE64.decode(value).map(|bytes| bytes.len()).unwrap_or(0),
        _ => value.chars().count(),
    }
}

fn check_lexical(value: &str, base: PrimitiveType) -> Result<(), String> {
    let ok = match base {
        PrimitiveType::Boolean => matches!(value, "true" | "false" | "1" | "0"),
        PrimitiveType::Decimal => parse_decimal(value).is_some(),
        PrimitiveType::Float | PrimitiveType::Double => {
            value.parse::<f64>().is_ok() || matches!(value, "INF" | "-INF" | "NaN")
        }
        PrimitiveType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        PrimitiveType::DateTime => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
            || chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        PrimitiveType::Time => NaiveTime::parse_from_str(value, "%H:%M:%S").is_ok(),
        PrimitiveType::GYear => value.len() >= 4 && value.parse::<i32>().is_ok(),
        PrimitiveType::GYearMonth => NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok(),
        PrimitiveType::Duration => is_duration(value),
        PrimitiveType::HexBinary => value.len() % 2 == 0 && hex::decode(value).is_ok(),
        PrimitiveType::Base64Binary => BASE64.decode(value).is_ok(),
        PrimitiveType::Language => is_language(value),
        PrimitiveType::NcName | PrimitiveType::Id | PrimitiveType::IdRef => is_ncname(value),
        PrimitiveType::Name => is_name(value),
        PrimitiveType::QName => match value.split_once(':') {
            Some((prefix, local)) => is_ncname(prefix) && is_ncname(local),
            None => is_ncname(value),
        },
        PrimitiveType::NmToken => {
            !value.is_empty() && value.chars().all(|ch| ch.is_alphanumeric() || "._-:".contains(ch))
        }
        PrimitiveType::Token => value.trim() == value && !value.contains("  ") && !has_control_ws(value),
        PrimitiveType::NormalizedString => !has_control_ws(value),
        PrimitiveType::AnyUri => !value.contains(char::is_whitespace),
        PrimitiveType::String => true,
        integer => match integer.integer_range() {
            Some((min, max)) => value
                .parse::<i128>()
                .is_ok_and(|number| number >= min && number <= max),
            None => true,
        },
    };
    if ok {
        Ok(())
    } else {
        Err(format!("'{value}' is not a valid {}", base.xsd_name()))
    }
}

fn check_bounds(value: &str, facets: &SimpleTypeFacets) -> Result<(), String> {
    let bounds = [
        (facets.min_inclusive.as_deref(), "minInclusive"),
        (facets.max_inclusive.as_deref(), "maxInclusive"),
        (facets.min_exclusive.as_deref(), "minExclusive"),
        (facets.max_exclusive.as_deref(), "maxExclusive"),
    ];
    for (bound, facet) in bounds {
        let Some(bound) = bound else {
            continue;
        };
        let Some(ordering) = compare_ordered(value, bound, facets.base) else {
            continue;
        };
        let ok = match facet {
            "minInclusive" => ordering.is_ge(),
            "maxInclusive" => ordering.is_le(),
            "minExclusive" => ordering.is_gt(),
            _ => ordering.is_lt(),
        };
        if !ok {
            return Err(format!("'{value}' violates {facet} {bound}"));
        }
    }
    Ok(())
}

/// Ordering of two lexical values of an ordered type.
pub fn compare_ordered(a: &str, b: &str, base: PrimitiveType) -> Option<std::cmp::Ordering> {
    if base.is_numeric() {
        let a = a.parse::<f64>().ok()?;
        let b = b.parse::<f64>().ok()?;
        return a.partial_cmp(&b);
    }
    if base.is_temporal() {
        // ISO forms of the same type order lexically.
        return Some(a.cmp(b));
    }
    None
}

fn check_digits(value: &str, facets: &SimpleTypeFacets) -> Result<(), String> {
    if facets.total_digits.is_none() && facets.fraction_digits.is_none() {
        return Ok(());
    }
    let Some((integral, fractional)) = parse_decimal(value) else {
        return Ok(());
    };
    let integral = integral.trim_start_matches('0');
    let fractional = fractional.trim_end_matches('0');
    if let Some(limit) = facets.fraction_digits
        && fractional.len() > limit as usize
    {
        return Err(format!("'{value}' has more than {limit} fraction digits"));
    }
    if let Some(limit) = facets.total_digits
        && integral.len() + fractional.len() > limit as usize
    {
        return Err(format!("'{value}' has more than {limit} total digits"));
    }
    Ok(())
}

/// Split a decimal lexical into unsigned integral and fractional digits.
fn parse_decimal(value: &str) -> Option<(&str, &str)> {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (integral, fractional) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = |part: &str| part.chars().all(|ch| ch.is_ascii_digit());
    if (integral.is_empty() && fractional.is_empty()) || !digits(integral) || !digits(fractional) {
        return None;
    }
    Some((integral, fractional))
}

fn has_control_ws(value: &str) -> bool {
    value.contains(['\t', '\n', '\r'])
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

fn is_ncname(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(is_name_start) && chars.all(is_name_char)
}

fn is_name(value: &str) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|ch| is_name_start(ch) || ch == ':')
        && chars.all(|ch| is_name_char(ch) || ch == ':')
}

fn is_language(value: &str) -> bool {
    let mut parts = value.split('-');
    let primary_ok = parts
        .next()
        .is_some_and(|part| (1..=8).contains(&part.len()) && part.chars().all(|ch| ch.is_ascii_alphabetic()));
    primary_ok
        && parts.all(|part| (1..=8).contains(&part.len()) && part.chars().all(|ch| ch.is_ascii_alphanumeric()))
}

fn is_duration(value: &str) -> bool {
    let body = value.strip_prefix('-').unwrap_or(value);
    let Some(body) = body.strip_prefix('P') else {
        return false;
    };
    if body.is_empty() || body.ends_with('T') {
        return false;
    }
    let (date, time) = body.split_once('T').unwrap_or((body, ""));
    designators_ok(date, "YMD") && designators_ok(time, "HMS")
}

fn designators_ok(part: &str, order: &str) -> bool {
    let mut allowed = order.chars();
    let mut digits = String::new();
    for ch in part.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            digits.push(ch);
            continue;
        }
        if digits.is_empty() || !allowed.by_ref().any(|designator| designator == ch) {
            return false;
        }
        digits.clear();
    }
    digits.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facets(base: PrimitiveType) -> SimpleTypeFacets {
        SimpleTypeFacets::new(base)
    }

    #[test]
    fn checks_pattern_and_length() {
        let mut cache = PatternCache::new();
        let mut code = facets(PrimitiveType::String);
        code.pattern = Some("BK[0-9]{6}".to_string());
        assert!(check_value("BK123456", &code, &mut cache).is_ok());
        assert!(check_value("xBK123456", &code, &mut cache).is_err());

        let mut city = facets(PrimitiveType::String);
        city.min_length = Some(2);
        city.max_length = Some(4);
        assert!(check_value("Rome", &city, &mut cache).is_ok());
        assert!(check_value("Lisbon", &city, &mut cache).is_err());
    }

    #[test]
    fn checks_numeric_bounds_and_digits() {
        let mut cache = PatternCache::new();
        let mut price = facets(PrimitiveType::Decimal);
        price.min_inclusive = Some("50".to_string());
        price.max_exclusive = Some("5000".to_string());
        price.fraction_digits = Some(2);
        assert!(check_value("50.00", &price, &mut cache).is_ok());
        assert!(check_value("49.99", &price, &mut cache).is_err());
        assert!(check_value("5000", &price, &mut cache).is_err());
        assert!(check_value("99.999", &price, &mut cache).is_err());
        assert!(check_value("abc", &price, &mut cache).is_err());
    }

    #[test]
    fn checks_integer_range_of_base() {
        let mut cache = PatternCache::new();
        assert!(check_value("255", &facets(PrimitiveType::UnsignedByte), &mut cache).is_ok());
        assert!(check_value("256", &facets(PrimitiveType::UnsignedByte), &mut cache).is_err());
        assert!(check_value("0", &facets(PrimitiveType::PositiveInteger), &mut cache).is_err());
    }

    #[test]
    fn checks_temporal_and_binary_lexicals() {
        let mut cache = PatternCache::new();
        assert!(check_value("2024-02-29", &facets(PrimitiveType::Date), &mut cache).is_ok());
        assert!(check_value("2023-02-29", &facets(PrimitiveType::Date), &mut cache).is_err());
        assert!(check_value("2025-07", &facets(PrimitiveType::GYearMonth), &mut cache).is_ok());
        assert!(check_value("P1Y2M3DT4H", &facets(PrimitiveType::Duration), &mut cache).is_ok());
        assert!(check_value("P1H", &facets(PrimitiveType::Duration), &mut cache).is_err());

        let mut hex = facets(PrimitiveType::HexBinary);
        hex.length = Some(2);
        assert!(check_value("0aff", &hex, &mut cache).is_ok());
        assert!(check_value("0a", &hex, &mut cache).is_err());
    }

    #[test]
    fn enumeration_is_exact() {
        let mut cache = PatternCache::new();
        let mut class = facets(PrimitiveType::String);
        class.enumeration = vec!["Economy".to_string(), "First".to_string()];
        assert!(check_value("First", &class, &mut cache).is_ok());
        assert!(check_value("first", &class, &mut cache).is_err());
    }

    #[test]
    fn uncompilable_pattern_is_skipped() {
        let mut cache = PatternCache::new();
        let mut odd = facets(PrimitiveType::String);
        odd.pattern = Some("\\p{IsBasicLatin}+(".to_string());
        assert!(check_value("anything", &odd, &mut cache).is_ok());
    }
}
