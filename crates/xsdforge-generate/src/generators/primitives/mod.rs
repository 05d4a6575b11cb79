use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::{Rng, RngCore};
use rand_regex::Regex as RandRegex;
use xsdforge_core::SimpleTypeFacets;

use crate::errors::GenerationError;
use crate::generators::{GeneratorContext, GeneratorRegistry, TypeGenerator};

const DEFAULT_INT_MIN: i128 = 0;
const DEFAULT_INT_MAX: i128 = 10000;
const DEFAULT_TEXT_MIN: u32 = 4;
const DEFAULT_TEXT_SPAN: u32 = 8;
const MAX_TEXT_SPAN: u32 = 32;
const DEFAULT_BINARY_OCTETS: u32 = 12;
const DEFAULT_MAX_REPEAT: u32 = 16;
const DATE_WINDOW_DAYS: i64 = 365;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LANGUAGES: &[&str] = &["en", "en-US", "en-GB", "pt-BR", "de", "fr-FR", "es"];

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(StringGenerator));
    registry.register_generator(Box::new(IntegerGenerator));
    registry.register_generator(Box::new(NumberGenerator {
        id: "primitive.decimal",
    }));
    registry.register_generator(Box::new(NumberGenerator {
        id: "primitive.float",
    }));
    registry.register_generator(Box::new(BooleanGenerator));
    registry.register_generator(Box::new(DateGenerator));
    registry.register_generator(Box::new(DateTimeGenerator));
    registry.register_generator(Box::new(TimeGenerator));
    registry.register_generator(Box::new(GYearGenerator));
    registry.register_generator(Box::new(GYearMonthGenerator));
    registry.register_generator(Box::new(DurationGenerator));
    registry.register_generator(Box::new(UriGenerator));
    registry.register_generator(Box::new(LanguageGenerator));
    registry.register_generator(Box::new(NcNameGenerator {
        id: "primitive.ncname",
    }));
    registry.register_generator(Box::new(NcNameGenerator {
        id: "primitive.qname",
    }));
    registry.register_generator(Box::new(BinaryGenerator {
        id: "primitive.base64",
    }));
    registry.register_generator(Box::new(BinaryGenerator { id: "primitive.hex" }));
    registry.register_generator(Box::new(EnumerationGenerator));
    registry.register_generator(Box::new(PatternGenerator));
}

struct StringGenerator;

impl TypeGenerator for StringGenerator {
    fn id(&self) -> &'static str {
        "primitive.string"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let (min, max) = text_length_range(ctx.facets);
        let len = rng.random_range(min..=max) as usize;
        Ok(random_chars(len, rng))
    }
}

/// Inclusive length range for generated text.
pub(crate) fn text_length_range(facets: &SimpleTypeFacets) -> (u32, u32) {
    match facets.length_bounds() {
        (Some(min), Some(max)) => (min.min(max), max),
        (Some(min), None) => (min, min.saturating_add(DEFAULT_TEXT_SPAN)),
        (None, Some(max)) => (DEFAULT_TEXT_MIN.min(max), max.min(DEFAULT_TEXT_MIN + MAX_TEXT_SPAN)),
        (None, None) => (DEFAULT_TEXT_MIN, DEFAULT_TEXT_MIN + DEFAULT_TEXT_SPAN),
    }
}

fn random_chars(len: usize, rng: &mut dyn RngCore) -> String {
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

struct IntegerGenerator;

impl TypeGenerator for IntegerGenerator {
    fn id(&self) -> &'static str {
        "primitive.integer"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let (min, max) = integer_range(ctx.facets)?;
        Ok(rng.random_range(min..=max).to_string())
    }
}

fn integer_range(facets: &SimpleTypeFacets) -> Result<(i128, i128), GenerationError> {
    let (mut lo, mut hi) = facets
        .base
        .integer_range()
        .unwrap_or((i64::MIN as i128, i64::MAX as i128));

    let lower = bound_f64(facets.min_inclusive.as_deref())
        .map(|value| value.ceil() as i128)
        .into_iter()
        .chain(bound_f64(facets.min_exclusive.as_deref()).map(|value| value.floor() as i128 + 1))
        .max();
    let upper = bound_f64(facets.max_inclusive.as_deref())
        .map(|value| value.floor() as i128)
        .into_iter()
        .chain(bound_f64(facets.max_exclusive.as_deref()).map(|value| value.ceil() as i128 - 1))
        .min();

    if let Some(lower) = lower {
        lo = lo.max(lower);
    }
    if let Some(upper) = upper {
        hi = hi.min(upper);
    }
    if let Some(digits) = facets.total_digits {
        let limit = 10i128.saturating_pow(digits.min(30)) - 1;
        lo = lo.max(-limit);
        hi = hi.min(limit);
    }

    // Narrow unbounded sides to a readable window.
    match (lower.is_some(), upper.is_some()) {
        (true, false) => hi = hi.min(lo.saturating_add(DEFAULT_INT_MAX)),
        (false, true) => lo = lo.max(hi.saturating_sub(DEFAULT_INT_MAX)),
        (false, false) => {
            let window = (lo.max(DEFAULT_INT_MIN), hi.min(DEFAULT_INT_MAX));
            if window.0 <= window.1 {
                (lo, hi) = window;
            } else {
                lo = lo.max(hi.saturating_sub(DEFAULT_INT_MAX));
            }
        }
        (true, true) => {}
    }

    if lo > hi {
        return Err(unsatisfiable(facets, "empty integer range"));
    }
    Ok((lo, hi))
}

struct NumberGenerator {
    id: &'static str,
}

impl TypeGenerator for NumberGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let facets = ctx.facets;
        let scale = facets.fraction_digits.unwrap_or(2).min(6) as usize;
        let step = 10f64.powi(-(scale as i32));

        let mut lo = bound_f64(facets.min_inclusive.as_deref())
            .or_else(|| bound_f64(facets.min_exclusive.as_deref()).map(|value| value + step));
        let mut hi = bound_f64(facets.max_inclusive.as_deref())
            .or_else(|| bound_f64(facets.max_exclusive.as_deref()).map(|value| value - step));
        if let Some(digits) = facets.total_digits {
            let integral = digits.saturating_sub(scale as u32).min(15) as i32;
            let limit = 10f64.powi(integral) - step;
            lo = Some(lo.map_or(-limit, |value| value.max(-limit)));
            hi = Some(hi.map_or(limit, |value| value.min(limit)));
        }
        let (lo, hi) = match (lo, hi) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo + DEFAULT_INT_MAX as f64),
            (None, Some(hi)) if hi >= 0.0 => (0.0, hi),
            (None, Some(hi)) => (hi - DEFAULT_INT_MAX as f64, hi),
            (None, None) => (DEFAULT_INT_MIN as f64, DEFAULT_INT_MAX as f64),
        };
        if lo > hi {
            return Err(unsatisfiable(facets, "empty numeric range"));
        }

        let raw = if lo == hi { lo } else { rng.random_range(lo..=hi) };
        let factor = 10f64.powi(scale as i32);
        // Round inward so the value stays inside [lo, hi].
        let mut value = (raw * factor).round() / factor;
        if value < lo {
            value = (lo * factor).ceil() / factor;
        }
        if value > hi {
            value = (hi * factor).floor() / factor;
        }
        Ok(format!("{value:.scale$}"))
    }
}

struct BooleanGenerator;

impl TypeGenerator for BooleanGenerator {
    fn id(&self) -> &'static str {
        "primitive.boolean"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        Ok(rng.random_bool(0.5).to_string())
    }
}

struct DateGenerator;

impl TypeGenerator for DateGenerator {
    fn id(&self) -> &'static str {
        "primitive.date"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let (min, max) = date_range(ctx.facets, ctx.base_date, |text| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
        })?;
        let offset = rng.random_range(0..=(max - min).num_days());
        Ok((min + Duration::days(offset)).format("%Y-%m-%d").to_string())
    }
}

struct DateTimeGenerator;

impl TypeGenerator for DateTimeGenerator {
    fn id(&self) -> &'static str {
        "primitive.datetime"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let parse = |text: &str| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").ok();
        let base = ctx.base_date.and_time(NaiveTime::default());
        let facets = ctx.facets;
        let min = facets
            .min_inclusive
            .as_deref()
            .and_then(parse)
            .or_else(|| facets.min_exclusive.as_deref().and_then(parse).map(|v| v + Duration::seconds(1)))
            .unwrap_or(base - Duration::days(DATE_WINDOW_DAYS));
        let max = facets
            .max_inclusive
            .as_deref()
            .and_then(parse)
            .or_else(|| facets.max_exclusive.as_deref().and_then(parse).map(|v| v - Duration::seconds(1)))
            .unwrap_or(base + Duration::days(DATE_WINDOW_DAYS));
        if min > max {
            return Err(unsatisfiable(facets, "empty dateTime range"));
        }
        let offset = rng.random_range(0..=(max - min).num_seconds());
        Ok((min + Duration::seconds(offset))
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string())
    }
}

struct TimeGenerator;

impl TypeGenerator for TimeGenerator {
    fn id(&self) -> &'static str {
        "primitive.time"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let parse = |text: Option<&str>| {
            text.and_then(|text| NaiveTime::parse_from_str(text, "%H:%M:%S").ok())
                .map(|time| time.num_seconds_from_midnight())
        };
        let facets = ctx.facets;
        let min = parse(facets.min_inclusive.as_deref())
            .or_else(|| parse(facets.min_exclusive.as_deref()).map(|s| s + 1))
            .unwrap_or(0);
        let max = parse(facets.max_inclusive.as_deref())
            .or_else(|| parse(facets.max_exclusive.as_deref()).map(|s| s.saturating_sub(1)))
            .unwrap_or(86_399);
        if min > max {
            return Err(unsatisfiable(facets, "empty time range"));
        }
        let seconds = rng.random_range(min..=max);
        Ok(format!(
            "{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds % 3600) / 60,
            seconds % 60
        ))
    }
}

struct GYearGenerator;

impl TypeGenerator for GYearGenerator {
    fn id(&self) -> &'static str {
        "primitive.gyear"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let year = ctx.base_date.year();
        let facets = ctx.facets;
        let parse = |text: Option<&str>| text.and_then(|text| text.parse::<i32>().ok());
        let min = parse(facets.min_inclusive.as_deref())
            .or_else(|| parse(facets.min_exclusive.as_deref()).map(|y| y + 1))
            .unwrap_or(year - 5);
        let max = parse(facets.max_inclusive.as_deref())
            .or_else(|| parse(facets.max_exclusive.as_deref()).map(|y| y - 1))
            .unwrap_or(year + 5);
        if min > max {
            return Err(unsatisfiable(facets, "empty gYear range"));
        }
        Ok(format!("{:04}", rng.random_range(min..=max)))
    }
}

struct GYearMonthGenerator;

impl TypeGenerator for GYearMonthGenerator {
    fn id(&self) -> &'static str {
        "primitive.gyearmonth"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let (min, max) = date_range(ctx.facets, ctx.base_date, |text| {
            NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok()
        })?;
        let months = |date: NaiveDate| date.year() * 12 + date.month0() as i32;
        let pick = rng.random_range(months(min)..=months(max));
        Ok(format!("{:04}-{:02}", pick.div_euclid(12), pick.rem_euclid(12) + 1))
    }
}

struct DurationGenerator;

impl TypeGenerator for DurationGenerator {
    fn id(&self) -> &'static str {
        "primitive.duration"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let days = rng.random_range(0..=30u32);
        let hours = rng.random_range(0..=23u32);
        let minutes = rng.random_range(0..=59u32);
        Ok(format!("P{days}DT{hours}H{minutes}M"))
    }
}

struct UriGenerator;

impl TypeGenerator for UriGenerator {
    fn id(&self) -> &'static str {
        "primitive.uri"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let segment = random_chars(8, rng).to_lowercase();
        Ok(format!("https://example.com/{segment}"))
    }
}

struct LanguageGenerator;

impl TypeGenerator for LanguageGenerator {
    fn id(&self) -> &'static str {
        "primitive.language"
    }

    fn generate(
        &self,
        _ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        Ok(LANGUAGES[rng.random_range(0..LANGUAGES.len())].to_string())
    }
}

/// Identifier-like names; also used for IDs, so the suffix is random.
struct NcNameGenerator {
    id: &'static str,
}

impl TypeGenerator for NcNameGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let stem: String = ctx
            .name
            .trim_start_matches('@')
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .take(12)
            .collect::<String>()
            .to_lowercase();
        let stem = match stem.chars().next() {
            Some(first) if first.is_ascii_alphabetic() => stem,
            _ => format!("n{stem}"),
        };
        Ok(format!("{stem}-{:08x}", rng.next_u32()))
    }
}

struct BinaryGenerator {
    id: &'static str,
}

impl TypeGenerator for BinaryGenerator {
    fn id(&self) -> &'static str {
        self.id
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let octets = match ctx.facets.length_bounds() {
            (Some(min), Some(max)) => rng.random_range(min.min(max)..=max),
            (Some(min), None) => min.max(1),
            (None, Some(max)) => DEFAULT_BINARY_OCTETS.min(max),
            (None, None) => DEFAULT_BINARY_OCTETS,
        };
        let mut bytes = vec![0u8; octets as usize];
        rng.fill_bytes(&mut bytes);
        if self.id == "primitive.hex" {
            Ok(hex::encode_upper(bytes))
        } else {
            Ok(BASE64.encode(bytes))
        }
    }
}

struct EnumerationGenerator;

impl TypeGenerator for EnumerationGenerator {
    fn id(&self) -> &'static str {
        "primitive.enumeration"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let values = &ctx.facets.enumeration;
        if values.is_empty() {
            return Err(unsatisfiable(ctx.facets, "empty enumeration"));
        }
        Ok(values[rng.random_range(0..values.len())].clone())
    }
}

struct PatternGenerator;

impl TypeGenerator for PatternGenerator {
    fn id(&self) -> &'static str {
        "primitive.pattern"
    }

    fn generate(
        &self,
        ctx: &GeneratorContext<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<String, GenerationError> {
        let pattern = ctx.facets.pattern.as_deref().unwrap_or_default();
        let regex = RandRegex::compile(pattern, DEFAULT_MAX_REPEAT).map_err(|err| {
            GenerationError::Schema(xsdforge_core::Error::Unsupported(format!(
                "pattern '{pattern}' on '{}': {err}",
                ctx.path
            )))
        })?;
        let value: String = rng.sample(&regex);
        Ok(value)
    }
}

fn bound_f64(text: Option<&str>) -> Option<f64> {
    text.and_then(|text| text.trim().parse::<f64>().ok())
}

fn date_range(
    facets: &SimpleTypeFacets,
    base: NaiveDate,
    parse: impl Fn(&str) -> Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate), GenerationError> {
    let bound = |text: Option<&str>| text.and_then(&parse);
    let min = bound(facets.min_inclusive.as_deref())
        .or_else(|| bound(facets.min_exclusive.as_deref()).map(|date| date + Duration::days(1)))
        .unwrap_or(base - Duration::days(DATE_WINDOW_DAYS));
    let max = bound(facets.max_inclusive.as_deref())
        .or_else(|| bound(facets.max_exclusive.as_deref()).map(|date| date - Duration::days(1)))
        .unwrap_or(base + Duration::days(DATE_WINDOW_DAYS));
    if min > max {
        return Err(unsatisfiable(facets, "empty date range"));
    }
    Ok((min, max))
}

fn unsatisfiable(facets: &SimpleTypeFacets, message: &str) -> GenerationError {
    GenerationError::Schema(xsdforge_core::Error::Unsupported(format!(
        "{message} for {} facets",
        facets.base.xsd_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facets::{PatternCache, check_value};
    use xsdforge_core::PrimitiveType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generate_many(id: &str, facets: &SimpleTypeFacets, count: usize) -> Vec<String> {
        let registry = GeneratorRegistry::new();
        let generator = registry.get(id).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let ctx = GeneratorContext {
            name: "Value",
            path: "Root/Value",
            facets,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        (0..count)
            .map(|_| generator.generate(&ctx, &mut rng).unwrap())
            .collect()
    }

    fn assert_all_valid(values: &[String], facets: &SimpleTypeFacets) {
        let mut cache = PatternCache::new();
        for value in values {
            assert!(
                check_value(value, facets, &mut cache).is_ok(),
                "{value} should satisfy {facets:?}"
            );
        }
    }

    #[test]
    fn integers_respect_exclusive_bounds() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::Int);
        facets.min_exclusive = Some("10".to_string());
        facets.max_exclusive = Some("13".to_string());
        let values = generate_many("primitive.integer", &facets, 50);
        assert!(values.iter().all(|v| v == "11" || v == "12"));
    }

    #[test]
    fn negative_integers_stay_negative() {
        let facets = SimpleTypeFacets::new(PrimitiveType::NegativeInteger);
        let values = generate_many("primitive.integer", &facets, 50);
        assert_all_valid(&values, &facets);
    }

    #[test]
    fn decimals_respect_scale_and_bounds() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::Decimal);
        facets.min_inclusive = Some("50".to_string());
        facets.max_inclusive = Some("5000".to_string());
        facets.fraction_digits = Some(2);
        facets.total_digits = Some(6);
        let values = generate_many("primitive.decimal", &facets, 100);
        assert_all_valid(&values, &facets);
    }

    #[test]
    fn text_respects_length_bounds() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::String);
        facets.min_length = Some(2);
        facets.max_length = Some(3);
        let values = generate_many("primitive.string", &facets, 50);
        assert!(values.iter().all(|v| (2..=3).contains(&v.len())));
    }

    #[test]
    fn patterns_generate_matching_values() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::String);
        facets.pattern = Some("[A-Z]{2}[0-9]{3,4}".to_string());
        let values = generate_many("primitive.pattern", &facets, 50);
        assert_all_valid(&values, &facets);
    }

    #[test]
    fn temporal_values_are_lexically_valid() {
        for (id, base) in [
            ("primitive.date", PrimitiveType::Date),
            ("primitive.datetime", PrimitiveType::DateTime),
            ("primitive.time", PrimitiveType::Time),
            ("primitive.gyear", PrimitiveType::GYear),
            ("primitive.gyearmonth", PrimitiveType::GYearMonth),
            ("primitive.duration", PrimitiveType::Duration),
        ] {
            let facets = SimpleTypeFacets::new(base);
            let values = generate_many(id, &facets, 20);
            assert_all_valid(&values, &facets);
        }
    }

    #[test]
    fn date_bounds_are_honored() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::Date);
        facets.min_inclusive = Some("2030-05-01".to_string());
        facets.max_exclusive = Some("2030-05-04".to_string());
        let values = generate_many("primitive.date", &facets, 30);
        assert!(values
            .iter()
            .all(|v| v.as_str() >= "2030-05-01" && v.as_str() <= "2030-05-03"));
    }

    #[test]
    fn binary_lengths_count_octets() {
        let mut facets = SimpleTypeFacets::new(PrimitiveType::HexBinary);
        facets.length = Some(4);
        let values = generate_many("primitive.hex", &facets, 5);
        assert!(values.iter().all(|v| v.len() == 8));
        assert_all_valid(&values, &facets);

        let facets = SimpleTypeFacets::new(PrimitiveType::Base64Binary);
        assert_all_valid(&generate_many("primitive.base64", &facets, 5), &facets);
    }

    #[test]
    fn identifiers_are_ncnames() {
        let facets = SimpleTypeFacets::new(PrimitiveType::Id);
        assert_all_valid(&generate_many("primitive.ncname", &facets, 10), &facets);
    }
}
