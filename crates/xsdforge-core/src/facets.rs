use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Built-in XSD primitive (or derived built-in) a simple type restricts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum PrimitiveType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "normalizedString")]
    NormalizedString,
    #[serde(rename = "token")]
    Token,
    #[serde(rename = "language")]
    Language,
    #[serde(rename = "Name")]
    Name,
    #[serde(rename = "NCName")]
    NcName,
    #[serde(rename = "NMTOKEN")]
    NmToken,
    #[serde(rename = "QName")]
    QName,
    #[serde(rename = "ID")]
    Id,
    #[serde(rename = "IDREF")]
    IdRef,
    #[serde(rename = "anyURI")]
    AnyUri,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "decimal")]
    Decimal,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "short")]
    Short,
    #[serde(rename = "byte")]
    Byte,
    #[serde(rename = "nonNegativeInteger")]
    NonNegativeInteger,
    #[serde(rename = "positiveInteger")]
    PositiveInteger,
    #[serde(rename = "nonPositiveInteger")]
    NonPositiveInteger,
    #[serde(rename = "negativeInteger")]
    NegativeInteger,
    #[serde(rename = "unsignedLong")]
    UnsignedLong,
    #[serde(rename = "unsignedInt")]
    UnsignedInt,
    #[serde(rename = "unsignedShort")]
    UnsignedShort,
    #[serde(rename = "unsignedByte")]
    UnsignedByte,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "double")]
    Double,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "dateTime")]
    DateTime,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "gYear")]
    GYear,
    #[serde(rename = "gYearMonth")]
    GYearMonth,
    #[serde(rename = "duration")]
    Duration,
    #[serde(rename = "base64Binary")]
    Base64Binary,
    #[serde(rename = "hexBinary")]
    HexBinary,
}

const BUILTINS: &[(&str, PrimitiveType)] = &[
    ("string", PrimitiveType::String),
    ("normalizedString", PrimitiveType::NormalizedString),
    ("token", PrimitiveType::Token),
    ("language", PrimitiveType::Language),
    ("Name", PrimitiveType::Name),
    ("NCName", PrimitiveType::NcName),
    ("NMTOKEN", PrimitiveType::NmToken),
    ("QName", PrimitiveType::QName),
    ("ID", PrimitiveType::Id),
    ("IDREF", PrimitiveType::IdRef),
    ("anyURI", PrimitiveType::AnyUri),
    ("boolean", PrimitiveType::Boolean),
    ("decimal", PrimitiveType::Decimal),
    ("integer", PrimitiveType::Integer),
    ("long", PrimitiveType::Long),
    ("int", PrimitiveType::Int),
    ("short", PrimitiveType::Short),
    ("byte", PrimitiveType::Byte),
    ("nonNegativeInteger", PrimitiveType::NonNegativeInteger),
    ("positiveInteger", PrimitiveType::PositiveInteger),
    ("nonPositiveInteger", PrimitiveType::NonPositiveInteger),
    ("negativeInteger", PrimitiveType::NegativeInteger),
    ("unsignedLong", PrimitiveType::UnsignedLong),
    ("unsignedInt", PrimitiveType::UnsignedInt),
    ("unsignedShort", PrimitiveType::UnsignedShort),
    ("unsignedByte", PrimitiveType::UnsignedByte),
    ("float", PrimitiveType::Float),
    ("double", PrimitiveType::Double),
    ("date", PrimitiveType::Date),
    ("dateTime", PrimitiveType::DateTime),
    ("time", PrimitiveType::Time),
    ("gYear", PrimitiveType::GYear),
    ("gYearMonth", PrimitiveType::GYearMonth),
    ("duration", PrimitiveType::Duration),
    ("base64Binary", PrimitiveType::Base64Binary),
    ("hexBinary", PrimitiveType::HexBinary),
];

impl PrimitiveType {
    /// Resolve a built-in type name, accepting `xs:`/`xsd:` prefixes.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let local = match name.split_once(':') {
            Some((prefix, local)) if prefix == "xs" || prefix == "xsd" => local,
            Some(_) => return None,
            None => name,
        };
        BUILTINS
            .iter()
            .find(|(builtin, _)| *builtin == local)
            .map(|(_, primitive)| *primitive)
    }

    pub fn xsd_name(&self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, primitive)| primitive == self)
            .map(|(name, _)| *name)
            .unwrap_or("string")
    }

    pub fn is_integer(&self) -> bool {
        self.integer_range().is_some()
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                PrimitiveType::Decimal | PrimitiveType::Float | PrimitiveType::Double
            )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            PrimitiveType::Date
                | PrimitiveType::DateTime
                | PrimitiveType::Time
                | PrimitiveType::GYear
                | PrimitiveType::GYearMonth
        )
    }

    /// String-like types where free text (and realistic data) is acceptable.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            PrimitiveType::String | PrimitiveType::NormalizedString | PrimitiveType::Token
        )
    }

    /// Lexical value range of integer built-ins.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            PrimitiveType::Integer => (i64::MIN as i128, i64::MAX as i128),
            PrimitiveType::Long => (i64::MIN as i128, i64::MAX as i128),
            PrimitiveType::Int => (i32::MIN as i128, i32::MAX as i128),
            PrimitiveType::Short => (i16::MIN as i128, i16::MAX as i128),
            PrimitiveType::Byte => (i8::MIN as i128, i8::MAX as i128),
            PrimitiveType::NonNegativeInteger => (0, i64::MAX as i128),
            PrimitiveType::PositiveInteger => (1, i64::MAX as i128),
            PrimitiveType::NonPositiveInteger => (i64::MIN as i128, 0),
            PrimitiveType::NegativeInteger => (i64::MIN as i128, -1),
            PrimitiveType::UnsignedLong => (0, u64::MAX as i128),
            PrimitiveType::UnsignedInt => (0, u32::MAX as i128),
            PrimitiveType::UnsignedShort => (0, u16::MAX as i128),
            PrimitiveType::UnsignedByte => (0, u8::MAX as i128),
            _ => return None,
        };
        Some(range)
    }
}

/// XSD constraints on a simple type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct SimpleTypeFacets {
    pub base: PrimitiveType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    /// Numeric or temporal bounds, kept in lexical form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_inclusive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inclusive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_exclusive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_exclusive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_digits: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_digits: Option<u32>,
}

impl SimpleTypeFacets {
    pub fn new(base: PrimitiveType) -> Self {
        Self {
            base,
            pattern: None,
            enumeration: Vec::new(),
            length: None,
            min_length: None,
            max_length: None,
            min_inclusive: None,
            max_inclusive: None,
            min_exclusive: None,
            max_exclusive: None,
            total_digits: None,
            fraction_digits: None,
        }
    }

    /// True when no facet narrows the base type.
    pub fn is_unrestricted(&self) -> bool {
        self.pattern.is_none()
            && self.enumeration.is_empty()
            && self.length.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
            && self.min_inclusive.is_none()
            && self.max_inclusive.is_none()
            && self.min_exclusive.is_none()
            && self.max_exclusive.is_none()
            && self.total_digits.is_none()
            && self.fraction_digits.is_none()
    }

    /// Effective `(min, max)` length bounds; `length` pins both.
    pub fn length_bounds(&self) -> (Option<u32>, Option<u32>) {
        if let Some(length) = self.length {
            return (Some(length), Some(length));
        }
        (self.min_length, self.max_length)
    }
}
