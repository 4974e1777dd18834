use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::SchemaValueError;

// ============================================================================
// ENGINE DEFAULTS
// ============================================================================
// Values the engine assigns when a mapping leaves an attribute out. They are
// filled into comparisons so that an omitted attribute on one side does not
// read as a difference.

/// Format the engine assigns to date fields that do not declare one.
pub const DEFAULT_DATE_FORMAT: &str = "strict_date_optional_time||epoch_millis";

/// Name of the index-level analyzer used by analyzed string fields without an
/// explicit analyzer.
pub const DEFAULT_ANALYZER: &str = "default";

const DATE_FORMAT_SEPARATOR: &str = "||";

// ============================================================================
// FIELD TYPES
// ============================================================================

/// Datatype of a field. Types the model has no rules for, such as those added
/// by engine plugins, are kept verbatim in [`FieldType::Other`] and compared
/// by name only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Text,
    Keyword,
    Date,
    Boolean,
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    HalfFloat,
    ScaledFloat,
    Binary,
    Ip,
    Object,
    Nested,
    GeoPoint,
    GeoShape,
    Completion,
    TokenCount,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Date => "date",
            FieldType::Boolean => "boolean",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Byte => "byte",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::HalfFloat => "half_float",
            FieldType::ScaledFloat => "scaled_float",
            FieldType::Binary => "binary",
            FieldType::Ip => "ip",
            FieldType::Object => "object",
            FieldType::Nested => "nested",
            FieldType::GeoPoint => "geo_point",
            FieldType::GeoShape => "geo_shape",
            FieldType::Completion => "completion",
            FieldType::TokenCount => "token_count",
            FieldType::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "string" => FieldType::String,
            "text" => FieldType::Text,
            "keyword" => FieldType::Keyword,
            "date" => FieldType::Date,
            "boolean" => FieldType::Boolean,
            "long" => FieldType::Long,
            "integer" => FieldType::Integer,
            "short" => FieldType::Short,
            "byte" => FieldType::Byte,
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "half_float" => FieldType::HalfFloat,
            "scaled_float" => FieldType::ScaledFloat,
            "binary" => FieldType::Binary,
            "ip" => FieldType::Ip,
            "object" => FieldType::Object,
            "nested" => FieldType::Nested,
            "geo_point" => FieldType::GeoPoint,
            "geo_shape" => FieldType::GeoShape,
            "completion" => FieldType::Completion,
            "token_count" => FieldType::TokenCount,
            other => FieldType::Other(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FieldType::Other(_))
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Text)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Long
                | FieldType::Integer
                | FieldType::Short
                | FieldType::Byte
                | FieldType::Double
                | FieldType::Float
                | FieldType::HalfFloat
                | FieldType::ScaledFloat
                | FieldType::TokenCount
        )
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object | FieldType::Nested)
    }

    /// Indexing mode the engine reports nothing for.
    pub fn default_index_mode(&self) -> Option<IndexMode> {
        if self.is_object() || !self.is_known() {
            None
        } else if self.is_textual() {
            Some(IndexMode::Analyzed)
        } else {
            Some(IndexMode::NotAnalyzed)
        }
    }

    pub fn default_store(&self) -> Option<bool> {
        if self.is_object() || !self.is_known() {
            None
        } else {
            Some(false)
        }
    }

    pub fn default_format(&self) -> Option<&'static str> {
        match self {
            FieldType::Date => Some(DEFAULT_DATE_FORMAT),
            _ => None,
        }
    }

    pub fn default_ignore_malformed(&self) -> Option<bool> {
        if self.is_numeric() || matches!(self, FieldType::Date | FieldType::Ip | FieldType::GeoPoint)
        {
            Some(false)
        } else {
            None
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(FieldType::from_name(&name))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    No,
    NotAnalyzed,
    Analyzed,
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::No => f.write_str("no"),
            IndexMode::NotAnalyzed => f.write_str("not_analyzed"),
            IndexMode::Analyzed => f.write_str("analyzed"),
        }
    }
}

/// How the engine treats document fields that the mapping does not declare.
///
/// The engine echoes this attribute back either as a string or as a JSON
/// boolean depending on how it was submitted, so both spellings are accepted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DynamicMode {
    #[default]
    Strict,
    True,
    False,
}

impl DynamicMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DynamicMode::Strict => "strict",
            DynamicMode::True => "true",
            DynamicMode::False => "false",
        }
    }
}

impl fmt::Display for DynamicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DynamicMode {
    type Err = SchemaValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(DynamicMode::Strict),
            "true" => Ok(DynamicMode::True),
            "false" => Ok(DynamicMode::False),
            _ => Err(SchemaValueError::UnknownDynamicMode(s.to_string())),
        }
    }
}

impl Serialize for DynamicMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DynamicMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Flag(bool),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Flag(true) => Ok(DynamicMode::True),
            Repr::Flag(false) => Ok(DynamicMode::False),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Canonical spelling of a date format: the `||`-separated patterns, trimmed.
pub fn canonical_date_format(format: &str) -> String {
    format
        .split(DATE_FORMAT_SEPARATOR)
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .collect::<Vec<_>>()
        .join(DATE_FORMAT_SEPARATOR)
}

// ============================================================================
// FIELD AND TYPE MAPPINGS
// ============================================================================

/// One property of a type mapping, as found under `properties` on the wire.
///
/// Every attribute is optional: on the expected side `None` means the exporter
/// did not constrain it, on the live side it means the engine did not report
/// it (usually because it holds the engine default). Attributes the model does
/// not know about are ignored on decode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_malformed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, FieldDefinition>>,
}

impl FieldDefinition {
    pub fn of_type(field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Default::default()
        }
    }

    pub fn object(properties: BTreeMap<String, FieldDefinition>) -> Self {
        Self {
            field_type: Some(FieldType::Object),
            properties: Some(properties),
            ..Default::default()
        }
    }

    pub fn with_index(mut self, index: IndexMode) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_store(mut self, store: bool) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    pub fn with_ignore_malformed(mut self, ignore_malformed: bool) -> Self {
        self.ignore_malformed = Some(ignore_malformed);
        self
    }

    pub fn with_dynamic(mut self, dynamic: DynamicMode) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    /// The declared type, or `object` for a type-less field with sub-properties.
    pub fn effective_type(&self) -> Option<FieldType> {
        match (&self.field_type, &self.properties) {
            (Some(field_type), _) => Some(field_type.clone()),
            (None, Some(_)) => Some(FieldType::Object),
            (None, None) => None,
        }
    }

    /// Indexing mode after default filling.
    pub fn effective_index(&self) -> Option<IndexMode> {
        self.index.or_else(|| {
            self.effective_type()
                .and_then(|field_type| field_type.default_index_mode())
        })
    }

    /// Analyzer the engine uses for this field when none is declared.
    pub fn default_analyzer(&self) -> Option<&'static str> {
        let textual = self
            .effective_type()
            .map(|field_type| field_type.is_textual())
            .unwrap_or(false);
        if textual && self.effective_index() == Some(IndexMode::Analyzed) {
            Some(DEFAULT_ANALYZER)
        } else {
            None
        }
    }

    /// A copy carrying the values the engine would otherwise assign silently.
    /// Sub-properties are filled recursively.
    pub fn with_engine_defaults(&self) -> Self {
        let mut filled = self.clone();
        if filled.format.is_none() {
            filled.format = self
                .effective_type()
                .and_then(|field_type| field_type.default_format())
                .map(str::to_string);
        }
        if let Some(properties) = &mut filled.properties {
            for property in properties.values_mut() {
                *property = property.with_engine_defaults();
            }
        }
        filled
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicMode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, FieldDefinition>,
}

impl TypeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dynamic(mut self, dynamic: DynamicMode) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field: FieldDefinition) -> Self {
        self.properties.insert(name.into(), field);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.dynamic.is_none() && self.properties.is_empty()
    }

    /// Looks a field up by its dotted path, e.g. `author.name`.
    pub fn field(&self, path: &str) -> Option<&FieldDefinition> {
        let mut segments = path.split('.');
        let mut current = self.properties.get(segments.next()?)?;
        for segment in segments {
            current = current.properties.as_ref()?.get(segment)?;
        }
        Some(current)
    }

    /// Visits every field depth-first in name order with its dotted path.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&str, &'a FieldDefinition)) {
        fn walk_properties<'a>(
            prefix: Option<&str>,
            properties: &'a BTreeMap<String, FieldDefinition>,
            visit: &mut dyn FnMut(&str, &'a FieldDefinition),
        ) {
            for (name, field) in properties {
                let path = match prefix {
                    Some(prefix) => format!("{prefix}.{name}"),
                    None => name.clone(),
                };
                visit(&path, field);
                if let Some(children) = &field.properties {
                    walk_properties(Some(&path), children, visit);
                }
            }
        }

        walk_properties(None, &self.properties, &mut visit);
    }

    /// Dotted paths of the fields that use `analyzer`.
    pub fn fields_using_analyzer(&self, analyzer: &str) -> Vec<String> {
        let mut paths = Vec::new();
        self.walk(|path, field| {
            if field.analyzer.as_deref() == Some(analyzer) {
                paths.push(path.to_string());
            }
        });
        paths
    }

    pub fn with_engine_defaults(&self) -> Self {
        TypeMapping {
            dynamic: self.dynamic,
            properties: self
                .properties
                .iter()
                .map(|(name, field)| (name.clone(), field.with_engine_defaults()))
                .collect(),
        }
    }
}
