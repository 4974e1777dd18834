use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::SchemaValueError;

/// Value of one analysis component parameter.
///
/// The engine stores every parameter as text and echoes numbers and booleans
/// back as strings, so they are decoded into text as well. Comparisons go
/// through [`ParameterValue::canonical`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Text(String),
    List(Vec<String>),
}

impl ParameterValue {
    pub fn text(value: impl Into<String>) -> Self {
        ParameterValue::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParameterValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn canonical(&self) -> ParameterValue {
        match self {
            ParameterValue::Text(text) => ParameterValue::Text(canonical_parameter_text(text)),
            ParameterValue::List(values) => ParameterValue::List(
                values
                    .iter()
                    .map(|value| canonical_parameter_text(value))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Text(text) => write!(f, "'{text}'"),
            ParameterValue::List(values) => write!(f, "{values:?}"),
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => Some(text.clone()),
        serde_json::Value::Number(number) => Some(canonical_number(number)),
        serde_json::Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

impl TryFrom<serde_json::Value> for ParameterValue {
    type Error = SchemaValueError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        if let Some(text) = scalar_text(&value) {
            return Ok(ParameterValue::Text(text));
        }
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    scalar_text(item).ok_or_else(|| SchemaValueError::InvalidParameterValue {
                        reason: format!("list element {item} is not a scalar"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(ParameterValue::List),
            other => Err(SchemaValueError::InvalidParameterValue {
                reason: format!("{other} is neither a scalar nor a list of scalars"),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for ParameterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        ParameterValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Rewrites a plain decimal into one spelling so that `"1"`, `1` and `1.0`
/// agree. Only an optional minus sign, digits without a leading zero and an
/// optional fraction qualify: `"01"`, `"+1"` or `"1e0"` are compared as written.
pub fn canonical_parameter_text(text: &str) -> String {
    if !is_plain_decimal(text) {
        return text.to_string();
    }
    if let Ok(integer) = text.parse::<i64>() {
        return integer.to_string();
    }
    // Integers beyond i64 keep their digits.
    if !text.contains('.') {
        return text.to_string();
    }
    text.parse::<f64>()
        .map(canonical_float)
        .unwrap_or_else(|_| text.to_string())
}

fn canonical_float(float: f64) -> String {
    if float.fract() == 0.0 && float.abs() < 1e15 {
        (float as i64).to_string()
    } else {
        float.to_string()
    }
}

/// Canonical text of a JSON number, whatever notation the document used.
fn canonical_number(number: &serde_json::Number) -> String {
    if let Some(integer) = number.as_i64() {
        integer.to_string()
    } else if let Some(unsigned) = number.as_u64() {
        unsigned.to_string()
    } else {
        match number.as_f64() {
            Some(float) if float.is_finite() => canonical_float(float),
            _ => number.to_string(),
        }
    }
}

fn is_plain_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix('-').unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(whole)
        && (whole == "0" || !whole.starts_with('0'))
        && fraction.map_or(true, digits)
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

// ============================================================================
// ANALYSIS COMPONENTS
// ============================================================================

/// The three kinds of named building blocks analyzers reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentCategory {
    CharFilter,
    Tokenizer,
    TokenFilter,
}

impl ComponentCategory {
    /// Order in which categories are compared and reported.
    pub const ALL: [ComponentCategory; 3] = [
        ComponentCategory::CharFilter,
        ComponentCategory::Tokenizer,
        ComponentCategory::TokenFilter,
    ];

    /// Key of the category inside the `index.analysis` settings object.
    pub fn settings_key(&self) -> &'static str {
        match self {
            ComponentCategory::CharFilter => "char_filter",
            ComponentCategory::Tokenizer => "tokenizer",
            ComponentCategory::TokenFilter => "filter",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentCategory::CharFilter => f.write_str("char filter"),
            ComponentCategory::Tokenizer => f.write_str("tokenizer"),
            ComponentCategory::TokenFilter => f.write_str("token filter"),
        }
    }
}

/// A named tokenizer, char filter or token filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisComponentDefinition {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl AnalysisComponentDefinition {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Parameters in canonical form, for comparison.
    pub fn canonical_parameters(&self) -> BTreeMap<&str, ParameterValue> {
        self.parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value.canonical()))
            .collect()
    }
}

/// Analyzer type the engine assumes when an analyzer names a tokenizer.
pub const CUSTOM_ANALYZER_TYPE: &str = "custom";

/// A named analyzer: an ordered char filter → tokenizer → token filter
/// pipeline. Both reference lists are order sensitive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub analyzer_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub char_filter: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenizer: Option<String>,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub filter: Vec<String>,
    #[serde(flatten)]
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl AnalyzerDefinition {
    pub fn custom(tokenizer: impl Into<String>) -> Self {
        Self {
            tokenizer: Some(tokenizer.into()),
            ..Default::default()
        }
    }

    pub fn with_char_filter(mut self, name: impl Into<String>) -> Self {
        self.char_filter.push(name.into());
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>) -> Self {
        self.filter.push(name.into());
        self
    }

    /// Declared type, or `custom` for a pipeline analyzer.
    pub fn effective_type(&self) -> Option<&str> {
        match (&self.analyzer_type, &self.tokenizer) {
            (Some(analyzer_type), _) => Some(analyzer_type.as_str()),
            (None, Some(_)) => Some(CUSTOM_ANALYZER_TYPE),
            (None, None) => None,
        }
    }

    /// Every component this analyzer references, in pipeline order.
    pub fn references(&self) -> Vec<(ComponentCategory, &str)> {
        let mut references = Vec::new();
        references.extend(
            self.char_filter
                .iter()
                .map(|name| (ComponentCategory::CharFilter, name.as_str())),
        );
        references.extend(
            self.tokenizer
                .iter()
                .map(|name| (ComponentCategory::Tokenizer, name.as_str())),
        );
        references.extend(
            self.filter
                .iter()
                .map(|name| (ComponentCategory::TokenFilter, name.as_str())),
        );
        references
    }
}

/// The `index.analysis` settings of one index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub analyzer: BTreeMap<String, AnalyzerDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub char_filter: BTreeMap<String, AnalysisComponentDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokenizer: BTreeMap<String, AnalysisComponentDefinition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<String, AnalysisComponentDefinition>,
}

impl AnalysisSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzer.is_empty()
            && self.char_filter.is_empty()
            && self.tokenizer.is_empty()
            && self.filter.is_empty()
    }

    pub fn with_analyzer(mut self, name: impl Into<String>, analyzer: AnalyzerDefinition) -> Self {
        self.analyzer.insert(name.into(), analyzer);
        self
    }

    pub fn with_component(
        mut self,
        category: ComponentCategory,
        name: impl Into<String>,
        component: AnalysisComponentDefinition,
    ) -> Self {
        self.components_mut(category).insert(name.into(), component);
        self
    }

    pub fn components(
        &self,
        category: ComponentCategory,
    ) -> &BTreeMap<String, AnalysisComponentDefinition> {
        match category {
            ComponentCategory::CharFilter => &self.char_filter,
            ComponentCategory::Tokenizer => &self.tokenizer,
            ComponentCategory::TokenFilter => &self.filter,
        }
    }

    pub fn components_mut(
        &mut self,
        category: ComponentCategory,
    ) -> &mut BTreeMap<String, AnalysisComponentDefinition> {
        match category {
            ComponentCategory::CharFilter => &mut self.char_filter,
            ComponentCategory::Tokenizer => &mut self.tokenizer,
            ComponentCategory::TokenFilter => &mut self.filter,
        }
    }

    pub fn defines(&self, category: ComponentCategory, name: &str) -> bool {
        self.components(category).contains_key(name)
    }

    /// Adds every definition of `other` whose name is not taken yet.
    pub fn extend_missing(&mut self, other: &AnalysisSettings) {
        for (name, analyzer) in &other.analyzer {
            self.analyzer
                .entry(name.clone())
                .or_insert_with(|| analyzer.clone());
        }
        for category in ComponentCategory::ALL {
            let target = self.components_mut(category);
            for (name, component) in other.components(category) {
                target
                    .entry(name.clone())
                    .or_insert_with(|| component.clone());
            }
        }
    }
}
