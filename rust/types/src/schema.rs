use serde::{Deserialize, Serialize};

use crate::{AnalysisSettings, TypeMapping};

/// The schema an application expects for one index and document type.
///
/// Built by a separate export step and treated as read-only input: the mergers
/// compare against it but never change it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub index: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub mapping: TypeMapping,
    #[serde(default)]
    pub analysis: AnalysisSettings,
}

impl IndexSchema {
    pub fn new(index: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            type_name: type_name.into(),
            mapping: TypeMapping::default(),
            analysis: AnalysisSettings::default(),
        }
    }

    pub fn with_mapping(mut self, mapping: TypeMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_analysis(mut self, analysis: AnalysisSettings) -> Self {
        self.analysis = analysis;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DynamicMode, FieldType};
    use serde_json::json;

    #[test]
    fn test_decode_schema_document() {
        let schema: IndexSchema = serde_json::from_value(json!({
            "index": "books",
            "type": "book",
            "mapping": {
                "dynamic": "strict",
                "properties": { "published": { "type": "date" } }
            }
        }))
        .unwrap();

        assert_eq!(schema.index, "books");
        assert_eq!(schema.type_name, "book");
        assert_eq!(schema.mapping.dynamic, Some(DynamicMode::Strict));
        assert_eq!(
            schema.mapping.field("published").and_then(|f| f.field_type.clone()),
            Some(FieldType::Date)
        );
        assert!(schema.analysis.is_empty());
    }
}
