use mapsync_types::{
    AnalysisSettings, ComponentCategory, FieldType, IndexSchema, TypeMapping,
};

use crate::analysis::{merge_analysis, ANALYSIS_ATTRIBUTE};
use crate::mapping::merge_mapping;
use crate::outcome::{AttributeConflict, SchemaElement};

/// Which merger found a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictScope {
    Mapping,
    Analysis,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaConflict {
    pub scope: ConflictScope,
    pub conflict: AttributeConflict,
}

/// The writes needed to bring a live index up to date. Analysis changes go
/// first because new fields may reference new analyzers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyPlan {
    pub analysis: Option<AnalysisSettings>,
    pub mapping: Option<TypeMapping>,
}

impl ApplyPlan {
    pub fn is_empty(&self) -> bool {
        self.analysis.is_none() && self.mapping.is_none()
    }

    /// The first addition of the plan, phrased as a conflict against a live
    /// schema that lacks it. Used when additions are not allowed.
    pub fn first_addition(
        &self,
        type_name: &str,
        actual_mapping: Option<&TypeMapping>,
    ) -> Option<AttributeConflict> {
        if let Some(analysis) = &self.analysis {
            for category in ComponentCategory::ALL {
                if let Some(name) = analysis.components(category).keys().next() {
                    return Some(AttributeConflict::missing(
                        SchemaElement::Component {
                            category,
                            name: name.clone(),
                        },
                        ANALYSIS_ATTRIBUTE,
                        "a definition",
                    ));
                }
            }
            if let Some(name) = analysis.analyzer.keys().next() {
                return Some(AttributeConflict::missing(
                    SchemaElement::Analyzer { name: name.clone() },
                    ANALYSIS_ATTRIBUTE,
                    "a definition",
                ));
            }
        }

        let mapping = self.mapping.as_ref()?;
        let Some(actual_mapping) = actual_mapping else {
            return Some(AttributeConflict::missing(
                SchemaElement::Mapping {
                    type_name: type_name.to_string(),
                },
                "properties",
                "a mapping",
            ));
        };
        if let Some(dynamic) = mapping.dynamic {
            return Some(AttributeConflict::missing(
                SchemaElement::Mapping {
                    type_name: type_name.to_string(),
                },
                "dynamic",
                format!("'{dynamic}'"),
            ));
        }
        let mut first_new_field = None;
        mapping.walk(|path, field| {
            if first_new_field.is_none() && actual_mapping.field(path).is_none() {
                let field_type = field.effective_type().unwrap_or(FieldType::Object);
                first_new_field = Some(AttributeConflict::missing(
                    SchemaElement::Field {
                        path: path.to_string(),
                    },
                    "type",
                    format!("'{field_type}'"),
                ));
            }
        });
        first_new_field
    }
}

/// Runs the mapping merger, then the analysis merger, against the live state
/// of an existing index. `actual_mapping` is `None` when the index has no
/// mapping for the type yet.
pub fn plan_update(
    expected: &IndexSchema,
    actual_mapping: Option<&TypeMapping>,
    actual_analysis: &AnalysisSettings,
) -> Result<ApplyPlan, SchemaConflict> {
    let mapping = merge_mapping(&expected.type_name, &expected.mapping, actual_mapping)
        .into_patch()
        .map_err(|conflict| SchemaConflict {
            scope: ConflictScope::Mapping,
            conflict,
        })?;
    let analysis = merge_analysis(
        &expected.analysis,
        actual_analysis,
        &expected.mapping,
        actual_mapping,
    )
    .into_patch()
    .map_err(|conflict| SchemaConflict {
        scope: ConflictScope::Analysis,
        conflict,
    })?;
    Ok(ApplyPlan { analysis, mapping })
}

/// Everything needed to create the index from scratch: the complete mapping
/// and the expected analysis settings, checked for broken references.
pub fn plan_creation(expected: &IndexSchema) -> Result<(TypeMapping, AnalysisSettings), SchemaConflict> {
    let plan = plan_update(expected, None, &AnalysisSettings::default())?;
    Ok((
        plan.mapping.unwrap_or_default(),
        plan.analysis.unwrap_or_default(),
    ))
}
