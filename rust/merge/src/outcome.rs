use mapsync_types::ComponentCategory;
use std::fmt;

/// The part of a schema a conflict is about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SchemaElement {
    /// Root attributes of a type mapping.
    Mapping { type_name: String },
    Field { path: String },
    Analyzer { name: String },
    Component {
        category: ComponentCategory,
        name: String,
    },
}

impl fmt::Display for SchemaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaElement::Mapping { type_name } => write!(f, "mapping of type '{type_name}'"),
            SchemaElement::Field { path } => write!(f, "field '{path}'"),
            SchemaElement::Analyzer { name } => write!(f, "analyzer '{name}'"),
            SchemaElement::Component { category, name } => write!(f, "{category} '{name}'"),
        }
    }
}

/// A live value that cannot be brought in line with the expected one without
/// rewriting existing data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeConflict {
    pub element: SchemaElement,
    pub attribute: String,
    pub expected: String,
    /// `None` when the live side has nothing at all.
    pub actual: Option<String>,
}

impl AttributeConflict {
    pub fn new(
        element: SchemaElement,
        attribute: impl Into<String>,
        expected: impl Into<String>,
        actual: Option<String>,
    ) -> Self {
        Self {
            element,
            attribute: attribute.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Conflict between two concrete attribute values, quoted for display.
    pub fn mismatch(
        element: SchemaElement,
        attribute: impl Into<String>,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) -> Self {
        Self::new(
            element,
            attribute,
            format!("'{expected}'"),
            Some(format!("'{actual}'")),
        )
    }

    /// Something the expected schema declares but the live one lacks.
    pub fn missing(
        element: SchemaElement,
        attribute: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::new(element, attribute, expected, None)
    }
}

impl fmt::Display for AttributeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid value for attribute '{}' of {}: expected {}, actual {}",
            self.attribute,
            self.element,
            self.expected,
            self.actual.as_deref().unwrap_or("nothing")
        )
    }
}

/// Result of merging one schema element, aggregated bottom-up.
#[derive(Clone, Debug, PartialEq)]
pub enum MergeOutcome<P> {
    /// The live schema already satisfies the expected one.
    Noop,
    /// The live schema can be brought up to date by sending this patch.
    Additive(P),
    Conflict(AttributeConflict),
}

impl<P> MergeOutcome<P> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, MergeOutcome::Conflict(_))
    }

    pub fn into_patch(self) -> Result<Option<P>, AttributeConflict> {
        match self {
            MergeOutcome::Noop => Ok(None),
            MergeOutcome::Additive(patch) => Ok(Some(patch)),
            MergeOutcome::Conflict(conflict) => Err(conflict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages() {
        let conflict = AttributeConflict::mismatch(
            SchemaElement::Field {
                path: "myField".to_string(),
            },
            "index",
            "not_analyzed",
            "analyzed",
        );
        assert_eq!(
            conflict.to_string(),
            "Invalid value for attribute 'index' of field 'myField': expected 'not_analyzed', actual 'analyzed'"
        );

        let missing = AttributeConflict::missing(
            SchemaElement::Component {
                category: ComponentCategory::CharFilter,
                name: "strip".to_string(),
            },
            "analyzer",
            "a definition",
        );
        assert_eq!(
            missing.to_string(),
            "Invalid value for attribute 'analyzer' of char filter 'strip': expected a definition, actual nothing"
        );
    }

    #[test]
    fn test_into_patch() {
        assert_eq!(MergeOutcome::<u8>::Noop.into_patch(), Ok(None));
        assert_eq!(MergeOutcome::Additive(3u8).into_patch(), Ok(Some(3)));
        let conflict = AttributeConflict::missing(
            SchemaElement::Analyzer {
                name: "a".to_string(),
            },
            "analyzer",
            "x",
        );
        assert!(MergeOutcome::<u8>::Conflict(conflict.clone()).is_conflict());
        assert_eq!(
            MergeOutcome::<u8>::Conflict(conflict.clone()).into_patch(),
            Err(conflict)
        );
    }
}
