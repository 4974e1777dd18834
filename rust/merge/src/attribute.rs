use mapsync_types::{canonical_date_format, ParameterValue};
use std::collections::BTreeMap;
use std::fmt;

/// Verdict on a single attribute of an element present on both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeComparison {
    Match,
    /// The live side lacks a value the expected side wants and nothing else
    /// is in the way.
    Fillable,
    Conflict { expected: String, actual: String },
}

/// What an expected-side `None` means for one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhenUnspecified {
    /// Any live value is acceptable.
    Unconstrained,
    /// The engine default is expected, so a different live value conflicts.
    EngineDefault,
}

/// Compares one attribute after substituting `default` for a missing live
/// value.
pub fn compare_attribute<T>(
    expected: Option<&T>,
    actual: Option<&T>,
    default: Option<&T>,
    when_unspecified: WhenUnspecified,
) -> AttributeComparison
where
    T: PartialEq + fmt::Display + ?Sized,
{
    let actual = actual.or(default);
    let expected = match (expected, when_unspecified) {
        (Some(expected), _) => expected,
        (None, WhenUnspecified::Unconstrained) => return AttributeComparison::Match,
        (None, WhenUnspecified::EngineDefault) => match default {
            Some(default) => default,
            None => return AttributeComparison::Match,
        },
    };
    match actual {
        None => AttributeComparison::Fillable,
        Some(actual) if actual == expected => AttributeComparison::Match,
        Some(actual) => AttributeComparison::Conflict {
            expected: expected.to_string(),
            actual: actual.to_string(),
        },
    }
}

/// Date formats compare on their canonical `||`-joined spelling.
pub fn compare_date_format(
    expected: Option<&str>,
    actual: Option<&str>,
    default: Option<&str>,
) -> AttributeComparison {
    let expected = expected.map(canonical_date_format);
    let actual = actual.map(canonical_date_format);
    let default = default.map(canonical_date_format);
    compare_attribute(
        expected.as_deref(),
        actual.as_deref(),
        default.as_deref(),
        WhenUnspecified::EngineDefault,
    )
}

/// Compares two parameter maps entry by entry after canonicalization.
///
/// Parameters only the live side carries are a conflict too: analysis
/// components are immutable, so an extra setting cannot be removed.
pub fn compare_parameters(
    expected: &BTreeMap<String, ParameterValue>,
    actual: &BTreeMap<String, ParameterValue>,
) -> AttributeComparison {
    for (name, expected_value) in expected {
        match actual.get(name) {
            None => {
                return AttributeComparison::Conflict {
                    expected: format!("{name} = {expected_value}"),
                    actual: format!("no {name}"),
                }
            }
            Some(actual_value) if actual_value.canonical() != expected_value.canonical() => {
                return AttributeComparison::Conflict {
                    expected: format!("{name} = {expected_value}"),
                    actual: format!("{name} = {actual_value}"),
                }
            }
            Some(_) => {}
        }
    }
    match actual.iter().find(|(name, _)| !expected.contains_key(*name)) {
        Some((name, actual_value)) => AttributeComparison::Conflict {
            expected: format!("no {name}"),
            actual: format!("{name} = {actual_value}"),
        },
        None => AttributeComparison::Match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_types::{IndexMode, DEFAULT_DATE_FORMAT};

    #[test]
    fn test_default_fills_missing_live_value() {
        let comparison = compare_attribute(
            Some(&IndexMode::NotAnalyzed),
            None,
            Some(&IndexMode::Analyzed),
            WhenUnspecified::EngineDefault,
        );
        assert_eq!(
            comparison,
            AttributeComparison::Conflict {
                expected: "not_analyzed".to_string(),
                actual: "analyzed".to_string(),
            }
        );

        let comparison = compare_attribute(
            Some(&IndexMode::NotAnalyzed),
            None,
            Some(&IndexMode::NotAnalyzed),
            WhenUnspecified::EngineDefault,
        );
        assert_eq!(comparison, AttributeComparison::Match);
    }

    #[test]
    fn test_missing_without_default_is_fillable() {
        assert_eq!(
            compare_attribute(Some(&true), None, None, WhenUnspecified::Unconstrained),
            AttributeComparison::Fillable
        );
    }

    #[test]
    fn test_unspecified_expectation() {
        // Unconstrained accepts anything the engine holds.
        assert_eq!(
            compare_attribute(None, Some(&true), Some(&false), WhenUnspecified::Unconstrained),
            AttributeComparison::Match
        );
        // Engine-default expects the default.
        assert_eq!(
            compare_attribute(None, Some(&true), Some(&false), WhenUnspecified::EngineDefault),
            AttributeComparison::Conflict {
                expected: "false".to_string(),
                actual: "true".to_string(),
            }
        );
        assert_eq!(
            compare_attribute::<bool>(None, None, Some(&false), WhenUnspecified::EngineDefault),
            AttributeComparison::Match
        );
    }

    #[test]
    fn test_date_format_spelling() {
        assert_eq!(
            compare_date_format(
                None,
                Some("strict_date_optional_time || epoch_millis"),
                Some(DEFAULT_DATE_FORMAT)
            ),
            AttributeComparison::Match
        );
        assert_eq!(
            compare_date_format(Some("yyyy"), None, Some(DEFAULT_DATE_FORMAT)),
            AttributeComparison::Conflict {
                expected: "yyyy".to_string(),
                actual: DEFAULT_DATE_FORMAT.to_string(),
            }
        );
    }

    #[test]
    fn test_parameters_compare_canonically() {
        let mut expected = BTreeMap::new();
        expected.insert("min_gram".to_string(), ParameterValue::text("1"));
        expected.insert("max_gram".to_string(), ParameterValue::text("10"));
        let mut actual = BTreeMap::new();
        actual.insert("min_gram".to_string(), ParameterValue::text("1.0"));
        actual.insert("max_gram".to_string(), ParameterValue::text("10"));
        assert_eq!(compare_parameters(&expected, &actual), AttributeComparison::Match);

        actual.insert("max_gram".to_string(), ParameterValue::text("11"));
        assert_eq!(
            compare_parameters(&expected, &actual),
            AttributeComparison::Conflict {
                expected: "max_gram = '10'".to_string(),
                actual: "max_gram = '11'".to_string(),
            }
        );

        actual.insert("max_gram".to_string(), ParameterValue::text("010"));
        assert_eq!(
            compare_parameters(&expected, &actual),
            AttributeComparison::Conflict {
                expected: "max_gram = '10'".to_string(),
                actual: "max_gram = '010'".to_string(),
            }
        );

        actual.insert("max_gram".to_string(), ParameterValue::text("10"));
        actual.insert("side".to_string(), ParameterValue::text("front"));
        assert_eq!(
            compare_parameters(&expected, &actual),
            AttributeComparison::Conflict {
                expected: "no side".to_string(),
                actual: "side = 'front'".to_string(),
            }
        );
    }
}
