use std::sync::Arc;

use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::attribute_value::{AttributeValue, Attributes};
use crate::error::Error;
use crate::operator::{self, Operation};
use crate::segment::Segment;

/// One reference value configured on a [Constraint].
///
/// Constraints are loaded with plain values only. Segment operations reference segments by id,
/// and [Constraint::populate] swaps those ids for the segments themselves before evaluation.
#[derive(Clone, Debug)]
pub enum ConstraintValue {
    Value(AttributeValue),
    Segment(Arc<Segment>),
}

impl ConstraintValue {
    pub fn as_value(&self) -> Option<&AttributeValue> {
        match self {
            ConstraintValue::Value(v) => Some(v),
            ConstraintValue::Segment(_) => None,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            ConstraintValue::Segment(s) => Some(s),
            ConstraintValue::Value(_) => None,
        }
    }

    // The id a segment reference resolves through, whether or not it is resolved yet.
    fn segment_id(&self) -> Option<&str> {
        match self {
            ConstraintValue::Value(v) => v.as_str(),
            ConstraintValue::Segment(s) => Some(&s.id),
        }
    }
}

impl From<AttributeValue> for ConstraintValue {
    fn from(v: AttributeValue) -> Self {
        ConstraintValue::Value(v)
    }
}

impl From<Arc<Segment>> for ConstraintValue {
    fn from(s: Arc<Segment>) -> Self {
        ConstraintValue::Segment(s)
    }
}

impl PartialEq for ConstraintValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConstraintValue::Value(a), ConstraintValue::Value(b)) => a == b,
            (ConstraintValue::Segment(a), ConstraintValue::Segment(b)) => a.id == b.id,
            _ => false,
        }
    }
}

impl Serialize for ConstraintValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ConstraintValue::Value(v) => v.serialize(serializer),
            ConstraintValue::Segment(s) => serializer.serialize_str(&s.id),
        }
    }
}

impl<'de> Deserialize<'de> for ConstraintValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        AttributeValue::deserialize(deserializer).map(ConstraintValue::Value)
    }
}

/// A constraint applies one [Operation] to a named request attribute and a list of reference
/// values.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default)]
    pub id: String,
    pub property: String,
    pub operation: Operation,
    #[serde(default)]
    pub values: Vec<ConstraintValue>,
}

impl Constraint {
    pub fn new(
        property: impl Into<String>,
        operation: Operation,
        values: Vec<AttributeValue>,
    ) -> Self {
        Constraint {
            id: String::new(),
            property: property.into(),
            operation,
            values: values.into_iter().map(ConstraintValue::Value).collect(),
        }
    }

    /// Returns whether the attribute set satisfies this constraint.
    ///
    /// Segment operations check the whole attribute set; every other operation reads only the
    /// attribute named by [Constraint::property].
    pub fn matches(&self, attributes: &Attributes) -> bool {
        match self.operation {
            Operation::IsInSegment => operator::is_in_segment(attributes, &self.values),
            Operation::IsntInSegment => operator::isnt_in_segment(attributes, &self.values),
            op => op.apply(attributes.get(&self.property), &self.values),
        }
    }

    /// Resolves segment references to the matching segments by id. Values of non-segment
    /// operations are left untouched.
    pub fn populate(&mut self, segments: &[Arc<Segment>]) {
        if !self.operation.is_segment_operation() {
            return;
        }
        for value in self.values.iter_mut() {
            let id = match value.segment_id() {
                Some(id) => id.to_string(),
                None => continue,
            };
            match segments.iter().find(|s| s.id == id) {
                Some(segment) => {
                    debug!("resolved segment {} in constraint {}", id, self.id);
                    *value = ConstraintValue::Segment(segment.clone());
                }
                None => warn!(
                    "constraint {} references unknown segment {}, it will never match",
                    self.id, id
                ),
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.operation.requires_values() && self.values.is_empty() {
            return Err(Error::invalid_flag(format!(
                "constraint on `{}` with operation {} has no values",
                self.property, self.operation
            )));
        }
        for value in &self.values {
            match self.operation {
                Operation::MatchesRegex | Operation::DoesntMatchRegex => {
                    let pattern = value.as_value().and_then(AttributeValue::as_text);
                    match pattern {
                        Some(p) => {
                            Regex::new(&p).map_err(|e| {
                                Error::invalid_flag(format!("invalid regex `{}`: {}", p, e))
                            })?;
                        }
                        None => {
                            return Err(Error::invalid_flag(format!(
                                "regex constraint on `{}` has non-string value",
                                self.property
                            )))
                        }
                    }
                }
                Operation::BeforeDate
                | Operation::BeforeOrSameDate
                | Operation::AfterDate
                | Operation::AfterOrSameDate => {
                    if value
                        .as_value()
                        .and_then(AttributeValue::to_datetime)
                        .is_none()
                    {
                        return Err(Error::invalid_flag(format!(
                            "date constraint on `{}` has a value that is not a date: {:?}",
                            self.property, value
                        )));
                    }
                }
                Operation::IsInSegment | Operation::IsntInSegment => {
                    if value.segment_id().is_none() {
                        return Err(Error::invalid_flag(format!(
                            "segment constraint has a value that is not a segment id: {:?}",
                            value
                        )));
                    }
                }
                _ => (),
            }
        }
        Ok(())
    }
}

/// Constraints combine with AND semantics: every one must hold. An empty list holds.
pub(crate) fn all_match(constraints: &[Constraint], attributes: &Attributes) -> bool {
    constraints.iter().all(|c| c.matches(attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::SegmentRule;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use spectral::prelude::*;

    fn john_segment() -> Arc<Segment> {
        Arc::new(Segment {
            id: "seg-1".into(),
            rules: vec![SegmentRule {
                id: "r1".into(),
                constraints: vec![Constraint::new(
                    "name",
                    Operation::OneOf,
                    vec!["John".into()],
                )],
            }],
            ..Segment::default()
        })
    }

    #[test]
    fn constraint_parse() {
        let constraint: Constraint = serde_json::from_str(
            r#"{"id": "c1", "property": "age", "operation": "GREATER_OR_EQUAL", "values": [18]}"#,
        )
        .expect("should parse");
        assert_that!(constraint).is_equal_to(Constraint {
            id: "c1".into(),
            ..Constraint::new("age", Operation::GreaterOrEqual, vec![18.into()])
        });

        let unknown = serde_json::from_str::<Constraint>(
            r#"{"property": "age", "operation": "BETWEEN", "values": [18]}"#,
        );
        assert!(unknown.is_err());
    }

    #[test]
    fn matches_named_attribute() {
        let constraint = Constraint::new("age", Operation::GreaterOrEqual, vec![18.into()]);
        assert!(constraint.matches(&Attributes::new().with("age", 21_i64)));
        assert!(!constraint.matches(&Attributes::new().with("age", 10_i64)));
        assert!(!constraint.matches(&Attributes::new().with("years", 21_i64)));
    }

    #[test]
    fn existence_reads_missing_sentinel() {
        let exists = Constraint::new("plan", Operation::Exists, vec![]);
        let doesnt = Constraint::new("plan", Operation::DoesntExist, vec![]);
        let with_plan = Attributes::new().with("plan", false);
        assert!(exists.matches(&with_plan));
        assert!(!doesnt.matches(&with_plan));
        assert!(!exists.matches(&Attributes::new()));
        assert!(doesnt.matches(&Attributes::new()));
    }

    #[test]
    fn segment_constraint_uses_whole_attribute_set() {
        let mut constraint = Constraint::new("", Operation::IsInSegment, vec!["seg-1".into()]);
        let john = Attributes::new().with("name", "John");

        assert!(!constraint.matches(&john), "unresolved before populate");

        constraint.populate(&[john_segment()]);
        assert!(constraint.matches(&john));
        assert!(!constraint.matches(&Attributes::new().with("name", "Mary")));

        let mut negated = Constraint::new("", Operation::IsntInSegment, vec!["seg-1".into()]);
        negated.populate(&[john_segment()]);
        assert!(!negated.matches(&john));
        assert!(negated.matches(&Attributes::new().with("name", "Mary")));
    }

    #[test]
    fn populate_ignores_other_operations() {
        let mut constraint = Constraint::new("segment", Operation::OneOf, vec!["seg-1".into()]);
        constraint.populate(&[john_segment()]);
        assert_that!(constraint.values[0].as_value())
            .contains_value(&AttributeValue::from("seg-1"));
    }

    #[test]
    fn populate_refreshes_resolved_segments() {
        let mut constraint = Constraint::new("", Operation::IsInSegment, vec!["seg-1".into()]);
        constraint.populate(&[john_segment()]);
        let mut updated = (*john_segment()).clone();
        updated.rules.clear();
        constraint.populate(&[Arc::new(updated)]);
        assert!(!constraint.matches(&Attributes::new().with("name", "John")));
    }

    #[test]
    fn resolved_segments_serialize_as_ids() {
        let mut constraint = Constraint::new("", Operation::IsInSegment, vec!["seg-1".into()]);
        constraint.populate(&[john_segment()]);
        assert_json_eq!(
            serde_json::to_value(&constraint).unwrap(),
            json!({"id": "", "property": "", "operation": "IS_IN_SEGMENT", "values": ["seg-1"]})
        );
    }

    #[test]
    fn all_match_is_and() {
        let constraints = vec![
            Constraint::new("name", Operation::OneOf, vec!["John".into()]),
            Constraint::new("age", Operation::Greater, vec![30.into()]),
        ];
        let old_john = Attributes::new().with("name", "John").with("age", 40_i64);
        let young_john = Attributes::new().with("name", "John").with("age", 20_i64);
        assert!(all_match(&constraints, &old_john));
        assert!(!all_match(&constraints, &young_john));
        assert!(all_match(&[], &young_john));
    }

    #[test]
    fn validation() {
        assert_that!(Constraint::new("a", Operation::Exists, vec![]).validate()).is_ok();
        assert_that!(Constraint::new("a", Operation::OneOf, vec![]).validate()).is_err();
        assert_that!(
            Constraint::new("a", Operation::MatchesRegex, vec!["***bad".into()]).validate()
        )
        .is_err();
        assert_that!(Constraint::new("a", Operation::MatchesRegex, vec!["^ok$".into()]).validate())
            .is_ok();
        assert_that!(Constraint::new("a", Operation::AfterDate, vec!["fish".into()]).validate())
            .is_err();
        assert_that!(Constraint::new(
            "a",
            Operation::AfterDate,
            vec!["2019-11-19T17:29:00-07:00".into()]
        )
        .validate())
        .is_ok();
        assert_that!(Constraint::new("", Operation::IsInSegment, vec![1.into()]).validate())
            .is_err();
    }
}
