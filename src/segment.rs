use serde::{Deserialize, Serialize};

use crate::attribute_value::Attributes;
use crate::error::Error;
use crate::rule::SegmentRule;

/// A reusable group of users, referenced from flag constraints through the segment operations.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<SegmentRule>,
}

impl Segment {
    /// An attribute set belongs to the segment if any of its rules match.
    pub fn contains(&self, attributes: &Attributes) -> bool {
        self.rules.iter().any(|rule| rule.matches(attributes))
    }

    pub fn validate(&self) -> Result<(), Error> {
        for rule in &self.rules {
            for constraint in &rule.constraints {
                constraint.validate().map_err(|e| match e {
                    Error::InvalidFlag { reason } => Error::invalid_flag(format!(
                        "segment {} rule {}: {}",
                        self.id, rule.id, reason
                    )),
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use crate::operator::Operation;
    use spectral::prelude::*;

    fn name_rule() -> SegmentRule {
        SegmentRule {
            id: "r1".into(),
            constraints: vec![Constraint::new(
                "name",
                Operation::OneOf,
                vec!["John".into()],
            )],
        }
    }

    fn age_rule() -> SegmentRule {
        SegmentRule {
            id: "r2".into(),
            constraints: vec![Constraint::new(
                "age",
                Operation::GreaterOrEqual,
                vec![30.into()],
            )],
        }
    }

    fn new_segment() -> Segment {
        Segment {
            id: "seg-1".into(),
            key: "vip".into(),
            name: "VIP".into(),
            description: None,
            rules: vec![name_rule(), age_rule()],
        }
    }

    #[test]
    fn segment_parse() {
        let segment: Segment = serde_json::from_str(
            r#"{
                "id": "seg-1",
                "key": "vip",
                "name": "VIP",
                "rules": [
                    {"id": "r1", "constraints": [{"property": "name", "operation": "ONE_OF", "values": ["John"]}]},
                    {"id": "r2", "constraints": [{"property": "age", "operation": "GREATER_OR_EQUAL", "values": [30]}]}
                ]
            }"#,
        )
        .expect("should parse");
        assert_that!(segment).is_equal_to(new_segment());
    }

    #[test]
    fn contains_when_any_rule_matches() {
        let segment = new_segment();
        assert!(segment.contains(&Attributes::new().with("name", "Mary").with("age", 40_i64)));
        assert!(segment.contains(&Attributes::new().with("name", "John")));
    }

    #[test]
    fn does_not_contain_when_no_rule_matches() {
        let segment = new_segment();
        assert!(!segment.contains(&Attributes::new().with("name", "Jane").with("age", 25_i64)));
        assert!(!Segment::default().contains(&Attributes::new().with("name", "John")));
    }

    #[test]
    fn rule_requires_every_constraint() {
        let segment = Segment {
            rules: vec![SegmentRule {
                id: "r1".into(),
                constraints: vec![
                    Constraint::new("name", Operation::OneOf, vec!["John".into()]),
                    Constraint::new("age", Operation::Greater, vec![30.into()]),
                ],
            }],
            ..new_segment()
        };
        assert!(!segment.contains(&Attributes::new().with("name", "John").with("age", 20_i64)));
        assert!(segment.contains(&Attributes::new().with("name", "John").with("age", 31_i64)));
    }

    #[test]
    fn validation_names_the_rule() {
        let segment = Segment {
            rules: vec![SegmentRule {
                id: "broken".into(),
                constraints: vec![Constraint::new("name", Operation::OneOf, vec![])],
            }],
            ..new_segment()
        };
        let err = segment.validate().unwrap_err();
        assert_that!(err.to_string()).contains("segment seg-1 rule broken");
        assert_that!(new_segment().validate()).is_ok();
    }
}
