use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attribute_value::Attributes;
use crate::constraint::{self, Constraint};
use crate::distribution::DistributionList;
use crate::error::Error;
use crate::eval::{Evaluable, Step};
use crate::segment::Segment;

/// A rule of a [Segment]. It matches when all of its constraints do.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl SegmentRule {
    pub fn matches(&self, attributes: &Attributes) -> bool {
        constraint::all_match(&self.constraints, attributes)
    }
}

/// A targeting rule of a flag. When all of its constraints match, the flag's answer is drawn
/// from the rule's distributions.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlagRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub distributions: DistributionList,
}

impl FlagRule {
    pub fn matches(&self, attributes: &Attributes) -> bool {
        constraint::all_match(&self.constraints, attributes)
    }

    pub fn populate(&mut self, segments: &[Arc<Segment>]) {
        for constraint in self.constraints.iter_mut() {
            constraint.populate(segments);
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        for constraint in &self.constraints {
            constraint.validate()?;
        }
        if self.distributions.is_empty() {
            return Err(Error::invalid_flag("rule has no distributions"));
        }
        if let Some(d) = self.distributions.iter().find(|d| !(1..=100).contains(&d.percentage)) {
            return Err(Error::invalid_flag(format!(
                "distribution of variant {} has percentage {} outside 1..=100",
                d.variant.id, d.percentage
            )));
        }
        let total = self.distributions.total_percentage();
        if total != 100 {
            return Err(Error::invalid_flag(format!(
                "distribution percentages sum to {}, not 100",
                total
            )));
        }
        Ok(())
    }
}

impl Evaluable for FlagRule {
    fn evaluate<'a>(&'a self, attributes: &Attributes) -> Result<Step<'a>, Error> {
        if !self.matches(attributes) {
            return Ok(Step::default());
        }
        Ok(Step {
            answer: None,
            next: vec![&self.distributions as &dyn Evaluable],
        })
    }

    fn kind(&self) -> &'static str {
        "FlagRule"
    }

    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }
}
