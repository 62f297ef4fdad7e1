use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attribute_value::Attributes;
use crate::error::Error;
use crate::eval::{Evaluable, Step};
use crate::variant::Variant;

/// Assigns a percentage of traffic to a variant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    #[serde(default)]
    pub id: String,
    pub variant: Variant,
    pub percentage: u32,
}

impl Distribution {
    pub fn new(variant: Variant, percentage: u32) -> Self {
        Distribution {
            id: String::new(),
            variant,
            percentage,
        }
    }
}

/// The weighted variants of a flag rule. Weights are expected to sum to 100.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct DistributionList(Vec<Distribution>);

impl DistributionList {
    pub fn new(distributions: Vec<Distribution>) -> Self {
        DistributionList(distributions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Distribution> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of the weights, widened so that out-of-range weights cannot overflow.
    pub fn total_percentage(&self) -> u64 {
        self.0.iter().map(|d| u64::from(d.percentage)).sum()
    }

    /// Picks a variant with a fresh draw from the thread-local generator.
    pub fn distribute(&self) -> Option<&Variant> {
        self.distribute_with(&mut rand::thread_rng())
    }

    /// Draws an integer in `1..=100` and returns the first variant whose cumulative weight
    /// reaches it. If the weights fall short of the draw, the first variant is returned.
    pub fn distribute_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Variant> {
        let first = self.0.first()?;
        let draw: u64 = rng.gen_range(1..=100);
        let mut cumulative = 0_u64;
        for distribution in &self.0 {
            cumulative += u64::from(distribution.percentage);
            if draw <= cumulative {
                return Some(&distribution.variant);
            }
        }
        warn!(
            "distribution weights sum to {}, short of draw {}; using variant {}",
            cumulative, draw, first.variant.id
        );
        Some(&first.variant)
    }
}

impl Evaluable for DistributionList {
    fn evaluate<'a>(&'a self, _: &Attributes) -> Result<Step<'a>, Error> {
        match self.distribute() {
            Some(variant) if !variant.id.is_empty() => Ok(Step {
                answer: Some(&variant.value),
                next: Vec::new(),
            }),
            _ => Err(Error::NoVariantToDistribute),
        }
    }

    fn kind(&self) -> &'static str {
        "DistributionList"
    }
}
