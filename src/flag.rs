use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::attribute_value::Attributes;
use crate::error::Error;
use crate::eval::{Evaluable, Step};
use crate::rule::FlagRule;
use crate::segment::Segment;
use crate::variant::Variant;

/// Flag describes an individual feature flag.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    /// The unique identifier of this flag in storage.
    pub id: String,

    /// The key the flag is requested by.
    pub key: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When false, every evaluation answers with the variant marked as default when off.
    pub enabled: bool,

    /// Version is incremented on every change to the flag. Cached evaluations of an older
    /// version are stale.
    #[serde(default)]
    pub version: u64,

    #[serde(default)]
    pub variants: Vec<Variant>,

    /// Targeting rules, in evaluation order.
    #[serde(default)]
    pub rules: Vec<FlagRule>,
}

impl Flag {
    /// Returns the first variant marked as default when the flag is enabled.
    pub fn default_when_on(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.default_when_on)
    }

    /// Returns the first variant marked as default when the flag is disabled.
    pub fn default_when_off(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.default_when_off)
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Resolves the segment references of every rule against `segments`.
    pub fn populate(&mut self, segments: &[Arc<Segment>]) {
        debug!("populating flag {} with {} segments", self.key, segments.len());
        for rule in self.rules.iter_mut() {
            rule.populate(segments);
        }
    }

    /// Checks the flag configuration before it is evaluated.
    ///
    /// Each of the two defaults must be marked on exactly one variant, and every rule must
    /// distribute 100 percent among variants that belong to this flag.
    pub fn validate(&self) -> Result<(), Error> {
        let context = |e: Error| match e {
            Error::InvalidFlag { reason } => {
                Error::invalid_flag(format!("flag {}: {}", self.key, reason))
            }
            other => other,
        };

        let on = self.variants.iter().filter(|v| v.default_when_on).count();
        let off = self.variants.iter().filter(|v| v.default_when_off).count();
        if on != 1 || off != 1 {
            return Err(context(Error::invalid_flag(format!(
                "expected one default variant per state, found {} when on and {} when off",
                on, off
            ))));
        }

        for rule in &self.rules {
            rule.validate().map_err(context)?;
            for distribution in rule.distributions.iter() {
                let embedded = &distribution.variant;
                match self.variant(&embedded.id) {
                    None => {
                        return Err(context(Error::invalid_flag(format!(
                            "rule {} distributes unknown variant {}",
                            rule.id, embedded.id
                        ))))
                    }
                    Some(variant) if variant.value != embedded.value => {
                        return Err(context(Error::invalid_flag(format!(
                            "rule {} distributes variant {} with value {}, but the flag defines {}",
                            rule.id, embedded.id, embedded.value, variant.value
                        ))))
                    }
                    Some(_) => (),
                }
            }
        }
        Ok(())
    }
}

impl Evaluable for Flag {
    fn evaluate<'a>(&'a self, _: &Attributes) -> Result<Step<'a>, Error> {
        if !self.enabled {
            let variant = self.default_when_off().ok_or(Error::NoDefaultVariant)?;
            return Ok(Step {
                answer: Some(&variant.value),
                next: Vec::new(),
            });
        }

        let variant = self.default_when_on().ok_or(Error::NoDefaultVariant)?;
        Ok(Step {
            answer: Some(&variant.value),
            next: self.rules.iter().map(|r| r as &dyn Evaluable).collect(),
        })
    }

    fn kind(&self) -> &'static str {
        "Flag"
    }

    fn id(&self) -> Option<&str> {
        Some(&self.id)
    }
}
