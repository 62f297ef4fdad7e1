use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use log::{error, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Attributes};
use crate::constraint::ConstraintValue;
use crate::error::Error;

/// The fixed vocabulary of comparisons a [crate::Constraint] can apply.
///
/// Deserializing an unknown tag fails, so a flag using an operation this crate does not know
/// about is rejected when it is loaded rather than silently ignored during evaluation.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    OneOf,
    NotOneOf,
    Greater,
    GreaterOrEqual,
    Lower,
    LowerOrEqual,
    Exists,
    DoesntExist,
    Contains,
    DoesntContain,
    StartsWith,
    DoesntStartWith,
    EndsWith,
    DoesntEndWith,
    MatchesRegex,
    DoesntMatchRegex,
    BeforeDate,
    BeforeOrSameDate,
    AfterDate,
    AfterOrSameDate,
    IsInSegment,
    IsntInSegment,
}

impl Operation {
    pub const ALL: [Operation; 22] = [
        Operation::OneOf,
        Operation::NotOneOf,
        Operation::Greater,
        Operation::GreaterOrEqual,
        Operation::Lower,
        Operation::LowerOrEqual,
        Operation::Exists,
        Operation::DoesntExist,
        Operation::Contains,
        Operation::DoesntContain,
        Operation::StartsWith,
        Operation::DoesntStartWith,
        Operation::EndsWith,
        Operation::DoesntEndWith,
        Operation::MatchesRegex,
        Operation::DoesntMatchRegex,
        Operation::BeforeDate,
        Operation::BeforeOrSameDate,
        Operation::AfterDate,
        Operation::AfterOrSameDate,
        Operation::IsInSegment,
        Operation::IsntInSegment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::OneOf => "ONE_OF",
            Operation::NotOneOf => "NOT_ONE_OF",
            Operation::Greater => "GREATER",
            Operation::GreaterOrEqual => "GREATER_OR_EQUAL",
            Operation::Lower => "LOWER",
            Operation::LowerOrEqual => "LOWER_OR_EQUAL",
            Operation::Exists => "EXISTS",
            Operation::DoesntExist => "DOESNT_EXIST",
            Operation::Contains => "CONTAINS",
            Operation::DoesntContain => "DOESNT_CONTAIN",
            Operation::StartsWith => "STARTS_WITH",
            Operation::DoesntStartWith => "DOESNT_START_WITH",
            Operation::EndsWith => "ENDS_WITH",
            Operation::DoesntEndWith => "DOESNT_END_WITH",
            Operation::MatchesRegex => "MATCHES_REGEX",
            Operation::DoesntMatchRegex => "DOESNT_MATCH_REGEX",
            Operation::BeforeDate => "BEFORE_DATE",
            Operation::BeforeOrSameDate => "BEFORE_OR_SAME_DATE",
            Operation::AfterDate => "AFTER_DATE",
            Operation::AfterOrSameDate => "AFTER_OR_SAME_DATE",
            Operation::IsInSegment => "IS_IN_SEGMENT",
            Operation::IsntInSegment => "ISNT_IN_SEGMENT",
        }
    }

    /// Segment operations read the whole attribute set instead of one named attribute.
    pub fn is_segment_operation(&self) -> bool {
        matches!(self, Operation::IsInSegment | Operation::IsntInSegment)
    }

    /// Existence checks ignore reference values; every other operation needs at least one.
    pub fn requires_values(&self) -> bool {
        !matches!(self, Operation::Exists | Operation::DoesntExist)
    }

    /// Applies a non-segment operation to the request value (None when the attribute is
    /// missing) and the configured reference values.
    pub fn apply(&self, value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
        match self {
            Operation::OneOf => one_of(value, references),
            Operation::NotOneOf => not_one_of(value, references),

            // ordering ops
            Operation::Greater => greater(value, references),
            Operation::GreaterOrEqual => greater_or_equal(value, references),
            Operation::Lower => lower(value, references),
            Operation::LowerOrEqual => lower_or_equal(value, references),

            Operation::Exists => exists(value),
            Operation::DoesntExist => doesnt_exist(value),

            // string ops
            Operation::Contains => contains(value, references),
            Operation::DoesntContain => doesnt_contain(value, references),
            Operation::StartsWith => starts_with(value, references),
            Operation::DoesntStartWith => doesnt_start_with(value, references),
            Operation::EndsWith => ends_with(value, references),
            Operation::DoesntEndWith => doesnt_end_with(value, references),
            Operation::MatchesRegex => matches_regex(value, references),
            Operation::DoesntMatchRegex => doesnt_match_regex(value, references),

            Operation::BeforeDate => before_date(value, references),
            Operation::BeforeOrSameDate => before_or_same_date(value, references),
            Operation::AfterDate => after_date(value, references),
            Operation::AfterOrSameDate => after_or_same_date(value, references),

            Operation::IsInSegment | Operation::IsntInSegment => {
                error!("segment operations should be special-cased, shouldn't get here");
                false
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| Error::invalid_flag(format!("{} is not a valid operation", s)))
    }
}

// Reference values that are not plain values (resolved segments) never satisfy a comparison.
fn any_reference<F>(references: &[ConstraintValue], f: F) -> bool
where
    F: Fn(&AttributeValue) -> bool,
{
    references
        .iter()
        .any(|r| r.as_value().map(&f).unwrap_or(false))
}

// Short-circuits to false at the first reference that satisfies `f`.
fn no_reference<F>(references: &[ConstraintValue], f: F) -> bool
where
    F: Fn(&AttributeValue) -> bool,
{
    !any_reference(references, f)
}

fn every_reference<F>(references: &[ConstraintValue], f: F) -> bool
where
    F: Fn(&AttributeValue) -> bool,
{
    references
        .iter()
        .all(|r| r.as_value().map(&f).unwrap_or(false))
}

/// The reference value's type picks the family; the request value must already be in it.
fn equals(reference: &AttributeValue, value: Option<&AttributeValue>) -> bool {
    let value = match value {
        Some(v) => v,
        None => return false,
    };
    match reference {
        AttributeValue::String(_) | AttributeValue::Bool(_) | AttributeValue::Float(_) => {
            reference == value
        }
        AttributeValue::Int(r) => value.as_i64() == Some(*r),
        AttributeValue::UInt(r) => value.as_u64() == Some(*r),
        AttributeValue::Bytes(r) => matches!(value, AttributeValue::Bytes(v) if v == r),
    }
}

/// Orders the request value relative to the reference, in the reference's numeric family.
fn compare(reference: &AttributeValue, value: &AttributeValue) -> Option<Ordering> {
    match reference {
        AttributeValue::Int(r) => value.as_i64().map(|v| v.cmp(r)),
        AttributeValue::UInt(r) => value.as_u64().map(|v| v.cmp(r)),
        AttributeValue::Float(r) => value.as_f64().and_then(|v| v.partial_cmp(r)),
        _ => None,
    }
}

fn ordering_op<F: Fn(Ordering) -> bool>(
    value: Option<&AttributeValue>,
    references: &[ConstraintValue],
    f: F,
) -> bool {
    match value {
        Some(v) => every_reference(references, |r| compare(r, v).map(&f).unwrap_or(false)),
        None => false,
    }
}

fn string_op<F: Fn(&str, &str) -> bool>(
    value: Option<&AttributeValue>,
    references: &[ConstraintValue],
    f: F,
) -> bool {
    let text = match value.and_then(AttributeValue::as_text) {
        Some(t) => t,
        None => return false,
    };
    any_reference(references, |r| {
        r.as_text()
            .map(|r| f(text.as_ref(), r.as_ref()))
            .unwrap_or(false)
    })
}

fn regex_match(text: &str, pattern: &str) -> bool {
    match Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        Err(e) => {
            warn!("Invalid regex for 'matches' operator ({}): {}", e, pattern);
            false
        }
    }
}

fn time_op<F: Fn(DateTime<Utc>, DateTime<Utc>) -> bool>(
    value: Option<&AttributeValue>,
    references: &[ConstraintValue],
    f: F,
) -> bool {
    match value.and_then(AttributeValue::to_datetime) {
        Some(v) => every_reference(references, |r| {
            r.to_datetime().map(|r| f(v, r)).unwrap_or(false)
        }),
        None => false,
    }
}

/// True if the request value equals any of the reference values.
pub fn one_of(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    any_reference(references, |r| equals(r, value))
}

/// True if the request value equals none of the reference values.
pub fn not_one_of(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    no_reference(references, |r| equals(r, value))
}

/// True if the request value is greater than every reference value.
pub fn greater(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    ordering_op(value, references, |o| o == Ordering::Greater)
}

/// True if the request value is greater than or equal to every reference value.
pub fn greater_or_equal(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    ordering_op(value, references, |o| o != Ordering::Less)
}

/// True if the request value is lower than every reference value.
pub fn lower(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    ordering_op(value, references, |o| o == Ordering::Less)
}

/// True if the request value is lower than or equal to every reference value.
pub fn lower_or_equal(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    ordering_op(value, references, |o| o != Ordering::Greater)
}

pub fn exists(value: Option<&AttributeValue>) -> bool {
    value.is_some()
}

pub fn doesnt_exist(value: Option<&AttributeValue>) -> bool {
    value.is_none()
}

pub fn contains(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    string_op(value, references, |v, r| v.contains(r))
}

pub fn doesnt_contain(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    !contains(value, references)
}

pub fn starts_with(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    string_op(value, references, |v, r| v.starts_with(r))
}

pub fn doesnt_start_with(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    !starts_with(value, references)
}

pub fn ends_with(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    string_op(value, references, |v, r| v.ends_with(r))
}

pub fn doesnt_end_with(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    !ends_with(value, references)
}

/// True if the request value matches any of the reference patterns. Patterns that fail to
/// compile never match.
pub fn matches_regex(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    string_op(value, references, regex_match)
}

pub fn doesnt_match_regex(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    !matches_regex(value, references)
}

/// True if the request time is strictly before every reference time.
pub fn before_date(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    time_op(value, references, |v, r| v < r)
}

pub fn before_or_same_date(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    time_op(value, references, |v, r| v <= r)
}

/// True if the request time is strictly after every reference time.
pub fn after_date(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    time_op(value, references, |v, r| v > r)
}

pub fn after_or_same_date(value: Option<&AttributeValue>, references: &[ConstraintValue]) -> bool {
    time_op(value, references, |v, r| v >= r)
}

/// True if the request value is an IP address (optionally with a port) inside any of the
/// reference CIDR blocks.
///
/// Unlike the other operators, a reference that is not a valid CIDR block is an error: it means
/// the constraint is misconfigured, not that the request carries an unexpected type.
pub fn in_network(
    value: Option<&AttributeValue>,
    references: &[ConstraintValue],
) -> Result<bool, Error> {
    let text = match value.and_then(AttributeValue::as_text) {
        Some(t) => t,
        None => return Ok(false),
    };
    let ip = parse_ip(&text);
    for reference in references {
        let cidr = match reference.as_value().and_then(AttributeValue::as_str) {
            Some(cidr) => cidr,
            None => continue,
        };
        let network = IpNet::from_str(cidr).map_err(|_| Error::InvalidNetwork {
            cidr: cidr.to_string(),
        })?;
        if matches!(ip, Some(ip) if network.contains(&ip)) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn parse_ip(text: &str) -> Option<IpAddr> {
    text.parse::<IpAddr>()
        .ok()
        .or_else(|| text.parse::<SocketAddr>().ok().map(|s| s.ip()))
}

/// True if every referenced segment contains the attribute set. A reference that was never
/// resolved to a segment fails the check.
pub fn is_in_segment(attributes: &Attributes, references: &[ConstraintValue]) -> bool {
    references.iter().all(|r| match r.as_segment() {
        Some(segment) => segment.contains(attributes),
        None => {
            warn!("expected {:?} to be a segment, check the segment exists", r);
            false
        }
    })
}

/// True if no referenced segment contains the attribute set. A reference that was never
/// resolved to a segment fails the check.
pub fn isnt_in_segment(attributes: &Attributes, references: &[ConstraintValue]) -> bool {
    for r in references {
        match r.as_segment() {
            Some(segment) if segment.contains(attributes) => return false,
            Some(_) => (),
            None => {
                warn!("expected {:?} to be a segment, check the segment exists", r);
                return false;
            }
        }
    }
    true
}
