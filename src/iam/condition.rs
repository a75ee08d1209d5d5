//! Condition operators for IAM policies
//!
//! Built-in operator families:
//! - String operations (Equals, EqualsIgnoreCase, Like and their negations)
//! - Numeric operations (Equals, LessThan, GreaterThan, ...)
//! - Date operations (same comparisons on parsed timestamps)
//! - ARN patterns, base64 binary equality, IP ranges, `Null` and `Bool`
//!
//! Every base operator, built-in or registered, also gets three derived forms:
//! `<Op>IfExists`, `ForAllValues:<Op>` and `ForAnyValue:<Op>`.
//!
//! All operators are total: operands of the wrong type make them return
//! `false`, never panic.

use super::pattern::{PatternMatcher, PatternMode};
use super::value::ConditionValue;
use crate::error::{PolicyError, Result};
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use ipnetwork::IpNetwork;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

/// Signature of a registered condition function: `(request value, policy value)`.
/// The request value is `None` when the context key is undefined.
pub type ConditionFn = Arc<dyn Fn(Option<&ConditionValue>, &ConditionValue) -> bool + Send + Sync>;

const IF_EXISTS_SUFFIX: &str = "IfExists";
const FOR_ALL_VALUES_PREFIX: &str = "ForAllValues:";
const FOR_ANY_VALUE_PREFIX: &str = "ForAnyValue:";

/// Built-in base operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    DateEquals,
    DateNotEquals,
    DateLessThan,
    DateLessThanEquals,
    DateGreaterThan,
    DateGreaterThanEquals,
    StringEquals,
    StringNotEquals,
    StringEqualsIgnoreCase,
    StringNotEqualsIgnoreCase,
    StringLike,
    StringNotLike,
    ArnLike,
    ArnNotLike,
    ArnEquals,
    ArnNotEquals,
    BinaryEquals,
    BinaryNotEquals,
    IpAddress,
    NotIpAddress,
    Null,
    Bool,
}

impl Builtin {
    pub const ALL: [Builtin; 28] = [
        Builtin::NumericEquals,
        Builtin::NumericNotEquals,
        Builtin::NumericLessThan,
        Builtin::NumericLessThanEquals,
        Builtin::NumericGreaterThan,
        Builtin::NumericGreaterThanEquals,
        Builtin::DateEquals,
        Builtin::DateNotEquals,
        Builtin::DateLessThan,
        Builtin::DateLessThanEquals,
        Builtin::DateGreaterThan,
        Builtin::DateGreaterThanEquals,
        Builtin::StringEquals,
        Builtin::StringNotEquals,
        Builtin::StringEqualsIgnoreCase,
        Builtin::StringNotEqualsIgnoreCase,
        Builtin::StringLike,
        Builtin::StringNotLike,
        Builtin::ArnLike,
        Builtin::ArnNotLike,
        Builtin::ArnEquals,
        Builtin::ArnNotEquals,
        Builtin::BinaryEquals,
        Builtin::BinaryNotEquals,
        Builtin::IpAddress,
        Builtin::NotIpAddress,
        Builtin::Null,
        Builtin::Bool,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::NumericEquals => "NumericEquals",
            Builtin::NumericNotEquals => "NumericNotEquals",
            Builtin::NumericLessThan => "NumericLessThan",
            Builtin::NumericLessThanEquals => "NumericLessThanEquals",
            Builtin::NumericGreaterThan => "NumericGreaterThan",
            Builtin::NumericGreaterThanEquals => "NumericGreaterThanEquals",
            Builtin::DateEquals => "DateEquals",
            Builtin::DateNotEquals => "DateNotEquals",
            Builtin::DateLessThan => "DateLessThan",
            Builtin::DateLessThanEquals => "DateLessThanEquals",
            Builtin::DateGreaterThan => "DateGreaterThan",
            Builtin::DateGreaterThanEquals => "DateGreaterThanEquals",
            Builtin::StringEquals => "StringEquals",
            Builtin::StringNotEquals => "StringNotEquals",
            Builtin::StringEqualsIgnoreCase => "StringEqualsIgnoreCase",
            Builtin::StringNotEqualsIgnoreCase => "StringNotEqualsIgnoreCase",
            Builtin::StringLike => "StringLike",
            Builtin::StringNotLike => "StringNotLike",
            Builtin::ArnLike => "ArnLike",
            Builtin::ArnNotLike => "ArnNotLike",
            Builtin::ArnEquals => "ArnEquals",
            Builtin::ArnNotEquals => "ArnNotEquals",
            Builtin::BinaryEquals => "BinaryEquals",
            Builtin::BinaryNotEquals => "BinaryNotEquals",
            Builtin::IpAddress => "IpAddress",
            Builtin::NotIpAddress => "NotIpAddress",
            Builtin::Null => "Null",
            Builtin::Bool => "Bool",
        }
    }

    /// Apply the operator to a request value `a` and a policy value `b`
    pub fn apply(
        self,
        matcher: &PatternMatcher,
        a: Option<&ConditionValue>,
        b: &ConditionValue,
    ) -> bool {
        match self {
            Builtin::NumericEquals => holds(numeric_equals(a, b)),
            Builtin::NumericNotEquals => negated(numeric_equals(a, b)),
            Builtin::NumericLessThan => holds(numeric_less_than(a, b)),
            Builtin::NumericGreaterThanEquals => negated(numeric_less_than(a, b)),
            Builtin::NumericGreaterThan => holds(numeric_greater_than(a, b)),
            Builtin::NumericLessThanEquals => negated(numeric_greater_than(a, b)),
            Builtin::DateEquals => holds(date_equals(a, b)),
            Builtin::DateNotEquals => negated(date_equals(a, b)),
            Builtin::DateLessThan => holds(date_less_than(a, b)),
            Builtin::DateGreaterThanEquals => negated(date_less_than(a, b)),
            Builtin::DateGreaterThan => holds(date_greater_than(a, b)),
            Builtin::DateLessThanEquals => negated(date_greater_than(a, b)),
            Builtin::StringEquals => holds(string_equals(a, b)),
            Builtin::StringNotEquals => negated(string_equals(a, b)),
            Builtin::StringEqualsIgnoreCase => holds(string_equals_ignore_case(a, b)),
            Builtin::StringNotEqualsIgnoreCase => negated(string_equals_ignore_case(a, b)),
            Builtin::StringLike => holds(like(matcher, a, b, PatternMode::Glob)),
            Builtin::StringNotLike => negated(like(matcher, a, b, PatternMode::Glob)),
            Builtin::ArnLike | Builtin::ArnEquals => {
                holds(like(matcher, a, b, PatternMode::ArnSegment))
            }
            Builtin::ArnNotLike | Builtin::ArnNotEquals => {
                negated(like(matcher, a, b, PatternMode::ArnSegment))
            }
            Builtin::BinaryEquals => holds(binary_equals(a, b)),
            Builtin::BinaryNotEquals => negated(binary_equals(a, b)),
            Builtin::IpAddress => holds(ip_address(a, b)),
            Builtin::NotIpAddress => negated(ip_address(a, b)),
            Builtin::Null => holds(null(a, b)),
            Builtin::Bool => holds(boolean(a, b)),
        }
    }
}

// Comparisons return `None` when the operands have the wrong type, so that a
// negated operator is still `false` on a type mismatch.

fn holds(outcome: Option<bool>) -> bool {
    outcome == Some(true)
}

fn negated(outcome: Option<bool>) -> bool {
    outcome == Some(false)
}

fn numbers(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<(f64, f64)> {
    Some((a?.as_number()?, b.as_number()?))
}

fn numeric_equals(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = numbers(a, b)?;
    Some(x == y)
}

fn numeric_less_than(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = numbers(a, b)?;
    Some(x < y)
}

fn numeric_greater_than(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = numbers(a, b)?;
    Some(x > y)
}

/// Parse a timestamp operand
///
/// Accepts RFC 3339, ISO 8601 with a `+hhmm` offset, naive date-times and
/// plain dates (both read as UTC), or a number of epoch milliseconds.
pub fn parse_timestamp(value: &ConditionValue) -> Option<DateTime<Utc>> {
    match value {
        ConditionValue::Number(millis) if millis.is_finite() => {
            Utc.timestamp_millis_opt(*millis as i64).single()
        }
        ConditionValue::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z"))
                .map(|parsed| parsed.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| Utc.from_utc_datetime(&naive))
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                        .map(|naive| Utc.from_utc_datetime(&naive))
                })
        }
        _ => None,
    }
}

fn timestamps(
    a: Option<&ConditionValue>,
    b: &ConditionValue,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((parse_timestamp(a?)?, parse_timestamp(b)?))
}

fn date_equals(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = timestamps(a, b)?;
    Some(x == y)
}

fn date_less_than(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = timestamps(a, b)?;
    Some(x < y)
}

fn date_greater_than(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = timestamps(a, b)?;
    Some(x > y)
}

fn strings<'a>(a: Option<&'a ConditionValue>, b: &'a ConditionValue) -> Option<(&'a str, &'a str)> {
    Some((a?.as_str()?, b.as_str()?))
}

fn string_equals(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = strings(a, b)?;
    Some(x == y)
}

fn string_equals_ignore_case(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let (x, y) = strings(a, b)?;
    Some(x.to_lowercase() == y.to_lowercase())
}

/// Wildcard match; an undefined request value matches as `""`
fn like(
    matcher: &PatternMatcher,
    a: Option<&ConditionValue>,
    b: &ConditionValue,
    mode: PatternMode,
) -> Option<bool> {
    let pattern = b.as_str()?;
    let subject = match a {
        None => None,
        Some(value) => Some(value.as_str()?),
    };
    Some(matcher.matches(subject, pattern, mode))
}

fn base64_engine() -> GeneralPurpose {
    GeneralPurpose::new(
        &alphabet::STANDARD,
        GeneralPurposeConfig::new()
            .with_decode_allow_trailing_bits(true)
            .with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
}

/// Compares every byte without an early exit.
///
/// This keeps the comparison shape independent of where the first difference
/// is, but it is not a constant-time guarantee.
fn bytes_equal(left: &[u8], right: &[u8]) -> bool {
    let mut diff = left.len() ^ right.len();
    for (x, y) in left.iter().zip(right) {
        diff |= usize::from(x ^ y);
    }
    diff == 0
}

fn binary_equals(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let bytes = a?.as_binary()?;
    let expected = base64_engine().decode(b.as_str()?).ok()?;
    Some(bytes_equal(bytes, &expected))
}

/// Address-then-range: `a` is the request address, `b` a CIDR block or an
/// exact address
fn ip_address(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let address = unmap(a?.as_str()?.trim().parse().ok()?);
    let range = b.as_str()?.trim();

    if range.contains('/') {
        let network: IpNetwork = range.parse().ok()?;
        Some(network.contains(address))
    } else {
        let exact = unmap(range.parse().ok()?);
        Some(exact == address)
    }
}

/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) compare as IPv4
fn unmap(address: IpAddr) -> IpAddr {
    match address {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(address, IpAddr::V4),
        v4 => v4,
    }
}

/// `Null` with `true` requires the key to be undefined, with `false` defined
fn null(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    let expect_undefined = b.as_bool()?;
    Some(expect_undefined == a.is_none())
}

fn boolean(a: Option<&ConditionValue>, b: &ConditionValue) -> Option<bool> {
    Some(a?.as_bool()? == b.as_bool()?)
}

/// True iff every subject element matches at least one value.
/// Vacuously true for an empty subject.
pub fn for_all_values<A, B>(
    subject: &[A],
    values: &[B],
    mut matches: impl FnMut(&A, &B) -> bool,
) -> bool {
    subject
        .iter()
        .all(|item| values.iter().any(|value| matches(item, value)))
}

/// True iff at least one subject element matches at least one value.
/// False for an empty subject.
pub fn for_any_value<A, B>(
    subject: &[A],
    values: &[B],
    mut matches: impl FnMut(&A, &B) -> bool,
) -> bool {
    subject
        .iter()
        .any(|item| values.iter().any(|value| matches(item, value)))
}

/// A request value seen as a sequence: list items, a scalar, or one undefined item
fn subject_items(subject: Option<&ConditionValue>) -> Vec<Option<&ConditionValue>> {
    match subject {
        None => vec![None],
        Some(ConditionValue::List(items)) => items.iter().map(Some).collect(),
        Some(value) => vec![Some(value)],
    }
}

#[derive(Clone)]
enum BaseOperator {
    Builtin(Builtin),
    Custom(ConditionFn),
}

impl BaseOperator {
    fn call(
        &self,
        matcher: &PatternMatcher,
        a: Option<&ConditionValue>,
        b: &ConditionValue,
    ) -> bool {
        match self {
            BaseOperator::Builtin(builtin) => builtin.apply(matcher, a, b),
            BaseOperator::Custom(func) => func(a, b),
        }
    }
}

/// How a registered operator wraps its base operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    /// The base operator itself
    Plain,
    /// `<Op>IfExists`: an undefined request value is accepted
    IfExists,
    /// `ForAllValues:<Op>`
    ForAllValues,
    /// `ForAnyValue:<Op>`
    ForAnyValue,
}

/// A resolved condition operator
#[derive(Clone)]
pub struct Operator {
    name: String,
    base: BaseOperator,
    modifier: Modifier,
}

impl Operator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// Quantified operators compare the whole request value set
    pub fn is_quantified(&self) -> bool {
        matches!(self.modifier, Modifier::ForAllValues | Modifier::ForAnyValue)
    }

    /// Whether an undefined context key reaches this operator as undefined
    /// rather than as its literal key text
    pub fn observes_absence(&self) -> bool {
        match self.modifier {
            Modifier::IfExists => true,
            Modifier::Plain => matches!(self.base, BaseOperator::Builtin(Builtin::Null)),
            Modifier::ForAllValues | Modifier::ForAnyValue => false,
        }
    }

    /// Apply the operator to one request value and one policy operand.
    /// Quantified operators treat a list operand as the value set.
    ///
    /// # Examples
    /// ```
    /// use pbac_rs::iam::{ConditionRegistry, ConditionValue, PatternMatcher};
    ///
    /// let registry = ConditionRegistry::default();
    /// let matcher = PatternMatcher::default();
    /// let like = registry.get("StringLike").unwrap();
    /// assert!(like.call(&matcher, Some(&"foo".into()), &"fo*".into()));
    ///
    /// let if_exists = registry.get("StringEqualsIfExists").unwrap();
    /// assert!(if_exists.call(&matcher, None, &"anything".into()));
    /// ```
    pub fn call(
        &self,
        matcher: &PatternMatcher,
        subject: Option<&ConditionValue>,
        operand: &ConditionValue,
    ) -> bool {
        match self.modifier {
            Modifier::Plain => self.base.call(matcher, subject, operand),
            Modifier::IfExists => subject.is_none() || self.base.call(matcher, subject, operand),
            Modifier::ForAllValues | Modifier::ForAnyValue => {
                self.evaluate(matcher, subject, operand.as_slice())
            }
        }
    }

    /// Evaluate one condition entry: the request value against every
    /// policy-declared value of that key.
    ///
    /// Unquantified operators need one matching value. Quantified operators
    /// apply their own all/any rule over the request value set.
    pub fn evaluate<V: Borrow<ConditionValue>>(
        &self,
        matcher: &PatternMatcher,
        subject: Option<&ConditionValue>,
        values: &[V],
    ) -> bool {
        let base = |a: Option<&ConditionValue>, b: &V| self.base.call(matcher, a, b.borrow());

        match self.modifier {
            Modifier::Plain => values.iter().any(|value| base(subject, value)),
            Modifier::IfExists => {
                subject.is_none() || values.iter().any(|value| base(subject, value))
            }
            Modifier::ForAllValues => {
                for_all_values(&subject_items(subject), values, |item, value| base(*item, value))
            }
            Modifier::ForAnyValue => {
                for_any_value(&subject_items(subject), values, |item, value| base(*item, value))
            }
        }
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = match &self.base {
            BaseOperator::Builtin(builtin) => builtin.name(),
            BaseOperator::Custom(_) => "<custom>",
        };
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("base", &base)
            .field("modifier", &self.modifier)
            .finish()
    }
}

/// Table of condition operators owned by a policy engine
///
/// Holds every base operator under its own name plus its three derived forms.
#[derive(Clone)]
pub struct ConditionRegistry {
    operators: HashMap<String, Operator>,
}

impl ConditionRegistry {
    pub fn builder() -> ConditionRegistryBuilder {
        ConditionRegistryBuilder::default()
    }

    fn derive(bases: BTreeMap<String, BaseOperator>) -> Self {
        let mut operators = HashMap::with_capacity(bases.len() * 4);

        for (name, base) in bases {
            let variants = [
                (name.clone(), Modifier::Plain),
                (format!("{name}{IF_EXISTS_SUFFIX}"), Modifier::IfExists),
                (format!("{FOR_ALL_VALUES_PREFIX}{name}"), Modifier::ForAllValues),
                (format!("{FOR_ANY_VALUE_PREFIX}{name}"), Modifier::ForAnyValue),
            ];

            for (variant_name, modifier) in variants {
                let operator = Operator {
                    name: variant_name.clone(),
                    base: base.clone(),
                    modifier,
                };
                operators.insert(variant_name, operator);
            }
        }

        ConditionRegistry { operators }
    }

    /// Look up an operator by its full name, e.g. `ForAnyValue:StringLike`
    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Names of every registered operator, derived forms included
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operators.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        let bases = Builtin::ALL
            .iter()
            .map(|builtin| (builtin.name().to_string(), BaseOperator::Builtin(*builtin)))
            .collect();
        Self::derive(bases)
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("operators", &self.operators.len())
            .finish()
    }
}

/// Builder registering custom operators over the built-in set
#[derive(Default)]
pub struct ConditionRegistryBuilder {
    custom: Vec<(String, ConditionFn)>,
}

impl ConditionRegistryBuilder {
    /// Register a custom base operator; a built-in of the same name is replaced
    pub fn register<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Option<&ConditionValue>, &ConditionValue) -> bool + Send + Sync + 'static,
    {
        self.custom.push((name.into(), Arc::new(func)));
        self
    }

    /// Build the registry, deriving the `IfExists` / `ForAllValues:` /
    /// `ForAnyValue:` forms of every base operator
    pub fn build(self) -> Result<ConditionRegistry> {
        let mut bases: BTreeMap<String, BaseOperator> = Builtin::ALL
            .iter()
            .map(|builtin| (builtin.name().to_string(), BaseOperator::Builtin(*builtin)))
            .collect();

        for (name, func) in self.custom {
            if name.is_empty()
                || name.contains(':')
                || name.ends_with(IF_EXISTS_SUFFIX)
                || name.chars().any(char::is_whitespace)
            {
                return Err(PolicyError::InvalidOperatorName(name));
            }
            bases.insert(name, BaseOperator::Custom(func));
        }

        Ok(ConditionRegistry::derive(bases))
    }
}

impl std::fmt::Debug for ConditionRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.custom.iter().map(|(name, _)| name))
            .finish()
    }
}
