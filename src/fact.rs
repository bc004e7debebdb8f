//! Ground facts: the atomic truth units of a trace state.
//!
//! A trace position is described by the set of [`GroundFact`]s holding there.
//! Facts appear in queries in literal form only; negation wraps a ground
//! fact directly and is never nested.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Sensor placement on the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Left wrist band.
    LeftWrist,
    /// Right wrist band.
    RightWrist,
    /// Waist clip.
    Waist,
    /// Chest strap.
    Chest,
    /// Left foot pod.
    LeftFoot,
    /// Right foot pod.
    RightFoot,
    /// Placement-independent.
    Any,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::Waist => "waist",
            Self::Chest => "chest",
            Self::LeftFoot => "left_foot",
            Self::RightFoot => "right_foot",
            Self::Any => "any",
        };
        write!(f, "{s}")
    }
}

/// Opaque argument of a ground fact.
///
/// Numbers compare and hash by IEEE bit pattern so facts can key hash maps
/// and solver caches structurally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// A string attribute.
    Str(String),
    /// A numeric attribute.
    Number(f64),
    /// A sensor location attribute.
    Location(Location),
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Location(a), Self::Location(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Str(s) => {
                state.write_u8(0);
                s.hash(state);
            }
            Self::Number(n) => {
                state.write_u8(1);
                state.write_u64(n.to_bits());
            }
            Self::Location(l) => {
                state.write_u8(2);
                l.hash(state);
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Location(l) => write!(f, "{l}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<Location> for AttributeValue {
    fn from(v: Location) -> Self {
        Self::Location(v)
    }
}

/// A named predicate with an ordered tuple of opaque attribute values.
///
/// Equality is structural. Attribute values are compared verbatim; the
/// evaluator never interprets them (a probability threshold, for example,
/// is encoded into the fact name by the upstream classifier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundFact {
    /// Predicate name.
    pub name: String,
    /// Ordered argument tuple.
    pub args: Vec<AttributeValue>,
}

impl GroundFact {
    /// Creates a ground fact from a name and argument tuple.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<AttributeValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// A classified-gesture fact as produced by the upstream workflow.
    #[must_use]
    pub fn gesture(name: impl Into<String>, probability: f64, location: Location) -> Self {
        Self::new(
            "gesture",
            vec![
                AttributeValue::Str(name.into()),
                AttributeValue::Number(probability),
                AttributeValue::Location(location),
            ],
        )
    }
}

impl fmt::Display for GroundFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A fact literal: a ground fact or its negation.
///
/// Negation is never nested; [`Fact::negated`] flips between the two forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fact {
    /// The ground fact holds at the current position.
    Holds(GroundFact),
    /// The ground fact does not hold at the current position.
    Negated(GroundFact),
}

impl Fact {
    /// The complementary literal.
    #[must_use]
    pub fn negated(&self) -> Self {
        match self {
            Self::Holds(f) => Self::Negated(f.clone()),
            Self::Negated(f) => Self::Holds(f.clone()),
        }
    }

    /// The underlying ground fact.
    #[must_use]
    pub const fn ground(&self) -> &GroundFact {
        match self {
            Self::Holds(f) | Self::Negated(f) => f,
        }
    }

    /// Whether this literal is satisfied by the given fact set.
    #[must_use]
    pub fn holds_in(&self, facts: &HashSet<GroundFact>) -> bool {
        match self {
            Self::Holds(f) => facts.contains(f),
            Self::Negated(f) => !facts.contains(f),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Holds(g) => write!(f, "{g}"),
            Self::Negated(g) => write!(f, "!{g}"),
        }
    }
}

impl From<GroundFact> for Fact {
    fn from(f: GroundFact) -> Self {
        Self::Holds(f)
    }
}
