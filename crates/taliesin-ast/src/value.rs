//! Concrete values and the parameter type lattice.
//!
//! Every slot in a semantic program holds a [`Value`]. Values are immutable:
//! transforms that "change" a value always build a new one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Parameter Types
// ─────────────────────────────────────────────────────────────────────────────

/// The type of a function argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamType {
    /// Free-form text.
    String,
    /// A plain number.
    Number,
    /// A boolean flag.
    Boolean,
    /// A named entity of the given kind (e.g. `com.yelp:restaurant`).
    Entity(String),
    /// An enumeration over the given variants.
    Enum(Vec<String>),
    /// A measure in the given base unit (e.g. `C`, `m`).
    Measure(String),
    /// A point in time.
    Date,
    /// A homogeneous array of the element type.
    Array(Box<ParamType>),
}

impl ParamType {
    /// Entity type constructor.
    pub fn entity(kind: impl Into<String>) -> Self {
        Self::Entity(kind.into())
    }

    /// Measure type constructor.
    pub fn measure(unit: impl Into<String>) -> Self {
        Self::Measure(unit.into())
    }

    /// Array type constructor.
    pub fn array(elem: ParamType) -> Self {
        Self::Array(Box::new(elem))
    }

    /// The element type, if this is an array.
    pub fn elem(&self) -> Option<&ParamType> {
        match self {
            Self::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// True for types with a numeric ordering (numbers, measures, dates).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Measure(_) | Self::Date)
    }

    /// True for types that support `>=`/`<=` comparisons and sorting.
    pub fn is_comparable(&self) -> bool {
        self.is_numeric() || matches!(self, Self::String)
    }

    /// Whether a value of `self` may be used where `other` is expected.
    ///
    /// Exact type equality, with two widenings: an entity may be used as a
    /// string, and an enum value is assignable when its variants are a subset
    /// of the target's.
    pub fn assignable_to(&self, other: &ParamType) -> bool {
        match (self, other) {
            (ParamType::Entity(_), ParamType::String) => true,
            (ParamType::Enum(have), ParamType::Enum(want)) => {
                have.iter().all(|v| want.contains(v))
            }
            (ParamType::Array(a), ParamType::Array(b)) => a.assignable_to(b),
            (a, b) => a == b,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Values
// ─────────────────────────────────────────────────────────────────────────────

/// A concrete (or deferred) value in a semantic program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Free-form text.
    String(String),
    /// A plain number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
    /// A measure with a unit.
    Measure { value: f64, unit: String },
    /// An entity reference with an optional human-readable display.
    Entity {
        value: String,
        ty: String,
        display: Option<String>,
    },
    /// An enum variant.
    Enum(String),
    /// A point in time.
    Date(DateTime<Utc>),
    /// An array of values.
    Array(Vec<Value>),
    /// A reference to another argument in scope (used for param passing).
    VarRef(String),
    /// An unfilled slot (`$?`), awaiting a concrete value.
    Undefined,
}

impl Value {
    /// String value constructor.
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Entity value constructor without a display name.
    pub fn entity(value: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::Entity {
            value: value.into(),
            ty: ty.into(),
            display: None,
        }
    }

    /// Entity value constructor with a display name.
    pub fn entity_with_display(
        value: impl Into<String>,
        ty: impl Into<String>,
        display: impl Into<String>,
    ) -> Self {
        Self::Entity {
            value: value.into(),
            ty: ty.into(),
            display: Some(display.into()),
        }
    }

    /// Measure value constructor.
    pub fn measure(value: f64, unit: impl Into<String>) -> Self {
        Self::Measure {
            value,
            unit: unit.into(),
        }
    }

    /// Variable reference constructor.
    pub fn var_ref(name: impl Into<String>) -> Self {
        Self::VarRef(name.into())
    }

    /// The type of this value, when it has one.
    ///
    /// `VarRef` and `Undefined` have no intrinsic type: their type comes from
    /// the schema of the argument they stand for.
    pub fn ty(&self) -> Option<ParamType> {
        match self {
            Self::String(_) => Some(ParamType::String),
            Self::Number(_) => Some(ParamType::Number),
            Self::Boolean(_) => Some(ParamType::Boolean),
            Self::Measure { unit, .. } => Some(ParamType::Measure(unit.clone())),
            Self::Entity { ty, .. } => Some(ParamType::Entity(ty.clone())),
            Self::Enum(v) => Some(ParamType::Enum(vec![v.clone()])),
            Self::Date(_) => Some(ParamType::Date),
            Self::Array(values) => {
                let elem = values.first().and_then(Value::ty)?;
                Some(ParamType::Array(Box::new(elem)))
            }
            Self::VarRef(_) | Self::Undefined => None,
        }
    }

    /// True when the value is fully resolved (neither a slot nor a var ref).
    pub fn is_concrete(&self) -> bool {
        !matches!(self, Self::VarRef(_) | Self::Undefined)
    }

    /// True for the unfilled-slot marker.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Whether this value may fill an argument of the given type.
    pub fn fits(&self, ty: &ParamType) -> bool {
        match self.ty() {
            Some(have) => have.assignable_to(ty),
            // Slots and var refs are resolved against the schema, not here.
            None => true,
        }
    }

    /// A human-readable rendering, preferring display names over raw ids.
    pub fn human_readable(&self) -> String {
        match self {
            Self::Entity {
                display: Some(d), ..
            } => d.clone(),
            Self::Entity { value, .. } => value.clone(),
            other => other.to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
