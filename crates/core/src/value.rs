//! Operand and stack values.

use crate::result::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

/// Two-component vector used for positions, speeds and directions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const UNIT_Y: Self = Self::new(0.0, 1.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Mirrors the vector across the horizontal axis.
    #[inline]
    pub fn negate_y(self) -> Self {
        Self::new(self.x, -self.y)
    }

    /// True for `(0, 1)` and `(0, -1)`.
    pub fn is_unit_y(self) -> bool {
        self.x == 0.0 && self.y.abs() == 1.0
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

/// A typed value: either an instruction operand or an entry on the evaluation stack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f32),
    Vector(Vec2),
    Bool(bool),
}

impl Value {
    /// Short type name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Vector(_) => "vector",
            Value::Bool(_) => "bool",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Vec2> {
        match self {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Vec2> for Value {
    fn from(v: Vec2) -> Self {
        Value::Vector(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // floats always keep their decimal point so they read back as floats
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Vector(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for Value {
    type Err = Error;

    /// Parses `42`, `1.5`, `true`, or `(x, y)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let literal = s.trim();
        if literal.is_empty() {
            return Err(Error::InvalidValue(s.to_string()));
        }

        if let Some(inner) = literal
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let (x, y) = inner
                .split_once(',')
                .ok_or_else(|| Error::InvalidValue(s.to_string()))?;
            let x = parse_float(x).ok_or_else(|| Error::InvalidValue(s.to_string()))?;
            let y = parse_float(y).ok_or_else(|| Error::InvalidValue(s.to_string()))?;
            return Ok(Value::Vector(Vec2::new(x, y)));
        }

        match literal {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }

        if looks_like_float(literal) {
            return parse_float(literal)
                .map(Value::Float)
                .ok_or_else(|| Error::InvalidValue(s.to_string()));
        }

        literal
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::InvalidValue(s.to_string()))
    }
}

fn looks_like_float(literal: &str) -> bool {
    literal.contains(['.', 'e', 'E']) || literal.ends_with("inf") || literal == "NaN"
}

fn parse_float(literal: &str) -> Option<f32> {
    literal.trim().parse::<f32>().ok()
}
