//! Invert-aware value transforms.
//!
//! Every transform is pure. Orientation is read from the [`GravityQuery`] at the moment the
//! transform is called, so a body patched once keeps following later orientation changes.

use crate::{Error, Result};
use gravflip_core::{TransformId, Value, Vec2};
use gravflip_gravity::GravityQuery;

/// `lhs + rhs`, with `rhs` mirrored vertically while inverted.
pub fn vec_add(gravity: &dyn GravityQuery, lhs: Vec2, rhs: Vec2) -> Vec2 {
    lhs + invert_y(gravity, rhs)
}

/// `lhs - rhs`, with `rhs` mirrored vertically while inverted.
pub fn vec_sub(gravity: &dyn GravityQuery, lhs: Vec2, rhs: Vec2) -> Vec2 {
    lhs - invert_y(gravity, rhs)
}

/// `min(a, b)`, or `max(a, b)` while inverted.
pub fn float_min(gravity: &dyn GravityQuery, a: f32, b: f32) -> f32 {
    if gravity.is_inverted() {
        a.max(b)
    } else {
        a.min(b)
    }
}

/// `max(a, b)`, or `min(a, b)` while inverted.
pub fn float_max(gravity: &dyn GravityQuery, a: f32, b: f32) -> f32 {
    if gravity.is_inverted() {
        a.min(b)
    } else {
        a.max(b)
    }
}

/// Integer form of [`float_min`].
pub fn int_min(gravity: &dyn GravityQuery, a: i64, b: i64) -> i64 {
    if gravity.is_inverted() {
        a.max(b)
    } else {
        a.min(b)
    }
}

/// Integer form of [`float_max`].
pub fn int_max(gravity: &dyn GravityQuery, a: i64, b: i64) -> i64 {
    if gravity.is_inverted() {
        a.min(b)
    } else {
        a.max(b)
    }
}

/// Sign of `a` as -1, 0 or 1, negated while inverted. NaN passes through.
pub fn sign(gravity: &dyn GravityQuery, a: f32) -> f32 {
    let s = signum(a);
    if gravity.is_inverted() {
        -s
    } else {
        s
    }
}

pub fn sign_int(gravity: &dyn GravityQuery, a: i64) -> i64 {
    let s = a.signum();
    if gravity.is_inverted() {
        -s
    } else {
        s
    }
}

/// `(x, -y)`, independent of orientation.
#[inline]
pub fn negate_y(v: Vec2) -> Vec2 {
    v.negate_y()
}

/// `negate_y(v)` while inverted, `v` otherwise.
pub fn invert_y(gravity: &dyn GravityQuery, v: Vec2) -> Vec2 {
    if gravity.is_inverted() {
        negate_y(v)
    } else {
        v
    }
}

pub fn negate_float(gravity: &dyn GravityQuery, f: f32) -> f32 {
    if gravity.is_inverted() {
        -f
    } else {
        f
    }
}

/// Wraps on `i64::MIN`.
pub fn negate_int(gravity: &dyn GravityQuery, i: i64) -> i64 {
    if gravity.is_inverted() {
        i.wrapping_neg()
    } else {
        i
    }
}

/// `f32::signum` maps zero to one; this keeps zero at zero.
pub(crate) fn signum(a: f32) -> f32 {
    if a == 0.0 {
        0.0
    } else {
        a.signum()
    }
}

/// Dispatches an injected call to its transform.
///
/// `args` are the operands the replaced computation would have consumed, in push order.
pub fn invoke(transform: TransformId, gravity: &dyn GravityQuery, args: &[Value]) -> Result<Value> {
    if args.len() != transform.arity() {
        return Err(Error::TransformArity {
            transform,
            expected: transform.arity(),
            found: args.len(),
        });
    }

    let type_error = |found: &Value| Error::TransformType {
        transform,
        found: found.kind(),
    };

    let value = match (transform, args) {
        (TransformId::VecAdd, [Value::Vector(a), Value::Vector(b)]) => {
            Value::Vector(vec_add(gravity, *a, *b))
        }
        (TransformId::VecSub, [Value::Vector(a), Value::Vector(b)]) => {
            Value::Vector(vec_sub(gravity, *a, *b))
        }
        (TransformId::FloatMin, [Value::Float(a), Value::Float(b)]) => {
            Value::Float(float_min(gravity, *a, *b))
        }
        (TransformId::FloatMax, [Value::Float(a), Value::Float(b)]) => {
            Value::Float(float_max(gravity, *a, *b))
        }
        (TransformId::FloatMin, [Value::Int(a), Value::Int(b)]) => {
            Value::Int(int_min(gravity, *a, *b))
        }
        (TransformId::FloatMax, [Value::Int(a), Value::Int(b)]) => {
            Value::Int(int_max(gravity, *a, *b))
        }
        (TransformId::Sign, [Value::Float(a)]) => Value::Float(sign(gravity, *a)),
        (TransformId::Sign, [Value::Int(a)]) => Value::Int(sign_int(gravity, *a)),
        (TransformId::NegateY, [Value::Vector(v)]) => Value::Vector(invert_y(gravity, *v)),
        (TransformId::NegateFloat, [Value::Float(f)]) => Value::Float(negate_float(gravity, *f)),
        (TransformId::NegateInt, [Value::Int(i)]) => Value::Int(negate_int(gravity, *i)),
        (_, [a]) => return Err(type_error(a)),
        (_, [a, b]) => {
            // report the first operand that does not fit
            let expected_vector = matches!(transform, TransformId::VecAdd | TransformId::VecSub);
            let fits = |v: &Value| {
                if expected_vector {
                    matches!(v, Value::Vector(_))
                } else {
                    matches!(v, Value::Float(_) | Value::Int(_))
                }
            };
            return Err(type_error(if fits(a) { b } else { a }));
        }
        _ => {
            return Err(Error::TransformArity {
                transform,
                expected: transform.arity(),
                found: args.len(),
            })
        }
    };
    Ok(value)
}
