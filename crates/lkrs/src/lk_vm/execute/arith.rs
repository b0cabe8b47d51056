// Arithmetic semantics.
//
// Every operator maps to (metamethod, integer kernel, float kernel).
// Integer kernels apply only when both operands are Int (bitwise ops also
// accept exactly-integral floats); otherwise operands coerce to Float,
// with numeric-looking strings parsed Int-first. If no numeric path
// applies, the metamethod is tried, then string concatenation for `+`.

use crate::compiler::str_to_number;
use crate::lk_value::{LkValue, float_to_int_exact};
use crate::lk_vm::{LkResult, LkVm};
use crate::objects::StringId;

use super::call_value_single;
use super::metamethod::get_metamethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivZero;

// ---- pure integer kernels (shared with the constant folder) ----

/// Floor division; rounds toward negative infinity.
pub fn int_idiv(a: i64, b: i64) -> Result<i64, DivZero> {
    if b == 0 {
        return Err(DivZero);
    }
    if b == -1 {
        // i64::MIN / -1 overflows; wraps like C Lua.
        return Ok(a.wrapping_neg());
    }
    let q = a / b;
    if a % b != 0 && (a ^ b) < 0 {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Modulo matching `a - floor(a/b)*b`; the result takes the divisor sign.
pub fn int_mod(a: i64, b: i64) -> Result<i64, DivZero> {
    if b == 0 {
        return Err(DivZero);
    }
    if b == -1 {
        return Ok(0);
    }
    let r = a % b;
    if r != 0 && (r ^ b) < 0 {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

pub fn flt_idiv(a: f64, b: f64) -> f64 {
    (a / b).floor()
}

pub fn flt_mod(a: f64, b: f64) -> f64 {
    a - (a / b).floor() * b
}

/// Logical shift on 64-bit two's-complement. A negative count shifts the
/// other way; |count| >= 64 produces 0.
pub fn shift_left(a: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((a as u64) << n) as i64
    } else {
        ((a as u64) >> -n) as i64
    }
}

// ---- coercions ----

enum Num {
    Int(i64),
    Float(f64),
}

/// Numeric view of an operand; numeric-looking strings count.
fn to_number(vm: &LkVm, v: &LkValue) -> Option<Num> {
    match v {
        LkValue::Int(i) => Some(Num::Int(*i)),
        LkValue::Float(f) => Some(Num::Float(*f)),
        LkValue::Str(id) => match str_to_number(vm.pool.strings.get(*id))? {
            LkValue::Int(i) => Some(Num::Int(i)),
            LkValue::Float(f) => Some(Num::Float(f)),
            _ => None,
        },
        _ => None,
    }
}

fn to_int_exact(vm: &LkVm, v: &LkValue) -> Option<i64> {
    match to_number(vm, v)? {
        Num::Int(i) => Some(i),
        Num::Float(f) => float_to_int_exact(f),
    }
}

impl ArithOp {
    fn metamethod(self, vm: &LkVm) -> StringId {
        let n = &vm.names;
        match self {
            ArithOp::Add => n.add,
            ArithOp::Sub => n.sub,
            ArithOp::Mul => n.mul,
            ArithOp::Mod => n.modulo,
            ArithOp::Pow => n.pow,
            ArithOp::Div => n.div,
            ArithOp::IDiv => n.idiv,
            ArithOp::BAnd => n.band,
            ArithOp::BOr => n.bor,
            ArithOp::BXor => n.bxor,
            ArithOp::Shl => n.shl,
            ArithOp::Shr => n.shr,
        }
    }

    fn is_bitwise(self) -> bool {
        matches!(
            self,
            ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr
        )
    }

    /// Operators with an integer kernel (`/` and `^` are float-only).
    fn has_int_kernel(self) -> bool {
        matches!(
            self,
            ArithOp::Add | ArithOp::Sub | ArithOp::Mul | ArithOp::Mod | ArithOp::IDiv
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Mod => "%",
            ArithOp::Pow => "^",
            ArithOp::Div => "/",
            ArithOp::IDiv => "~/",
            ArithOp::BAnd => "&",
            ArithOp::BOr => "|",
            ArithOp::BXor => "~",
            ArithOp::Shl => "<<",
            ArithOp::Shr => ">>",
        }
    }
}

pub(crate) fn arith(vm: &mut LkVm, op: ArithOp, a: LkValue, b: LkValue) -> LkResult<LkValue> {
    if op.is_bitwise() {
        if let (Some(x), Some(y)) = (to_int_exact(vm, &a), to_int_exact(vm, &b)) {
            let v = match op {
                ArithOp::BAnd => x & y,
                ArithOp::BOr => x | y,
                ArithOp::BXor => x ^ y,
                ArithOp::Shl => shift_left(x, y),
                ArithOp::Shr => shift_left(x, y.wrapping_neg()),
                _ => unreachable!(),
            };
            return Ok(LkValue::Int(v));
        }
        // Numeric but fractional: a dedicated error beats the generic one.
        if to_number(vm, &a).is_some() && to_number(vm, &b).is_some() {
            if get_metamethod(vm, &a, op.metamethod(vm)).is_none()
                && get_metamethod(vm, &b, op.metamethod(vm)).is_none()
            {
                return Err(vm.rt_error("number has no integer representation"));
            }
        }
    } else if matches!((&a, &b), (LkValue::Int(_), LkValue::Int(_))) && op.has_int_kernel() {
        let (LkValue::Int(x), LkValue::Int(y)) = (a, b) else {
            unreachable!()
        };
        let v = match op {
            ArithOp::Add => x.wrapping_add(y),
            ArithOp::Sub => x.wrapping_sub(y),
            ArithOp::Mul => x.wrapping_mul(y),
            ArithOp::Mod => {
                int_mod(x, y).map_err(|_| vm.rt_error("attempt to perform 'n%0'"))?
            }
            ArithOp::IDiv => {
                int_idiv(x, y).map_err(|_| vm.rt_error("attempt to perform 'n~/0'"))?
            }
            _ => unreachable!(),
        };
        return Ok(LkValue::Int(v));
    } else if let (Some(x), Some(y)) = (to_number(vm, &a), to_number(vm, &b)) {
        let (x, y) = (num_to_f64(x), num_to_f64(y));
        let v = match op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Mod => flt_mod(x, y),
            ArithOp::Pow => x.powf(y),
            ArithOp::Div => x / y,
            ArithOp::IDiv => flt_idiv(x, y),
            _ => unreachable!(),
        };
        return Ok(LkValue::Float(v));
    }

    // Metamethod fallback: the left operand's table wins.
    let mm_name = op.metamethod(vm);
    let mm = get_metamethod(vm, &a, mm_name).or_else(|| get_metamethod(vm, &b, mm_name));
    if let Some(mm) = mm {
        return call_value_single(vm, mm, &[a, b]);
    }

    // `+` doubles as string concatenation.
    if op == ArithOp::Add {
        if let (LkValue::Str(x), LkValue::Str(y)) = (&a, &b) {
            let joined = format!("{}{}", vm.pool.strings.get(*x), vm.pool.strings.get(*y));
            return Ok(vm.new_string(&joined));
        }
    }

    let bad = if to_number(vm, &a).is_none() { &a } else { &b };
    let msg = format!(
        "attempt to perform '{}' on a {} value",
        op.name(),
        bad.type_name()
    );
    Err(vm.rt_error(msg))
}

pub(crate) fn arith_unm(vm: &mut LkVm, v: LkValue) -> LkResult<LkValue> {
    match to_number(vm, &v) {
        Some(Num::Int(i)) if matches!(v, LkValue::Int(_)) => Ok(LkValue::Int(i.wrapping_neg())),
        Some(n) => Ok(LkValue::Float(-num_to_f64(n))),
        None => {
            if let Some(mm) = get_metamethod(vm, &v, vm.names.unm) {
                call_value_single(vm, mm, &[v, v])
            } else {
                let msg = format!("attempt to perform '-' on a {} value", v.type_name());
                Err(vm.rt_error(msg))
            }
        }
    }
}

pub(crate) fn arith_bnot(vm: &mut LkVm, v: LkValue) -> LkResult<LkValue> {
    match to_int_exact(vm, &v) {
        Some(i) => Ok(LkValue::Int(!i)),
        None => {
            if let Some(mm) = get_metamethod(vm, &v, vm.names.bnot) {
                call_value_single(vm, mm, &[v, v])
            } else {
                let msg = format!("attempt to perform '~' on a {} value", v.type_name());
                Err(vm.rt_error(msg))
            }
        }
    }
}

fn num_to_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

// ---- exact Int/Float comparison ----

/// `i < f` without losing precision on large magnitudes.
pub fn int_lt_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9.223372036854776e18 {
        return true;
    }
    if f < -9.223372036854776e18 {
        return false;
    }
    let k = f.floor();
    let frac = f - k;
    let k = k as i64;
    i < k || (i == k && frac > 0.0)
}

/// `f < i` without losing precision.
pub fn float_lt_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9.223372036854776e18 {
        return false;
    }
    if f < -9.223372036854776e18 {
        return true;
    }
    (f.floor() as i64) < i
}

/// `i <= f` without losing precision.
pub fn int_le_float(i: i64, f: f64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9.223372036854776e18 {
        return true;
    }
    if f < -9.223372036854776e18 {
        return false;
    }
    i <= f.floor() as i64
}

/// `f <= i` without losing precision.
pub fn float_le_int(f: f64, i: i64) -> bool {
    if f.is_nan() {
        return false;
    }
    if f >= 9.223372036854776e18 {
        return false;
    }
    if f < -9.223372036854776e18 {
        return true;
    }
    let k = f.floor();
    let frac = f - k;
    let k = k as i64;
    k < i || (k == i && frac == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_and_modulo() {
        assert_eq!(int_idiv(7, 2), Ok(3));
        assert_eq!(int_idiv(-7, 2), Ok(-4));
        assert_eq!(int_idiv(7, -2), Ok(-4));
        assert_eq!(int_idiv(-7, -2), Ok(3));
        assert_eq!(int_idiv(1, 0), Err(DivZero));
        assert_eq!(int_idiv(i64::MIN, -1), Ok(i64::MIN));

        assert_eq!(int_mod(5, 3), Ok(2));
        assert_eq!(int_mod(-5, 3), Ok(1));
        assert_eq!(int_mod(5, -3), Ok(-1));
        assert_eq!(int_mod(-5, -3), Ok(-2));
        assert_eq!(int_mod(1, 0), Err(DivZero));
        assert_eq!(int_mod(i64::MIN, -1), Ok(0));
    }

    #[test]
    fn float_floor_ops_match_integer_ones() {
        for (a, b) in [(7i64, 2i64), (-7, 2), (7, -2), (-7, -2), (5, 3), (-5, 3)] {
            assert_eq!(flt_idiv(a as f64, b as f64), int_idiv(a, b).unwrap() as f64);
            assert_eq!(flt_mod(a as f64, b as f64), int_mod(a, b).unwrap() as f64);
        }
    }

    #[test]
    fn shifts() {
        assert_eq!(shift_left(1, 4), 16);
        assert_eq!(shift_left(16, -4), 1);
        assert_eq!(shift_left(1, 64), 0);
        assert_eq!(shift_left(1, -64), 0);
        assert_eq!(shift_left(-1, 1), -2);
        // Right shift is logical, not arithmetic.
        assert_eq!(shift_left(-1, -63), 1);
    }

    #[test]
    fn exact_mixed_comparison() {
        // 2^63 is not representable; Int(max) < Float(2^63) must hold.
        assert!(int_lt_float(i64::MAX, 2f64.powi(63)));
        assert!(!float_lt_int(2f64.powi(63), i64::MAX));
        assert!(int_lt_float(3, 3.5));
        assert!(!int_lt_float(4, 3.5));
        assert!(float_lt_int(3.5, 4));
        assert!(int_le_float(3, 3.0));
        assert!(float_le_int(3.0, 3));
        assert!(!float_le_int(3.5, 3));
        assert!(!int_lt_float(0, f64::NAN));
        assert!(!float_le_int(f64::NAN, 0));
    }
}
