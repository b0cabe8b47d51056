// Constant folding, applied while BinOp/UnOp nodes are built.
//
// Integer-only arithmetic stays integer; `/` and `^` or a Float operand
// force floats; bitwise ops need both operands exactly integral. Folding
// shares its numeric kernels with the VM so folded and unfolded programs
// agree. Integer division or modulo by a zero literal is left unfolded so
// the VM raises the same error it would for computed operands.

use super::ast::{BinOp, Expr, UnOp};
use crate::lk_vm::execute::arith::{
    flt_idiv, flt_mod, int_idiv, int_mod, shift_left,
};
use crate::lk_value::float_to_int_exact;

enum Num {
    Int(i64),
    Float(f64),
}

fn literal_num(e: &Expr) -> Option<Num> {
    match e {
        Expr::Int(i) => Some(Num::Int(*i)),
        Expr::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn literal_int(e: &Expr) -> Option<i64> {
    match e {
        Expr::Int(i) => Some(*i),
        Expr::Float(f) => float_to_int_exact(*f),
        _ => None,
    }
}

/// Truthiness of a literal, when statically known.
fn literal_truth(e: &Expr) -> Option<bool> {
    match e {
        Expr::Nil | Expr::False => Some(false),
        Expr::True | Expr::Int(_) | Expr::Float(_) | Expr::Str(_) => Some(true),
        _ => None,
    }
}

/// Side-effect-free expressions that may replace a short-circuit result.
fn is_pure(e: &Expr) -> bool {
    matches!(
        e,
        Expr::Nil
            | Expr::True
            | Expr::False
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Name(_)
    )
}

pub fn fold_binop(op: BinOp, lhs: Expr, rhs: Expr, line: u32) -> Expr {
    if let Some(folded) = try_fold_binop(op, &lhs, &rhs) {
        return folded;
    }
    Expr::BinOp {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        line,
    }
}

fn try_fold_binop(op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Expr> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Mod | BinOp::IDiv => {
            let (a, b) = (literal_num(lhs)?, literal_num(rhs)?);
            match (a, b) {
                (Num::Int(a), Num::Int(b)) => {
                    let v = match op {
                        BinOp::Add => a.wrapping_add(b),
                        BinOp::Sub => a.wrapping_sub(b),
                        BinOp::Mul => a.wrapping_mul(b),
                        BinOp::Mod => int_mod(a, b).ok()?,
                        BinOp::IDiv => int_idiv(a, b).ok()?,
                        _ => unreachable!(),
                    };
                    Some(Expr::Int(v))
                }
                (a, b) => {
                    let (a, b) = (num_as_f64(a), num_as_f64(b));
                    let v = match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        BinOp::Mod => flt_mod(a, b),
                        BinOp::IDiv => flt_idiv(a, b),
                        _ => unreachable!(),
                    };
                    Some(Expr::Float(v))
                }
            }
        }
        BinOp::Div | BinOp::Pow => {
            let a = num_as_f64(literal_num(lhs)?);
            let b = num_as_f64(literal_num(rhs)?);
            let v = match op {
                BinOp::Div => a / b,
                BinOp::Pow => a.powf(b),
                _ => unreachable!(),
            };
            Some(Expr::Float(v))
        }
        BinOp::BAnd | BinOp::BOr | BinOp::BXor | BinOp::Shl | BinOp::Shr => {
            let (a, b) = (literal_int(lhs)?, literal_int(rhs)?);
            let v = match op {
                BinOp::BAnd => a & b,
                BinOp::BOr => a | b,
                BinOp::BXor => a ^ b,
                BinOp::Shl => shift_left(a, b),
                BinOp::Shr => shift_left(a, b.checked_neg()?),
                _ => unreachable!(),
            };
            Some(Expr::Int(v))
        }
        BinOp::And => match literal_truth(lhs)? {
            false => Some(lhs.clone()),
            true if is_pure(rhs) => Some(rhs.clone()),
            true => None,
        },
        BinOp::Or => match literal_truth(lhs)? {
            true => Some(lhs.clone()),
            false if is_pure(rhs) => Some(rhs.clone()),
            false => None,
        },
        BinOp::Coalesce => match lhs {
            Expr::Nil if is_pure(rhs) => Some(rhs.clone()),
            Expr::Nil => None,
            _ if literal_truth(lhs).is_some() => Some(lhs.clone()),
            _ => None,
        },
        // Comparisons are cheap at runtime; they are not folded.
        _ => None,
    }
}

fn num_as_f64(n: Num) -> f64 {
    match n {
        Num::Int(i) => i as f64,
        Num::Float(f) => f,
    }
}

pub fn fold_unop(op: UnOp, operand: Expr, line: u32) -> Expr {
    let folded = match (op, &operand) {
        (UnOp::Neg, Expr::Int(i)) => Some(Expr::Int(i.wrapping_neg())),
        (UnOp::Neg, Expr::Float(f)) => Some(Expr::Float(-f)),
        (UnOp::Not, e) => literal_truth(e).map(|t| if t { Expr::False } else { Expr::True }),
        (UnOp::BNot, e) => literal_int(e).map(|i| Expr::Int(!i)),
        (UnOp::Len, Expr::Str(s)) => Some(Expr::Int(s.len() as i64)),
        _ => None,
    };
    folded.unwrap_or(Expr::UnOp {
        op,
        operand: Box::new(operand),
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(fold_binop(BinOp::Add, Expr::Int(2), Expr::Int(3), 0), Expr::Int(5));
        assert_eq!(
            fold_binop(BinOp::IDiv, Expr::Int(7), Expr::Int(2), 0),
            Expr::Int(3)
        );
        assert_eq!(
            fold_binop(BinOp::IDiv, Expr::Int(-7), Expr::Int(2), 0),
            Expr::Int(-4)
        );
        assert_eq!(
            fold_binop(BinOp::Mod, Expr::Int(5), Expr::Int(-3), 0),
            Expr::Int(-1)
        );
    }

    #[test]
    fn float_contagion() {
        assert_eq!(
            fold_binop(BinOp::Add, Expr::Int(1), Expr::Float(0.5), 0),
            Expr::Float(1.5)
        );
        assert_eq!(
            fold_binop(BinOp::Div, Expr::Int(1), Expr::Int(2), 0),
            Expr::Float(0.5)
        );
        assert_eq!(
            fold_binop(BinOp::Pow, Expr::Int(2), Expr::Int(10), 0),
            Expr::Float(1024.0)
        );
    }

    #[test]
    fn division_by_zero_is_left_for_the_vm() {
        let e = fold_binop(BinOp::IDiv, Expr::Int(1), Expr::Int(0), 7);
        assert!(matches!(e, Expr::BinOp { op: BinOp::IDiv, .. }));
        let e = fold_binop(BinOp::Mod, Expr::Int(1), Expr::Int(0), 7);
        assert!(matches!(e, Expr::BinOp { op: BinOp::Mod, .. }));
    }

    #[test]
    fn bitwise_needs_exact_integers() {
        assert_eq!(
            fold_binop(BinOp::BXor, Expr::Int(6), Expr::Float(3.0), 0),
            Expr::Int(5)
        );
        let e = fold_binop(BinOp::BAnd, Expr::Int(6), Expr::Float(3.5), 0);
        assert!(matches!(e, Expr::BinOp { .. }));
        assert_eq!(
            fold_binop(BinOp::Shl, Expr::Int(1), Expr::Int(70), 0),
            Expr::Int(0)
        );
        assert_eq!(
            fold_binop(BinOp::Shr, Expr::Int(8), Expr::Int(-1), 0),
            Expr::Int(16)
        );
    }

    #[test]
    fn short_circuit_folding() {
        // truthy or X -> truthy, falsy and X -> falsy, regardless of X
        let call = Expr::Call {
            func: Box::new(Expr::Name("f".into())),
            args: vec![],
            line: 1,
        };
        assert_eq!(
            fold_binop(BinOp::Or, Expr::Int(1), call.clone(), 0),
            Expr::Int(1)
        );
        assert_eq!(
            fold_binop(BinOp::And, Expr::Nil, call.clone(), 0),
            Expr::Nil
        );
        // The decided-by-right cases only fold side-effect-free operands.
        assert_eq!(
            fold_binop(BinOp::And, Expr::True, Expr::Name("x".into()), 0),
            Expr::Name("x".into())
        );
        let kept = fold_binop(BinOp::And, Expr::True, call, 0);
        assert!(matches!(kept, Expr::BinOp { op: BinOp::And, .. }));
    }

    #[test]
    fn unary_folding() {
        assert_eq!(fold_unop(UnOp::Neg, Expr::Int(3), 0), Expr::Int(-3));
        assert_eq!(fold_unop(UnOp::Not, Expr::Nil, 0), Expr::True);
        assert_eq!(fold_unop(UnOp::Not, Expr::Int(0), 0), Expr::False);
        assert_eq!(fold_unop(UnOp::BNot, Expr::Int(0), 0), Expr::Int(-1));
        assert_eq!(fold_unop(UnOp::Len, Expr::Str("héllo".into()), 0), Expr::Int(6));
    }
}
