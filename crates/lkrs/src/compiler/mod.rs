// LK compiler front end: lexer, recursive-descent parser, constant
// folder and bytecode generator.

pub mod ast;
mod codegen;
mod fold;
pub mod lexer;
mod parser;

pub(crate) mod func_state;

pub use parser::{parse, parse_number};

use std::rc::Rc;

use crate::lk_value::{LkValue, Proto};
use crate::lk_vm::LkVm;

/// Compile a source chunk into its root prototype. Errors come back as
/// `{chunk}:{line}: message` strings.
pub fn compile(vm: &mut LkVm, source: &str, chunk_name: &str) -> Result<Rc<Proto>, String> {
    let block = parse(source, chunk_name)?;
    codegen::r#gen(vm, &block, chunk_name)
}

/// Runtime string→number coercion: optional sign, then the same
/// int-first classification the lexer applies to literals.
pub fn str_to_number(s: &str) -> Option<LkValue> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (negate, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    match parse_number(body)? {
        ast::Expr::Int(i) => Some(LkValue::Int(if negate { i.wrapping_neg() } else { i })),
        ast::Expr::Float(f) => Some(LkValue::Float(if negate { -f } else { f })),
        _ => None,
    }
}
