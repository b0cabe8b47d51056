// Proto - an immutable compiled function body.
//
// Produced by the code generator, read-only afterwards. Constants are
// already interned VM values, so the dispatch loop indexes them directly.

use smol_str::SmolStr;
use std::rc::Rc;

use super::value::LkValue;

/// Upvalue capture descriptor. `in_stack` means the cell is carved out of
/// the enclosing frame's registers; otherwise it is inherited from the
/// enclosing closure's upvalue list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalDesc {
    pub in_stack: bool,
    pub index: u8,
}

/// Debug record for a local variable's live register range.
#[derive(Debug, Clone)]
pub struct LocalDebug {
    pub name: SmolStr,
    pub start_pc: u32,
    pub end_pc: u32,
}

pub struct Proto {
    pub source: SmolStr,
    pub line_defined: u32,
    pub last_line_defined: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack_size: u8,
    pub code: Vec<u32>,
    pub constants: Vec<LkValue>,
    pub upvalues: Vec<UpvalDesc>,
    pub protos: Vec<Rc<Proto>>,
    /// One source line per instruction, for error tips.
    pub line_info: Vec<u32>,
    pub locals: Vec<LocalDebug>,
    pub upvalue_names: Vec<SmolStr>,
}

impl Proto {
    /// Source line of the instruction at `pc`, or 0 when unknown.
    pub fn line_at(&self, pc: usize) -> u32 {
        self.line_info.get(pc).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for Proto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proto")
            .field("source", &self.source)
            .field("num_params", &self.num_params)
            .field("is_vararg", &self.is_vararg)
            .field("max_stack_size", &self.max_stack_size)
            .field("code_len", &self.code.len())
            .field("constants", &self.constants.len())
            .field("upvalues", &self.upvalues.len())
            .field("protos", &self.protos.len())
            .finish()
    }
}
