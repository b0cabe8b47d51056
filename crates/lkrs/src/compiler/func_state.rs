// Per-function compilation state: the proto under construction, active
// locals and scopes, the high-water register counter and the constant
// pool with value-keyed deduplication.

use ahash::RandomState;
use smol_str::SmolStr;
use std::collections::HashMap;

use crate::lk_value::{LkValue, LocalDebug, Proto};
use crate::objects::StringId;
use std::rc::Rc;

/// The highest register a frame may use; operand A is 8 bits.
pub(crate) const MAX_REGS: u32 = 255;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ConstKey {
    Nil,
    True,
    False,
    Int(i64),
    Float(u64),
    Str(StringId),
}

impl ConstKey {
    pub fn of(v: &LkValue) -> Option<ConstKey> {
        match v {
            LkValue::Nil => Some(ConstKey::Nil),
            LkValue::Bool(true) => Some(ConstKey::True),
            LkValue::Bool(false) => Some(ConstKey::False),
            LkValue::Int(i) => Some(ConstKey::Int(*i)),
            LkValue::Float(f) => Some(ConstKey::Float(f.to_bits())),
            LkValue::Str(id) => Some(ConstKey::Str(*id)),
            _ => None,
        }
    }
}

pub(crate) struct LocalVar {
    pub name: SmolStr,
    pub reg: u32,
    pub captured: bool,
    pub start_pc: u32,
}

pub(crate) struct Scope {
    pub first_local: usize,
    pub first_reg: u32,
    pub breakable: bool,
    /// Jump pcs of `break` statements waiting for the loop end.
    pub break_jumps: Vec<usize>,
    /// A local of this scope (or a nested one) was captured; scope exit
    /// must close upvalues from `first_reg` up.
    pub any_capture: bool,
}

pub(crate) struct UpvalInfo {
    pub name: SmolStr,
    pub in_stack: bool,
    pub index: u8,
}

pub(crate) struct FuncState {
    pub code: Vec<u32>,
    pub line_info: Vec<u32>,
    pub constants: Vec<LkValue>,
    pub const_map: HashMap<ConstKey, u32, RandomState>,
    pub protos: Vec<Rc<Proto>>,
    pub locals: Vec<LocalVar>,
    pub local_debug: Vec<LocalDebug>,
    pub upvalues: Vec<UpvalInfo>,
    pub scopes: Vec<Scope>,
    pub freereg: u32,
    pub max_stack: u32,
    pub num_params: u8,
    pub is_vararg: bool,
    pub line_defined: u32,
    pub cur_line: u32,
}

impl FuncState {
    pub fn new(num_params: u8, is_vararg: bool, line: u32) -> FuncState {
        FuncState {
            code: Vec::new(),
            line_info: Vec::new(),
            constants: Vec::new(),
            const_map: HashMap::with_hasher(RandomState::new()),
            protos: Vec::new(),
            locals: Vec::new(),
            local_debug: Vec::new(),
            upvalues: Vec::new(),
            scopes: Vec::new(),
            freereg: 0,
            // Lua keeps a two-register minimum for calls; same here.
            max_stack: 2,
            num_params,
            is_vararg,
            line_defined: line,
            cur_line: line,
        }
    }

    pub fn add_const(&mut self, v: LkValue) -> u32 {
        let key = ConstKey::of(&v).expect("non-constant value in constant pool");
        if let Some(idx) = self.const_map.get(&key) {
            return *idx;
        }
        let idx = self.constants.len() as u32;
        self.constants.push(v);
        self.const_map.insert(key, idx);
        idx
    }

    pub fn declare_local(&mut self, name: SmolStr, reg: u32) {
        self.locals.push(LocalVar {
            name,
            reg,
            captured: false,
            start_pc: self.code.len() as u32,
        });
    }

    pub fn find_local(&self, name: &str) -> Option<u32> {
        self.locals
            .iter()
            .rev()
            .find(|l| l.name == name)
            .map(|l| l.reg)
    }

    /// Mark the local in `reg` captured and flag its owning scope.
    pub fn mark_captured(&mut self, reg: u32) {
        let Some(idx) = self.locals.iter().rposition(|l| l.reg == reg) else {
            return;
        };
        self.locals[idx].captured = true;
        if let Some(scope) = self
            .scopes
            .iter_mut()
            .rev()
            .find(|s| s.first_local <= idx)
        {
            scope.any_capture = true;
        }
    }

    pub fn begin_scope(&mut self, breakable: bool) {
        self.scopes.push(Scope {
            first_local: self.locals.len(),
            first_reg: self.freereg,
            breakable,
            break_jumps: Vec::new(),
            any_capture: false,
        });
    }

    /// Pop the innermost scope: retire its locals into the debug table,
    /// release their registers, and report the pending break jumps plus
    /// the close argument for `Jmp` (None when nothing was captured).
    pub fn end_scope(&mut self) -> (Vec<usize>, Option<u32>) {
        let scope = self.scopes.pop().expect("scope underflow");
        let end_pc = self.code.len() as u32;
        while self.locals.len() > scope.first_local {
            let l = self.locals.pop().unwrap();
            self.local_debug.push(LocalDebug {
                name: l.name,
                start_pc: l.start_pc,
                end_pc,
            });
        }
        self.freereg = scope.first_reg;
        let close_a = if scope.any_capture {
            Some(scope.first_reg + 1)
        } else {
            None
        };
        // A capture inside this scope also matters to enclosing loops:
        // their `break` jumps bypass this scope's own close.
        if scope.any_capture {
            if let Some(parent) = self.scopes.last_mut() {
                parent.any_capture = true;
            }
        }
        (scope.break_jumps, close_a)
    }

    pub fn innermost_breakable(&mut self) -> Option<&mut Scope> {
        self.scopes.iter_mut().rev().find(|s| s.breakable)
    }
}
