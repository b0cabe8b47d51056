// Per-call activation record, shaped after Lua's CallInfo.

use crate::lk_value::LkValue;

#[derive(Clone)]
pub struct CallFrame {
    /// The callee: a `Closure` handle or a bare `HostFn`.
    pub func: LkValue,
    /// First register of this frame's window (absolute stack index).
    pub base: usize,
    pub pc: usize,
    /// Absolute slot where results land (the callee's own stack slot).
    pub ret_base: usize,
    /// Result count the caller expects; -1 means "all".
    pub nresults: i32,
    /// Surplus arguments of a vararg callee, stashed apart from registers.
    pub varargs: Vec<LkValue>,
    pub is_host: bool,
}

pub const MULTRET: i32 = -1;

impl CallFrame {
    pub fn script(func: LkValue, base: usize, ret_base: usize, nresults: i32) -> Self {
        CallFrame {
            func,
            base,
            pc: 0,
            ret_base,
            nresults,
            varargs: Vec::new(),
            is_host: false,
        }
    }

    pub fn host(func: LkValue, base: usize, ret_base: usize, nresults: i32) -> Self {
        CallFrame {
            func,
            base,
            pc: 0,
            ret_base,
            nresults,
            varargs: Vec::new(),
            is_host: true,
        }
    }
}

impl std::fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallFrame")
            .field("base", &self.base)
            .field("pc", &self.pc)
            .field("ret_base", &self.ret_base)
            .field("nresults", &self.nresults)
            .field("is_host", &self.is_host)
            .finish()
    }
}
