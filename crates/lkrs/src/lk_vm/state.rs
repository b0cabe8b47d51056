// Stack-oriented host API.
//
// The integration surface for the stdlib and for embedders: values cross
// the boundary by being pushed onto the current thread's stack or
// addressed by index. Positive indices count from the current frame's
// base, negative ones from the top, and `REGISTRY_INDEX` reaches the
// registry table.

use std::rc::Rc;

use crate::lk_value::{LkType, LkValue};
use crate::objects::TableId;

use super::execute::helper::number_to_string;
use super::execute::table_ops::{table_get, table_set};
use super::execute::upvalue::{read_cell, write_cell};
use super::{LkError, LkResult, LkStatus, LkVm};

/// Pseudo-index addressing the registry table.
pub const REGISTRY_INDEX: i32 = -1_000_000;

impl LkVm {
    /// Base slot of the current frame's argument window.
    fn api_base(&self) -> usize {
        self.current_thread()
            .current_frame()
            .map(|f| f.base)
            .unwrap_or(0)
    }

    /// Number of values on the API stack.
    pub fn get_top(&self) -> usize {
        self.current_thread().top - self.api_base()
    }

    pub fn set_top(&mut self, n: usize) {
        let base = self.api_base();
        let th = self.current_thread_mut();
        let new_top = base + n;
        th.ensure_stack(new_top);
        for i in th.top..new_top {
            th.stack[i] = LkValue::Nil;
        }
        th.top = new_top;
    }

    fn abs_slot(&self, idx: i32) -> Option<usize> {
        let base = self.api_base();
        let top = self.current_thread().top;
        if idx > 0 {
            let slot = base + idx as usize - 1;
            (slot < top).then_some(slot)
        } else if idx < 0 && idx != REGISTRY_INDEX {
            let back = (-idx) as usize;
            (back <= top - base).then(|| top - back)
        } else {
            None
        }
    }

    /// Value at an API index; nil when out of range.
    pub fn value_at(&self, idx: i32) -> LkValue {
        if idx == REGISTRY_INDEX {
            return LkValue::Table(self.registry);
        }
        self.abs_slot(idx)
            .map(|s| self.current_thread().stack[s])
            .unwrap_or(LkValue::Nil)
    }

    pub fn push(&mut self, v: LkValue) {
        let th = self.current_thread_mut();
        let top = th.top;
        th.ensure_stack(top + 1);
        th.stack[top] = v;
        th.top = top + 1;
    }

    pub fn push_nil(&mut self) {
        self.push(LkValue::Nil);
    }

    pub fn push_bool(&mut self, b: bool) {
        self.push(LkValue::Bool(b));
    }

    pub fn push_int(&mut self, i: i64) {
        self.push(LkValue::Int(i));
    }

    pub fn push_float(&mut self, f: f64) {
        self.push(LkValue::Float(f));
    }

    pub fn push_str(&mut self, s: &str) {
        let v = self.new_string(s);
        self.push(v);
    }

    /// Push a copy of the value at `idx`.
    pub fn push_index(&mut self, idx: i32) {
        let v = self.value_at(idx);
        self.push(v);
    }

    /// Push a host function, binding the top `nupvalues` stack values as
    /// its upvalues (popped, bottom-most first).
    pub fn push_host_function(&mut self, f: crate::lk_value::HostFunction, nupvalues: usize) {
        if nupvalues == 0 {
            self.push(LkValue::HostFn(f));
            return;
        }
        let top = self.current_thread().top;
        let upvalues = self.current_thread().stack[top - nupvalues..top].to_vec();
        self.pop(nupvalues);
        let closure = self.create_host_closure(f, upvalues);
        self.push(closure);
    }

    pub fn pop(&mut self, n: usize) {
        let base = self.api_base();
        let th = self.current_thread_mut();
        th.top = th.top.saturating_sub(n).max(base);
    }

    /// Copy the value at `from` into the slot at `to`.
    pub fn copy(&mut self, from: i32, to: i32) {
        let v = self.value_at(from);
        if let Some(slot) = self.abs_slot(to) {
            self.current_thread_mut().stack[slot] = v;
        }
    }

    /// Move the top value into `idx`, shifting values up.
    pub fn insert(&mut self, idx: i32) {
        let Some(slot) = self.abs_slot(idx) else {
            return;
        };
        let th = self.current_thread_mut();
        let top = th.top;
        if top == 0 {
            return;
        }
        let v = th.stack[top - 1];
        th.stack.copy_within(slot..top - 1, slot + 1);
        th.stack[slot] = v;
    }

    /// Remove the value at `idx`, shifting values down.
    pub fn remove(&mut self, idx: i32) {
        let Some(slot) = self.abs_slot(idx) else {
            return;
        };
        let th = self.current_thread_mut();
        let top = th.top;
        th.stack.copy_within(slot + 1..top, slot);
        th.top = top - 1;
    }

    /// Rotate the window from `idx` to the top by `n` positions.
    pub fn rotate(&mut self, idx: i32, n: i32) {
        let Some(slot) = self.abs_slot(idx) else {
            return;
        };
        let th = self.current_thread_mut();
        let top = th.top;
        let window = &mut th.stack[slot..top];
        if window.is_empty() {
            return;
        }
        let len = window.len() as i32;
        let shift = ((n % len) + len) % len;
        window.rotate_right(shift as usize);
    }

    // ---- type inspection & coercion ----

    pub fn type_at(&self, idx: i32) -> LkType {
        self.value_at(idx).type_of()
    }

    pub fn is_nil(&self, idx: i32) -> bool {
        self.value_at(idx).is_nil()
    }

    pub fn to_bool(&self, idx: i32) -> bool {
        self.value_at(idx).is_truthy()
    }

    pub fn to_integer(&self, idx: i32) -> Option<i64> {
        let v = self.value_at(idx);
        match v {
            LkValue::Str(id) => {
                crate::compiler::str_to_number(self.pool.strings.get(id))?.as_integer()
            }
            other => other.as_integer(),
        }
    }

    pub fn to_float(&self, idx: i32) -> Option<f64> {
        let v = self.value_at(idx);
        match v {
            LkValue::Str(id) => {
                crate::compiler::str_to_number(self.pool.strings.get(id))?.as_float()
            }
            other => other.as_float(),
        }
    }

    /// String view; numbers convert, nothing else does.
    pub fn to_str(&mut self, idx: i32) -> Option<Rc<str>> {
        match self.value_at(idx) {
            LkValue::Str(id) => Some(self.str_of(id)),
            v @ (LkValue::Int(_) | LkValue::Float(_)) => Some(Rc::from(number_to_string(&v))),
            _ => None,
        }
    }

    // ---- arguments of the running host function ----

    pub fn arg_count(&self) -> usize {
        self.get_top()
    }

    /// 1-based argument access.
    pub fn get_arg(&self, n: usize) -> Option<LkValue> {
        let v = self.value_at(n as i32);
        self.abs_slot(n as i32).map(|_| v)
    }

    pub fn get_args(&self) -> Vec<LkValue> {
        let base = self.api_base();
        let th = self.current_thread();
        th.stack[base..th.top].to_vec()
    }

    /// Upvalue of the running host closure.
    pub fn host_upvalue(&self, i: usize) -> Option<LkValue> {
        let frame = self.current_thread().current_frame()?;
        let id = frame.func.as_closure_id()?;
        let cell = self.pool.closure(id).upvalues().get(i).copied()?;
        Some(read_cell(self, cell))
    }

    pub fn set_host_upvalue(&mut self, i: usize, v: LkValue) {
        let Some(frame) = self.current_thread().current_frame() else {
            return;
        };
        let Some(id) = frame.func.as_closure_id() else {
            return;
        };
        let cell = self.pool.closure(id).upvalues().get(i).copied();
        if let Some(cell) = cell {
            write_cell(self, cell, v);
        }
    }

    // ---- argument validation ----

    fn bad_argument(&mut self, n: usize, expected: &str, got: LkValue) -> LkError {
        self.rt_error(format!(
            "bad argument #{} ({} expected, got {})",
            n,
            expected,
            got.type_name()
        ))
    }

    pub fn check_int(&mut self, n: usize) -> LkResult<i64> {
        match self.to_integer(n as i32) {
            Some(i) => Ok(i),
            None => {
                let got = self.value_at(n as i32);
                Err(self.bad_argument(n, "integer", got))
            }
        }
    }

    pub fn check_number(&mut self, n: usize) -> LkResult<f64> {
        match self.to_float(n as i32) {
            Some(f) => Ok(f),
            None => {
                let got = self.value_at(n as i32);
                Err(self.bad_argument(n, "number", got))
            }
        }
    }

    pub fn check_str(&mut self, n: usize) -> LkResult<Rc<str>> {
        match self.to_str(n as i32) {
            Some(s) => Ok(s),
            None => {
                let got = self.value_at(n as i32);
                Err(self.bad_argument(n, "string", got))
            }
        }
    }

    pub fn check_bool(&mut self, n: usize) -> LkResult<bool> {
        match self.value_at(n as i32) {
            LkValue::Bool(b) => Ok(b),
            got => Err(self.bad_argument(n, "bool", got)),
        }
    }

    pub fn check_table(&mut self, n: usize) -> LkResult<TableId> {
        match self.value_at(n as i32) {
            LkValue::Table(id) => Ok(id),
            got => Err(self.bad_argument(n, "map", got)),
        }
    }

    pub fn check_callable(&mut self, n: usize) -> LkResult<LkValue> {
        let v = self.value_at(n as i32);
        if v.is_callable() {
            Ok(v)
        } else {
            Err(self.bad_argument(n, "func", v))
        }
    }

    pub fn check_thread(&mut self, n: usize) -> LkResult<LkValue> {
        match self.value_at(n as i32) {
            v @ LkValue::Thread(_) => Ok(v),
            got => Err(self.bad_argument(n, "thread", got)),
        }
    }

    pub fn opt_int(&mut self, n: usize, default: i64) -> LkResult<i64> {
        if self.value_at(n as i32).is_nil() {
            Ok(default)
        } else {
            self.check_int(n)
        }
    }

    pub fn opt_str(&mut self, n: usize, default: &str) -> LkResult<Rc<str>> {
        if self.value_at(n as i32).is_nil() {
            Ok(Rc::from(default))
        } else {
            self.check_str(n)
        }
    }

    // ---- tables through the API ----

    /// `t[k]` honouring metamethods; `t` addressed by index.
    pub fn get_field(&mut self, idx: i32, name: &str) -> LkResult<LkValue> {
        let t = self.value_at(idx);
        let key = self.new_string(name);
        table_get(self, t, key)
    }

    pub fn set_field(&mut self, idx: i32, name: &str, v: LkValue) -> LkResult<()> {
        let t = self.value_at(idx);
        let key = self.new_string(name);
        table_set(self, t, key, v)
    }

    pub fn get_index(&mut self, idx: i32, i: i64) -> LkResult<LkValue> {
        let t = self.value_at(idx);
        table_get(self, t, LkValue::Int(i))
    }

    pub fn set_index(&mut self, idx: i32, i: i64, v: LkValue) -> LkResult<()> {
        let t = self.value_at(idx);
        table_set(self, t, LkValue::Int(i), v)
    }

    /// Raw access, skipping metamethods.
    pub fn raw_get(&mut self, t: LkValue, key: LkValue) -> LkValue {
        match t.as_table_id() {
            Some(id) => self.pool.table(id).raw_get(&key),
            None => LkValue::Nil,
        }
    }

    pub fn raw_set(&mut self, t: LkValue, key: LkValue, v: LkValue) -> LkResult<()> {
        let Some(id) = t.as_table_id() else {
            return Err(self.rt_error("attempt to index a non-map value"));
        };
        let r = self.pool.table_mut(id).raw_set(key, v);
        r.map_err(|e| self.rt_error(e.message()))
    }

    /// Raw iteration primitive: `next(k)` → the following `(k', v')`.
    pub fn next_entry(&mut self, t: LkValue, key: LkValue) -> Option<(LkValue, LkValue)> {
        let id = t.as_table_id()?;
        self.pool.table_mut(id).next(&key)
    }

    pub fn push_global_table(&mut self) {
        let g = LkValue::Table(self.globals);
        self.push(g);
    }

    // ---- load & call ----

    /// Call with the function and `nargs` arguments already pushed.
    pub fn call(&mut self, nargs: usize, nresults: i32) -> LkResult<()> {
        let base = self.api_base();
        let top = self.current_thread().top;
        let fbase = top - nargs - 1;
        debug_assert!(fbase >= base);
        let func = self.current_thread().stack[fbase];
        let args = self.current_thread().stack[fbase + 1..top].to_vec();
        self.current_thread_mut().top = fbase;
        let results = self.call_value(func, &args, nresults)?;
        for r in results {
            self.push(r);
        }
        Ok(())
    }

    /// Protected variant of [`call`]: on failure the error value is
    /// pushed and the status says what went wrong.
    pub fn pcall(&mut self, nargs: usize, nresults: i32) -> LkStatus {
        let t = self.current;
        let saved_depth = self.thread(t).frames.len();
        let top = self.current_thread().top;
        let fbase = top - nargs - 1;
        let func = self.current_thread().stack[fbase];
        let args = self.current_thread().stack[fbase + 1..top].to_vec();
        self.current_thread_mut().top = fbase;
        match self.call_value(func, &args, nresults) {
            Ok(results) => {
                for r in results {
                    self.push(r);
                }
                LkStatus::Ok
            }
            Err(e) => {
                let err = self.take_error_value();
                super::execute::upvalue::close_upvalues(self, t, fbase);
                let th = self.thread_mut(t);
                th.frames.truncate(saved_depth);
                th.top = fbase;
                self.push(err);
                LkStatus::from_error(e)
            }
        }
    }
}
