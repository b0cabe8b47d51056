// Bytecode dispatch.
//
// One register window per frame, carved out of the owning thread's value
// stack. The loop runs the top frame until it calls a script function
// (push + resync), returns (pop + resync), or fails. Host functions run
// to completion inside their instruction; a Yield escapes through here
// with the frame stack intact so resume can continue where it stopped.

pub(crate) mod arith;
pub(crate) mod helper;
pub(crate) mod metamethod;
pub(crate) mod table_ops;
pub(crate) mod upvalue;

use std::rc::Rc;

use crate::lk_value::{HostFunction, LkClosure, LkValue, Proto};
use crate::lk_vm::opcode::{FIELDS_PER_FLUSH, Instruction, OpCode};
use crate::lk_vm::thread::PendingYield;
use crate::lk_vm::{CallFrame, LkError, LkResult, LkVm, MULTRET};
use crate::objects::{CellId, ThreadId};

use arith::{ArithOp, arith, arith_bnot, arith_unm};
use table_ops::{resolve_callable, table_get, table_set, value_eq, value_le, value_len, value_lt};
use upvalue::{close_upvalues, find_or_create_cell, read_cell, write_cell};

pub(crate) enum Precall {
    /// A script frame was pushed; the dispatch loop must resync.
    Script,
    /// A host function ran to completion; results are already placed.
    HostDone,
}

/// Push func+args at the current thread's top and call, collecting the
/// results. This is the host-side entry used by the API, the stdlib and
/// metamethod dispatch.
pub(crate) fn call_value(
    vm: &mut LkVm,
    func: LkValue,
    args: &[LkValue],
    nresults: i32,
) -> LkResult<Vec<LkValue>> {
    let t = vm.current;
    if vm.thread(t).host_depth >= vm.options.max_host_depth {
        let v = vm.new_string("host call depth exceeded");
        return Err(vm.raise_value(LkError::Resource, v));
    }
    vm.thread_mut(t).host_depth += 1;
    let r = call_value_inner(vm, func, args, nresults);
    vm.thread_mut(t).host_depth -= 1;
    r
}

fn call_value_inner(
    vm: &mut LkVm,
    func: LkValue,
    args: &[LkValue],
    nresults: i32,
) -> LkResult<Vec<LkValue>> {
    let t = vm.current;
    let fbase = vm.thread(t).top;
    {
        let th = vm.thread_mut(t);
        th.ensure_stack(fbase + 1 + args.len());
        th.stack[fbase] = func;
        th.stack[fbase + 1..fbase + 1 + args.len()].copy_from_slice(args);
        th.top = fbase + 1 + args.len();
    }
    let entry_depth = vm.thread(t).frames.len();
    if let Precall::Script = do_precall(vm, t, fbase, args.len(), nresults)? {
        run(vm, t, entry_depth)?;
    }
    let th = vm.thread_mut(t);
    let count = if nresults == MULTRET {
        th.top.saturating_sub(fbase)
    } else {
        nresults as usize
    };
    let results = th.stack[fbase..fbase + count].to_vec();
    th.top = fbase;
    Ok(results)
}

/// Call expecting exactly one result.
pub(crate) fn call_value_single(
    vm: &mut LkVm,
    func: LkValue,
    args: &[LkValue],
) -> LkResult<LkValue> {
    let r = call_value(vm, func, args, 1)?;
    Ok(r.into_iter().next().unwrap_or(LkValue::Nil))
}

/// Protected call: on failure the frame stack and value stack are
/// restored to the recorded boundary, pending upvalues above it are
/// closed, and the error value comes back as data.
pub(crate) fn pcall_value(
    vm: &mut LkVm,
    func: LkValue,
    args: &[LkValue],
    nresults: i32,
) -> (bool, Vec<LkValue>) {
    let t = vm.current;
    let saved_depth = vm.thread(t).frames.len();
    let saved_top = vm.thread(t).top;
    match call_value(vm, func, args, nresults) {
        Ok(results) => (true, results),
        Err(_) => {
            let err = vm.take_error_value();
            close_upvalues(vm, t, saved_top);
            let th = vm.thread_mut(t);
            th.frames.truncate(saved_depth);
            th.top = saved_top;
            (false, vec![err])
        }
    }
}

/// Resolve the callee at `fbase` and either push a script frame or run a
/// host function to completion. `__call` values get themselves prepended
/// as the first argument.
pub(crate) fn do_precall(
    vm: &mut LkVm,
    t: ThreadId,
    fbase: usize,
    nargs: usize,
    nresults: i32,
) -> LkResult<Precall> {
    let mut nargs = nargs;
    for _ in 0..10 {
        let func = vm.thread(t).stack[fbase];
        match func {
            LkValue::HostFn(f) => return call_host(vm, t, func, f, fbase, nargs, nresults),
            LkValue::Closure(id) => {
                enum Body {
                    Host(HostFunction),
                    Script(Rc<Proto>),
                }
                let body = match vm.pool.closure(id) {
                    LkClosure::Host { func: f, .. } => Body::Host(*f),
                    LkClosure::Script { proto, .. } => Body::Script(proto.clone()),
                };
                return match body {
                    Body::Host(f) => call_host(vm, t, func, f, fbase, nargs, nresults),
                    Body::Script(proto) => {
                        push_script_frame(vm, t, func, proto, fbase, nargs, nresults)
                    }
                };
            }
            other => {
                let Some(mm) = resolve_callable(vm, &other) else {
                    let msg = format!("attempt to call a {} value", other.type_name());
                    return Err(vm.rt_error(msg));
                };
                // Shift args up and put the metamethod in front.
                let th = vm.thread_mut(t);
                let end = fbase + 1 + nargs;
                th.ensure_stack(end + 1);
                th.stack.copy_within(fbase..end, fbase + 1);
                th.stack[fbase] = mm;
                th.top = end + 1;
                nargs += 1;
            }
        }
    }
    Err(vm.rt_error("'__call' chain too long"))
}

fn call_host(
    vm: &mut LkVm,
    t: ThreadId,
    func: LkValue,
    f: HostFunction,
    fbase: usize,
    nargs: usize,
    nresults: i32,
) -> LkResult<Precall> {
    if vm.thread(t).frames.len() >= vm.options.max_call_depth {
        let v = vm.new_string("stack overflow");
        return Err(vm.raise_value(LkError::Resource, v));
    }
    let base = fbase + 1;
    {
        let th = vm.thread_mut(t);
        th.ensure_stack(base + nargs);
        th.top = base + nargs;
        th.frames.push(CallFrame::host(func, base, fbase, nresults));
    }
    match f(vm) {
        Ok(n) => {
            finish_host_return(vm, t, n);
            Ok(Precall::HostDone)
        }
        Err(LkError::Yield) => {
            let th = vm.thread_mut(t);
            let frame = th.frames.pop().expect("host frame");
            th.pending = Some(PendingYield {
                ret_base: frame.ret_base,
                nresults: frame.nresults,
            });
            Err(LkError::Yield)
        }
        Err(e) => Err(e),
    }
}

/// Move the host function's pushed results down to the call site and
/// adjust to the caller's expected count.
fn finish_host_return(vm: &mut LkVm, t: ThreadId, n: usize) {
    let th = vm.thread_mut(t);
    let frame = th.frames.pop().expect("host frame");
    let src = th.top - n;
    th.stack.copy_within(src..src + n, frame.ret_base);
    if frame.nresults == MULTRET {
        th.top = frame.ret_base + n;
    } else {
        let want = frame.nresults as usize;
        th.ensure_stack(frame.ret_base + want);
        for i in n..want {
            th.stack[frame.ret_base + i] = LkValue::Nil;
        }
        th.top = frame.ret_base + want;
    }
}

fn push_script_frame(
    vm: &mut LkVm,
    t: ThreadId,
    func: LkValue,
    proto: Rc<Proto>,
    fbase: usize,
    nargs: usize,
    nresults: i32,
) -> LkResult<Precall> {
    if vm.thread(t).frames.len() >= vm.options.max_call_depth {
        let v = vm.new_string("stack overflow");
        return Err(vm.raise_value(LkError::Resource, v));
    }
    let base = fbase + 1;
    let np = proto.num_params as usize;
    let maxstack = proto.max_stack_size as usize;
    if base + maxstack > vm.options.max_stack_slots {
        let v = vm.new_string("value stack overflow");
        return Err(vm.raise_value(LkError::Resource, v));
    }

    let mut frame = CallFrame::script(func, base, fbase, nresults);
    {
        let th = vm.thread_mut(t);
        th.ensure_stack(base + maxstack.max(nargs));
        if proto.is_vararg && nargs > np {
            frame.varargs = th.stack[base + np..base + nargs].to_vec();
        }
        // Clear everything past the fixed arguments.
        for i in nargs.min(np)..maxstack {
            th.stack[base + i] = LkValue::Nil;
        }
        th.top = base + maxstack;
        th.frames.push(frame);
    }
    Ok(Precall::Script)
}

/// Return from the top frame: close its upvalues, move results to the
/// call site, adjust counts, pop.
fn do_return(vm: &mut LkVm, t: ThreadId, result_base: usize, n: usize) {
    let frame_base = vm.thread(t).frames.last().expect("frame").base;
    close_upvalues(vm, t, frame_base);
    let th = vm.thread_mut(t);
    let frame = th.frames.pop().expect("frame");
    th.ensure_stack(frame.ret_base + n);
    th.stack.copy_within(result_base..result_base + n, frame.ret_base);
    if frame.nresults == MULTRET {
        th.top = frame.ret_base + n;
    } else {
        let want = frame.nresults as usize;
        th.ensure_stack(frame.ret_base + want);
        for i in n..want {
            th.stack[frame.ret_base + i] = LkValue::Nil;
        }
        th.top = frame.ret_base + want;
    }
}

/// Execute until the frame stack drops back to `entry_depth`.
pub(crate) fn run(vm: &mut LkVm, t: ThreadId, entry_depth: usize) -> LkResult<()> {
    loop {
        if vm.thread(t).frames.len() <= entry_depth {
            return Ok(());
        }
        let mut err_pc = 0usize;
        match frame_steps(vm, t, &mut err_pc) {
            Ok(()) => continue,
            Err(LkError::Yield) => return Err(LkError::Yield),
            Err(e) => {
                annotate_error(vm, t, err_pc);
                return Err(e);
            }
        }
    }
}

/// Add the `{chunk}:{line}:` tip to a plain error message, using the
/// innermost script frame.
fn annotate_error(vm: &mut LkVm, t: ThreadId, err_pc: usize) {
    if !vm.thread(t).error_plain {
        return;
    }
    let mut found: Option<(smol_str::SmolStr, u32)> = None;
    {
        let th = vm.thread(t);
        let last = th.frames.len().saturating_sub(1);
        for (i, frame) in th.frames.iter().enumerate().rev() {
            if frame.is_host {
                continue;
            }
            if let LkValue::Closure(id) = frame.func {
                if let LkClosure::Script { proto, .. } = vm.pool.closure(id) {
                    let pc = if i == last { err_pc } else { frame.pc.saturating_sub(1) };
                    found = Some((proto.source.clone(), proto.line_at(pc)));
                }
            }
            break;
        }
    }
    vm.thread_mut(t).error_plain = false;
    if let Some((source, line)) = found {
        let ev = vm.thread(t).error_value;
        if let LkValue::Str(id) = ev {
            let msg = format!("{}:{}: {}", source, line, vm.pool.strings.get(id));
            let v = vm.new_string(&msg);
            vm.thread_mut(t).error_value = v;
        }
    }
}

/// Cached view of the executing frame.
fn frame_context(vm: &mut LkVm, t: ThreadId) -> LkResult<(Rc<Proto>, usize, usize, Vec<CellId>)> {
    let (is_host, base, pc, func) = {
        let frame = vm.thread(t).frames.last().expect("no frame to execute");
        (frame.is_host, frame.base, frame.pc, frame.func)
    };
    if is_host {
        return Err(vm.rt_error("cannot execute a host frame"));
    }
    let LkValue::Closure(id) = func else {
        return Err(vm.rt_error("corrupted frame: callee is not a closure"));
    };
    let script = match vm.pool.closure(id) {
        LkClosure::Script { proto, upvalues } => Some((proto.clone(), upvalues.clone())),
        LkClosure::Host { .. } => None,
    };
    match script {
        Some((proto, upvalues)) => Ok((proto, base, pc, upvalues)),
        None => Err(vm.rt_error("corrupted frame: callee is not a script closure")),
    }
}

/// Run instructions of the top frame until a frame switch or an error.
fn frame_steps(vm: &mut LkVm, t: ThreadId, err_pc: &mut usize) -> LkResult<()> {
    let (proto, base, mut pc, upvals) = frame_context(vm, t)?;
    let code = &proto.code;
    let k = &proto.constants;

    macro_rules! reg {
        ($i:expr) => {
            vm.thread(t).stack[base + $i]
        };
    }
    macro_rules! set_reg {
        ($i:expr, $v:expr) => {
            vm.thread_mut(t).stack[base + $i] = $v
        };
    }
    macro_rules! rk {
        ($x:expr) => {
            if Instruction::is_k($x) {
                k[Instruction::rk_index($x)]
            } else {
                vm.thread(t).stack[base + $x as usize]
            }
        };
    }
    macro_rules! save_pc {
        () => {
            vm.thread_mut(t).current_frame_mut().expect("frame").pc = pc
        };
    }

    loop {
        debug_assert!(pc < code.len(), "ran off the end of a proto");
        *err_pc = pc;
        let i = code[pc];
        pc += 1;
        let a = Instruction::get_a(i) as usize;
        match Instruction::get_opcode(i) {
            OpCode::Move => {
                let b = Instruction::get_b(i) as usize;
                let v = reg!(b);
                set_reg!(a, v);
            }
            OpCode::LoadK => {
                let bx = Instruction::get_bx(i) as usize;
                set_reg!(a, k[bx]);
            }
            OpCode::LoadKx => {
                let ax = Instruction::get_ax(code[pc]) as usize;
                pc += 1;
                set_reg!(a, k[ax]);
            }
            OpCode::LoadBool => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                set_reg!(a, LkValue::Bool(b != 0));
                if c != 0 {
                    pc += 1;
                }
            }
            OpCode::LoadNil => {
                let b = Instruction::get_b(i) as usize;
                for j in a..=a + b {
                    set_reg!(j, LkValue::Nil);
                }
            }
            OpCode::GetUpval => {
                let b = Instruction::get_b(i) as usize;
                let v = read_cell(vm, upvals[b]);
                set_reg!(a, v);
            }
            OpCode::SetUpval => {
                let b = Instruction::get_b(i) as usize;
                let v = reg!(a);
                write_cell(vm, upvals[b], v);
            }
            OpCode::GetTabUp => {
                let b = Instruction::get_b(i) as usize;
                let c = Instruction::get_c(i);
                let tbl = read_cell(vm, upvals[b]);
                let key = rk!(c);
                let v = table_get(vm, tbl, key)?;
                set_reg!(a, v);
            }
            OpCode::SetTabUp => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let tbl = read_cell(vm, upvals[a]);
                let key = rk!(b);
                let v = rk!(c);
                table_set(vm, tbl, key, v)?;
            }
            OpCode::GetTable => {
                let b = Instruction::get_b(i) as usize;
                let c = Instruction::get_c(i);
                let tbl = reg!(b);
                let key = rk!(c);
                let v = table_get(vm, tbl, key)?;
                set_reg!(a, v);
            }
            OpCode::SetTable => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let tbl = reg!(a);
                let key = rk!(b);
                let v = rk!(c);
                table_set(vm, tbl, key, v)?;
            }
            OpCode::NewTable => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let asize = Instruction::fb2int(b) as usize;
                let hsize = Instruction::fb2int(c) as usize;
                let v = vm.create_table(asize, hsize);
                set_reg!(a, v);
            }
            OpCode::Self_ => {
                let b = Instruction::get_b(i) as usize;
                let c = Instruction::get_c(i);
                let obj = reg!(b);
                set_reg!(a + 1, obj);
                let key = rk!(c);
                let v = table_get(vm, obj, key)?;
                set_reg!(a, v);
            }
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Mod
            | OpCode::Pow
            | OpCode::Div
            | OpCode::IDiv
            | OpCode::BAnd
            | OpCode::BOr
            | OpCode::BXor
            | OpCode::Shl
            | OpCode::Shr => {
                let op = match Instruction::get_opcode(i) {
                    OpCode::Add => ArithOp::Add,
                    OpCode::Sub => ArithOp::Sub,
                    OpCode::Mul => ArithOp::Mul,
                    OpCode::Mod => ArithOp::Mod,
                    OpCode::Pow => ArithOp::Pow,
                    OpCode::Div => ArithOp::Div,
                    OpCode::IDiv => ArithOp::IDiv,
                    OpCode::BAnd => ArithOp::BAnd,
                    OpCode::BOr => ArithOp::BOr,
                    OpCode::BXor => ArithOp::BXor,
                    OpCode::Shl => ArithOp::Shl,
                    _ => ArithOp::Shr,
                };
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let x = rk!(b);
                let y = rk!(c);
                let v = arith(vm, op, x, y)?;
                set_reg!(a, v);
            }
            OpCode::Unm => {
                let b = Instruction::get_b(i) as usize;
                let x = reg!(b);
                let v = arith_unm(vm, x)?;
                set_reg!(a, v);
            }
            OpCode::BNot => {
                let b = Instruction::get_b(i) as usize;
                let x = reg!(b);
                let v = arith_bnot(vm, x)?;
                set_reg!(a, v);
            }
            OpCode::Not => {
                let b = Instruction::get_b(i) as usize;
                let x = reg!(b);
                set_reg!(a, LkValue::Bool(x.is_falsy()));
            }
            OpCode::Len => {
                let b = Instruction::get_b(i) as usize;
                let x = reg!(b);
                let v = value_len(vm, x)?;
                set_reg!(a, v);
            }
            OpCode::Jmp => {
                if a > 0 {
                    close_upvalues(vm, t, base + a - 1);
                }
                pc = (pc as i64 + Instruction::get_sbx(i) as i64) as usize;
            }
            OpCode::Eq => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let x = rk!(b);
                let y = rk!(c);
                if value_eq(vm, x, y)? != (a != 0) {
                    pc += 1;
                }
            }
            OpCode::Lt => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let x = rk!(b);
                let y = rk!(c);
                if value_lt(vm, x, y)? != (a != 0) {
                    pc += 1;
                }
            }
            OpCode::Le => {
                let b = Instruction::get_b(i);
                let c = Instruction::get_c(i);
                let x = rk!(b);
                let y = rk!(c);
                if value_le(vm, x, y)? != (a != 0) {
                    pc += 1;
                }
            }
            OpCode::Test => {
                let c = Instruction::get_c(i);
                if reg!(a).is_truthy() != (c != 0) {
                    pc += 1;
                }
            }
            OpCode::TestSet => {
                let b = Instruction::get_b(i) as usize;
                let c = Instruction::get_c(i);
                let v = reg!(b);
                if v.is_truthy() == (c != 0) {
                    set_reg!(a, v);
                } else {
                    pc += 1;
                }
            }
            OpCode::Call => {
                let b = Instruction::get_b(i) as usize;
                let c = Instruction::get_c(i) as usize;
                let fbase = base + a;
                let nargs = if b == 0 {
                    vm.thread(t).top - fbase - 1
                } else {
                    let th = vm.thread_mut(t);
                    th.ensure_stack(fbase + b);
                    th.top = fbase + b;
                    b - 1
                };
                let nres = if c == 0 { MULTRET } else { (c - 1) as i32 };
                save_pc!();
                match do_precall(vm, t, fbase, nargs, nres)? {
                    Precall::Script => return Ok(()),
                    Precall::HostDone => {}
                }
            }
            OpCode::TailCall => {
                let b = Instruction::get_b(i) as usize;
                let fbase = base + a;
                let nargs = if b == 0 {
                    vm.thread(t).top - fbase - 1
                } else {
                    b - 1
                };
                close_upvalues(vm, t, base);
                let (dest, nresults) = {
                    let frame = vm.thread(t).current_frame().expect("frame");
                    (frame.ret_base, frame.nresults)
                };
                {
                    let th = vm.thread_mut(t);
                    th.stack.copy_within(fbase..fbase + 1 + nargs, dest);
                    th.top = dest + 1 + nargs;
                    th.frames.pop();
                }
                do_precall(vm, t, dest, nargs, nresults)?;
                return Ok(());
            }
            OpCode::Return => {
                let b = Instruction::get_b(i) as usize;
                let result_base = base + a;
                let n = if b == 0 {
                    vm.thread(t).top - result_base
                } else {
                    b - 1
                };
                do_return(vm, t, result_base, n);
                return Ok(());
            }
            OpCode::ForPrep => {
                for_prep(vm, t, base + a)?;
                pc = (pc as i64 + Instruction::get_sbx(i) as i64) as usize;
            }
            OpCode::ForLoop => {
                if for_loop(vm, t, base + a) {
                    pc = (pc as i64 + Instruction::get_sbx(i) as i64) as usize;
                }
            }
            OpCode::TForCall => {
                let c = Instruction::get_c(i) as usize;
                let ra = base + a;
                {
                    let th = vm.thread_mut(t);
                    th.ensure_stack(ra + 6);
                    th.stack[ra + 5] = th.stack[ra + 2];
                    th.stack[ra + 4] = th.stack[ra + 1];
                    th.stack[ra + 3] = th.stack[ra];
                    th.top = ra + 6;
                }
                save_pc!();
                match do_precall(vm, t, ra + 3, 2, c as i32)? {
                    Precall::Script => return Ok(()),
                    Precall::HostDone => {}
                }
            }
            OpCode::TForLoop => {
                let ra = base + a;
                let v = vm.thread(t).stack[ra + 1];
                if !v.is_nil() {
                    vm.thread_mut(t).stack[ra] = v;
                    pc = (pc as i64 + Instruction::get_sbx(i) as i64) as usize;
                }
            }
            OpCode::SetList => {
                let b = Instruction::get_b(i) as usize;
                let mut c = Instruction::get_c(i) as usize;
                if c == 0 {
                    c = Instruction::get_ax(code[pc]) as usize;
                    pc += 1;
                }
                let ra = base + a;
                let n = if b == 0 {
                    vm.thread(t).top - ra - 1
                } else {
                    b
                };
                let Some(tid) = vm.thread(t).stack[ra].as_table_id() else {
                    return Err(vm.rt_error("SETLIST target is not a map"));
                };
                let start = ((c - 1) * FIELDS_PER_FLUSH) as i64;
                for j in 1..=n {
                    let v = vm.thread(t).stack[ra + j];
                    vm.pool.table_mut(tid).set_int(start + j as i64 - 1, v);
                }
                vm.thread_mut(t).top = base + proto.max_stack_size as usize;
            }
            OpCode::Closure => {
                let bx = Instruction::get_bx(i) as usize;
                let sub = proto.protos[bx].clone();
                let mut cells = Vec::with_capacity(sub.upvalues.len());
                for desc in &sub.upvalues {
                    if desc.in_stack {
                        cells.push(find_or_create_cell(vm, t, base + desc.index as usize));
                    } else {
                        cells.push(upvals[desc.index as usize]);
                    }
                }
                let id = vm.pool.create_closure(LkClosure::Script {
                    proto: sub,
                    upvalues: cells,
                });
                set_reg!(a, LkValue::Closure(id));
            }
            OpCode::Vararg => {
                let b = Instruction::get_b(i) as usize;
                let ra = base + a;
                let varargs = vm
                    .thread(t)
                    .current_frame()
                    .expect("frame")
                    .varargs
                    .clone();
                let n = if b == 0 { varargs.len() } else { b - 1 };
                let th = vm.thread_mut(t);
                th.ensure_stack(ra + n);
                for j in 0..n {
                    th.stack[ra + j] = varargs.get(j).copied().unwrap_or(LkValue::Nil);
                }
                if b == 0 {
                    th.top = ra + n;
                }
            }
            OpCode::ExtraArg => {
                return Err(vm.rt_error("orphaned EXTRAARG"));
            }
        }
    }
}

// ---- numeric for ----

fn for_number(vm: &mut LkVm, v: LkValue, what: &str) -> LkResult<LkValue> {
    match v {
        LkValue::Int(_) | LkValue::Float(_) => Ok(v),
        _ => {
            let msg = format!("'for' {} must be a number", what);
            Err(vm.rt_error(msg))
        }
    }
}

/// Convert a loop limit for an integer loop, clamping unreachable floats.
fn int_for_limit(limit: LkValue, step_up: bool) -> i64 {
    match limit {
        LkValue::Int(i) => i,
        LkValue::Float(f) => {
            if f.is_nan() {
                // Unsatisfiable in either direction.
                if step_up { i64::MIN } else { i64::MAX }
            } else if step_up {
                if f >= 9.223372036854776e18 {
                    i64::MAX
                } else if f < -9.223372036854776e18 {
                    i64::MIN
                } else {
                    f.floor() as i64
                }
            } else if f >= 9.223372036854776e18 {
                i64::MAX
            } else if f < -9.223372036854776e18 {
                i64::MIN
            } else {
                f.ceil() as i64
            }
        }
        _ => unreachable!(),
    }
}

fn for_prep(vm: &mut LkVm, t: ThreadId, ra: usize) -> LkResult<()> {
    let init = for_number(vm, vm.thread(t).stack[ra], "initial value")?;
    let limit = for_number(vm, vm.thread(t).stack[ra + 1], "limit")?;
    let step = for_number(vm, vm.thread(t).stack[ra + 2], "step")?;
    let step_zero = match step {
        LkValue::Int(0) => true,
        LkValue::Float(f) => f == 0.0,
        _ => false,
    };
    if step_zero {
        return Err(vm.rt_error("'for' step is zero"));
    }
    let th = vm.thread_mut(t);
    match (init, step) {
        (LkValue::Int(i), LkValue::Int(s)) => {
            th.stack[ra] = LkValue::Int(i.wrapping_sub(s));
            th.stack[ra + 1] = LkValue::Int(int_for_limit(limit, s > 0));
        }
        _ => {
            let i = init.as_float().unwrap();
            let l = limit.as_float().unwrap();
            let s = step.as_float().unwrap();
            th.stack[ra] = LkValue::Float(i - s);
            th.stack[ra + 1] = LkValue::Float(l);
            th.stack[ra + 2] = LkValue::Float(s);
        }
    }
    Ok(())
}

/// One numeric-for step; true when the loop continues.
fn for_loop(vm: &mut LkVm, t: ThreadId, ra: usize) -> bool {
    let th = vm.thread_mut(t);
    match (th.stack[ra], th.stack[ra + 1], th.stack[ra + 2]) {
        (LkValue::Int(idx), LkValue::Int(limit), LkValue::Int(step)) => {
            let Some(next) = idx.checked_add(step) else {
                return false;
            };
            let cont = if step > 0 { next <= limit } else { next >= limit };
            if cont {
                th.stack[ra] = LkValue::Int(next);
                th.stack[ra + 3] = LkValue::Int(next);
            }
            cont
        }
        (LkValue::Float(idx), LkValue::Float(limit), LkValue::Float(step)) => {
            let next = idx + step;
            let cont = if step > 0.0 { next <= limit } else { next >= limit };
            if cont {
                th.stack[ra] = LkValue::Float(next);
                th.stack[ra + 3] = LkValue::Float(next);
            }
            cont
        }
        _ => false,
    }
}
