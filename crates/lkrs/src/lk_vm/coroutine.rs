// Coroutine transfer.
//
// Strictly cooperative, single-active: `resume` parks the caller, marks
// the target Running and drives its dispatch loop; `yield` stores the
// outgoing values and unwinds to that `resume` with the target's frame
// stack intact. A later resume feeds its arguments into the recorded
// yield call site and re-enters the loop.

use crate::lk_value::LkValue;
use crate::lk_vm::execute::upvalue::close_upvalues;
use crate::lk_vm::execute::{Precall, do_precall, run};
use crate::lk_vm::thread::{LkThread, ThreadStatus};
use crate::lk_vm::{LkError, LkResult, LkVm, MULTRET};
use crate::objects::ThreadId;

pub(crate) fn create_thread(vm: &mut LkVm, func: LkValue) -> LkValue {
    let id = ThreadId(vm.threads.len() as u32);
    vm.threads.push(LkThread::new_coroutine(func));
    LkValue::Thread(id)
}

pub(crate) fn is_yieldable(vm: &LkVm) -> bool {
    !vm.current.is_main() && vm.current_thread().host_depth == 0
}

/// `yield(values...)`: record the transfer and unwind to the resumer.
/// Yields are rejected on the main thread and across host re-entries
/// (pcall, metamethods, iterator calls) whose Rust frames cannot be
/// suspended.
pub(crate) fn do_yield(vm: &mut LkVm, values: Vec<LkValue>) -> LkError {
    if vm.current.is_main() {
        return vm.coroutine_error("attempt to yield from the main thread");
    }
    if vm.current_thread().host_depth > 0 {
        return vm.coroutine_error("attempt to yield across a host-call boundary");
    }
    vm.current_thread_mut().transfer = values;
    LkError::Yield
}

/// Resume a coroutine. Misuse and coroutine failures both surface as
/// `Ok((false, [error value]))`, matching what `resume` hands scripts.
pub(crate) fn resume_thread(
    vm: &mut LkVm,
    co: LkValue,
    args: Vec<LkValue>,
) -> LkResult<(bool, Vec<LkValue>)> {
    let Some(co_id) = co.as_thread_id() else {
        let v = vm.new_string("cannot resume a non-thread value");
        return Ok((false, vec![v]));
    };
    if co_id == vm.current {
        let v = vm.new_string("cannot resume a running coroutine");
        return Ok((false, vec![v]));
    }
    let status = vm.thread(co_id).status;
    match status {
        ThreadStatus::New | ThreadStatus::Suspended => {}
        ThreadStatus::Dead | ThreadStatus::Errored => {
            let v = vm.new_string("cannot resume dead coroutine");
            return Ok((false, vec![v]));
        }
        ThreadStatus::Ready | ThreadStatus::Running => {
            let v = vm.new_string("cannot resume non-suspended coroutine");
            return Ok((false, vec![v]));
        }
    }

    // Hand over the active token.
    let prev = vm.current;
    vm.thread_mut(prev).status = ThreadStatus::Ready;
    vm.thread_mut(co_id).status = ThreadStatus::Running;
    vm.thread_mut(co_id).caller = Some(prev);
    vm.current = co_id;

    let started = match status {
        ThreadStatus::New => start_coroutine(vm, co_id, args),
        _ => continue_coroutine(vm, co_id, args),
    };
    let outcome = started.and_then(|_| run(vm, co_id, 0));

    // Token back to the resumer.
    vm.current = prev;
    vm.thread_mut(prev).status = ThreadStatus::Running;
    vm.thread_mut(co_id).caller = None;

    match outcome {
        Ok(()) => {
            // The bottom frame returned; results sit at stack[0..top].
            close_upvalues(vm, co_id, 0);
            let th = vm.thread_mut(co_id);
            th.status = ThreadStatus::Dead;
            let results = th.stack[..th.top].to_vec();
            th.stack.clear();
            th.top = 0;
            Ok((true, results))
        }
        Err(LkError::Yield) => {
            let th = vm.thread_mut(co_id);
            th.status = ThreadStatus::Suspended;
            Ok((true, std::mem::take(&mut th.transfer)))
        }
        Err(_) => {
            // Escaped closures must not see dangling register slots.
            close_upvalues(vm, co_id, 0);
            let th = vm.thread_mut(co_id);
            th.status = ThreadStatus::Errored;
            let err = std::mem::replace(&mut th.error_value, LkValue::Nil);
            th.error_plain = false;
            th.frames.clear();
            th.stack.clear();
            th.top = 0;
            Ok((false, vec![err]))
        }
    }
}

/// First resume: plant the entry function and its arguments at the
/// bottom of the coroutine's stack.
fn start_coroutine(vm: &mut LkVm, co: ThreadId, args: Vec<LkValue>) -> LkResult<()> {
    let entry = vm.thread(co).entry;
    {
        let th = vm.thread_mut(co);
        th.ensure_stack(1 + args.len());
        th.stack[0] = entry;
        th.stack[1..1 + args.len()].copy_from_slice(&args);
        th.top = 1 + args.len();
    }
    match do_precall(vm, co, 0, args.len(), MULTRET)? {
        Precall::Script | Precall::HostDone => Ok(()),
    }
}

/// Later resumes: the arguments become the results of the pending
/// `yield` call, placed where that call expected them.
fn continue_coroutine(vm: &mut LkVm, co: ThreadId, args: Vec<LkValue>) -> LkResult<()> {
    let Some(pending) = vm.thread_mut(co).pending.take() else {
        return Err(vm.coroutine_error("suspended coroutine has no pending yield"));
    };
    let th = vm.thread_mut(co);
    if pending.nresults == MULTRET {
        th.ensure_stack(pending.ret_base + args.len());
        th.stack[pending.ret_base..pending.ret_base + args.len()].copy_from_slice(&args);
        th.top = pending.ret_base + args.len();
    } else {
        let want = pending.nresults as usize;
        th.ensure_stack(pending.ret_base + want);
        for i in 0..want {
            th.stack[pending.ret_base + i] = args.get(i).copied().unwrap_or(LkValue::Nil);
        }
        th.top = pending.ret_base + want;
    }
    Ok(())
}
