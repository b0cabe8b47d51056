// Table access, length, equality and ordering, with metamethod fallback.

use crate::lk_value::{LkValue, TableKeyError};
use crate::lk_vm::{LkResult, LkVm};

use super::arith::{float_le_int, float_lt_int, int_le_float, int_lt_float};
use super::call_value_single;
use super::metamethod::{get_metamethod, get_metatable};

/// Longest `__index`/`__newindex` chain before the VM assumes a loop.
const MAX_META_CHAIN: usize = 100;

fn key_error(vm: &mut LkVm, e: TableKeyError) -> crate::lk_vm::LkError {
    vm.rt_error(e.message())
}

/// `t[k]` read with `__index` fallback.
pub(crate) fn table_get(vm: &mut LkVm, t: LkValue, key: LkValue) -> LkResult<LkValue> {
    let mut cur = t;
    for _ in 0..MAX_META_CHAIN {
        if let LkValue::Table(id) = cur {
            let raw = vm.pool.table(id).raw_get(&key);
            if !raw.is_nil() {
                return Ok(raw);
            }
            match get_metamethod(vm, &cur, vm.names.index) {
                None => return Ok(LkValue::Nil),
                Some(mm) if mm.is_callable() => return call_value_single(vm, mm, &[cur, key]),
                Some(mm) => cur = mm,
            }
        } else {
            match get_metamethod(vm, &cur, vm.names.index) {
                Some(mm) if mm.is_callable() => return call_value_single(vm, mm, &[cur, key]),
                Some(mm) => cur = mm,
                None => {
                    let msg = format!("attempt to index a {} value", cur.type_name());
                    return Err(vm.rt_error(msg));
                }
            }
        }
    }
    Err(vm.rt_error("'__index' chain too long; possible loop"))
}

/// `t[k] = v` write with `__newindex` fallback.
pub(crate) fn table_set(vm: &mut LkVm, t: LkValue, key: LkValue, value: LkValue) -> LkResult<()> {
    let mut cur = t;
    for _ in 0..MAX_META_CHAIN {
        if let LkValue::Table(id) = cur {
            let exists = !vm.pool.table(id).raw_get(&key).is_nil();
            if exists || get_metamethod(vm, &cur, vm.names.newindex).is_none() {
                let r = vm.pool.table_mut(id).raw_set(key, value);
                return r.map_err(|e| key_error(vm, e));
            }
            let mm = get_metamethod(vm, &cur, vm.names.newindex).unwrap();
            if mm.is_callable() {
                call_value_single(vm, mm, &[cur, key, value])?;
                return Ok(());
            }
            cur = mm;
        } else {
            match get_metamethod(vm, &cur, vm.names.newindex) {
                Some(mm) if mm.is_callable() => {
                    call_value_single(vm, mm, &[cur, key, value])?;
                    return Ok(());
                }
                Some(mm) => cur = mm,
                None => {
                    let msg = format!("attempt to index a {} value", cur.type_name());
                    return Err(vm.rt_error(msg));
                }
            }
        }
    }
    Err(vm.rt_error("'__newindex' chain too long; possible loop"))
}

/// `#v`: string byte length, table array border, else `__len`.
pub(crate) fn value_len(vm: &mut LkVm, v: LkValue) -> LkResult<LkValue> {
    match v {
        LkValue::Str(id) => Ok(LkValue::Int(vm.pool.strings.get(id).len() as i64)),
        LkValue::Table(id) => Ok(LkValue::Int(vm.pool.table(id).len() as i64)),
        other => {
            if let Some(mm) = get_metamethod(vm, &other, vm.names.len) {
                call_value_single(vm, mm, &[other])
            } else {
                let msg = format!("attempt to get length of a {} value", other.type_name());
                Err(vm.rt_error(msg))
            }
        }
    }
}

/// `==`: raw value equality; `__eq` only for two raw-unequal tables.
pub(crate) fn value_eq(vm: &mut LkVm, a: LkValue, b: LkValue) -> LkResult<bool> {
    if a.raw_equal(&b) {
        return Ok(true);
    }
    if let (LkValue::Table(_), LkValue::Table(_)) = (&a, &b) {
        let mm =
            get_metamethod(vm, &a, vm.names.eq).or_else(|| get_metamethod(vm, &b, vm.names.eq));
        if let Some(mm) = mm {
            let r = call_value_single(vm, mm, &[a, b])?;
            return Ok(r.is_truthy());
        }
    }
    Ok(false)
}

fn num_lt(a: &LkValue, b: &LkValue) -> bool {
    match (a, b) {
        (LkValue::Int(x), LkValue::Int(y)) => x < y,
        (LkValue::Float(x), LkValue::Float(y)) => x < y,
        (LkValue::Int(x), LkValue::Float(y)) => int_lt_float(*x, *y),
        (LkValue::Float(x), LkValue::Int(y)) => float_lt_int(*x, *y),
        _ => unreachable!(),
    }
}

fn num_le(a: &LkValue, b: &LkValue) -> bool {
    match (a, b) {
        (LkValue::Int(x), LkValue::Int(y)) => x <= y,
        (LkValue::Float(x), LkValue::Float(y)) => x <= y,
        (LkValue::Int(x), LkValue::Float(y)) => int_le_float(*x, *y),
        (LkValue::Float(x), LkValue::Int(y)) => float_le_int(*x, *y),
        _ => unreachable!(),
    }
}

pub(crate) fn value_lt(vm: &mut LkVm, a: LkValue, b: LkValue) -> LkResult<bool> {
    if a.is_number() && b.is_number() {
        return Ok(num_lt(&a, &b));
    }
    if let (LkValue::Str(x), LkValue::Str(y)) = (&a, &b) {
        return Ok(vm.pool.strings.get(*x).as_bytes() < vm.pool.strings.get(*y).as_bytes());
    }
    let mm = get_metamethod(vm, &a, vm.names.lt).or_else(|| get_metamethod(vm, &b, vm.names.lt));
    if let Some(mm) = mm {
        let r = call_value_single(vm, mm, &[a, b])?;
        return Ok(r.is_truthy());
    }
    let msg = format!(
        "attempt to compare {} with {}",
        a.type_name(),
        b.type_name()
    );
    Err(vm.rt_error(msg))
}

pub(crate) fn value_le(vm: &mut LkVm, a: LkValue, b: LkValue) -> LkResult<bool> {
    if a.is_number() && b.is_number() {
        return Ok(num_le(&a, &b));
    }
    if let (LkValue::Str(x), LkValue::Str(y)) = (&a, &b) {
        return Ok(vm.pool.strings.get(*x).as_bytes() <= vm.pool.strings.get(*y).as_bytes());
    }
    let mm = get_metamethod(vm, &a, vm.names.le).or_else(|| get_metamethod(vm, &b, vm.names.le));
    if let Some(mm) = mm {
        let r = call_value_single(vm, mm, &[a, b])?;
        return Ok(r.is_truthy());
    }
    let msg = format!(
        "attempt to compare {} with {}",
        a.type_name(),
        b.type_name()
    );
    Err(vm.rt_error(msg))
}

/// `__call` support: callable value for `v`, or the metamethod that will
/// receive `v` as its first argument.
pub(crate) fn resolve_callable(vm: &LkVm, v: &LkValue) -> Option<LkValue> {
    if v.is_callable() {
        return Some(*v);
    }
    let _ = get_metatable(vm, v)?;
    get_metamethod(vm, v, vm.names.call)
}
