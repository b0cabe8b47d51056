// Value-to-string conversion.
//
// `__str` wins for reference types, then `__name` labels the handle,
// then a default `type: 0x<id>` form. Integers go through itoa.

use crate::lk_value::LkValue;
use crate::lk_vm::{LkResult, LkVm};

use super::call_value_single;
use super::metamethod::get_metamethod;

/// Render a number the way LK prints it.
pub(crate) fn number_to_string(v: &LkValue) -> String {
    match v {
        LkValue::Int(i) => {
            let mut buf = itoa::Buffer::new();
            buf.format(*i).to_string()
        }
        LkValue::Float(f) => float_to_string(*f),
        _ => unreachable!(),
    }
}

pub(crate) fn float_to_string(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn handle_of(v: &LkValue) -> u64 {
    match v {
        LkValue::Table(id) => id.0 as u64,
        LkValue::Closure(id) => id.0 as u64,
        LkValue::Thread(id) => id.0 as u64,
        LkValue::HostFn(f) => *f as usize as u64,
        LkValue::LightUserdata(p) => *p as u64,
        _ => 0,
    }
}

pub(crate) fn tostring_value(vm: &mut LkVm, v: LkValue) -> LkResult<String> {
    match v {
        LkValue::Nil => Ok("nil".to_string()),
        LkValue::Bool(b) => Ok(b.to_string()),
        LkValue::Int(_) | LkValue::Float(_) => Ok(number_to_string(&v)),
        LkValue::Str(id) => Ok(vm.str_of(id).to_string()),
        other => {
            if let Some(mm) = get_metamethod(vm, &other, vm.names.str_) {
                let r = call_value_single(vm, mm, &[other])?;
                return match r {
                    LkValue::Str(id) => Ok(vm.str_of(id).to_string()),
                    _ => Err(vm.rt_error("'__str' must return a string")),
                };
            }
            if let Some(name) = get_metamethod(vm, &other, vm.names.name) {
                if let LkValue::Str(id) = name {
                    return Ok(format!("{}: 0x{:x}", vm.str_of(id), handle_of(&other)));
                }
            }
            Ok(format!("{}: 0x{:x}", other.type_name(), handle_of(&other)))
        }
    }
}
