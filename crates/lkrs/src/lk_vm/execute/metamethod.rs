// Metamethod lookup.
//
// Tables consult their own metatable; every other type falls back to a
// per-type default stored in the registry. Metamethod name strings are
// interned once at VM start.

use crate::lk_value::{LkType, LkValue};
use crate::lk_vm::LkVm;
use crate::objects::{StringId, StringInterner, TableId};

pub struct MetaNames {
    pub add: StringId,
    pub sub: StringId,
    pub mul: StringId,
    pub modulo: StringId,
    pub pow: StringId,
    pub div: StringId,
    pub idiv: StringId,
    pub band: StringId,
    pub bor: StringId,
    pub bxor: StringId,
    pub shl: StringId,
    pub shr: StringId,
    pub unm: StringId,
    pub bnot: StringId,
    pub index: StringId,
    pub newindex: StringId,
    pub call: StringId,
    pub eq: StringId,
    pub lt: StringId,
    pub le: StringId,
    pub len: StringId,
    pub str_: StringId,
    pub name: StringId,
    /// Registry keys of the per-type default metatables, by type index.
    pub type_mt_keys: [StringId; 8],
}

pub(crate) fn type_index(t: LkType) -> usize {
    match t {
        LkType::Nil => 0,
        LkType::Bool => 1,
        LkType::Number => 2,
        LkType::Str => 3,
        LkType::Table => 4,
        LkType::Function => 5,
        LkType::Thread => 6,
        LkType::Userdata => 7,
    }
}

impl MetaNames {
    pub fn new(strings: &mut StringInterner) -> MetaNames {
        let type_mt_keys = [
            strings.intern("__mt:nil"),
            strings.intern("__mt:bool"),
            strings.intern("__mt:num"),
            strings.intern("__mt:str"),
            strings.intern("__mt:map"),
            strings.intern("__mt:func"),
            strings.intern("__mt:thread"),
            strings.intern("__mt:userdata"),
        ];
        MetaNames {
            add: strings.intern("__add"),
            sub: strings.intern("__sub"),
            mul: strings.intern("__mul"),
            modulo: strings.intern("__mod"),
            pow: strings.intern("__pow"),
            div: strings.intern("__div"),
            idiv: strings.intern("__idiv"),
            band: strings.intern("__band"),
            bor: strings.intern("__bor"),
            bxor: strings.intern("__bxor"),
            shl: strings.intern("__shl"),
            shr: strings.intern("__shr"),
            unm: strings.intern("__unm"),
            bnot: strings.intern("__bnot"),
            index: strings.intern("__index"),
            newindex: strings.intern("__newindex"),
            call: strings.intern("__call"),
            eq: strings.intern("__eq"),
            lt: strings.intern("__lt"),
            le: strings.intern("__le"),
            len: strings.intern("__len"),
            str_: strings.intern("__str"),
            name: strings.intern("__name"),
            type_mt_keys,
        }
    }
}

/// Metatable of a value: a table's own, or the per-type default.
pub(crate) fn get_metatable(vm: &LkVm, v: &LkValue) -> Option<TableId> {
    if let LkValue::Table(id) = v {
        return vm.pool.table(*id).metatable();
    }
    let key = vm.names.type_mt_keys[type_index(v.type_of())];
    vm.pool
        .table(vm.registry)
        .raw_get(&LkValue::Str(key))
        .as_table_id()
}

/// Fetch a metamethod by interned name; `None` when absent or nil.
pub(crate) fn get_metamethod(vm: &LkVm, v: &LkValue, name: StringId) -> Option<LkValue> {
    let mt = get_metatable(vm, v)?;
    let m = vm.pool.table(mt).raw_get(&LkValue::Str(name));
    if m.is_nil() { None } else { Some(m) }
}

impl LkVm {
    /// Install a default metatable for every value of the given type.
    pub fn set_type_metatable(&mut self, t: LkType, mt: Option<LkValue>) {
        let key = self.names.type_mt_keys[type_index(t)];
        let registry = self.registry;
        let _ = self
            .pool
            .table_mut(registry)
            .raw_set(LkValue::Str(key), mt.unwrap_or(LkValue::Nil));
    }
}
