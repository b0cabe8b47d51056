// Library registration.
//
// A `LibraryModule` bundles host functions under a module name; loading
// installs them as a global table (or straight into the globals for
// `_G`) and records the module in the registry `_LOADED` table.

use crate::lk_value::{HostFunction, LkValue};
use crate::lk_vm::LkVm;

pub struct LibraryModule {
    pub name: &'static str,
    pub entries: Vec<(&'static str, HostFunction)>,
    /// Extra setup after the table is installed (aliases, metatables).
    pub initializer: Option<fn(&mut LkVm)>,
}

impl LibraryModule {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Vec::new(),
            initializer: None,
        }
    }

    pub fn with_function(mut self, name: &'static str, func: HostFunction) -> Self {
        self.entries.push((name, func));
        self
    }

    pub fn with_initializer(mut self, init: fn(&mut LkVm)) -> Self {
        self.initializer = Some(init);
        self
    }
}

/// Build a library module from a function table.
#[macro_export]
macro_rules! lib_module {
    ($name:expr, {
        $($item_name:expr => $item:expr),* $(,)?
    }) => {{
        let mut module = $crate::lib_registry::LibraryModule::new($name);
        $(
            module.entries.push(($item_name, $item));
        )*
        module
    }};
}

pub struct LibraryRegistry {
    modules: Vec<LibraryModule>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn register(&mut self, module: LibraryModule) {
        self.modules.push(module);
    }

    pub fn load_all(&self, vm: &mut LkVm) {
        for module in &self.modules {
            Self::load_module(vm, module);
        }
    }

    fn load_module(vm: &mut LkVm, module: &LibraryModule) {
        if module.name == "_G" {
            for (name, func) in &module.entries {
                vm.register(name, *func);
            }
        } else {
            let table = vm.create_table(0, module.entries.len());
            for (name, func) in &module.entries {
                let key = vm.new_string(name);
                let id = table.as_table_id().unwrap();
                let _ = vm.pool.table_mut(id).raw_set(key, LkValue::HostFn(*func));
            }
            vm.set_global(module.name, table);
            // Record in the registry so repeated loads reuse the table.
            let loaded_key = vm.new_string("_LOADED");
            let registry = vm.registry;
            let loaded = vm.pool.table(registry).raw_get(&loaded_key);
            if let Some(id) = loaded.as_table_id() {
                let mod_key = vm.new_string(module.name);
                let _ = vm.pool.table_mut(id).raw_set(mod_key, table);
            }
        }
        if let Some(init) = module.initializer {
            init(vm);
        }
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
