// The LK virtual machine.
//
// `LkVm` is the global state: object pools, registry, globals and the
// thread table. The stack-oriented host API lives in `state.rs`; the
// dispatch loop in `execute/`.

mod coroutine;
mod error;
pub(crate) mod execute;
mod frame;
pub mod opcode;
mod options;
mod state;
mod thread;

pub use error::{LkError, LkFullError, LkResult, LkStatus};
pub use frame::{CallFrame, MULTRET};
pub use opcode::{Instruction, OpCode};
pub use options::VmOptions;
pub use state::REGISTRY_INDEX;
pub use thread::{LkThread, PendingYield, ThreadStatus};

use std::rc::Rc;

use crate::compiler;
use crate::lk_value::{HostFunction, LkClosure, LkValue, UpvalueCell};
use crate::lib_registry::LibraryRegistry;
use crate::objects::{ObjectPool, StringId, TableId, ThreadId};

use execute::metamethod::MetaNames;

/// Registry slot of the main thread.
pub const REGISTRY_MAIN_THREAD: i64 = 1;
/// Registry slot of the globals table.
pub const REGISTRY_GLOBALS: i64 = 2;

pub struct LkVm {
    pub(crate) pool: ObjectPool,
    pub(crate) threads: Vec<LkThread>,
    pub(crate) current: ThreadId,
    pub(crate) registry: TableId,
    pub(crate) globals: TableId,
    pub(crate) options: VmOptions,
    pub(crate) names: MetaNames,
    /// When set, `print` appends here instead of writing to stdout.
    pub(crate) print_sink: Option<Vec<u8>>,
}

impl LkVm {
    pub fn new(options: VmOptions) -> LkVm {
        let mut pool = ObjectPool::new();
        let names = MetaNames::new(&mut pool.strings);
        let registry = pool.create_table(0, 8);
        let globals = pool.create_table(0, 32);

        let mut vm = LkVm {
            pool,
            threads: vec![LkThread::new_main()],
            current: ThreadId::MAIN,
            registry,
            globals,
            options,
            names,
            print_sink: None,
        };

        // Root the main thread and the globals in the registry, plus the
        // module bookkeeping tables.
        vm.pool
            .table_mut(registry)
            .set_int(REGISTRY_MAIN_THREAD, LkValue::Thread(ThreadId::MAIN));
        vm.pool
            .table_mut(registry)
            .set_int(REGISTRY_GLOBALS, LkValue::Table(globals));
        let loaded = vm.pool.create_table(0, 8);
        let preload = vm.pool.create_table(0, 8);
        let k_loaded = vm.new_string("_LOADED");
        let k_preload = vm.new_string("_PRELOAD");
        let _ = vm
            .pool
            .table_mut(registry)
            .raw_set(k_loaded, LkValue::Table(loaded));
        let _ = vm
            .pool
            .table_mut(registry)
            .raw_set(k_preload, LkValue::Table(preload));

        let g = vm.new_string("_G");
        let _ = vm.pool.table_mut(globals).raw_set(g, LkValue::Table(globals));

        vm
    }

    /// Register the baseline libraries (basic + coroutine).
    pub fn open_libs(&mut self) {
        let mut registry = LibraryRegistry::new();
        registry.register(crate::stdlib::basic::create_basic_lib());
        registry.register(crate::stdlib::coroutine::create_coroutine_lib());
        registry.load_all(self);
    }

    // ---- strings ----

    #[inline]
    pub fn intern(&mut self, s: &str) -> StringId {
        self.pool.strings.intern(s)
    }

    #[inline]
    pub fn new_string(&mut self, s: &str) -> LkValue {
        LkValue::Str(self.intern(s))
    }

    /// Owned view of an interned string.
    #[inline]
    pub fn str_of(&self, id: StringId) -> Rc<str> {
        self.pool.strings.get_rc(id)
    }

    // ---- errors ----

    pub(crate) fn thread(&self, id: ThreadId) -> &LkThread {
        &self.threads[id.index()]
    }

    pub(crate) fn thread_mut(&mut self, id: ThreadId) -> &mut LkThread {
        &mut self.threads[id.index()]
    }

    pub(crate) fn current_thread(&self) -> &LkThread {
        self.thread(self.current)
    }

    pub(crate) fn current_thread_mut(&mut self) -> &mut LkThread {
        let id = self.current;
        self.thread_mut(id)
    }

    /// Store an error value on the current thread and hand back the kind.
    pub(crate) fn raise_value(&mut self, kind: LkError, value: LkValue) -> LkError {
        let t = self.current_thread_mut();
        t.error_value = value;
        t.error_plain = false;
        kind
    }

    /// Runtime error whose message still needs its `{chunk}:{line}:` tip;
    /// the dispatch loop adds it when unwinding past a script frame.
    pub(crate) fn rt_error(&mut self, msg: impl Into<String>) -> LkError {
        let v = self.new_string(&msg.into());
        let t = self.current_thread_mut();
        t.error_value = v;
        t.error_plain = true;
        LkError::Runtime
    }

    /// Error raised by a host function; the value is kept verbatim.
    pub(crate) fn host_error(&mut self, value: LkValue) -> LkError {
        self.raise_value(LkError::Host, value)
    }

    pub(crate) fn coroutine_error(&mut self, msg: impl Into<String>) -> LkError {
        let v = self.new_string(&msg.into());
        self.raise_value(LkError::Coroutine, v)
    }

    /// Current thread's error value, for resume/pcall reporting.
    pub fn take_error_value(&mut self) -> LkValue {
        let t = self.current_thread_mut();
        let v = t.error_value;
        t.error_value = LkValue::Nil;
        t.error_plain = false;
        v
    }

    /// Render an `LkError` into a host-facing error with its message.
    pub fn into_full_error(&mut self, kind: LkError) -> LkFullError {
        let v = self.current_thread().error_value;
        let message = match v {
            LkValue::Str(id) => self.str_of(id).to_string(),
            LkValue::Nil => String::new(),
            other => format!("(error value is a {})", other.type_name()),
        };
        LkFullError { kind, message }
    }

    // ---- tables & globals ----

    pub fn create_table(&mut self, asize: usize, hsize: usize) -> LkValue {
        LkValue::Table(self.pool.create_table(asize, hsize))
    }

    pub fn get_global(&mut self, name: &str) -> LkValue {
        let key = self.new_string(name);
        self.pool.table(self.globals).raw_get(&key)
    }

    pub fn set_global(&mut self, name: &str, value: LkValue) {
        let key = self.new_string(name);
        let globals = self.globals;
        let _ = self.pool.table_mut(globals).raw_set(key, value);
    }

    /// Register a bare host function under a global name.
    pub fn register(&mut self, name: &str, func: HostFunction) {
        self.set_global(name, LkValue::HostFn(func));
    }

    /// Build a host closure carrying bound upvalues.
    pub fn create_host_closure(&mut self, func: HostFunction, upvalues: Vec<LkValue>) -> LkValue {
        let cells = upvalues
            .into_iter()
            .map(|v| self.pool.create_cell(UpvalueCell::Closed(v)))
            .collect();
        LkValue::Closure(self.pool.create_closure(LkClosure::Host {
            func,
            upvalues: cells,
        }))
    }

    // ---- compile & run ----

    /// Compile a source chunk into a root prototype.
    pub fn compile(&mut self, source: &str, chunk_name: &str) -> LkResult<Rc<crate::lk_value::Proto>> {
        compiler::compile(self, source, chunk_name).map_err(|msg| {
            let v = self.new_string(&msg);
            self.raise_value(LkError::Syntax, v)
        })
    }

    /// Compile and wrap in a closure whose `_ENV` is the globals table.
    pub fn load(&mut self, source: &str, chunk_name: &str) -> LkResult<LkValue> {
        // A leading signature byte marks a serialised chunk; the
        // serialiser lives outside this crate, so reject with a tip.
        if source.as_bytes().first() == Some(&0x1b) {
            let v = self.new_string("binary chunks are not supported by this loader");
            return Err(self.raise_value(LkError::Syntax, v));
        }
        let proto = self.compile(source, chunk_name)?;
        let env = LkValue::Table(self.globals);
        let cell = self.pool.create_cell(UpvalueCell::Closed(env));
        Ok(LkValue::Closure(self.pool.create_closure(
            LkClosure::Script {
                proto,
                upvalues: vec![cell],
            },
        )))
    }

    /// Compile and run a chunk on the main thread, returning its results.
    pub fn execute_string(&mut self, source: &str) -> LkResult<Vec<LkValue>> {
        self.execute_named(source, "chunk")
    }

    pub fn execute_named(&mut self, source: &str, chunk_name: &str) -> LkResult<Vec<LkValue>> {
        let closure = self.load(source, chunk_name)?;
        let t = self.current;
        let depth = self.thread(t).frames.len();
        let top = self.thread(t).top;
        match self.call_value(closure, &[], MULTRET) {
            Ok(results) => Ok(results),
            Err(e) => {
                // Unwind whatever the failed chunk left behind so the VM
                // stays usable; the error value survives on the thread.
                execute::upvalue::close_upvalues(self, t, top);
                let th = self.thread_mut(t);
                th.frames.truncate(depth);
                th.top = top;
                Err(e)
            }
        }
    }

    /// Call any callable with the given arguments on the current thread.
    pub fn call_value(
        &mut self,
        func: LkValue,
        args: &[LkValue],
        nresults: i32,
    ) -> LkResult<Vec<LkValue>> {
        execute::call_value(self, func, args, nresults)
    }

    /// Protected call: failures are caught, the stack is restored, and
    /// the error value is returned.
    pub fn pcall_value(
        &mut self,
        func: LkValue,
        args: &[LkValue],
        nresults: i32,
    ) -> (bool, Vec<LkValue>) {
        execute::pcall_value(self, func, args, nresults)
    }

    // ---- coroutines ----

    pub fn create_thread(&mut self, func: LkValue) -> LkValue {
        coroutine::create_thread(self, func)
    }

    pub fn resume_thread(
        &mut self,
        co: LkValue,
        args: Vec<LkValue>,
    ) -> LkResult<(bool, Vec<LkValue>)> {
        coroutine::resume_thread(self, co, args)
    }

    pub fn yield_values(&mut self, values: Vec<LkValue>) -> LkError {
        coroutine::do_yield(self, values)
    }

    pub fn thread_status(&self, co: ThreadId) -> ThreadStatus {
        self.thread(co).status
    }

    pub fn is_yieldable(&self) -> bool {
        coroutine::is_yieldable(self)
    }

    // ---- output capture (for embedding and tests) ----

    pub fn capture_output(&mut self) {
        self.print_sink = Some(Vec::new());
    }

    pub fn take_output(&mut self) -> String {
        match self.print_sink.take() {
            Some(buf) => {
                self.print_sink = Some(Vec::new());
                String::from_utf8_lossy(&buf).into_owned()
            }
            None => String::new(),
        }
    }
}
