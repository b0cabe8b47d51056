/// Resource limits for a VM instance.
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Maximum script call depth per thread.
    pub max_call_depth: usize,
    /// Maximum nested host re-entries (pcall, metamethods, iterators).
    pub max_host_depth: usize,
    /// Hard cap on a thread's value stack, in slots.
    pub max_stack_slots: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        VmOptions {
            max_call_depth: 10_000,
            max_host_depth: 200,
            max_stack_slots: 1 << 20,
        }
    }
}
