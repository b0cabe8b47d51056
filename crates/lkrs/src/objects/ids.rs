// Typed handles into the VM object pools.
// A handle is a plain index; the pool that owns the object never shrinks,
// so a handle stays valid for the lifetime of the VM.

macro_rules! pool_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

pool_id!(
    /// Interned string handle. Two equal strings always share one id.
    StringId
);
pool_id!(TableId);
pool_id!(ClosureId);
pool_id!(
    /// Upvalue cell handle. Cell identity is what lets sibling closures
    /// observe each other's writes to a captured local.
    CellId
);

/// Thread handle. Index 0 is always the main thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId {
    pub const MAIN: ThreadId = ThreadId(0);

    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline(always)]
    pub fn is_main(self) -> bool {
        self.0 == 0
    }
}
