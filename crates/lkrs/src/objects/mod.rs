mod ids;
mod object_pool;
mod string_interner;

pub use ids::{CellId, ClosureId, StringId, TableId, ThreadId};
pub use object_pool::ObjectPool;
pub use string_interner::StringInterner;
