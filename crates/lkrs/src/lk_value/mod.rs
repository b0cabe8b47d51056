mod closure;
mod proto;
mod table;
mod value;

pub use closure::{LkClosure, UpvalueCell};
pub use proto::{LocalDebug, Proto, UpvalDesc};
pub use table::{LkTable, TableKeyError};
pub use value::{HostFunction, LkType, LkValue, float_to_int_exact};
