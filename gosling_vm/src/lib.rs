mod bytecode;
mod error;
mod machine;
mod value;

pub use self::bytecode::Op;
pub use self::error::{RuntimeError, VmResult};
pub use self::machine::Machine;
pub use self::value::{NativeFn, Value};

pub mod prelude {
    pub use super::{
        bytecode::Op,
        error::{RuntimeError, VmResult},
        machine::Machine,
        value::{NativeFn, Value},
    };
}
