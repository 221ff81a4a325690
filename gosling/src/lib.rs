mod error;
mod interp;

pub use self::error::{GoslingError, GoslingResult};
pub use self::interp::Interp;

pub mod prelude {
    pub use super::{
        error::{GoslingError, GoslingResult},
        interp::Interp,
    };
    pub use gosling_vm::{NativeFn, Value};
}
