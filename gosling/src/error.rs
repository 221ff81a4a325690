//! Result and errors.
use std::fmt::{self, Display, Formatter};

use gosling_compiler::{AsmError, CompileError};
use gosling_vm::RuntimeError;

pub type GoslingResult<T> = std::result::Result<T, GoslingError>;

#[derive(Debug)]
pub enum GoslingError {
    Compile(CompileError),
    Asm(AsmError),
    Runtime(RuntimeError),
}

impl Display for GoslingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(err) => write!(f, "compile error: {}", err),
            Self::Asm(err) => write!(f, "assembly error: {}", err),
            Self::Runtime(err) => write!(f, "runtime error: {}", err),
        }
    }
}

impl std::error::Error for GoslingError {}

impl From<CompileError> for GoslingError {
    fn from(err: CompileError) -> Self {
        GoslingError::Compile(err)
    }
}

impl From<AsmError> for GoslingError {
    fn from(err: AsmError) -> Self {
        GoslingError::Asm(err)
    }
}

impl From<RuntimeError> for GoslingError {
    fn from(err: RuntimeError) -> Self {
        GoslingError::Runtime(err)
    }
}
