//! Result and errors.
use std::fmt::{self, Display, Formatter};

pub type VmResult<T> = std::result::Result<T, RuntimeError>;

/// Fault raised by the machine instead of executing malformed byte-code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// An instruction consumed more values than the stack holds.
    StackUnderflow { op: &'static str },
    /// An operand had the wrong dynamic type for the instruction.
    TypeMismatch { op: &'static str, expected: &'static str },
    /// A memory address fell outside the value stack.
    BadAddress { op: &'static str, addr: i64 },
    /// The instruction pointer left the code array.
    IpOutOfRange { ip: i64 },
    /// `CallX` found something other than a host callable.
    NotCallable,
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow { op } => write!(f, "stack underflow in {}", op),
            Self::TypeMismatch { op, expected } => {
                write!(f, "type mismatch in {}: expected {}", op, expected)
            }
            Self::BadAddress { op, addr } => write!(f, "bad address {} in {}", addr, op),
            Self::IpOutOfRange { ip } => write!(f, "instruction pointer {} out of range", ip),
            Self::NotCallable => write!(f, "call target is not a host callable"),
        }
    }
}

impl std::error::Error for RuntimeError {}
