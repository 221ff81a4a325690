//! Static type descriptors.
use std::fmt;

/// Type attached to a symbol. Only the arity of function types is
/// consumed by the compiler today; the rest exist so declarations can
/// be checked for unknown type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Any,
    Bool,
    Error,
    Int,
    Str,
    Func(FuncSig),
}

/// Input and output arity of a function, the part of its signature the
/// calling convention depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuncSig {
    pub num_in: usize,
    pub num_out: usize,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Bool => write!(f, "bool"),
            Type::Error => write!(f, "error"),
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "string"),
            Type::Func(sig) => write!(f, "func({} in, {} out)", sig.num_in, sig.num_out),
        }
    }
}
