pub mod asm;
pub mod compile;
pub mod scan;
pub mod symbol;
pub mod token_stream;
pub mod tokens;
pub mod types;

pub use self::asm::{AsmError, Assembler};
pub use self::compile::{CompileError, Compiler, Ctx};
pub use self::symbol::{Scope, SymKind, Symbol, SymbolTable, UNSET_ADDR};
pub use self::tokens::{Span, Token, TokenKind};
pub use self::types::{FuncSig, Type};
