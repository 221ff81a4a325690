//! Assembles compiled token sequences into machine instructions.
//!
//! Labels and jumps arrive from the compiler as symbolic placeholders.
//! Emission records label offsets into a persistent arena and leaves
//! jump deltas blank; a separate link pass resolves them, so forward
//! references inside a unit and calls into previously assembled units
//! both work.
use std::{collections::HashMap, error, fmt};

use log::trace;
use smol_str::SmolStr;

use gosling_vm::{Op, Value};

use crate::{
    symbol::{Scope, SymKind, SymbolTable, UNSET_ADDR},
    tokens::{Token, TokenKind},
};

pub type AsmResult<T> = Result<T, AsmError>;

/// Turns compiled token sequences into byte-code, one unit at a time.
///
/// The label arena lives across units: a unit assembled later can jump
/// to or call labels defined by an earlier one.
#[derive(Debug, Default)]
pub struct Assembler {
    /// Label name to absolute instruction offset.
    labels: HashMap<SmolStr, usize>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler::default()
    }

    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Assembles one unit whose first instruction will live at absolute
    /// offset `base`. The returned code always ends with an `Exit` so a
    /// unit runs to a clean halt.
    pub fn assemble(
        &mut self,
        toks: &[Token],
        symbols: &SymbolTable,
        base: usize,
    ) -> AsmResult<Vec<Op>> {
        let mut code: Vec<Op> = Vec::new();
        let mut fixups: Vec<(usize, SmolStr)> = Vec::new();
        let mut scopes: Vec<Scope> = vec![Scope::root()];
        let mut pending_enter = false;

        let mut iter = toks.iter().peekable();
        while let Some(t) = iter.next() {
            match t.kind {
                TokenKind::Enter => {
                    scopes.push(Scope::from_path(&t.text));
                    pending_enter = true;
                }
                TokenKind::Exit => {
                    code.push(Op::Exit);
                    if scopes.len() > 1 {
                        scopes.pop();
                    }
                }
                TokenKind::Label => {
                    // A function epilogue guard sits between the end
                    // label and whatever follows; emit it first so
                    // falling through a declaration continues past it,
                    // while a body running off its end still halts.
                    if iter.peek().map_or(false, |next| next.kind == TokenKind::Exit) {
                        code.push(Op::Exit);
                        iter.next();
                        if scopes.len() > 1 {
                            scopes.pop();
                        }
                    }
                    self.labels.insert(t.text.clone(), base + code.len());
                    if pending_enter {
                        code.push(Op::Enter);
                        pending_enter = false;
                    }
                }
                TokenKind::Goto => {
                    fixups.push((code.len(), t.text.clone()));
                    code.push(Op::Jump(0));
                }
                TokenKind::JumpFalse => {
                    // The machine only jumps on true: skip over an
                    // unconditional jump when the condition holds.
                    code.push(Op::JumpTrue(2));
                    fixups.push((code.len(), t.text.clone()));
                    code.push(Op::Jump(0));
                }
                TokenKind::Call => {
                    fixups.push((code.len(), t.text.clone()));
                    code.push(Op::Call(0));
                }
                TokenKind::CallX => code.push(Op::CallX(t.beg as usize)),
                TokenKind::Return => code.push(Op::Return {
                    num_out: t.beg as usize,
                    num_in: t.end as usize,
                }),
                TokenKind::Int => {
                    let n = t
                        .text
                        .parse()
                        .map_err(|_| AsmError::BadLiteral(t.text.clone()))?;
                    code.push(Op::Push(n));
                }
                TokenKind::Ident => {
                    let scope = scopes.last().cloned().unwrap_or_default();
                    self.emit_ident(t, symbols, &scope, &mut code)?
                }
                TokenKind::Add => code.push(Op::Add),
                TokenKind::Sub => code.push(Op::Sub),
                TokenKind::Less => code.push(Op::Lower),
                TokenKind::Assign => code.push(Op::Assign),
                TokenKind::Semicolon => {}
                other => return Err(AsmError::UnsupportedToken(other)),
            }
        }
        code.push(Op::Exit);

        // Link pass: resolve symbolic jump targets to relative deltas.
        for (at, label) in fixups {
            let target = *self
                .labels
                .get(&label)
                .ok_or_else(|| AsmError::UndefinedLabel(label.clone()))?;
            let delta = target as i64 - (base + at) as i64;
            code[at] = match code[at] {
                Op::Call(_) => Op::Call(delta),
                _ => Op::Jump(delta),
            };
        }

        trace!("assembled {} instructions at base {}", code.len(), base);
        Ok(code)
    }

    fn emit_ident(
        &self,
        t: &Token,
        symbols: &SymbolTable,
        scope: &Scope,
        code: &mut Vec<Op>,
    ) -> AsmResult<()> {
        let (sym, _) = symbols
            .lookup(&t.text, scope)
            .ok_or_else(|| AsmError::UnresolvedSymbol(t.text.clone()))?;

        match sym.kind {
            // Functions and labels are consumed by their call token.
            SymKind::Func | SymKind::Label => Ok(()),
            SymKind::Const => match &sym.value {
                Some(Value::Int(n)) => {
                    code.push(Op::Push(*n));
                    Ok(())
                }
                _ => Err(AsmError::UnsupportedConstant(t.text.clone())),
            },
            SymKind::Type => Err(AsmError::NotAValue(t.text.clone())),
            SymKind::Var | SymKind::Value => {
                if sym.index == UNSET_ADDR {
                    return Err(AsmError::NoAddress(t.text.clone()));
                }
                if t.end == 1 {
                    // Address mode: the identifier is an assignment
                    // target. Only absolute cells can be assigned.
                    if sym.local {
                        return Err(AsmError::NotAssignable(t.text.clone()));
                    }
                    code.push(Op::Push(sym.index));
                } else if sym.local {
                    code.push(Op::Fdup(sym.index));
                } else {
                    code.push(Op::Dup(sym.index as usize));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    UndefinedLabel(SmolStr),
    UnresolvedSymbol(SmolStr),
    /// The symbol exists but occupies no runtime memory cell.
    NoAddress(SmolStr),
    NotAValue(SmolStr),
    NotAssignable(SmolStr),
    UnsupportedConstant(SmolStr),
    /// The operator has no corresponding machine instruction yet.
    UnsupportedToken(TokenKind),
    BadLiteral(SmolStr),
}

impl error::Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UndefinedLabel(name) => write!(f, "undefined label {}", name),
            Self::UnresolvedSymbol(name) => write!(f, "unresolved symbol {}", name),
            Self::NoAddress(name) => write!(f, "symbol {} has no runtime address", name),
            Self::NotAValue(name) => write!(f, "{} is not a value", name),
            Self::NotAssignable(name) => write!(f, "cannot assign to {}", name),
            Self::UnsupportedConstant(name) => {
                write!(f, "constant {} cannot be materialized", name)
            }
            Self::UnsupportedToken(kind) => write!(f, "no instruction for {:?}", kind),
            Self::BadLiteral(text) => write!(f, "bad integer literal {}", text),
        }
    }
}
