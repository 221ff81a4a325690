//! Expression compilation: infix to stack evaluation order.
use log::{debug, trace};

use crate::{
    scan,
    symbol::SymKind,
    token_stream::TokenSlice,
    tokens::{Token, TokenKind},
};

use super::{Compiler, CompileResult, Ctx};

/// How a parenthesized group combines with its left neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    /// An enclosed sub-expression.
    Grouping,
    /// A call to a compiled function with a known code label.
    Static,
    /// A call to a host-environment value, resolved at runtime.
    Dynamic,
}

impl Compiler {
    /// Reorders an infix token sequence into stack evaluation order in
    /// one backward pass: operands keep their source order, every
    /// operator follows its operands.
    pub(crate) fn compile_expr(&mut self, toks: &[Token], ctx: &Ctx) -> CompileResult<Vec<Token>> {
        trace!("compile expr: {}", toks.display());
        let mut out: Vec<Token> = Vec::new();
        let mut ops: Vec<Token> = Vec::new();
        let mut values = 0usize;

        // Binary operators returning one value are assumed throughout.
        for i in (0..toks.len()).rev() {
            let t = &toks[i];
            match t.kind {
                TokenKind::Ident | TokenKind::Int | TokenKind::Str => {
                    let mut t = t.clone();
                    // An identifier written as the target of an
                    // assignment is emitted in address mode.
                    if t.kind == TokenKind::Ident
                        && toks.get(i + 1).map_or(false, |next| {
                            matches!(next.kind, TokenKind::Assign | TokenKind::Define)
                        })
                    {
                        t.end = 1;
                    }
                    out.insert(0, t);
                    values += 1;
                }
                TokenKind::Define
                | TokenKind::Assign
                | TokenKind::Equal
                | TokenKind::Add
                | TokenKind::Sub
                | TokenKind::Less => {
                    // TODO: handle operator precedence to swap operators
                    // and operands where necessary
                    if values < 2 {
                        ops.push(t.clone());
                    }
                }
                TokenKind::ParenBlock => {
                    out.insert(0, t.clone());
                    values += 1;
                    match self.classify_call(toks, i, ctx)? {
                        CallKind::Grouping => {}
                        CallKind::Static => {
                            let mut call = Token::pseudo(TokenKind::Call, toks[i - 1].text.clone());
                            call.span = t.span;
                            ops.push(call);
                        }
                        CallKind::Dynamic => {
                            let mut call = Token::pseudo(TokenKind::CallX, toks[i - 1].text.clone());
                            call.span = t.span;
                            // Argument count rides in the generic payload.
                            call.beg = self.num_items(t.block())?;
                            ops.push(call);
                        }
                    }
                }
                _ => {}
            }

            if !ops.is_empty() && values > ops.len() {
                if let Some(op) = ops.pop() {
                    out.push(op);
                    values -= 1;
                }
            }
        }
        // TODO: verify that pending operators flush correctly for
        // expressions with more than one of them
        out.extend(ops);

        // The tokens are now ordered; expand remaining groups in place.
        let mut i = out.len();
        while i > 0 {
            i -= 1;
            match out[i].kind {
                TokenKind::ParenBlock | TokenKind::BracketBlock => {
                    let expanded = self.compile_expr_str(out[i].block(), ctx)?;
                    out.splice(i..=i, expanded);
                }
                _ => {}
            }
        }

        debug!("expr out: {}", out.display());
        Ok(out)
    }

    /// Decides whether a group is an enclosed expression or a call, and
    /// for calls, whether the callee is a compiled function or a
    /// host-environment value.
    fn classify_call(&mut self, toks: &[Token], i: usize, ctx: &Ctx) -> CompileResult<CallKind> {
        if i == 0 || toks[i - 1].kind.is_operator() {
            return Ok(CallKind::Grouping);
        }

        let callee = &toks[i - 1];
        if callee.kind != TokenKind::Ident {
            return Ok(CallKind::Static);
        }

        let kind = self
            .symbols
            .lookup(&callee.text, &ctx.scope)
            .map(|(sym, resolved)| {
                debug!(
                    "call expr {}: kind {:?} in scope {:?}",
                    callee.text, sym.kind, resolved
                );
                sym.kind
            });
        self.symbols.mark_used(&callee.text, &ctx.scope);

        if kind == Some(SymKind::Value) {
            return Ok(CallKind::Dynamic);
        }
        Ok(CallKind::Static)
    }

    /// Compiles the text of an argument list or enclosed expression.
    /// Comma segments compile independently; a later segment's code
    /// precedes an earlier one's, so the first argument ends up on top
    /// of the stack.
    fn compile_expr_str(&mut self, text: &str, ctx: &Ctx) -> CompileResult<Vec<Token>> {
        let toks = scan::scan(text, false)?;
        let mut result = Vec::new();
        for segment in toks.segments(TokenKind::Comma) {
            let mut compiled = self.compile_expr(segment, ctx)?;
            compiled.extend(result);
            result = compiled;
        }
        Ok(result)
    }

    /// Counts the comma-separated items in a call's raw argument text.
    ///
    /// This deliberately re-scans the text instead of reusing the
    /// already-tokenized argument list.
    fn num_items(&self, text: &str) -> CompileResult<i64> {
        let toks = scan::scan(text, false)?;
        let count = toks
            .segments(TokenKind::Comma)
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .count();
        Ok(count as i64)
    }
}
