//! Statement and control-flow compilation.
//!
//! Source text is scanned into a flat token list, split into
//! semicolon-terminated statements and compiled, statement by
//! statement, into a token sequence in stack evaluation order,
//! annotated with pseudo instructions (labels, jumps, calls) for the
//! assembler to resolve.
mod expr;

use std::{collections::HashMap, error, fmt};

use log::{debug, trace};
use smol_str::SmolStr;

use crate::{
    scan::{self, ScanError},
    symbol::{Scope, SymKind, Symbol, SymbolTable},
    token_stream::TokenSlice,
    tokens::{Span, Token, TokenKind},
    types::{FuncSig, Type},
};

pub type CompileResult<T> = Result<T, CompileError>;

/// Compilation context threaded down the statement recursion.
///
/// Each nested unit gets its own value, so unwinding out of a function
/// body restores the enclosing scope and function on every path,
/// including errors.
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    pub scope: Scope,
    /// Name of the enclosing function; empty at top level.
    pub fname: SmolStr,
    /// Signature of the enclosing function.
    pub func: Option<FuncSig>,
}

impl Ctx {
    /// Context for compiling the body of `name`.
    fn enter_func(&self, name: &str, sig: FuncSig) -> Ctx {
        let mut scope = self.scope.clone();
        scope.push(name);
        Ctx {
            scope,
            fname: SmolStr::new(name),
            func: Some(sig),
        }
    }
}

pub struct Compiler {
    symbols: SymbolTable,
    /// Per-function counters for conditional label prefixes.
    label_count: HashMap<String, usize>,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            symbols: SymbolTable::universe(),
            label_count: HashMap::new(),
        }
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Pre-registers a named value in the global namespace, for the
    /// embedding driver to expose host values before compilation.
    pub fn declare(
        &mut self,
        addr: i64,
        name: &str,
        kind: SymKind,
        value: Option<gosling_vm::Value>,
        ty: Option<Type>,
    ) {
        self.symbols.declare(addr, name, kind, value, ty, false);
    }

    /// Compiles one unit of source text into an instruction token
    /// sequence for the assembler.
    pub fn compile(&mut self, src: &str) -> CompileResult<Vec<Token>> {
        self.compile_unit(src, &Ctx::default())
    }

    fn compile_unit(&mut self, src: &str, ctx: &Ctx) -> CompileResult<Vec<Token>> {
        debug!("compile unit: {:?}", src);
        let toks = scan::scan(src, true)?;
        let mut input = toks.as_slice();
        let mut out = Vec::new();

        while !input.is_empty() {
            let mut endstmt = input
                .index_of(TokenKind::Semicolon)
                .ok_or(CompileError::MissingTerminator)?;

            // An `if` or `for` statement may carry an initializer, so the
            // statement does not end at the first terminator unless the
            // token before it is the brace body.
            if input[0].kind.has_init() {
                while input[endstmt - 1].kind != TokenKind::BraceBlock {
                    let next = input[endstmt + 1..]
                        .index_of(TokenKind::Semicolon)
                        .ok_or(CompileError::MissingTerminator)?;
                    endstmt += 1 + next;
                }
            }

            out.extend(self.compile_stmt(&input[..endstmt], ctx)?);
            input = &input[endstmt + 1..];
        }

        Ok(out)
    }

    fn compile_stmt(&mut self, toks: &[Token], ctx: &Ctx) -> CompileResult<Vec<Token>> {
        if toks.is_empty() {
            return Ok(Vec::new());
        }
        trace!("compile stmt: {}", toks.display());
        match toks[0].kind {
            TokenKind::Func => self.compile_func(toks, ctx),
            TokenKind::If => self.compile_if(toks, ctx),
            TokenKind::Return => self.compile_return(toks, ctx),
            _ => self.compile_expr(toks, ctx),
        }
    }

    /// Compiles a function declaration.
    ///
    /// The emitted prologue is an `Enter` tagged with the function's
    /// scope, a `Goto` over the body so straight-line execution skips
    /// the definition, and the function's entry label; the epilogue is
    /// the end label and an `Exit` guard.
    fn compile_func(&mut self, toks: &[Token], ctx: &Ctx) -> CompileResult<Vec<Token>> {
        let name = match toks.get(1) {
            Some(t) if t.kind == TokenKind::Ident => t,
            _ => return Err(CompileError::MissingFunctionName { span: toks[0].span }),
        };
        let fname = name.text.clone();
        let existing = self
            .symbols
            .lookup(&fname, &ctx.scope)
            .map(|(_, resolved)| resolved.key(&fname));
        let key = match existing {
            Some(key) => key,
            None => {
                let key = ctx.scope.key(&fname);
                self.symbols.insert(key.clone(), Symbol::new(SymKind::Func));
                key
            }
        };

        let mut scope = ctx.scope.clone();
        scope.push(&fname);

        let mut out = vec![
            Token::pseudo(TokenKind::Enter, scope.as_str()),
            Token::pseudo(TokenKind::Goto, format!("{}_end", fname)),
            Token {
                span: toks[0].span,
                ..Token::pseudo(TokenKind::Label, fname.clone())
            },
        ];

        let body_index = toks
            .index_of(TokenKind::BraceBlock)
            .ok_or(CompileError::NoFunctionBody { span: toks[0].span })?;
        let sig = self.parse_signature(&toks[..body_index], &scope)?;
        if let Some(symbol) = self.symbols.get_mut(&key) {
            symbol.kind = SymKind::Func;
            symbol.ty = Some(Type::Func(sig));
        }

        let inner = ctx.enter_func(&fname, sig);
        debug!("compile func {} in scope {:?}: {:?}", fname, inner.scope, sig);
        let body = self.compile_unit(toks[body_index].block(), &inner)?;
        out.extend(body);
        out.push(Token::pseudo(TokenKind::Label, format!("{}_end", fname)));
        out.push(Token::pseudo(TokenKind::Exit, ""));
        Ok(out)
    }

    /// Parses the declaration prefix `func name(params) results` up to
    /// the body, declaring each parameter in the function's scope with
    /// its frame-relative address.
    fn parse_signature(&mut self, toks: &[Token], scope: &Scope) -> CompileResult<FuncSig> {
        let params_index = toks
            .index_of(TokenKind::ParenBlock)
            .ok_or(CompileError::MissingSignature)?;
        let params = scan::scan(toks[params_index].block(), false)?;

        // Go-style grouped parameters: a type token applies to the
        // untyped names before it, so walk the segments backward.
        let mut named: Vec<(SmolStr, Type)> = Vec::new();
        let mut current: Option<Type> = None;
        for segment in params.segments(TokenKind::Comma).iter().rev() {
            let (name, ty_name) = match segment {
                [] => continue,
                [name] if name.kind == TokenKind::Ident => (name, None),
                [name, ty] if name.kind == TokenKind::Ident && ty.kind == TokenKind::Ident => {
                    (name, Some(&ty.text))
                }
                _ => return Err(CompileError::BadParameter { span: toks[params_index].span }),
            };
            if let Some(ty_name) = ty_name {
                current = Some(self.resolve_type(ty_name, scope)?);
            }
            let ty = current.ok_or(CompileError::BadParameter { span: toks[params_index].span })?;
            named.push((name.text.clone(), ty));
        }

        let num_in = named.len();
        for (j, (pname, ty)) in named.iter().rev().enumerate() {
            // Parameter j sits j slots below the first argument, which
            // is on top of the caller-pushed arguments at frame entry.
            self.symbols.insert(
                scope.key(pname),
                Symbol {
                    index: -(j as i64 + 2),
                    local: true,
                    ty: Some(*ty),
                    ..Symbol::new(SymKind::Var)
                },
            );
        }

        let results = &toks[params_index + 1..];
        let num_out = match results {
            [] => 0,
            [t] if t.kind == TokenKind::ParenBlock => {
                let inner = scan::scan(t.block(), false)?;
                let mut count = 0;
                for segment in inner.segments(TokenKind::Comma) {
                    match segment {
                        [] => continue,
                        [ty] if ty.kind == TokenKind::Ident => {
                            self.resolve_type(&ty.text, scope)?;
                            count += 1;
                        }
                        _ => return Err(CompileError::BadParameter { span: t.span }),
                    }
                }
                count
            }
            [t] if t.kind == TokenKind::Ident => {
                self.resolve_type(&t.text, scope)?;
                1
            }
            _ => return Err(CompileError::BadParameter { span: toks[params_index].span }),
        };

        Ok(FuncSig { num_in, num_out })
    }

    fn resolve_type(&self, name: &str, scope: &Scope) -> CompileResult<Type> {
        match self.symbols.lookup(name, scope) {
            Some((sym, _)) if sym.kind == SymKind::Type => {
                sym.ty.ok_or_else(|| CompileError::UnknownType(SmolStr::new(name)))
            }
            _ => Err(CompileError::UnknownType(SmolStr::new(name))),
        }
    }

    /// Compiles an if / else-if / else chain in a single backward pass,
    /// so every destination label already exists when the jump that
    /// references it is emitted.
    fn compile_if(&mut self, toks: &[Token], ctx: &Ctx) -> CompileResult<Vec<Token>> {
        let counter_key = format!("{}/{}", ctx.scope.as_str(), ctx.fname);
        let count = self.label_count.entry(counter_key).or_insert(0);
        let prefix = format!("{}_if{}", ctx.fname, count);
        *count += 1;

        let mut branch = 0usize;
        let mut out: Vec<Token> = Vec::new();
        let mut i = toks.len() - 1;

        while i > 0 {
            if toks[i].kind != TokenKind::BraceBlock {
                return Err(CompileError::ExpectedBrace { span: toks[i].span });
            }
            let mut pre = self.compile_unit(toks[i].block(), ctx)?;
            if branch > 0 {
                pre.push(Token::pseudo(TokenKind::Goto, format!("{}_e0", prefix)));
            }
            pre.push(Token::pseudo(
                TokenKind::Label,
                format!("{}_e{}", prefix, branch),
            ));
            pre.extend(out);
            out = pre;

            i -= 1;
            if toks[i].kind == TokenKind::Else {
                // Final `else`: no condition to compile.
                i -= 1;
                branch += 1;
                continue;
            }

            let if_pos = toks[..i].rindex_of(TokenKind::If);
            let clause_start = if_pos.map_or(0, |p| p + 1);
            let clause = &toks[clause_start..=i];
            let (init, cond) = match clause.index_of(TokenKind::Semicolon) {
                None => (&[][..], clause),
                Some(sep) => (&clause[..sep], &clause[sep + 1..]),
            };

            let mut pre = Vec::new();
            if !init.is_empty() {
                pre.extend(self.compile_stmt(init, ctx)?);
            }
            pre.extend(self.compile_expr(cond, ctx)?);
            pre.push(Token::pseudo(
                TokenKind::JumpFalse,
                format!("{}_e{}", prefix, branch),
            ));
            pre.extend(out);
            out = pre;

            i = if_pos.unwrap_or(0);
            if i > 1 && toks[i].kind == TokenKind::If && toks[i - 1].kind == TokenKind::Else {
                // Step over `else if`.
                i -= 2;
            }
            branch += 1;
        }

        trace!("if chain {}: {}", prefix, out.display());
        Ok(out)
    }

    /// Compiles a return statement: the returned expression first, then
    /// the return token annotated with the enclosing function's output
    /// and input arity.
    fn compile_return(&mut self, toks: &[Token], ctx: &Ctx) -> CompileResult<Vec<Token>> {
        let sig = ctx
            .func
            .ok_or(CompileError::ReturnOutsideFunction { span: toks[0].span })?;

        let mut out = if toks.len() > 1 {
            self.compile_expr(&toks[1..], ctx)?
        } else {
            Vec::new()
        };

        let mut ret = toks[0].clone();
        ret.beg = sig.num_out as i64;
        ret.end = sig.num_in as i64;
        debug!("compile return in {}: {} out, {} in", ctx.fname, sig.num_out, sig.num_in);
        out.push(ret);
        Ok(out)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    Scan(ScanError),
    /// A statement is missing its terminator.
    MissingTerminator,
    MissingFunctionName { span: Span },
    NoFunctionBody { span: Span },
    MissingSignature,
    BadParameter { span: Span },
    UnknownType(SmolStr),
    /// An if chain branch was not a brace block.
    ExpectedBrace { span: Span },
    ReturnOutsideFunction { span: Span },
}

impl error::Error for CompileError {}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Scan(err) => fmt::Display::fmt(err, f),
            Self::MissingTerminator => write!(f, "malformed block: missing statement terminator"),
            Self::MissingFunctionName { span } => {
                write!(f, "missing function name at offset {}", span.index)
            }
            Self::NoFunctionBody { span } => {
                write!(f, "no function body at offset {}", span.index)
            }
            Self::MissingSignature => write!(f, "missing function signature"),
            Self::BadParameter { span } => {
                write!(f, "malformed parameter list at offset {}", span.index)
            }
            Self::UnknownType(name) => write!(f, "unknown type {}", name),
            Self::ExpectedBrace { span } => {
                write!(f, "expected '{{' block at offset {}", span.index)
            }
            Self::ReturnOutsideFunction { span } => {
                write!(f, "return outside of a function at offset {}", span.index)
            }
        }
    }
}

impl From<ScanError> for CompileError {
    fn from(err: ScanError) -> Self {
        CompileError::Scan(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use TokenKind as T;

    fn kinds(toks: &[Token]) -> Vec<TokenKind> {
        toks.iter().map(|t| t.kind).collect()
    }

    /// Labels must be defined exactly once, and every jump must
    /// reference a defined label.
    fn check_labels(toks: &[Token]) {
        let mut defined: Vec<&str> = Vec::new();
        for t in toks {
            if t.kind == T::Label {
                assert!(!defined.contains(&t.text.as_str()), "duplicate label {}", t.text);
                defined.push(&t.text);
            }
        }
        for t in toks {
            if matches!(t.kind, T::Goto | T::JumpFalse) {
                assert!(defined.contains(&t.text.as_str()), "undefined label {}", t.text);
            }
        }
    }

    #[test]
    fn test_function_emission_order() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile("func id(a int) int { return a }")
            .unwrap();

        assert_eq!(out[0].kind, T::Enter);
        assert_eq!(out[0].text, "id");
        assert_eq!(out[1].kind, T::Goto);
        assert_eq!(out[1].text, "id_end");
        assert_eq!(out[2].kind, T::Label);
        assert_eq!(out[2].text, "id");
        assert_eq!(out.last().unwrap().kind, T::Exit);
        assert_eq!(out[out.len() - 2].kind, T::Label);
        assert_eq!(out[out.len() - 2].text, "id_end");
    }

    #[test]
    fn test_function_records_signature() {
        let mut compiler = Compiler::new();
        compiler.compile("func max(a, b int) int { return a }").unwrap();

        let sym = compiler.symbols().get("max").unwrap();
        assert_eq!(sym.kind, SymKind::Func);
        assert_eq!(sym.sig(), Some(FuncSig { num_in: 2, num_out: 1 }));

        // grouped parameters share the trailing type and get
        // frame-relative addresses, first argument topmost
        let a = compiler.symbols().get("max/a").unwrap();
        let b = compiler.symbols().get("max/b").unwrap();
        assert!(a.local && b.local);
        assert_eq!(a.index, -2);
        assert_eq!(b.index, -3);
        assert_eq!(a.ty, Some(Type::Int));
    }

    #[test]
    fn test_return_annotated_with_arity() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile("func max(a, b int) int { return a }")
            .unwrap();

        let ret = out.iter().find(|t| t.kind == T::Return).unwrap();
        assert_eq!(ret.beg, 1); // outputs
        assert_eq!(ret.end, 2); // inputs
    }

    #[test]
    fn test_return_outside_function() {
        let mut compiler = Compiler::new();
        let err = compiler.compile("return 1").unwrap_err();
        assert!(matches!(err, CompileError::ReturnOutsideFunction { .. }));
    }

    #[test]
    fn test_missing_function_body() {
        let mut compiler = Compiler::new();
        let err = compiler.compile("func broken(a int) int").unwrap_err();
        assert!(matches!(err, CompileError::NoFunctionBody { .. }));
    }

    #[test]
    fn test_if_single_branch() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile("func f(a int) int { if a < 1 { return a }; return 0 }")
            .unwrap();
        check_labels(&out);

        // cond .. JumpFalse e0 .. body .. Label e0
        let jf = out.iter().find(|t| t.kind == T::JumpFalse).unwrap();
        assert_eq!(jf.text, "f_if0_e0");
        let labels: Vec<_> = out.iter().filter(|t| t.kind == T::Label).collect();
        assert!(labels.iter().any(|t| t.text == "f_if0_e0"));
    }

    #[test]
    fn test_if_else_chain() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile("func f(a int) int { if a < 1 { return 1 } else { return 2 } }")
            .unwrap();
        check_labels(&out);

        // the if body jumps over the else body to the shared end label
        let goto = out.iter().find(|t| t.kind == T::Goto && t.text != "f_end").unwrap();
        assert_eq!(goto.text, "f_if0_e0");
        let jf = out.iter().find(|t| t.kind == T::JumpFalse).unwrap();
        assert_eq!(jf.text, "f_if0_e1");
    }

    #[test]
    fn test_if_else_if_else_chain() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile(
                "func f(a int) int { if a < 1 { return 1 } else if a < 2 { return 2 } else { return 3 } }",
            )
            .unwrap();
        check_labels(&out);

        let jumps: Vec<_> = out
            .iter()
            .filter(|t| t.kind == T::JumpFalse)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(jumps, vec!["f_if0_e2", "f_if0_e1"]);

        // both non-final branches exit through the shared end label
        let gotos = out
            .iter()
            .filter(|t| t.kind == T::Goto && t.text == "f_if0_e0")
            .count();
        assert_eq!(gotos, 2);
    }

    #[test]
    fn test_if_counter_is_per_function() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile("func f(a int) int { if a < 1 { return 1 }; if a < 2 { return 2 }; return 3 }")
            .unwrap();
        check_labels(&out);

        let labels: Vec<_> = out
            .iter()
            .filter(|t| t.kind == T::Label)
            .map(|t| t.text.as_str())
            .collect();
        assert!(labels.contains(&"f_if0_e0"));
        assert!(labels.contains(&"f_if1_e0"));
    }

    #[test]
    fn test_if_with_initializer() {
        let mut compiler = Compiler::new();
        // the terminator search must not stop inside the initializer
        let out = compiler
            .compile("func f(a, b int) int { if b = a; a < 1 { return 1 }; return 0 }")
            .unwrap();
        check_labels(&out);
        assert!(out.iter().any(|t| t.kind == T::Assign));
    }

    #[test]
    fn test_missing_terminator() {
        let mut compiler = Compiler::new();
        // an if statement whose block never closes the statement
        let err = compiler.compile_unit("if a < 1", &Ctx::default()).unwrap_err();
        // scanning appends a terminator, so the failure surfaces as the
        // chain check on the trailing token
        assert!(matches!(
            err,
            CompileError::ExpectedBrace { .. } | CompileError::MissingTerminator
        ));
    }

    #[test]
    fn test_nested_function_scopes() {
        let mut compiler = Compiler::new();
        let out = compiler
            .compile("func outer() int { func inner() int { return 1 }; return inner() }")
            .unwrap();
        check_labels(&out);

        assert!(compiler.symbols().get("outer").is_some());
        assert!(compiler.symbols().get("outer/inner").is_some());

        let enters: Vec<_> = out
            .iter()
            .filter(|t| t.kind == T::Enter)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(enters, vec!["outer", "outer/inner"]);
    }

    #[test]
    fn test_statement_dispatch_falls_through_to_expr() {
        let mut compiler = Compiler::new();
        let out = compiler.compile("1 + 2").unwrap();
        assert_eq!(kinds(&out), vec![T::Int, T::Int, T::Add]);
    }
}
