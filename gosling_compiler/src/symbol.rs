//! Symbol table and scope resolution.
use std::collections::HashMap;

use gosling_vm::{NativeFn, Value};

use crate::types::Type;

/// Sentinel address for symbols that occupy no runtime memory cell.
pub const UNSET_ADDR: i64 = -65535;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymKind {
    /// A value defined in the host runtime.
    Value,
    /// A type descriptor.
    Type,
    /// A label marking a position in the machine code.
    Label,
    /// A compile-time constant.
    Const,
    /// A variable located in machine memory.
    Var,
    /// A function located in machine code.
    Func,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymKind,
    /// Address in frame or global memory; [`UNSET_ADDR`] when the
    /// symbol is not a memory cell.
    pub index: i64,
    /// When set, `index` is relative to the local frame, otherwise it
    /// is a global address.
    pub local: bool,
    pub ty: Option<Type>,
    pub value: Option<Value>,
    pub used: bool,
}

impl Symbol {
    pub fn new(kind: SymKind) -> Self {
        Self {
            kind,
            index: UNSET_ADDR,
            local: false,
            ty: None,
            value: None,
            used: false,
        }
    }

    /// Signature of a function symbol.
    pub fn sig(&self) -> Option<crate::types::FuncSig> {
        match self.ty {
            Some(Type::Func(sig)) => Some(sig),
            _ => None,
        }
    }
}

/// Slash-joined path of enclosing declaration names, used as a symbol
/// lookup namespace prefix. Never starts with a slash; the empty path
/// is the global scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(String);

impl Scope {
    pub fn root() -> Self {
        Scope::default()
    }

    pub fn from_path(path: &str) -> Self {
        Scope(path.trim_start_matches('/').to_string())
    }

    pub fn push(&mut self, name: &str) {
        if !self.0.is_empty() {
            self.0.push('/');
        }
        self.0.push_str(name);
    }

    /// Removes the innermost segment; popping past the root leaves the
    /// empty scope.
    pub fn pop(&mut self) {
        match self.0.rfind('/') {
            Some(i) => self.0.truncate(i),
            None => self.0.clear(),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Fully qualified symbol key for a name declared in this scope.
    pub fn key(&self, name: &str) -> String {
        if self.0.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.0, name)
        }
    }
}

/// One mapping from qualified name to symbol, alive for the duration of
/// a compilation session.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// The fixed set of built-in bindings available before any user
    /// declaration.
    pub fn universe() -> Self {
        let mut table = SymbolTable::default();

        table.declare(UNSET_ADDR, "any", SymKind::Type, None, Some(Type::Any), false);
        table.declare(UNSET_ADDR, "bool", SymKind::Type, None, Some(Type::Bool), false);
        table.declare(UNSET_ADDR, "error", SymKind::Type, None, Some(Type::Error), false);
        table.declare(UNSET_ADDR, "int", SymKind::Type, None, Some(Type::Int), false);
        table.declare(UNSET_ADDR, "string", SymKind::Type, None, Some(Type::Str), false);

        table.declare(UNSET_ADDR, "nil", SymKind::Const, Some(Value::Nil), None, false);
        table.declare(UNSET_ADDR, "iota", SymKind::Const, None, None, false);
        table.declare(
            UNSET_ADDR,
            "true",
            SymKind::Const,
            Some(Value::Bool(true)),
            Some(Type::Bool),
            false,
        );
        table.declare(
            UNSET_ADDR,
            "false",
            SymKind::Const,
            Some(Value::Bool(false)),
            Some(Type::Bool),
            false,
        );

        table.declare(
            UNSET_ADDR,
            "println",
            SymKind::Value,
            Some(Value::Native(println_builtin())),
            None,
            false,
        );

        table
    }

    /// Inserts or overwrites a binding in the global namespace. A
    /// leading scope separator on the name is stripped first.
    pub fn declare(
        &mut self,
        addr: i64,
        name: &str,
        kind: SymKind,
        value: Option<Value>,
        ty: Option<Type>,
        local: bool,
    ) {
        let name = name.trim_start_matches('/');
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind,
                index: addr,
                local,
                ty,
                value,
                used: false,
            },
        );
    }

    /// Inserts a binding under an already-qualified key.
    pub fn insert(&mut self, key: String, symbol: Symbol) {
        self.symbols.insert(key, symbol);
    }

    pub fn get(&self, key: &str) -> Option<&Symbol> {
        self.symbols.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(key)
    }

    /// Searches for a symbol starting from the deepest scope, walking
    /// outward, ending with the bare global name. Returns the symbol
    /// together with the scope it resolved in.
    pub fn lookup(&self, name: &str, scope: &Scope) -> Option<(&Symbol, Scope)> {
        let mut prefix = scope.as_str();
        loop {
            let key = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            };
            if let Some(symbol) = self.symbols.get(&key) {
                return Some((symbol, Scope::from_path(prefix)));
            }
            if prefix.is_empty() {
                return None;
            }
            prefix = match prefix.rfind('/') {
                Some(i) => &prefix[..i],
                None => "",
            };
        }
    }

    /// Marks the binding a lookup would resolve as used.
    pub fn mark_used(&mut self, name: &str, scope: &Scope) {
        let key = match self.lookup(name, scope) {
            Some((_, resolved)) => resolved.key(name),
            None => return,
        };
        if let Some(symbol) = self.symbols.get_mut(&key) {
            symbol.used = true;
        }
    }
}

fn println_builtin() -> NativeFn {
    NativeFn::new("println", |args| {
        let line = args
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}", line);
        Vec::new()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scope_push_pop_roundtrip() {
        let mut scope = Scope::root();
        scope.push("f");
        scope.push("g");
        assert_eq!(scope.as_str(), "f/g");
        scope.pop();
        scope.pop();
        assert_eq!(scope, Scope::root());

        let mut scope = Scope::from_path("outer");
        scope.push("f");
        scope.push("g");
        scope.pop();
        scope.pop();
        assert_eq!(scope.as_str(), "outer");
    }

    #[test]
    fn test_scope_pop_past_root() {
        let mut scope = Scope::root();
        scope.pop();
        assert!(scope.is_root());
    }

    #[test]
    fn test_lookup_prefers_inner_scope() {
        let mut table = SymbolTable::default();
        table.declare(1, "x", SymKind::Var, None, None, false);
        table.insert("f/x".to_string(), Symbol { index: -2, local: true, ..Symbol::new(SymKind::Var) });

        let scope = Scope::from_path("f");
        let (sym, resolved) = table.lookup("x", &scope).unwrap();
        assert_eq!(sym.index, -2);
        assert_eq!(resolved.as_str(), "f");
    }

    #[test]
    fn test_lookup_falls_back_to_global() {
        let mut table = SymbolTable::default();
        table.declare(7, "g", SymKind::Var, None, None, false);

        let scope = Scope::from_path("f/inner");
        let (sym, resolved) = table.lookup("g", &scope).unwrap();
        assert_eq!(sym.index, 7);
        assert!(resolved.is_root());

        assert!(table.lookup("missing", &scope).is_none());
    }

    #[test]
    fn test_declare_strips_leading_slash() {
        let mut table = SymbolTable::default();
        table.declare(0, "/x", SymKind::Var, None, None, false);
        assert!(table.get("x").is_some());
    }

    #[test]
    fn test_universe_bindings() {
        let table = SymbolTable::universe();
        assert_eq!(table.get("int").unwrap().kind, SymKind::Type);
        assert_eq!(table.get("true").unwrap().value, Some(Value::Bool(true)));
        assert_eq!(table.get("println").unwrap().kind, SymKind::Value);
        assert_eq!(table.get("println").unwrap().index, UNSET_ADDR);
    }

    #[test]
    fn test_mark_used() {
        let mut table = SymbolTable::universe();
        table.mark_used("println", &Scope::root());
        assert!(table.get("println").unwrap().used);
    }
}
