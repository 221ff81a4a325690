//! The embedding layer tying the compiler pipeline to the machine.
use log::debug;

use gosling_compiler::{Assembler, Compiler, SymKind};
use gosling_vm::{Machine, NativeFn, Value};

use crate::error::GoslingResult;

/// An interpreter session.
///
/// Each `eval` call compiles one unit of source against the session's
/// symbol table and label arena, appends its code to the machine, and
/// runs it. Functions declared by an earlier unit stay callable from
/// later ones, so a session can be driven file-at-a-time or
/// line-at-a-time.
pub struct Interp {
    compiler: Compiler,
    asm: Assembler,
    machine: Machine,
}

impl Interp {
    pub fn new() -> Self {
        let mut interp = Interp {
            compiler: Compiler::new(),
            asm: Assembler::new(),
            machine: Machine::new(),
        };
        interp.install_builtins();
        interp
    }

    /// Materializes built-in host callables from the universe into
    /// machine memory; their universe entries carry no address.
    fn install_builtins(&mut self) {
        let builtin = self
            .compiler
            .symbols()
            .get("println")
            .and_then(|sym| sym.value.clone());
        if let Some(value) = builtin {
            self.register_value("println", value);
        }
    }

    /// Pre-registers a named host callable in the global namespace,
    /// callable from compiled code through the dynamic call path.
    pub fn register(&mut self, name: &str, func: NativeFn) {
        self.register_value(name, Value::Native(func));
    }

    fn register_value(&mut self, name: &str, value: Value) {
        let addr = self.machine.push(value.clone());
        debug!("register {} at address {}", name, addr);
        self.compiler
            .declare(addr as i64, name, SymKind::Value, Some(value), None);
    }

    /// Compiles, assembles and runs one unit of source text, reporting
    /// the value the unit left on top of the stack, if any.
    pub fn eval(&mut self, src: &str) -> GoslingResult<Option<Value>> {
        let toks = self.compiler.compile(src)?;
        let base = self.machine.code_len();
        let code = self.asm.assemble(&toks, self.compiler.symbols(), base)?;

        let depth = self.machine.stack().len();
        let entry = self.machine.push_code(code);
        self.machine.set_ip(entry);
        self.machine.run()?;

        if self.machine.stack().len() > depth {
            Ok(self.machine.stack().last().cloned())
        } else {
            Ok(None)
        }
    }

    /// The underlying machine, for stack inspection.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }
}

impl Default for Interp {
    fn default() -> Self {
        Interp::new()
    }
}
