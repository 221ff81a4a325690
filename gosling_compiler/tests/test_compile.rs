use gosling_compiler::{
    asm::Assembler,
    compile::Compiler,
    scan::scan,
    tokens::TokenKind,
};
use gosling_vm::{Machine, Op, Value};

const SOURCE: &str = include_str!("max.gos");

#[test]
fn test_scan_source() {
    let toks = scan(SOURCE, true).unwrap();
    assert_eq!(toks[0].kind, TokenKind::Func);
    assert_eq!(toks.last().unwrap().kind, TokenKind::Semicolon);
}

#[test]
fn test_compile_source() {
    let mut compiler = Compiler::new();
    let toks = compiler.compile(SOURCE).unwrap();
    assert!(toks.iter().any(|t| t.kind == TokenKind::Label && t.text == "max"));
    assert!(toks.iter().any(|t| t.kind == TokenKind::Return));
}

#[test]
fn test_compile_and_run_source() {
    let mut compiler = Compiler::new();
    let mut asm = Assembler::new();
    let mut machine = Machine::new();

    for unit in [SOURCE, "max(3, 7)"] {
        let toks = compiler.compile(unit).unwrap();
        let code = asm.assemble(&toks, compiler.symbols(), machine.code_len()).unwrap();
        let entry = machine.push_code(code);
        machine.set_ip(entry);
        machine.run().unwrap();
    }

    assert_eq!(machine.stack(), &[Value::Int(7)]);
}

#[test]
fn test_assembled_code_is_pure_instructions() {
    let mut compiler = Compiler::new();
    let toks = compiler.compile(SOURCE).unwrap();
    let code = Assembler::new().assemble(&toks, compiler.symbols(), 0).unwrap();
    // labels are fully resolved; no placeholder deltas remain
    for op in &code {
        if let Op::Jump(delta) = op {
            assert_ne!(*delta, 0);
        }
    }
}
