use std::{cell::RefCell, rc::Rc};

use gosling::prelude::*;

const MAX_FUNC: &str = "func max(a, b int) int { if a < b { return b }; return a }";

#[test]
fn test_max_end_to_end() {
    let mut interp = Interp::new();
    interp.eval(MAX_FUNC).unwrap();

    assert_eq!(interp.eval("max(3, 7)").unwrap(), Some(Value::Int(7)));
    assert_eq!(interp.eval("max(7, 3)").unwrap(), Some(Value::Int(7)));
    // ties go to the fallthrough branch, i.e. the first argument
    assert_eq!(interp.eval("max(5, 5)").unwrap(), Some(Value::Int(5)));
}

#[test]
fn test_whole_file_unit() {
    // a declaration and a call in a single unit
    let mut interp = Interp::new();
    let src = format!("{}; max(19, 23)", MAX_FUNC);
    assert_eq!(interp.eval(&src).unwrap(), Some(Value::Int(23)));
}

#[test]
fn test_frame_fully_unwound() {
    let mut interp = Interp::new();
    interp.eval(MAX_FUNC).unwrap();

    let before = interp.machine().stack().len();
    interp.eval("max(3, 7)").unwrap();
    // one result survives; arguments and frame bookkeeping are gone
    assert_eq!(interp.machine().stack().len(), before + 1);
}

#[test]
fn test_declaration_yields_no_value() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval(MAX_FUNC).unwrap(), None);
}

#[test]
fn test_arithmetic_expression() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("40 + 2").unwrap(), Some(Value::Int(42)));
    assert_eq!(interp.eval("40 - 2").unwrap(), Some(Value::Int(38)));
    assert_eq!(interp.eval("1 < 2").unwrap(), Some(Value::Bool(true)));
}

#[test]
fn test_else_if_chain_end_to_end() {
    let mut interp = Interp::new();
    interp
        .eval(
            "func sign(a int) int { \
                 if a < 0 { return 0 - 1 } else if 0 < a { return 1 } else { return 0 } \
             }",
        )
        .unwrap();

    assert_eq!(interp.eval("sign(0 - 9)").unwrap(), Some(Value::Int(-1)));
    assert_eq!(interp.eval("sign(9)").unwrap(), Some(Value::Int(1)));
    assert_eq!(interp.eval("sign(0)").unwrap(), Some(Value::Int(0)));
}

/// A host callable reached through the dynamic call path must agree
/// with an equivalent compiled function.
#[test]
fn test_host_call_matches_compiled_call() {
    let mut interp = Interp::new();
    interp.register(
        "sum",
        NativeFn::new("sum", |args| match args {
            [Value::Int(a), Value::Int(b)] => vec![Value::Int(a + b)],
            _ => vec![Value::Nil],
        }),
    );
    interp.eval("func add(a, b int) int { return a + b }").unwrap();

    let host = interp.eval("sum(19, 23)").unwrap();
    let compiled = interp.eval("add(19, 23)").unwrap();
    assert_eq!(host, compiled);
    assert_eq!(host, Some(Value::Int(42)));
}

#[test]
fn test_host_call_argument_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();

    let mut interp = Interp::new();
    interp.register(
        "record",
        NativeFn::new("record", move |args| {
            log.borrow_mut().extend(args.to_vec());
            vec![]
        }),
    );

    interp.eval("record(1, 2, 3)").unwrap();
    assert_eq!(
        *seen.borrow(),
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
}

#[test]
fn test_host_call_with_expression_argument() {
    let mut interp = Interp::new();
    interp.register(
        "double",
        NativeFn::new("double", |args| match args {
            [Value::Int(n)] => vec![Value::Int(n * 2)],
            _ => vec![Value::Nil],
        }),
    );

    assert_eq!(interp.eval("double(20 + 1)").unwrap(), Some(Value::Int(42)));
}

#[test]
fn test_compiled_function_calling_host() {
    let mut interp = Interp::new();
    interp.register(
        "double",
        NativeFn::new("double", |args| match args {
            [Value::Int(n)] => vec![Value::Int(n * 2)],
            _ => vec![Value::Nil],
        }),
    );
    interp
        .eval("func quad(a int) int { return double(double(a)) }")
        .unwrap();

    assert_eq!(interp.eval("quad(10)").unwrap(), Some(Value::Int(40)));
}

#[test]
fn test_compile_error_surfaces() {
    let mut interp = Interp::new();
    let err = interp.eval("return 1").unwrap_err();
    assert!(matches!(err, GoslingError::Compile(_)));
}

#[test]
fn test_unresolved_symbol_surfaces() {
    let mut interp = Interp::new();
    let err = interp.eval("missing + 1").unwrap_err();
    assert!(matches!(err, GoslingError::Asm(_)));
}
