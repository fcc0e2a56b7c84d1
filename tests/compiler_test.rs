use std::path::PathBuf;

use incc::compiler::Compiler;
use incc::diagnostics::Location;

fn loc() -> Location {
    Location {
        file: PathBuf::from("t.inc"),
        line: 1,
        col: 1,
    }
}

#[test]
fn new_compiler_emits_start_thunk() {
    let compiler = Compiler::new();
    // call main (5) + push eax (1) + call [exit] (6) + jmp rel32 (5)
    assert_eq!(compiler.text.bytes.len(), 5 + 1 + 6 + 5);
    assert_eq!(compiler.text.bytes[0], 0xE8);
}

#[test]
fn define_after_forward_reference_reuses_address() {
    let mut compiler = Compiler::new();
    let forward = compiler.resolve_call_target("rec");
    let defined = compiler.define_function_here("rec", loc());
    assert_eq!(forward, defined);
    assert!(compiler.symbols.is_defined("rec"));
}

#[test]
fn string_interning_goes_through_symbol_table() {
    let mut compiler = Compiler::new();
    let a = compiler.intern_string("hi");
    let b = compiler.intern_string("hi");
    assert_eq!(a, b);
    assert_eq!(compiler.data.bytes, b"hi\0");
}

#[test]
fn import_thunk_is_the_user_symbol() {
    let mut compiler = Compiler::new();
    let thunk = compiler.define_import_thunk("msvcrt.dll", "printf", loc());
    let looked_up = compiler.resolve_call_target("printf");
    assert_eq!(thunk, looked_up);
    assert!(compiler.symbols.get("printf").unwrap().is_import);
}
