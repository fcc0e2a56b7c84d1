// A produced PE image can't be executed on a non-Windows CI host, so
// these assert on the image's byte shape and on the CLI's exit code
// and stderr instead of on actual program output.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::Command;
use incc::pipeline::compile_files;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

struct ScratchFile(PathBuf);

impl ScratchFile {
    fn new(contents: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("incc_integration_test_{n}.inc"));
        std::fs::write(&path, contents).unwrap();
        ScratchFile(path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn assert_valid_pe(image: &[u8]) {
    assert_eq!(&image[0..2], b"MZ");
    let e_lfanew = u32::from_le_bytes(image[0x3C..0x40].try_into().unwrap()) as usize;
    assert_eq!(&image[e_lfanew..e_lfanew + 4], b"PE\0\0");
    let number_of_sections = u16::from_le_bytes(image[e_lfanew + 6..e_lfanew + 8].try_into().unwrap());
    assert_eq!(number_of_sections, 3);
}

#[test]
fn hello_world() {
    let file = ScratchFile::new(
        "import \"msvcrt.dll\" cdecl printf\nfunction main() printf(\"hello\\n\") return 0 end function",
    );
    let image = compile_files(&[file.0.clone()]).unwrap();
    assert_valid_pe(&image);
}

#[test]
fn loop_equivalent_via_recursion() {
    let file = ScratchFile::new(
        "import \"msvcrt.dll\" cdecl printf\n\
         function rec(n) printf(\"%d\\n\", n) return 0 end function\n\
         function main() rec(1) rec(2) rec(3) return 0 end function",
    );
    let image = compile_files(&[file.0.clone()]).unwrap();
    assert_valid_pe(&image);
}

#[test]
fn class_prefixed_function() {
    let file = ScratchFile::new(
        "class Foo function bar() return 7 end function end class\n\
         function main() Foo'bar() return 0 end function",
    );
    let image = compile_files(&[file.0.clone()]).unwrap();
    assert_valid_pe(&image);
}

#[test]
fn undefined_symbol_fails_the_cli_and_writes_nothing() {
    let file = ScratchFile::new("function main() nope() return 0 end function");
    let output_path = std::env::temp_dir().join("incc_undefined_symbol_test_output.exe");
    let _ = std::fs::remove_file(&output_path);

    let mut cmd = Command::cargo_bin("incc").unwrap();
    cmd.arg(&file.0).arg("-o").arg(&output_path);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("undefined: nope"));

    assert!(!output_path.exists());
}

#[test]
fn argument_order_pushes_right_to_left() {
    use incc::compiler::Compiler;
    use incc::parser::parse;
    use incc::tokenizer::tokenize;

    let mut compiler = Compiler::new();
    let source = "import \"msvcrt.dll\" cdecl printf\n\
         function main() printf(\"%d %d\\n\", 1, 2) return 0 end function";
    let tokens = tokenize(source);
    parse(&tokens, &PathBuf::from("t.inc"), &mut compiler).unwrap();

    // main's body, after the _start thunk (17 bytes) and its own
    // prologue (push ebp; mov ebp, esp -- 3 bytes): three `push imm32`
    // instructions (5 bytes each), pushed right-to-left, so the literal
    // `2` is pushed first and the format-string address last.
    let body = &compiler.text.bytes[17 + 3..];
    assert_eq!(body[0], 0x68);
    assert_eq!(u32::from_le_bytes(body[1..5].try_into().unwrap()), 2);
    assert_eq!(body[5], 0x68);
    assert_eq!(u32::from_le_bytes(body[6..10].try_into().unwrap()), 1);
    assert_eq!(body[10], 0x68); // push of the format string's address
}

#[test]
fn determinism_same_source_compiled_twice_is_byte_identical() {
    let a = ScratchFile::new("function main() helper() return 0 end function");
    let b = ScratchFile::new("function helper() return 1 end function");

    let first = compile_files(&[a.0.clone(), b.0.clone()]).unwrap();
    let second = compile_files(&[a.0.clone(), b.0.clone()]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cli_writes_a_real_output_file_on_success() {
    let file = ScratchFile::new("function main() return 0 end function");
    let output_path = std::env::temp_dir().join("incc_success_test_output.exe");
    let _ = std::fs::remove_file(&output_path);

    let mut cmd = Command::cargo_bin("incc").unwrap();
    cmd.arg(&file.0).arg("-o").arg(&output_path);
    cmd.assert().success();

    let bytes = std::fs::read(&output_path).unwrap();
    assert_valid_pe(&bytes);
    let _ = std::fs::remove_file(&output_path);
}
