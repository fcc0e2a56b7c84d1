use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use incc::diagnostics::CompileError;
use incc::pipeline::compile_files;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

// Writes `contents` to a scratch file under the system temp directory
// and returns a guard that deletes it on drop.
struct ScratchFile(PathBuf);

impl ScratchFile {
    fn new(contents: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!("incc_pipeline_test_{n}.inc"));
        std::fs::write(&path, contents).unwrap();
        ScratchFile(path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn compiles_a_single_hello_world_file() {
    let file = ScratchFile::new(
        "import \"msvcrt.dll\" cdecl printf\nfunction main() printf(\"hello\\n\") return 0 end function",
    );
    let image = compile_files(&[file.0.clone()]).unwrap();
    assert_eq!(&image[0..2], b"MZ");
}

#[test]
fn shares_one_namespace_across_files() {
    let a = ScratchFile::new("function main() helper() return 0 end function");
    let b = ScratchFile::new("function helper() return 1 end function");
    let image = compile_files(&[a.0.clone(), b.0.clone()]).unwrap();
    assert_eq!(&image[0..2], b"MZ");
}

#[test]
fn missing_file_reports_io_error() {
    let err =
        compile_files(&[PathBuf::from("/nonexistent/path/does_not_exist.inc")]).unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }));
}
