// Error types and the stderr diagnostic format: a simple error vs. a
// located variant, as a thiserror enum, printing in the
// <file>[<line>:<col>] form.

use std::fmt;
use std::path::PathBuf;

// A position inside one of the compiler's input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}:{}]", self.file.display(), self.line, self.col)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    // A malformed construct at a specific source position.
    #[error("{location} {context}: {detail}")]
    Parse {
        location: Location,
        context: String,
        detail: String,
    },

    // One or more user symbols were referenced but never defined.
    #[error("undefined symbols")]
    UndefinedSymbols { names: Vec<String> },

    // Reading a source file or writing the output image failed.
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// Writes diagnostics to `w`, returning the process exit code the caller
// should use.
pub fn report(error: &CompileError, mut w: impl std::io::Write) -> i32 {
    match error {
        CompileError::Parse {
            location,
            context,
            detail,
        } => {
            let _ = writeln!(w, "{location} {context}: {detail}");
        }
        CompileError::UndefinedSymbols { names } => {
            for name in names {
                let _ = writeln!(w, "undefined: {name}");
            }
        }
        CompileError::Io { path, source } => {
            let _ = writeln!(w, "{}: {source}", path.display());
        }
    }
    1
}
