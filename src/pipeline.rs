// Ties tokenizer, parser and PE builder together across however many
// input files the CLI was given. All symbols share one global namespace.

use std::path::PathBuf;

use log::{debug, trace};

use crate::compiler::Compiler;
use crate::diagnostics::CompileError;
use crate::exewriter;
use crate::parser;
use crate::tokenizer;

// Compiles every file in `paths`, in order, into one shared Compiler
// and returns the final linked image bytes. No output is produced if
// any file fails to parse or any symbol is left undefined.
pub fn compile_files(paths: &[PathBuf]) -> Result<Vec<u8>, CompileError> {
    let mut compiler = Compiler::new();

    for path in paths {
        let content =
            std::fs::read_to_string(path).map_err(|source| CompileError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("tokenizing {}", path.display());
        let tokens = tokenizer::tokenize(&content);
        trace!("{} tokens in {}", tokens.len(), path.display());

        debug!("parsing {}", path.display());
        parser::parse(&tokens, path, &mut compiler)?;
    }

    debug!("linking and assembling the image");
    exewriter::build_image(&mut compiler)
}
