// The emit-driven parser: a hand-written recursive descent parser over
// the flat token stream that never builds a tree. Each grammar
// production calls straight into Compiler/Encoder as it recognizes a
// construct; there is no AST, no desugaring, no typechecking, no
// separate codegen pass.

use std::path::Path;

use crate::assembler::{Imm, Reg};
use crate::compiler::Compiler;
use crate::diagnostics::{CompileError, Location};
use crate::tokenizer::{Token, TokenData};

// Parse-time-only record of a function's ordered parameter names.
// Dropped at `end function`.
struct FunctionFrame {
    params: Vec<String>,
}

impl FunctionFrame {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p == name)
    }
}

enum Arg {
    Ident(String),
    Num(i64),
    Str(String),
}

struct Cursor<'a> {
    file: &'a Path,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(file: &'a Path, tokens: &'a [Token]) -> Self {
        Cursor { file, tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_word(&self) -> Option<&str> {
        match self.peek().map(|t| &t.data) {
            Some(TokenData::Word(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    fn peek_other(&self, ch: char) -> bool {
        matches!(self.peek().map(|t| &t.data), Some(TokenData::Other(c)) if *c == ch)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    // Location of the token about to be consumed, or just past the
    // last token in the file if the stream is exhausted (for
    // "unexpected end of file" diagnostics).
    fn loc(&self) -> Location {
        match self.peek() {
            Some(t) => Location {
                file: self.file.to_path_buf(),
                line: t.line,
                col: t.col,
            },
            None => match self.tokens.last() {
                Some(t) => Location {
                    file: self.file.to_path_buf(),
                    line: t.line,
                    col: t.col + 1,
                },
                None => Location {
                    file: self.file.to_path_buf(),
                    line: 1,
                    col: 1,
                },
            },
        }
    }

    fn error(&self, context: &str, detail: impl Into<String>) -> CompileError {
        CompileError::Parse {
            location: self.loc(),
            context: context.to_string(),
            detail: detail.into(),
        }
    }

    fn expect_word(&mut self, word: &str, context: &str) -> Result<(), CompileError> {
        match self.peek_word() {
            Some(w) if w == word => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(context, format!("expected `{word}`"))),
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, CompileError> {
        match self.peek().map(|t| t.data.clone()) {
            Some(TokenData::Word(w)) => {
                self.bump();
                Ok(w)
            }
            _ => Err(self.error(context, "expected an identifier")),
        }
    }

    fn expect_other(&mut self, ch: char, context: &str) -> Result<(), CompileError> {
        if self.peek_other(ch) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(context, format!("expected `{ch}`")))
        }
    }

    fn expect_num(&mut self, context: &str) -> Result<i64, CompileError> {
        match self.peek().map(|t| t.data.clone()) {
            Some(TokenData::Num(n)) => {
                self.bump();
                Ok(n)
            }
            _ => Err(self.error(context, "expected an integer literal")),
        }
    }

    fn expect_str(&mut self, context: &str) -> Result<String, CompileError> {
        match self.peek().map(|t| t.data.clone()) {
            Some(TokenData::Str(s)) => {
                self.bump();
                Ok(s)
            }
            _ => Err(self.error(context, "expected a string literal")),
        }
    }
}

// Parses one already-tokenized source file directly into `compiler`.
// Multiple files can be parsed into the same Compiler in sequence so
// every symbol shares one namespace.
pub fn parse(tokens: &[Token], file: &Path, compiler: &mut Compiler) -> Result<(), CompileError> {
    let mut cursor = Cursor::new(file, tokens);
    while cursor.peek().is_some() {
        parse_topdecl(&mut cursor, compiler, None)?;
    }
    Ok(())
}

fn parse_topdecl(
    cursor: &mut Cursor,
    compiler: &mut Compiler,
    class_prefix: Option<&str>,
) -> Result<(), CompileError> {
    match cursor.peek_word() {
        Some("function") => parse_function(cursor, compiler, class_prefix),
        Some("class") if class_prefix.is_none() => parse_class(cursor, compiler),
        Some("import") if class_prefix.is_none() => parse_import(cursor, compiler),
        _ => Err(cursor.error("top-level declaration", "expected function, class or import")),
    }
}

fn parse_class(cursor: &mut Cursor, compiler: &mut Compiler) -> Result<(), CompileError> {
    cursor.expect_word("class", "class")?;
    let name = cursor.expect_ident("class name")?;
    while cursor.peek_word() == Some("function") {
        parse_function(cursor, compiler, Some(&name))?;
    }
    cursor.expect_word("end", "class")?;
    cursor.expect_word("class", "class")?;
    Ok(())
}

fn parse_import(cursor: &mut Cursor, compiler: &mut Compiler) -> Result<(), CompileError> {
    cursor.expect_word("import", "import")?;
    let at = cursor.loc();
    let dll = cursor.expect_str("import")?;
    cursor.expect_word("cdecl", "import")?;
    let name = cursor.expect_ident("import")?;
    compiler.define_import_thunk(&dll, &name, at);
    Ok(())
}

fn parse_function(
    cursor: &mut Cursor,
    compiler: &mut Compiler,
    class_prefix: Option<&str>,
) -> Result<(), CompileError> {
    cursor.expect_word("function", "function")?;
    let at = cursor.loc();
    let raw_name = cursor.expect_ident("function name")?;
    let name = match class_prefix {
        Some(class) => format!("{class}'{raw_name}"),
        None => raw_name,
    };

    cursor.expect_other('(', "function parameters")?;
    let mut params = Vec::new();
    if !cursor.peek_other(')') {
        params.push(cursor.expect_ident("function parameter")?);
        while cursor.peek_other(',') {
            cursor.bump();
            params.push(cursor.expect_ident("function parameter")?);
        }
    }
    cursor.expect_other(')', "function parameters")?;

    compiler.define_function_here(&name, at);
    {
        let mut enc = compiler.encoder();
        enc.push_reg(Reg::Ebp);
        enc.mov_reg_reg(Reg::Ebp, Reg::Esp);
    }

    let frame = FunctionFrame { params };
    let mut last_was_return = false;
    while cursor.peek_word() != Some("end") {
        if cursor.peek().is_none() {
            return Err(cursor.error("function body", "unexpected end of file"));
        }
        last_was_return = parse_stmt(cursor, compiler, &frame)?;
    }
    cursor.expect_word("end", "function")?;
    cursor.expect_word("function", "function")?;

    if !last_was_return {
        let mut enc = compiler.encoder();
        enc.leave();
        enc.ret();
    }
    Ok(())
}

// Parses one statement, returning whether it was a return (so the
// caller knows whether an implicit epilogue is still needed).
fn parse_stmt(
    cursor: &mut Cursor,
    compiler: &mut Compiler,
    frame: &FunctionFrame,
) -> Result<bool, CompileError> {
    if cursor.peek_word() == Some("return") {
        cursor.bump();
        let value = cursor.expect_num("return")?;
        let mut enc = compiler.encoder();
        enc.mov_reg_imm32(Reg::Eax, Imm::Literal(value as u32));
        enc.leave();
        enc.ret();
        Ok(true)
    } else {
        parse_call(cursor, compiler, frame)?;
        Ok(false)
    }
}

fn parse_call(
    cursor: &mut Cursor,
    compiler: &mut Compiler,
    frame: &FunctionFrame,
) -> Result<(), CompileError> {
    let callee_loc = cursor.loc();
    let name = cursor.expect_ident("function call")?;
    cursor.expect_other('(', "function call arguments")?;

    let mut args = Vec::new();
    if !cursor.peek_other(')') {
        args.push(parse_arg(cursor)?);
        while cursor.peek_other(',') {
            cursor.bump();
            args.push(parse_arg(cursor)?);
        }
    }
    cursor.expect_other(')', "function call arguments")?;

    // Evaluated left to right syntactically, pushed right to left (cdecl).
    for arg in args.iter().rev() {
        match arg {
            Arg::Ident(ident) => match frame.index_of(ident) {
                Some(index) => compiler.push_argument_by_index(index),
                None => {
                    return Err(CompileError::Parse {
                        location: callee_loc.clone(),
                        context: "function call argument".to_string(),
                        detail: format!("undefined variable: {ident}"),
                    })
                }
            },
            Arg::Num(n) => compiler.encoder().push_imm32(Imm::Literal(*n as u32)),
            Arg::Str(s) => {
                let addr = compiler.intern_string(s);
                compiler.encoder().push_imm32(Imm::Address(addr));
            }
        }
    }

    let target = compiler.resolve_call_target(&name);
    compiler.encoder().call_rel32(target);

    if !args.is_empty() {
        let cleanup = (args.len() as u32) * 4;
        compiler
            .encoder()
            .add_reg_imm32(Reg::Esp, Imm::Literal(cleanup));
    }
    Ok(())
}

fn parse_arg(cursor: &mut Cursor) -> Result<Arg, CompileError> {
    match cursor.peek().map(|t| t.data.clone()) {
        Some(TokenData::Word(w)) => {
            cursor.bump();
            Ok(Arg::Ident(w))
        }
        Some(TokenData::Num(n)) => {
            cursor.bump();
            Ok(Arg::Num(n))
        }
        Some(TokenData::Str(s)) => {
            cursor.bump();
            Ok(Arg::Str(s))
        }
        _ => Err(cursor.error(
            "function call argument",
            "expected an identifier, number or string",
        )),
    }
}
