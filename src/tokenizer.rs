// Flat, non-indentation-sensitive lexer for the source language.
//
// Words, decimal integers, double-quoted strings and single-character
// "other" tokens. Never fails: an unrecognized character simply becomes
// a one-character Other token.

#[derive(Debug, Clone, PartialEq)]
pub enum TokenData {
    Word(String),
    Num(i64),
    Str(String),
    Other(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub data: TokenData,
    pub line: usize,
    pub col: usize,
}

fn is_word_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_word_cont(c: char) -> bool {
    c == '\'' || is_word_start(c) || c.is_ascii_digit()
}

fn unescape(c: char) -> char {
    match c {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'n' => '\n',
        'f' => '\u{0C}',
        't' => '\t',
        'v' => '\u{0B}',
        '0' => '\0',
        other => other,
    }
}

// Tokenizes a whole source file's contents. line/col are 1-based,
// matching the <file>[<line>:<col>] diagnostic format.
pub fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1usize;
    let mut col = 1usize;

    let mut advance = |i: &mut usize, line: &mut usize, col: &mut usize| {
        if chars[*i] == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
        *i += 1;
    };

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut col);
            continue;
        }

        let start_line = line;
        let start_col = col;

        if is_word_start(c) {
            let mut word = String::new();
            while i < chars.len() && is_word_cont(chars[i]) {
                word.push(chars[i]);
                advance(&mut i, &mut line, &mut col);
            }
            tokens.push(Token {
                data: TokenData::Word(word),
                line: start_line,
                col: start_col,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let mut num = String::new();
            while i < chars.len() && chars[i].is_ascii_digit() {
                num.push(chars[i]);
                advance(&mut i, &mut line, &mut col);
            }
            let value: i64 = num.parse().unwrap_or(0);
            tokens.push(Token {
                data: TokenData::Num(value),
                line: start_line,
                col: start_col,
            });
            continue;
        }

        if c == '"' {
            advance(&mut i, &mut line, &mut col);
            let mut content = String::new();
            while i < chars.len() && chars[i] != '"' {
                if chars[i] == '\\' {
                    advance(&mut i, &mut line, &mut col);
                    if i < chars.len() {
                        content.push(unescape(chars[i]));
                        advance(&mut i, &mut line, &mut col);
                    }
                } else {
                    content.push(chars[i]);
                    advance(&mut i, &mut line, &mut col);
                }
            }
            if i < chars.len() {
                advance(&mut i, &mut line, &mut col); // closing quote
            }
            tokens.push(Token {
                data: TokenData::Str(content),
                line: start_line,
                col: start_col,
            });
            continue;
        }

        // Single non-alphanumeric character token.
        advance(&mut i, &mut line, &mut col);
        tokens.push(Token {
            data: TokenData::Other(c),
            line: start_line,
            col: start_col,
        });
    }

    tokens
}
