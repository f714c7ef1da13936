// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lexer for the patch text format.
//!
//! Identifiers are `[A-Za-z_][A-Za-z0-9_-]*` — a dash may appear inside an
//! identifier but never start one. A `-` at token start immediately
//! followed by a digit (or `.digit`) lexes as a signed numeric literal;
//! `- 1` with intervening space is an error. `null`, `true`, and `false`
//! are dedicated tokens. Comments run `#` or `//` to end of line.

use thiserror::Error;

/// One lexed token with its source position.
#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    /// Token kind and payload.
    pub kind: TokenKind,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub col: u32,
}

/// Token kinds.
#[derive(Clone, PartialEq, Debug)]
pub enum TokenKind {
    /// Identifier (may contain interior dashes).
    Ident(String),
    /// Quoted string, unescaped.
    Str(String),
    /// Integer literal (no decimal point).
    Int(i64),
    /// Float literal.
    Float(f64),
    /// `null` literal.
    Null,
    /// `true` literal.
    True,
    /// `false` literal.
    False,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `=`
    Eq,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Short description for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(s) => format!("identifier `{s}`"),
            Self::Str(_) => "string".to_owned(),
            Self::Int(_) | Self::Float(_) => "number".to_owned(),
            Self::Null => "`null`".to_owned(),
            Self::True | Self::False => "boolean".to_owned(),
            Self::LBrace => "`{`".to_owned(),
            Self::RBrace => "`}`".to_owned(),
            Self::LBracket => "`[`".to_owned(),
            Self::RBracket => "`]`".to_owned(),
            Self::Eq => "`=`".to_owned(),
            Self::Comma => "`,`".to_owned(),
            Self::Dot => "`.`".to_owned(),
            Self::Eof => "end of input".to_owned(),
        }
    }
}

/// Lexing failures, with position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    /// A character no token starts with.
    #[error("unexpected character `{ch}` at {line}:{col}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// 1-based line.
        line: u32,
        /// 1-based column.
        col: u32,
    },
    /// `-` not immediately followed by a digit.
    #[error("stray `-` at {line}:{col}: a sign must be adjacent to its number")]
    StrayDash {
        /// 1-based line.
        line: u32,
        /// 1-based column.
        col: u32,
    },
    /// String literal never closed.
    #[error("unterminated string starting at {line}:{col}")]
    UnterminatedString {
        /// 1-based line.
        line: u32,
        /// 1-based column.
        col: u32,
    },
    /// Numeric literal that does not parse.
    #[error("malformed number at {line}:{col}")]
    MalformedNumber {
        /// 1-based line.
        line: u32,
        /// 1-based column.
        col: u32,
    },
}

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// Lexes the whole input. Errors end the scan; the parser reports them and
/// the caller decides what survives.
pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    let mut cur = Cursor {
        src: src.as_bytes(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();
    loop {
        // Skip whitespace and comments.
        loop {
            match cur.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    cur.bump();
                }
                Some(b'#') => {
                    while matches!(cur.peek(), Some(b) if b != b'\n') {
                        cur.bump();
                    }
                }
                Some(b'/') if cur.peek_at(1) == Some(b'/') => {
                    while matches!(cur.peek(), Some(b) if b != b'\n') {
                        cur.bump();
                    }
                }
                _ => break,
            }
        }
        let (line, col) = (cur.line, cur.col);
        let Some(b) = cur.peek() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                line,
                col,
            });
            return Ok(tokens);
        };
        let kind = match b {
            b'{' => {
                cur.bump();
                TokenKind::LBrace
            }
            b'}' => {
                cur.bump();
                TokenKind::RBrace
            }
            b'[' => {
                cur.bump();
                TokenKind::LBracket
            }
            b']' => {
                cur.bump();
                TokenKind::RBracket
            }
            b'=' => {
                cur.bump();
                TokenKind::Eq
            }
            b',' => {
                cur.bump();
                TokenKind::Comma
            }
            b'.' if !matches!(cur.peek_at(1), Some(d) if d.is_ascii_digit()) => {
                cur.bump();
                TokenKind::Dot
            }
            b'"' => {
                cur.bump();
                let mut out = String::new();
                loop {
                    match cur.bump() {
                        None | Some(b'\n') => {
                            return Err(LexError::UnterminatedString { line, col });
                        }
                        Some(b'"') => break,
                        Some(b'\\') => match cur.bump() {
                            Some(b'"') => out.push('"'),
                            Some(b'\\') => out.push('\\'),
                            Some(b'n') => out.push('\n'),
                            Some(b't') => out.push('\t'),
                            _ => return Err(LexError::UnterminatedString { line, col }),
                        },
                        Some(byte) => out.push(byte as char),
                    }
                }
                TokenKind::Str(out)
            }
            b'-' => {
                // Lookahead: `-` is a sign only with an adjacent digit (or
                // `.digit`); never post-processed.
                let adjacent_digit = matches!(cur.peek_at(1), Some(d) if d.is_ascii_digit())
                    || (cur.peek_at(1) == Some(b'.')
                        && matches!(cur.peek_at(2), Some(d) if d.is_ascii_digit()));
                if !adjacent_digit {
                    return Err(LexError::StrayDash { line, col });
                }
                cur.bump();
                lex_number(&mut cur, true, line, col)?
            }
            d if d.is_ascii_digit() || d == b'.' => lex_number(&mut cur, false, line, col)?,
            s if is_ident_start(s) => {
                let start = cur.pos;
                while matches!(cur.peek(), Some(c) if is_ident_continue(c)) {
                    cur.bump();
                }
                let word = core::str::from_utf8(&cur.src[start..cur.pos]).unwrap_or_default();
                match word {
                    "null" => TokenKind::Null,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    _ => TokenKind::Ident(word.to_owned()),
                }
            }
            other => {
                return Err(LexError::UnexpectedChar {
                    ch: other as char,
                    line,
                    col,
                });
            }
        };
        tokens.push(Token { kind, line, col });
    }
}

fn lex_number(
    cur: &mut Cursor<'_>,
    negative: bool,
    line: u32,
    col: u32,
) -> Result<TokenKind, LexError> {
    let start = cur.pos;
    let mut saw_dot = false;
    let mut saw_exp = false;
    while let Some(b) = cur.peek() {
        match b {
            b'0'..=b'9' => {
                cur.bump();
            }
            b'.' if !saw_dot && !saw_exp => {
                saw_dot = true;
                cur.bump();
            }
            b'e' | b'E' if !saw_exp => {
                saw_exp = true;
                cur.bump();
                if matches!(cur.peek(), Some(b'+' | b'-')) {
                    cur.bump();
                }
            }
            _ => break,
        }
    }
    let text = core::str::from_utf8(&cur.src[start..cur.pos]).unwrap_or_default();
    if !saw_dot && !saw_exp {
        let value: i64 = text
            .parse()
            .map_err(|_| LexError::MalformedNumber { line, col })?;
        return Ok(TokenKind::Int(if negative { -value } else { value }));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| LexError::MalformedNumber { line, col })?;
    Ok(TokenKind::Float(if negative { -value } else { value }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn negative_numbers_require_adjacency() {
        assert_eq!(kinds("-1")[0], TokenKind::Int(-1));
        assert_eq!(kinds("-.5")[0], TokenKind::Float(-0.5));
        assert!(matches!(lex("- 1"), Err(LexError::StrayDash { .. })));
    }

    #[test]
    fn dash_inside_identifier_is_fine() {
        assert_eq!(
            kinds("foo-bar")[0],
            TokenKind::Ident("foo-bar".to_owned())
        );
    }

    #[test]
    fn null_is_a_dedicated_token() {
        assert_eq!(kinds("null")[0], TokenKind::Null);
        assert_eq!(kinds("nullx")[0], TokenKind::Ident("nullx".to_owned()));
    }

    #[test]
    fn integers_and_floats_are_distinct() {
        assert_eq!(kinds("2")[0], TokenKind::Int(2));
        assert_eq!(kinds("2.0")[0], TokenKind::Float(2.0));
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds("# a comment\nfoo // tail\nbar");
        assert_eq!(toks[0], TokenKind::Ident("foo".to_owned()));
        assert_eq!(toks[1], TokenKind::Ident("bar".to_owned()));
    }

    #[test]
    fn string_escapes_round() {
        assert_eq!(
            kinds(r#""a\"b\\c""#)[0],
            TokenKind::Str(r#"a"b\c"#.to_owned())
        );
    }
}
