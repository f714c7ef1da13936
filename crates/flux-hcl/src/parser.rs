// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recursive-descent parser with block-boundary resync.
//!
//! Errors never abort the parse: on a syntax failure inside a block, the
//! parser records the error and skips forward to the end of that block,
//! honouring brace/bracket depth, then continues with the next block. The
//! result is always a (possibly partial) AST plus the error list.

use thiserror::Error;

use crate::ast::{AstValue, BlockAst, CompositeAst, ExposeAst, InputAst, OutputAst, PatchAst};
use crate::lexer::{lex, LexError, Token, TokenKind};

/// One parse (or lex) failure with its position.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{line}:{col}: {message}")]
pub struct ParseError {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub col: u32,
    /// Human message.
    pub message: String,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        let (line, col) = match err {
            LexError::UnexpectedChar { line, col, .. }
            | LexError::StrayDash { line, col }
            | LexError::UnterminatedString { line, col }
            | LexError::MalformedNumber { line, col } => (line, col),
        };
        Self {
            line,
            col,
            message: err.to_string(),
        }
    }
}

/// Result of [`parse`]: the recovered AST and every error encountered.
#[derive(Debug)]
pub struct ParseOutcome {
    /// Recovered document (partial when errors are present).
    pub ast: PatchAst,
    /// Errors in source order.
    pub errors: Vec<ParseError>,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let t = self.peek().clone();
        self.errors.push(ParseError {
            line: t.line,
            col: t.col,
            message: message.into(),
        });
    }

    fn expect_str(&mut self, what: &str) -> Option<String> {
        match &self.peek().kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Some(s)
            }
            other => {
                let msg = format!("expected {what} string, found {}", other.describe());
                self.error_here(msg);
                None
            }
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> bool {
        if &self.peek().kind == kind {
            self.bump();
            true
        } else {
            let msg = format!("expected {what}, found {}", self.peek().kind.describe());
            self.error_here(msg);
            false
        }
    }

    /// Skips to the close of the current block, honouring nested brace and
    /// bracket depth. Assumes the opening brace was already consumed.
    fn resync_block(&mut self) {
        let mut brace_depth = 1i32;
        let mut bracket_depth = 0i32;
        while !self.at_eof() {
            match self.bump().kind {
                TokenKind::LBrace => brace_depth += 1,
                TokenKind::RBrace => {
                    if bracket_depth == 0 {
                        brace_depth -= 1;
                        if brace_depth == 0 {
                            return;
                        }
                    }
                }
                TokenKind::LBracket => bracket_depth += 1,
                TokenKind::RBracket => bracket_depth = (bracket_depth - 1).max(0),
                _ => {}
            }
        }
    }

    fn value(&mut self) -> Option<AstValue> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Int(v) => {
                self.bump();
                Some(AstValue::Int(v))
            }
            TokenKind::Float(v) => {
                self.bump();
                Some(AstValue::Float(v))
            }
            TokenKind::Str(ref s) => {
                let s = s.clone();
                self.bump();
                Some(AstValue::Str(s))
            }
            TokenKind::True => {
                self.bump();
                Some(AstValue::Bool(true))
            }
            TokenKind::False => {
                self.bump();
                Some(AstValue::Bool(false))
            }
            TokenKind::Null => {
                self.bump();
                Some(AstValue::Null)
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    if matches!(self.peek().kind, TokenKind::RBracket) {
                        self.bump();
                        break;
                    }
                    let item = self.value()?;
                    items.push(item);
                    if matches!(self.peek().kind, TokenKind::Comma) {
                        self.bump();
                    }
                }
                Some(AstValue::List(items))
            }
            ref other => {
                let msg = format!("expected value, found {}", other.describe());
                self.error_here(msg);
                None
            }
        }
    }

    /// Attribute key: a bare identifier, or a quoted string for keys with
    /// spaces or special characters.
    fn attr_key(&mut self) -> Option<String> {
        match &self.peek().kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.bump();
                Some(s)
            }
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Some(s)
            }
            _ => None,
        }
    }

    fn outputs_body(&mut self, outputs: &mut Vec<OutputAst>) -> bool {
        if !self.expect(&TokenKind::LBrace, "`{`") {
            return false;
        }
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    return true;
                }
                TokenKind::Eof => {
                    self.error_here("unterminated outputs block");
                    return false;
                }
                _ => {}
            }
            let Some(src_port) = self.attr_key() else {
                self.error_here("expected output port name");
                self.resync_block();
                return true;
            };
            if !self.expect(&TokenKind::Eq, "`=`") {
                self.resync_block();
                return true;
            }
            let Some(dst_block) = self.attr_key() else {
                self.error_here("expected target block name");
                self.resync_block();
                return true;
            };
            if !self.expect(&TokenKind::Dot, "`.`") {
                self.resync_block();
                return true;
            }
            let Some(dst_port) = self.attr_key() else {
                self.error_here("expected target port name");
                self.resync_block();
                return true;
            };
            outputs.push(OutputAst {
                src_port,
                dst_block,
                dst_port,
            });
        }
    }

    fn input_body(&mut self, port: String) -> Option<InputAst> {
        if !self.expect(&TokenKind::LBrace, "`{`") {
            return None;
        }
        let mut input = InputAst {
            port,
            combine: None,
            default: None,
        };
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    return Some(input);
                }
                TokenKind::Eof => {
                    self.error_here("unterminated input block");
                    return None;
                }
                _ => {}
            }
            let Some(key) = self.attr_key() else {
                self.error_here("expected attribute inside input block");
                self.resync_block();
                return Some(input);
            };
            if !self.expect(&TokenKind::Eq, "`=`") {
                self.resync_block();
                return Some(input);
            }
            let Some(value) = self.value() else {
                self.resync_block();
                return Some(input);
            };
            match (key.as_str(), value) {
                ("combine", AstValue::Str(mode)) => input.combine = Some(mode),
                ("combine", _) => self.error_here("combine expects a string"),
                ("default", v) => input.default = Some(v),
                (_, _) => self.error_here(format!("unknown input attribute `{key}`")),
            }
        }
    }

    fn block_body(&mut self, type_name: String, name: String) -> Option<BlockAst> {
        if !self.expect(&TokenKind::LBrace, "`{`") {
            return None;
        }
        let mut block = BlockAst {
            type_name,
            name,
            attrs: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    return Some(block);
                }
                TokenKind::Eof => {
                    self.error_here("unterminated block");
                    return None;
                }
                TokenKind::Ident(ref word) if word == "outputs" => {
                    self.bump();
                    if !self.outputs_body(&mut block.outputs) {
                        return Some(block);
                    }
                    continue;
                }
                TokenKind::Ident(ref word) if word == "input" => {
                    self.bump();
                    let Some(port) = self.expect_str("input port") else {
                        self.resync_block();
                        return Some(block);
                    };
                    match self.input_body(port) {
                        Some(input) => block.inputs.push(input),
                        None => {
                            self.resync_block();
                            return Some(block);
                        }
                    }
                    continue;
                }
                _ => {}
            }
            let Some(key) = self.attr_key() else {
                self.error_here("expected attribute or sub-block");
                self.resync_block();
                return Some(block);
            };
            if !self.expect(&TokenKind::Eq, "`=`") {
                self.resync_block();
                return Some(block);
            }
            let Some(value) = self.value() else {
                self.resync_block();
                return Some(block);
            };
            block.attrs.push((key, value));
        }
    }

    fn expose_body(&mut self, external: String) -> Option<ExposeAst> {
        if !self.expect(&TokenKind::LBrace, "`{`") {
            return None;
        }
        let mut expose = ExposeAst {
            external,
            block: String::new(),
            port: String::new(),
            label: None,
        };
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    if expose.block.is_empty() || expose.port.is_empty() {
                        self.error_here("expose block requires `block` and `port`");
                        return None;
                    }
                    return Some(expose);
                }
                TokenKind::Eof => {
                    self.error_here("unterminated expose block");
                    return None;
                }
                _ => {}
            }
            let Some(key) = self.attr_key() else {
                self.error_here("expected attribute inside expose block");
                self.resync_block();
                return None;
            };
            if !self.expect(&TokenKind::Eq, "`=`") {
                self.resync_block();
                return None;
            }
            let Some(value) = self.value() else {
                self.resync_block();
                return None;
            };
            match (key.as_str(), value) {
                ("block", AstValue::Str(s)) => expose.block = s,
                ("port", AstValue::Str(s)) => expose.port = s,
                ("label", AstValue::Str(s)) => expose.label = Some(s),
                (_, _) => self.error_here(format!("unknown expose attribute `{key}`")),
            }
        }
    }

    fn composite_body(&mut self, type_name: String) -> Option<CompositeAst> {
        if !self.expect(&TokenKind::LBrace, "`{`") {
            return None;
        }
        let mut composite = CompositeAst {
            type_name,
            blocks: Vec::new(),
            expose_inputs: Vec::new(),
            expose_outputs: Vec::new(),
        };
        loop {
            match self.peek().kind.clone() {
                TokenKind::RBrace => {
                    self.bump();
                    return Some(composite);
                }
                TokenKind::Eof => {
                    self.error_here("unterminated composite");
                    return None;
                }
                TokenKind::Ident(word) => {
                    self.bump();
                    match word.as_str() {
                        "block" => {
                            let Some(ty) = self.expect_str("block type") else {
                                self.resync_block();
                                return Some(composite);
                            };
                            let Some(name) = self.expect_str("block name") else {
                                self.resync_block();
                                return Some(composite);
                            };
                            if let Some(b) = self.block_body(ty, name) {
                                composite.blocks.push(b);
                            }
                        }
                        "expose_input" => {
                            let Some(external) = self.expect_str("external port") else {
                                self.resync_block();
                                return Some(composite);
                            };
                            if let Some(e) = self.expose_body(external) {
                                composite.expose_inputs.push(e);
                            }
                        }
                        "expose_output" => {
                            let Some(external) = self.expect_str("external port") else {
                                self.resync_block();
                                return Some(composite);
                            };
                            if let Some(e) = self.expose_body(external) {
                                composite.expose_outputs.push(e);
                            }
                        }
                        other => {
                            self.error_here(format!("unknown composite form `{other}`"));
                            self.resync_block();
                            return Some(composite);
                        }
                    }
                }
                _ => {
                    self.error_here("expected form inside composite");
                    self.resync_block();
                    return Some(composite);
                }
            }
        }
    }

}

/// Parses a document. Never panics, never throws; syntax failures resync
/// at block boundaries and accumulate.
#[must_use]
pub fn parse(src: &str) -> ParseOutcome {
    let tokens = match lex(src) {
        Ok(t) => t,
        Err(err) => {
            return ParseOutcome {
                ast: PatchAst::default(),
                errors: vec![err.into()],
            };
        }
    };
    let mut p = Parser {
        tokens,
        pos: 0,
        errors: Vec::new(),
    };
    let mut ast = PatchAst::default();

    // Top level: `patch "name" { ... }` then composites.
    loop {
        match p.peek().kind.clone() {
            TokenKind::Eof => break,
            TokenKind::Ident(word) => {
                p.bump();
                match word.as_str() {
                    "patch" => {
                        let Some(name) = p.expect_str("patch name") else {
                            p.resync_block();
                            continue;
                        };
                        ast.name = name;
                        if !p.expect(&TokenKind::LBrace, "`{`") {
                            continue;
                        }
                        loop {
                            match p.peek().kind.clone() {
                                TokenKind::RBrace => {
                                    p.bump();
                                    break;
                                }
                                TokenKind::Eof => {
                                    p.error_here("unterminated patch");
                                    break;
                                }
                                TokenKind::Ident(inner) if inner == "block" => {
                                    p.bump();
                                    let Some(ty) = p.expect_str("block type") else {
                                        p.resync_block();
                                        continue;
                                    };
                                    let Some(name) = p.expect_str("block name") else {
                                        p.resync_block();
                                        continue;
                                    };
                                    if let Some(block) = p.block_body(ty, name) {
                                        ast.blocks.push(block);
                                    }
                                }
                                _ => {
                                    p.error_here("expected `block` form inside patch");
                                    p.bump();
                                }
                            }
                        }
                    }
                    "composite" => {
                        let Some(ty) = p.expect_str("composite type") else {
                            p.resync_block();
                            continue;
                        };
                        if let Some(c) = p.composite_body(ty) {
                            ast.composites.push(c);
                        }
                    }
                    other => {
                        p.error_here(format!("unknown top-level form `{other}`"));
                    }
                }
            }
            _ => {
                p.error_here("expected top-level form");
                p.bump();
            }
        }
    }

    ParseOutcome {
        ast,
        errors: p.errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_patch_parses() {
        let out = parse(r#"patch "p" { block "Const" "k" { value = 0.5 } }"#);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.ast.name, "p");
        assert_eq!(out.ast.blocks.len(), 1);
        assert_eq!(
            out.ast.blocks[0].attrs[0],
            ("value".to_owned(), AstValue::Float(0.5))
        );
    }

    #[test]
    fn outputs_and_inputs_parse() {
        let out = parse(
            r#"patch "p" {
                block "Oscillator" "osc" {
                    wave = "oscSin"
                    input "phase" { combine = "last" }
                    outputs { value = vec.x }
                }
            }"#,
        );
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let b = &out.ast.blocks[0];
        assert_eq!(b.inputs[0].combine.as_deref(), Some("last"));
        assert_eq!(b.outputs[0].dst_block, "vec");
        assert_eq!(b.outputs[0].dst_port, "x");
    }

    #[test]
    fn broken_block_resyncs_and_later_blocks_survive() {
        let out = parse(
            r#"patch "p" {
                block "Const" "bad" { value = = }
                block "Const" "good" { value = 1.0 }
            }"#,
        );
        assert!(!out.errors.is_empty());
        assert!(out.ast.blocks.iter().any(|b| b.name == "good"));
    }

    #[test]
    fn quoted_keys_are_accepted() {
        let out = parse(r#"patch "p" { block "Const" "k" { "odd key" = 1 } }"#);
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.ast.blocks[0].attrs[0].0, "odd key");
    }

    #[test]
    fn composite_parses_with_exposes() {
        let out = parse(
            r#"composite "Wobble" {
                block "Oscillator" "osc" { wave = "oscSin" }
                expose_input "phase" { block = "osc" port = "phase" }
                expose_output "value" { block = "osc" port = "value" label = "Value" }
            }"#,
        );
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let c = &out.ast.composites[0];
        assert_eq!(c.expose_inputs.len(), 1);
        assert_eq!(c.expose_outputs[0].label.as_deref(), Some("Value"));
    }
}
