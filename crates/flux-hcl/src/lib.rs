// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! flux-hcl: text front-end for flux patches.
//!
//! An alternative authoring surface that produces the same [`Patch`] the
//! visual editor does: a lexer (dash-aware), a recovering recursive-descent
//! parser, conversion into the engine's patch model, and a canonical
//! serializer whose output round-trips bitwise.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Parsed document model.
pub mod ast;
/// AST ↔ engine patch conversion.
pub mod convert;
/// Token scanner.
pub mod lexer;
/// Recovering parser.
pub mod parser;
/// Canonical emitter.
pub mod serialize;

pub use ast::{AstValue, BlockAst, CompositeAst, ExposeAst, InputAst, OutputAst, PatchAst};
pub use convert::{patch_to_ast, to_patch, ConvertError};
pub use lexer::{lex, LexError, Token, TokenKind};
pub use parser::{parse, ParseError, ParseOutcome};
pub use serialize::serialize;

use flux_core::Patch;

/// Parses and converts a document in one step.
///
/// Returns the patch plus any parse errors that were recovered from;
/// conversion failures are folded into the same error list as messages at
/// position 0:0.
pub fn load(src: &str) -> (Option<Patch>, Vec<ParseError>) {
    let outcome = parse(src);
    let mut errors = outcome.errors;
    match to_patch(&outcome.ast) {
        Ok(patch) if errors.is_empty() => (Some(patch), errors),
        Ok(_) => (None, errors),
        Err(convert_errors) => {
            errors.extend(convert_errors.into_iter().map(|e| ParseError {
                line: 0,
                col: 0,
                message: e.to_string(),
            }));
            (None, errors)
        }
    }
}
