//! `mython` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` over `token` feeds `parser`, which builds the
//!   executable statement tree (`statement`)
//! - shared runtime value/object model: `runtime`
//! - `interpret` drives the whole pipeline against an output sink

pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod statement;
pub mod token;

use std::io;

use anyhow::Result;

use runtime::error::RuntimeError;
use runtime::{Closure, SimpleContext};
use statement::Flow;

/// Runs a Mython source text, writing program output to `output`.
///
/// Output produced before a runtime failure stays written; nothing is
/// emitted past the failure point.
pub fn interpret(source: &str, output: &mut dyn io::Write) -> Result<()> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::Parser::new(tokens).parse_program()?;

    let mut closure = Closure::new();
    let mut context = SimpleContext::new(output);
    match program.execute(&mut closure, &mut context)? {
        Flow::Normal(_) => Ok(()),
        Flow::Return(_) => Err(RuntimeError::ReturnOutsideMethod.into()),
    }
}
