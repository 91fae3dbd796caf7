//! # stackpascal
//!
//! A single-pass ahead-of-time compiler for a subset of Standard Pascal, targeting a stack-machine assembly
//! listing (§1, §2).

/// Token kinds and the `Token` struct produced by the lexer.
pub mod token;

/// The lexer module, which tokenizes source code into a stream of tokens.
pub mod lexer;

/// The abstract syntax tree produced by the parser.
pub mod ast;

/// The parser module, which parses a stream of tokens into an abstract syntax tree.
pub mod parser;

/// The shared symbol/scope model used by both the semantic analyzer and the code generator.
pub mod symbol;

/// Shared type-name helpers: canonicalizing `TypeNode`s and combining operand types.
pub mod types;

/// The semantic analysis module, which resolves names and checks type agreement.
pub mod semantic;

/// The code generator module, which emits the stack-machine instruction listing.
pub mod codegen;

/// The error type surfaced by every compiler stage.
pub mod error;

/// The CLI module: reads a path from standard input and drives the pipeline over every `.pas` file found.
pub mod cli;

/// Bring the `Parser` trait into scope from `clap`, which allows parsing argument structs from the command line. We
/// assign it to underscore to indicate clearly that it's not used outside of bringing its trait methods into scope.
use clap::Parser as _;

/// The main entry point for the compiler: parses (effectively empty) command-line arguments, then reads the path to
/// compile from standard input (§6).
fn main() -> anyhow::Result<()> {
	cli::DriverArguments::parse();
	cli::run()
}
