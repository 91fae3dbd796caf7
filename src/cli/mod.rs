//! The compiler driver: reads a path from standard input, discovers `.pas` files, and compiles each one through the
//! full pipeline, writing its listing to a sibling `output/` directory (§6).
//!
//! There is exactly one operation, "compile a path", so the driver is one linear function rather than a
//! subcommand-dispatch layer.

use std::{
	fs,
	io::BufRead as _,
	path::{Path, PathBuf},
};

use colored::Colorize as _;

use crate::{codegen, error::CompileError, lexer, parser, semantic};

/// The command-line surface is effectively empty: the only external configuration point is the path read from
/// standard input (§6). `clap` is still used, minimally, so `--help`/`--version` behave the way every other
/// `clap`-based binary in this corpus does.
#[derive(clap::Parser)]
#[command(about = "Compiles Standard Pascal source into stack-machine assembly listings")]
pub struct DriverArguments;

/// Reads a path from standard input and compiles it (§6).
///
/// # Errors
/// Returns an error only for a failure reading standard input itself, or creating the output directory; per-file
/// compile failures are reported to standard output and do not abort the run (§6, "errors are printed ... exit
/// status is success in all cases").
pub fn run() -> anyhow::Result<()> {
	let mut line = String::new();
	std::io::stdin().lock().read_line(&mut line)?;
	let path = PathBuf::from(line.trim());

	let output_dir = output_directory()?;
	fs::create_dir_all(&output_dir).map_err(|error| anyhow::anyhow!(CompileError::codegen_unlocated(format!("could not create output directory: {error}"))))?;

	if path.is_dir() {
		let mut entries: Vec<PathBuf> = fs::read_dir(&path)?.filter_map(Result::ok).map(|entry| entry.path()).filter(|candidate| is_pascal_file(candidate)).collect();
		entries.sort();
		for file in entries {
			compile_file(&file, &output_dir);
		}
	} else {
		compile_file(&path, &output_dir);
	}

	Ok(())
}

fn is_pascal_file(path: &Path) -> bool {
	path.file_name().and_then(|name| name.to_str()).is_some_and(|name| name.to_lowercase().ends_with(".pas"))
}

/// The sibling `output` directory relative to the driver binary (§6).
fn output_directory() -> anyhow::Result<PathBuf> {
	let exe = std::env::current_exe()?;
	let parent = exe.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
	Ok(parent.join("output"))
}

/// Compiles one file, reporting each stage with `step()` and writing the listing to `output_dir` on success.
/// Compiler state (the lexer has none; the semantic analyzer and code generator each build a fresh `ScopeArena`) is
/// reset simply by constructing fresh values for this file (§5) — there is nothing left over to carry between
/// files.
fn compile_file(path: &Path, output_dir: &Path) {
	let display_name = path.display().to_string();
	println!("\n{} {}...", "Compiling".bold().green(), display_name.bold());

	let outcome = (|| -> anyhow::Result<Vec<String>> {
		let source = step("Reading", fs::read_to_string(path).map_err(|error| anyhow::anyhow!(CompileError::codegen_unlocated(error.to_string()))))?;
		let tokens = step("Tokenizing", lexer::tokenize(&source))?;
		let ast = step("Parsing", parser::parse(tokens))?;
		step("Checking", semantic::analyze(&ast))?;
		step("Generating", codegen::generate(&ast))
	})();

	match outcome {
		Ok(listing) => {
			let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or("out");
			let out_path = output_dir.join(format!("{stem}.vm"));
			match fs::write(&out_path, listing.join("\n") + "\n") {
				Ok(()) => println!("{} {}", "Done!".bold().green(), out_path.display()),
				Err(error) => eprintln!("{} could not write {}: {error}", "Error:".bold().red(), out_path.display()),
			}
		}
		Err(error) => eprintln!("{} {}", "Error:".bold().red(), attribute_to_file(error, &display_name)),
	}
}

/// Attaches `display_name` to `error` if it's a `CompileError`, so the printed message shows which file
/// failed; any other error (e.g. a raw `std::io::Error` from a read that never reached a compiler stage)
/// is printed as-is.
fn attribute_to_file(error: anyhow::Error, display_name: &str) -> anyhow::Error {
	match error.downcast::<CompileError>() {
		Ok(compile_error) => anyhow::anyhow!(compile_error.with_file(display_name)),
		Err(error) => error,
	}
}

/// Unwraps `result`, printing a colored one-line `stage: ok`/`failed` report.
fn step<T>(stage: &str, result: anyhow::Result<T>) -> anyhow::Result<T> {
	match result {
		Ok(value) => {
			println!("  {} {}", stage.bold().cyan(), "ok".bold().green());
			Ok(value)
		}
		Err(error) => {
			eprintln!("  {} {}", stage.bold().cyan(), "failed".bold().red());
			Err(error)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn is_pascal_file_is_case_insensitive() {
		assert!(is_pascal_file(Path::new("Program.PAS")));
		assert!(is_pascal_file(Path::new("program.pas")));
		assert!(!is_pascal_file(Path::new("program.txt")));
	}

	#[test]
	fn attribute_to_file_tags_a_compile_error_with_the_file_name() {
		let error = anyhow::anyhow!(CompileError::syntax(3, "unexpected token"));
		let attributed = attribute_to_file(error, "demo.pas");
		assert_eq!(attributed.to_string(), "demo.pas: Line 3: unexpected token");
	}

	#[test]
	fn attribute_to_file_leaves_a_non_compile_error_untouched() {
		let error = anyhow::anyhow!("plain io failure");
		let attributed = attribute_to_file(error, "demo.pas");
		assert_eq!(attributed.to_string(), "plain io failure");
	}
}
