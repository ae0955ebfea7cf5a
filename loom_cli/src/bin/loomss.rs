//! Compile a loom stylesheet.

use std::process::ExitCode;

use loom_cli::StylesheetArgs;

fn main() -> ExitCode {
	loom_cli::main::<StylesheetArgs>()
}
