//! Convert CSS to a loom stylesheet.

use std::process::ExitCode;

use loom_cli::CssArgs;

fn main() -> ExitCode {
	loom_cli::main::<CssArgs>()
}
