//! Convert HTML to a loom template.

use std::process::ExitCode;

use loom_cli::HtmlArgs;

fn main() -> ExitCode {
	loom_cli::main::<HtmlArgs>()
}
