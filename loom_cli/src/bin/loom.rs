//! Render a loom template.

use std::process::ExitCode;

use loom_cli::TemplateArgs;

fn main() -> ExitCode {
	loom_cli::main::<TemplateArgs>()
}
