//! The `loomss --interactive` read-eval-print loop.

use std::io::BufRead;
use std::io::Write;

use loom_core::LoomResult;
use loom_core::engine::stylesheet::Repl;

pub const PROMPT: &str = ">> ";

/// Evaluate `input` line by line until it ends. Evaluation errors are
/// printed and the loop carries on.
pub fn run<R: BufRead, W: Write>(input: R, output: &mut W) -> LoomResult<()> {
	let mut repl = Repl::new();
	prompt(output)?;

	for line in input.lines() {
		let line = line?;
		if !line.trim().is_empty() {
			match repl.eval(&line) {
				Ok(value) => writeln!(output, "{value}")?,
				Err(error) => writeln!(output, "SyntaxError: {}", error.message)?,
			}
		}
		prompt(output)?;
	}

	writeln!(output)?;
	Ok(())
}

fn prompt<W: Write>(output: &mut W) -> LoomResult<()> {
	write!(output, "{PROMPT}")?;
	output.flush()?;
	Ok(())
}
