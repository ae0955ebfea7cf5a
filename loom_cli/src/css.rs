use clap::Parser;
use loom_core::InvocationOptions;
use loom_core::LoomResult;
use loom_core::engine::css;

use crate::CommonArgs;
use crate::Flow;
use crate::Tool;

/// Convert CSS to a nested loom stylesheet.
#[derive(Parser, Debug, Clone)]
#[command(
	name = "css2loomss",
	version,
	about = "Convert CSS to nested loom stylesheets",
	disable_help_flag = true,
	disable_version_flag = true
)]
pub struct CssArgs {
	#[command(flatten)]
	pub common: CommonArgs,
	/// Write properties in the `:name value` form.
	#[arg(long)]
	pub old: bool,
}

impl CssArgs {
	pub fn apply(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		if self.common.apply(options)? == Flow::Exit {
			return Ok(Flow::Exit);
		}

		if self.old {
			options.engine.set("old", true);
		}
		Ok(Flow::Continue)
	}
}

impl Tool for CssArgs {
	const PROGRAM: &'static str = "css2loomss";

	fn common(&self) -> &CommonArgs {
		&self.common
	}

	fn configure(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		self.apply(options)
	}

	fn compile(&self, options: &InvocationOptions, source: &str) -> LoomResult<String> {
		let mut engine = options.engine.clone();
		if let Some(filename) = &options.filename {
			engine.set("filename", filename.as_str());
		}
		Ok(css::render(source, &engine)?)
	}
}
