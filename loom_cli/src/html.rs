use clap::Parser;
use loom_core::EngineErrorKind;
use loom_core::InvocationOptions;
use loom_core::LoomError;
use loom_core::LoomResult;
use loom_core::engine::html;

use crate::CommonArgs;
use crate::Flow;
use crate::Tool;

/// Convert HTML to a loom template.
#[derive(Parser, Debug, Clone)]
#[command(
	name = "html2loom",
	version,
	about = "Convert HTML (and ERb) documents to loom templates",
	disable_help_flag = true,
	disable_version_flag = true
)]
pub struct HtmlArgs {
	#[command(flatten)]
	pub common: CommonArgs,
	/// Parse ERb tags. On by default for .erb and .rhtml inputs.
	#[arg(short = 'e', long, short_alias = 'r', alias = "rhtml", overrides_with = "no_erb")]
	pub erb: bool,
	/// Don't parse ERb tags.
	#[arg(long, alias = "no-rhtml", overrides_with = "erb")]
	pub no_erb: bool,
	/// Check that the input is well-formed XHTML.
	#[arg(short = 'x', long)]
	pub xhtml: bool,
}

impl HtmlArgs {
	pub fn apply(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		if self.common.apply(options)? == Flow::Exit {
			return Ok(Flow::Exit);
		}

		if self.erb {
			options.erb = Some(true);
		} else if self.no_erb {
			options.erb = Some(false);
		}
		if self.xhtml {
			options.engine.set("xhtml", true);
		}
		Ok(Flow::Continue)
	}
}

impl Tool for HtmlArgs {
	const PROGRAM: &'static str = "html2loom";

	fn common(&self) -> &CommonArgs {
		&self.common
	}

	fn configure(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		self.apply(options)
	}

	fn compile(&self, options: &InvocationOptions, source: &str) -> LoomResult<String> {
		let erb = options.erb.unwrap_or_else(|| {
			options
				.filename
				.as_deref()
				.is_some_and(html::is_erb_filename)
		});

		let mut engine = options.engine.clone();
		engine.set("erb", erb);
		if let Some(filename) = &options.filename {
			engine.set("filename", filename.as_str());
		}

		html::render(source, &engine).map_err(|error| {
			match &error.kind {
				EngineErrorKind::MissingDependency(name) if !options.trace => {
					LoomError::MissingDependency { name: name.clone() }
				}
				_ => error.into(),
			}
		})
	}
}
