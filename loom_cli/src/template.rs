use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use loom_core::InvocationOptions;
use loom_core::LoomResult;
use loom_core::engine::template;
use loom_core::engine::template::TemplateContext;

use crate::Flow;
use crate::SingleFileArgs;
use crate::Tool;

/// Environment variable seeding the template load path.
pub const TEMPLATE_LOAD_PATH_ENV: &str = "LOOM_PATH";

/// Width of the rule printed after `--debug` output.
const DEBUG_RULE_WIDTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemplateStyle {
	/// Trim the whitespace around block tags.
	Indented,
	/// Keep the template whitespace as written.
	Ugly,
}

impl TemplateStyle {
	fn as_str(self) -> &'static str {
		match self {
			Self::Indented => "indented",
			Self::Ugly => "ugly",
		}
	}
}

/// Render a loom template.
#[derive(Parser, Debug, Clone)]
#[command(
	name = "loom",
	version,
	about = "Render a loom template to HTML",
	disable_help_flag = true,
	disable_version_flag = true
)]
pub struct TemplateArgs {
	#[command(flatten)]
	pub single: SingleFileArgs,
	/// Output style.
	#[arg(short = 't', long, value_enum, value_name = "TYPE")]
	pub style: Option<TemplateStyle>,
	/// Output format: xhtml, html4 or html5.
	#[arg(short = 'f', long, value_name = "NAME")]
	pub format: Option<String>,
	/// Escape HTML characters (like ampersands and angle brackets) by default.
	#[arg(short = 'e', long)]
	pub escape_html: bool,
	/// Wrap attribute values in double quotes.
	#[arg(short = 'q', long)]
	pub double_quote_attributes: bool,
	/// Load a data file (json, toml or yaml) into the render context.
	#[arg(short = 'r', long, value_name = "FILE")]
	pub require: Vec<PathBuf>,
	/// Add a directory to the template load path.
	#[arg(short = 'I', long, value_name = "PATH")]
	pub load_path: Vec<PathBuf>,
	/// Print the variables the template reads before the output.
	#[arg(long)]
	pub debug: bool,
}

impl TemplateArgs {
	pub fn apply(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		if self.single.apply(options)? == Flow::Exit {
			return Ok(Flow::Exit);
		}

		if let Some(style) = self.style {
			options.engine.set("style", style.as_str());
		}
		if let Some(format) = &self.format {
			options.engine.set("format", format.as_str());
		}
		if self.escape_html {
			options.engine.set("escape_html", true);
		}
		if self.double_quote_attributes {
			options.engine.set("attr_wrapper", "\"");
		}

		options.require_paths.extend(self.require.iter().cloned());

		if let Some(paths) = std::env::var_os(TEMPLATE_LOAD_PATH_ENV) {
			options.load_paths.extend(std::env::split_paths(&paths));
		}
		options.load_paths.extend(self.load_path.iter().cloned());
		for path in &options.load_paths {
			options.engine.push("load_paths", path.display().to_string());
		}

		options.debug = self.debug;
		Ok(Flow::Continue)
	}
}

impl Tool for TemplateArgs {
	const PROGRAM: &'static str = "loom";

	fn common(&self) -> &crate::CommonArgs {
		&self.single.common
	}

	fn configure(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		self.apply(options)
	}

	fn compile(&self, options: &InvocationOptions, source: &str) -> LoomResult<String> {
		let filename = options.filename.as_deref();

		if options.check_syntax {
			template::check(source, filename, &options.engine)?;
			println!("Syntax OK");
			return Ok(String::new());
		}

		let mut context = TemplateContext::new();
		for path in &options.require_paths {
			template::require_data_file(path, &mut context)?;
		}

		if options.debug {
			for name in template::undeclared_variables(source, filename, &options.engine)? {
				println!("{name}");
			}
			println!("{}", "=".repeat(DEBUG_RULE_WIDTH));
		}

		Ok(template::compile(source, filename, &options.engine, &context)?)
	}
}
