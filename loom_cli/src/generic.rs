use std::ffi::OsString;
use std::marker::PhantomData;
use std::path::Path;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::error::ErrorKind;
use loom_core::Endpoint;
use loom_core::InvocationOptions;
use loom_core::LoomError;
use loom_core::LoomResult;
use loom_core::OpenMode;
use loom_core::open_endpoint;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, `warn` when unset.
pub const LOG_ENV: &str = "LOOM_LOG";

/// Printed after a non-usage failure when `--trace` is off.
pub const TRACE_HINT: &str = "  Use --trace for backtrace.";

/// Options shared by every tool.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
	/// Read input from standard input instead of an input file.
	#[arg(short = 's', long)]
	pub stdin: bool,
	/// Show a full diagnostic, including the engine backtrace, on errors.
	#[arg(long)]
	pub trace: bool,
	/// Use Unix-style newlines in written files.
	#[arg(long, hide = !cfg!(windows))]
	pub unix_newlines: bool,
	/// Show this message.
	#[arg(short = 'h', short_alias = '?', long, action = ArgAction::Help)]
	pub help: Option<bool>,
	/// Print version.
	#[arg(short = 'v', long, action = ArgAction::Version)]
	pub version: Option<bool>,
	/// Input file followed by an optional output file.
	#[arg(value_name = "FILE")]
	pub files: Vec<String>,
}

impl CommonArgs {
	pub fn apply(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		options.trace = self.trace;
		options.unix_newlines = self.unix_newlines;
		if self.stdin {
			options.input = Some(Endpoint::stdin());
		}
		Ok(Flow::Continue)
	}
}

/// Whether the run carries on after an option layer or a preparation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Continue,
	/// The step already did all the work. The run ends successfully.
	Exit,
}

/// One command-line tool: its parsed arguments plus the hooks the
/// [`Dispatcher`] runs in order.
pub trait Tool: Parser {
	/// Program name used in messages.
	const PROGRAM: &'static str;

	/// Most positional arguments accepted by stream resolution.
	const MAX_POSITIONALS: usize = 2;

	fn common(&self) -> &CommonArgs;

	/// Apply every option layer, parent first.
	fn configure(&self, options: &mut InvocationOptions) -> LoomResult<Flow>;

	/// Runs after the options are applied and before the streams are
	/// resolved. May rewrite the positional arguments or take over the run.
	fn prepare(
		&self,
		_options: &mut InvocationOptions,
		_positionals: &mut Vec<String>,
	) -> LoomResult<Flow> {
		Ok(Flow::Continue)
	}

	/// Turn the input text into the output text.
	fn compile(&self, options: &InvocationOptions, source: &str) -> LoomResult<String>;
}

/// Drives a [`Tool`] from raw arguments to an exit code.
pub struct Dispatcher<T>(PhantomData<T>);

impl<T: Tool> Dispatcher<T> {
	/// Parse `args` (program name first) and run the tool.
	///
	/// Help and version requests end with success. Failures are printed as a
	/// one-line summary and end with exit code 1, unless `--trace` was given:
	/// then the error is returned so the caller can render the whole
	/// diagnostic.
	pub fn run<I, S>(args: I) -> Result<ExitCode, LoomError>
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString> + Clone,
	{
		let tool = match T::try_parse_from(args) {
			Ok(tool) => tool,
			Err(error) => return Ok(report_parse_error(&error)),
		};

		match Self::execute(&tool) {
			Ok(code) => Ok(code),
			Err(error) if tool.common().trace => Err(error),
			Err(error) => {
				report(&error);
				Ok(ExitCode::FAILURE)
			}
		}
	}

	fn execute(tool: &T) -> LoomResult<ExitCode> {
		let mut options = InvocationOptions::default();
		if tool.configure(&mut options)? == Flow::Exit {
			return Ok(ExitCode::SUCCESS);
		}

		let mut positionals = tool.common().files.clone();
		if tool.prepare(&mut options, &mut positionals)? == Flow::Exit {
			return Ok(ExitCode::SUCCESS);
		}

		resolve_streams(&positionals, T::MAX_POSITIONALS, &mut options)?;
		tracing::debug!(program = T::PROGRAM, input = options.input_name(), "resolved streams");

		let mut input = options.input.take().unwrap_or_else(Endpoint::stdin);
		let source = input.read_to_string()?;
		input.close()?;

		let output_text = tool.compile(&options, &source)?;

		let mut output = options.output.take().unwrap_or_else(Endpoint::stdout);
		output.write_text(&output_text)?;
		output.close()?;

		Ok(ExitCode::SUCCESS)
	}
}

/// Fill in the endpoints the option layers left unset.
///
/// The first positional argument names the input file unless the input is
/// already set. The next one names the output file unless the output is
/// already set. Missing names fall back to standard input and output.
pub fn resolve_streams(
	positionals: &[String],
	accepted: usize,
	options: &mut InvocationOptions,
) -> LoomResult<()> {
	if positionals.len() > accepted {
		let extra = positionals[accepted..].join(" ");
		return Err(LoomError::Usage(format!("too many arguments: {extra}")));
	}

	let mut names = positionals.iter();

	if options.input.is_none() {
		options.input = match names.next() {
			Some(name) => {
				options.filename = Some(name.clone());
				open_endpoint(Some(Path::new(name)), OpenMode::Read, false)?
			}
			None => Some(Endpoint::stdin()),
		};
	}

	if options.output.is_none() {
		let path = names.next().map(Path::new);
		options.output = open_endpoint(path, OpenMode::Write, options.unix_newlines)?
			.or_else(|| Some(Endpoint::stdout()));
	}

	Ok(())
}

fn report_parse_error(error: &clap::Error) -> ExitCode {
	match error.kind() {
		ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
			let _ = error.print();
			ExitCode::SUCCESS
		}
		_ => {
			let rendered = error.render().to_string();
			report(&LoomError::Usage(rendered.trim_end().to_string()));
			ExitCode::FAILURE
		}
	}
}

fn report(error: &LoomError) {
	tracing::debug!(?error, "run failed");
	eprintln!("{}", error.summary());
	if !error.is_usage() {
		eprintln!("{TRACE_HINT}");
	}
}

/// Install the log subscriber. The filter comes from `LOOM_LOG`.
pub fn init_logging(use_color: bool) {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.try_init();
}

/// Entry point shared by the binaries. A `--trace` failure is rendered as
/// a full miette report.
pub fn main<T: Tool>() -> ExitCode {
	let use_color = crate::init_color();
	init_logging(use_color);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	match Dispatcher::<T>::run(std::env::args_os()) {
		Ok(code) => code,
		Err(error) => {
			let report = miette::Report::new(error);
			eprintln!("{report:?}");
			ExitCode::FAILURE
		}
	}
}
