use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::task::Poll;
use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use loom_core::InvocationOptions;
use loom_core::LoomError;
use loom_core::LoomResult;
use loom_core::PathMapping;
use loom_core::Wake;
use loom_core::WatchController;
use loom_core::engine::stylesheet::Compiler;
use loom_core::split_location;
use loom_core::validate_watch_args;

use crate::ConsoleReporter;
use crate::Flow;
use crate::SingleFileArgs;
use crate::Tool;
use crate::interactive;

/// Environment variable seeding the stylesheet load path.
pub const STYLESHEET_LOAD_PATH_ENV: &str = "LOOMSS_PATH";

/// Environment variable with the watch poll interval in milliseconds.
pub const POLL_INTERVAL_ENV: &str = "LOOMSS_POLL_INTERVAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StylesheetStyle {
	Nested,
	Expanded,
	Compact,
	Compressed,
}

impl StylesheetStyle {
	fn as_str(self) -> &'static str {
		match self {
			Self::Nested => "nested",
			Self::Expanded => "expanded",
			Self::Compact => "compact",
			Self::Compressed => "compressed",
		}
	}
}

/// Compile a stylesheet to CSS.
#[derive(Parser, Debug, Clone)]
#[command(
	name = "loomss",
	version,
	about = "Compile loom stylesheets to CSS",
	after_help = "With --watch or --update every argument is a SOURCE[:DEST] pair. SOURCE may \
	              be a file or a directory.",
	disable_help_flag = true,
	disable_version_flag = true
)]
#[allow(clippy::struct_excessive_bools)]
pub struct StylesheetArgs {
	#[command(flatten)]
	pub single: SingleFileArgs,
	/// Watch stylesheets and recompile them when they change.
	#[arg(long)]
	pub watch: bool,
	/// Compile the stylesheets that are out of date, then exit.
	#[arg(long)]
	pub update: bool,
	/// Output style.
	#[arg(short = 't', long, value_enum, value_name = "NAME")]
	pub style: Option<StylesheetStyle>,
	/// Emit comments with the source line of each rule.
	#[arg(short = 'l', long, alias = "line-comments")]
	pub line_numbers: bool,
	/// Run an interactive expression shell.
	#[arg(short = 'i', long)]
	pub interactive: bool,
	/// Add a directory to the import path.
	#[arg(short = 'I', long, value_name = "PATH")]
	pub load_path: Vec<PathBuf>,
	/// Directory for cached compiles.
	#[arg(long, value_name = "PATH")]
	pub cache_location: Option<PathBuf>,
	/// Don't cache compiled stylesheets.
	#[arg(short = 'C', long)]
	pub no_cache: bool,
	/// Recompile every stylesheet, even the up to date ones.
	#[arg(long)]
	pub force: bool,
	/// Milliseconds between scans in watch mode.
	#[arg(long, value_name = "MS", env = POLL_INTERVAL_ENV, default_value_t = 1000)]
	pub poll_interval: u64,
}

impl StylesheetArgs {
	pub fn apply(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		if self.single.apply(options)? == Flow::Exit {
			return Ok(Flow::Exit);
		}

		if let Some(style) = self.style {
			options.engine.set("style", style.as_str());
		}
		if self.line_numbers {
			options.engine.set("line_numbers", true);
		}

		if let Some(paths) = std::env::var_os(STYLESHEET_LOAD_PATH_ENV) {
			options.load_paths.extend(std::env::split_paths(&paths));
		}
		options.load_paths.extend(self.load_path.iter().cloned());
		for path in &options.load_paths {
			options.engine.push("load_paths", path.display().to_string());
		}

		if self.no_cache {
			options.engine.set("cache", false);
		}
		if let Some(location) = &self.cache_location {
			options
				.engine
				.set("cache_location", location.display().to_string());
		}

		options.watch = self.watch;
		options.update = self.update;
		options.force = self.force;
		options.interactive = self.interactive;
		options.poll_interval = Duration::from_millis(self.poll_interval);
		Ok(Flow::Continue)
	}
}

impl Tool for StylesheetArgs {
	const PROGRAM: &'static str = "loomss";

	fn common(&self) -> &crate::CommonArgs {
		&self.single.common
	}

	fn configure(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		self.apply(options)
	}

	fn prepare(
		&self,
		options: &mut InvocationOptions,
		positionals: &mut Vec<String>,
	) -> LoomResult<Flow> {
		if options.interactive {
			let stdin = std::io::stdin();
			interactive::run(stdin.lock(), &mut std::io::stdout())?;
			return Ok(Flow::Exit);
		}

		split_colon_argument(options, positionals);
		if !options.is_batch() {
			return Ok(Flow::Continue);
		}

		let flag = if options.watch { "--watch" } else { "--update" };
		validate_watch_args(Self::PROGRAM, flag, positionals.as_slice())?;
		if positionals.is_empty() {
			return Err(LoomError::Usage(format!(
				"{flag} needs at least one SOURCE[:DEST] argument"
			)));
		}

		let compiler = Compiler::from_engine(&options.engine)?;
		let mappings = PathMapping::from_args(positionals.as_slice());
		let mut controller = WatchController::new(mappings, compiler, ConsoleReporter::stdout())
			.force(options.force);

		if options.watch {
			let (sender, receiver) = mpsc::channel();
			let installed = spawn_interrupt_listener(sender.clone());
			let _ = installed.recv();
			println!(">>> {} is watching for changes. Press Ctrl-C to stop.", Self::PROGRAM);
			controller.watch(&sender, &receiver, options.poll_interval);
		} else {
			controller.update();
		}

		Ok(Flow::Exit)
	}

	fn compile(&self, options: &InvocationOptions, source: &str) -> LoomResult<String> {
		let compiler = Compiler::from_engine(&options.engine)?;
		let filename = options.filename.as_deref();

		if options.check_syntax {
			compiler.check(source, filename)?;
			return Ok(String::new());
		}

		let css = match filename {
			Some(name) => compiler.compile_file(Path::new(name))?.css,
			None => compiler.compile_str(source, None)?,
		};
		Ok(css)
	}
}

/// `in.scss:out.css` as the only argument names both files. Next to other
/// arguments it switches to update mode.
pub(crate) fn split_colon_argument(options: &mut InvocationOptions, positionals: &mut Vec<String>) {
	if options.is_batch() {
		return;
	}

	let Some(first) = positionals.first() else {
		return;
	};
	let Some((input, output)) = split_location(first) else {
		return;
	};

	if positionals.len() == 1 {
		*positionals = vec![input.to_string(), output.to_string()];
	} else {
		options.update = true;
	}
}

/// Send [`Wake::Interrupt`] when Ctrl-C is pressed.
///
/// The returned receiver yields once the handler is installed, or
/// disconnects when it could not be.
pub(crate) fn spawn_interrupt_listener(sender: Sender<Wake>) -> Receiver<()> {
	let (ready, installed) = mpsc::channel();
	std::thread::spawn(move || {
		let runtime = match tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
		{
			Ok(runtime) => runtime,
			Err(error) => {
				tracing::warn!(%error, "could not listen for Ctrl-C");
				return;
			}
		};

		runtime.block_on(async move {
			let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
			// The first poll registers the handler.
			let first = std::future::poll_fn(|cx| Poll::Ready(interrupt.as_mut().poll(cx))).await;
			let _ = ready.send(());

			let result = match first {
				Poll::Ready(result) => result,
				Poll::Pending => interrupt.await,
			};
			match result {
				Ok(()) => {
					let _ = sender.send(Wake::Interrupt);
				}
				Err(error) => tracing::warn!(%error, "could not listen for Ctrl-C"),
			}
		});
	});
	installed
}
