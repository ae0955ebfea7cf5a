use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use clap::Args;
use loom_core::Endpoint;
use loom_core::InvocationOptions;
use loom_core::LoomError;
use loom_core::LoomResult;

use crate::CommonArgs;
use crate::Flow;

/// Name of the plugin directory created by `--rails`.
pub const PLUGIN_NAME: &str = "loom";

/// Options shared by the template and stylesheet compilers.
#[derive(Args, Debug, Clone, Default)]
pub struct SingleFileArgs {
	#[command(flatten)]
	pub common: CommonArgs,
	/// Just check syntax, don't evaluate.
	#[arg(short = 'c', long)]
	pub check: bool,
	/// Install the loom plugin into the application at DIR.
	#[arg(long, value_name = "DIR")]
	pub rails: Option<PathBuf>,
}

impl SingleFileArgs {
	pub fn apply(&self, options: &mut InvocationOptions) -> LoomResult<Flow> {
		if self.common.apply(options)? == Flow::Exit {
			return Ok(Flow::Exit);
		}

		if self.check {
			options.check_syntax = true;
			options.output = Some(Endpoint::buffer());
		}

		if let Some(dir) = &self.rails {
			let stdin = std::io::stdin();
			install_plugin(dir, &mut stdin.lock(), &mut std::io::stdout())?;
			return Ok(Flow::Exit);
		}

		Ok(Flow::Continue)
	}
}

/// Write the loom plugin manifest below `dir/vendor/plugins`.
///
/// Asks before replacing an existing plugin. Anything but `y` keeps it.
pub fn install_plugin<R: BufRead, W: Write>(dir: &Path, input: &mut R, output: &mut W) -> LoomResult<()> {
	let plugins = dir.join("vendor").join("plugins");
	if !plugins.is_dir() {
		writeln!(output, "Directory {} doesn't exist", plugins.display())?;
		return Ok(());
	}

	let plugin_dir = plugins.join(PLUGIN_NAME);
	if plugin_dir.exists() {
		write!(output, "Directory {} already exists, overwrite [y/N]? ", plugin_dir.display())?;
		output.flush()?;

		let mut answer = String::new();
		input.read_line(&mut answer)?;
		if answer.trim() != "y" {
			return Ok(());
		}

		std::fs::remove_dir_all(&plugin_dir).map_err(|source| LoomError::io(&plugin_dir, source))?;
	}

	std::fs::create_dir_all(&plugin_dir).map_err(|source| LoomError::io(&plugin_dir, source))?;
	let manifest = plugin_dir.join("plugin.toml");
	std::fs::write(&manifest, plugin_manifest()).map_err(|source| LoomError::io(&manifest, source))?;
	tracing::info!(path = %manifest.display(), "wrote plugin manifest");

	writeln!(output, "Loom plugin added to {}", dir.display())?;
	Ok(())
}

fn plugin_manifest() -> String {
	format!(
		"# Registers the loom template and stylesheet compilers.\n[plugin]\nname = \
		 \"{PLUGIN_NAME}\"\nversion = \"{}\"\ntemplates = [\"loom\"]\nstylesheets = [\"scss\"]\n",
		env!("CARGO_PKG_VERSION")
	)
}
