use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use derive_more::Deref;
use derive_more::DerefMut;
use serde_json::Value;

use crate::Endpoint;

/// Default interval between watch-mode scans.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Options handed to an engine untouched by the front-end.
///
/// Keys are engine specific (`style`, `line_numbers`, `load_paths`,
/// `escape_html`, ...). Values are plain JSON values so that every layer of
/// the option chain can add entries without knowing the engine.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut)]
pub struct EngineOptions(BTreeMap<String, Value>);

impl EngineOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&mut self, key: &str, value: impl Into<Value>) {
		self.0.insert(key.to_string(), value.into());
	}

	pub fn str(&self, key: &str) -> Option<&str> {
		self.0.get(key).and_then(Value::as_str)
	}

	/// `true` only for an explicit boolean `true`.
	pub fn flag(&self, key: &str) -> bool {
		self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
	}

	/// Like [`EngineOptions::flag`] with a default for missing keys.
	pub fn flag_or(&self, key: &str, default: bool) -> bool {
		self.0.get(key).and_then(Value::as_bool).unwrap_or(default)
	}

	/// Append `value` to the string list stored under `key`.
	pub fn push(&mut self, key: &str, value: impl Into<String>) {
		let entry = self
			.0
			.entry(key.to_string())
			.or_insert_with(|| Value::Array(Vec::new()));
		match entry {
			Value::Array(items) => items.push(Value::String(value.into())),
			other => *other = Value::Array(vec![Value::String(value.into())]),
		}
	}

	/// The string list stored under `key`.
	pub fn list(&self, key: &str) -> Vec<String> {
		match self.0.get(key) {
			Some(Value::Array(items)) => {
				items
					.iter()
					.filter_map(Value::as_str)
					.map(ToString::to_string)
					.collect()
			}
			Some(Value::String(item)) => vec![item.clone()],
			_ => Vec::new(),
		}
	}
}

/// Everything accumulated while parsing one command line.
///
/// Filled by the option callbacks and by stream resolution, then read by the
/// tool's compile step.
#[derive(Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct InvocationOptions {
	pub input: Option<Endpoint>,
	pub output: Option<Endpoint>,
	/// The input path as given on the command line.
	pub filename: Option<String>,
	pub trace: bool,
	pub unix_newlines: bool,
	/// Parse only, discard the output.
	pub check_syntax: bool,
	pub engine: EngineOptions,
	/// Data files merged into a template's render context.
	pub require_paths: Vec<PathBuf>,
	pub load_paths: Vec<PathBuf>,
	pub debug: bool,
	pub watch: bool,
	pub update: bool,
	/// Recompile stylesheets even when they are up to date.
	pub force: bool,
	pub interactive: bool,
	pub poll_interval: Duration,
	/// Explicit ERb choice of the HTML converter. `None` detects it from the
	/// input file extension.
	pub erb: Option<bool>,
}

impl Default for InvocationOptions {
	fn default() -> Self {
		Self {
			input: None,
			output: None,
			filename: None,
			trace: false,
			unix_newlines: false,
			check_syntax: false,
			engine: EngineOptions::default(),
			require_paths: Vec::new(),
			load_paths: Vec::new(),
			debug: false,
			watch: false,
			update: false,
			force: false,
			interactive: false,
			poll_interval: DEFAULT_POLL_INTERVAL,
			erb: None,
		}
	}
}

impl InvocationOptions {
	/// Display name of the input for messages.
	pub fn input_name(&self) -> &str {
		self.filename.as_deref().unwrap_or("-")
	}

	/// Whether watch or update mode takes over the run.
	pub fn is_batch(&self) -> bool {
		self.watch || self.update
	}
}
