//! A compact nested-stylesheet compiler.
//!
//! Supports nested rules with `&` parent references, comma selectors,
//! `$variables` (block scoped, `!default` guarded), `#{}` interpolation,
//! simple unit arithmetic, `@import` through load paths, bubbling `@media`
//! blocks and the four classic output styles.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use crate::EngineError;
use crate::EngineOptions;
use crate::EngineResult;
use crate::compile_cache::CompileCache;

mod eval;
mod parser;
mod render;

/// Name used in error locations when the source has no file.
const ANONYMOUS_SOURCE: &str = "input";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputStyle {
	#[default]
	Nested,
	Expanded,
	Compact,
	Compressed,
}

impl FromStr for OutputStyle {
	type Err = EngineError;

	fn from_str(name: &str) -> Result<Self, Self::Err> {
		match name {
			"nested" => Ok(Self::Nested),
			"expanded" => Ok(Self::Expanded),
			"compact" => Ok(Self::Compact),
			"compressed" => Ok(Self::Compressed),
			other => {
				Err(EngineError::runtime(
					format!(
						"unknown output style `{other}`, expected nested, expanded, compact or \
						 compressed"
					),
					Vec::new(),
				))
			}
		}
	}
}

/// Engine settings read from [`EngineOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct StyleOptions {
	pub style: OutputStyle,
	pub line_numbers: bool,
	pub load_paths: Vec<PathBuf>,
	/// Directory for cached compiles, `None` when caching is off.
	pub cache_location: Option<PathBuf>,
}

/// Cache directory used unless `cache_location` says otherwise.
pub const DEFAULT_CACHE_LOCATION: &str = ".loomss-cache";

impl StyleOptions {
	pub fn from_engine(options: &EngineOptions) -> EngineResult<Self> {
		let style = options
			.str("style")
			.map(OutputStyle::from_str)
			.transpose()?
			.unwrap_or_default();
		let cache_location = options.flag_or("cache", true).then(|| {
			PathBuf::from(
				options
					.str("cache_location")
					.unwrap_or(DEFAULT_CACHE_LOCATION),
			)
		});

		Ok(Self {
			style,
			line_numbers: options.flag("line_numbers"),
			load_paths: options.list("load_paths").into_iter().map(PathBuf::from).collect(),
			cache_location,
		})
	}

	/// Stable text form of everything that changes the output.
	pub(crate) fn fingerprint(&self) -> String {
		format!(
			"{:?}|{}|{:?}",
			self.style, self.line_numbers, self.load_paths
		)
	}
}

/// Compiled CSS and every file read to produce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
	pub css: String,
	pub dependencies: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Compiler {
	options: StyleOptions,
}

impl Compiler {
	pub fn new(options: StyleOptions) -> Self {
		Self { options }
	}

	pub fn from_engine(options: &EngineOptions) -> EngineResult<Self> {
		StyleOptions::from_engine(options).map(Self::new)
	}

	pub fn options(&self) -> &StyleOptions {
		&self.options
	}

	/// Compile `source`. Imports resolve against the load paths only.
	pub fn compile_str(&self, source: &str, filename: Option<&str>) -> EngineResult<String> {
		let name = filename.unwrap_or(ANONYMOUS_SOURCE);
		self.compile_source(source, name, None)
			.map(|compiled| compiled.css)
	}

	/// Compile the stylesheet at `path`, resolving imports relative to it and
	/// going through the compile cache when it is enabled.
	pub fn compile_file(&self, path: &Path) -> EngineResult<Compiled> {
		let cache = self.options.cache_location.as_deref().map(CompileCache::new);
		let fingerprint = self.options.fingerprint();

		if let Some(compiled) = cache
			.as_ref()
			.and_then(|cache| cache.load(path, &fingerprint))
		{
			tracing::debug!(path = %path.display(), "compile cache hit");
			return Ok(compiled);
		}

		let source = std::fs::read_to_string(path).map_err(|error| {
			EngineError::syntax(format!("file not found or unreadable: {}: {error}", path.display()))
		})?;
		let name = path.display().to_string();
		let compiled = self.compile_source(&source, &name, path.parent())?;

		if let Some(cache) = &cache {
			cache.save(path, &fingerprint, &compiled);
		}
		Ok(compiled)
	}

	/// Parse without rendering.
	pub fn check(&self, source: &str, filename: Option<&str>) -> EngineResult<()> {
		parser::parse(source, filename.unwrap_or(ANONYMOUS_SOURCE)).map(|_| ())
	}

	fn compile_source(
		&self,
		source: &str,
		name: &str,
		directory: Option<&Path>,
	) -> EngineResult<Compiled> {
		let nodes = parser::parse(source, name).map_err(|error| error.with_filename(name))?;
		let mut evaluator = eval::Evaluator::new(&self.options.load_paths);
		let flattened = evaluator.evaluate(&nodes, name, directory)?;
		let css = render::render(&flattened, self.options.style, self.options.line_numbers);

		let mut dependencies = Vec::new();
		if directory.is_some() {
			dependencies.push(PathBuf::from(name));
		}
		dependencies.extend(evaluator.dependencies);

		Ok(Compiled { css, dependencies })
	}
}

/// Line-by-line expression evaluator behind `loomss --interactive`.
#[derive(Debug, Default)]
pub struct Repl {
	variables: HashMap<String, String>,
}

impl Repl {
	pub fn new() -> Self {
		Self::default()
	}

	/// Evaluate one line. `$name: value` binds a variable, anything else is
	/// evaluated as an expression.
	pub fn eval(&mut self, line: &str) -> EngineResult<String> {
		let line = line.trim().trim_end_matches(';');
		let source = self.prelude();

		let assignment = line
			.strip_prefix('$')
			.and_then(|rest| rest.split_once(':'));
		if let Some((name, value)) = assignment {
			let value = self.expression(&source, value.trim())?;
			self.variables.insert(name.trim().to_string(), value.clone());
			return Ok(value);
		}

		self.expression(&source, line)
	}

	fn prelude(&self) -> String {
		let mut names: Vec<_> = self.variables.iter().collect();
		names.sort();
		names
			.into_iter()
			.map(|(name, value)| format!("${name}: {value};\n"))
			.collect()
	}

	/// Evaluate by compiling a one-declaration stylesheet.
	fn expression(&self, prelude: &str, expression: &str) -> EngineResult<String> {
		if expression.is_empty() {
			return Ok(String::new());
		}

		let source = format!("{prelude}_ {{ value: {expression}; }}");
		let compiler = Compiler::new(StyleOptions {
			style: OutputStyle::Compact,
			line_numbers: false,
			load_paths: Vec::new(),
			cache_location: None,
		});
		let css = compiler.compile_str(&source, Some("(interactive)"))?;
		let value = css
			.trim()
			.strip_prefix("_ { value: ")
			.and_then(|rest| rest.strip_suffix("; }"))
			.unwrap_or_default();
		Ok(value.to_string())
	}
}
