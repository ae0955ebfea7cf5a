use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum LoomError {
	#[error("{0}")]
	#[diagnostic(code(loom::usage), help("run with `--help` to list the accepted options"))]
	Usage(String),

	#[error("could not open `{}`: {source}", .path.display())]
	#[diagnostic(code(loom::io))]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	#[diagnostic(code(loom::stream))]
	Stream(#[from] std::io::Error),

	#[error(transparent)]
	#[diagnostic(transparent)]
	Engine(#[from] EngineError),

	#[error("required dependency {name} not found")]
	#[diagnostic(
		code(loom::missing_dependency),
		help("rebuild with `--features {name}` to enable it")
	)]
	MissingDependency { name: String },

	#[error("failed to load data file `{path}`: {reason}")]
	#[diagnostic(code(loom::data_file))]
	DataFile { path: String, reason: String },

	#[error("unsupported data file format: `{0}`")]
	#[diagnostic(code(loom::unsupported_format), help("supported formats: json, toml, yaml, yml"))]
	UnsupportedDataFormat(String),
}

impl LoomError {
	pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}

	/// One-line description used when `--trace` is not requested.
	pub fn summary(&self) -> String {
		match self {
			Self::Engine(error) => error.summary(),
			Self::MissingDependency { name } => format!("Required dependency {name} not found!"),
			other => other.to_string(),
		}
	}

	/// Usage failures are reported without the trace hint.
	pub fn is_usage(&self) -> bool {
		matches!(self, Self::Usage(_))
	}
}

/// The failure classes an engine can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorKind {
	/// The source could not be parsed. The line lives inside the message.
	Syntax,
	/// The source parsed but failed while being evaluated or rendered. The
	/// line lives in the first backtrace frame.
	Runtime,
	/// The engine was built without an optional capability.
	MissingDependency(String),
}

/// A failure raised by one of the engines.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
	pub kind: EngineErrorKind,
	pub message: String,
	/// Source file the failure belongs to, when known.
	pub filename: Option<String>,
	/// Engine-level location trace, innermost frame first. Frames look like
	/// `style.scss:12:in 'a b'`.
	pub backtrace: Vec<String>,
}

impl EngineError {
	pub fn syntax(message: impl Into<String>) -> Self {
		Self {
			kind: EngineErrorKind::Syntax,
			message: message.into(),
			filename: None,
			backtrace: Vec::new(),
		}
	}

	pub fn runtime(message: impl Into<String>, backtrace: Vec<String>) -> Self {
		Self {
			kind: EngineErrorKind::Runtime,
			message: message.into(),
			filename: None,
			backtrace,
		}
	}

	pub fn missing_dependency(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			kind: EngineErrorKind::MissingDependency(name.into()),
			message: message.into(),
			filename: None,
			backtrace: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
		self.filename = Some(filename.into());
		self
	}

	pub fn is_syntax(&self) -> bool {
		self.kind == EngineErrorKind::Syntax
	}

	/// Best-effort source line: the first integer following a colon, read
	/// from the message for syntax errors and from the innermost backtrace
	/// frame otherwise.
	pub fn source_line(&self) -> Option<usize> {
		let text = match self.kind {
			EngineErrorKind::Syntax => Some(self.message.as_str()),
			_ => self.backtrace.first().map(String::as_str),
		};

		text.and_then(first_integer_after_colon)
	}

	/// `Syntax error on line 3: ...` style summary.
	pub fn summary(&self) -> String {
		let line = SourceLine(self.source_line());
		match &self.kind {
			EngineErrorKind::Syntax => format!("Syntax error on line {line}: {}", self.message),
			EngineErrorKind::Runtime => format!("Error on line {line}: {}", self.message),
			EngineErrorKind::MissingDependency(name) => {
				format!("Required dependency {name} not found!")
			}
		}
	}
}

impl Diagnostic for EngineError {
	fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
		let code = match self.kind {
			EngineErrorKind::Syntax => "loom::engine::syntax",
			EngineErrorKind::Runtime => "loom::engine::runtime",
			EngineErrorKind::MissingDependency(_) => "loom::engine::missing_dependency",
		};
		Some(Box::new(code))
	}

	fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
		if self.backtrace.is_empty() {
			return None;
		}

		let frames = self
			.backtrace
			.iter()
			.map(|frame| format!("from {frame}"))
			.collect::<Vec<_>>()
			.join("\n");
		Some(Box::new(format!("backtrace:\n{frames}")))
	}
}

/// Renders a missing line number as `??`.
struct SourceLine(Option<usize>);

impl fmt::Display for SourceLine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0 {
			Some(line) => write!(f, "{line}"),
			None => f.write_str("??"),
		}
	}
}

pub(crate) fn first_integer_after_colon(text: &str) -> Option<usize> {
	text.match_indices(':').find_map(|(index, _)| {
		let digits: String = text[index + 1..]
			.chars()
			.take_while(char::is_ascii_digit)
			.collect();
		digits.parse().ok()
	})
}

pub type LoomResult<T> = Result<T, LoomError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
