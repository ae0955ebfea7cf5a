//! Source to destination mappings for the stylesheet batch modes.
//!
//! Every `SOURCE[:DEST]` argument is parsed exactly once into a
//! [`PathMapping`]; later stages only look at the parsed value.

use std::path::Path;
use std::path::PathBuf;

use crate::LoomError;
use crate::LoomResult;

/// File extension of compilable stylesheets.
pub const STYLESHEET_EXTENSION: &str = "scss";
/// File extension of compiled output.
pub const TARGET_EXTENSION: &str = "css";

/// A single positional argument after splitting on the first `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
	Pair {
		source: PathBuf,
		destination: PathBuf,
	},
	Single(PathBuf),
}

/// Split `arg` on its first colon, ignoring the colon of a leading drive
/// prefix such as `C:\`.
pub fn split_location(arg: &str) -> Option<(&str, &str)> {
	let bytes = arg.as_bytes();
	let offset = match bytes {
		[drive, b':', b'\\' | b'/', ..] if drive.is_ascii_alphabetic() => 2,
		_ => 0,
	};

	arg[offset..]
		.find(':')
		.map(|index| (&arg[..offset + index], &arg[offset + index + 1..]))
}

/// Split `arg` into a source and an optional destination.
pub fn parse_location(arg: &str) -> Location {
	match split_location(arg) {
		Some((source, destination)) => {
			Location::Pair {
				source: PathBuf::from(source),
				destination: PathBuf::from(destination),
			}
		}
		None => Location::Single(PathBuf::from(arg)),
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
	Directory,
	File,
}

/// A watched source and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapping {
	pub source: PathBuf,
	pub destination: PathBuf,
	pub kind: MappingKind,
}

impl PathMapping {
	/// Build the mapping for one argument. Directory sources default to
	/// compiling in place, file sources to the same path with a `.css`
	/// extension.
	pub fn from_location(location: Location) -> Self {
		let (source, destination) = match location {
			Location::Pair {
				source,
				destination,
			} => (source, Some(destination)),
			Location::Single(source) => (source, None),
		};

		let kind = if source.is_dir() {
			MappingKind::Directory
		} else {
			MappingKind::File
		};

		let destination = destination.unwrap_or_else(|| {
			match kind {
				MappingKind::Directory => source.clone(),
				MappingKind::File => default_destination(&source),
			}
		});

		Self {
			source,
			destination,
			kind,
		}
	}

	/// Parse every argument, directory mappings first.
	pub fn from_args<S: AsRef<str>>(args: &[S]) -> Vec<Self> {
		let (mut directories, files): (Vec<_>, Vec<_>) = args
			.iter()
			.map(|arg| Self::from_location(parse_location(arg.as_ref())))
			.partition(Self::is_directory);

		directories.extend(files);
		directories
	}

	pub fn is_directory(&self) -> bool {
		self.kind == MappingKind::Directory
	}

	/// Destination of `file`, a stylesheet below this mapping's source.
	pub fn destination_for(&self, file: &Path) -> PathBuf {
		match self.kind {
			MappingKind::File => self.destination.clone(),
			MappingKind::Directory => {
				let relative = file.strip_prefix(&self.source).unwrap_or(file);
				self.destination.join(relative).with_extension(TARGET_EXTENSION)
			}
		}
	}
}

/// `style.scss` becomes `style.css`.
pub fn default_destination(source: &Path) -> PathBuf {
	source.with_extension(TARGET_EXTENSION)
}

/// Reject `loomss --watch a.scss b.css` style invocations that were meant to
/// be written as `a.scss:b.css`.
pub fn validate_watch_args<S: AsRef<str>>(program: &str, flag: &str, args: &[S]) -> LoomResult<()> {
	let [first, second, ..] = args else {
		return Ok(());
	};
	let (first, second) = (first.as_ref(), second.as_ref());

	if split_location(first).is_some() {
		return Ok(());
	}

	let second_path = Path::new(second);
	let problem = if !second_path.exists() {
		"doesn't exist"
	} else if second_path
		.extension()
		.is_some_and(|extension| extension == TARGET_EXTENSION)
	{
		"is a CSS file"
	} else {
		return Ok(());
	};

	Err(LoomError::Usage(format!(
		"File {second} {problem}.\n    Did you mean: {program} {flag} {first}:{second}"
	)))
}

/// Whether `path` is a stylesheet the batch modes should look at.
pub fn is_stylesheet(path: &Path) -> bool {
	path.extension()
		.is_some_and(|extension| extension == STYLESHEET_EXTENSION)
}

/// Partials (`_name.scss`) are only ever imported, never compiled directly.
pub fn is_partial(path: &Path) -> bool {
	path.file_name()
		.and_then(|name| name.to_str())
		.is_some_and(|name| name.starts_with('_'))
}
