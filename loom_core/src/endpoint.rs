//! Input and output endpoints: files, standard streams and in-memory buffers.

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::LoomError;
use crate::LoomResult;

/// How a named path is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
	Read,
	/// Text-mode write. On Windows `\n` is written as `\r\n`.
	Write,
	/// Write bytes unchanged.
	WriteBinary,
}

/// Direction of a standard stream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardStream {
	Stdin,
	Stdout,
}

/// An abstract input or output channel.
#[derive(Debug)]
pub enum Endpoint {
	File {
		path: PathBuf,
		file: File,
		mode: OpenMode,
	},
	Standard(StandardStream),
	Buffer(Cursor<Vec<u8>>),
}

/// Open `path` with `mode`, or return `None` when there is no path so the
/// caller can fall back to a standard stream.
///
/// `unix_newlines` turns a text-mode write into a binary write.
pub fn open_endpoint(
	path: Option<&Path>,
	mode: OpenMode,
	unix_newlines: bool,
) -> LoomResult<Option<Endpoint>> {
	let Some(path) = path else {
		return Ok(None);
	};

	let mode = if unix_newlines && mode == OpenMode::Write {
		OpenMode::WriteBinary
	} else {
		mode
	};

	let file = match mode {
		OpenMode::Read => File::open(path),
		OpenMode::Write | OpenMode::WriteBinary => {
			OpenOptions::new()
				.write(true)
				.create(true)
				.truncate(true)
				.open(path)
		}
	}
	.map_err(|source| LoomError::io(path, source))?;

	tracing::debug!(path = %path.display(), ?mode, "opened endpoint");

	Ok(Some(Endpoint::File {
		path: path.to_path_buf(),
		file,
		mode,
	}))
}

impl Endpoint {
	pub fn stdin() -> Self {
		Self::Standard(StandardStream::Stdin)
	}

	pub fn stdout() -> Self {
		Self::Standard(StandardStream::Stdout)
	}

	/// An empty in-memory buffer.
	pub fn buffer() -> Self {
		Self::Buffer(Cursor::new(Vec::new()))
	}

	/// An in-memory buffer positioned at the start of `content`.
	pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
		Self::Buffer(Cursor::new(content.into()))
	}

	/// The path of a file endpoint.
	pub fn path(&self) -> Option<&Path> {
		match self {
			Self::File { path, .. } => Some(path),
			_ => None,
		}
	}

	pub fn is_file(&self) -> bool {
		matches!(self, Self::File { .. })
	}

	/// The bytes written to a buffer endpoint.
	pub fn into_buffer(self) -> Option<Vec<u8>> {
		match self {
			Self::Buffer(cursor) => Some(cursor.into_inner()),
			_ => None,
		}
	}

	/// Read the whole endpoint as UTF-8 text.
	pub fn read_to_string(&mut self) -> LoomResult<String> {
		let mut content = String::new();
		let result = Read::read_to_string(self, &mut content);
		result.map_err(|source| self.wrap_error(source))?;
		Ok(content)
	}

	/// Write `content`, applying the endpoint's newline mode, and flush.
	pub fn write_text(&mut self, content: &str) -> LoomResult<()> {
		let translated;
		let bytes = if self.translates_newlines() {
			translated = content.replace("\r\n", "\n").replace('\n', "\r\n");
			translated.as_bytes()
		} else {
			content.as_bytes()
		};

		let result = self.write_all(bytes).and_then(|()| self.flush());
		result.map_err(|source| self.wrap_error(source))
	}

	/// Flush and release the endpoint. Files are closed; standard streams and
	/// buffers are left open.
	pub fn close(mut self) -> LoomResult<Option<Vec<u8>>> {
		self.flush().map_err(|source| self.wrap_error(source))?;
		if let Self::File { path, .. } = &self {
			tracing::debug!(path = %path.display(), "closed endpoint");
		}
		Ok(self.into_buffer())
	}

	fn translates_newlines(&self) -> bool {
		cfg!(windows)
			&& matches!(
				self,
				Self::File {
					mode: OpenMode::Write,
					..
				}
			)
	}

	fn wrap_error(&self, source: io::Error) -> LoomError {
		match self {
			Self::File { path, .. } => LoomError::io(path.clone(), source),
			_ => LoomError::Stream(source),
		}
	}
}

impl Read for Endpoint {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self {
			Self::File { file, .. } => file.read(buf),
			Self::Standard(StandardStream::Stdin) => io::stdin().read(buf),
			Self::Standard(StandardStream::Stdout) => {
				Err(io::Error::new(
					io::ErrorKind::Unsupported,
					"cannot read from an output stream",
				))
			}
			Self::Buffer(cursor) => cursor.read(buf),
		}
	}
}

impl Write for Endpoint {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self {
			Self::File { file, .. } => file.write(buf),
			Self::Standard(StandardStream::Stdout) => io::stdout().write(buf),
			Self::Standard(StandardStream::Stdin) => {
				Err(io::Error::new(
					io::ErrorKind::Unsupported,
					"cannot write to standard input",
				))
			}
			Self::Buffer(cursor) => cursor.write(buf),
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self {
			Self::File { file, .. } => file.flush(),
			Self::Standard(StandardStream::Stdout) => io::stdout().flush(),
			Self::Standard(StandardStream::Stdin) => Ok(()),
			Self::Buffer(cursor) => cursor.flush(),
		}
	}
}
