use std::io::Stdout;
use std::io::Write;
use std::path::Path;

use loom_core::WatchEvent;
use loom_core::WatchObserver;
use owo_colors::OwoColorize;

/// Prints watch and update events to a console.
///
/// File actions are printed as a right-aligned verb followed by the path:
///
/// ```text
///      create css/style.css
///   overwrite css/print.css
/// ```
pub struct ConsoleReporter<W> {
	out: W,
}

impl ConsoleReporter<Stdout> {
	pub fn stdout() -> Self {
		Self::new(std::io::stdout())
	}
}

impl<W: Write> ConsoleReporter<W> {
	pub fn new(out: W) -> Self {
		Self { out }
	}

	pub fn into_inner(self) -> W {
		self.out
	}

	fn notice(&mut self, message: &str, path: &Path) {
		let _ = writeln!(self.out, ">>> {message}: {}", path.display());
	}

	fn action(&mut self, label: String, detail: &str) {
		let _ = writeln!(self.out, "{label} {detail}");
		let _ = self.out.flush();
	}
}

fn pad(verb: &str) -> String {
	format!("{verb:>11}")
}

impl<W: Write> WatchObserver for ConsoleReporter<W> {
	fn on_event(&mut self, event: &WatchEvent) {
		match event {
			WatchEvent::TemplateModified(path) => self.notice("Change detected to", path),
			WatchEvent::TemplateCreated(path) => self.notice("New template detected", path),
			WatchEvent::TemplateDeleted(path) => self.notice("Deleted template detected", path),
			WatchEvent::StylesheetCreated(path) => {
				self.action(colored!(pad("create"), green), &path.display().to_string());
			}
			WatchEvent::StylesheetOverwritten(path) => {
				self.action(colored!(pad("overwrite"), yellow), &path.display().to_string());
			}
			WatchEvent::StylesheetDeleted(path) => {
				self.action(colored!(pad("delete"), yellow), &path.display().to_string());
			}
			WatchEvent::DirectoryCreated(path) => {
				self.action(colored!(pad("directory"), green), &path.display().to_string());
			}
			WatchEvent::CompilationError { error, source } => {
				let detail = format!("{} ({})", source.display(), error.summary());
				self.action(colored!(pad("error"), red), &detail);
			}
		}
	}
}
