//! Update and watch modes of the stylesheet tool.
//!
//! A [`WatchController`] owns the parsed [`PathMapping`]s and reports what it
//! does through a [`WatchObserver`]. [`WatchController::update`] compiles
//! every stale stylesheet once; [`WatchController::watch`] does the same and
//! then keeps rescanning the sources until it is interrupted.

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::Sender;
use std::time::Duration;

use ignore::WalkBuilder;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;

use crate::FileFingerprint;
use crate::LoomError;
use crate::MappingKind;
use crate::PathMapping;
use crate::engine::stylesheet::Compiler;
use crate::is_partial;
use crate::is_stylesheet;

/// Quiet period used to coalesce bursts of file-system notifications.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Something that happened during an update pass or a watch scan.
#[derive(Debug)]
pub enum WatchEvent {
	TemplateModified(PathBuf),
	TemplateCreated(PathBuf),
	TemplateDeleted(PathBuf),
	StylesheetOverwritten(PathBuf),
	StylesheetCreated(PathBuf),
	StylesheetDeleted(PathBuf),
	DirectoryCreated(PathBuf),
	/// A source failed to compile or its output could not be written. The
	/// pass carries on with the next file.
	CompilationError { error: LoomError, source: PathBuf },
}

/// Receives every [`WatchEvent`], in order.
pub trait WatchObserver {
	fn on_event(&mut self, event: &WatchEvent);
}

impl<F> WatchObserver for F
where
	F: FnMut(&WatchEvent),
{
	fn on_event(&mut self, event: &WatchEvent) {
		self(event);
	}
}

/// Messages that wake the watch loop before the poll interval runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
	/// The file system reported a change below a watched source.
	Changed,
	/// Stop watching.
	Interrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
	Created,
	Modified,
	Deleted,
}

type Snapshot = BTreeMap<PathBuf, FileFingerprint>;

pub struct WatchController<O> {
	mappings: Vec<PathMapping>,
	compiler: Compiler,
	observer: O,
	force: bool,
	snapshot: Snapshot,
}

impl<O: WatchObserver> WatchController<O> {
	pub fn new(mappings: Vec<PathMapping>, compiler: Compiler, observer: O) -> Self {
		Self {
			mappings,
			compiler,
			observer,
			force: false,
			snapshot: Snapshot::new(),
		}
	}

	/// Recompile stylesheets whose output is already up to date.
	#[must_use]
	pub fn force(mut self, force: bool) -> Self {
		self.force = force;
		self
	}

	pub fn mappings(&self) -> &[PathMapping] {
		&self.mappings
	}

	pub fn observer(&self) -> &O {
		&self.observer
	}

	pub fn into_observer(self) -> O {
		self.observer
	}

	/// Compile every stale, non-partial stylesheet of every mapping once.
	/// Failures are reported as events and never stop the pass.
	pub fn update(&mut self) {
		for mapping in self.mappings.clone() {
			for source in compilable_sources(&mapping) {
				let destination = mapping.destination_for(&source);
				if self.force || is_stale(&source, &destination) {
					self.compile(&source, &destination);
				} else {
					tracing::debug!(source = %source.display(), "output is up to date");
				}
			}
		}
	}

	/// Record the current state of the sources as the baseline for the next
	/// [`WatchController::poll`].
	pub fn take_snapshot(&mut self) {
		self.snapshot = self.scan();
	}

	/// Rescan the sources, report what changed since the previous scan and
	/// recompile or clean up accordingly. Returns the number of changed
	/// files.
	pub fn poll(&mut self) -> usize {
		let current = self.scan();
		let changes = diff(&self.snapshot, &current);
		self.snapshot = current;

		tracing::debug!(changes = changes.len(), "watch scan finished");
		for (path, change) in &changes {
			match change {
				Change::Created => {
					self.emit(WatchEvent::TemplateCreated(path.clone()));
					self.recompile(path);
				}
				Change::Modified => {
					self.emit(WatchEvent::TemplateModified(path.clone()));
					self.recompile(path);
				}
				Change::Deleted => {
					self.emit(WatchEvent::TemplateDeleted(path.clone()));
					self.remove_output(path);
				}
			}
		}

		changes.len()
	}

	/// Run an update pass, then rescan whenever `receiver` reports a change or
	/// `interval` passes, until [`Wake::Interrupt`] arrives or every sender is
	/// gone.
	///
	/// `sender` is handed to a file-system watcher. When no watcher can be
	/// created the loop keeps working by polling alone.
	pub fn watch(&mut self, sender: &Sender<Wake>, receiver: &Receiver<Wake>, interval: Duration) {
		self.update();
		self.take_snapshot();

		let _watcher = self.spawn_watcher(sender.clone());

		loop {
			match receiver.recv_timeout(interval) {
				Ok(Wake::Interrupt) | Err(RecvTimeoutError::Disconnected) => return,
				Ok(Wake::Changed) => {
					// Drain the burst of events that usually follows one save.
					loop {
						match receiver.recv_timeout(DEBOUNCE) {
							Ok(Wake::Changed) => {}
							Ok(Wake::Interrupt) | Err(RecvTimeoutError::Disconnected) => return,
							Err(RecvTimeoutError::Timeout) => break,
						}
					}
				}
				Err(RecvTimeoutError::Timeout) => {}
			}

			self.poll();
		}
	}

	fn spawn_watcher(&self, sender: Sender<Wake>) -> Option<RecommendedWatcher> {
		let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
			if let Ok(event) = result {
				if matches!(
					event.kind,
					notify::EventKind::Modify(_)
						| notify::EventKind::Create(_)
						| notify::EventKind::Remove(_)
				) {
					let _ = sender.send(Wake::Changed);
				}
			}
		});

		let mut watcher = match watcher {
			Ok(watcher) => watcher,
			Err(error) => {
				tracing::warn!(%error, "file system notifications unavailable, polling only");
				return None;
			}
		};

		for mapping in &self.mappings {
			let (path, mode) = match mapping.kind {
				MappingKind::Directory => (mapping.source.as_path(), RecursiveMode::Recursive),
				MappingKind::File => (mapping.source.as_path(), RecursiveMode::NonRecursive),
			};
			if let Err(error) = watcher.watch(path, mode) {
				tracing::warn!(path = %path.display(), %error, "cannot watch path");
			}
		}

		Some(watcher)
	}

	fn emit(&mut self, event: WatchEvent) {
		self.observer.on_event(&event);
	}

	/// Fingerprints of every stylesheet under the mapped sources, partials
	/// included.
	fn scan(&self) -> Snapshot {
		let mut snapshot = Snapshot::new();
		for mapping in &self.mappings {
			for path in stylesheets(mapping) {
				if let Some(fingerprint) = FileFingerprint::of(&path) {
					tracing::trace!(path = %path.display(), ?fingerprint, "scanned");
					snapshot.insert(path, fingerprint);
				}
			}
		}
		snapshot
	}

	fn recompile(&mut self, path: &Path) {
		for mapping in self.owning_mappings(path) {
			if is_partial(path) {
				// Any stylesheet of the mapping may import the partial.
				for source in compilable_sources(&mapping) {
					let destination = mapping.destination_for(&source);
					self.compile(&source, &destination);
				}
			} else {
				let destination = mapping.destination_for(path);
				self.compile(path, &destination);
			}
		}
	}

	fn remove_output(&mut self, path: &Path) {
		if is_partial(path) {
			return;
		}

		for mapping in self.owning_mappings(path) {
			let destination = mapping.destination_for(path);
			if !destination.exists() {
				continue;
			}
			match std::fs::remove_file(&destination) {
				Ok(()) => self.emit(WatchEvent::StylesheetDeleted(destination)),
				Err(source) => {
					self.emit(WatchEvent::CompilationError {
						error: LoomError::io(&destination, source),
						source: path.to_path_buf(),
					});
				}
			}
		}
	}

	fn owning_mappings(&self, path: &Path) -> Vec<PathMapping> {
		self.mappings
			.iter()
			.filter(|mapping| {
				match mapping.kind {
					MappingKind::Directory => path.starts_with(&mapping.source),
					MappingKind::File => path == mapping.source,
				}
			})
			.cloned()
			.collect()
	}

	fn compile(&mut self, source: &Path, destination: &Path) {
		let compiled = match self.compiler.compile_file(source) {
			Ok(compiled) => compiled,
			Err(error) => {
				self.emit(WatchEvent::CompilationError {
					error: LoomError::Engine(error),
					source: source.to_path_buf(),
				});
				return;
			}
		};

		if let Err(error) = self.create_parent_directories(destination) {
			self.emit(WatchEvent::CompilationError {
				error,
				source: source.to_path_buf(),
			});
			return;
		}

		let existed = destination.exists();
		if let Err(error) = std::fs::write(destination, compiled.css) {
			self.emit(WatchEvent::CompilationError {
				error: LoomError::io(destination, error),
				source: source.to_path_buf(),
			});
			return;
		}

		let destination = destination.to_path_buf();
		if existed {
			self.emit(WatchEvent::StylesheetOverwritten(destination));
		} else {
			self.emit(WatchEvent::StylesheetCreated(destination));
		}
	}

	/// Create the missing ancestors of `destination`, outermost first, with
	/// one event each.
	fn create_parent_directories(&mut self, destination: &Path) -> Result<(), LoomError> {
		let Some(parent) = destination.parent().filter(|parent| !parent.as_os_str().is_empty())
		else {
			return Ok(());
		};

		let mut missing: Vec<&Path> = parent
			.ancestors()
			.take_while(|ancestor| !ancestor.as_os_str().is_empty() && !ancestor.exists())
			.collect();
		missing.reverse();

		for directory in missing {
			std::fs::create_dir(directory).map_err(|source| LoomError::io(directory, source))?;
			self.emit(WatchEvent::DirectoryCreated(directory.to_path_buf()));
		}
		Ok(())
	}
}

/// Every stylesheet of `mapping`, sorted.
fn stylesheets(mapping: &PathMapping) -> Vec<PathBuf> {
	match mapping.kind {
		MappingKind::File => {
			if mapping.source.is_file() {
				vec![mapping.source.clone()]
			} else {
				Vec::new()
			}
		}
		MappingKind::Directory => {
			let mut files: Vec<PathBuf> = WalkBuilder::new(&mapping.source)
				.standard_filters(false)
				.hidden(true)
				.build()
				.filter_map(Result::ok)
				.filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
				.map(ignore::DirEntry::into_path)
				.filter(|path| is_stylesheet(path))
				.collect();
			files.sort();
			files
		}
	}
}

fn compilable_sources(mapping: &PathMapping) -> Vec<PathBuf> {
	stylesheets(mapping)
		.into_iter()
		.filter(|path| !is_partial(path))
		.collect()
}

/// The output is missing or older than its source.
fn is_stale(source: &Path, destination: &Path) -> bool {
	let modified = |path: &Path| std::fs::metadata(path).and_then(|metadata| metadata.modified());
	match (modified(source), modified(destination)) {
		(Ok(source), Ok(destination)) => destination < source,
		_ => true,
	}
}

fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<(PathBuf, Change)> {
	let mut changes: Vec<(PathBuf, Change)> = current
		.iter()
		.filter_map(|(path, fingerprint)| {
			match previous.get(path) {
				None => Some((path.clone(), Change::Created)),
				Some(old) if old != fingerprint => Some((path.clone(), Change::Modified)),
				Some(_) => None,
			}
		})
		.collect();

	changes.extend(
		previous
			.keys()
			.filter(|path| !current.contains_key(*path))
			.map(|path| (path.clone(), Change::Deleted)),
	);
	changes.sort_by(|(left, _), (right, _)| left.cmp(right));
	changes
}
