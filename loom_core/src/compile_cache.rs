use std::collections::hash_map::DefaultHasher;
use std::fs::Metadata;
use std::hash::Hash;
use std::hash::Hasher;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::engine::stylesheet::Compiled;

pub(crate) const CACHE_SCHEMA_VERSION: u32 = 1;

/// Size and modification time of a file, used to decide whether it changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FileFingerprint {
	pub size: u64,
	pub modified_unix_ms: u64,
}

impl FileFingerprint {
	pub fn from_metadata(metadata: &Metadata) -> Self {
		let modified_unix_ms = metadata
			.modified()
			.ok()
			.and_then(|time| time.duration_since(UNIX_EPOCH).ok())
			.and_then(|duration| duration.as_millis().try_into().ok())
			.unwrap_or(0);

		Self {
			size: metadata.len(),
			modified_unix_ms,
		}
	}

	/// Fingerprint of `path`, `None` when it cannot be read.
	pub fn of(path: &Path) -> Option<Self> {
		std::fs::metadata(path)
			.ok()
			.map(|metadata| Self::from_metadata(&metadata))
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
	schema_version: u32,
	options: String,
	dependencies: Vec<(PathBuf, FileFingerprint)>,
	css: String,
}

/// Compiled stylesheets stored as JSON files under one directory.
///
/// An entry is reused only while the engine options and every file the
/// compile read are unchanged.
#[derive(Debug, Clone)]
pub(crate) struct CompileCache {
	root: PathBuf,
}

impl CompileCache {
	pub(crate) fn new(root: &Path) -> Self {
		Self {
			root: root.to_path_buf(),
		}
	}

	fn entry_path(&self, source: &Path) -> PathBuf {
		let absolute = std::fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
		let mut hasher = DefaultHasher::new();
		absolute.hash(&mut hasher);
		let stem = source
			.file_stem()
			.map_or_else(|| "stylesheet".into(), |stem| stem.to_string_lossy());
		self.root
			.join(format!("{stem}-{:016x}.json", hasher.finish()))
	}

	pub(crate) fn load(&self, source: &Path, options: &str) -> Option<Compiled> {
		let bytes = std::fs::read(self.entry_path(source)).ok()?;
		let entry: CacheEntry = serde_json::from_slice(&bytes).ok()?;

		if entry.schema_version != CACHE_SCHEMA_VERSION || entry.options != options {
			return None;
		}

		let fresh = entry
			.dependencies
			.iter()
			.all(|(path, fingerprint)| FileFingerprint::of(path).as_ref() == Some(fingerprint));
		if !fresh {
			tracing::trace!(source = %source.display(), "compile cache entry is stale");
			return None;
		}

		Some(Compiled {
			css: entry.css,
			dependencies: entry.dependencies.into_iter().map(|(path, _)| path).collect(),
		})
	}

	/// Store `compiled`. Failures only cost a recompile later, so they are
	/// logged and otherwise ignored.
	pub(crate) fn save(&self, source: &Path, options: &str, compiled: &Compiled) {
		let Some(dependencies) = compiled
			.dependencies
			.iter()
			.map(|path| FileFingerprint::of(path).map(|fingerprint| (path.clone(), fingerprint)))
			.collect::<Option<Vec<_>>>()
		else {
			return;
		};

		let entry = CacheEntry {
			schema_version: CACHE_SCHEMA_VERSION,
			options: options.to_string(),
			dependencies,
			css: compiled.css.clone(),
		};

		if let Err(error) = std::fs::create_dir_all(&self.root) {
			tracing::warn!(cache = %self.root.display(), %error, "cannot create compile cache");
			return;
		}

		let Ok(payload) = serde_json::to_vec_pretty(&entry) else {
			return;
		};

		let entry_path = self.entry_path(source);
		let temp_path = entry_path.with_extension(format!(
			"json.tmp-{}-{}",
			std::process::id(),
			SystemTime::now()
				.duration_since(UNIX_EPOCH)
				.map_or(0, |duration| duration.as_nanos())
		));

		if std::fs::write(&temp_path, payload).is_err() {
			return;
		}

		if std::fs::rename(&temp_path, &entry_path).is_err() {
			let _ = std::fs::remove_file(temp_path);
		}
	}
}
