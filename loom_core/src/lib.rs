//! `loom_core` is the shared core of the loom tools: a markup-template
//! compiler (`loom`), a stylesheet compiler (`loomss`) and two converters
//! (`html2loom`, `css2loomss`).
//!
//! ## Pipeline
//!
//! ```text
//! command line
//!   → InvocationOptions (filled by the option layers of each tool)
//!   → Endpoint resolution (files, standard streams, buffers)
//!   → engine (template, stylesheet, html, css)
//!   → output endpoint
//! ```
//!
//! The stylesheet tool can instead hand a list of `SOURCE[:DEST]` mappings to
//! a [`WatchController`], which compiles stale files once (update mode) or
//! keeps recompiling as sources change (watch mode).
//!
//! ## Modules
//!
//! - [`engine`]: the four engines behind `compile`/`render` style functions,
//!   all failing with [`EngineError`].
//! - [`Endpoint`] and [`open_endpoint`]: stream resolution.
//! - [`PathMapping`] and [`parse_location`]: source to destination mappings.
//! - [`WatchController`], [`WatchEvent`] and [`WatchObserver`]: update and
//!   watch modes.
//!
//! ## Quick Start
//!
//! ```rust
//! use loom_core::EngineOptions;
//! use loom_core::engine::stylesheet::Compiler;
//!
//! let mut options = EngineOptions::new();
//! options.set("style", "compressed");
//! options.set("cache", false);
//!
//! let compiler = Compiler::from_engine(&options).unwrap();
//! let css = compiler.compile_str("a { color: red; }", None).unwrap();
//! assert_eq!(css, "a{color:red}\n");
//! ```

pub use compile_cache::FileFingerprint;
pub use endpoint::*;
pub use error::*;
pub use mapping::*;
pub use options::*;
pub use watch::*;

mod compile_cache;
mod endpoint;
pub mod engine;
#[allow(unused_assignments)]
mod error;
mod mapping;
mod options;
mod watch;

#[cfg(test)]
mod __tests;
