//! `loom_cli` holds the command-line front-ends of the loom tools.
//!
//! Every binary is a thin `main` around a [`Tool`], run by the
//! [`Dispatcher`]:
//!
//! - `loom` ([`TemplateArgs`]): renders markup templates.
//! - `loomss` ([`StylesheetArgs`]): compiles stylesheets, with `--watch`,
//!   `--update` and `--interactive` modes.
//! - `html2loom` ([`HtmlArgs`]): converts HTML (and ERb) to templates.
//! - `css2loomss` ([`CssArgs`]): converts CSS to nested stylesheets.
//!
//! Options are layered: [`CommonArgs`] is shared by every tool,
//! [`SingleFileArgs`] adds the flags of the two compilers and each tool adds
//! its own on top. Each layer applies its parent first, then itself.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

pub use css::*;
pub use generic::*;
pub use html::*;
pub use reporter::*;
pub use single_file::*;
pub use stylesheet::*;
pub use template::*;

static USE_COLOR: AtomicBool = AtomicBool::new(false);

/// Whether console output should be colored.
pub fn color_enabled() -> bool {
	USE_COLOR.load(Ordering::Relaxed)
}

/// Turn colors on when stdout supports them and `NO_COLOR` is unset.
/// Returns the decision.
pub fn init_color() -> bool {
	let use_color = std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	set_color(use_color);
	use_color
}

pub fn set_color(enabled: bool) {
	USE_COLOR.store(enabled, Ordering::Relaxed);
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if $crate::color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if $crate::color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if $crate::color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

mod css;
mod generic;
mod html;
pub mod interactive;
mod reporter;
mod single_file;
mod stylesheet;
mod template;
