//! Markup templates rendered through [`minijinja`].
//!
//! Engine options understood here:
//!
//! - `style`: `indented` (default, block tags leave no blank lines) or `ugly`.
//! - `format`: `xhtml` (default), `html4` or `html5`. Available to templates
//!   as the `format` global and through `doctype()`.
//! - `escape_html`: auto-escape every `{{ }}` expression.
//! - `attr_wrapper`: quote used by `attr(name, value)`, `'` by default.
//! - `load_paths`: directories searched by `{% include %}` and friends.

use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use minijinja::AutoEscape;
use minijinja::Environment;
use minijinja::ErrorKind;
use minijinja::UndefinedBehavior;
use minijinja::Value;
use serde_json::Map;

use crate::EngineError;
use crate::EngineOptions;
use crate::EngineResult;
use crate::LoomError;
use crate::LoomResult;

/// Name given to templates read from standard input.
const ANONYMOUS_TEMPLATE: &str = "input";

/// Document formats the `format` option accepts.
pub const FORMATS: [&str; 3] = ["xhtml", "html4", "html5"];

/// Variables available to a rendered template.
pub type TemplateContext = Map<String, serde_json::Value>;

/// Render `source` with `context`.
pub fn compile(
	source: &str,
	filename: Option<&str>,
	options: &EngineOptions,
	context: &TemplateContext,
) -> EngineResult<String> {
	let name = filename.unwrap_or(ANONYMOUS_TEMPLATE);
	let env = environment(options)?;
	let template = env
		.template_from_named_str(name, source)
		.map_err(convert_error)?;

	template
		.render(Value::from_serialize(context))
		.map_err(convert_error)
}

/// Parse `source` without rendering it.
pub fn check(source: &str, filename: Option<&str>, options: &EngineOptions) -> EngineResult<()> {
	let name = filename.unwrap_or(ANONYMOUS_TEMPLATE);
	let env = environment(options)?;
	env.template_from_named_str(name, source)
		.map(|_| ())
		.map_err(convert_error)
}

/// Top-level variables the template reads without defining them, sorted.
pub fn undeclared_variables(
	source: &str,
	filename: Option<&str>,
	options: &EngineOptions,
) -> EngineResult<Vec<String>> {
	let name = filename.unwrap_or(ANONYMOUS_TEMPLATE);
	let env = environment(options)?;
	let template = env
		.template_from_named_str(name, source)
		.map_err(convert_error)?;

	let globals: HashSet<&str> = [
		"format", "doctype", "attr", "loop", "self", "super", "range", "dict", "namespace",
	]
	.into_iter()
	.collect();
	let mut names: Vec<String> = template
		.undeclared_variables(false)
		.into_iter()
		.filter(|name| !globals.contains(name.as_str()))
		.collect();
	names.sort();
	Ok(names)
}

fn environment<'source>(options: &EngineOptions) -> EngineResult<Environment<'source>> {
	let format = options.str("format").unwrap_or("xhtml").to_string();
	if !FORMATS.contains(&format.as_str()) {
		return Err(EngineError::runtime(
			format!("invalid output format `{format}`, expected xhtml, html4 or html5"),
			Vec::new(),
		));
	}

	let mut env = Environment::new();
	env.set_keep_trailing_newline(true);
	env.set_undefined_behavior(UndefinedBehavior::Strict);

	let indented = options.str("style") != Some("ugly");
	env.set_trim_blocks(indented);
	env.set_lstrip_blocks(indented);

	if options.flag("escape_html") {
		env.set_auto_escape_callback(|_| AutoEscape::Html);
	} else {
		env.set_auto_escape_callback(|_| AutoEscape::None);
	}

	let doctype = doctype(&format);
	env.add_global("format", Value::from(format));
	env.add_function("doctype", move || Value::from_safe_string(doctype.to_string()));

	let wrapper = options
		.str("attr_wrapper")
		.and_then(|wrapper| wrapper.chars().next())
		.unwrap_or('\'');
	env.add_function("attr", move |name: String, value: String| {
		Value::from_safe_string(format!(
			" {name}={wrapper}{}{wrapper}",
			escape_attribute(&value, wrapper)
		))
	});

	let load_paths: Vec<PathBuf> = options
		.list("load_paths")
		.into_iter()
		.map(PathBuf::from)
		.collect();
	env.set_loader(move |name| load_template(&load_paths, name));

	Ok(env)
}

fn load_template(load_paths: &[PathBuf], name: &str) -> Result<Option<String>, minijinja::Error> {
	for directory in load_paths {
		let candidate = directory.join(name);
		if candidate.is_file() {
			return std::fs::read_to_string(&candidate)
				.map(Some)
				.map_err(|error| {
					minijinja::Error::new(
						ErrorKind::InvalidOperation,
						format!("could not read template `{}`", candidate.display()),
					)
					.with_source(error)
				});
		}
	}

	Ok(None)
}

fn doctype(format: &str) -> &'static str {
	match format {
		"html5" => "<!DOCTYPE html>",
		"html4" => {
			r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#
		}
		_ => {
			r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#
		}
	}
}

fn escape_attribute(value: &str, wrapper: char) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'"' if wrapper == '"' => escaped.push_str("&quot;"),
			'\'' if wrapper == '\'' => escaped.push_str("&#39;"),
			other => escaped.push(other),
		}
	}
	escaped
}

/// Map a minijinja failure onto the engine error classes. Syntax errors keep
/// their location inside the message, render errors get a one-frame trace.
fn convert_error(error: minijinja::Error) -> EngineError {
	let message = error.to_string();
	let filename = error.name().map(ToString::to_string);

	let converted = if error.kind() == ErrorKind::SyntaxError {
		EngineError::syntax(message)
	} else {
		let mut backtrace = Vec::new();
		if let (Some(name), Some(line)) = (error.name(), error.line()) {
			backtrace.push(format!("{name}:{line}:in render"));
		}
		let mut source = std::error::Error::source(&error);
		while let Some(cause) = source {
			backtrace.push(format!("caused by: {cause}"));
			source = cause.source();
		}
		EngineError::runtime(
			error.detail().map_or_else(|| message.clone(), ToString::to_string),
			backtrace,
		)
	};

	match filename {
		Some(filename) => converted.with_filename(filename),
		None => converted,
	}
}

/// Load a `-r/--require` data file and merge its top-level keys into
/// `context`. The format comes from the file extension.
pub fn require_data_file(path: &Path, context: &mut TemplateContext) -> LoomResult<()> {
	let content = std::fs::read_to_string(path).map_err(|source| LoomError::io(path, source))?;
	let format = path
		.extension()
		.and_then(|extension| extension.to_str())
		.unwrap_or_default();
	let path_display = path.display().to_string();

	match parse_data_file(&content, format, &path_display)? {
		serde_json::Value::Object(map) => {
			context.extend(map);
			Ok(())
		}
		_ => {
			Err(LoomError::DataFile {
				path: path_display,
				reason: "the top level must be a table or object".to_string(),
			})
		}
	}
}

/// Parse a data file's content into a `serde_json::Value` based on its
/// format.
fn parse_data_file(content: &str, format: &str, path_display: &str) -> LoomResult<serde_json::Value> {
	match format {
		"json" => {
			serde_json::from_str(content).map_err(|e| {
				LoomError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		"toml" => {
			let toml_value: toml::Value = toml::from_str(content).map_err(|e| {
				LoomError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})?;
			serde_json::to_value(toml_value).map_err(|e| {
				LoomError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		"yaml" | "yml" => {
			serde_yaml_ng::from_str(content).map_err(|e| {
				LoomError::DataFile {
					path: path_display.to_string(),
					reason: e.to_string(),
				}
			})
		}
		other => Err(LoomError::UnsupportedDataFormat(other.to_string())),
	}
}
