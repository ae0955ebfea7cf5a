//! HTML to template conversion.
//!
//! Plain markup is copied through with the template delimiters (`{{`, `{%`,
//! `{#`) escaped so that rendering the result reproduces the input. With the
//! `erb` option, embedded Ruby tags are translated into template tags:
//!
//! | ERb                         | template                         |
//! | --------------------------- | -------------------------------- |
//! | `<%= expr %>`               | `{{ expr }}`                     |
//! | `<%# text %>`               | `{# text #}`                     |
//! | `<% if c %>` / `elsif`      | `{% if c %}` / `{% elif c %}`    |
//! | `<% unless c %>`            | `{% if not (c) %}`               |
//! | `<% xs.each do \|x\| %>`    | `{% for x in xs %}`              |
//! | `<% x = expr %>`            | `{% set x = expr %}`             |
//! | `<% end %>`                 | `{% endif %}` / `{% endfor %}`   |
//!
//! The `xhtml` option checks that the input is well-formed XHTML before
//! converting it. The check is only compiled in with the `xhtml` feature.

use crate::EngineError;
use crate::EngineOptions;
use crate::EngineResult;

const ANONYMOUS_DOCUMENT: &str = "input";

/// Convert HTML `input` into template source.
pub fn render(input: &str, options: &EngineOptions) -> EngineResult<String> {
	let name = options.str("filename").unwrap_or(ANONYMOUS_DOCUMENT);
	let erb = options.flag("erb");

	if options.flag("xhtml") {
		check_xhtml(input, name, erb)?;
	}

	if erb {
		ErbTranslator::new(name).translate(input)
	} else {
		Ok(escape_delimiters(input))
	}
}

/// Whether a file name carries an ERb extension.
pub fn is_erb_filename(filename: &str) -> bool {
	let lower = filename.to_ascii_lowercase();
	lower.ends_with(".erb") || lower.ends_with(".rhtml")
}

fn syntax_error(detail: impl std::fmt::Display, name: &str, line: usize) -> EngineError {
	EngineError::syntax(format!("{detail} (in {name}:{line})"))
}

/// Replace every template opening delimiter with an expression printing it.
fn escape_delimiters(text: &str) -> String {
	let mut output = String::with_capacity(text.len());
	let mut chars = text.chars().peekable();

	while let Some(c) = chars.next() {
		let delimiter = match chars.peek() {
			Some(&(next @ ('{' | '%' | '#'))) if c == '{' => next,
			_ => {
				output.push(c);
				continue;
			}
		};
		chars.next();
		output.push_str("{{ '{");
		output.push(delimiter);
		output.push_str("' }}");
	}

	output
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
	If,
	For,
}

struct ErbTranslator<'a> {
	name: &'a str,
	blocks: Vec<(Block, usize)>,
}

impl<'a> ErbTranslator<'a> {
	fn new(name: &'a str) -> Self {
		Self {
			name,
			blocks: Vec::new(),
		}
	}

	fn translate(mut self, input: &str) -> EngineResult<String> {
		let mut output = String::with_capacity(input.len());
		let mut rest = input;
		let mut line = 1;

		while let Some(start) = rest.find("<%") {
			let (text, tag) = rest.split_at(start);
			output.push_str(&escape_delimiters(text));
			line += text.matches('\n').count();

			let Some(end) = tag[2..].find("%>").map(|index| index + 2) else {
				return Err(syntax_error("unterminated ERb tag", self.name, line));
			};
			let body = &tag[2..end];
			output.push_str(&self.tag(body, line)?);
			line += body.matches('\n').count();
			rest = &tag[end + 2..];
		}
		output.push_str(&escape_delimiters(rest));
		line += rest.matches('\n').count();

		if let Some((block, opened)) = self.blocks.last() {
			let keyword = match block {
				Block::If => "if",
				Block::For => "loop",
			};
			return Err(syntax_error(
				format!("{keyword} opened on line {opened} is missing its `end`"),
				self.name,
				line,
			));
		}

		Ok(output)
	}

	fn tag(&mut self, body: &str, line: usize) -> EngineResult<String> {
		// Whitespace trimming markers `<%-` and `-%>` have no equivalent.
		let body = body.strip_suffix('-').unwrap_or(body);

		if let Some(comment) = body.strip_prefix('#') {
			return Ok(format!("{{# {} #}}", comment.trim()));
		}
		if let Some(expression) = body.strip_prefix('=') {
			return Ok(format!("{{{{ {} }}}}", expression_text(expression.trim())));
		}

		let code = body.strip_prefix('-').unwrap_or(body).trim();
		self.statement(code, line)
	}

	fn statement(&mut self, code: &str, line: usize) -> EngineResult<String> {
		let (keyword, rest) = code
			.split_once(char::is_whitespace)
			.map_or((code, ""), |(keyword, rest)| (keyword, rest.trim()));

		match keyword {
			"if" => {
				self.blocks.push((Block::If, line));
				Ok(format!("{{% if {} %}}", condition(rest)))
			}
			"unless" => {
				self.blocks.push((Block::If, line));
				Ok(format!("{{% if not ({}) %}}", condition(rest)))
			}
			"elsif" => {
				self.expect_if("elsif", line)?;
				Ok(format!("{{% elif {} %}}", condition(rest)))
			}
			"else" => {
				self.expect_if("else", line)?;
				Ok("{% else %}".to_string())
			}
			"end" => {
				match self.blocks.pop() {
					Some((Block::If, _)) => Ok("{% endif %}".to_string()),
					Some((Block::For, _)) => Ok("{% endfor %}".to_string()),
					None => Err(syntax_error("unexpected `end`", self.name, line)),
				}
			}
			"for" => {
				let Some((variable, sequence)) = rest.split_once(" in ") else {
					return Err(syntax_error(format!("malformed loop `{code}`"), self.name, line));
				};
				self.blocks.push((Block::For, line));
				Ok(format!(
					"{{% for {} in {} %}}",
					variable.trim(),
					expression_text(sequence.trim())
				))
			}
			_ => {
				if let Some(translated) = self.each_loop(code, line) {
					return Ok(translated);
				}
				if let Some((target, value)) = assignment(code) {
					return Ok(format!("{{% set {target} = {} %}}", expression_text(value)));
				}
				// Statements without a template equivalent are kept as comments.
				Ok(format!("{{# {code} #}}"))
			}
		}
	}

	fn expect_if(&self, keyword: &str, line: usize) -> EngineResult<()> {
		match self.blocks.last() {
			Some((Block::If, _)) => Ok(()),
			_ => Err(syntax_error(format!("`{keyword}` outside of `if`"), self.name, line)),
		}
	}

	/// `items.each do |item|` and `items.each { |item|`.
	fn each_loop(&mut self, code: &str, line: usize) -> Option<String> {
		let (sequence, block) = code.split_once(".each")?;
		let block = block.trim();
		let parameters = block
			.strip_prefix("do")
			.or_else(|| block.strip_prefix('{'))?
			.trim();
		let variable = parameters.strip_prefix('|')?.strip_suffix('|')?.trim();
		if variable.is_empty() {
			return None;
		}

		self.blocks.push((Block::For, line));
		Some(format!(
			"{{% for {variable} in {} %}}",
			expression_text(sequence.trim())
		))
	}
}

fn condition(text: &str) -> String {
	expression_text(text.strip_suffix(" then").unwrap_or(text).trim())
}

/// `name = value`, rejecting comparisons.
fn assignment(code: &str) -> Option<(&str, &str)> {
	let (target, value) = code.split_once('=')?;
	if value.starts_with('=') || target.ends_with(['!', '<', '>']) {
		return None;
	}
	let target = target.trim();
	let target = target.strip_prefix('@').unwrap_or(target);
	let valid = !target.is_empty()
		&& target
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || c == '_');
	valid.then_some((target, value.trim()))
}

/// Rewrite a Ruby expression into template syntax: instance variables lose
/// their `@`, and `&&`, `||`, `!` and `nil` become `and`, `or`, `not` and
/// `none`. Quoted strings are copied unchanged.
fn expression_text(expression: &str) -> String {
	let mut output = String::with_capacity(expression.len());
	let chars: Vec<char> = expression.chars().collect();
	let mut index = 0;

	while index < chars.len() {
		let c = chars[index];
		match c {
			'"' | '\'' => {
				output.push(c);
				index += 1;
				while index < chars.len() {
					output.push(chars[index]);
					if chars[index] == '\\' && index + 1 < chars.len() {
						index += 1;
						output.push(chars[index]);
					} else if chars[index] == c {
						break;
					}
					index += 1;
				}
			}
			'@' => {}
			'&' if chars.get(index + 1) == Some(&'&') => {
				output.push_str("and");
				index += 1;
			}
			'|' if chars.get(index + 1) == Some(&'|') => {
				output.push_str("or");
				index += 1;
			}
			'!' if chars.get(index + 1) != Some(&'=') => output.push_str("not "),
			_ if c.is_alphabetic() || c == '_' => {
				let start = index;
				while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
					index += 1;
				}
				let word: String = chars[start..index].iter().collect();
				output.push_str(if word == "nil" { "none" } else { word.as_str() });
				continue;
			}
			_ => output.push(c),
		}
		index += 1;
	}

	output
}

#[cfg(feature = "xhtml")]
fn check_xhtml(input: &str, name: &str, erb: bool) -> EngineResult<()> {
	xhtml::check(input, name, erb)
}

#[cfg(not(feature = "xhtml"))]
fn check_xhtml(_input: &str, _name: &str, _erb: bool) -> EngineResult<()> {
	Err(EngineError::missing_dependency(
		"xhtml",
		"strict XHTML checking is not available in this build",
	))
}

#[cfg(feature = "xhtml")]
mod xhtml {
	use super::syntax_error;
	use crate::EngineResult;

	/// Elements that never have content in HTML and are written without a
	/// closing tag by mistake most often.
	const VOID_ELEMENTS: [&str; 8] = ["br", "hr", "img", "input", "meta", "link", "area", "col"];

	/// Check tag nesting, lowercase names, quoted attributes and self-closed
	/// void elements.
	pub(super) fn check(input: &str, name: &str, erb: bool) -> EngineResult<()> {
		let mut open: Vec<(String, usize)> = Vec::new();
		let mut rest = input;
		let mut line = 1;

		while let Some(start) = rest.find('<') {
			line += rest[..start].matches('\n').count();
			rest = &rest[start..];

			let (skip, close) = if rest.starts_with("<!--") {
				("<!--", "-->")
			} else if erb && rest.starts_with("<%") {
				("<%", "%>")
			} else if rest.starts_with("<?") {
				("<?", "?>")
			} else if rest.starts_with("<!") {
				("<!", ">")
			} else {
				("", "")
			};

			if !skip.is_empty() {
				let Some(end) = rest[skip.len()..]
					.find(close)
					.map(|index| index + skip.len())
				else {
					return Err(syntax_error(format!("unterminated `{skip}`"), name, line));
				};
				line += rest[..end].matches('\n').count();
				rest = &rest[end + close.len()..];
				continue;
			}

			let Some(end) = tag_end(rest) else {
				return Err(syntax_error("unterminated tag", name, line));
			};
			let tag = &rest[1..end];
			let tag_line = line;
			line += tag.matches('\n').count();
			rest = &rest[end + 1..];

			if let Some(closing) = tag.strip_prefix('/') {
				let closing = closing.trim();
				match open.pop() {
					Some((element, _)) if element == closing => {}
					Some((element, opened)) => {
						return Err(syntax_error(
							format!("expected `</{element}>` for the tag opened on line {opened}, found `</{closing}>`"),
							name,
							tag_line,
						));
					}
					None => {
						return Err(syntax_error(format!("unexpected `</{closing}>`"), name, tag_line));
					}
				}
				continue;
			}

			let self_closing = tag.ends_with('/');
			let tag = tag.strip_suffix('/').unwrap_or(tag);
			let (element, attributes) = tag
				.split_once(char::is_whitespace)
				.unwrap_or((tag, ""));

			if element.is_empty() || element.chars().any(|c| c.is_ascii_uppercase()) {
				return Err(syntax_error(
					format!("element names must be lowercase, found `<{element}>`"),
					name,
					tag_line,
				));
			}
			check_attributes(attributes, name, tag_line)?;

			if self_closing {
				continue;
			}
			if VOID_ELEMENTS.contains(&element) {
				return Err(syntax_error(format!("`<{element}>` must be self-closed"), name, tag_line));
			}
			open.push((element.to_string(), tag_line));
		}

		line += rest.matches('\n').count();
		match open.pop() {
			Some((element, opened)) => {
				Err(syntax_error(
					format!("`<{element}>` opened on line {opened} is never closed"),
					name,
					line,
				))
			}
			None => Ok(()),
		}
	}

	/// Index of the `>` ending the tag at the start of `text`, skipping
	/// quoted attribute values.
	fn tag_end(text: &str) -> Option<usize> {
		let mut quote = None;
		for (index, c) in text.char_indices().skip(1) {
			match (quote, c) {
				(Some(open), c) if c == open => quote = None,
				(Some(_), _) => {}
				(None, '"' | '\'') => quote = Some(c),
				(None, '>') => return Some(index),
				_ => {}
			}
		}
		None
	}

	fn check_attributes(attributes: &str, name: &str, line: usize) -> EngineResult<()> {
		let mut rest = attributes.trim();

		while !rest.is_empty() {
			let Some((attribute, value)) = rest.split_once('=') else {
				let attribute = rest.split_whitespace().next().unwrap_or(rest);
				return Err(syntax_error(
					format!("attribute `{attribute}` needs a value"),
					name,
					line,
				));
			};
			let attribute = attribute.trim();
			let value = value.trim_start();

			let Some(quote) = value.chars().next().filter(|c| matches!(c, '"' | '\'')) else {
				return Err(syntax_error(
					format!("the value of `{attribute}` must be quoted"),
					name,
					line,
				));
			};
			let Some(end) = value[1..].find(quote) else {
				return Err(syntax_error(
					format!("unterminated value for `{attribute}`"),
					name,
					line,
				));
			};
			rest = value[end + 2..].trim_start();
		}

		Ok(())
	}
}
