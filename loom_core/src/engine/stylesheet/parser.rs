use crate::EngineError;
use crate::EngineResult;

/// A parsed stylesheet statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
	Rule {
		selector: String,
		children: Vec<Node>,
		line: usize,
	},
	Declaration {
		name: String,
		value: String,
		line: usize,
	},
	Variable {
		name: String,
		value: String,
		guarded: bool,
		line: usize,
	},
	Comment {
		text: String,
		line: usize,
	},
	Import {
		target: String,
		line: usize,
	},
	AtRule {
		name: String,
		prelude: String,
		children: Option<Vec<Node>>,
		line: usize,
	},
}

/// Parse stylesheet `source`. `name` is only used for error locations.
pub(crate) fn parse(source: &str, name: &str) -> EngineResult<Vec<Node>> {
	let mut parser = Parser {
		chars: source.chars().collect(),
		position: 0,
		line: 1,
		name,
	};

	let nodes = parser.block(false)?;
	Ok(nodes)
}

struct Parser<'a> {
	chars: Vec<char>,
	position: usize,
	line: usize,
	name: &'a str,
}

/// What ended a chunk of statement text.
enum Terminator {
	Open,
	Semicolon,
	Close,
	End,
}

impl Parser<'_> {
	fn error(&self, detail: impl std::fmt::Display, line: usize) -> EngineError {
		EngineError::syntax(format!("{detail} (in {}:{line})", self.name))
	}

	fn peek(&self) -> Option<char> {
		self.chars.get(self.position).copied()
	}

	fn peek_next(&self) -> Option<char> {
		self.chars.get(self.position + 1).copied()
	}

	fn bump(&mut self) -> Option<char> {
		let current = self.peek()?;
		self.position += 1;
		if current == '\n' {
			self.line += 1;
		}
		Some(current)
	}

	fn skip_whitespace(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.bump();
		}
	}

	fn skip_line_comment(&mut self) {
		while self.peek().is_some_and(|c| c != '\n') {
			self.bump();
		}
	}

	fn block_comment(&mut self) -> EngineResult<String> {
		let start = self.line;
		// Opening `/*`.
		self.bump();
		self.bump();
		let mut text = String::new();
		loop {
			match self.bump() {
				Some('*') if self.peek() == Some('/') => {
					self.bump();
					return Ok(text.trim().to_string());
				}
				Some(c) => text.push(c),
				None => return Err(self.error("unterminated comment", start)),
			}
		}
	}

	/// Parse statements until `}` (when `nested`) or end of input.
	fn block(&mut self, nested: bool) -> EngineResult<Vec<Node>> {
		let mut nodes = Vec::new();

		loop {
			self.skip_whitespace();
			match (self.peek(), self.peek_next()) {
				(None, _) => {
					if nested {
						return Err(self.error("expected `}`", self.line));
					}
					return Ok(nodes);
				}
				(Some('}'), _) => {
					if !nested {
						return Err(self.error("unexpected `}`", self.line));
					}
					self.bump();
					return Ok(nodes);
				}
				(Some(';'), _) => {
					self.bump();
					continue;
				}
				(Some('/'), Some('/')) => {
					self.skip_line_comment();
					continue;
				}
				(Some('/'), Some('*')) => {
					let line = self.line;
					let text = self.block_comment()?;
					nodes.push(Node::Comment { text, line });
					continue;
				}
				_ => {}
			}

			let line = self.line;
			let (text, terminator) = self.statement_text()?;
			match terminator {
				Terminator::Open => {
					let children = self.block(true)?;
					nodes.push(self.block_node(text, children, line)?);
				}
				Terminator::Semicolon => nodes.push(self.statement_node(&text, line)?),
				Terminator::Close => {
					nodes.push(self.statement_node(&text, line)?);
					if !nested {
						return Err(self.error("unexpected `}`", self.line));
					}
					self.bump();
					return Ok(nodes);
				}
				Terminator::End => {
					if nested {
						return Err(self.error("expected `}`", self.line));
					}
					nodes.push(self.statement_node(&text, line)?);
					return Ok(nodes);
				}
			}
		}
	}

	/// Collect text up to the next top-level `{`, `;` or `}`. Strings,
	/// parentheses and `#{}` interpolation are skipped over.
	fn statement_text(&mut self) -> EngineResult<(String, Terminator)> {
		let mut text = String::new();
		let mut parens = 0usize;
		let start = self.line;

		while let Some(c) = self.peek() {
			match c {
				'"' | '\'' => {
					self.bump();
					text.push(c);
					loop {
						match self.bump() {
							Some('\\') => {
								text.push('\\');
								if let Some(escaped) = self.bump() {
									text.push(escaped);
								}
							}
							Some(inner) if inner == c => {
								text.push(inner);
								break;
							}
							Some(inner) => text.push(inner),
							None => return Err(self.error("unterminated string", start)),
						}
					}
					continue;
				}
				'#' if self.peek_next() == Some('{') => {
					self.bump();
					self.bump();
					text.push_str("#{");
					loop {
						match self.bump() {
							Some('}') => break,
							Some(inner) => text.push(inner),
							None => return Err(self.error("unterminated interpolation", start)),
						}
					}
					text.push('}');
					continue;
				}
				'(' => parens += 1,
				')' => parens = parens.saturating_sub(1),
				'/' if parens == 0 && self.peek_next() == Some('/') => {
					self.skip_line_comment();
					continue;
				}
				'/' if self.peek_next() == Some('*') => {
					self.block_comment()?;
					continue;
				}
				'{' if parens == 0 => {
					self.bump();
					return Ok((normalize(&text), Terminator::Open));
				}
				';' if parens == 0 => {
					self.bump();
					return Ok((normalize(&text), Terminator::Semicolon));
				}
				'}' if parens == 0 => return Ok((normalize(&text), Terminator::Close)),
				_ => {}
			}
			self.bump();
			text.push(c);
		}

		Ok((normalize(&text), Terminator::End))
	}

	fn block_node(&self, text: String, children: Vec<Node>, line: usize) -> EngineResult<Node> {
		if text.is_empty() {
			return Err(self.error("expected selector before `{`", line));
		}

		if let Some(rest) = text.strip_prefix('@') {
			let (name, prelude) = split_at_rule(rest);
			return Ok(Node::AtRule {
				name,
				prelude,
				children: Some(children),
				line,
			});
		}

		Ok(Node::Rule {
			selector: text,
			children,
			line,
		})
	}

	fn statement_node(&self, text: &str, line: usize) -> EngineResult<Node> {
		if let Some(rest) = text.strip_prefix('@') {
			let (name, prelude) = split_at_rule(rest);
			if name == "import" {
				return Ok(Node::Import {
					target: prelude,
					line,
				});
			}
			return Ok(Node::AtRule {
				name,
				prelude,
				children: None,
				line,
			});
		}

		if let Some(rest) = text.strip_prefix('$') {
			let Some((name, value)) = rest.split_once(':') else {
				return Err(self.error(format!("expected `:` after `${rest}`"), line));
			};
			let value = value.trim();
			let (value, guarded) = match value.strip_suffix("!default") {
				Some(value) => (value.trim_end(), true),
				None => (value, false),
			};
			if value.is_empty() {
				return Err(self.error(format!("expected a value for `${}`", name.trim()), line));
			}
			return Ok(Node::Variable {
				name: name.trim().to_string(),
				value: value.to_string(),
				guarded,
				line,
			});
		}

		// Old property syntax: `:color red`.
		if let Some(rest) = text.strip_prefix(':') {
			let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
			return self.declaration(name, value, line);
		}

		match text.split_once(':') {
			Some((name, value)) => self.declaration(name, value, line),
			None => {
				Err(self.error(
					format!("invalid CSS after \"{text}\": expected \"{{\" or \":\""),
					line,
				))
			}
		}
	}

	fn declaration(&self, name: &str, value: &str, line: usize) -> EngineResult<Node> {
		let name = name.trim();
		let value = value.trim();
		if name.is_empty() || name.contains(char::is_whitespace) {
			return Err(self.error(format!("invalid property name \"{name}\""), line));
		}
		if value.is_empty() {
			return Err(self.error(format!("expected a value for property \"{name}\""), line));
		}

		Ok(Node::Declaration {
			name: name.to_string(),
			value: value.to_string(),
			line,
		})
	}
}

fn split_at_rule(rest: &str) -> (String, String) {
	let (name, prelude) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
	(name.to_string(), prelude.trim().to_string())
}

/// Collapse runs of whitespace outside quoted strings into single spaces.
fn normalize(text: &str) -> String {
	let mut output = String::with_capacity(text.len());
	let mut quote = None;
	let mut pending_space = false;

	for c in text.chars() {
		match quote {
			Some(open) => {
				output.push(c);
				if c == open {
					quote = None;
				}
			}
			None if c.is_whitespace() => pending_space = true,
			None => {
				if pending_space && !output.is_empty() {
					output.push(' ');
				}
				pending_space = false;
				if c == '"' || c == '\'' {
					quote = Some(c);
				}
				output.push(c);
			}
		}
	}

	output
}
