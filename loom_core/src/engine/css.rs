//! CSS to nested stylesheet conversion.
//!
//! Rules sharing a selector prefix are folded into one nested rule:
//!
//! ```css
//! ul li { color: red }
//! ul li a:hover { color: blue }
//! ```
//!
//! becomes
//!
//! ```scss
//! ul {
//!   li {
//!     color: red;
//!     a {
//!       &:hover {
//!         color: blue;
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Selector lists (`a, b`) are kept whole and never nested. At-rules with a
//! block are converted recursively, statement at-rules are copied. With the
//! `old` option declarations use the `:property value` form.

use std::fmt::Write;

use crate::EngineError;
use crate::EngineOptions;
use crate::EngineResult;

const ANONYMOUS_STYLESHEET: &str = "input";
const INDENT: &str = "  ";

/// Convert CSS `input` into nested stylesheet source.
pub fn render(input: &str, options: &EngineOptions) -> EngineResult<String> {
	let name = options.str("filename").unwrap_or(ANONYMOUS_STYLESHEET);
	let items = Scanner::new(input, name).items(false)?;

	let mut output = String::new();
	let writer = Writer {
		old: options.flag("old"),
	};
	writer.items(&mut output, &items, 0);
	Ok(output)
}

#[derive(Debug)]
enum Item {
	Rule {
		selector: String,
		declarations: Vec<(String, String)>,
	},
	Statement(String),
	Block {
		prelude: String,
		items: Vec<Item>,
	},
	Comment(String),
}

struct Scanner<'a> {
	chars: Vec<char>,
	position: usize,
	line: usize,
	name: &'a str,
}

impl<'a> Scanner<'a> {
	fn new(input: &str, name: &'a str) -> Self {
		Self {
			chars: input.chars().collect(),
			position: 0,
			line: 1,
			name,
		}
	}

	fn error(&self, detail: impl std::fmt::Display) -> EngineError {
		EngineError::syntax(format!("{detail} (in {}:{})", self.name, self.line))
	}

	fn peek(&self) -> Option<char> {
		self.chars.get(self.position).copied()
	}

	fn bump(&mut self) -> Option<char> {
		let c = self.peek()?;
		self.position += 1;
		if c == '\n' {
			self.line += 1;
		}
		Some(c)
	}

	fn skip_whitespace(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.bump();
		}
	}

	fn at_comment(&self) -> bool {
		self.peek() == Some('/') && self.chars.get(self.position + 1) == Some(&'*')
	}

	fn comment(&mut self) -> EngineResult<String> {
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
				None => return Err(self.error("unterminated comment")),
			}
		}
	}

	/// Read up to (not including) one of `stops`, copying strings whole and
	/// dropping comments.
	fn text_until(&mut self, stops: &[char]) -> EngineResult<(String, Option<char>)> {
		let mut text = String::new();
		while let Some(c) = self.peek() {
			if stops.contains(&c) {
				return Ok((collapse(&text), Some(c)));
			}
			if self.at_comment() {
				self.comment()?;
				continue;
			}
			self.bump();
			text.push(c);
			if c == '"' || c == '\'' {
				loop {
					match self.bump() {
						Some('\\') => {
							text.push('\\');
							if let Some(escaped) = self.bump() {
								text.push(escaped);
							}
						}
						Some(inner) => {
							text.push(inner);
							if inner == c {
								break;
							}
						}
						None => return Err(self.error("unterminated string")),
					}
				}
			}
		}
		Ok((collapse(&text), None))
	}

	fn items(&mut self, nested: bool) -> EngineResult<Vec<Item>> {
		let mut items = Vec::new();

		loop {
			self.skip_whitespace();
			if self.at_comment() {
				let text = self.comment()?;
				items.push(Item::Comment(text));
				continue;
			}

			let (prelude, stop) = self.text_until(&['{', ';', '}'])?;
			match stop {
				None if nested => return Err(self.error("expected `}`")),
				None => {
					if !prelude.is_empty() {
						return Err(self.error(format!("expected `{{` after `{prelude}`")));
					}
					return Ok(items);
				}
				Some('}') => {
					if !nested {
						return Err(self.error("unexpected `}`"));
					}
					self.bump();
					return Ok(items);
				}
				Some(';') => {
					self.bump();
					if prelude.starts_with('@') {
						items.push(Item::Statement(prelude));
					} else if !prelude.is_empty() {
						return Err(self.error(format!("unexpected `;` after `{prelude}`")));
					}
				}
				Some(_) => {
					self.bump();
					if prelude.is_empty() {
						return Err(self.error("expected a selector before `{`"));
					}
					if is_declaration_block(&prelude) {
						let declarations = self.declarations()?;
						items.push(Item::Rule {
							selector: prelude,
							declarations,
						});
					} else if prelude.starts_with('@') {
						let inner = self.items(true)?;
						items.push(Item::Block {
							prelude,
							items: inner,
						});
					} else {
						let declarations = self.declarations()?;
						items.push(Item::Rule {
							selector: prelude,
							declarations,
						});
					}
				}
			}
		}
	}

	fn declarations(&mut self) -> EngineResult<Vec<(String, String)>> {
		let mut declarations = Vec::new();
		loop {
			self.skip_whitespace();
			let (text, stop) = self.text_until(&[';', '}'])?;
			if !text.is_empty() {
				let Some((name, value)) = text.split_once(':') else {
					return Err(self.error(format!("expected `:` in declaration `{text}`")));
				};
				declarations.push((name.trim().to_string(), value.trim().to_string()));
			}
			match stop {
				Some(';') => {
					self.bump();
				}
				Some(_) => {
					self.bump();
					return Ok(declarations);
				}
				None => return Err(self.error("expected `}`")),
			}
		}
	}
}

/// At-rules whose block holds declarations rather than rules.
fn is_declaration_block(prelude: &str) -> bool {
	["@font-face", "@page", "@viewport"]
		.iter()
		.any(|name| prelude == *name || prelude.starts_with(&format!("{name} ")))
}

fn collapse(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One level of the selector tree.
#[derive(Debug, Default)]
struct Tree {
	selector: String,
	declarations: Vec<(String, String)>,
	children: Vec<Tree>,
}

impl Tree {
	fn child(&mut self, selector: &str) -> &mut Tree {
		let index = match self.children.iter().position(|child| child.selector == selector) {
			Some(index) => index,
			None => {
				self.children.push(Tree {
					selector: selector.to_string(),
					..Tree::default()
				});
				self.children.len() - 1
			}
		};
		&mut self.children[index]
	}

	fn insert(&mut self, segments: &[String], declarations: &[(String, String)]) {
		match segments.split_first() {
			Some((first, rest)) => self.child(first).insert(rest, declarations),
			None => self.declarations.extend_from_slice(declarations),
		}
	}
}

/// Split a selector into nesting levels: whitespace separated compounds,
/// combinators attached to the compound that follows them, and pseudo
/// classes split off as `&:pseudo`.
fn segments(selector: &str) -> Vec<String> {
	if selector.contains(',') || selector.starts_with('@') {
		return vec![selector.to_string()];
	}

	let mut segments = Vec::new();
	let mut combinator: Option<&str> = None;
	for part in selector.split_whitespace() {
		if matches!(part, ">" | "+" | "~") {
			combinator = Some(part);
			continue;
		}

		let (base, pseudo) = split_pseudo(part);
		let base = match combinator.take() {
			Some(combinator) => format!("{combinator} {base}"),
			None => base.to_string(),
		};
		segments.push(base);
		if let Some(pseudo) = pseudo {
			segments.push(format!("&{pseudo}"));
		}
	}
	segments
}

fn split_pseudo(compound: &str) -> (&str, Option<&str>) {
	let mut brackets = 0usize;
	for (index, c) in compound.char_indices() {
		match c {
			'[' | '(' => brackets += 1,
			']' | ')' => brackets = brackets.saturating_sub(1),
			':' if brackets == 0 && index > 0 => {
				return (&compound[..index], Some(&compound[index..]));
			}
			_ => {}
		}
	}
	(compound, None)
}

struct Writer {
	old: bool,
}

impl Writer {
	fn items(&self, output: &mut String, items: &[Item], level: usize) {
		let mut tree = Tree::default();
		let mut first = true;

		// Consecutive rules are folded together, anything else flushes.
		for item in items {
			match item {
				Item::Rule {
					selector,
					declarations,
				} => {
					tree.insert(&segments(selector), declarations);
				}
				Item::Comment(text) => {
					self.flush(output, &mut tree, level, &mut first);
					separate(output, &mut first);
					let _ = writeln!(output, "{}/* {text} */", INDENT.repeat(level));
				}
				Item::Statement(statement) => {
					self.flush(output, &mut tree, level, &mut first);
					separate(output, &mut first);
					let _ = writeln!(output, "{}{statement};", INDENT.repeat(level));
				}
				Item::Block { prelude, items } => {
					self.flush(output, &mut tree, level, &mut first);
					separate(output, &mut first);
					let indent = INDENT.repeat(level);
					let _ = writeln!(output, "{indent}{prelude} {{");
					self.items(output, items, level + 1);
					let _ = writeln!(output, "{indent}}}");
				}
			}
		}
		self.flush(output, &mut tree, level, &mut first);
	}

	fn flush(&self, output: &mut String, tree: &mut Tree, level: usize, first: &mut bool) {
		for child in std::mem::take(&mut tree.children) {
			separate(output, first);
			self.tree(output, &child, level);
		}
	}

	fn tree(&self, output: &mut String, tree: &Tree, level: usize) {
		let indent = INDENT.repeat(level);
		let _ = writeln!(output, "{indent}{} {{", tree.selector);
		for (name, value) in &tree.declarations {
			if self.old {
				let _ = writeln!(output, "{indent}{INDENT}:{name} {value};");
			} else {
				let _ = writeln!(output, "{indent}{INDENT}{name}: {value};");
			}
		}
		for child in &tree.children {
			self.tree(output, child, level + 1);
		}
		let _ = writeln!(output, "{indent}}}");
	}
}

fn separate(output: &mut String, first: &mut bool) {
	if !*first {
		output.push('\n');
	}
	*first = false;
}
