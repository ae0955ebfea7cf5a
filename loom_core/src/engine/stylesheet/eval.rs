use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use super::parser::Node;
use super::parser::parse;
use crate::EngineError;
use crate::EngineResult;

/// A flattened output statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CssNode {
	Rule {
		selectors: Vec<String>,
		declarations: Vec<(String, String)>,
		depth: usize,
		line: usize,
		file: String,
	},
	Comment {
		text: String,
		depth: usize,
	},
	Directive(String),
	AtRule {
		rule: String,
		declarations: Vec<(String, String)>,
		children: Vec<CssNode>,
		depth: usize,
	},
}

/// At-rules whose body is re-rooted under the enclosing selectors.
const BUBBLING_AT_RULES: [&str; 3] = ["media", "supports", "document"];

pub(crate) struct Evaluator<'a> {
	load_paths: &'a [PathBuf],
	scopes: Vec<HashMap<String, String>>,
	/// `(file, line, context)` of the statements being evaluated, outermost
	/// first.
	frames: Vec<(String, usize, String)>,
	/// Files currently being imported, to detect cycles.
	importing: Vec<PathBuf>,
	pub(crate) dependencies: Vec<PathBuf>,
}

/// Where declarations of the statement being evaluated end up.
#[derive(Clone, Copy)]
enum Target {
	None,
	Index(usize),
}

struct Context<'p> {
	parents: &'p [String],
	depth: usize,
	file: &'p str,
	directory: Option<&'p Path>,
}

impl<'a> Evaluator<'a> {
	pub(crate) fn new(load_paths: &'a [PathBuf]) -> Self {
		Self {
			load_paths,
			scopes: vec![HashMap::new()],
			frames: Vec::new(),
			importing: Vec::new(),
			dependencies: Vec::new(),
		}
	}

	/// Evaluate a parsed document into flat output nodes.
	pub(crate) fn evaluate(
		&mut self,
		nodes: &[Node],
		file: &str,
		directory: Option<&Path>,
	) -> EngineResult<Vec<CssNode>> {
		let mut output = Vec::new();
		let context = Context {
			parents: &[],
			depth: 0,
			file,
			directory,
		};
		self.visit(nodes, &context, Target::None, &mut output)?;
		Ok(output)
	}

	fn visit(
		&mut self,
		nodes: &[Node],
		context: &Context<'_>,
		target: Target,
		output: &mut Vec<CssNode>,
	) -> EngineResult<()> {
		for node in nodes {
			match node {
				Node::Comment { text, .. } => {
					output.push(CssNode::Comment {
						text: text.clone(),
						depth: context.depth,
					});
				}
				Node::Variable {
					name,
					value,
					guarded,
					line,
				} => {
					if *guarded && self.lookup(name).is_some() {
						continue;
					}
					let value = self.value(value, context.file, *line)?;
					self.assign(name, value);
				}
				Node::Declaration { name, value, line } => {
					let Target::Index(index) = target else {
						return Err(EngineError::syntax(format!(
							"properties are only allowed within rules (in {}:{line})",
							context.file
						)));
					};
					let name = self.interpolate(name, context.file, *line)?;
					let value = self.value(value, context.file, *line)?;
					push_declaration(&mut output[index], name, value);
				}
				Node::Rule {
					selector,
					children,
					line,
				} => self.rule(selector, children, *line, context, output)?,
				Node::Import { target: import, line } => {
					self.import(import, *line, context, target, output)?;
				}
				Node::AtRule {
					name,
					prelude,
					children,
					line,
				} => {
					let prelude = self.interpolate(prelude, context.file, *line)?;
					let rule = if prelude.is_empty() {
						format!("@{name}")
					} else {
						format!("@{name} {prelude}")
					};
					match children {
						None => output.push(CssNode::Directive(format!("{rule};"))),
						Some(children) => self.at_rule(name, rule, children, context, output)?,
					}
				}
			}
		}

		Ok(())
	}

	fn rule(
		&mut self,
		selector: &str,
		children: &[Node],
		line: usize,
		context: &Context<'_>,
		output: &mut Vec<CssNode>,
	) -> EngineResult<()> {
		let selector = self.interpolate(selector, context.file, line)?;
		let selectors = resolve_selectors(context.parents, &selector);
		let index = output.len();
		output.push(CssNode::Rule {
			selectors: selectors.clone(),
			declarations: Vec::new(),
			depth: context.depth,
			line,
			file: context.file.to_string(),
		});

		let nested = Context {
			parents: &selectors,
			depth: context.depth + 1,
			file: context.file,
			directory: context.directory,
		};
		self.frames
			.push((context.file.to_string(), line, selectors.join(", ")));
		self.scopes.push(HashMap::new());
		let result = self.visit(children, &nested, Target::Index(index), output);
		self.scopes.pop();
		self.frames.pop();
		result
	}

	fn at_rule(
		&mut self,
		name: &str,
		rule: String,
		children: &[Node],
		context: &Context<'_>,
		output: &mut Vec<CssNode>,
	) -> EngineResult<()> {
		let mut inner = Vec::new();
		let mut declarations = Vec::new();
		let bubbles = BUBBLING_AT_RULES.contains(&name);

		self.scopes.push(HashMap::new());
		let result = if bubbles && !context.parents.is_empty() {
			inner.push(CssNode::Rule {
				selectors: context.parents.to_vec(),
				declarations: Vec::new(),
				depth: 0,
				line: 0,
				file: context.file.to_string(),
			});
			let nested = Context {
				parents: context.parents,
				depth: 1,
				file: context.file,
				directory: context.directory,
			};
			self.visit(children, &nested, Target::Index(0), &mut inner)
		} else {
			let nested = Context {
				parents: if bubbles { context.parents } else { &[] },
				depth: 0,
				file: context.file,
				directory: context.directory,
			};
			// Declarations directly inside `@font-face` and friends belong to
			// the at-rule itself.
			inner.push(CssNode::Rule {
				selectors: Vec::new(),
				declarations: Vec::new(),
				depth: 0,
				line: 0,
				file: context.file.to_string(),
			});
			let visited = self.visit(children, &nested, Target::Index(0), &mut inner);
			if let CssNode::Rule {
				declarations: own, ..
			} = inner.remove(0)
			{
				declarations = own;
			}
			visited
		};
		self.scopes.pop();
		result?;

		output.push(CssNode::AtRule {
			rule,
			declarations,
			children: inner,
			depth: context.depth,
		});
		Ok(())
	}

	fn import(
		&mut self,
		import: &str,
		line: usize,
		context: &Context<'_>,
		target: Target,
		output: &mut Vec<CssNode>,
	) -> EngineResult<()> {
		let import = import.trim();
		let name = import.trim_matches(|c| c == '"' || c == '\'');
		if is_plain_css_import(import, name) {
			output.push(CssNode::Directive(format!("@import {import};")));
			return Ok(());
		}

		let Some(path) = self.find_import(name, context.directory) else {
			return Err(EngineError::syntax(format!(
				"file to import not found or unreadable: {name} (in {}:{line})",
				context.file
			)));
		};

		if self.importing.contains(&path) {
			return Err(EngineError::syntax(format!(
				"import loop through {} (in {}:{line})",
				path.display(),
				context.file
			)));
		}

		let source = std::fs::read_to_string(&path).map_err(|error| {
			EngineError::syntax(format!(
				"file to import not found or unreadable: {name}: {error} (in {}:{line})",
				context.file
			))
		})?;
		tracing::debug!(import = %path.display(), "resolved stylesheet import");

		let file = path.display().to_string();
		let nodes = parse(&source, &file)?;
		let directory = path.parent().map(Path::to_path_buf);
		self.dependencies.push(path.clone());
		self.importing.push(path);

		let imported = Context {
			parents: context.parents,
			depth: context.depth,
			file: &file,
			directory: directory.as_deref(),
		};
		let result = self.visit(&nodes, &imported, target, output);
		self.importing.pop();
		result
	}

	fn find_import(&self, name: &str, directory: Option<&Path>) -> Option<PathBuf> {
		let requested = Path::new(name);
		let file_name = requested.file_name()?.to_string_lossy().to_string();
		let mut candidates = vec![file_name.clone()];
		if requested.extension().is_none() {
			candidates.push(format!("{file_name}.scss"));
			candidates.push(format!("_{file_name}.scss"));
		}

		directory
			.into_iter()
			.chain(self.load_paths.iter().map(PathBuf::as_path))
			.flat_map(|base| {
				let base = match requested.parent() {
					Some(parent) => base.join(parent),
					None => base.to_path_buf(),
				};
				candidates
					.iter()
					.map(move |candidate| base.join(candidate))
			})
			.find(|candidate| candidate.is_file())
	}

	fn lookup(&self, name: &str) -> Option<&String> {
		self.scopes.iter().rev().find_map(|scope| scope.get(name))
	}

	/// Assign to the nearest scope that already defines `name`, otherwise
	/// define it in the innermost scope.
	fn assign(&mut self, name: &str, value: String) {
		let scope = self
			.scopes
			.iter()
			.rposition(|scope| scope.contains_key(name))
			.unwrap_or(self.scopes.len() - 1);
		self.scopes[scope].insert(name.to_string(), value);
	}

	/// Substitute variables and interpolation, then fold arithmetic.
	pub(crate) fn value(&self, text: &str, file: &str, line: usize) -> EngineResult<String> {
		let substituted = self.substitute(text, file, line, true)?;
		fold_arithmetic(&substituted).map_err(|message| self.runtime_error(message, file, line))
	}

	/// Substitute `#{}` interpolation only.
	fn interpolate(&self, text: &str, file: &str, line: usize) -> EngineResult<String> {
		self.substitute(text, file, line, false)
	}

	fn substitute(
		&self,
		text: &str,
		file: &str,
		line: usize,
		variables: bool,
	) -> EngineResult<String> {
		let mut output = String::with_capacity(text.len());
		let mut rest = text;

		while let Some(c) = rest.chars().next() {
			if let Some(inner) = rest.strip_prefix("#{") {
				let end = inner.find('}').unwrap_or(inner.len());
				let expression = &inner[..end];
				let value = self.value(expression.trim(), file, line)?;
				output.push_str(value.trim_matches('"'));
				rest = inner.get(end + 1..).unwrap_or("");
				continue;
			}

			if variables && c == '$' {
				let name: String = rest[1..]
					.chars()
					.take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
					.collect();
				if !name.is_empty() {
					let Some(value) = self.lookup(&name) else {
						return Err(
							self.runtime_error(format!("undefined variable: \"${name}\""), file, line)
						);
					};
					output.push_str(value);
					rest = &rest[1 + name.len()..];
					continue;
				}
			}

			output.push(c);
			rest = &rest[c.len_utf8()..];
		}

		Ok(output)
	}

	fn runtime_error(&self, message: impl Into<String>, file: &str, line: usize) -> EngineError {
		let mut backtrace = vec![format!("{file}:{line}")];
		backtrace.extend(
			self.frames
				.iter()
				.rev()
				.map(|(file, line, context)| format!("{file}:{line}:in '{context}'")),
		);
		EngineError::runtime(message, backtrace).with_filename(file)
	}
}

fn push_declaration(node: &mut CssNode, name: String, value: String) {
	if let CssNode::Rule { declarations, .. } = node {
		declarations.push((name, value));
	}
}

fn is_plain_css_import(raw: &str, name: &str) -> bool {
	raw.starts_with("url(")
		|| Path::new(name)
			.extension()
			.is_some_and(|extension| extension == "css")
		|| name.starts_with("http://")
		|| name.starts_with("https://")
		|| raw.contains(' ')
}

/// Combine each comma-separated part of `selector` with every parent.
pub(crate) fn resolve_selectors(parents: &[String], selector: &str) -> Vec<String> {
	let parts = selector
		.split(',')
		.map(str::trim)
		.filter(|part| !part.is_empty());

	if parents.is_empty() {
		return parts.map(|part| part.replace('&', "")).collect();
	}

	parts
		.flat_map(|part| {
			parents.iter().map(move |parent| {
				if part.contains('&') {
					part.replace('&', parent)
				} else {
					format!("{parent} {part}")
				}
			})
		})
		.collect()
}

/// A number with an optional unit, e.g. `10px`.
#[derive(Debug, Clone, PartialEq)]
struct Number {
	value: f64,
	unit: String,
}

impl Number {
	fn parse(token: &str) -> Option<Self> {
		let split = token
			.char_indices()
			.find(|(index, c)| !(c.is_ascii_digit() || *c == '.' || (*index == 0 && *c == '-')))
			.map_or(token.len(), |(index, _)| index);
		let (digits, unit) = token.split_at(split);
		if !digits.chars().any(|c| c.is_ascii_digit()) {
			return None;
		}
		if !unit.chars().all(|c| c.is_ascii_alphabetic() || c == '%') {
			return None;
		}

		Some(Self {
			value: digits.parse().ok()?,
			unit: unit.to_string(),
		})
	}

	fn apply(&self, operator: &str, other: &Self) -> Result<Self, String> {
		let unit = match (self.unit.as_str(), other.unit.as_str()) {
			(left, right) if left == right => left.to_string(),
			("", right) => right.to_string(),
			(left, "") => left.to_string(),
			(left, right) => return Err(format!("incompatible units: '{left}' and '{right}'")),
		};

		let value = match operator {
			"+" => self.value + other.value,
			"-" => self.value - other.value,
			"*" => self.value * other.value,
			_ => unreachable!("only arithmetic operators are folded"),
		};

		Ok(Self { value, unit })
	}
}

impl std::fmt::Display for Number {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let rounded = (self.value * 100_000.0).round() / 100_000.0;
		let mut text = format!("{rounded:.5}");
		while text.ends_with('0') {
			text.pop();
		}
		if text.ends_with('.') {
			text.pop();
		}
		if text == "-0" {
			text = "0".to_string();
		}
		write!(f, "{text}{}", self.unit)
	}
}

/// Fold `NUMBER OP NUMBER` runs separated by spaces, left to right.
pub(crate) fn fold_arithmetic(value: &str) -> Result<String, String> {
	if !value.contains(" + ") && !value.contains(" - ") && !value.contains(" * ") {
		return Ok(value.to_string());
	}

	let tokens: Vec<&str> = value.split(' ').collect();
	let mut output: Vec<String> = Vec::new();
	let mut index = 0;

	while index < tokens.len() {
		let Some(mut accumulator) = Number::parse(tokens[index]) else {
			output.push(tokens[index].to_string());
			index += 1;
			continue;
		};

		while index + 2 < tokens.len() && matches!(tokens[index + 1], "+" | "-" | "*") {
			let Some(operand) = Number::parse(tokens[index + 2]) else {
				break;
			};
			accumulator = accumulator.apply(tokens[index + 1], &operand)?;
			index += 2;
		}

		output.push(accumulator.to_string());
		index += 1;
	}

	Ok(output.join(" "))
}
