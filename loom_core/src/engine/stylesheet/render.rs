use std::fmt::Write;

use super::OutputStyle;
use super::eval::CssNode;

pub(crate) fn render(nodes: &[CssNode], style: OutputStyle, line_numbers: bool) -> String {
	let mut output = String::new();
	let mut renderer = Renderer {
		style,
		line_numbers: line_numbers && style != OutputStyle::Compressed,
		output: &mut output,
		first: true,
	};
	renderer.nodes(nodes, 0);

	if !output.is_empty() && !output.ends_with('\n') {
		output.push('\n');
	}
	output
}

struct Renderer<'a> {
	style: OutputStyle,
	line_numbers: bool,
	output: &'a mut String,
	first: bool,
}

impl Renderer<'_> {
	fn nodes(&mut self, nodes: &[CssNode], base: usize) {
		for node in nodes {
			match node {
				CssNode::Rule {
					selectors,
					declarations,
					depth,
					line,
					file,
				} => {
					if declarations.is_empty() || selectors.is_empty() {
						continue;
					}
					self.separate(*depth);
					if self.line_numbers && *line > 0 {
						let indent = self.indent(base + depth);
						let _ = writeln!(self.output, "{indent}/* line {line}, {file} */");
					}
					self.rule(selectors, declarations, base + depth);
				}
				CssNode::Comment { text, depth } => {
					if self.style == OutputStyle::Compressed {
						continue;
					}
					self.separate(*depth);
					let indent = self.indent(base + depth);
					let _ = writeln!(self.output, "{indent}/* {text} */");
				}
				CssNode::Directive(directive) => {
					self.separate(0);
					self.output.push_str(directive);
					if self.style != OutputStyle::Compressed {
						self.output.push('\n');
					}
				}
				CssNode::AtRule {
					rule,
					declarations,
					children,
					depth,
				} => {
					if declarations.is_empty() && !has_output(children) {
						continue;
					}
					self.separate(*depth);
					self.at_rule(rule, declarations, children, base + depth);
				}
			}
			self.first = false;
		}
	}

	/// Blank line before each top-level group, except in compressed output.
	fn separate(&mut self, depth: usize) {
		if !self.first && depth == 0 && self.style != OutputStyle::Compressed {
			self.output.push('\n');
		}
	}

	fn indent(&self, level: usize) -> String {
		match self.style {
			OutputStyle::Nested => "  ".repeat(level),
			_ => String::new(),
		}
	}

	fn rule(&mut self, selectors: &[String], declarations: &[(String, String)], level: usize) {
		let indent = self.indent(level);
		match self.style {
			OutputStyle::Nested => {
				let _ = write!(self.output, "{indent}{} {{", selectors.join(", "));
				for (name, value) in declarations {
					let _ = write!(self.output, "\n{indent}  {name}: {value};");
				}
				self.output.push_str(" }\n");
			}
			OutputStyle::Expanded => {
				let _ = writeln!(self.output, "{} {{", selectors.join(", "));
				for (name, value) in declarations {
					let _ = writeln!(self.output, "  {name}: {value};");
				}
				self.output.push_str("}\n");
			}
			OutputStyle::Compact => {
				let _ = write!(self.output, "{} {{", selectors.join(", "));
				for (name, value) in declarations {
					let _ = write!(self.output, " {name}: {value};");
				}
				self.output.push_str(" }\n");
			}
			OutputStyle::Compressed => {
				self.output.push_str(&compress_selectors(selectors));
				self.output.push('{');
				let body = declarations
					.iter()
					.map(|(name, value)| format!("{name}:{}", compress_value(value)))
					.collect::<Vec<_>>()
					.join(";");
				self.output.push_str(&body);
				self.output.push('}');
			}
		}
	}

	fn at_rule(
		&mut self,
		rule: &str,
		declarations: &[(String, String)],
		children: &[CssNode],
		level: usize,
	) {
		let mut inner = String::new();
		let mut nested = Renderer {
			style: self.style,
			line_numbers: self.line_numbers,
			output: &mut inner,
			first: true,
		};
		if !declarations.is_empty() {
			nested.declarations_only(declarations, level + 1);
			nested.first = false;
		}
		nested.nodes(children, level + 1);

		let indent = self.indent(level);
		match self.style {
			OutputStyle::Compressed => {
				let _ = write!(self.output, "{}{{{inner}}}", compress_value(rule));
			}
			OutputStyle::Nested => {
				let _ = write!(self.output, "{indent}{rule} {{\n{}", inner.trim_end());
				self.output.push_str(" }\n");
			}
			OutputStyle::Expanded | OutputStyle::Compact => {
				let _ = writeln!(self.output, "{rule} {{");
				for line in inner.trim_end().lines() {
					if line.is_empty() {
						self.output.push('\n');
					} else {
						let _ = writeln!(self.output, "  {line}");
					}
				}
				self.output.push_str("}\n");
			}
		}
	}

	fn declarations_only(&mut self, declarations: &[(String, String)], level: usize) {
		let indent = self.indent(level);
		match self.style {
			OutputStyle::Compressed => {
				let body = declarations
					.iter()
					.map(|(name, value)| format!("{name}:{}", compress_value(value)))
					.collect::<Vec<_>>()
					.join(";");
				self.output.push_str(&body);
			}
			_ => {
				for (name, value) in declarations {
					let _ = writeln!(self.output, "{indent}{name}: {value};");
				}
			}
		}
	}
}

fn has_output(nodes: &[CssNode]) -> bool {
	nodes.iter().any(|node| {
		match node {
			CssNode::Rule {
				selectors,
				declarations,
				..
			} => !selectors.is_empty() && !declarations.is_empty(),
			CssNode::Comment { .. } | CssNode::Directive(_) => true,
			CssNode::AtRule {
				declarations,
				children,
				..
			} => !declarations.is_empty() || has_output(children),
		}
	})
}

fn compress_selectors(selectors: &[String]) -> String {
	selectors
		.iter()
		.map(|selector| {
			selector
				.replace(" > ", ">")
				.replace(" + ", "+")
				.replace(" ~ ", "~")
		})
		.collect::<Vec<_>>()
		.join(",")
}

/// Drop the optional whitespace around commas and colons in a value.
fn compress_value(value: &str) -> String {
	value.replace(", ", ",").replace(": ", ":")
}
