use std::path::Path;
use std::path::PathBuf;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::*;
use crate::engine::css;
use crate::engine::html;
use crate::engine::stylesheet::Compiler;
use crate::engine::stylesheet::OutputStyle;
use crate::engine::stylesheet::Repl;
use crate::engine::stylesheet::StyleOptions;
use crate::engine::template;
use crate::engine::template::TemplateContext;
use crate::error::first_integer_after_colon;

fn compiler(style: OutputStyle) -> Compiler {
	Compiler::new(StyleOptions {
		style,
		line_numbers: false,
		load_paths: Vec::new(),
		cache_location: None,
	})
}

fn write(path: &Path, content: &str) -> AnyEmptyResult {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent)?;
	}
	std::fs::write(path, content)?;
	Ok(())
}

/// Records every event as a short `kind path` line.
#[derive(Debug, Default)]
struct Recorder {
	events: Vec<String>,
}

impl WatchObserver for Recorder {
	fn on_event(&mut self, event: &WatchEvent) {
		let line = match event {
			WatchEvent::TemplateModified(path) => format!("modified {}", path.display()),
			WatchEvent::TemplateCreated(path) => format!("new {}", path.display()),
			WatchEvent::TemplateDeleted(path) => format!("deleted {}", path.display()),
			WatchEvent::StylesheetOverwritten(path) => format!("overwrite {}", path.display()),
			WatchEvent::StylesheetCreated(path) => format!("create {}", path.display()),
			WatchEvent::StylesheetDeleted(path) => format!("delete {}", path.display()),
			WatchEvent::DirectoryCreated(path) => format!("directory {}", path.display()),
			WatchEvent::CompilationError { source, .. } => format!("error {}", source.display()),
		};
		self.events.push(line);
	}
}

impl Recorder {
	fn count(&self, prefix: &str) -> usize {
		self.events
			.iter()
			.filter(|event| event.starts_with(prefix))
			.count()
	}
}

#[rstest]
#[case::message("Invalid CSS after \"a\": expected \"{\" (in style.scss:12)", Some(12))]
#[case::skips_non_numeric_colons("error: on style.scss:7: bad", Some(7))]
#[case::no_colon("broken stylesheet", None)]
#[case::colon_without_number("broken: stylesheet", None)]
fn extracts_line_after_colon(#[case] text: &str, #[case] expected: Option<usize>) {
	assert_eq!(first_integer_after_colon(text), expected);
}

#[test]
fn syntax_errors_read_the_line_from_the_message() {
	let error = EngineError::syntax("expected `}` (in style.scss:3)");
	assert_eq!(error.source_line(), Some(3));
	assert_eq!(
		error.summary(),
		"Syntax error on line 3: expected `}` (in style.scss:3)"
	);
}

#[test]
fn runtime_errors_read_the_line_from_the_first_frame() {
	let error = EngineError::runtime(
		"undefined variable: \"$x\"",
		vec!["style.scss:9".into(), "style.scss:8:in 'a'".into()],
	);
	assert_eq!(error.source_line(), Some(9));
	assert_eq!(error.summary(), "Error on line 9: undefined variable: \"$x\"");
}

#[test]
fn unknown_lines_render_as_question_marks() {
	let error = EngineError::runtime("boom", Vec::new());
	assert_eq!(error.source_line(), None);
	assert_eq!(error.summary(), "Error on line ??: boom");
}

#[test]
fn missing_dependency_summary() {
	let error = LoomError::from(EngineError::missing_dependency("xhtml", "not built"));
	assert_eq!(error.summary(), "Required dependency xhtml not found!");
	assert!(!error.is_usage());
}

#[test]
fn open_endpoint_without_path_is_none() -> AnyEmptyResult {
	assert!(open_endpoint(None, OpenMode::Read, false)?.is_none());
	assert!(open_endpoint(None, OpenMode::Write, true)?.is_none());
	Ok(())
}

#[test]
fn open_endpoint_reads_exact_bytes() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("input.scss");
	std::fs::write(&path, "a {\r\n  color: red; }\n")?;

	let mut endpoint = open_endpoint(Some(&path), OpenMode::Read, false)?.ok_or("no endpoint")?;
	assert!(endpoint.is_file());
	assert_eq!(endpoint.path(), Some(path.as_path()));
	assert_eq!(endpoint.read_to_string()?, "a {\r\n  color: red; }\n");
	Ok(())
}

#[test]
fn open_endpoint_reports_the_missing_path() {
	let result = open_endpoint(Some(Path::new("missing/input.scss")), OpenMode::Read, false);
	let Err(LoomError::Io { path, .. }) = result else {
		panic!("expected an io error");
	};
	assert_eq!(path, PathBuf::from("missing/input.scss"));
}

#[test]
fn standard_endpoints_refuse_the_wrong_direction() {
	use std::io::Read;
	use std::io::Write;

	let mut buf = [0_u8; 4];
	let error = Endpoint::stdout().read(&mut buf).expect_err("stdout is write only");
	assert_eq!(error.kind(), std::io::ErrorKind::Unsupported);
	let error = Endpoint::stdin().write(b"a").expect_err("stdin is read only");
	assert_eq!(error.kind(), std::io::ErrorKind::Unsupported);
}

#[test]
fn unix_newlines_write_bytes_unchanged() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("output.css");

	let mut endpoint = open_endpoint(Some(&path), OpenMode::Write, true)?.ok_or("no endpoint")?;
	endpoint.write_text("a {}\nb {}\n")?;
	assert_eq!(endpoint.close()?, None);
	assert_eq!(std::fs::read(&path)?, b"a {}\nb {}\n");
	Ok(())
}

#[test]
fn buffers_keep_their_content_after_close() -> AnyEmptyResult {
	let mut endpoint = Endpoint::buffer();
	endpoint.write_text("discarded")?;
	assert_eq!(endpoint.close()?, Some(b"discarded".to_vec()));
	Ok(())
}

#[rstest]
#[case::pair("src:dst", Location::Pair { source: "src".into(), destination: "dst".into() })]
#[case::single("style.scss", Location::Single("style.scss".into()))]
#[case::splits_once("a:b:c", Location::Pair { source: "a".into(), destination: "b:c".into() })]
#[case::drive_single(r"C:\site\a.scss", Location::Single(r"C:\site\a.scss".into()))]
#[case::drive_pair(
	r"C:\site\a.scss:D:\out\a.css",
	Location::Pair { source: r"C:\site\a.scss".into(), destination: r"D:\out\a.css".into() }
)]
#[case::drive_forward_slash("c:/site/a.scss", Location::Single("c:/site/a.scss".into()))]
fn parses_locations(#[case] arg: &str, #[case] expected: Location) {
	assert_eq!(parse_location(arg), expected);
	assert_eq!(parse_location(arg), parse_location(arg));
}

#[test]
fn file_mappings_default_to_css_destinations() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let source = tmp.path().join("site.scss");
	write(&source, "a { color: red; }")?;
	let styles = tmp.path().join("styles");
	std::fs::create_dir(&styles)?;

	let mappings = PathMapping::from_args(&[
		source.display().to_string(),
		styles.display().to_string(),
	]);

	assert_eq!(mappings.len(), 2);
	assert!(mappings[0].is_directory());
	assert_eq!(mappings[0].destination, styles);
	assert_eq!(mappings[1].kind, MappingKind::File);
	assert_eq!(mappings[1].destination, tmp.path().join("site.css"));
	assert_eq!(
		mappings[0].destination_for(&styles.join("nested/theme.scss")),
		styles.join("nested/theme.css")
	);
	Ok(())
}

#[test]
fn watch_args_suggest_colon_notation() {
	let error = validate_watch_args("loomss", "--watch", &["a.scss", "missing/out.css"])
		.expect_err("second argument does not exist");
	assert_eq!(
		error.to_string(),
		"File missing/out.css doesn't exist.\n    Did you mean: loomss --watch a.scss:missing/out.css"
	);
	assert!(error.is_usage());
}

#[test]
fn watch_args_reject_css_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let output = tmp.path().join("out.css");
	write(&output, "")?;
	let output = output.display().to_string();

	let error = validate_watch_args("loomss", "--update", &["a.scss", output.as_str()])
		.expect_err("second argument is a css file");
	assert!(error.to_string().starts_with(&format!("File {output} is a CSS file.")));

	assert!(validate_watch_args("loomss", "--update", &["a.scss:b.css", output.as_str()]).is_ok());
	assert!(validate_watch_args("loomss", "--update", &["a.scss"]).is_ok());
	Ok(())
}

#[rstest]
#[case::nested(OutputStyle::Nested, "a {\n  color: red; }\n")]
#[case::expanded(OutputStyle::Expanded, "a {\n  color: red;\n}\n")]
#[case::compact(OutputStyle::Compact, "a { color: red; }\n")]
#[case::compressed(OutputStyle::Compressed, "a{color:red}\n")]
fn compiles_output_styles(#[case] style: OutputStyle, #[case] expected: &str) -> AnyEmptyResult {
	let css = compiler(style).compile_str("a { color: red; }", None)?;
	assert_eq!(css, expected);
	Ok(())
}

#[test]
fn compiles_nesting_variables_and_arithmetic() -> AnyEmptyResult {
	let source = "$gap: 4px;\nnav {\n  margin: $gap * 2;\n  a {\n    &:hover { color: red; }\n    padding: $gap + 1px;\n  }\n}\n";
	let css = compiler(OutputStyle::Expanded).compile_str(source, None)?;
	assert_eq!(
		css,
		"nav {\n  margin: 8px;\n}\nnav a {\n  padding: 5px;\n}\nnav a:hover {\n  color: red;\n}\n"
	);
	Ok(())
}

#[test]
fn line_number_comments_name_the_source() -> AnyEmptyResult {
	let compiler = Compiler::new(StyleOptions {
		style: OutputStyle::Expanded,
		line_numbers: true,
		load_paths: Vec::new(),
		cache_location: None,
	});
	let css = compiler.compile_str("\na { color: red; }", Some("site.scss"))?;
	assert_eq!(css, "/* line 2, site.scss */\na {\n  color: red;\n}\n");
	Ok(())
}

#[test]
fn malformed_stylesheets_are_syntax_errors() {
	let error = compiler(OutputStyle::Nested)
		.compile_str("a {\n  color: red;\n", Some("site.scss"))
		.expect_err("missing closing brace");
	assert!(error.is_syntax());
	assert_eq!(error.source_line(), Some(3));
	assert_eq!(error.filename.as_deref(), Some("site.scss"));
}

#[test]
fn incompatible_units_are_runtime_errors() {
	let error = compiler(OutputStyle::Nested)
		.compile_str("a {\n  width: 1px + 1em;\n}\n", None)
		.expect_err("incompatible units");
	assert!(!error.is_syntax());
	assert_eq!(error.source_line(), Some(2));
	assert_eq!(
		error.summary(),
		"Error on line 2: incompatible units: 'px' and 'em'"
	);
}

#[test]
fn imports_resolve_partials_next_to_the_source() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("_colors.scss"), "$brand: teal;")?;
	let source = tmp.path().join("site.scss");
	write(&source, "@import \"colors\";\na { color: $brand; }")?;

	let compiled = compiler(OutputStyle::Compressed).compile_file(&source)?;
	assert_eq!(compiled.css, "a{color:teal}\n");
	assert_eq!(compiled.dependencies, vec![
		PathBuf::from(source.display().to_string()),
		tmp.path().join("_colors.scss"),
	]);
	Ok(())
}

#[test]
#[traced_test]
fn compile_cache_reuses_fresh_entries() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let source = tmp.path().join("site.scss");
	write(&source, "a { color: red; }")?;
	let compiler = Compiler::new(StyleOptions {
		style: OutputStyle::Compressed,
		line_numbers: false,
		load_paths: Vec::new(),
		cache_location: Some(tmp.path().join("cache")),
	});

	assert_eq!(compiler.compile_file(&source)?.css, "a{color:red}\n");
	assert!(!logs_contain("compile cache hit"));
	assert_eq!(compiler.compile_file(&source)?.css, "a{color:red}\n");
	assert!(logs_contain("compile cache hit"));

	write(&source, "a { color: blue; }")?;
	assert_eq!(compiler.compile_file(&source)?.css, "a{color:blue}\n");
	Ok(())
}

#[test]
fn stylesheet_round_trips_through_the_css_converter() -> AnyEmptyResult {
	let compiler = compiler(OutputStyle::Expanded);
	let original = compiler.compile_str(
		"ul { margin: 0; li { color: red; a { &:hover { color: blue; } } } }\nh1, h2 { font-weight: bold; }",
		None,
	)?;

	let nested = css::render(&original, &EngineOptions::new())?;
	let recompiled = compiler.compile_str(&nested, None)?;
	assert_eq!(recompiled, original);
	Ok(())
}

#[test]
fn css_converter_nests_selectors() -> AnyEmptyResult {
	let nested = css::render(
		"ul li { color: red }\nul li a:hover { color: blue }\n",
		&EngineOptions::new(),
	)?;
	assert_eq!(
		nested,
		"ul {\n  li {\n    color: red;\n    a {\n      &:hover {\n        color: blue;\n      }\n    }\n  }\n}\n"
	);
	Ok(())
}

#[test]
fn css_converter_old_property_syntax() -> AnyEmptyResult {
	let mut options = EngineOptions::new();
	options.set("old", true);
	let nested = css::render("a, b { color: red; }\n@import url(base.css);", &options)?;
	assert_eq!(nested, "a, b {\n  :color red;\n}\n\n@import url(base.css);\n");

	let css = compiler(OutputStyle::Compact).compile_str(&nested, None)?;
	assert_eq!(css, "a, b { color: red; }\n\n@import url(base.css);\n");
	Ok(())
}

#[test]
fn css_converter_reports_unbalanced_braces() {
	let error = css::render("a { color: red;\n", &EngineOptions::new()).expect_err("unbalanced");
	assert!(error.is_syntax());
	assert_eq!(error.source_line(), Some(2));
}

#[test]
fn interactive_evaluator_binds_variables() -> AnyEmptyResult {
	let mut repl = Repl::new();
	assert_eq!(repl.eval("$width: 10px")?, "10px");
	assert_eq!(repl.eval("$width * 2")?, "20px");
	assert_eq!(repl.eval("#{$width}-wide")?, "10px-wide");
	assert!(repl.eval("$missing").is_err());
	assert_eq!(repl.eval("$width + 1px")?, "11px");
	Ok(())
}

fn context(entries: &[(&str, serde_json::Value)]) -> TemplateContext {
	entries
		.iter()
		.map(|(key, value)| ((*key).to_string(), value.clone()))
		.collect()
}

#[test]
fn renders_templates() -> AnyEmptyResult {
	let output = template::compile(
		"<p>Hello {{ name }}!</p>\n",
		None,
		&EngineOptions::new(),
		&context(&[("name", "World".into())]),
	)?;
	assert_eq!(output, "<p>Hello World!</p>\n");
	Ok(())
}

#[rstest]
#[case::indented("indented", "yes\n")]
#[case::ugly("ugly", "\nyes\n\n")]
fn template_style_controls_block_whitespace(
	#[case] style: &str,
	#[case] expected: &str,
) -> AnyEmptyResult {
	let mut options = EngineOptions::new();
	options.set("style", style);
	let output = template::compile(
		"{% if true %}\nyes\n{% endif %}\n",
		None,
		&options,
		&TemplateContext::new(),
	)?;
	assert_eq!(output, expected);
	Ok(())
}

#[rstest]
#[case::html5("html5", "<!DOCTYPE html>")]
#[case::html4(
	"html4",
	r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#
)]
fn template_format_selects_doctype(#[case] format: &str, #[case] expected: &str) -> AnyEmptyResult {
	let mut options = EngineOptions::new();
	options.set("format", format);
	let output = template::compile("{{ doctype() }}", None, &options, &TemplateContext::new())?;
	assert_eq!(output, expected);
	Ok(())
}

#[test]
fn template_rejects_unknown_formats() {
	let mut options = EngineOptions::new();
	options.set("format", "xml");
	let error = template::compile("", None, &options, &TemplateContext::new())
		.expect_err("unknown format");
	assert!(!error.is_syntax());
}

#[test]
fn template_escaping_and_attribute_quotes() -> AnyEmptyResult {
	let mut options = EngineOptions::new();
	options.set("escape_html", true);
	let data = context(&[("title", "<b>".into())]);

	let output = template::compile(
		"<a{{ attr('title', title) }}>{{ title }}</a>",
		None,
		&options,
		&data,
	)?;
	assert_eq!(output, "<a title='&lt;b>'>&lt;b&gt;</a>");

	options.set("attr_wrapper", "\"");
	let output = template::compile("<a{{ attr('href', '/') }}>", None, &options, &data)?;
	assert_eq!(output, "<a href=\"/\">");
	Ok(())
}

#[test]
fn template_syntax_errors_carry_the_line() {
	let error = template::compile(
		"<p>\n{% if %}\n</p>",
		Some("page.loom"),
		&EngineOptions::new(),
		&TemplateContext::new(),
	)
	.expect_err("malformed tag");
	assert!(error.is_syntax());
	assert_eq!(error.source_line(), Some(2));
	assert_eq!(error.filename.as_deref(), Some("page.loom"));
}

#[test]
fn template_undefined_variables_are_runtime_errors() {
	let error = template::compile(
		"{{ missing }}",
		None,
		&EngineOptions::new(),
		&TemplateContext::new(),
	)
	.expect_err("undefined variable");
	assert!(!error.is_syntax());
	assert!(error.summary().starts_with("Error on line "));
}

#[test]
fn template_reports_undeclared_variables() -> AnyEmptyResult {
	let names = template::undeclared_variables(
		"{{ title }}{% for item in items %}{{ item.name }}{{ doctype() }}{% endfor %}",
		None,
		&EngineOptions::new(),
	)?;
	assert_eq!(names, vec!["items".to_string(), "title".to_string()]);
	Ok(())
}

#[test]
fn template_includes_use_load_paths() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("header.loom"), "<h1>{{ title }}</h1>")?;
	let mut options = EngineOptions::new();
	options.push("load_paths", tmp.path().display().to_string());

	let output = template::compile(
		"{% include 'header.loom' %}",
		None,
		&options,
		&context(&[("title", "Loom".into())]),
	)?;
	assert_eq!(output, "<h1>Loom</h1>");
	Ok(())
}

#[rstest]
#[case::json("data.json", r#"{"name": "json"}"#, "json")]
#[case::toml("data.toml", "name = \"toml\"\n", "toml")]
#[case::yaml("data.yaml", "name: yaml\n", "yaml")]
fn require_data_files(
	#[case] file: &str,
	#[case] content: &str,
	#[case] expected: &str,
) -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join(file);
	write(&path, content)?;

	let mut data = TemplateContext::new();
	template::require_data_file(&path, &mut data)?;
	assert_eq!(data.get("name"), Some(&serde_json::Value::from(expected)));
	Ok(())
}

#[test]
fn require_rejects_unknown_formats() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let path = tmp.path().join("data.ini");
	write(&path, "name = ini")?;

	let error = template::require_data_file(&path, &mut TemplateContext::new())
		.expect_err("unsupported format");
	assert!(matches!(error, LoomError::UnsupportedDataFormat(ref format) if format == "ini"));
	Ok(())
}

#[test]
fn html_converter_escapes_template_delimiters() -> AnyEmptyResult {
	let output = html::render("a {{ b }} {% c %} {# d #}", &EngineOptions::new())?;
	assert_eq!(
		output,
		"a {{ '{{' }} b }} {{ '{%' }} c %} {{ '{#' }} d #}"
	);
	Ok(())
}

#[test]
fn template_round_trips_through_the_html_converter() -> AnyEmptyResult {
	let options = EngineOptions::new();
	let data = context(&[("name", "loom".into())]);
	let rendered = template::compile(
		"<code>{{ '{{' }} {{ name }} }}</code>\n<p>{{ name }}</p>\n",
		None,
		&options,
		&data,
	)?;
	assert_eq!(rendered, "<code>{{ loom }}</code>\n<p>loom</p>\n");

	let converted = html::render(&rendered, &options)?;
	let rerendered = template::compile(&converted, None, &options, &data)?;
	assert_eq!(rerendered, rendered);
	Ok(())
}

#[test]
fn html_converter_translates_erb() -> AnyEmptyResult {
	let mut options = EngineOptions::new();
	options.set("erb", true);
	let output = html::render(
		"<% if @user %><p><%= @user.name %></p><% else %><%# guest %><% end %>\n<% @items.each do |item| %><li><%= item %></li><% end %>",
		&options,
	)?;
	assert_eq!(
		output,
		"{% if user %}<p>{{ user.name }}</p>{% else %}{# guest #}{% endif %}\n{% for item in items %}<li>{{ item }}</li>{% endfor %}"
	);

	let mut ugly = EngineOptions::new();
	ugly.set("style", "ugly");
	let rendered = template::compile(
		&output,
		None,
		&ugly,
		&context(&[
			("user", serde_json::json!({ "name": "Ada" })),
			("items", serde_json::json!(["a", "b"])),
		]),
	)?;
	assert_eq!(rendered, "<p>Ada</p>\n<li>a</li><li>b</li>");
	Ok(())
}

#[rstest]
#[case::missing_end("<% if x %>\n<p>open</p>\n", 3)]
#[case::opener_without_body("<p><%></p>", 1)]
#[case::unterminated("<p>\n<%= name </p>", 2)]
fn html_converter_rejects_unbalanced_erb(#[case] input: &str, #[case] line: usize) {
	let mut options = EngineOptions::new();
	options.set("erb", true);
	let error = html::render(input, &options).expect_err("malformed erb");
	assert!(error.is_syntax());
	assert_eq!(error.source_line(), Some(line));
}

#[test]
fn erb_is_detected_from_the_extension() {
	assert!(html::is_erb_filename("index.html.erb"));
	assert!(html::is_erb_filename("legacy.RHTML"));
	assert!(!html::is_erb_filename("index.html"));
}

#[cfg(feature = "xhtml")]
#[rstest]
#[case::mismatched("<p><b>bold</p>", 1)]
#[case::unclosed("<div>\n<p>text</p>\n", 3)]
#[case::void_element("<p>\n<br>\n</p>", 2)]
#[case::unquoted_attribute("<a href=/>x</a>", 1)]
#[case::uppercase("<P>x</P>", 1)]
#[case::overlapping_comment("<p><!--></p>", 1)]
fn xhtml_check_rejects_malformed_markup(#[case] input: &str, #[case] line: usize) {
	let mut options = EngineOptions::new();
	options.set("xhtml", true);
	let error = html::render(input, &options).expect_err("malformed xhtml");
	assert!(error.is_syntax());
	assert_eq!(error.source_line(), Some(line));
}

#[cfg(feature = "xhtml")]
#[test]
fn xhtml_check_accepts_well_formed_markup() -> AnyEmptyResult {
	let mut options = EngineOptions::new();
	options.set("xhtml", true);
	let input = "<!DOCTYPE html>\n<html><!-- note --><body class=\"a\"><br/><img src='x' /></body></html>";
	assert_eq!(html::render(input, &options)?, input);
	Ok(())
}

#[cfg(not(feature = "xhtml"))]
#[test]
fn xhtml_check_needs_the_feature() {
	let mut options = EngineOptions::new();
	options.set("xhtml", true);
	let error = html::render("<p/>", &options).expect_err("feature disabled");
	assert_eq!(
		error.kind,
		EngineErrorKind::MissingDependency("xhtml".to_string())
	);
}

#[test]
fn update_reports_every_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let source = tmp.path().join("src");
	let output = tmp.path().join("out");
	write(&source.join("a.scss"), "a { color: red; }")?;
	write(&source.join("b.scss"), "b { color: red;")?;
	write(&source.join("nested/c.scss"), "c { color: red; }")?;
	write(&source.join("nested/d.scss"), "d { width: 1px + 1em; }")?;
	write(&source.join("_partial.scss"), "p { color: red; }")?;
	write(&source.join("notes.txt"), "ignored")?;

	let mappings = PathMapping::from_args(&[format!("{}:{}", source.display(), output.display())]);
	let mut controller = WatchController::new(
		mappings,
		compiler(OutputStyle::Compressed),
		Recorder::default(),
	);
	controller.update();

	let recorder = controller.observer();
	assert_eq!(recorder.count("create ") + recorder.count("overwrite "), 2);
	assert_eq!(recorder.count("error "), 2);
	assert_eq!(recorder.events, vec![
		format!("directory {}", output.display()),
		format!("create {}", output.join("a.css").display()),
		format!("error {}", source.join("b.scss").display()),
		format!("directory {}", output.join("nested").display()),
		format!("create {}", output.join("nested/c.css").display()),
		format!("error {}", source.join("nested/d.scss").display()),
	]);
	assert_eq!(std::fs::read_to_string(output.join("a.css"))?, "a{color:red}\n");
	assert!(!output.join("_partial.css").exists());
	Ok(())
}

#[test]
fn update_skips_fresh_output_unless_forced() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let source = tmp.path().join("site.scss");
	write(&source, "a { color: red; }")?;
	let mappings = PathMapping::from_args(&[source.display().to_string()]);

	let mut controller = WatchController::new(
		mappings.clone(),
		compiler(OutputStyle::Compressed),
		Recorder::default(),
	);
	controller.update();
	controller.update();
	assert_eq!(controller.observer().events, vec![format!(
		"create {}",
		tmp.path().join("site.css").display()
	)]);

	let mut forced = WatchController::new(
		mappings,
		compiler(OutputStyle::Compressed),
		Recorder::default(),
	)
	.force(true);
	forced.update();
	assert_eq!(forced.observer().events, vec![format!(
		"overwrite {}",
		tmp.path().join("site.css").display()
	)]);
	Ok(())
}

#[test]
fn watch_scans_report_create_modify_delete_in_order() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let source = tmp.path().join("src");
	let output = tmp.path().join("out");
	std::fs::create_dir(&source)?;
	let stylesheet = source.join("site.scss");

	let mappings = PathMapping::from_args(&[format!("{}:{}", source.display(), output.display())]);
	let mut controller = WatchController::new(
		mappings,
		compiler(OutputStyle::Compressed),
		Recorder::default(),
	);
	controller.take_snapshot();
	assert_eq!(controller.poll(), 0);

	write(&stylesheet, "a { color: red; }")?;
	assert_eq!(controller.poll(), 1);
	write(&stylesheet, "a { color: blue; }")?;
	assert_eq!(controller.poll(), 1);
	std::fs::remove_file(&stylesheet)?;
	assert_eq!(controller.poll(), 1);

	let css = output.join("site.css");
	assert_eq!(controller.into_observer().events, vec![
		format!("new {}", stylesheet.display()),
		format!("directory {}", output.display()),
		format!("create {}", css.display()),
		format!("modified {}", stylesheet.display()),
		format!("overwrite {}", css.display()),
		format!("deleted {}", stylesheet.display()),
		format!("delete {}", css.display()),
	]);
	assert!(!css.exists());
	Ok(())
}

#[test]
fn changed_partials_recompile_their_mapping() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("_colors.scss"), "$brand: red;")?;
	write(&tmp.path().join("a.scss"), "@import \"colors\";\na { color: $brand; }")?;
	write(&tmp.path().join("b.scss"), "@import \"colors\";\nb { color: $brand; }")?;

	let mappings = PathMapping::from_args(&[tmp.path().display().to_string()]);
	let mut controller = WatchController::new(
		mappings,
		compiler(OutputStyle::Compressed),
		Recorder::default(),
	);
	controller.update();
	controller.take_snapshot();

	write(&tmp.path().join("_colors.scss"), "$brand: teal;")?;
	assert_eq!(controller.poll(), 1);
	assert_eq!(controller.observer().events[2..].to_vec(), vec![
		format!("modified {}", tmp.path().join("_colors.scss").display()),
		format!("overwrite {}", tmp.path().join("a.css").display()),
		format!("overwrite {}", tmp.path().join("b.css").display()),
	]);
	assert_eq!(std::fs::read_to_string(tmp.path().join("b.css"))?, "b{color:teal}\n");
	Ok(())
}

#[test]
fn watch_stops_on_interrupt() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	write(&tmp.path().join("a.scss"), "a { color: red; }")?;
	let mappings = PathMapping::from_args(&[tmp.path().display().to_string()]);
	let mut controller = WatchController::new(
		mappings,
		compiler(OutputStyle::Compressed),
		Recorder::default(),
	);

	let (sender, receiver) = std::sync::mpsc::channel();
	sender.send(Wake::Interrupt)?;
	controller.watch(&sender, &receiver, std::time::Duration::from_millis(10));

	assert_eq!(controller.observer().events, vec![format!(
		"create {}",
		tmp.path().join("a.css").display()
	)]);
	Ok(())
}
