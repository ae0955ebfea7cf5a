mod common;

use loom_core::AnyEmptyResult;

#[test]
fn renders_standard_input() -> AnyEmptyResult {
	common::loom_cmd()
		.write_stdin("{% if true %}\n<p>{{ 1 + 2 }}</p>\n{% endif %}\n")
		.assert()
		.success()
		.stdout("<p>3</p>\n");

	Ok(())
}

#[test]
fn renders_into_the_output_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.loom"), "{{ doctype() }}\n<p>{{ format }}</p>\n")?;

	common::loom_cmd()
		.current_dir(tmp.path())
		.args(["-f", "html5", "page.loom", "page.html"])
		.assert()
		.success()
		.stdout("");

	let html = std::fs::read_to_string(tmp.path().join("page.html"))?;
	assert_eq!(html, "<!DOCTYPE html>\n<p>html5</p>\n");

	Ok(())
}

#[test]
fn require_loads_data_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("site.toml"), "title = \"Loom\"\n")?;

	common::loom_cmd()
		.current_dir(tmp.path())
		.args(["-r", "site.toml"])
		.write_stdin("<h1>{{ title }}</h1>")
		.assert()
		.success()
		.stdout("<h1>Loom</h1>");

	Ok(())
}

#[test]
fn check_mode_prints_syntax_ok() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("page.loom"), "<p>{{ missing }}</p>\n")?;

	common::loom_cmd()
		.current_dir(tmp.path())
		.args(["-c", "page.loom"])
		.assert()
		.success()
		.stdout("Syntax OK\n");

	Ok(())
}

#[test]
fn check_mode_reports_the_syntax_error_line() -> AnyEmptyResult {
	common::loom_cmd()
		.arg("-c")
		.write_stdin("<p>\n\n{% for %}\n")
		.assert()
		.code(1)
		.stderr(predicates::str::starts_with("Syntax error on line 3: "));

	Ok(())
}

#[test]
fn debug_lists_undeclared_variables() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("data.json"), r#"{"name": "loom", "count": 2}"#)?;

	common::loom_cmd()
		.current_dir(tmp.path())
		.args(["--debug", "-r", "data.json"])
		.write_stdin("{{ name }} {{ count }}")
		.assert()
		.success()
		.stdout(format!("count\nname\n{}\nloom 2", "=".repeat(100)));

	Ok(())
}

#[test]
fn rails_reports_a_missing_plugin_directory() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::loom_cmd()
		.arg("--rails")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("doesn't exist"));

	Ok(())
}
