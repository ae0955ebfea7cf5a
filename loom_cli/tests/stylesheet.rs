mod common;

use loom_core::AnyEmptyResult;
use predicates::prelude::PredicateBooleanExt;

#[test]
fn compiles_standard_input() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::loomss_cmd()
		.current_dir(tmp.path())
		.args(["-t", "compressed"])
		.write_stdin("$c: red;\na { color: $c; }\n")
		.assert()
		.success()
		.stdout("a{color:red}\n");

	Ok(())
}

#[test]
fn colon_notation_names_the_output_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("in.scss"), "a { color: red; }\n")?;

	common::loomss_cmd()
		.current_dir(tmp.path())
		.args(["-C", "-t", "compact", "in.scss:out.css"])
		.assert()
		.success();

	let css = std::fs::read_to_string(tmp.path().join("out.css"))?;
	assert_eq!(css, "a { color: red; }\n");

	Ok(())
}

#[test]
fn compiles_with_the_cache_location() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("in.scss"), "a { color: red; }\n")?;

	common::loomss_cmd()
		.current_dir(tmp.path())
		.args(["--cache-location", "cache", "in.scss"])
		.assert()
		.success()
		.stdout("a {\n  color: red; }\n");

	assert!(tmp.path().join("cache").is_dir());

	Ok(())
}

#[test]
fn update_compiles_every_mapping() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join("src"))?;
	std::fs::write(tmp.path().join("src/site.scss"), "a { color: red; }\n")?;
	std::fs::write(tmp.path().join("src/_mixins.scss"), "$c: blue;\n")?;
	std::fs::write(tmp.path().join("src/broken.scss"), "a {\n")?;

	common::loomss_cmd()
		.current_dir(tmp.path())
		.args(["-C", "--update", "src:out"])
		.assert()
		.success()
		.stdout(predicates::str::contains("directory out"))
		.stdout(predicates::str::contains("create out/site.css"))
		.stdout(predicates::str::contains("error src/broken.scss (Syntax error on line"))
		.stdout(predicates::str::contains("_mixins").not());

	assert!(tmp.path().join("out/site.css").is_file());
	assert!(!tmp.path().join("out/_mixins.css").exists());

	Ok(())
}

#[test]
fn update_rejects_a_css_file_argument() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.scss"), "a { color: red; }\n")?;
	std::fs::write(tmp.path().join("a.css"), "")?;

	common::loomss_cmd()
		.current_dir(tmp.path())
		.args(["--update", "a.scss", "a.css"])
		.assert()
		.code(1)
		.stderr(predicates::str::contains("Did you mean: loomss --update a.scss:a.css"));

	Ok(())
}

#[test]
fn interactive_mode_evaluates_expressions() -> AnyEmptyResult {
	common::loomss_cmd()
		.arg("-i")
		.write_stdin("$a: 2px\n$a * 3\n")
		.assert()
		.success()
		.stdout(predicates::str::contains("6px"));

	Ok(())
}

#[test]
fn check_mode_is_silent_on_success() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::loomss_cmd()
		.current_dir(tmp.path())
		.arg("-c")
		.write_stdin("a { color: red; }")
		.assert()
		.success()
		.stdout("");

	Ok(())
}
