#![allow(dead_code)]

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

fn cmd(name: &str) -> Command {
	let mut cmd = Command::new(get_cargo_bin(name));
	cmd.env("NO_COLOR", "1")
		.env_remove("LOOM_PATH")
		.env_remove("LOOMSS_PATH")
		.env_remove("LOOM_LOG");
	cmd
}

pub fn loom_cmd() -> Command {
	cmd("loom")
}

pub fn loomss_cmd() -> Command {
	cmd("loomss")
}

pub fn html2loom_cmd() -> Command {
	cmd("html2loom")
}

pub fn css2loomss_cmd() -> Command {
	cmd("css2loomss")
}
