//! Common test utilities for CLI tests.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

/// Write `source` to a temporary circuit file.
#[allow(dead_code)]
pub fn circuit_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".loom").expect("Failed to create temp file");
    file.write_all(source.as_bytes())
        .expect("Failed to write circuit");
    file
}

/// Run the cipherloom binary with `args`.
#[allow(dead_code)]
pub fn run_cli<I, S>(args: I) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new(env!("CARGO_BIN_EXE_cipherloom"))
        .args(args)
        .env_remove("CIPHERLOOM_LOG")
        .output()
        .expect("Failed to execute cipherloom")
}

#[allow(dead_code)]
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[allow(dead_code)]
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
