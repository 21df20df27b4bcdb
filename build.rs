//! Stamp the engine version into `version.rs` so exported reports can say which
//! build produced them. Uses `git describe --tags --always --dirty` when a git
//! checkout is available and falls back to `CARGO_PKG_VERSION` otherwise.
//!
//! The `GIT` environment variable can point at an alternative git executable.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

fn describe_checkout() -> Option<String> {
    let git = env::var("GIT").unwrap_or_else(|_| "git".into());
    let output = Command::new(git)
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let line = described.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(format!("{}+git-{}", env!("CARGO_PKG_VERSION"), line))
    }
}

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR environment variable not set");
    let dest_path = Path::new(&out_dir).join("version.rs");

    let version = describe_checkout().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_owned());

    let contents = format!(
        "/// Engine build identifier embedded in exported reports.\npub const ENGINE_VERSION: &str = \"{}\";\n",
        version.replace('"', "")
    );
    fs::write(&dest_path, contents).expect("Failed to write version.rs");

    println!("cargo:rerun-if-env-changed=GIT");
    println!("cargo:rerun-if-changed=build.rs");
}
