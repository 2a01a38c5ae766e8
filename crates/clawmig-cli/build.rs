use std::env;
use std::process::Command;

const REVISION_ENV: &str = "CLAWMIG_BUILD_REVISION";

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

/// `git.<count>.<sha>[.dirty]`, or whatever a packager building from a
/// tarball passes in `CLAWMIG_BUILD_REVISION`.
fn revision() -> String {
    if let Some(pinned) = env::var(REVISION_ENV).ok().filter(|value| !value.trim().is_empty()) {
        return pinned.trim().to_string();
    }
    let Some(sha) = git(&["rev-parse", "--short", "HEAD"]) else {
        return "unknown".to_string();
    };
    let count = git(&["rev-list", "--count", "HEAD"]).unwrap_or_else(|| "0".to_string());
    let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.is_empty());
    format!("git.{count}.{sha}{}", if dirty { ".dirty" } else { "" })
}

fn main() {
    println!("cargo:rerun-if-env-changed={REVISION_ENV}");
    // The repository root sits two levels above this crate.
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/index");
    println!("cargo:rustc-env={REVISION_ENV}={}", revision());
}
