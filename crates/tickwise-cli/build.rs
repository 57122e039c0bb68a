use std::process::Command;

fn probe(program: &str, args: &[&str]) -> Option<String> {
    let out = Command::new(program).args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    let text = String::from_utf8(out.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".into());
    let rustc = probe("rustc", &["--version"]).unwrap_or_else(|| "unknown".into());
    let git_sha =
        probe("git", &["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".into());

    println!("cargo:rustc-env=TICKWISE_TARGET={target}");
    println!("cargo:rustc-env=TICKWISE_RUSTC_VERSION={rustc}");
    println!("cargo:rustc-env=TICKWISE_GIT_SHA={git_sha}");
}
