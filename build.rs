//! Build script: embeds the git hash and links libespeak-ng when requested.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if std::env::var_os("CARGO_FEATURE_ESPEAK").is_some() {
        check_espeak();
    }
}

/// Warn early when libespeak-ng is missing, before the linker fails obscurely.
fn check_espeak() {
    let pkg_config_ok = Command::new("pkg-config")
        .args(["--exists", "espeak-ng"])
        .status()
        .is_ok_and(|s| s.success());

    if !pkg_config_ok {
        let lib_exists = [
            "/usr/lib/x86_64-linux-gnu/libespeak-ng.so",
            "/usr/lib/aarch64-linux-gnu/libespeak-ng.so",
            "/usr/lib/libespeak-ng.so",
            "/usr/lib64/libespeak-ng.so",
            "/usr/local/lib/libespeak-ng.so",
        ]
        .iter()
        .any(|p| std::path::Path::new(p).exists());

        if !lib_exists {
            println!("cargo::warning=libespeak-ng not found; install libespeak-ng-dev");
            println!("cargo::warning=or build without the `espeak` feature");
        }
    }
    println!("cargo:rustc-link-lib=espeak-ng");
}
