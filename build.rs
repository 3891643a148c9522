// build.rs

//! Stamps the version string advertised in the master registration.
//! `QUILLMASTER_VERSION` overrides the package version, e.g. for release builds.

use std::env;

fn main() {
    let version = env::var("QUILLMASTER_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env::var("CARGO_PKG_VERSION").ok())
        .unwrap_or_else(|| "dev".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=QUILLMASTER_BUILD_VERSION={version}");
    println!("cargo:rustc-env=QUILLMASTER_BUILD_PROFILE={profile}");
    println!("cargo:rerun-if-env-changed=QUILLMASTER_VERSION");
}
