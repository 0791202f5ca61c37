//! Build script embedding version information.

use std::process::Command;

fn main() {
    // A release pipeline may pin the version through SYSTEM_SETUP_VERSION;
    // local builds describe the checkout instead.
    if let Ok(version) = std::env::var("SYSTEM_SETUP_VERSION") {
        println!("cargo:rustc-env=SYSTEM_SETUP_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=SYSTEM_SETUP_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=SYSTEM_SETUP_VERSION");
}
