//! Compile time configurations for the util crate
fn main() {
    // the IOTC_PKG_NAME variable is used to create local folders under
    // `~/.config`, `~/.local/state` and other directories. Changing it means
    // the agent loses access to its stored device identity.
    println!("cargo::rustc-env=IOTC_PKG_NAME=iotc");
}
