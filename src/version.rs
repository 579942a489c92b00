//! Version information reported by health checks and the CLI.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build identifier injected by the release pipeline via `HEIMDALL_BUILD_ID`
/// at compile time, or "unknown" for local builds.
pub const BUILD_ID: &str = match option_env!("HEIMDALL_BUILD_ID") {
    Some(id) => id,
    None => "unknown",
};

/// Full version string: `{version}` or `{version}+{build}`.
///
/// Examples:
/// - `0.1.0`
/// - `0.1.0+4f2a9c1`
pub fn version_string() -> String {
    if BUILD_ID == "unknown" {
        PKG_VERSION.to_string()
    } else {
        format!("{PKG_VERSION}+{BUILD_ID}")
    }
}
