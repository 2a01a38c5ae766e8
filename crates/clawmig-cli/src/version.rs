use serde::Serialize;

pub const REVISION: &str = env!("CLAWMIG_BUILD_REVISION");

pub const FULL: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("CLAWMIG_BUILD_REVISION"));

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub revision: &'static str,
    pub core: &'static str,
}

pub fn info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        revision: REVISION,
        core: clawmig_core::version(),
    }
}
