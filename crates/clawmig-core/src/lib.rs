//! Core migration logic for moving an OpenClaw home to PicoClaw.

pub mod attention;
pub mod backup;
pub mod convert;
pub mod detect;
pub mod document;
pub mod merge;
pub mod migration;
pub mod settings;
pub mod verify;
pub mod workspace;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
