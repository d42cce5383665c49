//! Blocking clients for the Yandex Foundation Models API.
//!
//! [`yandexgpt`] holds the completion and embedding clients plus the
//! [`yandexgpt::llm::TextGenerator`] adapter; [`config`] and [`commands`]
//! back the `yagpt` and `yask` binaries.

pub mod commands;
pub mod config;
pub mod logging;
pub mod yandexgpt;

/// Version string shown by `--version`, including build metadata.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("YG_GIT_SHA"),
    ", built: ",
    env!("YG_BUILD_TS"),
    ")"
);
