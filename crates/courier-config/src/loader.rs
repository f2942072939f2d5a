// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./courier.toml` > `~/.config/courier/courier.toml` >
//! `/etc/courier/courier.toml`, with environment variable overrides via `COURIER_`.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CourierConfig;

pub const SYSTEM_CONFIG_PATH: &str = "/etc/courier/courier.toml";

/// Top-level sections, used to turn `COURIER_SECTION_KEY` into `section.key`.
const SECTIONS: &[&str] = &[
    "platform", "webhook", "refresh", "dispatch", "exchange", "storage", "server", "logging",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/courier/courier.toml`
/// 3. `~/.config/courier/courier.toml`
/// 4. `./courier.toml`
/// 5. `COURIER_*` environment variables
pub fn load_config() -> Result<CourierConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CourierConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("courier/courier.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("courier.toml"))
        .merge(env_provider())
}

/// Env provider with explicit section mapping.
///
/// Only the leading section name is split off, so
/// `COURIER_DISPATCH_PLATFORM_IDEMPOTENCY` maps to
/// `dispatch.platform_idempotency` and not `dispatch.platform.idempotency`.
fn env_provider() -> Env {
    Env::prefixed("COURIER_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
