//! Per-crate debug flags
//!
//! `--debug-voxatlas-volumes` (or the short form `--debug-volumes`) raises the
//! level of one crate to `debug`; `--debug-all` raises every known crate.
//! `VOXATLAS_DEBUG` accepts the same names, comma-separated.

use std::collections::BTreeSet;
use std::env;

use crate::{crate_target, KNOWN_CRATES};

const FLAG_PREFIX: &str = "--debug-";

/// Canonical crate name for a flag value, `None` if it names no known crate.
///
/// Accepts `voxatlas-maps`, `voxatlas_maps` and `maps`.
pub fn resolve_crate_name(name: &str) -> Option<&'static str> {
    let name = name.trim().replace('_', "-");
    KNOWN_CRATES.iter().copied().find(|known| {
        *known == name || known.strip_prefix("voxatlas-") == Some(name.as_str())
    })
}

/// Crates whose log level is raised to `debug`
///
/// # Example
/// ```rust
/// use voxatlas_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-volumes".to_string()]);
/// assert!(flags.is_enabled("voxatlas-volumes"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrateDebugFlags {
    enabled: BTreeSet<&'static str>,
    unknown: Vec<String>,
}

impl CrateDebugFlags {
    /// Collect `--debug-*` arguments; anything else is ignored
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = Self::default();
        for arg in args {
            if let Some(name) = arg.strip_prefix(FLAG_PREFIX) {
                flags.enable(name);
            }
        }
        flags
    }

    /// Enable one crate by name, or every crate for `all`
    pub fn enable(&mut self, name: &str) {
        if name.trim() == "all" {
            self.enabled.extend(KNOWN_CRATES.iter().copied());
            return;
        }
        match resolve_crate_name(name) {
            Some(known) => {
                self.enabled.insert(known);
            }
            None => self.unknown.push(name.to_string()),
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        resolve_crate_name(crate_name).is_some_and(|known| self.enabled.contains(known))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.enabled.iter().copied()
    }

    /// Flag values that matched no known crate
    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    /// `EnvFilter` directive string, e.g. `voxatlas_maps=debug,info`
    pub fn to_filter_string(&self, default_level: &str) -> String {
        self.enabled
            .iter()
            .map(|name| format!("{}=debug", crate_target(name)))
            .chain(std::iter::once(default_level.to_lowercase()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Flags from the process arguments plus `VOXATLAS_DEBUG`
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(value) = env::var("VOXATLAS_DEBUG") {
        for name in value.split(',').filter(|n| !n.trim().is_empty()) {
            flags.enable(name);
        }
    }
    flags
}

pub fn debug_flags_help() -> String {
    let short: Vec<&str> = KNOWN_CRATES
        .iter()
        .map(|name| name.strip_prefix("voxatlas-").unwrap_or(name))
        .collect();
    format!(
        "Debug flags:\n  --debug-all            debug logging for every crate\n  --debug-<crate>        debug logging for one crate\n\nCrates: {}\n\nVOXATLAS_DEBUG=<crate>[,<crate>] or VOXATLAS_DEBUG=all\n",
        short.join(", ")
    )
}
