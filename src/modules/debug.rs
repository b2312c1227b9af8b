use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::modules::error::{NavError, Result};
use crate::modules::storage::store_dir;

/// Diagnostic switches the engine consults before tracing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathingFlag {
    Enabled,
    Visual,
    Verbose,
    Detail,
    Causes,
    Stats,
    Bypass,
}

impl PathingFlag {
    pub const ALL: [PathingFlag; 7] = [
        PathingFlag::Enabled,
        PathingFlag::Visual,
        PathingFlag::Verbose,
        PathingFlag::Detail,
        PathingFlag::Causes,
        PathingFlag::Stats,
        PathingFlag::Bypass,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            PathingFlag::Enabled => "pathing.enabled",
            PathingFlag::Visual => "pathing.visual",
            PathingFlag::Verbose => "pathing.verbose",
            PathingFlag::Detail => "pathing.detail",
            PathingFlag::Causes => "pathing.causes",
            PathingFlag::Stats => "pathing.stats",
            PathingFlag::Bypass => "pathing.bypass",
        }
    }

    const fn default_value(self) -> bool {
        matches!(self, PathingFlag::Stats | PathingFlag::Bypass)
    }
}

impl fmt::Display for PathingFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A flag whose value differs from its default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FlagDiff {
    pub path: String,
    pub current: Option<bool>,
    pub default: Option<bool>,
}

impl fmt::Display for FlagDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: Option<bool>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(
            f,
            "{} = {} (default {})",
            self.path,
            show(self.current),
            show(self.default)
        )
    }
}

/// Hierarchical boolean flags addressed by dotted paths, with a master
/// switch. `is("pathing")` is true when any of enabled, visual or verbose
/// is on; other subtree names resolve to their `.enabled` leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugFlags {
    pub all: bool,
    flags: BTreeMap<String, bool>,
}

impl Default for DebugFlags {
    fn default() -> Self {
        Self {
            all: true,
            flags: default_flags(),
        }
    }
}

fn default_flags() -> BTreeMap<String, bool> {
    PathingFlag::ALL
        .into_iter()
        .map(|flag| (flag.path().to_string(), flag.default_value()))
        .collect()
}

impl DebugFlags {
    pub fn is(&self, path: &str) -> bool {
        if !self.all {
            return false;
        }
        if path == "all" {
            return true;
        }
        if path == "pathing" {
            return [PathingFlag::Enabled, PathingFlag::Visual, PathingFlag::Verbose]
                .into_iter()
                .any(|flag| self.value(flag.path()));
        }
        if let Some(value) = self.flags.get(path) {
            return *value;
        }
        self.value(&format!("{path}.enabled"))
    }

    pub fn pathing(&self, flag: PathingFlag) -> bool {
        self.is(flag.path())
    }

    fn value(&self, path: &str) -> bool {
        self.flags.get(path).copied().unwrap_or(false)
    }

    /// Set a leaf. A subtree name with an `.enabled` leaf sets that leaf.
    pub fn set(&mut self, path: &str, value: bool) -> Result<bool> {
        let path = path.trim();
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(NavError::InvalidConfig(format!("invalid flag path `{path}`")));
        }
        if path == "all" {
            self.all = value;
            return Ok(value);
        }
        let enabled = format!("{path}.enabled");
        let target = if !self.flags.contains_key(path) && self.flags.contains_key(&enabled) {
            enabled
        } else {
            path.to_string()
        };
        self.flags.insert(target, value);
        Ok(value)
    }

    pub fn toggle(&mut self, path: &str) -> Result<bool> {
        let next = !self.is(path);
        self.set(path, next)
    }

    /// Turn on every existing flag matching `pattern`; `*` matches one segment.
    pub fn on(&mut self, pattern: &str) -> usize {
        self.set_matching(pattern, true)
    }

    pub fn off(&mut self, pattern: &str) -> usize {
        self.set_matching(pattern, false)
    }

    fn set_matching(&mut self, pattern: &str, value: bool) -> usize {
        let parts: Vec<&str> = pattern.trim().split('.').collect();
        if pattern.trim().is_empty() {
            return 0;
        }
        let mut changed = 0;
        if matches_pattern(&parts, "all") {
            self.all = value;
            changed += 1;
        }
        for (path, flag) in self.flags.iter_mut() {
            if matches_pattern(&parts, path) {
                *flag = value;
                changed += 1;
            }
        }
        changed
    }

    pub fn enable_all(&mut self) {
        self.all = true;
    }

    pub fn disable_all(&mut self) {
        self.all = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn diff(&self) -> Vec<FlagDiff> {
        let defaults = Self::default();
        let mut out = Vec::new();
        if self.all != defaults.all {
            out.push(FlagDiff {
                path: "all".into(),
                current: Some(self.all),
                default: Some(defaults.all),
            });
        }
        for (path, value) in &self.flags {
            let default = defaults.flags.get(path).copied();
            if default != Some(*value) {
                out.push(FlagDiff {
                    path: path.clone(),
                    current: Some(*value),
                    default,
                });
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        std::iter::once(("all", self.all))
            .chain(self.flags.iter().map(|(k, v)| (k.as_str(), *v)))
    }

    /// Add any default flag missing from a loaded file.
    fn fill_defaults(&mut self) {
        for (path, value) in default_flags() {
            self.flags.entry(path).or_insert(value);
        }
    }
}

fn matches_pattern(parts: &[&str], path: &str) -> bool {
    let segments: Vec<&str> = path.split('.').collect();
    segments.len() == parts.len()
        && parts
            .iter()
            .zip(&segments)
            .all(|(pattern, segment)| *pattern == "*" || pattern == segment)
}

pub fn debug_file_path() -> PathBuf {
    store_dir().join("debug.json")
}

pub fn load_debug_flags(path: &Path) -> Result<DebugFlags> {
    if !path.exists() {
        return Ok(DebugFlags::default());
    }

    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Ok(DebugFlags::default());
    }

    let mut flags: DebugFlags = serde_json::from_slice(&bytes).map_err(|e| {
        NavError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "failed to parse debug flags {}; delete it or run `waypath debug reset` to reset: {}",
                path.display(),
                e
            ),
        ))
    })?;
    flags.fill_defaults();
    Ok(flags)
}

pub fn save_debug_flags(flags: &DebugFlags, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(flags)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_quiet() {
        let flags = DebugFlags::default();
        assert!(!flags.is("pathing"));
        assert!(!flags.pathing(PathingFlag::Verbose));
        assert!(flags.pathing(PathingFlag::Stats));
        assert!(flags.diff().is_empty());
    }

    #[test]
    fn pathing_aggregate_follows_any_of_three() {
        let mut flags = DebugFlags::default();
        flags.set("pathing.visual", true).unwrap();
        assert!(flags.is("pathing"));
        flags.set("pathing.visual", false).unwrap();
        flags.set("pathing.detail", true).unwrap();
        assert!(!flags.is("pathing"));
    }

    #[test]
    fn master_switch_silences_everything() {
        let mut flags = DebugFlags::default();
        flags.disable_all();
        assert!(!flags.pathing(PathingFlag::Stats));
        flags.enable_all();
        assert!(flags.pathing(PathingFlag::Stats));
    }

    #[test]
    fn subtree_resolves_to_enabled_leaf() {
        let mut flags = DebugFlags::default();
        flags.set("store.enabled", true).unwrap();
        assert!(flags.is("store"));
        flags.set("store", false).unwrap();
        assert!(!flags.is("store.enabled"));
        assert!(flags.toggle("store").unwrap());
        assert!(flags.is("store"));
    }

    #[test]
    fn wildcards_touch_existing_leaves_only() {
        let mut flags = DebugFlags::default();
        assert_eq!(flags.on("pathing.*"), PathingFlag::ALL.len());
        assert!(flags.pathing(PathingFlag::Causes));
        assert_eq!(flags.off("pathing.ver*"), 0);
        assert_eq!(flags.off("*.verbose"), 1);
        assert!(!flags.pathing(PathingFlag::Verbose));
        assert_eq!(flags.on("nothing.here"), 0);
    }

    #[test]
    fn diff_and_reset() {
        let mut flags = DebugFlags::default();
        flags.set("pathing.verbose", true).unwrap();
        flags.set("sim.trace", true).unwrap();
        let diff = flags.diff();
        assert_eq!(diff.len(), 2);
        assert!(diff.iter().any(|d| d.path == "sim.trace" && d.default.is_none()));

        flags.reset();
        assert!(flags.diff().is_empty());
    }

    #[test]
    fn rejects_empty_segments() {
        let mut flags = DebugFlags::default();
        assert!(flags.set("pathing..verbose", true).is_err());
        assert!(flags.set("", true).is_err());
    }

    #[test]
    fn file_round_trip_fills_missing_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.json");
        fs::write(&path, br#"{ "all": true, "flags": { "pathing.verbose": true } }"#).unwrap();

        let flags = load_debug_flags(&path).unwrap();
        assert!(flags.pathing(PathingFlag::Verbose));
        assert!(flags.pathing(PathingFlag::Bypass));

        save_debug_flags(&flags, &path).unwrap();
        assert_eq!(load_debug_flags(&path).unwrap(), flags);
    }
}
