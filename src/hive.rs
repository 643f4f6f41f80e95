//! Registry hives: the fixed top-level roots of every key path.

use crate::error::{RegistryError, Result};
use std::fmt;
use std::str::FromStr;

/// One of the predefined registry roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Hive {
    /// `HKEY_CLASSES_ROOT`
    ClassesRoot,
    /// `HKEY_CURRENT_USER`
    CurrentUser,
    /// `HKEY_LOCAL_MACHINE`
    LocalMachine,
    /// `HKEY_USERS`
    Users,
    /// `HKEY_CURRENT_CONFIG`
    CurrentConfig,
    /// `HKEY_DYN_DATA`
    DynData,
    /// `HKEY_PERFORMANCE_DATA`
    PerformanceData,
}

impl Hive {
    /// Every hive, in the order a registry editor lists them.
    pub const ALL: [Hive; 7] = [
        Hive::ClassesRoot,
        Hive::CurrentUser,
        Hive::LocalMachine,
        Hive::Users,
        Hive::CurrentConfig,
        Hive::DynData,
        Hive::PerformanceData,
    ];

    /// Position of the hive in [`Hive::ALL`].
    pub(crate) fn ordinal(&self) -> usize {
        match self {
            Hive::ClassesRoot => 0,
            Hive::CurrentUser => 1,
            Hive::LocalMachine => 2,
            Hive::Users => 3,
            Hive::CurrentConfig => 4,
            Hive::DynData => 5,
            Hive::PerformanceData => 6,
        }
    }

    /// Returns the full name used in `.reg` key paths.
    pub fn name(&self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKEY_CLASSES_ROOT",
            Hive::CurrentUser => "HKEY_CURRENT_USER",
            Hive::LocalMachine => "HKEY_LOCAL_MACHINE",
            Hive::Users => "HKEY_USERS",
            Hive::CurrentConfig => "HKEY_CURRENT_CONFIG",
            Hive::DynData => "HKEY_DYN_DATA",
            Hive::PerformanceData => "HKEY_PERFORMANCE_DATA",
        }
    }

    /// Returns the conventional abbreviation (`HKLM`, `HKCU`, ...).
    pub fn short_name(&self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKCR",
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
            Hive::CurrentConfig => "HKCC",
            Hive::DynData => "HKDD",
            Hive::PerformanceData => "HKPD",
        }
    }

    /// Parses a hive name, accepting full names and abbreviations in any case.
    pub fn from_name(name: &str) -> Result<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let hive = match upper.as_str() {
            "HKEY_CLASSES_ROOT" | "HKCR" => Hive::ClassesRoot,
            "HKEY_CURRENT_USER" | "HKCU" => Hive::CurrentUser,
            "HKEY_LOCAL_MACHINE" | "HKLM" => Hive::LocalMachine,
            "HKEY_USERS" | "HKU" => Hive::Users,
            "HKEY_CURRENT_CONFIG" | "HKCC" => Hive::CurrentConfig,
            "HKEY_DYN_DATA" | "HKEY_DYNAMIC_DATA" | "HKDD" => Hive::DynData,
            "HKEY_PERFORMANCE_DATA" | "HKPD" => Hive::PerformanceData,
            _ => return Err(RegistryError::InvalidHive(name.to_string())),
        };
        Ok(hive)
    }

    /// Splits a hive-qualified path into its hive and the key names below it.
    ///
    /// Empty components (doubled or trailing backslashes) are dropped. Blanks
    /// around the hive name are ignored; blanks inside key names are kept.
    ///
    /// ```rust
    /// # use reg_file::Hive;
    /// let (hive, names) = Hive::split_path(r"HKCU\Software\Vendor").unwrap();
    /// assert_eq!(hive, Hive::CurrentUser);
    /// assert_eq!(names, vec!["Software", "Vendor"]);
    /// ```
    pub fn split_path(path: &str) -> Result<(Self, Vec<&str>)> {
        let mut parts = path.trim_start().split('\\').filter(|part| !part.is_empty());
        let head = parts
            .next()
            .ok_or_else(|| RegistryError::InvalidHive(path.to_string()))?;
        let hive = Self::from_name(head)?;
        Ok((hive, parts.collect()))
    }

    /// Rewrites a path with the canonical hive name, for comparisons.
    pub fn canonical_path(path: &str) -> Result<String> {
        let (hive, names) = Self::split_path(path)?;
        let mut canonical = hive.name().to_string();
        for name in names {
            canonical.push('\\');
            canonical.push_str(name);
        }
        Ok(canonical)
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hive {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}
