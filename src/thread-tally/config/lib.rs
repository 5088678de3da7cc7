/* ************************************************************************ **
** This file is part of rsp2, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of rsp2 is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

// Crate where serde_yaml code for the thread-tally settings is monomorphized.
//
// The functions here also make use of serde_ignored to catch typos in the config.

// NOTE: Please make sure to use the YamlRead trait!
//       DO NOT USE serde_yaml::from_{reader,value,etc.} OUTSIDE THIS CRATE.

#[macro_use]
extern crate log;

use serde::{Deserialize, Serialize};
use std::io::Read;

/// Provides an alternative to serde_yaml::from_reader where all of the
/// expensive codegen has already been performed in this crate.
pub trait YamlRead: for<'de> Deserialize<'de> {
    fn from_reader(mut r: impl Read) -> Result<Self, serde_yaml::Error>
    { YamlRead::from_dyn_reader(&mut r) }

    fn from_dyn_reader(r: &mut dyn Read) -> Result<Self, serde_yaml::Error> {
        // serde_ignored needs a Deserializer, and Value is one.
        Self::from_value(value_from_dyn_reader(r)?)
    }

    fn from_str(s: &str) -> Result<Self, serde_yaml::Error>
    { YamlRead::from_dyn_reader(&mut s.as_bytes()) }

    fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error>;
}

macro_rules! derive_yaml_read {
    ($Type:ty) => {
        impl YamlRead for $Type {
            fn from_value(value: serde_yaml::Value) -> Result<$Type, serde_yaml::Error> {
                serde_ignored::deserialize(
                    value,
                    |path| warn!("Unused config item (possible typo?): {}", path),
                )
            }
        }
    };
}

fn value_from_dyn_reader(r: &mut dyn Read) -> Result<serde_yaml::Value, serde_yaml::Error>
{ serde_yaml::from_reader(r) }

/// Settings of the threading support package.
///
/// # Example:
///
/// ```yaml
/// threads: 4
/// styles: [pair, bond, angle]
/// ```
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Number of worker threads in the team.
    ///
    /// `null` (the default) leaves the choice to rayon, which normally uses one
    /// thread per logical core.
    #[serde(default)]
    pub threads: Option<usize>,

    /// The interaction styles that run threaded.
    ///
    /// The order in this list is irrelevant; the last active style in the fixed
    /// evaluation order (pair, bond, angle, dihedral, improper, kspace) is the one
    /// that folds the per-thread force arrays.
    pub styles: Vec<Style>,

    /// Fold per-thread arrays using the team rather than the calling thread.
    #[serde(default = "_settings__parallel_fold")]
    pub parallel_fold: bool,
}
derive_yaml_read!{Settings}

#[allow(non_snake_case)]
fn _settings__parallel_fold() -> bool { true }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    Pair,
    Bond,
    Angle,
    Dihedral,
    Improper,
    #[serde(alias = "long-range")]
    Kspace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal() {
        let settings = Settings::from_str("styles: [pair]").unwrap();
        assert_eq!(settings, Settings {
            threads: None,
            styles: vec![Style::Pair],
            parallel_fold: true,
        });
    }

    #[test]
    fn full() {
        let settings = Settings::from_str("
threads: 3
styles: [dihedral, long-range, pair]
parallel-fold: false
").unwrap();
        assert_eq!(settings.threads, Some(3));
        assert_eq!(settings.styles, vec![Style::Dihedral, Style::Kspace, Style::Pair]);
        assert!(!settings.parallel_fold);
    }

    #[test]
    fn unknown_keys_are_not_fatal() {
        let settings = Settings::from_str("styles: [bond]\nthraeds: 2").unwrap();
        assert_eq!(settings.threads, None);
    }

    #[test]
    fn styles_are_required() {
        assert!(Settings::from_str("threads: 2").is_err());
    }
}
