// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Strava OAuth scopes
//!
//! Strava takes and echoes scopes as a comma-separated list. The echo on the
//! authorization redirect reflects the boxes the athlete left ticked, so it can
//! be narrower than what was asked for.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{Result, StravaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Public segments, routes, profile data, posts and events
    Read,
    /// Private routes, segments and events
    ReadAll,
    /// All profile information regardless of visibility
    ProfileReadAll,
    /// Update weight and FTP, star segments
    ProfileWrite,
    /// Activities visible to everyone or followers
    ActivityRead,
    /// Every activity including "Only You" ones
    ActivityReadAll,
    /// Create, upload and edit activities
    ActivityWrite,
}

impl Scope {
    pub const ALL: [Scope; 7] = [
        Scope::Read,
        Scope::ReadAll,
        Scope::ProfileReadAll,
        Scope::ProfileWrite,
        Scope::ActivityRead,
        Scope::ActivityReadAll,
        Scope::ActivityWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::ReadAll => "read_all",
            Scope::ProfileReadAll => "profile:read_all",
            Scope::ProfileWrite => "profile:write",
            Scope::ActivityRead => "activity:read",
            Scope::ActivityReadAll => "activity:read_all",
            Scope::ActivityWrite => "activity:write",
        }
    }
}

impl FromStr for Scope {
    type Err = StravaError;

    fn from_str(s: &str) -> Result<Self> {
        Scope::ALL
            .iter()
            .copied()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| StravaError::InvalidScope(s.to_string()))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of scopes, requested or granted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope(BTreeSet<Scope>);

impl AccessScope {
    pub fn new<I: IntoIterator<Item = Scope>>(scopes: I) -> Self {
        Self(scopes.into_iter().collect())
    }

    /// Parse the scope list Strava echoes on the redirect.
    ///
    /// Unknown names are dropped rather than rejected so a scope added on
    /// Strava's side does not break authorization.
    pub fn from_granted(s: &str) -> Self {
        let mut scopes = BTreeSet::new();
        for name in split_names(s) {
            match name.parse::<Scope>() {
                Ok(scope) => {
                    scopes.insert(scope);
                }
                Err(_) => warn!(scope = %name, "Ignoring unknown scope in Strava response"),
            }
        }
        Self(scopes)
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// True when every requested scope is present in `self`.
    pub fn covers(&self, requested: &AccessScope) -> bool {
        self.0.is_superset(&requested.0)
    }
}

fn split_names(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

impl FromStr for AccessScope {
    type Err = StravaError;

    fn from_str(s: &str) -> Result<Self> {
        split_names(s)
            .map(str::parse::<Scope>)
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Scope::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl FromIterator<Scope> for AccessScope {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self::new(iter)
    }
}
