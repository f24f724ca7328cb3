//! Movie records.
//!
//! Movies are the versioned resource: every successful update bumps
//! `version` by one, and updates carrying a stale version are rejected by the
//! store as edit conflicts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::validator::{unique, Validator};

/// Earliest accepted release year.
pub const MIN_YEAR: i32 = 1888;

/// Maximum number of genres on one movie.
pub const MAX_GENRES: usize = 5;

/// Maximum title length in bytes.
pub const MAX_TITLE_BYTES: usize = 500;

/// Running time in minutes, written in JSON as `"<n> mins"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Runtime(pub i32);

impl Runtime {
    /// Minutes as an integer.
    #[must_use]
    pub const fn minutes(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mins", self.0)
    }
}

impl FromStr for Runtime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, unit) = s.split_once(' ').ok_or(CoreError::InvalidRuntimeFormat)?;
        if unit != "mins" {
            return Err(CoreError::InvalidRuntimeFormat);
        }
        number
            .parse::<i32>()
            .map(Self)
            .map_err(|_| CoreError::InvalidRuntimeFormat)
    }
}

impl Serialize for Runtime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Runtime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A stored movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Movie {
    /// Store-assigned identifier.
    pub id: i64,
    /// When the row was inserted.
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    /// Title.
    pub title: String,
    /// Release year.
    pub year: i32,
    /// Running time.
    pub runtime: Runtime,
    /// Genres, unique.
    pub genres: Vec<String>,
    /// Starts at 1; incremented on every update.
    pub version: i32,
}

/// Fields supplied by the caller when creating a movie. Missing fields
/// deserialize to their zero values and are then caught by [`NewMovie::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NewMovie {
    /// Title.
    pub title: String,
    /// Release year.
    pub year: i32,
    /// Running time.
    pub runtime: Runtime,
    /// Genres, unique.
    pub genres: Vec<String>,
}

impl NewMovie {
    /// Validate every caller-supplied field.
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.title.is_empty(), "title", "must be provided");
        v.check(
            self.title.len() <= MAX_TITLE_BYTES,
            "title",
            "must not be more than 500 bytes long",
        );

        v.check(self.year != 0, "year", "must be provided");
        v.check(self.year >= MIN_YEAR, "year", "must be greater than 1888");
        v.check(
            self.year <= Utc::now().year(),
            "year",
            "must not be in the future",
        );

        v.check(self.runtime.0 != 0, "runtime", "must be provided");
        v.check(self.runtime.0 > 0, "runtime", "must be a positive integer");

        v.check(!self.genres.is_empty(), "genres", "must contain at least 1 genre");
        v.check(
            self.genres.len() <= MAX_GENRES,
            "genres",
            "must not contain more than 5 genres",
        );
        v.check(unique(&self.genres), "genres", "must not contain duplicate values");
    }
}

impl From<&Movie> for NewMovie {
    fn from(movie: &Movie) -> Self {
        Self {
            title: movie.title.clone(),
            year: movie.year,
            runtime: movie.runtime,
            genres: movie.genres.clone(),
        }
    }
}
