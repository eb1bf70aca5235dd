/*
Copyright 2021 Jakub Lewandowski

This file is part of GPV Kit.

GPV Kit is a free software: you can redistribute it and/or modify
it under the terms of the GNU General Public License as published by
the Free Software Foundation; either version 3 of the License, or
(at your option) any later version.

GPV Kit is distributed in the hope that it will be useful,
but WITHOUT ANY WARRANTY; without even the implied warranty of
MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
GNU General Public License for more details.

You should have received a copy of the GNU General Public License
along with GPV Kit. If not, see https://www.gnu.org/licenses/.
*/

//! Value types identifying a forecast run and the
//! kind of data requested from it.
//!
//! All of them are parsed from strings (configuration file or
//! command line) so that unsupported values are rejected
//! before any file is touched.

use crate::errors::ConfigError;
use chrono::{Duration, NaiveDateTime};
use std::{fmt, path::PathBuf, str::FromStr};

const CANONICAL_FORMAT: &str = "%Y%m%d%H%M%S";

/// Base (issuance) time of a forecast in UTC.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ForecastRun {
    base_time: NaiveDateTime,
}

impl ForecastRun {
    pub fn new(base_time: NaiveDateTime) -> Self {
        ForecastRun { base_time }
    }

    /// Canonical `YYYYMMDDHHMMSS` form used in file names.
    pub fn canonical(&self) -> String {
        self.base_time.format(CANONICAL_FORMAT).to_string()
    }

    /// `YYYY/MM/DD` partition of the remote archive.
    pub fn archive_partition(&self) -> String {
        self.base_time.format("%Y/%m/%d").to_string()
    }

    /// Instant predicted at given lead time.
    pub fn valid_time(&self, lead_time: u32) -> NaiveDateTime {
        self.base_time + Duration::hours(i64::from(lead_time))
    }
}

impl FromStr for ForecastRun {
    type Err = ConfigError;

    /// Accepts `YYYYMMDDHHMMSS`, `YYYYMMDDHH` and
    /// ISO-like `YYYY-MM-DDTHH:MM:SS`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let expanded = match s.len() {
            10 if s.chars().all(|c| c.is_ascii_digit()) => format!("{}0000", s),
            _ => s.to_string(),
        };

        NaiveDateTime::parse_from_str(&expanded, CANONICAL_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(ForecastRun::new)
            .map_err(|_| ConfigError::BadTimestamp(s.to_string()))
    }
}

impl fmt::Display for ForecastRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Numerical weather prediction model family.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ModelFamily {
    /// Global Spectral Model
    Gsm,
    /// Meso-Scale Model
    Msm,
}

impl ModelFamily {
    /// Label of the model in archive file names.
    pub fn label(self) -> &'static str {
        match self {
            ModelFamily::Gsm => "GSM",
            ModelFamily::Msm => "MSM",
        }
    }

    /// Discriminator preceding the chunk tag in file names.
    pub(crate) fn span_flag(self) -> char {
        match self {
            ModelFamily::Gsm => 'D',
            ModelFamily::Msm => 'H',
        }
    }

    /// Longest lead time (in hours) available from the archive.
    pub fn horizon(self) -> u32 {
        match self {
            ModelFamily::Gsm => 264,
            ModelFamily::Msm => 39,
        }
    }
}

impl FromStr for ModelFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GSM" => Ok(ModelFamily::Gsm),
            "MSM" => Ok(ModelFamily::Msm),
            _ => Err(ConfigError::UnsupportedModel(s.to_string())),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Vertical level type of the source files.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum LevelType {
    Surface,
    Pressure,
}

impl LevelType {
    /// Label of the level type in archive file names.
    pub fn label(self) -> &'static str {
        match self {
            LevelType::Surface => "Lsurf",
            LevelType::Pressure => "L-pall",
        }
    }
}

impl FromStr for LevelType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "surface" | "surf" => Ok(LevelType::Surface),
            "pressure" | "plev" => Ok(LevelType::Pressure),
            _ => Err(ConfigError::UnsupportedLevelType(s.to_string())),
        }
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelType::Surface => write!(f, "surface"),
            LevelType::Pressure => write!(f, "pressure"),
        }
    }
}

/// Where source files are taken from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SourceMode {
    /// Use local copies when present, download otherwise.
    Retrieve,
    /// Always download and convert again.
    ForceRetrieve,
    /// Read already converted files from given directory.
    Directory(PathBuf),
}

impl FromStr for SourceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ConfigError::MissingParameter("input directory or retrieve mode")),
            "retrieve" => Ok(SourceMode::Retrieve),
            "force_retrieve" => Ok(SourceMode::ForceRetrieve),
            dir => Ok(SourceMode::Directory(PathBuf::from(dir))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ForecastRun, LevelType, ModelFamily, SourceMode};
    use crate::errors::ConfigError;
    use std::path::PathBuf;

    #[test]
    fn canonical_roundtrip() {
        let run: ForecastRun = "20220623000000".parse().unwrap();
        assert_eq!(run.canonical(), "20220623000000");
        assert_eq!(run.archive_partition(), "2022/06/23");

        let short: ForecastRun = "2022062312".parse().unwrap();
        assert_eq!(short.canonical(), "20220623120000");

        let iso: ForecastRun = "2022-06-23T06:00:00".parse().unwrap();
        assert_eq!(iso.canonical(), "20220623060000");
    }

    #[test]
    fn valid_time_crosses_midnight() {
        let run: ForecastRun = "20220623180000".parse().unwrap();
        assert_eq!(
            ForecastRun::new(run.valid_time(9)).canonical(),
            "20220624030000"
        );
    }

    #[test]
    fn bad_timestamp() {
        assert!(matches!(
            "2022-13".parse::<ForecastRun>(),
            Err(ConfigError::BadTimestamp(_))
        ));
    }

    #[test]
    fn level_types() {
        assert_eq!("surf".parse::<LevelType>().unwrap(), LevelType::Surface);
        assert_eq!("pressure".parse::<LevelType>().unwrap(), LevelType::Pressure);
        assert!(matches!(
            "isobaricInhPa".parse::<LevelType>(),
            Err(ConfigError::UnsupportedLevelType(_))
        ));
    }

    #[test]
    fn models_and_sources() {
        assert_eq!("msm".parse::<ModelFamily>().unwrap(), ModelFamily::Msm);
        assert!("LFM".parse::<ModelFamily>().is_err());

        assert_eq!("retrieve".parse::<SourceMode>().unwrap(), SourceMode::Retrieve);
        assert_eq!(
            "force_retrieve".parse::<SourceMode>().unwrap(),
            SourceMode::ForceRetrieve
        );
        assert_eq!(
            "/data/gpv".parse::<SourceMode>().unwrap(),
            SourceMode::Directory(PathBuf::from("/data/gpv"))
        );
        assert!(matches!(
            "".parse::<SourceMode>(),
            Err(ConfigError::MissingParameter(_))
        ));
    }
}
