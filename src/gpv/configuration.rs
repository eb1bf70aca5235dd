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

//! Module responsible for parsing and checking the configuration file
//! and the command line.
//!
//! The configuration file uses [YAML](https://en.wikipedia.org/wiki/YAML)
//! and `serde` to enforce strong typing. The structures and their fields
//! in this module directly correspond to the fields inside `config.yaml`.
//! Command line options override values from the file.
//!
//! Model, level, source and product are kept as strings while
//! deserializing and checked in [`Config::run_spec()`] so that the
//! errors name the unsupported value.

use super::forecast::{ForecastRun, LevelType, ModelFamily, SourceMode};
use super::resolver::SourceKind;
use crate::constants::{DEFAULT_ARCHIVE_URL, DEFAULT_CONVERTER, DEFAULT_DATA_ROOT};
use crate::errors::{ConfigError, ResolveError};
use crate::Float;
use clap::Parser;
use log::warn;
use serde::Deserialize;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Command line options.
#[derive(Parser, Debug)]
#[command(name = "gpvkit")]
#[command(about = "Extracts analysis-ready data from JMA GSM/MSM forecasts")]
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Forecast base time (YYYYMMDDHHMMSS)
    #[arg(long)]
    pub fcst_date: Option<String>,

    /// Model family (GSM or MSM)
    #[arg(long)]
    pub model: Option<String>,

    /// Level type (surface or pressure)
    #[arg(long)]
    pub level: Option<String>,

    /// Source of input files: retrieve, force_retrieve or a directory
    #[arg(long)]
    pub input_dir: Option<String>,

    /// Single lead time in hours
    #[arg(long)]
    pub fcst_time: Option<u32>,

    /// Product to compute
    #[arg(long)]
    pub product: Option<String>,
}

/// Forecast base time written either as a string
/// or as a bare `YYYYMMDDHHMMSS` number.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(u64),
    Text(String),
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Number(n) => write!(f, "{}", n),
            Timestamp::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Lead times (in hours) to process.
///
/// Either a single value or an inclusive range. When a range has no
/// `step`, every lead time available in the source files is taken.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
#[serde(untagged)]
pub enum LeadTimes {
    Single(u32),
    Range {
        start: u32,
        end: u32,
        #[serde(default)]
        step: Option<u32>,
    },
}

impl LeadTimes {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if let LeadTimes::Range { start, end, step } = self {
            if start > end {
                return Err(ConfigError::OutOfBounds(
                    "Lead time range start cannot be after its end",
                ));
            }

            if *step == Some(0) {
                return Err(ConfigError::OutOfBounds("Lead time step cannot be 0"));
            }
        }

        Ok(())
    }

    /// Expands to the list of lead times, rejecting
    /// any that cannot be read from source files of given kind.
    pub fn expand(&self, kind: SourceKind) -> Result<Vec<u32>, ResolveError> {
        let lead_times: Vec<u32> = match *self {
            LeadTimes::Single(lead_time) => vec![lead_time],
            LeadTimes::Range {
                start,
                end,
                step: None,
            } => return Ok(kind.valid_lead_times(start, end)),
            LeadTimes::Range {
                start,
                end,
                step: Some(step),
            } => (start..=end).step_by(step.max(1) as usize).collect(),
        };

        for lead_time in &lead_times {
            kind.resolve(*lead_time)?;
        }

        Ok(lead_times)
    }
}

impl Default for LeadTimes {
    fn default() -> Self {
        LeadTimes::Single(0)
    }
}

/// Fields identifying the forecast and the source files.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Run {
    /// Forecast base time, required (here or on command line).
    #[serde(default)]
    pub base_time: Option<Timestamp>,

    /// _(Optional)_ `GSM` or `MSM`. Defaults to `MSM`.
    #[serde(default = "Run::default_model")]
    pub model: String,

    /// _(Optional)_ `surface` or `pressure`. Defaults to `surface`.
    #[serde(default = "Run::default_level")]
    pub level: String,

    /// `retrieve`, `force_retrieve` or path of a directory
    /// with converted files, required.
    #[serde(default)]
    pub source: Option<String>,

    /// _(Optional)_ Defaults to the analysis time only.
    #[serde(default)]
    pub lead_times: LeadTimes,
}

impl Run {
    fn default_model() -> String {
        "MSM".to_string()
    }

    fn default_level() -> String {
        "surface".to_string()
    }
}

impl Default for Run {
    fn default() -> Self {
        Run {
            base_time: None,
            model: Run::default_model(),
            level: Run::default_level(),
            source: None,
            lead_times: LeadTimes::default(),
        }
    }
}

/// _(Optional)_ Remote archive and local storage of source files.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Archive {
    /// Base URL, files are under `<base_url>/YYYY/MM/DD/`.
    #[serde(default = "Archive::default_base_url")]
    pub base_url: String,

    /// Directory searched for already downloaded files.
    #[serde(default = "Archive::default_data_root")]
    pub data_root: PathBuf,

    /// GRIB2 to NetCDF converter executable.
    #[serde(default = "Archive::default_converter")]
    pub converter: PathBuf,
}

impl Archive {
    fn default_base_url() -> String {
        DEFAULT_ARCHIVE_URL.to_string()
    }

    fn default_data_root() -> PathBuf {
        PathBuf::from(DEFAULT_DATA_ROOT)
    }

    fn default_converter() -> PathBuf {
        PathBuf::from(DEFAULT_CONVERTER)
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::OutOfBounds(
                "Archive base URL must use http or https",
            ));
        }

        Ok(())
    }
}

impl Default for Archive {
    fn default() -> Self {
        Archive {
            base_url: Archive::default_base_url(),
            data_root: Archive::default_data_root(),
            converter: Archive::default_converter(),
        }
    }
}

/// Location for point time series.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Station {
    pub name: String,

    /// Longitude in degrees east, `0 <= lon < 360`
    /// (negative values are shifted).
    pub lon: Float,

    /// Latitude in degrees, `-90 <= lat <= 90`.
    pub lat: Float,
}

impl Station {
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ConfigError::OutOfBounds(
                "Station latitude is too low or too high",
            ));
        }

        if !(-180.0..360.0).contains(&self.lon) {
            return Err(ConfigError::OutOfBounds(
                "Station longitude is too low or too high",
            ));
        }

        Ok(())
    }

    /// Longitude in the `0..360` convention of JMA grids.
    pub fn grid_lon(&self) -> Float {
        if self.lon < 0.0 {
            self.lon + 360.0
        } else {
            self.lon
        }
    }
}

/// _(Optional)_ Where products are written.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize)]
pub struct Output {
    /// Defaults to `output`, created when missing.
    #[serde(default = "Output::default_directory")]
    pub directory: PathBuf,

    /// Replace existing output files. Defaults to `false`.
    #[serde(default)]
    pub overwrite: bool,
}

impl Output {
    fn default_directory() -> PathBuf {
        PathBuf::from("output")
    }
}

impl Default for Output {
    fn default() -> Self {
        Output {
            directory: Output::default_directory(),
            overwrite: false,
        }
    }
}

/// _(Optional)_ Fields with information about
/// resources available for the run.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct Resources {
    /// _(Optional)_ Thread count used for computing derived fields.
    ///
    /// Cannot be less than `1`. Defaults to `1`.
    #[serde(default = "Resources::default_threads")]
    pub threads: u16,

    /// _(Optional)_ Heap memory limit in MB.
    /// Useful for enabling meaningful Out-of-memory error messages.
    ///
    /// Cannot be less than `128`. Defaults to whole addressable-space.
    #[serde(default = "Resources::default_memory")]
    pub memory: usize,
}

impl Resources {
    fn default_threads() -> u16 {
        1
    }

    fn default_memory() -> usize {
        usize::MAX / (1024 * 1024)
    }

    /// Checks if thread count and memory limit are
    /// above limits.
    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        if self.threads < 1 {
            return Err(ConfigError::OutOfBounds(
                "Available threads cannot be less than 1",
            ));
        }

        if self.memory < 128 {
            return Err(ConfigError::OutOfBounds(
                "Available memory cannot be less than 128 MB",
            ));
        }

        Ok(())
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            threads: Resources::default_threads(),
            memory: Resources::default_memory(),
        }
    }
}

/// Analysis-ready outputs that can be computed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProductKind {
    /// Stack of surface fields written to NetCDF.
    SurfaceDataset,
    /// Stack of pressure level fields written to NetCDF.
    PressureDataset,
    /// Precipitation accumulated since the run start.
    RainSum,
    /// Equivalent potential temperature at 850 and 500 hPa.
    Ept,
    /// Surface fields at the station grid point written to CSV.
    PointSeries,
}

impl ProductKind {
    pub fn name(self) -> &'static str {
        match self {
            ProductKind::SurfaceDataset => "surface_dataset",
            ProductKind::PressureDataset => "pressure_dataset",
            ProductKind::RainSum => "rain_sum",
            ProductKind::Ept => "ept",
            ProductKind::PointSeries => "point_series",
        }
    }

    /// Level type of source files the product reads.
    pub fn level(self) -> LevelType {
        match self {
            ProductKind::Ept | ProductKind::PressureDataset => LevelType::Pressure,
            _ => LevelType::Surface,
        }
    }
}

impl FromStr for ProductKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "surface_dataset" => Ok(ProductKind::SurfaceDataset),
            "pressure_dataset" => Ok(ProductKind::PressureDataset),
            "rain_sum" => Ok(ProductKind::RainSum),
            "ept" => Ok(ProductKind::Ept),
            "point_series" => Ok(ProductKind::PointSeries),
            _ => Err(ConfigError::UnsupportedProduct(s.to_string())),
        }
    }
}

/// Checked run parameters.
#[derive(Clone, PartialEq, Debug)]
pub struct RunSpec {
    pub run: ForecastRun,
    pub model: ModelFamily,
    pub level: LevelType,
    pub source: SourceMode,
    pub lead_times: LeadTimes,
    pub product: ProductKind,
}

impl RunSpec {
    pub fn source_kind(&self) -> SourceKind {
        SourceKind::new(self.model, self.level)
    }
}

/// Main config structure representing the fields in
/// configuration file.
#[derive(Clone, PartialEq, Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: Run,

    #[serde(default)]
    pub archive: Archive,

    /// _(Optional)_ Defaults to `surface_dataset`.
    #[serde(default = "Config::default_product")]
    pub product: String,

    /// Required by `point_series` product.
    #[serde(default)]
    pub station: Option<Station>,

    #[serde(default)]
    pub output: Output,

    #[serde(default)]
    pub resources: Resources,
}

impl Config {
    fn default_product() -> String {
        ProductKind::SurfaceDataset.name().to_string()
    }

    /// Config structure constructor, responsible for
    /// deserializing configuration and checking it.
    pub fn new_from_file(file_path: &Path) -> Result<Config, ConfigError> {
        let data = fs::read(file_path)?;
        let config = Config::new_from_slice(data.as_slice())?;

        Ok(config)
    }

    pub fn new_from_slice(data: &[u8]) -> Result<Config, ConfigError> {
        let config: Config = serde_yaml::from_slice(data)?;
        config.check_bounds()?;

        Ok(config)
    }

    /// Reads the file named in command line (defaults
    /// when it does not exist) and applies overrides.
    pub fn new_from_args(args: &Args) -> Result<Config, ConfigError> {
        let mut config = if args.config.is_file() {
            Config::new_from_file(&args.config)?
        } else {
            warn!(
                "Config file {} not found, using defaults",
                args.config.display()
            );
            Config::default()
        };

        config.apply_args(args);
        config.check_bounds()?;

        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) {
        if let Some(fcst_date) = &args.fcst_date {
            self.run.base_time = Some(Timestamp::Text(fcst_date.clone()));
        }

        if let Some(model) = &args.model {
            self.run.model = model.clone();
        }

        if let Some(level) = &args.level {
            self.run.level = level.clone();
        }

        if let Some(input_dir) = &args.input_dir {
            self.run.source = Some(input_dir.clone());
        }

        if let Some(fcst_time) = args.fcst_time {
            self.run.lead_times = LeadTimes::Single(fcst_time);
        }

        if let Some(product) = &args.product {
            self.product = product.clone();
        }
    }

    pub fn check_bounds(&self) -> Result<(), ConfigError> {
        self.run.lead_times.check_bounds()?;
        self.archive.check_bounds()?;
        self.resources.check_bounds()?;

        if let Some(station) = &self.station {
            station.check_bounds()?;
        }

        Ok(())
    }

    /// Parses and cross-checks run parameters,
    /// failing before any file is accessed.
    pub fn run_spec(&self) -> Result<RunSpec, ConfigError> {
        let run = self
            .run
            .base_time
            .as_ref()
            .ok_or(ConfigError::MissingParameter("forecast base time"))?
            .to_string()
            .parse::<ForecastRun>()?;

        let source = self
            .run
            .source
            .as_deref()
            .ok_or(ConfigError::MissingParameter("input directory or retrieve mode"))?
            .parse::<SourceMode>()?;

        let model = self.run.model.parse::<ModelFamily>()?;
        let level = self.run.level.parse::<LevelType>()?;
        let product = self.product.parse::<ProductKind>()?;

        if product.level() != level {
            return Err(ConfigError::OutOfBounds("Level type does not match the product"));
        }

        if product == ProductKind::PointSeries && self.station.is_none() {
            return Err(ConfigError::MissingParameter("station"));
        }

        Ok(RunSpec {
            run,
            model,
            level,
            source,
            lead_times: self.run.lead_times.clone(),
            product,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            run: Run::default(),
            archive: Archive::default(),
            product: Config::default_product(),
            station: None,
            output: Output::default(),
            resources: Resources::default(),
        }
    }
}
