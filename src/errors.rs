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

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Error while reading configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Error while resolving forecast record: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Error while obtaining source file: {0}")]
    Source(#[from] SourceError),

    #[error("Error while reading gridded file: {0}")]
    Reader(#[from] ReaderError),

    #[error("Error while computing derived field: {0}")]
    Thermo(#[from] ThermoError),

    #[error("Error while writing output dataset: {0}")]
    Writer(#[from] WriterError),

    #[error("Error while writing time series: {0}")]
    Series(#[from] csv::Error),

    #[error("Error while searching the grid: {0}")]
    Search(#[from] SearchError),

    #[error("Error while creating ThreadPool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Error while handling output: {0}")]
    FaultyOutput(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot open config file: {0}")]
    CantOpenFile(#[from] std::io::Error),

    #[error("Cannot deserialize config file: {0}")]
    CantDeserialize(#[from] serde_yaml::Error),

    #[error("Configuration component is out of bounds {0}")]
    OutOfBounds(&'static str),

    #[error("Required parameter is missing: {0}")]
    MissingParameter(&'static str),

    #[error("Level type not supported: {0} (expected surface or pressure)")]
    UnsupportedLevelType(String),

    #[error("Model not supported: {0} (expected GSM or MSM)")]
    UnsupportedModel(String),

    #[error("Product not supported: {0}")]
    UnsupportedProduct(String),

    #[error("Cannot parse forecast base time {0}: expected YYYYMMDDHHMMSS")]
    BadTimestamp(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Lead time {lead}h is not aligned with records of chunk {tag} (first {first}h, every {step}h)")]
    UnalignedLeadTime {
        lead: u32,
        tag: &'static str,
        first: u32,
        step: u32,
    },

    #[error("Lead time {0}h exceeds the model horizon of {1}h")]
    LeadTimeOutOfRange(u32, u32),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive responded with status {1} for {0}")]
    DownloadFailed(String, u16),

    #[error("Cannot store downloaded file: {0}")]
    CantStore(#[from] std::io::Error),

    #[error("Download did not produce file {0}")]
    NoFile(PathBuf),
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Cannot run converter {0}: {1}")]
    CantSpawn(String, std::io::Error),

    #[error("Converter did not produce file {0}")]
    NoOutput(PathBuf),
}

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Dimension {0} not found in file")]
    MissingDimension(&'static str),

    #[error("Variable {0} not found in file")]
    MissingVariable(String),

    #[error("Variable {0} has unexpected shape")]
    BadShape(String),

    #[error("Record {0} requested but file holds only {1} records")]
    RecordOutOfRange(usize, usize),

    #[error("Previous cumulative record for +{0}h is held by another file")]
    NoPreviousRecord(u32),

    #[error("Cannot reshape record: {0}")]
    Reshape(#[from] ndarray::ShapeError),
}

#[derive(Error, Debug)]
pub enum ThermoError {
    #[error("Thermodynamic input out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Input fields have different shapes")]
    ShapeMismatch,
}

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Output file {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Cannot remove existing output: {0}")]
    CantRemove(#[from] std::io::Error),

    #[error("Dimension {0} is not defined in output")]
    UndefinedDimension(String),

    #[error("Variable {0} must have from 1 to 4 dimensions")]
    UnsupportedRank(String),

    #[error("Data shape of {0} does not match its dimensions")]
    ShapeMismatch(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SearchError {
    #[error("Searched array is empty")]
    EmptyArray,

    #[error("Searched value is out of array bounds")]
    OutOfBounds,
}
