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

//! Module responsible for making archive files available locally.
//!
//! Files are looked up in the working directory and in the data root
//! first (converted before packed), downloaded from the archive only
//! when nothing usable is found, and converted from GRIB2 to NetCDF
//! with an external tool whenever the match is not already converted.
//!
//! The existence check and the download are not atomic, so parallel
//! runs of the same forecast should be serialized by the caller.

use super::configuration::Archive;
use super::forecast::SourceMode;
use super::resolver::SourceFile;
use crate::errors::{ConversionError, RetrievalError, SourceError};
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

/// Downloads a single file from given URL.
pub trait Fetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), RetrievalError>;
}

/// Converts a GRIB2 file into NetCDF.
pub trait Converter {
    fn convert(&self, packed: &Path, converted: &Path) -> Result<(), ConversionError>;
}

/// Blocking HTTP download of the whole file.
#[derive(Debug, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), RetrievalError> {
        info!("Downloading {}", url);

        let response = reqwest::blocking::get(url)?;

        if !response.status().is_success() {
            return Err(RetrievalError::DownloadFailed(
                url.to_string(),
                response.status().as_u16(),
            ));
        }

        let body = response.bytes()?;
        fs::write(destination, &body)?;

        debug!("Stored {} bytes in {}", body.len(), destination.display());

        Ok(())
    }
}

/// Runs `wgrib2 <packed> -netcdf <converted>`.
///
/// Only the existence of the output file is
/// checked afterwards, exit code is ignored.
#[derive(Debug)]
pub struct Wgrib2Converter {
    executable: PathBuf,
}

impl Wgrib2Converter {
    pub fn new(executable: &Path) -> Self {
        Wgrib2Converter {
            executable: executable.to_path_buf(),
        }
    }
}

impl Converter for Wgrib2Converter {
    fn convert(&self, packed: &Path, converted: &Path) -> Result<(), ConversionError> {
        info!("Converting {} to NetCDF", packed.display());

        let output = Command::new(&self.executable)
            .arg(packed)
            .arg("-netcdf")
            .arg(converted)
            .output()
            .map_err(|err| ConversionError::CantSpawn(self.executable.display().to_string(), err))?;

        debug!("{}", String::from_utf8_lossy(&output.stdout));

        Ok(())
    }
}

/// Local file found during search and
/// whether it still needs conversion.
#[derive(Clone, PartialEq, Eq, Debug)]
struct LocalMatch {
    path: PathBuf,
    needs_conversion: bool,
}

/// Component providing paths to converted source files.
pub struct Retriever {
    base_url: String,
    data_root: PathBuf,
    work_dir: PathBuf,
    fetcher: Box<dyn Fetcher>,
    converter: Box<dyn Converter>,
}

impl Retriever {
    pub fn new(
        archive: &Archive,
        fetcher: Box<dyn Fetcher>,
        converter: Box<dyn Converter>,
    ) -> Self {
        Retriever {
            base_url: archive.base_url.trim_end_matches('/').to_string(),
            data_root: archive.data_root.clone(),
            work_dir: PathBuf::from("."),
            fetcher,
            converter,
        }
    }

    /// Retriever using HTTP and `wgrib2` (or the configured converter).
    pub fn from_archive(archive: &Archive) -> Self {
        Retriever::new(
            archive,
            Box::new(HttpFetcher),
            Box::new(Wgrib2Converter::new(&archive.converter)),
        )
    }

    /// Sets the directory where downloaded and converted
    /// files are written (current directory by default).
    pub fn with_work_dir(mut self, work_dir: &Path) -> Self {
        self.work_dir = work_dir.to_path_buf();
        self
    }

    /// URL of the packed file in the remote archive.
    pub fn archive_url(&self, file: &SourceFile) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            file.run.archive_partition(),
            file.packed_name()
        )
    }

    /// Returns path of the converted file according to the source mode.
    ///
    /// In directory mode the path is only composed, the file
    /// is expected to be already converted there.
    pub fn locate(&self, file: &SourceFile, mode: &SourceMode) -> Result<PathBuf, SourceError> {
        match mode {
            SourceMode::Retrieve => self.ensure(file, false),
            SourceMode::ForceRetrieve => self.ensure(file, true),
            SourceMode::Directory(dir) => Ok(dir.join(file.converted_name())),
        }
    }

    /// Makes sure the converted file exists locally and returns its path.
    pub fn ensure(&self, file: &SourceFile, force: bool) -> Result<PathBuf, SourceError> {
        let converted = self.work_dir.join(file.converted_name());

        let found = if force { None } else { self.search(file) };

        let source = match found {
            Some(LocalMatch {
                path,
                needs_conversion: false,
            }) => {
                debug!("Using existing {}", path.display());
                return Ok(path);
            }
            Some(LocalMatch { path, .. }) => path,
            None => self.download(file)?,
        };

        self.converter.convert(&source, &converted)?;

        if !converted.is_file() {
            return Err(ConversionError::NoOutput(converted).into());
        }

        Ok(converted)
    }

    /// First existing candidate in order: converted and packed
    /// in working directory, converted and packed in data root.
    fn search(&self, file: &SourceFile) -> Option<LocalMatch> {
        let converted = file.converted_name();
        let packed = file.packed_name();

        let candidates = [
            (self.work_dir.join(&converted), false),
            (self.work_dir.join(&packed), true),
            (self.data_root.join(&converted), false),
            (self.data_root.join(&packed), true),
        ];

        candidates
            .into_iter()
            .find(|(path, _)| path.is_file())
            .map(|(path, needs_conversion)| LocalMatch {
                path,
                needs_conversion,
            })
    }

    fn download(&self, file: &SourceFile) -> Result<PathBuf, RetrievalError> {
        let destination = self.work_dir.join(file.packed_name());
        let url = self.archive_url(file);

        self.fetcher.fetch(&url, &destination)?;

        if !destination.is_file() {
            return Err(RetrievalError::NoFile(destination));
        }

        Ok(destination)
    }
}
