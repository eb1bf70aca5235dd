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

//! Module containing the forecast processing code.
//!
//! A run goes through the following steps:
//!
//! 1. Configuration file and command line are read and checked,
//!    unsupported values fail before any file is accessed.
//! 2. Requested lead times are resolved to source files and records
//!    of the JMA GPV archive ([`resolver`]).
//! 3. Source files are found locally or downloaded and converted
//!    from GRIB2 to NetCDF ([`retrieval`]).
//! 4. Fields are read and scaled ([`reader`], [`extractor`]),
//!    derived quantities computed ([`thermo`]) and the product
//!    written ([`writer`], [`products`]).

mod bisection;
mod configuration;
mod extractor;
mod forecast;
mod products;
mod reader;
mod resolver;
mod retrieval;
mod thermo;
mod writer;

#[cfg(test)]
mod super_tests;

use crate::{
    errors::RunError,
    gpv::{
        configuration::{Args, Config, RunSpec},
        retrieval::Retriever,
    },
    ALLOCATOR,
};
use clap::Parser;
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use std::{fs, path::Path};

/// Main processing function.
///
/// Reads the configuration, prepares the runtime
/// and computes the requested product.
pub fn main() -> Result<(), RunError> {
    info!("Preparing the run");

    let args = Args::parse();
    let core = Core::new(&args)?;

    prepare_output_dir(&core.config.output.directory)?;

    let output = products::run(&core.spec, &core.config, &core.retriever)?;

    info!("Product written to {}", output.display());

    Ok(())
}

/// Checked configuration and components shared by the whole run.
pub struct Core {
    pub config: Config,
    pub spec: RunSpec,
    pub retriever: Retriever,
}

impl Core {
    /// [`Core`] constructor.
    ///
    /// Configuration is fully checked before the
    /// runtime is set up and anything is downloaded.
    pub fn new(args: &Args) -> Result<Self, RunError> {
        debug!("Reading configuration from {}", args.config.display());
        let config = Config::new_from_args(args)?;
        let spec = config.run_spec()?;

        debug!("Setting memory limit");
        if ALLOCATOR
            .set_limit(config.resources.memory.saturating_mul(1024 * 1024))
            .is_err()
        {
            warn!("Memory limit is lower than already allocated memory, leaving it unset");
        }

        debug!("Setting up ThreadPool");
        ThreadPoolBuilder::new()
            .num_threads(config.resources.threads as usize)
            .build_global()?;

        let retriever = Retriever::from_archive(&config.archive);

        Ok(Core {
            config,
            spec,
            retriever,
        })
    }
}

/// Creates output directory when it does not exist.
fn prepare_output_dir(out_path: &Path) -> Result<(), RunError> {
    debug!("Checking and setting output directory");

    if out_path.is_dir() {
        debug!("Output directory exists so continuing");
    } else if out_path.exists() {
        return Err(RunError::FaultyOutput(
            "Output path exists and is not a directory",
        ));
    } else {
        debug!("Output directory does not exist so creating a new one");
        fs::create_dir_all(out_path)?;
    }

    Ok(())
}
