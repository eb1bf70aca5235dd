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

//! GPV Kit extracts analysis-ready data from the grid point value (GPV)
//! forecasts of the Japan Meteorological Agency global (GSM) and
//! meso-scale (MSM) models.
//!
//! Given a forecast run and lead times it finds which archive file and
//! record hold each lead time, downloads and converts the files when
//! needed, reads correctly scaled physical fields (with model specific
//! handling of precipitation) and writes NetCDF or CSV products.

mod constants;
mod errors;
mod gpv;

use cap::Cap;
use env_logger::Env;
use log::{error, info};
use std::alloc;

type Float = f64;

/// Global allocator used by the program.
///
/// Use of static global allocator allows for capping the memory to the limit set by user
/// in configuration file and in effect provide better [OOM error](https://en.wikipedia.org/wiki/Out_of_memory) handling.
#[global_allocator]
static ALLOCATOR: Cap<alloc::System> = Cap::new(alloc::System, usize::MAX);

/// The main program function.
/// Prepares the runtime environment and calls the [`gpv::main`].
///
/// The `env_logger` needs to be initiated before
/// any log messages are possible to occur.
fn main() {
    #[cfg(not(feature = "debug"))]
    let logger_env = Env::new().filter_or("GPVKIT_LOG_LEVEL", "info");

    #[cfg(feature = "debug")]
    let logger_env = Env::new().filter_or("GPVKIT_LOG_LEVEL", "debug");

    env_logger::Builder::from_env(logger_env)
        .format_timestamp_millis()
        .init();

    match gpv::main() {
        Ok(_) => info!("Processing finished. Check the output directory and log."),
        Err(err) => {
            error!("Processing failed with error: {}", err);
            std::process::exit(1);
        }
    }
}
