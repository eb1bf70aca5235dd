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

//! Module containing constants used by the program.

use crate::Float;

/// Reference pressure (in Pa) for potential temperature.
pub const P0: Float = 100_000.0;

/// Poisson constant for dry air as used in Bolton (1980).
pub const KAPPA: Float = 0.2854;

/// Temperature of the Celsius scale zero point in K.
pub const ZERO_CELSIUS: Float = 273.15;

///Bolton (1980) coefficients for temperature at the lifting condensation level
pub const BOLTON_LCL_A: Float = 55.0;
pub const BOLTON_LCL_B: Float = 2840.0;

///Bolton (1980) coefficients of the equivalent potential temperature formula
pub const BOLTON_THETA_A: Float = 0.28e-3;
pub const BOLTON_THETA_B: Float = 3.376;
pub const BOLTON_THETA_C: Float = 0.00254;
pub const BOLTON_THETA_D: Float = 0.81e-3;

///Bolton (1980) coefficients of saturation vapour pressure over water (Pa, K)
pub const BOLTON_ES_A: Float = 611.2;
pub const BOLTON_ES_B: Float = 17.67;
pub const BOLTON_ES_C: Float = 29.65;

/// Values written by the GRIB to NetCDF converter
/// for gridpoints without data.
pub const UNDEFINED_THRESHOLD: Float = 9.999e20;

/// Default archive of JMA GPV data (Kyoto University RISH).
pub const DEFAULT_ARCHIVE_URL: &str =
    "http://database.rish.kyoto-u.ac.jp/arch/jmadata/data/gpv/original";

/// Default directory searched for already retrieved files.
pub const DEFAULT_DATA_ROOT: &str = "/data";

/// Default GRIB2 to NetCDF converter executable.
pub const DEFAULT_CONVERTER: &str = "wgrib2";

/// Prefix of every JMA GPV file name.
pub const SOURCE_PREFIX: &str = "Z__C_RJTD";

/// Name of the accumulated precipitation variable
/// in converted files.
pub const PRECIPITATION_VAR: &str = "APCP_surface";
