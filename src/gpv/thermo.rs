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

//! Module with derived thermodynamic and kinematic fields.
//!
//! Equivalent potential temperature follows Bolton (1980),
//! eq. 43 with the LCL temperature from eq. 22 and saturation
//! vapour pressure from eq. 10. Eq. 10 stays usable well below
//! the 500 hPa temperatures of a winter forecast.

use crate::constants::{
    BOLTON_ES_A, BOLTON_ES_B, BOLTON_ES_C, BOLTON_LCL_A, BOLTON_LCL_B, BOLTON_THETA_A,
    BOLTON_THETA_B, BOLTON_THETA_C, BOLTON_THETA_D, KAPPA, P0, ZERO_CELSIUS,
};
use crate::errors::ThermoError;
use crate::Float;
use floccus::mixing_ratio;
use ndarray::{Array2, Zip};

/// Dry potential temperature (K) from pressure (Pa) and temperature (K).
pub fn potential_temperature(pressure: Float, temperature: Float) -> Float {
    temperature * (P0 / pressure).powf(KAPPA)
}

/// Saturation vapour pressure over water (Pa) at given temperature (K).
pub fn saturation_vapour_pressure(temperature: Float) -> Float {
    BOLTON_ES_A * (BOLTON_ES_B * (temperature - ZERO_CELSIUS) / (temperature - BOLTON_ES_C)).exp()
}

/// Equivalent potential temperature (K) from pressure (Pa),
/// temperature (K) and relative humidity (%).
pub fn equivalent_potential_temperature(
    pressure: Float,
    temperature: Float,
    relative_humidity: Float,
) -> Result<Float, ThermoError> {
    if !temperature.is_finite() || temperature <= BOLTON_LCL_A {
        return Err(ThermoError::OutOfBounds(format!("temperature {} K", temperature)));
    }

    let rh = relative_humidity.max(0.0) / 100.0;

    let sat_mxng_rto =
        mixing_ratio::general1(pressure, saturation_vapour_pressure(temperature))
            .map_err(|err| ThermoError::OutOfBounds(err.to_string()))?;

    // g/kg
    let mxng_rto = rh * sat_mxng_rto * 1000.0;

    if mxng_rto <= 0.0 {
        return Ok(potential_temperature(pressure, temperature));
    }

    let theta = temperature
        * (P0 / pressure).powf(KAPPA * (1.0 - BOLTON_THETA_A * mxng_rto));

    let lcl_temp =
        1.0 / (1.0 / (temperature - BOLTON_LCL_A) - rh.ln() / BOLTON_LCL_B) + BOLTON_LCL_A;

    Ok(theta
        * ((BOLTON_THETA_B / lcl_temp - BOLTON_THETA_C)
            * mxng_rto
            * (1.0 + BOLTON_THETA_D * mxng_rto))
            .exp())
}

/// Equivalent potential temperature of saturated air.
pub fn saturated_equivalent_potential_temperature(
    pressure: Float,
    temperature: Float,
) -> Result<Float, ThermoError> {
    equivalent_potential_temperature(pressure, temperature, 100.0)
}

/// Equivalent and saturated equivalent potential temperature fields.
pub fn theta_e_fields(
    pressure: &Array2<Float>,
    temperature: &Array2<Float>,
    relative_humidity: &Array2<Float>,
) -> Result<(Array2<Float>, Array2<Float>), ThermoError> {
    if pressure.dim() != temperature.dim() || temperature.dim() != relative_humidity.dim() {
        return Err(ThermoError::ShapeMismatch);
    }

    let theta_e = Zip::from(pressure)
        .and(temperature)
        .and(relative_humidity)
        .par_map_collect(|&p, &t, &rh| equivalent_potential_temperature(p, t, rh));

    let theta_es = Zip::from(pressure)
        .and(temperature)
        .par_map_collect(|&p, &t| saturated_equivalent_potential_temperature(p, t));

    Ok((collect_field(theta_e)?, collect_field(theta_es)?))
}

/// Same as [`theta_e_fields`] on a constant pressure level.
pub fn theta_e_fields_on_level(
    pressure: Float,
    temperature: &Array2<Float>,
    relative_humidity: &Array2<Float>,
) -> Result<(Array2<Float>, Array2<Float>), ThermoError> {
    let pressure = Array2::from_elem(temperature.raw_dim(), pressure);
    theta_e_fields(&pressure, temperature, relative_humidity)
}

/// Stability index: upper minus lower equivalent potential temperature.
pub fn stability(
    theta_e_upper: &Array2<Float>,
    theta_e_lower: &Array2<Float>,
) -> Result<Array2<Float>, ThermoError> {
    if theta_e_upper.dim() != theta_e_lower.dim() {
        return Err(ThermoError::ShapeMismatch);
    }

    Ok(theta_e_upper - theta_e_lower)
}

/// Horizontal wind speed from its components.
pub fn wind_speed(
    u_wind: &Array2<Float>,
    v_wind: &Array2<Float>,
) -> Result<Array2<Float>, ThermoError> {
    if u_wind.dim() != v_wind.dim() {
        return Err(ThermoError::ShapeMismatch);
    }

    Ok(Zip::from(u_wind)
        .and(v_wind)
        .map_collect(|&u, &v| u.hypot(v)))
}

fn collect_field(
    field: Array2<Result<Float, ThermoError>>,
) -> Result<Array2<Float>, ThermoError> {
    let dim = field.raw_dim();
    let values = field.into_iter().collect::<Result<Vec<Float>, ThermoError>>()?;

    Array2::from_shape_vec(dim, values).map_err(|_| ThermoError::ShapeMismatch)
}
