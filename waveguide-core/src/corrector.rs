// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Frequency correction trait, a process-global registry of named
//! correctors, and a TLE/Doppler corrector backed by `sgp4` (spec §4.5).

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::CoreError;

const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;
const EARTH_ROTATION_RAD_S: f64 = 7.292_115_146_7e-5;

/// Something that can adjust a center frequency for a time-varying
/// physical effect (Doppler shift being the motivating case).
pub trait FrequencyCorrector: Send + Sync {
    /// Return the corrected frequency, in Hz, for observation at
    /// `unix_seconds`.
    fn correct(&self, freq_hz: f64, unix_seconds: f64) -> f64;

    fn name(&self) -> &str;
}

fn registry() -> &'static RwLock<HashMap<String, Arc<dyn FrequencyCorrector>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn FrequencyCorrector>>>> =
        OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a corrector under a name, replacing any prior registration
/// with the same name.
pub fn register_corrector(name: impl Into<String>, corrector: Arc<dyn FrequencyCorrector>) {
    registry().write().unwrap().insert(name.into(), corrector);
}

pub fn lookup_corrector(name: &str) -> Option<Arc<dyn FrequencyCorrector>> {
    registry().read().unwrap().get(name).cloned()
}

pub fn unregister_corrector(name: &str) -> Option<Arc<dyn FrequencyCorrector>> {
    registry().write().unwrap().remove(name)
}

/// A ground station location, WGS-84 geodetic.
#[derive(Debug, Clone, Copy)]
pub struct GroundStation {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_km: f64,
}

const WGS84_A_KM: f64 = 6378.137;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

impl GroundStation {
    pub fn new(lat_deg: f64, lon_deg: f64, alt_km: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            alt_km,
        }
    }

    /// ECEF position in km.
    fn ecef_km(&self) -> [f64; 3] {
        let lat = self.lat_deg.to_radians();
        let lon = self.lon_deg.to_radians();
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let n = WGS84_A_KM / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let x = (n + self.alt_km) * lat.cos() * lon.cos();
        let y = (n + self.alt_km) * lat.cos() * lon.sin();
        let z = (n * (1.0 - e2) + self.alt_km) * lat.sin();
        [x, y, z]
    }

    /// Position and velocity in the TEME-approximate inertial frame at
    /// the given Greenwich Mean Sidereal Time, km and km/s. The ground
    /// station is fixed in ECEF, so its inertial velocity is purely due
    /// to Earth's rotation.
    fn teme_state(&self, gmst_rad: f64) -> ([f64; 3], [f64; 3]) {
        let [xe, ye, ze] = self.ecef_km();
        let (s, c) = gmst_rad.sin_cos();
        let pos = [xe * c - ye * s, xe * s + ye * c, ze];
        let vel = [
            -EARTH_ROTATION_RAD_S * pos[1],
            EARTH_ROTATION_RAD_S * pos[0],
            0.0,
        ];
        (pos, vel)
    }
}

/// Greenwich Mean Sidereal Time, in radians, for a Unix timestamp.
/// Standard IAU 1982 polynomial in Julian centuries since J2000.0.
fn gmst_rad(unix_seconds: f64) -> f64 {
    let jd = unix_seconds / 86_400.0 + 2_440_587.5;
    let t = (jd - 2_451_545.0) / 36_525.0;
    let gmst_sec = 67_310.548_41
        + (876_600.0 * 3600.0 + 8_640_184.812_866) * t
        + 0.093_104 * t * t
        - 6.2e-6 * t * t * t;
    let gmst_deg = (gmst_sec % 86_400.0) / 240.0;
    gmst_deg.to_radians().rem_euclid(std::f64::consts::TAU)
}

/// Doppler correction driven by SGP4 orbit propagation.
pub struct TleCorrector {
    name: String,
    elements: sgp4::Elements,
    constants: sgp4::Constants,
    ground: GroundStation,
    epoch_unix: f64,
}

impl TleCorrector {
    pub fn new(
        name: impl Into<String>,
        line1: &str,
        line2: &str,
        ground: GroundStation,
    ) -> Result<Self, CoreError> {
        let elements = sgp4::Elements::from_tle(None, line1.as_bytes(), line2.as_bytes())
            .map_err(|e| CoreError::BadArgument(format!("invalid TLE: {e}")))?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| CoreError::BadArgument(format!("unusable orbital elements: {e}")))?;
        let epoch_unix = parse_tle_epoch_unix(line1)
            .ok_or_else(|| CoreError::BadArgument("could not parse TLE epoch".into()))?;
        Ok(Self {
            name: name.into(),
            elements,
            constants,
            ground,
            epoch_unix,
        })
    }
}

impl FrequencyCorrector for TleCorrector {
    fn correct(&self, freq_hz: f64, unix_seconds: f64) -> f64 {
        let minutes_since_epoch = (unix_seconds - self.epoch_unix) / 60.0;
        let prediction = match self
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes_since_epoch))
        {
            Ok(p) => p,
            Err(_) => return freq_hz,
        };

        let gmst = gmst_rad(unix_seconds);
        let (ground_pos, ground_vel) = self.ground.teme_state(gmst);

        let rel_pos = [
            prediction.position[0] - ground_pos[0],
            prediction.position[1] - ground_pos[1],
            prediction.position[2] - ground_pos[2],
        ];
        let rel_vel = [
            prediction.velocity[0] - ground_vel[0],
            prediction.velocity[1] - ground_vel[1],
            prediction.velocity[2] - ground_vel[2],
        ];

        let range = (rel_pos[0].powi(2) + rel_pos[1].powi(2) + rel_pos[2].powi(2)).sqrt();
        if range < 1e-6 {
            return freq_hz;
        }
        let los = [rel_pos[0] / range, rel_pos[1] / range, rel_pos[2] / range];
        let radial_velocity = rel_vel[0] * los[0] + rel_vel[1] * los[1] + rel_vel[2] * los[2];

        freq_hz * (1.0 - radial_velocity / SPEED_OF_LIGHT_KM_S)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parse the epoch field of TLE line 1 (columns 19-32, `YYDDD.DDDDDDDD`)
/// into Unix seconds.
fn parse_tle_epoch_unix(line1: &str) -> Option<f64> {
    let field = line1.get(18..32)?.trim();
    if field.len() < 5 {
        return None;
    }
    let yy: i32 = field.get(0..2)?.parse().ok()?;
    let day_frac: f64 = field.get(2..)?.parse().ok()?;
    let year = if yy < 57 { 2000 + yy } else { 1900 + yy };

    // Days (1-based, fractional) since Jan 1 of `year` -> Unix seconds.
    let jan1 = days_from_civil(year, 1, 1);
    let unix_day = jan1 as f64 + (day_frac - 1.0);
    Some(unix_day * 86_400.0)
}

/// Howard Hinnant's civil-from-days algorithm, days since the Unix epoch
/// for the given proleptic-Gregorian y/m/d.
fn days_from_civil(y: i32, m: i32, d: i32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y } as i64;
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as i64;
    let mp = ((m as i64 + 9) % 12) as i64;
    let doy = (153 * mp + 2) / 5 + d as i64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}
