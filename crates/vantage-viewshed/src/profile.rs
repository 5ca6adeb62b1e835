//! Point-to-point elevation profiles with line-of-sight and Fresnel clearance.

use crate::params::ViewshedParams;
use crate::viewshed::ViewshedCalculator;
use crate::{Result, ViewshedError};
use tracing::debug;
use vantage_dem::geo::haversine_distance;
use vantage_dem::{Provenance, TerrainPoint};

/// Share of the first Fresnel zone that must be clear.
pub const FRESNEL_CLEARANCE_FRACTION: f64 = 0.6;

/// Inputs of a profile calculation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileRequest {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    /// Samples including both endpoints.
    pub num_points: usize,
    /// Antenna height above ground at the start, meters.
    pub start_height_m: f64,
    /// Antenna height above ground at the end, meters.
    pub end_height_m: f64,
    /// Frequency for the Fresnel zone; the calculator default when unset.
    pub frequency_mhz: Option<f64>,
}

impl ProfileRequest {
    /// 100-point profile with 10 m antennas at both ends.
    pub fn new(start: (f64, f64), end: (f64, f64)) -> Self {
        Self {
            start_latitude: start.0,
            start_longitude: start.1,
            end_latitude: end.0,
            end_longitude: end.1,
            num_points: 100,
            start_height_m: 10.0,
            end_height_m: 10.0,
            frequency_mhz: None,
        }
    }

    /// Set the sample count.
    pub fn with_points(mut self, num_points: usize) -> Self {
        self.num_points = num_points;
        self
    }

    /// Set both antenna heights.
    pub fn with_heights(mut self, start_m: f64, end_m: f64) -> Self {
        self.start_height_m = start_m;
        self.end_height_m = end_m;
        self
    }

    /// Set the Fresnel frequency.
    pub fn with_frequency(mut self, frequency_mhz: f64) -> Self {
        self.frequency_mhz = Some(frequency_mhz);
        self
    }
}

/// First-zone clearance at one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FresnelClearance {
    /// First Fresnel zone radius, meters.
    pub zone_radius_m: f64,
    /// 60% of the zone radius.
    pub required_clearance_m: f64,
    /// Line of sight minus bulge-raised terrain; negative when terrain pokes through.
    pub actual_clearance_m: f64,
    pub obstructed: bool,
}

impl FresnelClearance {
    /// Clearance of a sample `d1_m` from the start on a path of `total_m`.
    pub fn compute(wavelength_m: f64, d1_m: f64, total_m: f64, actual_clearance_m: f64) -> Self {
        let d2_m = (total_m - d1_m).max(0.0);
        let zone_radius_m = (wavelength_m * d1_m * d2_m / total_m).sqrt();
        let required_clearance_m = FRESNEL_CLEARANCE_FRACTION * zone_radius_m;
        Self {
            zone_radius_m,
            required_clearance_m,
            actual_clearance_m,
            obstructed: actual_clearance_m < required_clearance_m,
        }
    }
}

/// One sample along a profile.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProfileSample {
    /// Distance from the start, kilometers.
    pub distance_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Ground elevation, meters.
    pub elevation_m: f64,
    /// Straight antenna-to-antenna line height, meters.
    pub line_of_sight_m: f64,
    /// Earth bulge under the chord, meters.
    pub earth_bulge_m: f64,
    /// None at the endpoints.
    pub fresnel: Option<FresnelClearance>,
}

/// Terrain and clearance between two points.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElevationProfile {
    pub start: TerrainPoint,
    pub end: TerrainPoint,
    pub start_height_m: f64,
    pub end_height_m: f64,
    /// Great-circle path length, kilometers.
    pub distance_km: f64,
    pub frequency_mhz: f64,
    pub samples: Vec<ProfileSample>,
    pub min_elevation_m: f64,
    pub max_elevation_m: f64,
    /// Sum of rises between consecutive samples.
    pub total_ascent_m: f64,
    /// Sum of drops between consecutive samples.
    pub total_descent_m: f64,
    /// True when every intermediate sample lies below the corrected line.
    pub line_of_sight: bool,
    /// Intermediate samples failing 60% first-zone clearance.
    pub fresnel_obstructed_samples: usize,
    /// Smallest actual/zone-radius ratio over intermediate samples.
    pub min_clearance_ratio: f64,
    pub provenance: Provenance,
}

impl ElevationProfile {
    /// True when no intermediate sample violates Fresnel clearance.
    pub fn fresnel_clear(&self) -> bool {
        self.fresnel_obstructed_samples == 0
    }
}

impl ViewshedCalculator {
    /// Sample the path between two points and evaluate clearance.
    pub fn calculate_elevation_profile(&self, request: &ProfileRequest) -> Result<ElevationProfile> {
        if request.num_points < 2 {
            return Err(ViewshedError::InvalidParameter(format!(
                "num_points must be at least 2, got {}",
                request.num_points
            )));
        }
        let frequency_mhz = request.frequency_mhz.unwrap_or(self.params().frequency_mhz);
        if !(frequency_mhz.is_finite() && frequency_mhz > 0.0) {
            return Err(ViewshedError::InvalidParameter(format!(
                "frequency_mhz must be positive, got {frequency_mhz}"
            )));
        }

        let start = (request.start_latitude, request.start_longitude);
        let end = (request.end_latitude, request.end_longitude);
        let points = self.pipeline().sample_line(start, end, request.num_points)?;
        let total_m = haversine_distance(start.0, start.1, end.0, end.1);
        if total_m <= 0.0 {
            return Err(ViewshedError::InvalidParameter(
                "start and end points coincide".to_string(),
            ));
        }

        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(ViewshedError::InvalidParameter("empty profile".to_string()));
        };
        let start_alt_m = first.elevation + request.start_height_m;
        let end_alt_m = last.elevation + request.end_height_m;
        let wavelength_m = ViewshedParams::wavelength_m(frequency_mhz);
        let last_index = points.len() - 1;

        let mut provenance = Provenance::default();
        let mut samples = Vec::with_capacity(points.len());
        let mut line_of_sight = true;
        let mut fresnel_obstructed_samples = 0;
        let mut min_clearance_ratio = f64::INFINITY;

        for (index, point) in points.iter().enumerate() {
            provenance.record(&point.source);
            let d1_m = total_m * index as f64 / last_index as f64;
            let line_of_sight_m = start_alt_m + (end_alt_m - start_alt_m) * d1_m / total_m;
            let earth_bulge_m = self.params().earth_bulge_m(d1_m, total_m - d1_m);

            let fresnel = if index == 0 || index == last_index {
                None
            } else {
                let actual_m = line_of_sight_m - (point.elevation + earth_bulge_m);
                if actual_m <= 0.0 {
                    line_of_sight = false;
                }
                let clearance = FresnelClearance::compute(wavelength_m, d1_m, total_m, actual_m);
                if clearance.obstructed {
                    fresnel_obstructed_samples += 1;
                }
                if clearance.zone_radius_m > 0.0 {
                    min_clearance_ratio = min_clearance_ratio.min(actual_m / clearance.zone_radius_m);
                }
                Some(clearance)
            };

            samples.push(ProfileSample {
                distance_km: d1_m / 1000.0,
                latitude: point.latitude,
                longitude: point.longitude,
                elevation_m: point.elevation,
                line_of_sight_m,
                earth_bulge_m,
                fresnel,
            });
        }

        let mut total_ascent_m = 0.0;
        let mut total_descent_m = 0.0;
        for pair in points.windows(2) {
            let delta = pair[1].elevation - pair[0].elevation;
            if delta > 0.0 {
                total_ascent_m += delta;
            } else {
                total_descent_m -= delta;
            }
        }

        let min_elevation_m = points.iter().map(|p| p.elevation).fold(f64::INFINITY, f64::min);
        let max_elevation_m = points.iter().map(|p| p.elevation).fold(f64::NEG_INFINITY, f64::max);

        debug!(
            distance_km = total_m / 1000.0,
            line_of_sight,
            fresnel_obstructed_samples,
            "Computed elevation profile"
        );

        Ok(ElevationProfile {
            start: first.clone(),
            end: last.clone(),
            start_height_m: request.start_height_m,
            end_height_m: request.end_height_m,
            distance_km: total_m / 1000.0,
            frequency_mhz,
            samples,
            min_elevation_m,
            max_elevation_m,
            total_ascent_m,
            total_descent_m,
            line_of_sight,
            fresnel_obstructed_samples,
            min_clearance_ratio: if min_clearance_ratio.is_finite() { min_clearance_ratio } else { 0.0 },
            provenance,
        })
    }
}
