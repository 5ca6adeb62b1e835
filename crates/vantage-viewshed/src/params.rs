//! Physical and sampling parameters shared by every analysis.

use vantage_dem::geo::EARTH_RADIUS_M;

/// Speed of light in m/s.
const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// Construction-time parameters of a [`ViewshedCalculator`](crate::ViewshedCalculator).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ViewshedParams {
    /// Earth radius in meters.
    pub earth_radius_m: f64,
    /// Atmospheric refraction coefficient; the curvature factor is `1 + coefficient`.
    pub refraction_coefficient: f64,
    /// Distance between samples along a ray, in meters.
    pub sample_spacing_m: f64,
    /// Default frequency for Fresnel-zone calculations, in MHz.
    pub frequency_mhz: f64,
    /// Obstructions with severity above this count as high severity.
    pub high_severity_threshold: f64,
}

impl Default for ViewshedParams {
    fn default() -> Self {
        Self {
            earth_radius_m: EARTH_RADIUS_M,
            refraction_coefficient: 0.13,
            sample_spacing_m: 250.0,
            frequency_mhz: 2400.0,
            high_severity_threshold: 0.7,
        }
    }
}

impl ViewshedParams {
    /// Curvature factor `k`.
    pub fn k_factor(&self) -> f64 {
        1.0 + self.refraction_coefficient
    }

    /// Apparent drop of terrain `distance_m` away, `d² / (2·R·k)`.
    pub fn curvature_drop_m(&self, distance_m: f64) -> f64 {
        distance_m * distance_m / (2.0 * self.earth_radius_m * self.k_factor())
    }

    /// Earth bulge between two path ends, `d1·d2 / (2·R·k)`.
    pub fn earth_bulge_m(&self, d1_m: f64, d2_m: f64) -> f64 {
        d1_m * d2_m / (2.0 * self.earth_radius_m * self.k_factor())
    }

    /// Wavelength in meters of a frequency in MHz.
    pub fn wavelength_m(frequency_mhz: f64) -> f64 {
        SPEED_OF_LIGHT_M_S / (frequency_mhz * 1e6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_curvature_drop() {
        let params = ViewshedParams::default();
        // 10 km: 1e8 / (2 * 6371000 * 1.13) ~= 6.945 m
        assert_relative_eq!(params.curvature_drop_m(10_000.0), 6.945, epsilon = 1e-3);
        assert_relative_eq!(params.earth_bulge_m(5_000.0, 5_000.0), params.curvature_drop_m(10_000.0) / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wavelength() {
        assert_relative_eq!(ViewshedParams::wavelength_m(2400.0), 0.1249, epsilon = 1e-4);
    }
}
