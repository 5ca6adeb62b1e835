//! Site constraints and random feasible placement.

use rand::Rng;
use vantage_dem::geo::distance_km;
use vantage_dem::TileBounds;

/// Circular area where no site may be placed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExclusionZone {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

impl ExclusionZone {
    pub fn new(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        Self {
            latitude,
            longitude,
            radius_km,
        }
    }

    /// True when the point lies inside the circle (boundary included).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        distance_km(self.latitude, self.longitude, lat, lon) <= self.radius_km
    }
}

/// Constraints applied to every candidate before evaluation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SiteConstraints {
    /// Minimum distance between accepted sites, kilometers (0 disables).
    pub min_separation_km: f64,
    pub exclusion_zones: Vec<ExclusionZone>,
    /// Random draws tried per site before giving up on it.
    pub max_placement_attempts: usize,
}

impl Default for SiteConstraints {
    fn default() -> Self {
        Self {
            min_separation_km: 0.0,
            exclusion_zones: Vec::new(),
            max_placement_attempts: 20,
        }
    }
}

impl SiteConstraints {
    /// True when the point falls inside any exclusion zone.
    pub fn is_excluded(&self, lat: f64, lon: f64) -> bool {
        self.exclusion_zones.iter().any(|zone| zone.contains(lat, lon))
    }

    /// True when the point keeps the minimum separation from every accepted site.
    pub fn is_separated(&self, lat: f64, lon: f64, accepted: &[(f64, f64)]) -> bool {
        self.min_separation_km <= 0.0
            || accepted
                .iter()
                .all(|&(a_lat, a_lon)| distance_km(lat, lon, a_lat, a_lon) >= self.min_separation_km)
    }

    /// True when the point may join `accepted`.
    pub fn is_feasible(&self, lat: f64, lon: f64, accepted: &[(f64, f64)]) -> bool {
        !self.is_excluded(lat, lon) && self.is_separated(lat, lon, accepted)
    }

    /// Keep candidates in order, dropping excluded ones and any closer than
    /// the minimum separation to an earlier survivor.
    pub fn filter_feasible(&self, candidates: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let mut accepted = Vec::with_capacity(candidates.len());
        for &(lat, lon) in candidates {
            if self.is_feasible(lat, lon, &accepted) {
                accepted.push((lat, lon));
            }
        }
        accepted
    }

    /// Draw up to `count` random feasible points inside `area`.
    ///
    /// Each site gets `max_placement_attempts` draws; a site that never lands
    /// on a feasible spot is dropped, so fewer than `count` may come back.
    pub fn place_random<R: Rng + ?Sized>(&self, area: &TileBounds, count: usize, rng: &mut R) -> Vec<(f64, f64)> {
        let mut accepted = Vec::with_capacity(count);
        for _ in 0..count {
            for _ in 0..self.max_placement_attempts.max(1) {
                let (lat, lon) = random_point(area, rng);
                if self.is_feasible(lat, lon, &accepted) {
                    accepted.push((lat, lon));
                    break;
                }
            }
        }
        accepted
    }
}

/// Uniform point inside a box.
pub fn random_point<R: Rng + ?Sized>(area: &TileBounds, rng: &mut R) -> (f64, f64) {
    let lat = area.min_lat + rng.gen::<f64>() * area.lat_span();
    let lon = area.min_lon + rng.gen::<f64>() * area.lon_span();
    (lat, lon)
}

/// Clamp a point into a box.
pub fn clamp_to(area: &TileBounds, lat: f64, lon: f64) -> (f64, f64) {
    (lat.clamp(area.min_lat, area.max_lat), lon.clamp(area.min_lon, area.max_lon))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn area() -> TileBounds {
        TileBounds::new(10.0, 11.0, 20.0, 21.0).unwrap()
    }

    #[test]
    fn test_exclusion_zone() {
        let zone = ExclusionZone::new(10.5, 20.5, 5.0);
        assert!(zone.contains(10.5, 20.5));
        assert!(zone.contains(10.52, 20.5));
        assert!(!zone.contains(10.6, 20.5));
    }

    #[test]
    fn test_filter_feasible_keeps_order() {
        let constraints = SiteConstraints {
            min_separation_km: 10.0,
            exclusion_zones: vec![ExclusionZone::new(10.9, 20.9, 3.0)],
            ..Default::default()
        };
        let candidates = [(10.1, 20.1), (10.12, 20.1), (10.9, 20.9), (10.5, 20.5)];
        let feasible = constraints.filter_feasible(&candidates);
        assert_eq!(feasible, vec![(10.1, 20.1), (10.5, 20.5)]);
    }

    #[test]
    fn test_place_random_respects_constraints() {
        let constraints = SiteConstraints {
            min_separation_km: 20.0,
            exclusion_zones: vec![ExclusionZone::new(10.5, 20.5, 15.0)],
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let sites = constraints.place_random(&area(), 6, &mut rng);

        assert!(!sites.is_empty());
        for (i, &(lat, lon)) in sites.iter().enumerate() {
            assert!(area().contains(lat, lon));
            assert!(!constraints.is_excluded(lat, lon));
            assert!(constraints.is_separated(lat, lon, &sites[..i]));
        }
    }

    #[test]
    fn test_place_random_fully_excluded() {
        let constraints = SiteConstraints {
            exclusion_zones: vec![ExclusionZone::new(10.5, 20.5, 500.0)],
            max_placement_attempts: 5,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(constraints.place_random(&area(), 4, &mut rng).is_empty());
    }
}
