//! H3 hexagonal pre-screening.

use crate::objectives::SiteEvaluation;
use crate::optimizer::TerrainOptimizer;
use crate::{OptimizerError, Result};
use h3o::{CellIndex, LatLng, Resolution};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::info;
use vantage_dem::TileBounds;

/// Suitability of one hexagonal cell, scored at its centre.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HexCellScore {
    /// Canonical hexadecimal cell index.
    pub cell: String,
    pub resolution: u8,
    pub evaluation: SiteEvaluation,
}

/// Parse a resolution in 0..=15.
pub fn parse_resolution(resolution: u8) -> Result<Resolution> {
    Resolution::try_from(resolution).map_err(|e| OptimizerError::InvalidCell(e.to_string()))
}

/// Parse hexadecimal cell indices.
pub fn parse_cells<S: AsRef<str>>(cells: &[S]) -> Result<Vec<CellIndex>> {
    cells
        .iter()
        .map(|s| {
            s.as_ref()
                .parse::<CellIndex>()
                .map_err(|e| OptimizerError::InvalidCell(format!("{}: {e}", s.as_ref())))
        })
        .collect()
}

/// Cell containing a point.
pub fn cell_at(lat: f64, lon: f64, resolution: Resolution) -> Result<CellIndex> {
    if !((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)) {
        return Err(OptimizerError::InvalidCell(format!("coordinate ({lat}, {lon}) is off the globe")));
    }
    let coord = LatLng::new(lat, lon).map_err(|e| OptimizerError::InvalidCell(e.to_string()))?;
    Ok(coord.to_cell(resolution))
}

/// Centre of a cell as (lat, lon) degrees.
pub fn cell_center(cell: CellIndex) -> (f64, f64) {
    let center = LatLng::from(cell);
    (center.lat(), center.lng())
}

/// Cells whose centres fall inside `bounds`, in index order.
///
/// The box is sampled at a third of the cell edge length so no cell is
/// skipped between samples.
pub fn cells_for_region(bounds: &TileBounds, resolution: Resolution) -> Result<Vec<CellIndex>> {
    bounds.validate()?;
    let step_km = resolution.edge_length_km() / 3.0;
    let lat_step = step_km / 111.32;
    let lon_step = step_km / (111.32 * bounds.center().0.to_radians().cos().max(1e-6));

    let mut cells = BTreeSet::new();
    let mut lat = bounds.min_lat;
    while lat <= bounds.max_lat + lat_step {
        let mut lon = bounds.min_lon;
        while lon <= bounds.max_lon + lon_step {
            let cell = cell_at(lat.min(90.0), lon.min(180.0), resolution)?;
            cells.insert(cell);
            lon += lon_step;
        }
        lat += lat_step;
    }

    Ok(cells
        .into_iter()
        .filter(|cell| {
            let (lat, lon) = cell_center(*cell);
            bounds.contains(lat, lon)
        })
        .collect())
}

/// Cells plus every cell within `k` rings of them, deduplicated and sorted.
pub fn expand_cells(cells: &[CellIndex], k: u32) -> Vec<CellIndex> {
    let mut expanded = BTreeSet::new();
    for cell in cells {
        let disk: Vec<CellIndex> = cell.grid_disk(k);
        expanded.extend(disk);
    }
    expanded.into_iter().collect()
}

impl TerrainOptimizer {
    /// Score every cell centre and return the cells best first.
    ///
    /// Cells whose centre lies in an exclusion zone are skipped; if that
    /// leaves nothing, [`OptimizerError::NoFeasibleSite`] is returned.
    pub fn optimize_h3_grid(&self, cells: &[CellIndex]) -> Result<Vec<HexCellScore>> {
        let constraints = &self.config().constraints;
        let feasible: Vec<(CellIndex, (f64, f64))> = cells
            .iter()
            .map(|&cell| (cell, cell_center(cell)))
            .filter(|(_, (lat, lon))| !constraints.is_excluded(*lat, *lon))
            .collect();
        if feasible.is_empty() {
            return Err(OptimizerError::NoFeasibleSite { considered: cells.len() });
        }

        let mut scored: Vec<HexCellScore> = feasible
            .par_iter()
            .map(|&(cell, (lat, lon))| -> Result<HexCellScore> {
                Ok(HexCellScore {
                    cell: cell.to_string(),
                    resolution: u8::from(cell.resolution()),
                    evaluation: self.evaluator().evaluate(lat, lon, "hexgrid")?,
                })
            })
            .collect::<Result<_>>()?;

        scored.sort_by(|a, b| {
            b.evaluation
                .aggregate_score
                .partial_cmp(&a.evaluation.aggregate_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cell.cmp(&b.cell))
        });
        info!(cells = scored.len(), skipped = cells.len() - scored.len(), "Scored hex cells");
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_round_trip() {
        let resolution = parse_resolution(7).unwrap();
        let cell = cell_at(37.77, -122.42, resolution).unwrap();
        let parsed = parse_cells(&[cell.to_string()]).unwrap();
        assert_eq!(parsed, vec![cell]);

        let (lat, lon) = cell_center(cell);
        assert!((lat - 37.77).abs() < 0.05);
        assert!((lon + 122.42).abs() < 0.05);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(parse_resolution(16), Err(OptimizerError::InvalidCell(_))));
        assert!(matches!(parse_cells(&["not-a-cell"]), Err(OptimizerError::InvalidCell(_))));
        assert!(matches!(
            cell_at(95.0, 0.0, Resolution::Five),
            Err(OptimizerError::InvalidCell(_))
        ));
    }

    #[test]
    fn test_region_cells_have_centres_inside() {
        let bounds = TileBounds::new(40.0, 40.5, -105.5, -105.0).unwrap();
        let cells = cells_for_region(&bounds, Resolution::Six).unwrap();
        // ~36 km² per resolution-6 cell over a ~2350 km² box
        assert!(cells.len() > 40 && cells.len() < 100, "got {}", cells.len());
        for cell in &cells {
            let (lat, lon) = cell_center(*cell);
            assert!(bounds.contains(lat, lon));
        }
    }

    #[test]
    fn test_expand_cells_grid_disk() {
        let cell = cell_at(0.5, 0.5, Resolution::Eight).unwrap();
        let ring1 = expand_cells(&[cell], 1);
        assert_eq!(ring1.len(), 7);
        assert!(ring1.contains(&cell));
        assert_eq!(expand_cells(&[cell, cell], 2).len(), 19);
    }
}
