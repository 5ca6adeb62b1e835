//! Obstruction classification and azimuth merging.

/// What kind of feature an obstruction's height suggests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ObstructionClass {
    /// Less than 30 m above the line of sight.
    Vegetation,
    /// 30 to 100 m.
    Building,
    /// 100 to 500 m.
    Ridge,
    /// More than 500 m.
    Mountain,
}

impl ObstructionClass {
    /// Classify by height above the line of sight in meters.
    pub fn from_excess_height(excess_m: f64) -> Self {
        if excess_m < 30.0 {
            ObstructionClass::Vegetation
        } else if excess_m <= 100.0 {
            ObstructionClass::Building
        } else if excess_m <= 500.0 {
            ObstructionClass::Ridge
        } else {
            ObstructionClass::Mountain
        }
    }

    /// Typical attenuation of a fully blocking obstruction of this class (dB).
    pub fn base_loss_db(&self) -> f64 {
        match self {
            ObstructionClass::Vegetation => 6.0,
            ObstructionClass::Building => 10.0,
            ObstructionClass::Ridge => 20.0,
            ObstructionClass::Mountain => 30.0,
        }
    }

    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObstructionClass::Vegetation => "vegetation",
            ObstructionClass::Building => "building",
            ObstructionClass::Ridge => "ridge",
            ObstructionClass::Mountain => "mountain",
        }
    }
}

impl std::fmt::Display for ObstructionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity in [0, 1) from azimuth span and height excess.
pub fn severity(span_deg: f64, excess_m: f64) -> f64 {
    1.0 - (-(span_deg * excess_m.max(0.0)) / 100.0).exp()
}

/// Estimated signal loss in dB for a class and severity.
pub fn signal_loss_db(class: ObstructionClass, severity: f64) -> f64 {
    class.base_loss_db() * (0.5 + 0.5 * severity)
}

/// Terrain rising above the observer's line of sight.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerrainObstruction {
    /// Latitude of the highest blocking sample.
    pub latitude: f64,
    /// Longitude of the highest blocking sample.
    pub longitude: f64,
    /// Distance from the observer in kilometers.
    pub distance_km: f64,
    /// Height above the line of sight in meters.
    pub height_above_los_m: f64,
    pub class: ObstructionClass,
    /// Severity in [0, 1).
    pub severity: f64,
    /// First azimuth covered, degrees clockwise from north.
    pub azimuth_start_deg: f64,
    /// Azimuth where coverage ends; less than the start when the range wraps north.
    pub azimuth_end_deg: f64,
    pub signal_loss_db: f64,
}

impl TerrainObstruction {
    /// Build the obstruction seen on one azimuth sector.
    pub fn from_sector(
        latitude: f64,
        longitude: f64,
        distance_km: f64,
        height_above_los_m: f64,
        azimuth_deg: f64,
        span_deg: f64,
    ) -> Self {
        let class = ObstructionClass::from_excess_height(height_above_los_m);
        let severity = severity(span_deg, height_above_los_m);
        Self {
            latitude,
            longitude,
            distance_km,
            height_above_los_m,
            class,
            severity,
            azimuth_start_deg: azimuth_deg,
            azimuth_end_deg: (azimuth_deg + span_deg) % 360.0,
            signal_loss_db: signal_loss_db(class, severity),
        }
    }

    /// Angular width in degrees, accounting for wrap through north.
    pub fn azimuth_span_deg(&self) -> f64 {
        let span = (self.azimuth_end_deg - self.azimuth_start_deg).rem_euclid(360.0);
        if span == 0.0 {
            360.0
        } else {
            span
        }
    }

    /// Fold a neighbouring obstruction that continues this one clockwise.
    ///
    /// The tallest member supplies location and class; severity and loss
    /// keep their maxima.
    fn absorb(&mut self, next: TerrainObstruction) {
        if next.height_above_los_m > self.height_above_los_m {
            self.latitude = next.latitude;
            self.longitude = next.longitude;
            self.distance_km = next.distance_km;
            self.height_above_los_m = next.height_above_los_m;
            self.class = next.class;
        }
        self.severity = self.severity.max(next.severity);
        self.signal_loss_db = self.signal_loss_db.max(next.signal_loss_db);
        self.azimuth_end_deg = next.azimuth_end_deg;
    }
}

/// Merge per-azimuth obstructions that touch across adjacent sectors.
///
/// `sectors[i]` is the obstruction on the i-th azimuth of the sweep, if any.
/// Runs of consecutive sectors merge, and a run ending on the last sector
/// joins one starting on the first.
pub fn merge_sectors(sectors: Vec<Option<TerrainObstruction>>) -> Vec<TerrainObstruction> {
    let count = sectors.len();
    let mut merged: Vec<TerrainObstruction> = Vec::new();
    let mut starts_at_zero = false;
    let mut previous_index: Option<usize> = None;

    for (index, sector) in sectors.into_iter().enumerate() {
        let Some(obstruction) = sector else {
            continue;
        };
        let continues = previous_index.is_some_and(|prev| prev + 1 == index);
        previous_index = Some(index);
        if continues {
            if let Some(current) = merged.last_mut() {
                current.absorb(obstruction);
                continue;
            }
        }
        if index == 0 {
            starts_at_zero = true;
        }
        merged.push(obstruction);
    }

    let wraps = starts_at_zero && previous_index == Some(count.saturating_sub(1)) && merged.len() > 1;
    if wraps {
        if let Some(mut tail) = merged.pop() {
            let head = merged.remove(0);
            tail.absorb(head);
            merged.insert(0, tail);
        }
    }
    merged
}
