//! Fixed-point coordinates.
//!
//! A `Location` stores longitude and latitude as 32-bit integers in units of
//! 1e-7 degrees. The value `i32::MAX` on both axes marks an undefined
//! location (a node without coordinates, or a way node ref whose location
//! was never resolved).

/// Multiplier between degrees and the stored fixed-point representation.
pub const COORDINATE_PRECISION: f64 = 1e7;

/// Sentinel coordinate for "no value".
pub const UNDEFINED_COORDINATE: i32 = i32::MAX;

/// A point on the globe in 1e-7 degree fixed-point units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    lon: i32,
    lat: i32,
}

impl Location {
    /// The undefined location.
    pub const UNDEFINED: Location = Location {
        lon: UNDEFINED_COORDINATE,
        lat: UNDEFINED_COORDINATE,
    };

    /// Create a location from raw fixed-point coordinates.
    #[inline]
    pub fn new(lon: i32, lat: i32) -> Self {
        Location { lon, lat }
    }

    /// Create a location from coordinates in degrees.
    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Location {
            lon: (lon * COORDINATE_PRECISION).round() as i32,
            lat: (lat * COORDINATE_PRECISION).round() as i32,
        }
    }

    /// Set the longitude from degrees.
    pub fn set_lon(&mut self, lon: f64) {
        self.lon = (lon * COORDINATE_PRECISION).round() as i32;
    }

    /// Set the latitude from degrees.
    pub fn set_lat(&mut self, lat: f64) {
        self.lat = (lat * COORDINATE_PRECISION).round() as i32;
    }

    /// Raw fixed-point longitude.
    #[inline]
    pub fn lon(&self) -> i32 {
        self.lon
    }

    /// Raw fixed-point latitude.
    #[inline]
    pub fn lat(&self) -> i32 {
        self.lat
    }

    /// Longitude in degrees.
    pub fn lon_degrees(&self) -> f64 {
        f64::from(self.lon) / COORDINATE_PRECISION
    }

    /// Latitude in degrees.
    pub fn lat_degrees(&self) -> f64 {
        f64::from(self.lat) / COORDINATE_PRECISION
    }

    /// True unless this is the undefined sentinel.
    #[inline]
    pub fn is_defined(&self) -> bool {
        self.lon != UNDEFINED_COORDINATE || self.lat != UNDEFINED_COORDINATE
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::UNDEFINED
    }
}

/// An axis-aligned bounding box built up by extending with locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    min: Location,
    max: Location,
}

impl Bounds {
    /// An empty box.
    pub fn new() -> Self {
        Bounds::default()
    }

    /// Grow the box to contain `location`. Undefined locations are ignored;
    /// the first defined location seeds both corners.
    pub fn extend(&mut self, location: Location) -> &mut Self {
        if !location.is_defined() {
            return self;
        }
        if !self.min.is_defined() {
            self.min = location;
            self.max = location;
        } else {
            if location.lon() < self.min.lon() {
                self.min = Location::new(location.lon(), self.min.lat());
            }
            if location.lat() < self.min.lat() {
                self.min = Location::new(self.min.lon(), location.lat());
            }
            if location.lon() > self.max.lon() {
                self.max = Location::new(location.lon(), self.max.lat());
            }
            if location.lat() > self.max.lat() {
                self.max = Location::new(self.max.lon(), location.lat());
            }
        }
        self
    }

    /// Lower-left corner.
    #[inline]
    pub fn min(&self) -> Location {
        self.min
    }

    /// Upper-right corner.
    #[inline]
    pub fn max(&self) -> Location {
        self.max
    }

    /// True once at least one defined location was added.
    #[inline]
    pub fn is_defined(&self) -> bool {
        self.min.is_defined()
    }
}
