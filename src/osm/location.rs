//! Fixed-point coordinates.
//!
//! The o5m wire format transmits longitude and latitude as integers in
//! 100-nanodegree (1e-7 degree) units, which is also how they are stored in
//! node records. `i32` covers the full ±180°/±90° range.

/// Number of fixed-point units per degree.
pub const COORDINATE_PRECISION: i64 = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    x: i32,
    y: i32,
}

impl Location {
    /// The location of objects that have none (deleted nodes).
    pub const UNDEFINED: Location = Location {
        x: i32::MIN,
        y: i32::MIN,
    };

    pub fn new(x: i32, y: i32) -> Location {
        Location { x, y }
    }

    /// Build from the decoder's delta accumulators. Values outside the
    /// `i32` range are truncated, matching the wire format's own limits.
    pub fn from_wire(lon: i64, lat: i64) -> Location {
        Location {
            x: lon as i32,
            y: lat as i32,
        }
    }

    pub fn is_defined(&self) -> bool {
        *self != Location::UNDEFINED
    }

    /// Raw fixed-point longitude.
    pub fn x(&self) -> i32 {
        self.x
    }

    /// Raw fixed-point latitude.
    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn lon(&self) -> f64 {
        self.x as f64 / COORDINATE_PRECISION as f64
    }

    pub fn lat(&self) -> f64 {
        self.y as f64 / COORDINATE_PRECISION as f64
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::UNDEFINED
    }
}
