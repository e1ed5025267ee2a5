//! The geometry data model (spec §3, "Geometry").

use geo_types::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};

/// A tagged-union geometry carrying an SRID, mirroring spec §3.
///
/// Built on `geo_types` primitives (a teacher dependency) rather than a
/// bespoke point/ring representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Null,
    Point(Point<f64>, i32),
    LineString(LineString<f64>, i32),
    Polygon(Polygon<f64>, i32),
    MultiPolygon(MultiPolygon<f64>, i32),
    MultiLineString(MultiLineString<f64>, i32),
    /// A heterogeneous collection; rarely produced by this core but part
    /// of the data model's tagged union.
    Collection(Vec<Geometry>, i32),
}

impl Geometry {
    pub fn srid(&self) -> i32 {
        match self {
            Geometry::Null => 0,
            Geometry::Point(_, s)
            | Geometry::LineString(_, s)
            | Geometry::Polygon(_, s)
            | Geometry::MultiPolygon(_, s)
            | Geometry::MultiLineString(_, s)
            | Geometry::Collection(_, s) => *s,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Geometry::Null)
    }

    /// Bounding box in the geometry's own coordinate space, or `None` for
    /// null/empty geometries.
    pub fn bbox(&self) -> Option<Bbox> {
        match self {
            Geometry::Null => None,
            Geometry::Point(p, _) => Some(Bbox::from_point(p.x(), p.y())),
            Geometry::LineString(ls, _) => Bbox::from_coords(ls.coords().copied()),
            Geometry::Polygon(poly, _) => Bbox::from_coords(poly.exterior().coords().copied()),
            Geometry::MultiPolygon(mp, _) => {
                let mut bbox: Option<Bbox> = None;
                for poly in mp.0.iter() {
                    if let Some(b) = Bbox::from_coords(poly.exterior().coords().copied()) {
                        bbox = Some(match bbox {
                            Some(existing) => existing.union(&b),
                            None => b,
                        });
                    }
                }
                bbox
            }
            Geometry::MultiLineString(mls, _) => {
                let mut bbox: Option<Bbox> = None;
                for ls in mls.0.iter() {
                    if let Some(b) = Bbox::from_coords(ls.coords().copied()) {
                        bbox = Some(match bbox {
                            Some(existing) => existing.union(&b),
                            None => b,
                        });
                    }
                }
                bbox
            }
            Geometry::Collection(items, _) => {
                let mut bbox: Option<Bbox> = None;
                for item in items {
                    if let Some(b) = item.bbox() {
                        bbox = Some(match bbox {
                            Some(existing) => existing.union(&b),
                            None => b,
                        });
                    }
                }
                bbox
            }
        }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bbox {
    pub fn from_point(x: f64, y: f64) -> Self {
        Bbox {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn from_coords(coords: impl Iterator<Item = Coord<f64>>) -> Option<Self> {
        let mut it = coords;
        let first = it.next()?;
        let mut bbox = Bbox::from_point(first.x, first.y);
        for c in it {
            bbox.min_x = bbox.min_x.min(c.x);
            bbox.min_y = bbox.min_y.min(c.y);
            bbox.max_x = bbox.max_x.max(c.x);
            bbox.max_y = bbox.max_y.max(c.y);
        }
        Some(bbox)
    }

    pub fn union(&self, other: &Bbox) -> Bbox {
        Bbox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}
