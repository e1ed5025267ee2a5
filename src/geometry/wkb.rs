//! EWKB encode/decode (spec §1.C), grounded on the reference's
//! `geom_to_ewkb`/`ewkb_to_geom`/`decode_hex`.

use geo_types::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};

use super::Geometry;
use crate::error::CoreError;

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTI_LINESTRING: u32 = 5;
const WKB_MULTI_POLYGON: u32 = 6;
const WKB_SRID_FLAG: u32 = 0x2000_0000;
const LITTLE_ENDIAN: u8 = 1;

fn write_header(data: &mut Vec<u8>, geom_type: u32, srid: i32) {
    data.push(LITTLE_ENDIAN);
    if srid != 0 {
        data.extend_from_slice(&(geom_type | WKB_SRID_FLAG).to_le_bytes());
        data.extend_from_slice(&(srid as u32).to_le_bytes());
    } else {
        data.extend_from_slice(&geom_type.to_le_bytes());
    }
}

fn write_length(data: &mut Vec<u8>, len: usize) {
    data.extend_from_slice(&(len as u32).to_le_bytes());
}

fn write_points<'a>(data: &mut Vec<u8>, points: impl ExactSizeIterator<Item = &'a Coord<f64>>) {
    write_length(data, points.len());
    for p in points {
        data.extend_from_slice(&p.x.to_le_bytes());
        data.extend_from_slice(&p.y.to_le_bytes());
    }
}

fn write_linestring(data: &mut Vec<u8>, ls: &LineString<f64>, srid: i32) {
    write_header(data, WKB_LINESTRING, srid);
    write_points(data, ls.0.iter());
}

fn write_polygon(data: &mut Vec<u8>, poly: &Polygon<f64>, srid: i32) {
    write_header(data, WKB_POLYGON, srid);
    write_length(data, poly.interiors().len() + 1);
    write_points(data, poly.exterior().0.iter());
    for ring in poly.interiors() {
        write_points(data, ring.0.iter());
    }
}

/// Encode a geometry to EWKB. `ensure_multi` wraps a bare linestring or
/// polygon in its multi- variant, matching the reference's
/// `geom_to_ewkb(geom, ensure_multi)` used when a target column always
/// expects the multi- form (spec §1.C).
pub fn geom_to_ewkb(geom: &Geometry, ensure_multi: bool) -> Vec<u8> {
    let srid = geom.srid();
    let mut data = Vec::new();

    match geom {
        Geometry::Null | Geometry::Collection(_, _) => {}
        Geometry::Point(p, _) => {
            write_header(&mut data, WKB_POINT, srid);
            data.extend_from_slice(&p.x().to_le_bytes());
            data.extend_from_slice(&p.y().to_le_bytes());
        }
        Geometry::LineString(ls, _) => {
            if ensure_multi {
                write_header(&mut data, WKB_MULTI_LINESTRING, srid);
                write_length(&mut data, 1);
                write_linestring(&mut data, ls, 0);
            } else {
                write_linestring(&mut data, ls, srid);
            }
        }
        Geometry::Polygon(poly, _) => {
            if ensure_multi {
                write_header(&mut data, WKB_MULTI_POLYGON, srid);
                write_length(&mut data, 1);
                write_polygon(&mut data, poly, 0);
            } else {
                write_polygon(&mut data, poly, srid);
            }
        }
        Geometry::MultiLineString(mls, _) => {
            write_header(&mut data, WKB_MULTI_LINESTRING, srid);
            write_length(&mut data, mls.0.len());
            for ls in &mls.0 {
                write_linestring(&mut data, ls, 0);
            }
        }
        Geometry::MultiPolygon(mp, _) => {
            write_header(&mut data, WKB_MULTI_POLYGON, srid);
            write_length(&mut data, mp.0.len());
            for poly in &mp.0 {
                write_polygon(&mut data, poly, 0);
            }
        }
    }

    data
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn u8(&mut self) -> crate::error::Result<u8> {
        let b = *self.data.get(self.pos).ok_or_else(truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn u32(&mut self) -> crate::error::Result<u32> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or_else(truncated)?;
        self.pos += 4;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn f64(&mut self) -> crate::error::Result<f64> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 8)
            .ok_or_else(truncated)?;
        self.pos += 8;
        Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
    }

    fn coord(&mut self) -> crate::error::Result<Coord<f64>> {
        let x = self.f64()?;
        let y = self.f64()?;
        Ok(Coord { x, y })
    }

    fn points(&mut self) -> crate::error::Result<Vec<Coord<f64>>> {
        let n = self.u32()? as usize;
        (0..n).map(|_| self.coord()).collect()
    }

    fn ring(&mut self) -> crate::error::Result<LineString<f64>> {
        self.header()?;
        Ok(LineString(self.points()?))
    }

    /// Read a header (endian + type [+ srid]) and return `(type, srid)`.
    fn header(&mut self) -> crate::error::Result<(u32, i32)> {
        let endian = self.u8()?;
        if endian != LITTLE_ENDIAN {
            return Err(malformed("unsupported WKB byte order"));
        }
        let raw_type = self.u32()?;
        if raw_type & WKB_SRID_FLAG != 0 {
            let srid = self.u32()? as i32;
            Ok((raw_type & !WKB_SRID_FLAG, srid))
        } else {
            Ok((raw_type, 0))
        }
    }
}

fn truncated() -> CoreError {
    malformed("truncated WKB input")
}

fn malformed(msg: &str) -> CoreError {
    CoreError::InvalidGeometry(msg.to_string())
}

/// Decode EWKB into a geometry. An empty input decodes to [`Geometry::Null`];
/// anything that fails to parse is a [`CoreError::InvalidGeometry`] (spec
/// §7, recoverable at the object level).
pub fn ewkb_to_geom(data: &[u8]) -> crate::error::Result<Geometry> {
    if data.is_empty() {
        return Ok(Geometry::Null);
    }

    let mut reader = Reader::new(data);
    let (geom_type, srid) = reader.header()?;

    let geom = match geom_type {
        WKB_POINT => {
            let c = reader.coord()?;
            Geometry::Point(Point::new(c.x, c.y), srid)
        }
        WKB_LINESTRING => Geometry::LineString(LineString(reader.points()?), srid),
        WKB_POLYGON => {
            let n = reader.u32()? as usize;
            if n == 0 {
                return Err(malformed("polygon with no rings"));
            }
            let exterior = LineString(reader.points()?);
            let mut interiors = Vec::with_capacity(n - 1);
            for _ in 0..n - 1 {
                interiors.push(LineString(reader.points()?));
            }
            Geometry::Polygon(Polygon::new(exterior, interiors), srid)
        }
        WKB_MULTI_LINESTRING => {
            let n = reader.u32()? as usize;
            let mut lines = Vec::with_capacity(n);
            for _ in 0..n {
                lines.push(reader.ring()?);
            }
            Geometry::MultiLineString(MultiLineString(lines), srid)
        }
        WKB_MULTI_POLYGON => {
            let n = reader.u32()? as usize;
            let mut polys = Vec::with_capacity(n);
            for _ in 0..n {
                let (_ty, _srid) = reader.header()?;
                let rings = reader.u32()? as usize;
                if rings == 0 {
                    return Err(malformed("polygon with no rings"));
                }
                let exterior = LineString(reader.points()?);
                let mut interiors = Vec::with_capacity(rings - 1);
                for _ in 0..rings - 1 {
                    interiors.push(LineString(reader.points()?));
                }
                polys.push(Polygon::new(exterior, interiors));
            }
            Geometry::MultiPolygon(MultiPolygon(polys), srid)
        }
        other => return Err(malformed(&format!("unsupported WKB geometry type {other}"))),
    };

    Ok(geom)
}

/// Decode one hex nibble (spec §1.C, `decode_hex_char`).
pub fn decode_hex_char(c: u8) -> crate::error::Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(malformed("invalid hex character")),
    }
}

/// Decode a hex string into bytes (spec §1.C, `decode_hex`).
pub fn decode_hex(hex: &str) -> crate::error::Result<Vec<u8>> {
    let bytes = hex.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err(malformed("odd-length hex string"));
    }
    bytes
        .chunks(2)
        .map(|pair| Ok(decode_hex_char(pair[0])? << 4 | decode_hex_char(pair[1])?))
        .collect()
}

/// Encode bytes as a lowercase hex string, the inverse of [`decode_hex`].
pub fn encode_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}
