//! Style-file parser (spec §4.7), grounded in `taginfo-impl.hpp`'s
//! `read_style_file` contract.
//!
//! Grammar: `osm_type<WS>key<WS>sql_type<WS>comma_separated_flags`, `#`
//! comments, blank lines ignored.

use crate::error::{CoreError, Result};

bitflags::bitflags! {
    /// Per-entry column flags (spec §4.7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u32 {
        const POLYGON = 1 << 0;
        const LINEAR = 1 << 1;
        const NOCACHE = 1 << 2;
        const DELETE = 1 << 3;
        const NOCOLUMN = 1 << 4;
        const PHSTORE = 1 << 5;
        const INT_TYPE = 1 << 6;
        const REAL_TYPE = 1 << 7;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsmType {
    Node,
    Way,
    NodeAndWay,
}

/// A parsed `ColumnType` (spec §4.7, sql-type-to-bit mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    Real,
    Text,
}

fn sql_type_to_column_type(sql_type: &str) -> ColumnType {
    match sql_type {
        "smallint" | "integer" | "bigint" | "int2" | "int4" | "int8" => ColumnType::Int,
        "real" | "double precision" => ColumnType::Real,
        _ => ColumnType::Text,
    }
}

/// One parsed style-file entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleEntry {
    pub osm_type: OsmType,
    pub key: String,
    pub column_type: ColumnType,
    pub flags: ColumnFlags,
}

impl StyleEntry {
    pub fn is_wildcard(&self) -> bool {
        self.key.contains('?') || self.key.contains('*')
    }
}

fn parse_osm_type(s: &str) -> Result<OsmType> {
    match s {
        "node" => Ok(OsmType::Node),
        "way" => Ok(OsmType::Way),
        "node,way" | "way,node" => Ok(OsmType::NodeAndWay),
        other => Err(CoreError::InvalidInput(format!(
            "unrecognised osm_type '{other}' in style file"
        ))),
    }
}

fn parse_flags(s: &str) -> Result<ColumnFlags> {
    let mut flags = ColumnFlags::empty();
    for token in s.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        flags |= match token {
            "polygon" => ColumnFlags::POLYGON,
            "linear" => ColumnFlags::LINEAR,
            "nocache" => ColumnFlags::NOCACHE,
            "delete" => ColumnFlags::DELETE,
            "nocolumn" => ColumnFlags::NOCOLUMN,
            "phstore" => ColumnFlags::PHSTORE,
            other => {
                return Err(CoreError::InvalidInput(format!(
                    "unrecognised style flag '{other}'"
                )))
            }
        };
    }
    Ok(flags)
}

/// Parsed style file: the entry list plus whether `way_area` should be
/// auto-emitted (spec §4.7 and the "Supplemented features" `way_area`
/// note).
#[derive(Debug, Clone, Default)]
pub struct Style {
    pub entries: Vec<StyleEntry>,
    pub emit_way_area: bool,
}

/// Parse the contents of a style file (spec §4.7).
pub fn parse_style(text: &str) -> Result<Style> {
    let mut entries = Vec::new();
    let mut emit_way_area = true;

    for (lineno, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(CoreError::InvalidInput(format!(
                "style file line {}: expected 4 fields, found {}",
                lineno + 1,
                fields.len()
            )));
        }
        let [osm_type, key, sql_type, flags_field] = [fields[0], fields[1], fields[2], fields[3]];

        let osm_type = parse_osm_type(osm_type)?;
        let flags = parse_flags(flags_field)?;

        let column_type = if key == "way_area" {
            ColumnType::Text
        } else {
            sql_type_to_column_type(sql_type)
        };

        let entry = StyleEntry {
            osm_type,
            key: key.to_string(),
            column_type,
            flags,
        };

        if entry.is_wildcard() && !flags.contains(ColumnFlags::DELETE) {
            return Err(CoreError::InvalidInput(format!(
                "style file line {}: wildcard key '{}' only legal on a delete entry",
                lineno + 1,
                entry.key
            )));
        }

        if key == "way_area" {
            emit_way_area = false;
        }

        entries.push(entry);
    }

    Ok(Style { entries, emit_way_area })
}
