//! Style-driven `TagTransform` backend (spec §4.6, backend 1), grounded in
//! `tagtransform-c.cpp`'s `c_tagtransform_t`.

use super::{zorder, FilterResult, ObjectKind, RelationFilterResult, TagTransform};
use crate::collab::Tag;
use crate::config::{Config, HstoreMode};
use crate::error::Result;
use crate::style::{ColumnFlags, OsmType, Style, StyleEntry};

#[derive(Debug, Clone)]
pub struct StyleConfig {
    /// `none`/`norm`/`all` (spec §6 configuration surface).
    pub hstore_mode: HstoreMode,
    pub hstore_match_only: bool,
    /// Extra hstore columns keyed by prefix match, additive to `hstore_mode`
    /// (spec §6, `hstore_extra_columns`).
    pub hstore_columns: Vec<String>,
    pub keep_coastlines: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            hstore_mode: HstoreMode::None,
            hstore_match_only: false,
            hstore_columns: Vec::new(),
            keep_coastlines: false,
        }
    }
}

impl From<&Config> for StyleConfig {
    fn from(config: &Config) -> Self {
        StyleConfig {
            hstore_mode: config.hstore_mode,
            hstore_match_only: config.hstore_match_only,
            hstore_columns: config.hstore_extra_columns.clone(),
            keep_coastlines: config.keep_coastlines,
        }
    }
}

pub struct StyleTagTransform {
    style: Style,
    config: StyleConfig,
}

impl StyleTagTransform {
    pub fn new(style: Style, config: StyleConfig) -> Self {
        StyleTagTransform { style, config }
    }

    fn entry_applies(entry: &StyleEntry, kind: ObjectKind) -> bool {
        matches!(
            (entry.osm_type, kind),
            (OsmType::Node, ObjectKind::Node)
                | (OsmType::Way, ObjectKind::Way)
                | (OsmType::Way, ObjectKind::Relation)
                | (OsmType::NodeAndWay, _)
        )
    }

    /// Decide whether to keep tag `k`, per `check_key` (spec §4.6: style
    /// entries, then the extra hstore-column prefixes, then the `hstore_mode`
    /// fallback that catches anything still unmatched).
    fn check_key(&self, kind: ObjectKind, k: &str, filter: &mut bool) -> (bool, ColumnFlags) {
        for entry in &self.style.entries {
            if !Self::entry_applies(entry, kind) {
                continue;
            }
            if entry.flags.contains(ColumnFlags::DELETE) {
                if wildmatch(&entry.key, k) {
                    return (false, ColumnFlags::empty());
                }
            } else if entry.key == k {
                *filter = false;
                return (true, entry.flags);
            }
        }

        if self.config.hstore_columns.iter().any(|prefix| k.starts_with(prefix.as_str())) {
            if !self.config.hstore_match_only {
                *filter = false;
            }
            return (true, ColumnFlags::NOCOLUMN);
        }

        match self.config.hstore_mode {
            HstoreMode::None => {}
            HstoreMode::Norm | HstoreMode::All => {
                if !self.config.hstore_match_only {
                    *filter = false;
                }
                return (true, ColumnFlags::empty());
            }
        }

        (false, ColumnFlags::empty())
    }
}

/// A wildcard match supporting `?` (any one char) and `*` (any run),
/// matching `wildMatch` in the reference.
fn wildmatch(pattern: &str, text: &str) -> bool {
    fn rec(p: &[u8], t: &[u8]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some((b'*', rest)) => rec(rest, t) || (!t.is_empty() && rec(p, &t[1..])),
            Some((b'?', rest)) => !t.is_empty() && rec(rest, &t[1..]),
            Some((c, rest)) => !t.is_empty() && t[0] == *c && rec(rest, &t[1..]),
        }
    }
    rec(pattern.as_bytes(), text.as_bytes())
}

impl TagTransform for StyleTagTransform {
    fn filter_tags(&self, kind: ObjectKind, tags: &[Tag]) -> Result<FilterResult> {
        let mut filter = true;
        let mut flags = ColumnFlags::empty();
        let mut add_area_tag = false;
        let mut out_tags = Vec::new();
        let mut hstore = Vec::new();

        for (k, v) in tags {
            if k == "natural" && v == "coastline" {
                add_area_tag = true;
                if !self.config.keep_coastlines {
                    continue;
                }
            }

            let (keep, entry_flags) = self.check_key(kind, k, &mut filter);
            if keep {
                if entry_flags.contains(ColumnFlags::NOCOLUMN) {
                    hstore.push((k.clone(), v.clone()));
                } else {
                    out_tags.push((k.clone(), v.clone()));
                    if self.config.hstore_mode == HstoreMode::All {
                        hstore.push((k.clone(), v.clone()));
                    }
                }
                flags |= entry_flags;
            }
        }

        let polygon = if add_area_tag {
            if !out_tags.iter().any(|(k, _)| k == "area") {
                out_tags.push(("area".to_string(), "yes".to_string()));
            }
            true
        } else if let Some((_, v)) = out_tags.iter().find(|(k, _)| k == "area") {
            value_to_bool(v, flags.contains(ColumnFlags::POLYGON))
        } else {
            flags.contains(ColumnFlags::POLYGON)
        };

        let mut roads = false;
        let mut z_order = None;
        if !filter && kind == ObjectKind::Way {
            let lookup = |key: &str| out_tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
            let (z, r) = zorder::compute_z_order(lookup);
            roads = r;
            z_order = Some(z);
            out_tags.push(("z_order".to_string(), z.to_string()));
        }

        Ok(FilterResult {
            tags: out_tags,
            polygon,
            roads,
            z_order,
            keep: !filter,
            hstore,
        })
    }

    fn filter_rel_member_tags(&self, rel_tags: &[Tag]) -> Result<RelationFilterResult> {
        let get = |k: &str| rel_tags.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());

        let Some(rel_type) = get("type") else {
            return Ok(RelationFilterResult {
                keep: true,
                ..Default::default()
            });
        };

        let is_route = rel_type == "route";
        let is_boundary = rel_type == "boundary";
        let is_multipolygon = rel_type == "multipolygon";
        if !is_route && !is_boundary && !is_multipolygon {
            return Ok(RelationFilterResult {
                keep: true,
                ..Default::default()
            });
        }

        let mut out_tags = Vec::new();
        for (k, v) in rel_tags {
            if is_route && k == "name" {
                push_if_absent(&mut out_tags, "route_name", v);
            }
            if k != "type" {
                push_if_absent(&mut out_tags, k, v);
            }
        }

        if out_tags.is_empty() {
            return Ok(RelationFilterResult {
                keep: true,
                ..Default::default()
            });
        }

        let mut roads = false;
        let mut make_boundary = false;
        let mut make_polygon = false;

        if is_route {
            let network = get("network");
            let network_nr = network.and_then(|netw| {
                let state = match get("state") {
                    Some("alternate") => "alternate",
                    Some("connection") => "connection",
                    _ => "yes",
                };
                let (nr, tag) = match netw {
                    "lcn" => (10, "lcn"),
                    "rcn" => (11, "rcn"),
                    "ncn" => (12, "ncn"),
                    "lwn" => (20, "lwn"),
                    "rwn" => (21, "rwn"),
                    "nwn" => (22, "nwn"),
                    _ => return None,
                };
                push_if_absent(&mut out_tags, tag, state);
                Some(nr)
            });

            let pref_col = match get("preferred_color") {
                Some(c) if c.len() == 1 && matches!(c, "0" | "1" | "2" | "3" | "4") => c,
                _ => "0",
            };
            push_if_absent(&mut out_tags, "route_pref_color", pref_col);

            if let Some(relref) = get("ref") {
                let ref_tag = match network_nr {
                    Some(10) => Some("lcn_ref"),
                    Some(11) => Some("rcn_ref"),
                    Some(12) => Some("ncn_ref"),
                    Some(20) => Some("lwn_ref"),
                    Some(21) => Some("rwn_ref"),
                    Some(22) => Some("nwn_ref"),
                    _ => None,
                };
                if let Some(tag) = ref_tag {
                    push_if_absent(&mut out_tags, tag, relref);
                }
            }
        } else if is_boundary
            || (is_multipolygon && out_tags.iter().any(|(k, _)| k == "boundary"))
        {
            make_boundary = true;
        } else if is_multipolygon {
            make_polygon = true;
        }

        let lookup = |key: &str| out_tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        let (z, r) = zorder::compute_z_order(lookup);
        roads = roads || r;
        out_tags.push(("z_order".to_string(), z.to_string()));

        Ok(RelationFilterResult {
            tags: out_tags,
            make_polygon,
            make_boundary,
            roads,
            keep: false,
        })
    }
}

fn push_if_absent(tags: &mut Vec<Tag>, key: &str, value: &str) {
    if !tags.iter().any(|(k, _)| k == key) {
        tags.push((key.to_string(), value.to_string()));
    }
}

fn value_to_bool(v: &str, default: bool) -> bool {
    match v {
        "yes" | "true" | "1" | "on" => true,
        "no" | "false" | "0" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::parse_style;

    fn transform(style_text: &str, config: StyleConfig) -> StyleTagTransform {
        StyleTagTransform::new(parse_style(style_text).unwrap(), config)
    }

    #[test]
    fn keeps_tags_in_the_export_list() {
        let t = transform("way highway text linear,polygon\n", StyleConfig::default());
        let tags = vec![("highway".to_string(), "residential".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(result.keep);
        assert!(result.tags.iter().any(|(k, _)| k == "highway"));
    }

    #[test]
    fn drops_tags_matching_a_delete_wildcard() {
        let t = transform("way addr:* text delete\n", StyleConfig::default());
        let tags = vec![("addr:housenumber".to_string(), "12".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(result.tags.is_empty());
        assert!(!result.keep);
    }

    #[test]
    fn coastline_forces_area_yes() {
        let t = transform("way natural text linear\n", StyleConfig::default());
        let tags = vec![("natural".to_string(), "coastline".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(result.polygon);
        assert!(result.tags.iter().any(|(k, v)| k == "area" && v == "yes"));
    }

    #[test]
    fn literal_area_no_overrides_polygon_flag() {
        let t = transform("way building text polygon\n", StyleConfig::default());
        let tags = vec![
            ("building".to_string(), "yes".to_string()),
            ("area".to_string(), "no".to_string()),
        ];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(!result.polygon);
    }

    #[test]
    fn hstore_all_mode_keeps_unlisted_tags() {
        let config = StyleConfig {
            hstore_mode: HstoreMode::All,
            ..StyleConfig::default()
        };
        let t = transform("way highway text linear\n", config);
        let tags = vec![("shop".to_string(), "bakery".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(result.keep);
    }

    #[test]
    fn hstore_norm_mode_only_catches_unmatched_tags() {
        let config = StyleConfig {
            hstore_mode: HstoreMode::Norm,
            ..StyleConfig::default()
        };
        let t = transform("way highway text linear\n", config);
        let tags = vec![
            ("highway".to_string(), "residential".to_string()),
            ("shop".to_string(), "bakery".to_string()),
        ];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(result.tags.iter().any(|(k, _)| k == "highway"));
        assert_eq!(result.hstore, vec![("shop".to_string(), "bakery".to_string())]);
    }

    #[test]
    fn hstore_all_mode_also_duplicates_matched_tags_into_hstore() {
        let config = StyleConfig {
            hstore_mode: HstoreMode::All,
            ..StyleConfig::default()
        };
        let t = transform("way highway text linear\n", config);
        let tags = vec![("highway".to_string(), "residential".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(result.tags.iter().any(|(k, _)| k == "highway"));
        assert!(result.hstore.iter().any(|(k, _)| k == "highway"));
    }

    #[test]
    fn extra_hstore_columns_apply_regardless_of_mode() {
        let config = StyleConfig {
            hstore_mode: HstoreMode::None,
            hstore_columns: vec!["addr:".to_string()],
            ..StyleConfig::default()
        };
        let t = transform("way highway text linear\n", config);
        let tags = vec![("addr:city".to_string(), "Sometown".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert_eq!(result.hstore, vec![("addr:city".to_string(), "Sometown".to_string())]);
    }

    #[test]
    fn config_converts_into_style_config() {
        let mut config = Config::default();
        config.hstore_mode = HstoreMode::Norm;
        config.hstore_extra_columns = vec!["addr:".to_string()];
        let style_config = StyleConfig::from(&config);
        assert_eq!(style_config.hstore_mode, HstoreMode::Norm);
        assert_eq!(style_config.hstore_columns, vec!["addr:".to_string()]);
    }

    #[test]
    fn hstore_match_only_does_not_keep_object() {
        let config = StyleConfig {
            hstore_mode: HstoreMode::All,
            hstore_match_only: true,
            ..StyleConfig::default()
        };
        let t = transform("way highway text linear\n", config);
        let tags = vec![("shop".to_string(), "bakery".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert!(!result.keep);
    }

    #[test]
    fn way_gets_z_order_when_kept() {
        let t = transform("way highway text linear\n", StyleConfig::default());
        let tags = vec![("highway".to_string(), "motorway".to_string())];
        let result = t.filter_tags(ObjectKind::Way, &tags).unwrap();
        assert_eq!(result.z_order, Some(39));
        assert!(result.roads);
    }

    #[test]
    fn multipolygon_relation_marks_make_polygon() {
        let t = transform("way highway text linear\n", StyleConfig::default());
        let tags = vec![
            ("type".to_string(), "multipolygon".to_string()),
            ("landuse".to_string(), "forest".to_string()),
        ];
        let result = t.filter_rel_member_tags(&tags).unwrap();
        assert!(result.make_polygon);
        assert!(!result.make_boundary);
    }

    #[test]
    fn boundary_relation_marks_make_boundary() {
        let t = transform("way highway text linear\n", StyleConfig::default());
        let tags = vec![
            ("type".to_string(), "boundary".to_string()),
            ("boundary".to_string(), "administrative".to_string()),
        ];
        let result = t.filter_rel_member_tags(&tags).unwrap();
        assert!(result.make_boundary);
    }

    #[test]
    fn non_route_boundary_multipolygon_relation_passes_through() {
        let t = transform("way highway text linear\n", StyleConfig::default());
        let tags = vec![("type".to_string(), "site".to_string())];
        let result = t.filter_rel_member_tags(&tags).unwrap();
        assert!(result.keep);
    }

    #[test]
    fn wildmatch_matches_star_and_question_mark() {
        assert!(wildmatch("addr:*", "addr:housenumber"));
        assert!(wildmatch("addr:?", "addr:1"));
        assert!(!wildmatch("addr:?", "addr:10"));
    }
}
