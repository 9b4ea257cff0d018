//! Named lines and areas a track can cross or occupy.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CrossingError, Result};
use crate::geometry::{Point, Shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// One-time crossing gate.
    Line,
    /// Closed zone with enter/exit semantics.
    Area,
}

impl RegionKind {
    pub fn min_vertices(&self) -> usize {
        match self {
            RegionKind::Line => 2,
            RegionKind::Area => 3,
        }
    }
}

/// One entry of the region configuration, as read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub kind: RegionKind,
    pub points: Vec<[f64; 2]>,
}

impl RegionConfig {
    pub fn line(name: impl Into<String>, points: &[[f64; 2]]) -> Self {
        Self {
            name: name.into(),
            kind: RegionKind::Line,
            points: points.to_vec(),
        }
    }

    pub fn area(name: impl Into<String>, points: &[[f64; 2]]) -> Self {
        Self {
            name: name.into(),
            kind: RegionKind::Area,
            points: points.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    name: String,
    kind: RegionKind,
    shape: Shape,
}

impl Region {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn vertices(&self) -> &[Point] {
        self.shape.vertices()
    }
}

/// Ordered, immutable set of uniquely named regions.
///
/// Iteration follows configuration order. Share between engines with `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
}

impl RegionSet {
    pub fn build(configs: impl IntoIterator<Item = RegionConfig>) -> Result<Self> {
        let mut regions = Vec::new();
        let mut index = HashMap::new();

        for cfg in configs {
            if cfg.name.trim().is_empty() {
                return Err(CrossingError::config("region name must not be empty"));
            }
            if index.contains_key(&cfg.name) {
                return Err(CrossingError::config(format!("duplicate region name '{}'", cfg.name)));
            }
            let needed = cfg.kind.min_vertices();
            if cfg.points.len() < needed {
                return Err(CrossingError::config(format!(
                    "region '{}' needs at least {} points for a {:?}, got {}",
                    cfg.name,
                    needed,
                    cfg.kind,
                    cfg.points.len()
                )));
            }
            if cfg.points.iter().flatten().any(|c| !c.is_finite()) {
                return Err(CrossingError::config(format!(
                    "region '{}' has non-finite coordinates",
                    cfg.name
                )));
            }

            let vertices: Vec<Point> = cfg.points.iter().map(|&[x, y]| Point::new(x, y)).collect();
            let shape = match cfg.kind {
                RegionKind::Line => Shape::Polyline(vertices),
                RegionKind::Area => Shape::Polygon(vertices),
            };
            index.insert(cfg.name.clone(), regions.len());
            regions.push(Region {
                name: cfg.name,
                kind: cfg.kind,
                shape,
            });
        }

        Ok(Self { regions, index })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.index.get(name).map(|&i| &self.regions[i])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|r| r.name())
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_preserves_order() {
        let set = RegionSet::build(vec![
            RegionConfig::line("gate", &[[0.0, 0.0], [10.0, 0.0]]),
            RegionConfig::area("lobby", &[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]),
            RegionConfig::line("exit", &[[0.0, 5.0], [10.0, 5.0], [20.0, 8.0]]),
        ])
        .unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["gate", "lobby", "exit"]);
        assert_eq!(set.position("exit"), Some(2));
        assert_eq!(set.get("lobby").unwrap().kind(), RegionKind::Area);
        assert!(matches!(set.get("gate").unwrap().shape(), Shape::Polyline(_)));
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = RegionSet::build(vec![
            RegionConfig::line("gate", &[[0.0, 0.0], [10.0, 0.0]]),
            RegionConfig::line("gate", &[[0.0, 5.0], [10.0, 5.0]]),
        ]);
        assert!(matches!(result, Err(CrossingError::Config(_))));
    }

    #[test]
    fn test_insufficient_vertices_rejected() {
        let line = RegionSet::build(vec![RegionConfig::line("gate", &[[0.0, 0.0]])]);
        assert!(matches!(line, Err(CrossingError::Config(_))));

        let area = RegionSet::build(vec![RegionConfig::area("zone", &[[0.0, 0.0], [1.0, 1.0]])]);
        assert!(matches!(area, Err(CrossingError::Config(_))));
    }

    #[test]
    fn test_non_finite_and_empty_names_rejected() {
        let nan = RegionSet::build(vec![RegionConfig::line("gate", &[[0.0, f64::NAN], [1.0, 1.0]])]);
        assert!(nan.is_err());
        let blank = RegionSet::build(vec![RegionConfig::line("  ", &[[0.0, 0.0], [1.0, 1.0]])]);
        assert!(blank.is_err());
    }

    #[test]
    fn test_region_config_from_json() {
        let json = r#"[
            {"name": "gate", "kind": "line", "points": [[0, 50], [100, 50]]},
            {"name": "zone", "kind": "area", "points": [[0, 0], [10, 0], [10, 10], [0, 10]]}
        ]"#;
        let configs: Vec<RegionConfig> = serde_json::from_str(json).unwrap();
        let set = RegionSet::build(configs).unwrap();
        assert_eq!(set.get("zone").unwrap().vertices().len(), 4);
    }
}
