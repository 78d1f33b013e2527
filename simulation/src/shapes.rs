//! Shape provider
//!
//! Holds one prepared sampling surface per unit (full polygon and urban
//! sub-geometry) and draws random addresses from them.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::components::UnitId;
use crate::geometry::{MultiPolygon, Point, SamplingSurface};

/// Shape of one unit as stored in the input data: a list of exterior rings
/// of `[x, y]` coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeRecord {
    pub polygon: Vec<Vec<[f64; 2]>>,
    #[serde(default)]
    pub urban: Option<Vec<Vec<[f64; 2]>>>,
}

impl ShapeRecord {
    pub fn polygon(&self) -> MultiPolygon {
        MultiPolygon::from_rings(&self.polygon)
    }

    pub fn urban(&self) -> Option<MultiPolygon> {
        self.urban.as_deref().map(MultiPolygon::from_rings)
    }
}

#[derive(Debug, Clone)]
struct UnitSurfaces {
    full: Option<SamplingSurface>,
    urban: Option<SamplingSurface>,
    centroid: Point,
}

impl UnitSurfaces {
    fn sample<R: Rng + ?Sized>(&self, urban: bool, rng: &mut R) -> Point {
        let surface = if urban {
            self.urban.as_ref().or(self.full.as_ref())
        } else {
            self.full.as_ref()
        };
        match surface {
            Some(s) => s.sample(rng),
            None => self.centroid,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShapeProvider {
    surfaces: BTreeMap<UnitId, UnitSurfaces>,
}

impl ShapeProvider {
    /// Prepares surfaces for every `(unit, polygon, urban)` entry, logging
    /// the fallback each unit will use.
    pub fn new<'a>(
        shapes: impl IntoIterator<Item = (&'a UnitId, &'a MultiPolygon, Option<&'a MultiPolygon>)>,
    ) -> Self {
        let mut surfaces = BTreeMap::new();
        for (unit, polygon, urban) in shapes {
            let full = SamplingSurface::new(polygon);
            let urban = urban.filter(|u| !u.is_empty()).and_then(SamplingSurface::new);
            if full.is_none() {
                warn!("Unit {}: polygon does not triangulate, addresses fall on its centroid", unit);
            } else if urban.is_none() {
                warn!("Unit {}: no usable urban geometry, urban addresses use the whole polygon", unit);
            }
            surfaces.insert(
                unit.clone(),
                UnitSurfaces {
                    full,
                    urban,
                    centroid: polygon.centroid(),
                },
            );
        }
        Self { surfaces }
    }

    /// Uniform point in the unit's urban area (or whole polygon), falling back
    /// to the full polygon and then to the centroid. `None` for unknown units.
    pub fn get_random_point_in_polygon<R: Rng + ?Sized>(
        &self,
        unit: &UnitId,
        urban: bool,
        rng: &mut R,
    ) -> Option<Point> {
        self.surfaces.get(unit).map(|s| s.sample(urban, rng))
    }

    /// Address for a dwelling: urban with probability `urban_probability`.
    pub fn random_address<R: Rng + ?Sized>(
        &self,
        unit: &UnitId,
        urban_probability: f64,
        rng: &mut R,
    ) -> Option<Point> {
        let urban = rng.gen::<f64>() < urban_probability;
        self.get_random_point_in_polygon(unit, urban, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square(x0: f64, y0: f64, side: f64) -> Vec<[f64; 2]> {
        vec![[x0, y0], [x0 + side, y0], [x0 + side, y0 + side], [x0, y0 + side]]
    }

    #[test]
    fn test_urban_draws_stay_in_urban_area() {
        let record = ShapeRecord {
            polygon: vec![square(0.0, 0.0, 10.0)],
            urban: Some(vec![square(1.0, 1.0, 1.0)]),
        };
        let unit = UnitId::new("a");
        let (poly, urban) = (record.polygon(), record.urban());
        let provider = ShapeProvider::new([(&unit, &poly, urban.as_ref())]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..500 {
            let p = provider.get_random_point_in_polygon(&unit, true, &mut rng).unwrap();
            assert!((1.0..=2.0).contains(&p.x) && (1.0..=2.0).contains(&p.y));
        }
    }

    #[test]
    fn test_missing_urban_falls_back_to_polygon() {
        let record = ShapeRecord {
            polygon: vec![square(0.0, 0.0, 10.0)],
            urban: None,
        };
        let unit = UnitId::new("a");
        let poly = record.polygon();
        let provider = ShapeProvider::new([(&unit, &poly, None)]);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let far = (0..500)
            .filter_map(|_| provider.get_random_point_in_polygon(&unit, true, &mut rng))
            .filter(|p| p.x > 5.0)
            .count();
        assert!(far > 150);
    }

    #[test]
    fn test_degenerate_polygon_uses_centroid() {
        let unit = UnitId::new("a");
        let poly = MultiPolygon::from_rings(&[vec![[0.0, 0.0], [4.0, 0.0], [8.0, 0.0]]]);
        let provider = ShapeProvider::new([(&unit, &poly, None)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let p = provider.random_address(&unit, 0.5, &mut rng).unwrap();
        assert_eq!(p, Point::new(4.0, 0.0));
        assert!(provider.get_random_point_in_polygon(&UnitId::new("b"), false, &mut rng).is_none());
    }
}
