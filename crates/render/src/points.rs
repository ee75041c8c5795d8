use glam::Vec3;

/// Axis-aligned box around a set of dot vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub count: usize,
}

impl PointBounds {
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Bounds of `vertices` read as packed `x, y, z` triples. A trailing
/// partial triple is ignored; `None` when there is no whole point.
pub fn point_bounds(vertices: &[f32]) -> Option<PointBounds> {
    let mut points = vertices
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]));
    let first = points.next()?;
    let (min, max, count) = points.fold((first, first, 1), |(min, max, n), p| {
        (min.min(p), max.max(p), n + 1)
    });
    Some(PointBounds { min, max, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_every_point() {
        let bounds = point_bounds(&[0.0, 1.0, 2.0, 4.0, -1.0, 0.5, 2.0, 0.0, 3.0]).unwrap();
        assert_eq!(bounds.min, Vec3::new(0.0, -1.0, 0.5));
        assert_eq!(bounds.max, Vec3::new(4.0, 1.0, 3.0));
        assert_eq!(bounds.count, 3);
        assert_eq!(bounds.center(), Vec3::new(2.0, 0.0, 1.75));
    }

    #[test]
    fn partial_triples_are_ignored() {
        assert_eq!(point_bounds(&[1.0, 2.0]), None);
        let bounds = point_bounds(&[1.0, 2.0, 3.0, 9.0]).unwrap();
        assert_eq!(bounds.count, 1);
        assert_eq!(bounds.size(), Vec3::ZERO);
    }
}
