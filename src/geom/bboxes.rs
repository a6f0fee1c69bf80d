use crate::geom::point::Point;

/// Checks whether a point is inside (or on) the box given by its min and max corners.
pub fn is_point_inside_bbox(ptest: Point, pmin: Point, pmax: Point) -> bool {
    ptest.x >= pmin.x
        && ptest.x <= pmax.x
        && ptest.y >= pmin.y
        && ptest.y <= pmax.y
        && ptest.z >= pmin.z
        && ptest.z <= pmax.z
}

/// Returns the min and max corners of the box holding all points `pts`.
///
/// Returns `None` for an empty slice.
pub fn bounding_box(pts: &[Point]) -> Option<(Point, Point)> {
    let first = *pts.first()?;
    let (pmin, pmax) = pts.iter().fold((first, first), |(lo, hi), p| {
        (
            Point::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
            Point::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
        )
    });
    Some((pmin, pmax))
}

/// Expands a box by `margin` on every side.
pub fn expand_bbox(pmin: Point, pmax: Point, margin: f64) -> (Point, Point) {
    (
        Point::new(pmin.x - margin, pmin.y - margin, pmin.z - margin),
        Point::new(pmax.x + margin, pmax.y + margin, pmax.z + margin),
    )
}
