use geo_types::{LineString, MultiPolygon};

fn crossings(ring: &LineString<f64>, y: f64, out: &mut Vec<f64>) {
    for segment in ring.lines() {
        let (a, b) = (segment.start, segment.end);
        if (a.y > y) != (b.y > y) {
            out.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
        }
    }
}

/// Which of the `cols` cell centres on the horizontal line `y` fall inside
/// `boundary`. Even-odd within each polygon, so holes are respected; parts of
/// a multipolygon are combined by union.
pub(super) fn row_mask(
    boundary: &MultiPolygon<f64>,
    y: f64,
    min_x: f64,
    cell_size: f64,
    cols: usize,
) -> Vec<bool> {
    let mut inside = vec![false; cols];
    let mut xs = Vec::new();

    // first column whose centre is at or right of `x`
    let column_at = |x: f64| -> usize {
        let c = ((x - min_x) / cell_size - 0.5).ceil();
        if c <= 0.0 { 0 } else { (c as usize).min(cols) }
    };

    for polygon in &boundary.0 {
        xs.clear();
        crossings(polygon.exterior(), y, &mut xs);
        for hole in polygon.interiors() {
            crossings(hole, y, &mut xs);
        }
        xs.sort_by(f64::total_cmp);

        for span in xs.chunks_exact(2) {
            let (start, end) = (column_at(span[0]), column_at(span[1]));
            for cell in &mut inside[start..end.max(start)] {
                *cell = true;
            }
        }
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{Polygon, Rect};

    #[test]
    fn overlapping_parts_are_unioned() {
        let parts: Vec<Polygon<f64>> = vec![
            Rect::new((0.0, 0.0), (6.0, 2.0)).to_polygon(),
            Rect::new((4.0, 0.0), (10.0, 2.0)).to_polygon(),
        ];
        let mask = row_mask(&MultiPolygon::new(parts), 1.0, 0.0, 1.0, 10);
        assert!(mask.iter().all(|&inside| inside));
    }

    #[test]
    fn line_outside_the_polygon_is_empty() {
        let square = MultiPolygon::new(vec![Rect::new((0.0, 0.0), (4.0, 4.0)).to_polygon()]);
        assert_eq!(row_mask(&square, 5.0, 0.0, 1.0, 4), vec![false; 4]);
        assert_eq!(row_mask(&square, 0.5, 0.0, 1.0, 4), vec![true; 4]);
    }
}
