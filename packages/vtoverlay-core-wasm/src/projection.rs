//! Projects lng/lat geometry to screen space and serializes it as SVG path
//! data, in the same shape a d3 geo path generator produces.

use geo_types::{Coord, Geometry, LineString, Polygon};
use std::fmt::Write;
use std::rc::Rc;

use crate::config::RendererHook;

/// Host supplied lng/lat → screen point projection.
pub type Projection = Rc<dyn Fn(Coord<f64>) -> Coord<f64>>;

#[derive(Clone)]
pub struct PathGenerator {
    projection: Projection,
    point_radius: f64,
    renderer: Option<RendererHook>,
}

impl PathGenerator {
    pub fn new(projection: Projection, point_radius: f64) -> Self {
        Self {
            projection,
            point_radius,
            renderer: None,
        }
    }

    /// Pipes every generated path through `renderer` before it is bound.
    pub fn with_renderer(mut self, renderer: Option<RendererHook>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Path data for `geometry`, or `None` when it has nothing to draw.
    pub fn path(&self, geometry: &Geometry<f64>) -> Option<String> {
        let mut out = String::new();
        self.write_geometry(&mut out, geometry);
        if out.is_empty() {
            return None;
        }
        Some(match &self.renderer {
            Some(renderer) => renderer(out),
            None => out,
        })
    }

    fn project(&self, c: Coord<f64>) -> Coord<f64> {
        (self.projection)(c)
    }

    fn write_geometry(&self, out: &mut String, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => self.write_point(out, p.0),
            Geometry::MultiPoint(mp) => mp.iter().for_each(|p| self.write_point(out, p.0)),
            Geometry::Line(line) => self.write_line(out, &[line.start, line.end]),
            Geometry::LineString(ls) => self.write_line(out, &ls.0),
            Geometry::MultiLineString(mls) => mls.iter().for_each(|ls| self.write_line(out, &ls.0)),
            Geometry::Polygon(poly) => self.write_polygon(out, poly),
            Geometry::MultiPolygon(mp) => mp.iter().for_each(|poly| self.write_polygon(out, poly)),
            Geometry::Rect(rect) => self.write_polygon(out, &rect.to_polygon()),
            Geometry::Triangle(tri) => self.write_polygon(out, &tri.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.iter().for_each(|g| self.write_geometry(out, g)),
        }
    }

    // Points become a circle made of two arcs
    fn write_point(&self, out: &mut String, c: Coord<f64>) {
        let p = self.project(c);
        let r = self.point_radius;
        let _ = write!(
            out,
            "M{},{}m0,{}a{},{} 0 1,1 0,{}a{},{} 0 1,1 0,{}z",
            p.x,
            p.y,
            r,
            r,
            r,
            -2.0 * r,
            r,
            r,
            2.0 * r
        );
    }

    fn write_line(&self, out: &mut String, coords: &[Coord<f64>]) {
        for (i, c) in coords.iter().enumerate() {
            let p = self.project(*c);
            let _ = write!(out, "{}{},{}", if i == 0 { 'M' } else { 'L' }, p.x, p.y);
        }
    }

    fn write_polygon(&self, out: &mut String, polygon: &Polygon<f64>) {
        self.write_ring(out, polygon.exterior());
        for ring in polygon.interiors() {
            self.write_ring(out, ring);
        }
    }

    fn write_ring(&self, out: &mut String, ring: &LineString<f64>) {
        let mut coords = ring.0.as_slice();
        // The closing coordinate repeats the first; `Z` closes the ring instead
        if coords.len() > 1 && coords.first() == coords.last() {
            coords = &coords[..coords.len() - 1];
        }
        if coords.is_empty() {
            return;
        }
        self.write_line(out, coords);
        out.push('Z');
    }
}

impl std::fmt::Debug for PathGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathGenerator")
            .field("point_radius", &self.point_radius)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, point, polygon, GeometryCollection};

    fn generator() -> PathGenerator {
        PathGenerator::new(Rc::new(|c: Coord<f64>| Coord { x: c.x * 10.0, y: c.y * 10.0 }), 4.5)
    }

    #[test]
    fn test_line_string() {
        let ls = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 2.0, y: 0.5)];
        assert_eq!(
            generator().path(&Geometry::LineString(ls)).as_deref(),
            Some("M0,0L10,10L20,5")
        );
    }

    #[test]
    fn test_polygon_drops_closing_point() {
        let poly = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        assert_eq!(
            generator().path(&Geometry::Polygon(poly)).as_deref(),
            Some("M0,0L10,0L10,10Z")
        );
    }

    #[test]
    fn test_point_is_a_circle() {
        let p = Geometry::Point(point!(x: 1.0, y: 2.0));
        assert_eq!(
            generator().path(&p).as_deref(),
            Some("M10,20m0,4.5a4.5,4.5 0 1,1 0,-9a4.5,4.5 0 1,1 0,9z")
        );
    }

    #[test]
    fn test_empty_geometry_has_no_path() {
        let empty = Geometry::GeometryCollection(GeometryCollection::<f64>::default());
        assert_eq!(generator().path(&empty), None);
    }

    #[test]
    fn test_renderer_post_processes_path() {
        let renderer: RendererHook = Rc::new(|path: String| format!("{}Z", path));
        let paths = generator().with_renderer(Some(renderer));
        let ls = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        assert_eq!(paths.path(&Geometry::LineString(ls)).as_deref(), Some("M0,0L10,0Z"));
    }
}
