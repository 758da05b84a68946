//! Ray fan that measures the distance to the nearest obstacle.

use crate::config::SensorConfig;
use crate::geometry::{Point, Segment, Touch, edges, intersect, lerp};

/// Fan of distance rays attached to one car.
///
/// Ray geometry is fixed at construction; rays and readings are recomputed
/// from the owner's pose on every [`Sensor::update`].
#[derive(Debug, Clone)]
pub struct Sensor {
    ray_count: usize,
    ray_length: f64,
    ray_spread: f64,

    rays: Vec<Segment>,
    readings: Vec<Option<Touch>>,
}

impl Sensor {
    pub fn new(cfg: &SensorConfig) -> Self {
        debug_assert!(cfg.ray_count % 2 == 1, "ray count must be odd");
        Self {
            ray_count: cfg.ray_count,
            ray_length: cfg.ray_length,
            ray_spread: cfg.ray_spread,
            rays: Vec::with_capacity(cfg.ray_count),
            readings: vec![None; cfg.ray_count],
        }
    }

    pub fn ray_count(&self) -> usize {
        self.ray_count
    }

    pub fn rays(&self) -> &[Segment] {
        &self.rays
    }

    /// Nearest hit per ray, `None` where the ray is clear for its full length.
    pub fn readings(&self) -> &[Option<Touch>] {
        &self.readings
    }

    /// Recast all rays from `origin` at `heading` and take the nearest hit of
    /// each against the `borders` and every edge of the `obstacles`.
    pub fn update(
        &mut self,
        origin: Point,
        heading: f64,
        borders: &[Segment],
        obstacles: &[&[Point]],
    ) {
        self.cast_rays(origin, heading);

        self.readings.clear();
        for ray in &self.rays {
            self.readings.push(nearest_touch(ray, borders, obstacles));
        }
    }

    fn cast_rays(&mut self, origin: Point, heading: f64) {
        self.rays.clear();
        for i_ray in 0..self.ray_count {
            // Index 0 is the leftmost ray.
            let t = if self.ray_count == 1 {
                0.5
            } else {
                i_ray as f64 / (self.ray_count - 1) as f64
            };
            let angle = lerp(self.ray_spread / 2.0, -self.ray_spread / 2.0, t) + heading;

            let end = Point::new(
                origin.x - angle.sin() * self.ray_length,
                origin.y - angle.cos() * self.ray_length,
            );
            self.rays.push(Segment::new(origin, end));
        }
    }
}

fn nearest_touch(ray: &Segment, borders: &[Segment], obstacles: &[&[Point]]) -> Option<Touch> {
    let border_touches = borders.iter().filter_map(|border| intersect(ray, border));
    let obstacle_touches = obstacles
        .iter()
        .flat_map(|poly| edges(poly))
        .filter_map(|edge| intersect(ray, &edge));

    border_touches
        .chain(obstacle_touches)
        .fold(None, |nearest: Option<Touch>, touch| match nearest {
            Some(best) if best.offset <= touch.offset => Some(best),
            _ => Some(touch),
        })
}
