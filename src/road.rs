use crate::config::RoadConfig;
use crate::geometry::{Point, Segment};

// Vertical extent of the borders, effectively unbounded.
const INFINITY: f64 = 1_000_000.0;

/// Straight multi-lane road centred on `x = width / 2`.
#[derive(Debug, Clone)]
pub struct Road {
    left: f64,
    right: f64,
    lane_count: usize,
    borders: [Segment; 2],
}

impl Road {
    pub fn new(cfg: &RoadConfig) -> Self {
        let x = cfg.width / 2.0;
        let left = x - cfg.width / 2.0;
        let right = x + cfg.width / 2.0;

        let borders = [
            Segment::new(Point::new(left, -INFINITY), Point::new(left, INFINITY)),
            Segment::new(Point::new(right, -INFINITY), Point::new(right, INFINITY)),
        ];

        Self {
            left,
            right,
            lane_count: cfg.lane_count,
            borders,
        }
    }

    pub fn borders(&self) -> &[Segment] {
        &self.borders
    }

    /// Centre x-coordinate of lane `lane`, clamped to the last lane.
    pub fn lane_center(&self, lane: usize) -> f64 {
        let lane_width = (self.right - self.left) / self.lane_count as f64;
        self.left + lane_width / 2.0 + lane.min(self.lane_count - 1) as f64 * lane_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lanes_split_road_evenly() {
        let road = Road::new(&RoadConfig {
            width: 300.0,
            lane_count: 3,
        });
        assert_eq!(road.lane_center(0), 50.0);
        assert_eq!(road.lane_center(1), 150.0);
        assert_eq!(road.lane_center(2), 250.0);
        assert_eq!(road.lane_center(7), 250.0);
        assert_eq!(road.borders().len(), 2);
        assert_eq!(road.borders()[0].start.x, 0.0);
        assert_eq!(road.borders()[1].start.x, 300.0);
    }
}
