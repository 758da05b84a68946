//! Car kinematics, damage and fitness.

use crate::config::CarConfig;
use crate::geometry::{Point, Segment, poly_hits_segment, polys_intersect};
use crate::network::{NetworkError, NeuralNetwork, inputs_from_readings};
use crate::sensor::Sensor;

/// Who decides a car's controls.
#[derive(Debug, Clone)]
pub enum Driver {
    /// Traffic: always drives forward and only serves as an obstacle.
    Scripted,
    /// AI car steered by its own brain from its own sensor.
    Controlled { sensor: Sensor, brain: NeuralNetwork },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub forward: bool,
    pub left: bool,
    pub right: bool,
    pub reverse: bool,
}

impl Controls {
    fn from_outputs(outputs: &[f64]) -> Self {
        let pressed = |idx: usize| outputs.get(idx).is_some_and(|&val| val > 0.5);
        Self {
            forward: pressed(0),
            left: pressed(1),
            right: pressed(2),
            reverse: pressed(3),
        }
    }
}

const TURN_RATE: f64 = 0.03;

/// Kinematic car body.
///
/// Heading `0` points towards negative y and positive angles turn left.
/// Damage is permanent: a damaged car never moves again.
#[derive(Debug, Clone)]
pub struct Car {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    angle: f64,

    speed: f64,
    acceleration: f64,
    max_speed: f64,
    friction: f64,

    start_y: f64,
    fitness: f64,
    damaged: bool,

    polygon: Vec<Point>,
    controls: Controls,
    driver: Driver,
}

impl Car {
    /// Create an AI car at `(x, y)` driven by `brain`.
    pub fn controlled(x: f64, y: f64, cfg: &CarConfig, sensor: Sensor, brain: NeuralNetwork) -> Self {
        Self::new(x, y, cfg, cfg.max_speed, Driver::Controlled { sensor, brain })
    }

    /// Create a traffic car at `(x, y)` with its own top speed.
    pub fn scripted(x: f64, y: f64, cfg: &CarConfig, max_speed: f64) -> Self {
        let mut car = Self::new(x, y, cfg, max_speed, Driver::Scripted);
        car.controls.forward = true;
        car
    }

    fn new(x: f64, y: f64, cfg: &CarConfig, max_speed: f64, driver: Driver) -> Self {
        let mut car = Self {
            x,
            y,
            width: cfg.width,
            height: cfg.height,
            angle: 0.0,
            speed: 0.0,
            acceleration: cfg.acceleration,
            max_speed,
            friction: cfg.friction,
            start_y: y,
            fitness: 0.0,
            damaged: false,
            polygon: Vec::with_capacity(4),
            controls: Controls::default(),
            driver,
        };
        car.polygon = car.create_polygon();
        car
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn damaged(&self) -> bool {
        self.damaged
    }

    /// Furthest forward progress since spawning; never decreases.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    pub fn polygon(&self) -> &[Point] {
        &self.polygon
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    pub fn brain(&self) -> Option<&NeuralNetwork> {
        match &self.driver {
            Driver::Controlled { brain, .. } => Some(brain),
            Driver::Scripted => None,
        }
    }

    pub fn sensor(&self) -> Option<&Sensor> {
        match &self.driver {
            Driver::Controlled { sensor, .. } => Some(sensor),
            Driver::Scripted => None,
        }
    }

    /// Advance the car by one frame.
    ///
    /// Moves the body, checks it against `borders` and the `traffic`
    /// polygons, then lets the brain (if any) choose the next controls.
    pub fn update(&mut self, borders: &[Segment], traffic: &[&[Point]]) -> Result<(), NetworkError> {
        if self.damaged {
            return Ok(());
        }

        self.advance();
        self.polygon = self.create_polygon();
        self.damaged = self.assess_damage(borders, traffic);
        self.fitness = self.fitness.max(self.start_y - self.y);

        if let Driver::Controlled { sensor, brain } = &mut self.driver {
            sensor.update(Point::new(self.x, self.y), self.angle, borders, traffic);
            let outputs = brain.forward(&inputs_from_readings(sensor.readings()))?;
            self.controls = Controls::from_outputs(&outputs);
        }

        Ok(())
    }

    fn advance(&mut self) {
        if self.controls.forward {
            self.speed += self.acceleration;
        }
        if self.controls.reverse {
            self.speed -= self.acceleration;
        }
        self.speed = self.speed.clamp(-self.max_speed / 2.0, self.max_speed);

        if self.speed.abs() <= self.friction {
            self.speed = 0.0;
        } else {
            self.speed -= self.friction * self.speed.signum();
        }

        if self.speed != 0.0 {
            // Steering flips while reversing.
            let flip = self.speed.signum();
            if self.controls.left {
                self.angle += TURN_RATE * flip;
            }
            if self.controls.right {
                self.angle -= TURN_RATE * flip;
            }
        }

        self.x -= self.angle.sin() * self.speed;
        self.y -= self.angle.cos() * self.speed;
    }

    fn create_polygon(&self) -> Vec<Point> {
        let rad = self.width.hypot(self.height) / 2.0;
        let alpha = self.width.atan2(self.height);
        [
            self.angle - alpha,
            self.angle + alpha,
            std::f64::consts::PI + self.angle - alpha,
            std::f64::consts::PI + self.angle + alpha,
        ]
        .iter()
        .map(|theta| Point::new(self.x - theta.sin() * rad, self.y - theta.cos() * rad))
        .collect()
    }

    fn assess_damage(&self, borders: &[Segment], traffic: &[&[Point]]) -> bool {
        borders
            .iter()
            .any(|border| poly_hits_segment(&self.polygon, border))
            || traffic.iter().any(|poly| polys_intersect(&self.polygon, poly))
    }
}
