use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{f64::consts::TAU, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sensor: SensorConfig,
    pub network: NetworkConfig,
    pub evolution: EvolutionConfig,
    pub road: RoadConfig,
    pub car: CarConfig,
    pub traffic: TrafficConfig,
}

/// Ray fan carried by every AI car.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Number of rays (odd).
    pub ray_count: usize,
    /// Length of each ray.
    pub ray_length: f64,
    /// Angle covered by the whole fan (radians).
    pub ray_spread: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Widths of the hidden layers, between the sensor inputs and the 4 controls.
    pub hidden_layers: Vec<usize>,
}

/// Population size, mutation tiers and generation timing.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of AI cars per generation.
    pub population: usize,

    /// Fraction of the population (elite included) given the low mutation amount.
    #[serde(default = "default_low_fraction")]
    pub low_fraction: f64,
    /// Fraction of the population below which the medium amount is used.
    #[serde(default = "default_medium_fraction")]
    pub medium_fraction: f64,

    #[serde(default = "default_low_amount")]
    pub low_amount: f64,
    #[serde(default = "default_medium_amount")]
    pub medium_amount: f64,
    #[serde(default = "default_high_amount")]
    pub high_amount: f64,

    /// Delay between the last car getting damaged and the next generation.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    /// Frames after which a generation is ended even if some cars survive.
    pub max_frames: usize,

    /// Seed for reproducible runs; drawn from the OS when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RoadConfig {
    pub width: f64,
    pub lane_count: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CarConfig {
    pub width: f64,
    pub height: f64,
    pub max_speed: f64,
    pub acceleration: f64,
    pub friction: f64,
    pub start_lane: usize,
    pub start_y: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    pub max_speed: f64,
    #[serde(default)]
    pub cars: Vec<TrafficCar>,
}

/// Scripted car placed at the start of every generation.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TrafficCar {
    pub lane: usize,
    pub y: f64,
}

fn default_low_fraction() -> f64 {
    0.1
}

fn default_medium_fraction() -> f64 {
    0.5
}

fn default_low_amount() -> f64 {
    0.05
}

fn default_medium_amount() -> f64 {
    0.15
}

fn default_high_amount() -> f64 {
    0.4
}

fn default_restart_delay_ms() -> u64 {
    800
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be a TOML document with one table per section.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Widths of every network layer, from sensor inputs to controls.
    pub fn network_layout(&self) -> Vec<usize> {
        let mut layout = Vec::with_capacity(self.network.hidden_layers.len() + 2);
        layout.push(self.sensor.ray_count);
        layout.extend(&self.network.hidden_layers);
        layout.push(crate::network::N_CONTROLS);
        layout
    }

    fn validate(&self) -> Result<()> {
        let sensor = &self.sensor;
        check_num(sensor.ray_count, 1..100).context("invalid ray count")?;
        if sensor.ray_count % 2 == 0 {
            bail!("ray count must be odd, but is {}", sensor.ray_count);
        }
        check_pos(sensor.ray_length).context("invalid ray length")?;
        check_num(sensor.ray_spread, 0.0..=TAU).context("invalid ray spread")?;

        for (i_lay, &width) in self.network.hidden_layers.iter().enumerate() {
            check_num(width, 1..=64).with_context(|| format!("invalid hidden layer {i_lay}"))?;
        }

        let evo = &self.evolution;
        check_num(evo.population, 1..=100_000).context("invalid population size")?;
        check_num(evo.low_fraction, 0.0..=1.0).context("invalid low mutation fraction")?;
        check_num(evo.medium_fraction, evo.low_fraction..=1.0)
            .context("invalid medium mutation fraction")?;
        check_num(evo.low_amount, 0.0..=1.0).context("invalid low mutation amount")?;
        check_num(evo.medium_amount, 0.0..=1.0).context("invalid medium mutation amount")?;
        check_num(evo.high_amount, 0.0..=1.0).context("invalid high mutation amount")?;
        check_num(evo.restart_delay_ms, 0..=60_000).context("invalid restart delay")?;
        check_num(evo.max_frames, 1..=1_000_000).context("invalid frame budget")?;

        let road = &self.road;
        check_pos(road.width).context("invalid road width")?;
        check_num(road.lane_count, 1..=16).context("invalid lane count")?;

        let car = &self.car;
        check_pos(car.width).context("invalid car width")?;
        check_pos(car.height).context("invalid car height")?;
        check_pos(car.max_speed).context("invalid car max speed")?;
        check_pos(car.acceleration).context("invalid car acceleration")?;
        check_num(car.friction, 0.0..car.acceleration).context("invalid car friction")?;
        check_num(car.start_lane, 0..road.lane_count).context("invalid start lane")?;

        check_pos(self.traffic.max_speed).context("invalid traffic max speed")?;
        for (i_car, traffic_car) in self.traffic.cars.iter().enumerate() {
            check_num(traffic_car.lane, 0..road.lane_count)
                .with_context(|| format!("invalid lane of traffic car {i_car}"))?;
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_pos(num: f64) -> Result<()> {
    if !(num.is_finite() && num > 0.0) {
        bail!("number must be positive and finite, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const EXAMPLE: &str = r#"
[sensor]
ray_count = 9
ray_length = 250.0
ray_spread = 2.356194490192345

[network]
hidden_layers = [6]

[evolution]
population = 50
restart_delay_ms = 0
max_frames = 600
seed = 17

[road]
width = 252.0
lane_count = 3

[car]
width = 30.0
height = 50.0
max_speed = 3.5
acceleration = 0.2
friction = 0.05
start_lane = 1
start_y = 100.0

[traffic]
max_speed = 2.0
cars = [
    { lane = 1, y = -100.0 },
    { lane = 0, y = -300.0 },
    { lane = 2, y = -300.0 },
]
"#;

    pub(crate) fn example() -> Config {
        let config: Config = toml::from_str(EXAMPLE).expect("example config should parse");
        config.validate().expect("example config should be valid");
        config
    }

    #[test]
    fn defaults_fill_mutation_tiers() {
        let config = example();
        assert_eq!(config.evolution.low_fraction, 0.1);
        assert_eq!(config.evolution.medium_fraction, 0.5);
        assert_eq!(config.evolution.high_amount, 0.4);
        assert_eq!(config.evolution.seed, Some(17));
        assert_eq!(config.network_layout(), vec![9, 6, 4]);
    }

    #[test]
    fn even_ray_count_is_rejected() {
        let mut config = example();
        config.sensor.ray_count = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = example();
        config.evolution.medium_fraction = 0.05;
        assert!(config.validate().is_err());

        let mut config = example();
        config.traffic.cars.push(TrafficCar { lane: 3, y: 0.0 });
        assert!(config.validate().is_err());

        let mut config = example();
        config.road.width = f64::NAN;
        assert!(config.validate().is_err());
    }
}
