//! Frame stepping and generation turnover.

use crate::car::Car;
use crate::config::Config;
use crate::evolution::{Evolution, MutationTiers, Phase, seed_population};
use crate::geometry::Point;
use crate::model::GenerationRecord;
use crate::network::{self, NeuralNetwork};
use crate::road::Road;
use crate::sensor::Sensor;
use crate::store::BrainStore;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    thread,
    time::{Duration, Instant},
};

/// Simulation engine.
///
/// Holds the configuration, road, traffic, evolving population and random
/// number generator, and steps the simulation one frame at a time.
pub struct Engine {
    cfg: Config,
    road: Road,
    traffic: Vec<Car>,
    evolution: Evolution,
    tiers: MutationTiers,
    rng: ChaCha12Rng,
    frame: usize,
}

impl Engine {
    /// Create a new `Engine`, seeding the first population from the stored brain if any.
    pub fn new(cfg: Config, store: &dyn BrainStore) -> Result<Self> {
        let mut rng = match cfg.evolution.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let road = Road::new(&cfg.road);
        let tiers = MutationTiers::from_config(&cfg.evolution);

        let baseline = load_baseline(&cfg, store).context("failed to load baseline brain")?;
        match &baseline {
            Some(_) => log::info!("seeding population from stored brain"),
            None => log::info!("seeding random population"),
        }

        let brains = seed_population(
            baseline.as_ref(),
            cfg.evolution.population,
            &tiers,
            &cfg.network_layout(),
            &mut rng,
        );
        let population = spawn_population(&cfg, &road, brains);
        let traffic = spawn_traffic(&cfg, &road);
        let evolution = Evolution::new(
            population,
            Duration::from_millis(cfg.evolution.restart_delay_ms),
        );

        Ok(Self {
            cfg,
            road,
            traffic,
            evolution,
            tiers,
            rng,
            frame: 0,
        })
    }

    pub fn evolution(&self) -> &Evolution {
        &self.evolution
    }

    /// Simulate `n_gens` generations and append their records to a binary file.
    pub fn run_generations<P: AsRef<Path>>(
        &mut self,
        n_gens: usize,
        store: &mut dyn BrainStore,
        file: P,
    ) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let mut i_gen = 0;
        while i_gen < n_gens {
            let now = Instant::now();
            match self.step(now, store).context("failed to perform step")? {
                Some(record) => {
                    encode::write(&mut writer, &record).context("failed to serialize record")?;
                    i_gen += 1;

                    let progress = 100.0 * i_gen as f64 / n_gens as f64;
                    log::info!("completed {progress:06.2}%");
                }
                None => {
                    // Every car is frozen until the pending restart fires.
                    if let Some(wait) = self.evolution.restart_remaining(now) {
                        thread::sleep(wait);
                    }
                }
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Perform one frame.
    ///
    /// Returns the record of the generation that ended during this frame, if any.
    pub fn step(
        &mut self,
        now: Instant,
        store: &mut dyn BrainStore,
    ) -> Result<Option<GenerationRecord>> {
        let borders = self.road.borders();

        for car in &mut self.traffic {
            car.update(borders, &[]).context("failed to update traffic car")?;
        }

        let traffic_polys: Vec<&[Point]> = self.traffic.iter().map(Car::polygon).collect();
        for car in self.evolution.population_mut() {
            car.update(borders, &traffic_polys)
                .context("failed to update AI car")?;
        }

        self.frame += 1;

        let mut phase = self.evolution.observe(now);
        if phase != Phase::Seeding && self.frame >= self.cfg.evolution.max_frames {
            log::debug!("frame budget reached with cars still running");
            self.evolution.force_seeding();
            phase = Phase::Seeding;
        }

        if phase == Phase::Seeding {
            let record = self
                .advance_generation(store)
                .context("failed to advance generation")?;
            return Ok(Some(record));
        }

        Ok(None)
    }

    /// Persist the best brain and replace the population with its offspring.
    pub fn advance_generation(&mut self, store: &mut dyn BrainStore) -> Result<GenerationRecord> {
        let population = self.evolution.population();
        let best = self.evolution.best_car().context("population is empty")?;

        let record = GenerationRecord {
            generation: self.evolution.generation(),
            best_fitness: best.fitness(),
            mean_fitness: population.iter().map(Car::fitness).sum::<f64>()
                / population.len() as f64,
            frames: self.frame,
            survivors: population.iter().filter(|car| !car.damaged()).count(),
        };

        let elite = best.brain().context("best car has no brain")?.clone();
        let data = network::serialize(&elite).context("failed to serialize elite brain")?;
        store.save(&data).context("failed to save elite brain")?;

        let brains = seed_population(
            Some(&elite),
            self.cfg.evolution.population,
            &self.tiers,
            &self.cfg.network_layout(),
            &mut self.rng,
        );
        let population = spawn_population(&self.cfg, &self.road, brains);
        self.traffic = spawn_traffic(&self.cfg, &self.road);
        self.evolution.replace(population);
        self.frame = 0;

        log::info!(
            "generation {} done: best fitness {:.1}, {} frames",
            record.generation,
            record.best_fitness,
            record.frames
        );

        Ok(record)
    }
}

fn load_baseline(cfg: &Config, store: &dyn BrainStore) -> Result<Option<NeuralNetwork>> {
    let Some(data) = store.load().context("failed to read stored brain")? else {
        return Ok(None);
    };

    match network::deserialize(&data) {
        Ok(brain) if brain.layout() == cfg.network_layout() => Ok(Some(brain)),
        Ok(brain) => {
            log::warn!(
                "stored brain has layout {:?}, expected {:?}; starting from random brains",
                brain.layout(),
                cfg.network_layout()
            );
            Ok(None)
        }
        Err(err) => {
            log::warn!("{err}; starting from random brains");
            Ok(None)
        }
    }
}

fn spawn_population(cfg: &Config, road: &Road, brains: Vec<NeuralNetwork>) -> Vec<Car> {
    let x = road.lane_center(cfg.car.start_lane);
    brains
        .into_iter()
        .map(|brain| {
            let sensor = Sensor::new(&cfg.sensor);
            Car::controlled(x, cfg.car.start_y, &cfg.car, sensor, brain)
        })
        .collect()
}

fn spawn_traffic(cfg: &Config, road: &Road) -> Vec<Car> {
    cfg.traffic
        .cars
        .iter()
        .map(|traffic_car| {
            let x = road.lane_center(traffic_car.lane);
            Car::scripted(x, traffic_car.y, &cfg.car, cfg.traffic.max_speed)
        })
        .collect()
}
