//! Generation lifecycle and elite seeding.
//!
//! Every generation is seeded from the single best brain of the previous
//! one: the elite is copied verbatim and the rest of the population gets
//! clones mutated by an amount that grows with the agent's index.

use crate::car::Car;
use crate::config::EvolutionConfig;
use crate::network::NeuralNetwork;
use rand::Rng;
use std::time::{Duration, Instant};

/// Where the current generation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// Every car is damaged; the restart timer is pending.
    AllDamaged,
    /// Ready to be replaced by the next generation.
    Seeding,
}

/// Mutation amount by population index.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationTiers {
    pub low_fraction: f64,
    pub medium_fraction: f64,
    pub low_amount: f64,
    pub medium_amount: f64,
    pub high_amount: f64,
}

impl MutationTiers {
    pub fn from_config(cfg: &EvolutionConfig) -> Self {
        Self {
            low_fraction: cfg.low_fraction,
            medium_fraction: cfg.medium_fraction,
            low_amount: cfg.low_amount,
            medium_amount: cfg.medium_amount,
            high_amount: cfg.high_amount,
        }
    }

    /// First index of the medium and of the high tier.
    pub fn boundaries(&self, size: usize) -> (usize, usize) {
        let low_end = (self.low_fraction * size as f64).round() as usize;
        let medium_end = (self.medium_fraction * size as f64).round() as usize;
        (low_end.max(1), medium_end.max(low_end.max(1)))
    }

    /// Mutation amount for agent `index` of a population of `size`.
    ///
    /// Index 0 is the elite and is never mutated.
    pub fn amount(&self, index: usize, size: usize) -> f64 {
        let (low_end, medium_end) = self.boundaries(size);
        if index == 0 {
            0.0
        } else if index < low_end {
            self.low_amount
        } else if index < medium_end {
            self.medium_amount
        } else {
            self.high_amount
        }
    }
}

/// Build the brains of a new population.
///
/// With a `baseline`, every brain is an independent clone of it mutated by
/// its tier amount. Without one, every brain is random with `layout`.
pub fn seed_population<R: Rng + ?Sized>(
    baseline: Option<&NeuralNetwork>,
    size: usize,
    tiers: &MutationTiers,
    layout: &[usize],
    rng: &mut R,
) -> Vec<NeuralNetwork> {
    (0..size)
        .map(|index| match baseline {
            Some(baseline) => {
                let mut brain = baseline.clone();
                brain.mutate(tiers.amount(index, size), rng);
                brain
            }
            None => NeuralNetwork::random(layout, rng),
        })
        .collect()
}

/// Index of the highest fitness; ties go to the earliest index.
pub fn best_index<I: IntoIterator<Item = f64>>(fitnesses: I) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, fitness) in fitnesses.into_iter().enumerate() {
        match best {
            Some((_, best_fitness)) if fitness <= best_fitness => {}
            _ => best = Some((index, fitness)),
        }
    }
    best.map(|(index, _)| index)
}

/// Cancellable one-shot deadline used to debounce generation restarts.
#[derive(Debug, Clone)]
pub struct RestartTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl RestartTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Start the timer at `now`. Does nothing and returns `false` if already pending.
    pub fn arm(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(now + self.delay);
        true
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the timer fires, if pending.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Returns `true` exactly once, at the first call on or after the deadline.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Mutable state of the running simulation.
///
/// Owns the population, the best car, the generation counter and the
/// pending restart. The population is only ever replaced as a whole.
pub struct Evolution {
    population: Vec<Car>,
    best: usize,
    generation: usize,
    phase: Phase,
    restart: RestartTimer,
}

impl Evolution {
    pub fn new(population: Vec<Car>, restart_delay: Duration) -> Self {
        Self {
            population,
            best: 0,
            generation: 1,
            phase: Phase::Running,
            restart: RestartTimer::new(restart_delay),
        }
    }

    pub fn population(&self) -> &[Car] {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut [Car] {
        &mut self.population
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn best_car(&self) -> Option<&Car> {
        self.population.get(self.best)
    }

    /// Time left before a pending restart fires.
    pub fn restart_remaining(&self, now: Instant) -> Option<Duration> {
        self.restart.remaining(now)
    }

    /// Look at the population after a frame and move the lifecycle forward.
    pub fn observe(&mut self, now: Instant) -> Phase {
        if let Some(best) = best_index(self.population.iter().map(Car::fitness)) {
            self.best = best;
        }

        let all_damaged = self.population.iter().all(Car::damaged);
        match self.phase {
            Phase::Running if all_damaged => {
                if self.restart.arm(now) {
                    log::debug!("generation {} all damaged, restart armed", self.generation);
                }
                self.phase = Phase::AllDamaged;
            }
            Phase::AllDamaged if !all_damaged => {
                self.restart.cancel();
                log::debug!("generation {} restart cancelled", self.generation);
                self.phase = Phase::Running;
            }
            _ => {}
        }

        if self.phase == Phase::AllDamaged && self.restart.fire(now) {
            self.phase = Phase::Seeding;
        }

        self.phase
    }

    /// End the generation now, regardless of surviving cars.
    pub fn force_seeding(&mut self) {
        self.restart.cancel();
        self.phase = Phase::Seeding;
    }

    /// Swap in the next generation's population.
    pub fn replace(&mut self, population: Vec<Car>) {
        self.population = population;
        self.best = 0;
        self.generation += 1;
        self.phase = Phase::Running;
        self.restart.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CarConfig, SensorConfig};
    use crate::geometry::{Point, Segment};
    use crate::network::Level;
    use crate::sensor::Sensor;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn tiers() -> MutationTiers {
        MutationTiers {
            low_fraction: 0.1,
            medium_fraction: 0.5,
            low_amount: 0.05,
            medium_amount: 0.15,
            high_amount: 0.4,
        }
    }

    fn cars(n_cars: usize, rng: &mut ChaCha12Rng) -> Vec<Car> {
        let cfg = CarConfig {
            width: 30.0,
            height: 50.0,
            max_speed: 3.0,
            acceleration: 0.2,
            friction: 0.05,
            start_lane: 0,
            start_y: 0.0,
        };
        let sensor_cfg = SensorConfig {
            ray_count: 3,
            ray_length: 100.0,
            ray_spread: 1.0,
        };
        (0..n_cars)
            .map(|i_car| {
                let brain = NeuralNetwork::random(&[3, 4], rng);
                Car::controlled(100.0 * i_car as f64, 0.0, &cfg, Sensor::new(&sensor_cfg), brain)
            })
            .collect()
    }

    fn crash(car: &mut Car) {
        // A border right through the car damages it on its next update.
        let pos = car.position();
        let border = Segment::new(Point::new(pos.x - 100.0, pos.y), Point::new(pos.x + 100.0, pos.y));
        car.update(&[border], &[]).expect("valid brain");
        assert!(car.damaged());
    }

    #[test]
    fn tier_composition_sums_to_population() {
        // Starting from an all-zero brain, the largest value of each offspring
        // is bounded by its mutation amount.
        let level = Level::new(vec![vec![0.0; 4]; 9], vec![0.0; 4]).expect("valid level");
        let baseline = NeuralNetwork::from_levels(vec![level]).expect("valid network");
        let size = 500;
        let mut rng = ChaCha12Rng::seed_from_u64(500);
        let brains = seed_population(Some(&baseline), size, &tiers(), &[9, 4], &mut rng);
        assert_eq!(brains.len(), size);

        let max_abs = |brain: &NeuralNetwork| {
            brain
                .levels()
                .iter()
                .flat_map(|lvl| lvl.weights().iter().flatten().chain(lvl.biases()))
                .fold(0.0_f64, |max, v| max.max(v.abs()))
        };
        let mut counts = [0; 4];
        for brain in &brains {
            let tier = match max_abs(brain) {
                m if m == 0.0 => 0,
                m if m <= 0.05 => 1,
                m if m <= 0.15 => 2,
                _ => 3,
            };
            counts[tier] += 1;
        }

        let low_end = (0.1 * size as f64).round() as usize;
        let medium_end = (0.5 * size as f64).round() as usize;
        assert_eq!(brains.iter().filter(|brain| **brain == baseline).count(), 1);
        assert_eq!(brains[0], baseline);
        assert_eq!(counts, [1, low_end - 1, medium_end - low_end, size - medium_end]);
    }

    #[test]
    fn tiny_populations_keep_the_elite() {
        let tiers = tiers();
        assert_eq!(tiers.amount(0, 1), 0.0);
        assert_eq!(tiers.amount(1, 2), 0.4);
        assert_eq!(tiers.boundaries(3), (1, 2));
    }

    #[test]
    fn seeding_from_baseline_clones_and_mutates() {
        let mut rng = ChaCha12Rng::seed_from_u64(21);
        let baseline = NeuralNetwork::random(&[9, 6, 4], &mut rng);
        let brains = seed_population(Some(&baseline), 20, &tiers(), &[9, 6, 4], &mut rng);

        assert_eq!(brains.len(), 20);
        assert_eq!(brains[0], baseline);
        assert!(brains[1..].iter().all(|brain| *brain != baseline));
        assert!(brains.iter().all(|brain| brain.layout() == vec![9, 6, 4]));
    }

    #[test]
    fn seeding_without_baseline_is_random() {
        let mut rng = ChaCha12Rng::seed_from_u64(22);
        let brains = seed_population(None, 5, &tiers(), &[5, 6, 4], &mut rng);
        assert_eq!(brains.len(), 5);
        assert!(brains.iter().all(|brain| brain.layout() == vec![5, 6, 4]));
        assert_ne!(brains[0], brains[1]);
    }

    #[test]
    fn best_index_prefers_first_maximum() {
        assert_eq!(best_index([1.0, 5.0, 3.0, 5.0]), Some(1));
        assert_eq!(best_index([2.0, 2.0]), Some(0));
        assert_eq!(best_index(Vec::<f64>::new()), None);
    }

    #[test]
    fn restart_timer_does_not_double_fire() {
        let now = Instant::now();
        let mut timer = RestartTimer::new(Duration::from_millis(800));
        assert!(timer.arm(now));
        assert!(!timer.arm(now + Duration::from_millis(500)));
        assert!(!timer.fire(now + Duration::from_millis(799)));
        assert!(timer.fire(now + Duration::from_millis(800)));
        assert!(!timer.fire(now + Duration::from_millis(900)));
        assert!(!timer.is_pending());

        assert!(timer.arm(now));
        timer.cancel();
        assert!(!timer.fire(now + Duration::from_secs(5)));
    }

    #[test]
    fn lifecycle_waits_for_all_cars_then_debounces() {
        let mut rng = ChaCha12Rng::seed_from_u64(23);
        let mut evolution = Evolution::new(cars(3, &mut rng), Duration::from_millis(800));
        let now = Instant::now();

        assert_eq!(evolution.observe(now), Phase::Running);

        crash(&mut evolution.population_mut()[0]);
        crash(&mut evolution.population_mut()[1]);
        assert_eq!(evolution.observe(now), Phase::Running);

        crash(&mut evolution.population_mut()[2]);
        assert_eq!(evolution.observe(now), Phase::AllDamaged);
        assert_eq!(
            evolution.restart_remaining(now + Duration::from_millis(300)),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            evolution.observe(now + Duration::from_millis(400)),
            Phase::AllDamaged
        );
        assert_eq!(
            evolution.observe(now + Duration::from_millis(800)),
            Phase::Seeding
        );

        let next = cars(3, &mut rng);
        evolution.replace(next);
        assert_eq!(evolution.generation(), 2);
        assert_eq!(evolution.phase(), Phase::Running);
        assert!(evolution.restart_remaining(now).is_none());
    }

    #[test]
    fn forced_seeding_ends_generation() {
        let mut rng = ChaCha12Rng::seed_from_u64(24);
        let mut evolution = Evolution::new(cars(2, &mut rng), Duration::from_millis(800));
        evolution.force_seeding();
        assert_eq!(evolution.phase(), Phase::Seeding);
        assert!(evolution.best_car().is_some());
    }
}
