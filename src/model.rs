use serde::{Deserialize, Serialize};

/// Summary of one finished generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Generation number, starting at 1 for each session.
    pub generation: usize,

    /// Fitness of the elite carried into the next generation.
    pub best_fitness: f64,
    /// Mean fitness over the whole population.
    pub mean_fitness: f64,

    /// Frames simulated before the generation ended.
    pub frames: usize,
    /// Cars still undamaged when the generation ended.
    pub survivors: usize,
}
