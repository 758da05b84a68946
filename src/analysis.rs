use crate::model::GenerationRecord;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter},
    path::Path,
};

/// Quantity tracked across generation records.
pub trait Obs {
    fn update(&mut self, record: &GenerationRecord);
    fn report(&self) -> serde_json::Value;
}

/// Statistics of one numeric field of [`GenerationRecord`].
pub struct FieldObs {
    name: &'static str,
    field: fn(&GenerationRecord) -> f64,
    acc: Accumulator,
}

impl FieldObs {
    pub fn new(name: &'static str, field: fn(&GenerationRecord) -> f64) -> Self {
        Self {
            name,
            field,
            acc: Accumulator::new(),
        }
    }
}

impl Obs for FieldObs {
    fn update(&mut self, record: &GenerationRecord) {
        self.acc.add((self.field)(record));
    }

    fn report(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(self.name.to_owned(), serde_json::json!(self.acc.report()));
        serde_json::Value::Object(map)
    }
}

/// Fraction of generations that ended on the frame budget with cars still driving.
#[derive(Default)]
pub struct TimedOut {
    n_gens: usize,
    n_timed_out: usize,
}

impl TimedOut {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Obs for TimedOut {
    fn update(&mut self, record: &GenerationRecord) {
        self.n_gens += 1;
        if record.survivors > 0 {
            self.n_timed_out += 1;
        }
    }

    fn report(&self) -> serde_json::Value {
        let frac = if self.n_gens > 0 {
            self.n_timed_out as f64 / self.n_gens as f64
        } else {
            f64::NAN
        };
        serde_json::json!({ "timed_out": frac })
    }
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
    n_records: usize,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(FieldObs::new("best_fitness", |rec| rec.best_fitness)),
            Box::new(FieldObs::new("mean_fitness", |rec| rec.mean_fitness)),
            Box::new(FieldObs::new("frames", |rec| rec.frames as f64)),
            Box::new(FieldObs::new("survivors", |rec| rec.survivors as f64)),
            Box::new(TimedOut::new()),
        ];
        Self {
            obs_ptr_vec,
            n_records: 0,
        }
    }

    pub fn n_records(&self) -> usize {
        self.n_records
    }

    pub fn add_record(&mut self, record: &GenerationRecord) {
        for obs in &mut self.obs_ptr_vec {
            obs.update(record);
        }
        self.n_records += 1;
    }

    /// Read every record of a session file.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        while !reader.fill_buf().context("failed to fill read buffer")?.is_empty() {
            let record: GenerationRecord =
                decode::from_read(&mut reader).context("failed to read record")?;
            self.add_record(&record);
        }
        Ok(())
    }

    pub fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::json!({ "generations": self.n_records, "observables": reports })
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, &self.report()).context("failed to write results")?;
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(generation: usize, best_fitness: f64, survivors: usize) -> GenerationRecord {
        GenerationRecord {
            generation,
            best_fitness,
            mean_fitness: best_fitness / 2.0,
            frames: 100 * generation,
            survivors,
        }
    }

    #[test]
    fn report_summarizes_records() {
        let mut analyzer = Analyzer::new();
        analyzer.add_record(&record(1, 100.0, 0));
        analyzer.add_record(&record(2, 300.0, 2));

        let report = analyzer.report();
        assert_eq!(report["generations"], 2);
        let observables = report["observables"].as_array().expect("list of observables");
        assert_eq!(observables[0]["best_fitness"]["mean"], 200.0);
        assert_eq!(observables[0]["best_fitness"]["max"], 300.0);
        assert_eq!(observables[2]["frames"]["mean"], 150.0);
        assert_eq!(observables[4]["timed_out"], 0.5);
    }

    #[test]
    fn empty_analyzer_reports_nothing() {
        let analyzer = Analyzer::default();
        assert_eq!(analyzer.n_records(), 0);

        let report = analyzer.report();
        assert_eq!(report["generations"], 0);
        let observables = report["observables"].as_array().expect("list of observables");
        assert_eq!(observables.len(), 5);
        assert!(observables[0]["best_fitness"]["mean"].is_null());
        assert!(observables[4]["timed_out"].is_null());
    }
}
