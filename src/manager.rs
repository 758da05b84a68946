use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::Engine;
use crate::store::{BrainStore, FileStore};
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Evolve for `n_gens` generations starting from the stored brain.
    pub fn run_session(&self, n_gens: usize) -> Result<()> {
        let mut store = self.brain_store();

        let session_idx = self
            .session_files()
            .context("failed to list session files")?
            .len();
        let session_file = self.session_file(session_idx);

        let mut engine =
            Engine::new(self.cfg.clone(), &store).context("failed to construct engine")?;

        engine
            .run_generations(n_gens, &mut store, &session_file)
            .context("failed to run generations")?;
        log::info!("wrote {session_file:?}");

        Ok(())
    }

    pub fn discard_brain(&self) -> Result<()> {
        self.brain_store()
            .clear()
            .context("failed to clear stored brain")?;
        log::info!("discarded stored brain");
        Ok(())
    }

    pub fn analyze_sessions(&self) -> Result<()> {
        let mut analyzer = Analyzer::new();
        for file in self.session_files().context("failed to list session files")? {
            analyzer
                .add_file(&file)
                .with_context(|| format!("failed to add {file:?}"))?;
        }
        log::info!("analyzed {} generations", analyzer.n_records());

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("wrote {results_file:?}");

        Ok(())
    }

    pub fn clean_sessions(&self) -> Result<()> {
        for file in self.session_files().context("failed to list session files")? {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
            log::info!("removed {results_file:?}");
        }

        Ok(())
    }

    fn brain_store(&self) -> FileStore {
        FileStore::new(self.sim_dir.join("brain.json"))
    }

    fn session_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("session-*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<_> = glob(pattern)
            .context("failed to glob session files")?
            .filter_map(Result::ok)
            .collect();
        files.sort();
        Ok(files)
    }

    fn session_file(&self, session_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("session-{session_idx:04}.msgpack"))
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.json")
    }
}
