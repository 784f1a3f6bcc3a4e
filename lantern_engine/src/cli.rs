use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use crate::lua_host::RunOptions;

/// Script host that drives cooperative adventure scripts frame by frame.
#[derive(Parser, Debug)]
#[command(
    about = "Runs a Lua adventure script through the cooperative frame driver",
    version
)]
pub struct Args {
    /// Path to the boot script
    #[arg(default_value = "scripts/boot.lua")]
    pub script: PathBuf,

    /// Global function started as the first script thread
    #[arg(long, default_value = "main")]
    pub entry: String,

    /// Maximum number of frames to run
    #[arg(long, default_value_t = 600)]
    pub frames: usize,

    /// Fixed timestep per frame, in milliseconds
    #[arg(long, default_value_t = 16.0)]
    pub dt_ms: f64,

    /// Mirror engine events to stderr while running
    #[arg(long)]
    pub verbose: bool,

    /// Path to write the run summary (events + counters) as JSON
    #[arg(long)]
    pub summary_json: Option<PathBuf>,
}

impl Args {
    pub fn into_options(self) -> Result<RunOptions> {
        if self.frames == 0 {
            bail!("--frames must be at least 1");
        }
        if !self.dt_ms.is_finite() || self.dt_ms <= 0.0 {
            bail!("--dt-ms must be a positive number of milliseconds");
        }
        Ok(RunOptions {
            script: self.script,
            entry: self.entry,
            frames: self.frames,
            dt: (self.dt_ms / 1000.0) as f32,
            verbose: self.verbose,
            summary_json: self.summary_json,
        })
    }
}
