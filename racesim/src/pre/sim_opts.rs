use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "RS-TD",
    about = "A time-discrete race simulator with concurrent lobby races"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging and print every race event
    #[clap(short, long)]
    pub debug: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for solo races, each run uses the next seed)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file
    #[clap(short, long)]
    pub parfile_path: PathBuf,

    /// Set path to a simulation constants file (defaults are used if not set)
    #[clap(short, long)]
    pub constants_path: Option<PathBuf>,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 0.1]
    #[clap(short, long, default_value = "0.1")]
    pub timestep_size: f64,

    /// Write the standings to this text file
    #[clap(short, long)]
    pub results_path: Option<PathBuf>,
}

/// (s) Range of timestep sizes accepted on the command line.
pub const TIMESTEP_SIZE_RANGE: [f64; 2] = [0.001, 0.1];

impl SimOpts {
    /// check_timestep_size rejects timestep sizes outside of TIMESTEP_SIZE_RANGE.
    pub fn check_timestep_size(&self) -> anyhow::Result<()> {
        let [dt_min, dt_max] = TIMESTEP_SIZE_RANGE;
        if !(dt_min..=dt_max).contains(&self.timestep_size) {
            anyhow::bail!(
                "Timestep size {}s is outside of the range [{}, {}]!",
                self.timestep_size,
                dt_min,
                dt_max
            );
        }
        Ok(())
    }
}
