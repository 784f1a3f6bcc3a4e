use anyhow::Result;
use clap::Parser;

mod cli;
mod lua_host;

use cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    let options = args.into_options()?;
    let summary = lua_host::run_script(&options)?;

    println!(
        "ran {} frames ({:.2}s game time), {} events, {} live threads",
        summary.frames_run(),
        summary.game_time(),
        summary.events().len(),
        summary.live_threads()
    );
    for (name, count) in summary.counters() {
        println!("  {name}: {count}");
    }
    Ok(())
}
