mod context;
mod types;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use mlua::{Lua, LuaOptions, StdLib};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub script: PathBuf,
    pub entry: String,
    pub frames: usize,
    pub dt: f32,
    pub verbose: bool,
    pub summary_json: Option<PathBuf>,
}

/// What a finished run looked like: how far the clock got, what the scripts
/// did, and what was still alive when the driver stopped.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRunSummary {
    frames_run: usize,
    game_time: f32,
    live_threads: usize,
    events: Vec<String>,
    counters: BTreeMap<String, u64>,
}

impl EngineRunSummary {
    pub fn frames_run(&self) -> usize {
        self.frames_run
    }

    pub fn game_time(&self) -> f32 {
        self.game_time
    }

    pub fn live_threads(&self) -> usize {
        self.live_threads
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn counters(&self) -> &BTreeMap<String, u64> {
        &self.counters
    }
}

/// Boots a Lua script and drives it through the fixed-timestep frame loop.
///
/// The script file runs once at the top level (definitions, world setup),
/// then `boot()` is called if the script defines it, then the entry function
/// starts as the first global script thread. The loop stops early once
/// nothing can make progress any more.
pub fn run_script(options: &RunOptions) -> Result<EngineRunSummary> {
    let source = fs::read_to_string(&options.script)
        .with_context(|| format!("reading script {}", options.script.display()))?;
    let script_root = options
        .script
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let chunk_name = options
        .script
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());

    let lua = Lua::new_with(StdLib::ALL_SAFE, LuaOptions::default())
        .context("initialising Lua runtime with standard libraries")?;
    let context = Rc::new(RefCell::new(context::EngineContext::new(
        options.verbose,
        script_root,
    )));
    context::install_globals(&lua, &context)?;

    lua.load(&source)
        .set_name(&chunk_name)
        .exec()
        .with_context(|| format!("running {}", options.script.display()))?;

    context::call_global(&lua, &context, "boot");

    let started = context::start_entry_thread(&lua, &context, &options.entry)?;
    if !started {
        context.borrow_mut().log_event(format!(
            "script.error {}: entry function not defined",
            options.entry
        ));
    }

    let mut frames_run = 0;
    for _ in 0..options.frames {
        if context.borrow().is_idle() {
            break;
        }
        context::run_frame(&lua, &context, options.dt)?;
        frames_run += 1;
    }

    let summary = {
        let ctx = context.borrow();
        EngineRunSummary {
            frames_run,
            game_time: ctx.game_time(),
            live_threads: ctx.live_thread_count(),
            events: ctx.events().to_vec(),
            counters: ctx.counters().clone(),
        }
    };

    if let Some(path) = options.summary_json.as_deref() {
        let json =
            serde_json::to_string_pretty(&summary).context("serializing run summary to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing run summary to {}", path.display()))?;
        if options.verbose {
            eprintln!("[lantern_engine] saved run summary to {}", path.display());
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).expect("create script");
        file.write_all(body.as_bytes()).expect("write script");
        path
    }

    fn options(script: PathBuf) -> RunOptions {
        RunOptions {
            script,
            entry: "main".to_string(),
            frames: 120,
            dt: 0.1,
            verbose: false,
            summary_json: None,
        }
    }

    #[test]
    fn runs_a_script_to_idle_and_reports_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "boot.lua",
            r#"
            function boot()
                logEvent("booted")
            end
            function main()
                breaktime(0.3)
                logEvent("woke")
            end
            "#,
        );
        let summary = run_script(&options(script)).expect("run");
        assert!(summary.frames_run() < 120, "run goes idle well before cap");
        assert_eq!(summary.live_threads(), 0);
        let events = summary.events();
        assert!(events.iter().any(|e| e == "script.log booted"));
        assert!(events.iter().any(|e| e == "script.log woke"));
        let booted = events.iter().position(|e| e == "script.log booted");
        let started = events.iter().position(|e| e.starts_with("thread.start main"));
        assert!(booted < started, "boot runs before the entry thread");
    }

    #[test]
    fn missing_entry_function_is_logged_not_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(dir.path(), "boot.lua", "x = 1\n");
        let summary = run_script(&options(script)).expect("run");
        assert_eq!(summary.frames_run(), 0);
        assert!(summary
            .events()
            .iter()
            .any(|e| e.starts_with("script.error main")));
    }

    #[test]
    fn missing_script_file_is_a_host_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = run_script(&options(dir.path().join("absent.lua")));
        assert!(result.is_err());
    }

    #[test]
    fn summary_json_is_written_when_requested() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "boot.lua",
            r#"
            function main()
                logEvent("ran")
            end
            "#,
        );
        let json_path = dir.path().join("summary.json");
        let mut options = options(script);
        options.summary_json = Some(json_path.clone());
        run_script(&options).expect("run");
        let raw = fs::read_to_string(&json_path).expect("summary file");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert!(parsed["events"]
            .as_array()
            .expect("events array")
            .iter()
            .any(|e| e == "script.log ran"));
    }

    #[test]
    fn armed_trigger_keeps_the_run_live_while_an_actor_walks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "boot.lua",
            r#"
            function boot()
                actor = createActor("ray")
                pad = createObject("pad", 2.0, -1.0, 2.0, 2.0)
                addTrigger(pad, function(obj, who)
                    logEvent("entered")
                end)
            end
            function main()
                actorWalkTo(actor, 6.0, 0.0)
            end
            "#,
        );
        // the entry thread finishes immediately; the walk it started still
        // has to carry the actor through the armed hotspot
        let summary = run_script(&options(script)).expect("run");
        assert!(summary.frames_run() > 0, "run stays live for the walk");
        assert!(summary.frames_run() < 120, "run goes idle once the walk ends");
        let events = summary.events();
        assert!(events.iter().any(|e| e.starts_with("trigger.inside")));
        assert!(events.iter().any(|e| e == "script.log entered"));
    }

    #[test]
    fn frame_cap_stops_a_script_that_never_idles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_script(
            dir.path(),
            "boot.lua",
            r#"
            function main()
                while true do
                    breakhere()
                end
            end
            "#,
        );
        let mut options = options(script);
        options.frames = 25;
        let summary = run_script(&options).expect("run");
        assert_eq!(summary.frames_run(), 25);
        assert_eq!(summary.live_threads(), 1);
    }
}
