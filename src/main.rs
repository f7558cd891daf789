/// Replays a TOML scenario through the engine.
///
///   tilestrike-autoattack <config-dir> <scenario.toml> [ticks]
///
/// Loads `config.toml` from the config directory (defaults when missing),
/// ticks the engine on a timer, applies every recorded action back to the
/// simulated world and prints the final engine snapshot as JSON.
use anyhow::{Context, Result};
use std::path::PathBuf;
use tilestrike_lib::{config, sim::{Recorder, SimWorld}, Engine};

const DEFAULT_TICKS: u32 = 40;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(config_dir), Some(scenario)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: tilestrike-autoattack <config-dir> <scenario.toml> [ticks]");
    };
    let ticks = match args.next() {
        Some(n) => n.parse::<u32>().context("ticks must be a number")?,
        None    => DEFAULT_TICKS,
    };

    let config_dir = PathBuf::from(config_dir);
    let _guard = tilestrike_lib::init_logging(&config_dir.join("logs"))?;

    let cfg   = config::load_or_default(&config_dir)?;
    let world = SimWorld::load(&PathBuf::from(&scenario))
        .with_context(|| format!("loading scenario {}", scenario))?;
    tracing::info!("Scenario {} loaded, {} rules, {} ticks", scenario, cfg.rules.len(), ticks);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let snapshot = rt.block_on(drive(cfg, world, ticks));

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn drive(cfg: config::AppConfig, mut world: SimWorld, ticks: u32) -> tilestrike_lib::EngineSnapshot {
    let step_ms = cfg.engine.tick_interval_ms.max(1);
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(step_ms));
    let mut engine = Engine::new(cfg.engine.clone());
    let mut recorder = Recorder::new();

    for _ in 0..ticks {
        interval.tick().await;
        let outcome = engine.run_tick(&world, &mut recorder, &cfg.rules, &cfg.settings);
        tracing::trace!("t={} {:?}", world.now_ms, outcome);
        for record in recorder.drain() {
            tracing::info!("t={} {:?}", world.now_ms, record);
            world.apply(&record);
        }
        world.advance(step_ms);
    }
    engine.snapshot()
}
