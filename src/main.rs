// src/main.rs

use anyhow::Result;
use std::time::Duration;
use table_referee::pipeline::{Session, TickOutcome};
use table_referee::types::{Config, SourceKind};
use table_referee::{FrameSource, ImageSequenceSource, JsonlEventWriter, LoggingSink};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("table_referee={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🎱 Table referee starting");
    info!("✓ Configuration: {}", config_path);
    info!(
        "Motion threshold {:.1}% | detection every {} ticks | active ball {}",
        config.motion.threshold_percent, config.detection.interval, config.referee.active_ball
    );

    match config.source.kind {
        SourceKind::Images => {
            let source = ImageSequenceSource::new(&config.source.path, config.source.fps);
            run(config, source)
        }
        #[cfg(feature = "opencv")]
        SourceKind::Camera => {
            let source = table_referee::CameraSource::device(config.source.device_index);
            run(config, source)
        }
        #[cfg(feature = "opencv")]
        SourceKind::Video => {
            let source = table_referee::CameraSource::file(&config.source.path);
            run(config, source)
        }
        #[cfg(not(feature = "opencv"))]
        SourceKind::Camera | SourceKind::Video => {
            anyhow::bail!("source kind {:?} needs the `opencv` feature", config.source.kind)
        }
    }
}

fn run<S: FrameSource>(config: Config, source: S) -> Result<()> {
    let events_path = config.output.events_path.clone();
    let mut session = match Session::acquire(config, source) {
        Ok(session) => session,
        Err(e) => {
            error!("Could not start: {}", e);
            return Err(e.into());
        }
    };
    let mut writer = JsonlEventWriter::create(&events_path)?;
    let mut sink = LoggingSink;

    loop {
        let outcome = session.tick(&mut sink)?;
        for event in session.drain_events() {
            writer.write(&event)?;
        }
        match outcome {
            TickOutcome::Exhausted => break,
            TickOutcome::Idle => std::thread::sleep(Duration::from_millis(5)),
            TickOutcome::Processed { .. } => {}
        }
    }
    writer.flush()?;

    let snapshot = session.snapshot();
    info!(
        "Last state: motion={} table={} pockets={} balls={} near_pockets={}",
        snapshot.motion_state.as_str(),
        if snapshot.table_detected { "yes" } else { "no" },
        snapshot.pocket_count,
        snapshot.visibility,
        snapshot.balls_near_pockets
    );

    let summary = session.tracker().metrics().summary();
    info!("\n========================================");
    info!("✓ Run complete");
    info!("  Ticks: {} ({:.1}/s)", summary.total_ticks, summary.ticks_per_sec);
    info!(
        "  Detection cycles: {} (table visible {:.1}%)",
        summary.detection_cycles, summary.table_visible_pct
    );
    info!("  Motion starts: {}", summary.motion_starts);
    info!("  Pots: {} | Fouls: {}", summary.pots, summary.fouls);
    info!("  Events written: {} → {}", writer.written(), events_path);
    info!("========================================");

    session.stop();
    Ok(())
}
