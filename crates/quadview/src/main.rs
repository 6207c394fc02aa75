mod config;
mod frame_loop;
mod scene;

use std::process::ExitCode;

use anyhow::Result;

use quadview_engine::backend::NoopBackend;
use quadview_engine::event::EventQueue;
use quadview_engine::logging::{init_logging, LoggingConfig};
use quadview_engine::window::Runtime;

use config::AppConfig;
use frame_loop::{QuadApp, run_headless};
use scene::ShaderPair;

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let (config, shaders) = match prepare() {
        Ok(prepared) => prepared,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    if let Some(frames) = config.headless_frames {
        return headless(config, shaders, frames);
    }

    let app = QuadApp::new(config.clone(), shaders);
    match Runtime::run(config.runtime_config(), config.init(), app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("quadview: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn prepare() -> Result<(AppConfig, ShaderPair)> {
    let config = AppConfig::from_env()?;
    log::debug!("config: {config:?}");

    let shaders = ShaderPair::load(&config.shader_dir)?;
    log::info!(
        "shaders: {} ({} bytes), {} ({} bytes)",
        shaders.vertex.name(),
        shaders.vertex.len(),
        shaders.fragment.name(),
        shaders.fragment.len()
    );

    Ok((config, shaders))
}

fn headless(config: AppConfig, shaders: ShaderPair, frames: u64) -> ExitCode {
    let mut backend = NoopBackend::new(config.resolution());
    let mut events = EventQueue::new();
    let mut app = QuadApp::new(config, shaders);

    match run_headless(&mut app, &mut events, &mut backend, Some(frames)) {
        Ok(run) => {
            log::info!(
                "headless run finished after {} frame(s), {} draw(s) rejected, {} resource(s) leaked",
                run.iterations,
                backend.rejected_draws(),
                run.leaked.total()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("headless run failed: {e:#}");
            ExitCode::from(1)
        }
    }
}
