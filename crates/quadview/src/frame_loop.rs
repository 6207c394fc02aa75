//! Per-frame camera update and draw submission.

use anyhow::{Context, Result};
use glam::Vec3;

use quadview_engine::backend::{
    ClearFlags, RenderBackend, RenderState, ResetFlags, ShutdownReport, ViewClear, ViewId,
    ViewRect,
};
use quadview_engine::core::{App, AppControl, FrameCtx, Teardown};
use quadview_engine::event::{Event, EventSource};
use quadview_engine::math::{self, DepthRange};

use crate::config::AppConfig;
use crate::scene::{QuadScene, ShaderPair};

const VIEW: ViewId = 0;

const EYE: Vec3 = Vec3::new(0.0, 0.0, 10.0);
const AT: Vec3 = Vec3::ZERO;
const FOV_Y_DEG: f32 = 60.0;
const NEAR: f32 = 0.1;
const FAR: f32 = 100.0;

const MODEL_ROTATION_Y: f32 = 0.0;
const MODEL_TRANSLATION: Vec3 = Vec3::ZERO;

/// The demo application: owns the quad scene and the tracked backbuffer size.
pub struct QuadApp {
    config: AppConfig,
    shaders: ShaderPair,
    scene: Option<QuadScene>,

    width: u32,
    height: u32,
    reset: ResetFlags,
    quit: bool,
}

impl QuadApp {
    pub fn new(config: AppConfig, shaders: ShaderPair) -> Self {
        Self {
            width: config.width,
            height: config.height,
            reset: config.reset_flags(),
            config,
            shaders,
            scene: None,
            quit: false,
        }
    }

    fn drain_events(&mut self, events: &mut dyn EventSource, backend: &mut dyn RenderBackend) {
        while let Some(event) = events.poll_event() {
            match event {
                Event::Quit => {
                    log::info!("quit requested");
                    self.quit = true;
                }
                Event::Resized { width, height } => {
                    log::debug!("resized to {width}x{height}");
                    self.width = width;
                    self.height = height;
                    backend.reset(width, height, self.reset);
                }
            }
        }
    }

    /// One loop iteration: events, camera, submission, frame.
    pub fn iterate(
        &mut self,
        events: &mut dyn EventSource,
        backend: &mut dyn RenderBackend,
    ) -> Result<AppControl> {
        self.drain_events(events, backend);

        let scene = self
            .scene
            .as_ref()
            .context("frame loop ran before the scene was created")?;

        let view = math::look_at(EYE, AT);
        let depth = DepthRange::from_homogeneous(backend.caps().homogeneous_depth);
        let proj = math::perspective(
            FOV_Y_DEG,
            math::aspect_ratio(self.width, self.height),
            NEAR,
            FAR,
            depth,
        );

        backend.set_view_rect(VIEW, ViewRect::full(self.width, self.height));
        backend.set_view_transform(VIEW, view, proj);
        backend.touch(VIEW);

        backend.set_transform(math::model_matrix(MODEL_ROTATION_Y, MODEL_TRANSLATION));
        backend.set_vertex_buffer(0, scene.vertex_buffer);
        backend.set_index_buffer(scene.index_buffer);
        backend.set_state(RenderState::DEFAULT);
        backend.submit(VIEW, scene.program);

        let number = backend.frame().context("frame submission failed")?;
        log::trace!("frame {number}");

        if self.quit {
            Ok(AppControl::Exit)
        } else {
            Ok(AppControl::Continue)
        }
    }
}

impl App for QuadApp {
    fn init(&mut self, backend: &mut dyn RenderBackend) -> Result<()> {
        let resolution = backend.resolution();
        if !resolution.is_empty() {
            self.width = resolution.width;
            self.height = resolution.height;
        }

        let scene = QuadScene::create(backend, &self.shaders)?;
        self.scene = Some(scene);

        backend.reset(self.width, self.height, self.reset);
        backend.set_view_rect(VIEW, ViewRect::full(self.width, self.height));
        backend.set_view_clear(
            VIEW,
            ViewClear::new(ClearFlags::COLOR | ClearFlags::DEPTH, self.config.clear_rgba, 1.0, 0),
        );
        backend.touch(VIEW);

        log::info!(
            "quad scene ready at {}x{} on {}",
            self.width,
            self.height,
            backend.caps().adapter
        );
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
        self.iterate(ctx.events, ctx.backend)
    }

    fn shutdown(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(scene) = self.scene.take() {
            scene.release(backend);
        }
    }
}

/// Outcome of `run_headless`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessRun {
    pub iterations: u64,
    /// Resources the backend still held at shutdown.
    pub leaked: ShutdownReport,
}

/// Drives `app` without a window until it exits or `max_iterations` is reached.
///
/// Teardown (`App::shutdown`, then `RenderBackend::shutdown`) runs on every
/// path, including init and frame errors.
pub fn run_headless<A: App>(
    app: &mut A,
    events: &mut dyn EventSource,
    backend: &mut dyn RenderBackend,
    max_iterations: Option<u64>,
) -> Result<HeadlessRun> {
    let result = drive(app, events, backend, max_iterations);
    let leaked = Teardown::default().run(app, backend).unwrap_or_default();

    Ok(HeadlessRun {
        iterations: result?,
        leaked,
    })
}

fn drive<A: App>(
    app: &mut A,
    events: &mut dyn EventSource,
    backend: &mut dyn RenderBackend,
    max_iterations: Option<u64>,
) -> Result<u64> {
    app.init(backend)?;

    let mut iterations = 0u64;
    while max_iterations.is_none_or(|max| iterations < max) {
        iterations += 1;
        let mut ctx = FrameCtx::new(&mut *events, &mut *backend);
        if app.on_frame(&mut ctx)? == AppControl::Exit {
            break;
        }
    }
    Ok(iterations)
}
