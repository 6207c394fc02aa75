use anyhow::Context;
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::backend::{RenderBackend, WgpuBackend};
use crate::core::{App, AppControl, FrameCtx, Teardown};
use crate::device::Init;
use crate::error::RuntimeError;
use crate::event::{Event, EventQueue};
use crate::platform::NativeHandleProvider;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: PhysicalSize<u32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "quadview".to_string(),
            initial_size: PhysicalSize::new(640, 480),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window and drives `app` until it exits or the window closes.
    ///
    /// Failures raised inside winit callbacks are kept and returned once the
    /// event loop has returned.
    pub fn run<A>(config: RuntimeConfig, init: Init, app: A) -> Result<(), RuntimeError>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new()
            .context("failed to create winit EventLoop")
            .map_err(RuntimeError::EventLoop)?;

        let mut state = RuntimeState::new(config, init, app);

        let result = event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error");

        state.teardown();

        if let Some(failure) = state.failure.take() {
            return Err(failure);
        }
        result.map_err(RuntimeError::EventLoop)
    }
}

#[self_referencing]
struct WindowEntry {
    events: EventQueue,

    window: Window,

    #[borrows(window)]
    #[covariant]
    backend: WgpuBackend<'this>,
}

struct RuntimeState<A>
where
    A: App + 'static,
{
    config: RuntimeConfig,
    init: Init,
    app: A,

    entry: Option<WindowEntry>,
    started: bool,
    shutdown: Teardown,
    failure: Option<RuntimeError>,
}

impl<A> RuntimeState<A>
where
    A: App + 'static,
{
    fn new(config: RuntimeConfig, init: Init, app: A) -> Self {
        Self {
            config,
            init,
            app,
            entry: None,
            started: false,
            shutdown: Teardown::default(),
            failure: None,
        }
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<(), RuntimeError> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")
            .map_err(RuntimeError::Startup)?;

        let handle = window.native_handle()?;
        log::info!("native window handle: {}", handle.family());

        let init = self.init.clone();
        let entry = WindowEntryTryBuilder {
            events: EventQueue::new(),
            window,
            backend_builder: |w| WgpuBackend::new(w, init),
        }
        .try_build()
        .context("failed to initialize the GPU backend")
        .map_err(RuntimeError::Startup)?;

        self.entry = Some(entry);
        Ok(())
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), RuntimeError> {
        self.create_window_entry(event_loop)?;

        let (app, entry) = (&mut self.app, &mut self.entry);
        let Some(entry) = entry.as_mut() else {
            return Ok(());
        };

        entry
            .with_backend_mut(|backend| app.init(backend))
            .context("application init failed")
            .map_err(RuntimeError::Startup)?;

        entry.with_window(|w| w.request_redraw());
        Ok(())
    }

    /// Runs the shared teardown, then drops the window. Once.
    fn teardown(&mut self) {
        if self.shutdown.is_done() {
            return;
        }

        let Some(mut entry) = self.entry.take() else {
            self.shutdown.abandon();
            return;
        };

        let (app, shutdown) = (&mut self.app, &mut self.shutdown);
        entry.with_backend_mut(|backend| shutdown.run(app, backend));

        drop(entry);
        log::debug!("window closed");
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: RuntimeError) {
        log::error!("{err}");
        if self.failure.is_none() {
            self.failure = Some(err);
        }
        self.teardown();
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let (app, entry) = (&mut self.app, &mut self.entry);
        let Some(entry) = entry.as_mut() else { return };

        let control = entry.with_mut(|fields| {
            let mut ctx = FrameCtx::new(fields.events, fields.backend);
            app.on_frame(&mut ctx)
        });

        match control {
            Ok(AppControl::Continue) => {}
            Ok(AppControl::Exit) => {
                self.teardown();
                event_loop.exit();
            }
            Err(e) => self.fail(event_loop, RuntimeError::Frame(e)),
        }
    }
}

impl<A> ApplicationHandler for RuntimeState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.shutdown.is_done() {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw.
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.shutdown.is_done() {
            event_loop.exit();
            return;
        }

        match event {
            // The frame loop sees the quit on its next iteration and exits after it.
            WindowEvent::CloseRequested => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_events_mut(|events| events.push(Event::Quit));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::Resized(size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.with_events_mut(|events| {
                        events.push(Event::Resized {
                            width: size.width,
                            height: size.height,
                        })
                    });
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => self.redraw(event_loop),

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.teardown();
    }
}
