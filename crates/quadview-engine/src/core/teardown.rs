use crate::backend::{RenderBackend, ShutdownReport};

use super::app::App;

/// Shutdown sequence shared by every driver: `App::shutdown`, then
/// `RenderBackend::shutdown`. Runs at most once.
#[derive(Debug, Default)]
pub struct Teardown {
    done: bool,
}

impl Teardown {
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Shuts down `app` and `backend`. Returns `None` once already done.
    pub fn run<A>(&mut self, app: &mut A, backend: &mut dyn RenderBackend) -> Option<ShutdownReport>
    where
        A: App + ?Sized,
    {
        if self.done {
            return None;
        }
        self.done = true;

        app.shutdown(backend);
        let report = backend.shutdown();

        if !report.is_clean() {
            log::warn!(
                "{} resource(s) still alive at shutdown: {} shader(s), {} program(s), {} vertex buffer(s), {} index buffer(s)",
                report.total(),
                report.shaders,
                report.programs,
                report.vertex_buffers,
                report.index_buffers
            );
        }
        Some(report)
    }

    /// Marks teardown done when no backend was ever created, so the app
    /// was never initialized and holds nothing to release.
    pub fn abandon(&mut self) {
        if !self.done {
            log::debug!("teardown without a backend; nothing to release");
        }
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    use crate::backend::{NoopBackend, ResetFlags, Resolution};
    use crate::core::{AppControl, FrameCtx};

    #[derive(Default)]
    struct Counting {
        shutdowns: usize,
    }

    impl App for Counting {
        fn init(&mut self, _backend: &mut dyn RenderBackend) -> Result<()> {
            Ok(())
        }

        fn on_frame(&mut self, _ctx: &mut FrameCtx<'_>) -> Result<AppControl> {
            Ok(AppControl::Exit)
        }

        fn shutdown(&mut self, _backend: &mut dyn RenderBackend) {
            self.shutdowns += 1;
        }
    }

    fn backend() -> NoopBackend {
        NoopBackend::new(Resolution::new(640, 480, ResetFlags::VSYNC))
    }

    #[test]
    fn runs_app_then_backend_exactly_once() {
        let mut app = Counting::default();
        let mut b = backend();
        let mut teardown = Teardown::default();

        assert!(teardown.run(&mut app, &mut b).is_some_and(|r| r.is_clean()));
        assert!(teardown.run(&mut app, &mut b).is_none());

        assert_eq!(app.shutdowns, 1);
        assert!(b.is_shut_down());
        assert!(teardown.is_done());
    }

    #[test]
    fn reports_resources_the_app_left_behind() {
        let mut app = Counting::default();
        let mut b = backend();
        b.create_index_buffer(&[0, 1, 2]).unwrap();

        let report = Teardown::default().run(&mut app, &mut b).unwrap();
        assert_eq!(report.index_buffers, 1);
        assert_eq!(report.total(), 1);
    }

    #[test]
    fn abandoned_teardown_never_runs() {
        let mut app = Counting::default();
        let mut b = backend();
        let mut teardown = Teardown::default();

        teardown.abandon();
        assert!(teardown.run(&mut app, &mut b).is_none());
        assert_eq!(app.shutdowns, 0);
        assert!(!b.is_shut_down());
    }
}
