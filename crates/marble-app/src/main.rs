use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use marble_core::{Seed, SeededRandom};
use marble_gpu::RenderResult;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

mod app;
mod config;
mod logging;
mod source;

use app::App;
use config::{AppConfig, Command, USAGE};
use logging::{init_logging, LoggingConfig};

// ---------------------------------------------------------------------------
// Handler — winit ApplicationHandler, renders once on the first resume
// ---------------------------------------------------------------------------

struct Handler {
    config: AppConfig,
    rng: SeededRandom,
    // Dropped before the window so GPU resources go first.
    app: Option<App>,
    window: Option<Arc<Window>>,
    started: bool,
    /// Set when setup fails fatally; the process exits non-zero.
    failure: Option<anyhow::Error>,
}

impl Handler {
    fn new(config: AppConfig, rng: SeededRandom) -> Self {
        Self {
            config,
            rng,
            app: None,
            window: None,
            started: false,
            failure: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title(format!("Marble ({})", self.rng.seed()))
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.width,
                self.config.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("failed to create window")?,
        );
        log::info!("Window created ({}×{})", self.config.width, self.config.height);
        self.window = Some(Arc::clone(&window));

        if let Some(app) = settle(App::render(window, &self.config, &mut self.rng))? {
            log::debug!("pipeline finished at {:?}", app.stage());
            self.app = Some(app);
        }
        Ok(())
    }
}

/// Sort a render attempt into drawn, skipped, or failed. A missing GPU
/// context leaves the empty window up; anything else ends the run.
fn settle<T>(result: RenderResult<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(drawn) => Ok(Some(drawn)),
        Err(e) if !e.is_fatal() => {
            log::warn!("{e}; nothing will be drawn");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

impl ApplicationHandler for Handler {
    /// Resume can fire more than once; only the first one renders.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.started {
            return;
        }
        self.started = true;

        if let Err(e) = self.start(event_loop) {
            log::error!("{e:#}");
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::KeyQ | KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                log::info!("Q/Escape pressed, exiting");
                event_loop.exit();
            }

            // The frame is drawn once; resizes and redraws do not re-render.
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<ExitCode> {
    let config = match AppConfig::from_env()? {
        Command::Help => {
            print!("{USAGE}");
            return Ok(ExitCode::SUCCESS);
        }
        Command::Run(config) => config,
    };

    init_logging(LoggingConfig {
        filter: config.log_filter.clone(),
        ..LoggingConfig::default()
    });

    let seed = Seed::from_input(config.seed.as_deref());
    log::info!("Seed: {seed}");
    let rng = SeededRandom::new(seed);

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut handler = Handler::new(config, rng);
    event_loop.run_app(&mut handler).context("event loop error")?;

    // Failures were logged where they happened.
    Ok(match handler.failure {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    })
}
