//! Pong
//!
//! W/S move the left paddle, the arrow keys the right one. Escape quits.

mod assets;
mod game;

use std::time::Instant;

use glfw::{Action, Key, WindowEvent};
use pong_renderer::foundation::logging;
use pong_renderer::prelude::*;

use assets::PongAssets;
use game::{Input, Pong, Side};

const CONFIG_PATH: &str = "pong.toml";
const SPRITE_DIR: &str = "resources/sprites";

// Longest step the simulation takes, so a stalled frame does not tunnel the ball
const MAX_FRAME_SECONDS: f32 = 1.0 / 30.0;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Renderer error: {0}")]
    Render(#[from] RenderError),

    #[error("Frame failed, see the log above")]
    Frame,
}

fn read_input(window: &Window) -> Input {
    Input {
        left_up: window.is_key_down(Key::W),
        left_down: window.is_key_down(Key::S),
        right_up: window.is_key_down(Key::Up),
        right_down: window.is_key_down(Key::Down),
    }
}

fn run() -> Result<(), AppError> {
    let config = RendererConfig::load_or_default(CONFIG_PATH)?;

    log::info!("Creating {}x{} window...", config.window.width, config.window.height);
    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;

    let assets = Box::new(PongAssets::new(SPRITE_DIR));
    let mut renderer = SpriteRenderer::new(&window, &config, assets, &SpirvFileSource)?;

    let (width, height) = renderer.extent();
    let mut game = Pong::new(width as f32, height as f32);
    let mut last_frame = Instant::now();

    while !window.should_close() {
        window.poll_events();

        let events: Vec<_> = window.flush_events().collect();
        for (_, event) in events {
            if let WindowEvent::Key(Key::Escape, _, Action::Press, _) = event {
                window.set_should_close(true);
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32().min(MAX_FRAME_SECONDS);
        last_frame = now;

        game.update(&read_input(&window), dt);

        let labels = game.labels(renderer.text_style());
        if !renderer.render(&game.entities(), game.materials(), &labels) {
            return Err(AppError::Frame);
        }
    }

    log::info!("Final score {} : {}", game.score(Side::Left), game.score(Side::Right));
    log::info!(
        "Closing after {} textures and {} descriptor sets",
        renderer.image_count(),
        renderer.descriptor_count()
    );
    renderer.wait_idle()?;
    Ok(())
}

fn main() {
    logging::init();
    log::info!("Starting Pong");

    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }

    log::info!("Pong finished");
}
