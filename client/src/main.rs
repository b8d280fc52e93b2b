use clap::Parser;
use client::game::{ClientGameState, ConnectionStatus};
use client::input::InputManager;
use client::interpolation::Easing;
use client::network;
use client::rendering::{Renderer, UiConfig};
use log::{error, info};
use macroquad::prelude::*;
use shared::ClientMessage;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, env = "SERVER", default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "1024")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "768")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Tag Arena".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to {} as {}", args.server, args.name);
    info!("Controls: WASD/arrows or drag to move, E to switch easing, G for network graph");

    let connection = match network::connect(&args.server, &args.name) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to start network: {}", e);
            return;
        }
    };

    let mut renderer = match Renderer::new(args.width, args.height) {
        Ok(renderer) => renderer,
        Err(e) => {
            error!("Failed to create renderer: {}", e);
            return;
        }
    };

    let started = Instant::now();
    let mut state = ClientGameState::new();
    let mut input_manager = InputManager::new();
    let mut show_graph = false;

    loop {
        let now = started.elapsed().as_secs_f64() * 1000.0;

        for message in connection.drain() {
            state.apply_server_message(message, now);
        }
        state.prune(now);

        let ((toggle_easing, toggle_graph), input) = input_manager.update();
        if toggle_easing {
            let easing = match state.engine().easing() {
                Easing::Linear => Easing::Smoothstep,
                Easing::Smoothstep => Easing::Linear,
            };
            state.engine_mut().set_easing(easing);
            info!("Easing: {:?}", easing);
        }
        if toggle_graph {
            show_graph = !show_graph;
        }

        if let (ConnectionStatus::Joined(_), Some(input_state)) = (state.status(), input) {
            connection.send(ClientMessage::PlayerInput { input_state });
        }

        if is_key_pressed(KeyCode::Escape) {
            connection.send(ClientMessage::PlayerLeave);
            break;
        }

        renderer.resize(screen_width(), screen_height());
        let entities = state.render_entities(now);
        renderer.render(
            &state,
            &entities,
            now,
            UiConfig {
                easing: state.engine().easing(),
                show_graph,
                fps: get_fps(),
            },
        );

        next_frame().await;
    }
}
