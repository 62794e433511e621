pub mod core;
pub mod models;
pub mod platform;

use clap::Parser;
use crate::core::camera_controller::CameraController;
use crate::core::config::Config;
use crate::core::ml_models::{movenet, ModelManager};
use crate::core::model_loader::ModelLoader;
use crate::core::surface::{ChannelNavigator, ConsoleSurface, StatusSurface};
use crate::core::validation_loop::{LoopSettings, ValidationLoop};
use crate::models::pose::PoseModelConfig;
use crate::platform::camera::DefaultCamera;
use crate::platform::pose::DefaultPoseModel;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command line flags; each one overrides the matching config field
#[derive(Debug, Default, Parser)]
#[command(
    name = "posture-gate",
    version,
    about = "Checks your posture through the webcam before letting you into the home page"
)]
pub struct Args {
    /// Config file to use instead of ~/.posture_gate/config/settings.json
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Index of the webcam to open
    #[arg(long)]
    pub camera_index: Option<u32>,

    /// Local ONNX pose model
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Destination to navigate to once sitting properly
    #[arg(long)]
    pub home: Option<String>,

    /// Turn the camera on right away
    #[arg(long)]
    pub start_camera: bool,

    /// Write the effective settings (file plus flags) back to the config file
    #[arg(long)]
    pub save_config: bool,
}

impl Args {
    pub fn apply(&self, config: &mut Config) {
        if let Some(index) = self.camera_index {
            config.camera_index = index;
        }
        if let Some(model) = &self.model {
            config.model_path = Some(model.clone());
        }
        if let Some(home) = &self.home {
            config.home_destination = home.clone();
        }
    }
}

/// Terminal commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle,
    Status,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "" | "t" | "toggle" => Command::Toggle,
            "s" | "status" => Command::Status,
            "q" | "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Install the fmt subscriber once; `RUST_LOG` wins over the default level
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

// Application state
pub struct AppState {
    pub config: Config,
    pub loader: ModelLoader,
    pub camera: CameraController,
    pub surface: Arc<ConsoleSurface>,
    pub validation: ValidationLoop,
}

impl AppState {
    /// Start loading the model and the validation loop; the camera stays off
    pub fn start(config: Config, navigator: ChannelNavigator) -> Result<Self, Box<dyn std::error::Error>> {
        let manager = ModelManager::new(config.model_cache_dir.clone())?;
        let info = movenet::from_settings(config.model_path.as_deref(), config.model_url.as_deref());
        let loader = ModelLoader::spawn::<DefaultPoseModel>(
            info,
            manager,
            PoseModelConfig::default().input_size,
        );
        let camera = CameraController::new(Arc::new(DefaultCamera::new()), config.camera_index);
        let surface = Arc::new(ConsoleSurface::new(config.show_failures));

        let validation = ValidationLoop::spawn(
            LoopSettings::from(&config),
            loader.clone(),
            camera.feed(),
            surface.clone(),
            Arc::new(navigator),
        );
        surface.set_camera_label(camera.label());

        Ok(Self {
            config,
            loader,
            camera,
            surface,
            validation,
        })
    }

    /// Flip the camera. Acquisition failures leave it off and are only logged.
    pub async fn toggle_camera(&mut self) {
        if let Err(e) = self.camera.toggle().await {
            tracing::warn!(error = %e, "camera toggle failed");
        }
        self.surface.set_camera_label(self.camera.label());
    }

    pub fn print_status(&self) {
        println!(
            "{} (model: {:?}, camera: {:?})",
            self.validation.status().describe(),
            self.loader.state(),
            self.camera.state()
        );
    }

    /// Stop the loop first so nothing writes while the camera goes away
    pub async fn teardown(mut self) {
        self.validation.shutdown().await;
        if let Err(e) = self.camera.turn_off().await {
            tracing::warn!(error = %e, "failed to release camera");
        }
    }
}

/// Blocking stdin reader on its own thread, so shutdown never waits on a read
fn spawn_command_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to start command reader");
    }
    rx
}

async fn run_app(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    args.apply(&mut config);
    config.validate()?;
    tracing::debug!(?config, "configuration loaded");

    if args.save_config {
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        tracing::info!("configuration saved");
    }

    let (navigator, mut navigations) = ChannelNavigator::new();
    let mut app = AppState::start(config, navigator)?;
    if args.start_camera {
        app.toggle_camera().await;
    }

    let mut commands = spawn_command_reader();
    let destination = loop {
        tokio::select! {
            destination = navigations.recv() => break destination,
            line = commands.recv() => match line.as_deref().map(Command::parse) {
                Some(Command::Toggle) => app.toggle_camera().await,
                Some(Command::Status) => app.print_status(),
                Some(Command::Quit) | None => break None,
                Some(Command::Unknown(other)) => {
                    println!("Unknown command '{}' (t = toggle, s = status, q = quit)", other)
                }
            },
        }
    };

    // Pending navigations fail fast instead of waiting on a full channel
    drop(navigations);
    app.teardown().await;
    if let Some(destination) = destination {
        println!("Navigating to {}", destination);
    }
    Ok(())
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_app(args))
}
