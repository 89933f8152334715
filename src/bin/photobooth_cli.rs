//! PhotoBooth CLI - headless front end to the compositor
//!
//! Commands: check, compose, layouts, watch
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 success, 1 usage or I/O failure, 2 pipeline failure

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use photobooth_core::{
    preflight::Preflight, BackendKind, CompositionJob, ImageLibrary, LayoutStore,
    PipelineWorker, StudioConfig, TemplateLayout, WatchRegistry, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "photobooth-cli")]
#[command(about = "PhotoBooth CLI - Frame Compositor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the studio settings file
    #[arg(short, long, default_value = "photobooth.json")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Report backend availability, and job readiness when a payload is given
    Check {
        #[arg(short, long)]
        backend: Option<BackendKind>,

        /// JSON payload (CompositionJob)
        #[arg(short, long)]
        payload: Option<String>,
    },

    /// Composite a job and print the output record
    Compose {
        /// JSON payload (CompositionJob)
        #[arg(short, long)]
        payload: String,

        #[arg(short, long)]
        backend: Option<BackendKind>,
    },

    /// Manage saved layouts
    Layouts {
        #[command(subcommand)]
        action: LayoutAction,
    },

    /// Print new images in a directory as JSON lines until stdin has a line or closes
    Watch { dir: PathBuf },
}

#[derive(Subcommand)]
enum LayoutAction {
    List,
    Show {
        name: String,
    },
    Save {
        /// JSON payload (TemplateLayout)
        #[arg(short, long)]
        payload: String,
    },
    Delete {
        name: String,
    },
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("cannot render output: {e}"),
    }
}

fn fail(code: u8, message: impl std::fmt::Display) -> ExitCode {
    print_json(&serde_json::json!({ "success": false, "error": message.to_string() }));
    ExitCode::from(code)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = match StudioConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => return fail(1, e),
    };

    match cli.command {
        Commands::Check { backend, payload } => {
            if let Some(kind) = backend {
                config.backend = kind;
            }
            let backend = config.backend();
            let readiness = match payload {
                Some(payload) => match serde_json::from_str::<CompositionJob>(&payload) {
                    Ok(job) => Some(Preflight::new().report(&job, backend.as_ref())),
                    Err(e) => return fail(1, format!("Invalid payload: {e}")),
                },
                None => None,
            };
            let available = backend.is_available();
            print_json(&serde_json::json!({
                "engine": ENGINE_VERSION,
                "backend": backend.name(),
                "available": available,
                "job": readiness,
            }));
            let ready = readiness.as_ref().map_or(available, |r| r.ready);
            if ready { ExitCode::SUCCESS } else { ExitCode::from(2) }
        }

        Commands::Compose { payload, backend } => {
            if let Some(kind) = backend {
                config.backend = kind;
            }
            let job: CompositionJob = match serde_json::from_str(&payload) {
                Ok(j) => j,
                Err(e) => return fail(1, format!("Invalid payload: {e}")),
            };
            let job = match job.with_frame_dimensions() {
                Ok(j) => j,
                Err(e) => return fail(2, e),
            };
            let worker = match PipelineWorker::new(config.compositor(), config.worker_threads) {
                Ok(w) => w,
                Err(e) => return fail(1, e),
            };
            match worker.submit(job).wait() {
                Ok(output) => {
                    print_json(&serde_json::json!({ "success": true, "output": output }));
                    ExitCode::SUCCESS
                }
                Err(e) => fail(2, e),
            }
        }

        Commands::Layouts { action } => {
            let store = LayoutStore::new(&config.layouts_dir);
            let result = match action {
                LayoutAction::List => store
                    .load_all()
                    .map(|layouts| serde_json::json!({ "layouts": layouts })),
                LayoutAction::Show { name } => store
                    .get(&name)
                    .map(|layout| serde_json::json!({ "layout": layout })),
                LayoutAction::Save { payload } => {
                    let layout: TemplateLayout = match serde_json::from_str(&payload) {
                        Ok(l) => l,
                        Err(e) => return fail(1, format!("Invalid payload: {e}")),
                    };
                    store
                        .save(&layout)
                        .map(|path| serde_json::json!({ "saved": layout.name, "path": path }))
                }
                LayoutAction::Delete { name } => store
                    .delete(&name)
                    .map(|removed| serde_json::json!({ "deleted": name, "removed": removed })),
            };
            match result {
                Ok(value) => {
                    print_json(&value);
                    ExitCode::SUCCESS
                }
                Err(e) => fail(1, e),
            }
        }

        Commands::Watch { dir } => {
            let mut library = match ImageLibrary::scan_dir(&dir) {
                Ok(l) => l,
                Err(e) => return fail(1, format!("Cannot list {}: {e}", dir.display())),
            };
            print_json(&serde_json::json!({ "images": library.images() }));

            let (tx, rx) = mpsc::channel();
            let mut registry = WatchRegistry::new();
            if let Err(e) = registry.start(&dir, tx) {
                return fail(1, e);
            }

            let (quit_tx, quit_rx) = mpsc::channel::<()>();
            thread::spawn(move || {
                let mut line = String::new();
                let _ = std::io::stdin().lock().read_line(&mut line);
                let _ = quit_tx.send(());
            });

            loop {
                if quit_rx.try_recv() != Err(mpsc::TryRecvError::Empty) {
                    break;
                }
                match rx.recv_timeout(std::time::Duration::from_millis(200)) {
                    Ok(image) => {
                        if library.insert(image.path.clone()) {
                            match serde_json::to_string(&image) {
                                Ok(line) => println!("{line}"),
                                Err(e) => eprintln!("cannot render event: {e}"),
                            }
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }

            registry.stop_all();
            ExitCode::SUCCESS
        }
    }
}
