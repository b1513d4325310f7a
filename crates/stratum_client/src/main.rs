use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stratum_client::app::App;
use stratum_client::settings::{load_or_create_settings, DEFAULT_SETTINGS_PATH};

fn main() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();

    let mut settings_path = PathBuf::from(DEFAULT_SETTINGS_PATH);

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let Some(value) = args.next() else {
                    eprintln!("--settings expects a path argument");
                    std::process::exit(2);
                };
                settings_path = PathBuf::from(value);
            }
            "--help" | "-h" => {
                println!("Usage: stratum [--settings <path>]");
                return;
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
    }

    let settings = load_or_create_settings(&settings_path);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nShutdown signal received, stopping...");
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("failed to set Ctrl+C handler: {err}");
        std::process::exit(1);
    }

    let app = match App::new(settings) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("failed to start worker pool: {err}");
            std::process::exit(1);
        }
    };
    app.run(&running);
}
