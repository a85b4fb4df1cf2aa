use std::path::PathBuf;

use simscene::SimsceneApp;

const DEFAULT_SCENE: &str = "demos/falling_cubes/scene.ron";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scene = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENE));
    log::info!("Starting simscene with '{}'", scene.display());

    let result = SimsceneApp::new(scene).and_then(SimsceneApp::run);
    match result {
        Ok(()) => log::info!("simscene finished"),
        Err(err) => {
            log::error!("Application error: {err:#}");
            std::process::exit(1);
        }
    }
}
