use std::{env, error::Error};

use log::info;
use orchestrator::{configs::Config, train};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: orchestrator <config.json>")?;

    let config = Config::from_file(&path)?;
    let history = train(config)?;

    info!(
        augmentations = history.augmentations,
        samples = history.dataset_size,
        best_score = history.best_score;
        "training finished"
    );

    match history.best_checkpoint {
        Some(path) => println!("best checkpoint: {}", path.display()),
        None => println!("no checkpoint improved on the uncorrected baseline"),
    }

    Ok(())
}
