use dotenvy::dotenv;
use log::info;
use sync_worker::{config::WorkerConfig, worker::run_worker};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = WorkerConfig::from_env_or_default();

    info!("🚀️ Starting panel sync worker against {}", config.database_url);
    match run_worker(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
