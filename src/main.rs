use blogcms::{run_app, telemetry::init_telemetry, AppConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            std::process::exit(1);
        }
    };
    init_telemetry(config.json_logs);
    if let Err(error) = run_app(config).await {
        tracing::error!("Server stopped: {:#}", error);
        std::process::exit(1);
    }
}
