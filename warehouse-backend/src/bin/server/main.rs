use warehouse_backend::error::AppError;
use warehouse_backend::run_server;
use warehouse_config::get_config;
use warehouse_telemetry::setup_telemetry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // avoid putting more code here as this is outside of all spans so doesn't get traced
    setup_telemetry();

    let config = get_config()?;
    run_server(config).await
}
