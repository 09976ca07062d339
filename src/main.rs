use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;

use uctp_studio::routes::{self, AppState};
use uctp_studio::Config;

// ---------- Server bootstrap ----------
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env();
    let client = config
        .solver_client()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    info!(
        "Starting server on http://127.0.0.1:{} (solver at {}, validation {:?})",
        config.port,
        client.base_url(),
        config.validation_policy
    );

    let state = web::Data::new(AppState::new(
        config.problem.clone(),
        config.validation_policy,
        client,
    ));
    let json_limit = config.json_limit;

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(routes::json_config(json_limit))
            .configure(routes::configure)
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await
}
