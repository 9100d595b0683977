#[macro_use]
extern crate rocket;

mod api;
mod config;

use config::ServerConfig;
use log::info;
use moch_resolver::{MochResolver, ProviderRegistry};
use simplelog::{ColorChoice, TermLogger, TerminalMode};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;
    TermLogger::init(
        config.level_filter(),
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    // Provider implementations register here; this build ships none
    let registry = ProviderRegistry::empty();
    if registry.is_empty() {
        info!("No MOCH providers configured, every resolve will answer 404");
    }

    let resolver = MochResolver::new(registry, config.resolver_config()?);
    info!("Starting server on {}:{}", config.address, config.port);

    api::build_rocket(resolver.clone(), config.rocket_figment())
        .launch()
        .await?;

    resolver.shutdown();
    Ok(())
}
