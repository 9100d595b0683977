mod catalog;
mod client;
mod resolve;
mod stats;

use moch_resolver::MochResolver;
use rocket::figment::Figment;
use rocket::{Build, Rocket};

pub fn build_rocket(resolver: MochResolver, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment).manage(resolver).mount(
        "/",
        routes![
            resolve::resolve,
            catalog::catalog,
            catalog::catalog_with_extra,
            catalog::meta,
            stats::stats,
            stats::health,
        ],
    )
}
