use moch_resolver::configuration::UserConfiguration;
use moch_resolver::{CatalogEntry, ItemMetadata, MochResolver, ResolutionError};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;

use super::client::ClientInfo;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub err: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub meta: ItemMetadata,
}

type ApiResult<T> = Result<Json<T>, (Status, Json<ErrorBody>)>;

/// "feature unavailable" is 404, anything else is 500
fn error_response(error: ResolutionError) -> (Status, Json<ErrorBody>) {
    log::warn!("Catalog request failed: {}", error);
    if error.is_no_handler() {
        (Status::NotFound, Json(ErrorBody { err: "not found" }))
    } else {
        (Status::InternalServerError, Json(ErrorBody { err: "handler error" }))
    }
}

/// Strip the `.json` suffix of the last path segment
fn strip_json(segment: &str) -> &str {
    segment.strip_suffix(".json").unwrap_or(segment)
}

/// Merge the path extras (`skip=20`) and the client address into the user
/// configuration, the way the catalog query sees them.
fn request_configuration(
    configuration: &str,
    extra: Option<&str>,
    id: &str,
    client: &ClientInfo,
) -> UserConfiguration {
    let mut config = UserConfiguration::parse(configuration);
    if let Some(extra) = extra {
        for (key, value) in strip_json(extra)
            .split('&')
            .filter_map(|pair| pair.split_once('='))
        {
            config.insert(key, value);
        }
    }
    config.insert("id", id);
    config.insert("ip", client.ip.clone());
    config
}

async fn catalog_response(
    resolver: &MochResolver,
    moch: &str,
    config: UserConfiguration,
) -> ApiResult<CatalogResponse> {
    resolver
        .list_catalog(moch, &config)
        .await
        .map(|metas| Json(CatalogResponse { metas }))
        .map_err(error_response)
}

#[get("/<configuration>/catalog/<_kind>/<id>")]
pub async fn catalog(
    configuration: &str,
    _kind: &str,
    id: &str,
    client: ClientInfo,
    resolver: &State<MochResolver>,
) -> ApiResult<CatalogResponse> {
    let moch = strip_json(id);
    let config = request_configuration(configuration, None, moch, &client);
    catalog_response(resolver, moch, config).await
}

#[get("/<configuration>/catalog/<_kind>/<id>/<extra>")]
pub async fn catalog_with_extra(
    configuration: &str,
    _kind: &str,
    id: &str,
    extra: &str,
    client: ClientInfo,
    resolver: &State<MochResolver>,
) -> ApiResult<CatalogResponse> {
    let moch = strip_json(id);
    let config = request_configuration(configuration, Some(extra), moch, &client);
    catalog_response(resolver, moch, config).await
}

/// Meta ids look like `<moch>:<item id>`
#[get("/<configuration>/meta/<_kind>/<id>")]
pub async fn meta(
    configuration: &str,
    _kind: &str,
    id: &str,
    client: ClientInfo,
    resolver: &State<MochResolver>,
) -> ApiResult<MetaResponse> {
    let id = strip_json(id);
    let moch = id.split(':').next().unwrap_or(id);
    let config = request_configuration(configuration, None, id, &client);

    resolver
        .list_item_metadata(moch, &config)
        .await
        .map(|meta| Json(MetaResponse { meta }))
        .map_err(error_response)
}
