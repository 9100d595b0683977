use super::client::ClientInfo;
use moch_resolver::{MochResolver, ResolutionRequest};
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::State;

/// Redirect to the playable URL, or answer 404 on any failure.
#[get("/resolve/<moch>/<api_key>/<info_hash>/<cached_entry_info>/<file_index>/<_filename>")]
pub async fn resolve(
    moch: &str,
    api_key: &str,
    info_hash: &str,
    cached_entry_info: &str,
    file_index: &str,
    _filename: &str,
    client: ClientInfo,
    resolver: &State<MochResolver>,
) -> Result<Redirect, Status> {
    let file_index = file_index.parse().unwrap_or(0);
    let request = ResolutionRequest::new(moch, api_key, info_hash, Some(file_index))
        .with_cached_entry_info(cached_entry_info)
        .with_client(client.ip, client.host)
        .with_browser(client.is_browser);

    match resolver.resolve(request).await {
        Ok(url) => Ok(Redirect::found(url)),
        Err(error) => {
            log::warn!("Failed to resolve {} via {}: {}", info_hash, moch, error);
            Err(Status::NotFound)
        }
    }
}
