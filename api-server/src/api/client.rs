use lazy_static::lazy_static;
use regex::Regex;
use rocket::request::{FromRequest, Outcome, Request};
use std::convert::Infallible;

lazy_static! {
    static ref BROWSER_AGENT: Regex =
        Regex::new(r"(Firefox|Chrome|Chromium|Safari|Edg|OPR|Opera|SamsungBrowser)/\d").unwrap();
}

/// Who is asking: address, public host and whether it is a web browser.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub host: String,
    pub is_browser: bool,
}

/// Stremio apps embed a browser engine, so their user agent is excluded.
pub fn is_browser(user_agent: &str) -> bool {
    !user_agent.contains("Stremio") && BROWSER_AGENT.is_match(user_agent)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientInfo {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_default();
        let host = request
            .host()
            .map(|host| format!("http://{}", host))
            .unwrap_or_default();
        let user_agent = request.headers().get_one("User-Agent").unwrap_or_default();

        Outcome::Success(ClientInfo {
            ip,
            host,
            is_browser: is_browser(user_agent),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_detection() {
        assert!(is_browser(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        ));
        assert!(is_browser(
            "Mozilla/5.0 (Windows NT 10.0; rv:121.0) Gecko/20100101 Firefox/121.0"
        ));
        assert!(!is_browser(
            "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko) StremioShell/4.4 Chrome/83.0 Safari/537.36"
        ));
        assert!(!is_browser("VLC/3.0.18 LibVLC/3.0.18"));
        assert!(!is_browser(""));
    }
}
