use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::errors::EcoDriveError;

use super::{ProviderRoute, RouteRequest, RoutingProvider};

pub const DEFAULT_OSRM_URL: &str = "https://router.project-osrm.org/";
const REQUEST_TIMEOUT_S: u64 = 30;

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// meters
    distance: f64,
    /// seconds
    duration: f64,
    geometry: String,
}

/// Routing provider backed by an OSRM server's `route` service.
///
/// Paths are requested as full-overview encoded polylines without turn-by-turn steps.
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new(base_url: &str) -> Result<Self, EcoDriveError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_S))
            .user_agent(concat!("ecodrive/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EcoDriveError::RoutingUnavailable {
                cause: format!("could not build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// OSRM takes coordinates as `lng,lat` pairs separated by `;`.
    fn route_url(&self, request: &RouteRequest) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?alternatives={}&steps=false&geometries=polyline&overview=full",
            self.base_url,
            request.origin.longitude,
            request.origin.latitude,
            request.destination.longitude,
            request.destination.latitude,
            request.alternatives
        )
    }
}

fn parse_response(body: &str) -> Result<Vec<ProviderRoute>, EcoDriveError> {
    let response: OsrmResponse =
        serde_json::from_str(body).map_err(|e| EcoDriveError::RoutingUnavailable {
            cause: format!("invalid OSRM response: {}", e),
        })?;

    if response.code != "Ok" {
        return Err(EcoDriveError::RoutingUnavailable {
            cause: format!(
                "OSRM returned {}: {}",
                response.code,
                response.message.unwrap_or_default()
            ),
        });
    }

    let routes = response.routes.unwrap_or_default();
    if routes.is_empty() {
        return Err(EcoDriveError::RoutingUnavailable {
            cause: "No routes found".to_string(),
        });
    }

    Ok(routes
        .into_iter()
        .map(|r| ProviderRoute::new(r.distance, r.duration, r.geometry))
        .collect())
}

impl RoutingProvider for OsrmClient {
    fn routes(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Vec<ProviderRoute>, EcoDriveError>> + Send {
        let url = self.route_url(request);
        let client = self.client.clone();
        async move {
            debug!("Requesting routes: {}", url);
            let response = client.get(&url).send().await.map_err(|e| {
                warn!("OSRM request failed: {}", e);
                EcoDriveError::RoutingUnavailable {
                    cause: format!("OSRM request failed: {}", e),
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(EcoDriveError::RoutingUnavailable {
                    cause: format!("OSRM API error: {}", status.as_u16()),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| EcoDriveError::RoutingUnavailable {
                    cause: format!("could not read OSRM response: {}", e),
                })?;
            parse_response(&body)
        }
    }
}
