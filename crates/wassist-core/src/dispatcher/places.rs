use super::Dispatcher;
use crate::replies::{self, Service};

/// Locations the extractor uses to mean "not given".
fn is_missing_location(location: &str) -> bool {
    matches!(
        location.trim().to_lowercase().as_str(),
        "" | "null" | "none"
    )
}

impl Dispatcher {
    /// Searches now when a location is known, otherwise asks for one and
    /// remembers the query.
    pub(super) async fn find_place(
        &self,
        sender: &str,
        query: Option<String>,
        location: Option<String>,
    ) -> String {
        let Some(query) = query else {
            return replies::PLACE_QUERY_MISSING.to_string();
        };
        match location.filter(|l| !is_missing_location(l)) {
            Some(location) => self.search_places(&query, Some(&location)).await,
            None => {
                tracing::info!(sender = %sender, query = %query, "asking for place search area");
                self.state.set_pending_place(sender, query).await;
                replies::ASK_PLACE_LOCATION.to_string()
            }
        }
    }

    pub(super) async fn search_places(&self, query: &str, location: Option<&str>) -> String {
        match self
            .bounded("place search", self.connectors.places.search(query, location))
            .await
        {
            Ok(found) => replies::places_found(&found),
            Err(err) => {
                tracing::warn!(query = %query, error = %err, "place search failed");
                replies::connector_failure("search for places", Service::Places, &err)
            }
        }
    }

    pub(super) async fn describe_place(&self, query: Option<String>) -> String {
        let Some(query) = query else {
            return replies::PLACE_QUERY_MISSING.to_string();
        };
        match self
            .bounded("place details", self.connectors.places.details(&query))
            .await
        {
            Ok(Some(details)) => replies::place_details(&details),
            Ok(None) => replies::NO_PLACES.to_string(),
            Err(err) => replies::connector_failure("look up that place", Service::Places, &err),
        }
    }
}
