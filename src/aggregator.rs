//! Plan aggregation
//!
//! Weather, routing and ticketing are queried concurrently. Weather and
//! ticketing degrade to defaults on failure; routing is mandatory.

use crate::error::PlannerError;
use crate::models::{PlanQuery, TravelPlan, WeatherDay};
use crate::providers::{ProviderError, RouteProvider, TicketProvider, WeatherProvider};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

static MAP_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"map\[.*?name:([^\]\s]+).*?\]").expect("instruction pattern is valid")
});

/// Replace serialized map literals such as `map[id:1 name:人民广场]` by their name
#[must_use]
pub fn clean_instruction(instruction: &str) -> String {
    MAP_LITERAL.replace_all(instruction, "$1").into_owned()
}

/// Builds travel plans from the three plan providers
#[derive(Clone)]
pub struct PlanAggregator {
    weather: Arc<dyn WeatherProvider>,
    routes: Arc<dyn RouteProvider>,
    tickets: Arc<dyn TicketProvider>,
}

impl PlanAggregator {
    #[must_use]
    pub fn new(
        weather: Arc<dyn WeatherProvider>,
        routes: Arc<dyn RouteProvider>,
        tickets: Arc<dyn TicketProvider>,
    ) -> Self {
        Self {
            weather,
            routes,
            tickets,
        }
    }

    /// Build a plan, substituting defaults for weather and tickets when unavailable
    #[instrument(skip(self, query, cancel), fields(origin = %query.origin, destination = %query.destination))]
    pub async fn build(
        &self,
        query: &PlanQuery,
        cancel: &CancellationToken,
    ) -> Result<TravelPlan, PlannerError> {
        let fetch_all = async {
            tokio::join!(
                self.weather.fetch_weather(&query.city, cancel),
                self.routes.fetch_routes(&query.origin, &query.destination, cancel),
                self.tickets.fetch_tickets(&query.ticket_keyword, cancel),
            )
        };

        let (weather, routes, tickets) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PlannerError::Cancelled),
            results = fetch_all => results,
        };
        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }

        let mut route_options = match routes {
            Ok(options) if !options.is_empty() => options,
            Ok(_) => return Err(PlannerError::routing("No route options available")),
            Err(ProviderError::Cancelled) => return Err(PlannerError::Cancelled),
            Err(e) => {
                warn!("Routing failed, aborting plan: {}", e);
                return Err(PlannerError::routing(e.to_string()));
            }
        };

        let weather_list = match weather {
            Ok(days) if !days.is_empty() => days,
            Ok(_) => {
                warn!("Weather provider returned no days, using placeholder");
                vec![WeatherDay::placeholder()]
            }
            Err(e) => {
                warn!("Weather unavailable, using placeholder: {}", e);
                vec![WeatherDay::placeholder()]
            }
        };

        let tickets = tickets.unwrap_or_else(|e| {
            warn!("Tickets unavailable, continuing without: {}", e);
            Vec::new()
        });

        for option in route_options.values_mut() {
            for step in &mut option.steps {
                step.instruction = clean_instruction(&step.instruction);
            }
        }

        info!(
            "Plan assembled: {} weather day(s), {} route option(s), {} ticket(s)",
            weather_list.len(),
            route_options.len(),
            tickets.len()
        );

        Ok(TravelPlan {
            city: query.city.clone(),
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            weather_list,
            route_options,
            tickets,
        })
    }
}
