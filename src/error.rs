//! Error types and handling for the TripPlan application

use thiserror::Error;

/// Main error type for plan generation
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Routing could not be resolved; no plan can be built
    #[error("Routing error: {message}")]
    Routing { message: String },

    /// Document rendering errors
    #[error("Render error: {message}")]
    Render { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The request was cancelled before the plan was complete
    #[error("Plan generation cancelled")]
    Cancelled,
}

impl PlannerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new routing error
    pub fn routing<S: Into<String>>(message: S) -> Self {
        Self::Routing {
            message: message.into(),
        }
    }

    /// Create a new render error
    pub fn render<S: Into<String>>(message: S) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            PlannerError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            PlannerError::Routing { message } => {
                format!("Unable to plan a route: {message}")
            }
            PlannerError::Render { .. } => "Failed to render the travel plan.".to_string(),
            PlannerError::Io { .. } => {
                "File operation failed. Please check the output directory permissions.".to_string()
            }
            PlannerError::Cancelled => "The request was cancelled.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let config_err = PlannerError::config("missing API key");
        assert!(matches!(config_err, PlannerError::Config { .. }));

        let routing_err = PlannerError::routing("origin not found");
        assert!(matches!(routing_err, PlannerError::Routing { .. }));

        let render_err = PlannerError::render("bad template");
        assert!(matches!(render_err, PlannerError::Render { .. }));
    }

    #[test]
    fn test_user_messages() {
        let config_err = PlannerError::config("test");
        assert!(config_err.user_message().contains("Configuration error"));

        let routing_err = PlannerError::routing("Could not resolve origin");
        assert!(routing_err.user_message().contains("Could not resolve origin"));

        assert!(PlannerError::Cancelled.user_message().contains("cancelled"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let planner_err: PlannerError = io_err.into();
        assert!(matches!(planner_err, PlannerError::Io { .. }));
    }
}
