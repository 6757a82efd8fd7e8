use serde::{Deserialize, Serialize};

/// A purchasable attraction ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketInfo {
    pub name: String,
    /// Deep link to the ticket page
    pub url: String,
}

impl TicketInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}
