use serde::{Deserialize, Serialize};

/// Channel identity for one end user. The phone number is the primary key
/// across persistence, CRM sync, and outbound delivery; name and email are
/// filled in as the data collector learns them and are never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Contact {
    pub fn new(phone: impl Into<String>) -> Self {
        Self { phone: phone.into(), name: None, email: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
