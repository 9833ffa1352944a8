use serde::{Deserialize, Serialize};

/// Per-tenant bot settings, loaded from the profile store before each pass
/// and carried through the conversation state as a read-only snapshot.
///
/// Prompt and product fields default to empty: the bot has nothing useful to
/// say about a product nobody configured, so empty values simply drop the
/// corresponding prompt sections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BotProfile {
    pub system_prompt: String,
    pub welcome_message: String,
    pub payment_link: String,
    pub use_emojis: bool,
    pub multi_part_messages: bool,
    pub max_words_per_response: u32,
    pub product_name: String,
    pub product_description: String,
    pub product_features: String,
    pub product_benefits: String,
    pub product_price: String,
    pub product_target_audience: String,
}

impl Default for BotProfile {
    fn default() -> Self {
        Self {
            system_prompt: String::new(),
            welcome_message: String::new(),
            payment_link: String::new(),
            use_emojis: true,
            multi_part_messages: false,
            max_words_per_response: 100,
            product_name: String::new(),
            product_description: String::new(),
            product_features: String::new(),
            product_benefits: String::new(),
            product_price: String::new(),
            product_target_audience: String::new(),
        }
    }
}

impl BotProfile {
    pub fn has_product_info(&self) -> bool {
        !self.product_name.trim().is_empty() || !self.product_description.trim().is_empty()
    }

    /// Applies one settings row from the key/value store. Unknown keys are
    /// ignored so older databases keep loading after settings are removed.
    pub fn apply_setting(&mut self, key: &str, value: &str) {
        match key {
            "system_prompt" => self.system_prompt = value.to_string(),
            "welcome_message" => self.welcome_message = value.to_string(),
            "payment_link" => self.payment_link = value.to_string(),
            "use_emojis" => self.use_emojis = parse_flag(value, self.use_emojis),
            "multi_part_messages" => {
                self.multi_part_messages = parse_flag(value, self.multi_part_messages)
            }
            "max_words_per_response" => {
                if let Ok(words) = value.trim().parse::<u32>() {
                    if words > 0 {
                        self.max_words_per_response = words;
                    }
                }
            }
            "product_name" => self.product_name = value.to_string(),
            "product_description" => self.product_description = value.to_string(),
            "product_features" => self.product_features = value.to_string(),
            "product_benefits" => self.product_benefits = value.to_string(),
            "product_price" => self.product_price = value.to_string(),
            "product_target_audience" => self.product_target_audience = value.to_string(),
            _ => {}
        }
    }

    pub fn from_settings<'a>(rows: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut profile = Self::default();
        for (key, value) in rows {
            profile.apply_setting(key, value);
        }
        profile
    }
}

fn parse_flag(value: &str, fallback: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::BotProfile;

    #[test]
    fn defaults_match_unconfigured_tenant() {
        let profile = BotProfile::default();
        assert!(profile.system_prompt.is_empty());
        assert!(profile.use_emojis);
        assert!(!profile.multi_part_messages);
        assert_eq!(profile.max_words_per_response, 100);
        assert!(!profile.has_product_info());
    }

    #[test]
    fn settings_rows_override_defaults() {
        let profile = BotProfile::from_settings([
            ("system_prompt", "Eres un asesor de ventas."),
            ("use_emojis", "false"),
            ("multi_part_messages", "true"),
            ("max_words_per_response", "60"),
            ("product_name", "Curso de Trading"),
            ("unknown_key", "ignored"),
        ]);

        assert_eq!(profile.system_prompt, "Eres un asesor de ventas.");
        assert!(!profile.use_emojis);
        assert!(profile.multi_part_messages);
        assert_eq!(profile.max_words_per_response, 60);
        assert!(profile.has_product_info());
    }

    #[test]
    fn malformed_values_keep_previous_setting() {
        let mut profile = BotProfile::default();
        profile.apply_setting("use_emojis", "maybe");
        profile.apply_setting("max_words_per_response", "-3");

        assert!(profile.use_emojis);
        assert_eq!(profile.max_words_per_response, 100);
    }
}
