//! Identity configuration shared by the HTTP and websocket layers.

use serde::{Deserialize, Serialize};

/// Locale settings sent with every signed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// BCP-47 language tag, e.g. `"en-US"`.
    #[serde(default = "default_language")]
    pub language: String,
    /// Lowercase country code, e.g. `"us"`.
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Timezone offset in minutes.
    #[serde(default = "default_time_zone")]
    pub time_zone: i32,
}

fn default_language() -> String { "en-US".into() }
fn default_country_code() -> String { "us".into() }
fn default_time_zone() -> i32 { 180 }

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            country_code: default_country_code(),
            time_zone: default_time_zone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: IdentityConfig = serde_json::from_str(r#"{"language":"pt-BR"}"#).unwrap();
        assert_eq!(cfg.language, "pt-BR");
        assert_eq!(cfg.country_code, "us");
        assert_eq!(cfg.time_zone, 180);
    }
}
