use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct HomeAssistantAPI {
    endpoint_url: String,
    auth_token: String,
    client: reqwest::Client,
}

impl HomeAssistantAPI {
    pub fn new(endpoint_url: &str, auth_token: &str) -> Self {
        Self {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn read_entity_state(&self, entity_id: &str) -> Result<HAEntityState, anyhow::Error> {
        if self.endpoint_url.is_empty() {
            anyhow::bail!("No HA connection");
        }
        let result = self
            .client
            .get(format!("{}/api/states/{}", self.endpoint_url, entity_id))
            .bearer_auth(&self.auth_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(result)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HAEntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub last_updated: String,
}

impl HAEntityState {
    /// Numeric view of the entity: `state` plus every numeric attribute.
    /// Values that aren't finite numbers (e.g. "unavailable", "nan") are left out.
    pub fn numeric_fields(&self) -> HashMap<String, f64> {
        let mut fields: HashMap<String, f64> = self
            .attributes
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.clone(), v)))
            .filter(|(_, v)| v.is_finite())
            .collect();

        match self.state.trim().parse::<f64>() {
            Ok(state) if state.is_finite() => {
                fields.insert("state".to_string(), state);
            }
            _ => {}
        }
        fields
    }
}

#[cfg(test)]
mod test_ha_wrapper {
    use super::*;

    #[tokio::test]
    async fn test_home_assistant_api() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/api/states/sensor.printer_plug")
            .match_header("Authorization", "Bearer test_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"
                {
                    "entity_id": "sensor.printer_plug",
                    "state": "118.4",
                    "attributes": {
                        "total_energy": 3.25,
                        "unit_of_measurement": "W"
                    },
                    "last_changed": "2023-01-01T12:00:00Z",
                    "last_updated": "2023-01-01T12:00:00Z"
                }
            "#,
            )
            .create_async()
            .await;

        let api = HomeAssistantAPI::new(&server.url(), "test_token");
        let result = api.read_entity_state("sensor.printer_plug").await.unwrap();

        assert_eq!(result.entity_id, "sensor.printer_plug");
        assert_eq!(result.state, "118.4");
        assert_eq!(result.last_updated, "2023-01-01T12:00:00Z");

        let fields = result.numeric_fields();
        assert_eq!(fields.get("state"), Some(&118.4));
        assert_eq!(fields.get("total_energy"), Some(&3.25));
        assert!(!fields.contains_key("unit_of_measurement"));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_home_assistant_api_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/states/sensor.missing")
            .with_status(404)
            .create_async()
            .await;

        let api = HomeAssistantAPI::new(&server.url(), "test_token");
        assert!(api.read_entity_state("sensor.missing").await.is_err());
    }

    #[tokio::test]
    async fn test_home_assistant_api_no_connection() {
        let api = HomeAssistantAPI::new("", "");
        let result = api.read_entity_state("sensor.temperature").await;

        assert!(result.is_err());
        assert_eq!(result.unwrap_err().to_string(), "No HA connection");
    }

    #[test]
    fn test_unavailable_state_is_dropped() {
        let entity = HAEntityState {
            entity_id: "sensor.plug".to_string(),
            state: "unavailable".to_string(),
            ..Default::default()
        };
        assert!(entity.numeric_fields().is_empty());
    }

    #[test]
    fn test_non_finite_state_is_dropped() {
        for state in ["nan", "NaN", "inf", "-infinity"] {
            let entity = HAEntityState {
                entity_id: "sensor.plug".to_string(),
                state: state.to_string(),
                ..Default::default()
            };
            assert!(
                entity.numeric_fields().is_empty(),
                "state {state} should be dropped"
            );
        }
    }
}
