// Copyright (c) 2025 Chetan Conikee <conikee@gmail.com>
// Licensed under the MIT License

//! Model resolution for the chat gateway.
//!
//! The default model list is the offline fallback used when the
//! `/api/custom-chat/models` endpoint is unavailable or omitted by the
//! caller's environment; in normal operation the gateway resolves a
//! request's model id through an injected [`ModelService`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One selectable chat model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// The model's id, as sent to `/api/custom-chat/send`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Vendor name (e.g. `"google"`).
    pub vendor: String,
    /// True if this is the vendor/catalog default.
    #[serde(default)]
    pub is_default: bool,
    /// Maximum context tokens, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// The offline fallback model catalog: Gemini 2.5 Pro/Flash and 2.0 Flash,
/// with 2.5 Pro as the default.
#[must_use]
pub fn default_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            id: "gemini-2.5-pro".to_string(),
            name: "Gemini 2.5 Pro".to_string(),
            vendor: "google".to_string(),
            is_default: true,
            max_tokens: None,
        },
        ModelInfo {
            id: "gemini-2.5-flash".to_string(),
            name: "Gemini 2.5 Flash".to_string(),
            vendor: "google".to_string(),
            is_default: false,
            max_tokens: None,
        },
        ModelInfo {
            id: "gemini-2.0-flash".to_string(),
            name: "Gemini 2.0 Flash".to_string(),
            vendor: "google".to_string(),
            is_default: false,
            max_tokens: None,
        },
    ]
}

/// The id of the offline-fallback default model.
#[must_use]
pub fn default_model_id() -> String {
    default_models()
        .into_iter()
        .find(|m| m.is_default)
        .map(|m| m.id)
        .unwrap_or_else(|| "gemini-2.5-pro".to_string())
}

/// Resolves which model id a chat request should use when the request
/// omits one. Injected so the gateway is testable without the real
/// `/api/custom-chat/models` endpoint.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Returns the model id to use when a request doesn't specify one.
    async fn default_model_id(&self) -> String;
}

/// A [`ModelService`] that always resolves to the offline fallback default.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticModelService;

#[async_trait]
impl ModelService for StaticModelService {
    async fn default_model_id(&self) -> String {
        default_model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_gemini_25_pro() {
        assert_eq!(default_model_id(), "gemini-2.5-pro");
    }

    #[test]
    fn test_default_models_has_three_entries() {
        let models = default_models();
        assert_eq!(models.len(), 3);
        assert_eq!(models.iter().filter(|m| m.is_default).count(), 1);
    }

    #[tokio::test]
    async fn test_static_model_service_resolves_default() {
        let service = StaticModelService;
        assert_eq!(service.default_model_id().await, "gemini-2.5-pro");
    }
}
