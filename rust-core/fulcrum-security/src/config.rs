// SPDX-License-Identifier: PMPL-1.0-or-later
//! Security service configuration.
//!
//! Defaults:
//! - model: dynamic
//! - password_hasher: plain
//! - global_group: "global"

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto;
use crate::error::{Result, SecurityError};

/// Shape of the entity graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Users belong to groups. Nothing else.
    Basic,
    /// Users belong to groups, groups hold roles, roles hold permissions.
    Dynamic,
    /// Users hold roles within groups; roles hold permissions.
    Turbine,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [
        ModelVariant::Basic,
        ModelVariant::Dynamic,
        ModelVariant::Turbine,
    ];

    /// Whether users are attached to groups directly (not via triples).
    pub fn has_user_group_edges(self) -> bool {
        matches!(self, ModelVariant::Basic | ModelVariant::Dynamic)
    }

    pub fn has_group_role_edges(self) -> bool {
        matches!(self, ModelVariant::Dynamic)
    }

    pub fn has_role_permission_edges(self) -> bool {
        matches!(self, ModelVariant::Dynamic | ModelVariant::Turbine)
    }

    pub fn has_user_group_role_triples(self) -> bool {
        matches!(self, ModelVariant::Turbine)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::Basic => write!(f, "basic"),
            ModelVariant::Dynamic => write!(f, "dynamic"),
            ModelVariant::Turbine => write!(f, "turbine"),
        }
    }
}

impl FromStr for ModelVariant {
    type Err = SecurityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(ModelVariant::Basic),
            "dynamic" => Ok(ModelVariant::Dynamic),
            "turbine" => Ok(ModelVariant::Turbine),
            _ => Err(SecurityError::InvalidConfig(format!(
                "unknown model variant: {}",
                s
            ))),
        }
    }
}

/// Configuration for a [`SecurityService`](crate::service::SecurityService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Graph topology.
    pub model: ModelVariant,
    /// Name of the password hasher in the [`crypto`] registry.
    pub password_hasher: String,
    /// Turbine model: group whose roles apply regardless of group context.
    pub global_group: String,
}

impl SecurityConfig {
    /// Default configuration with a specific model variant.
    pub fn for_model(model: ModelVariant) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SecurityConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.global_group.trim().is_empty() {
            return Err(SecurityError::InvalidConfig(
                "global_group must not be empty".to_string(),
            ));
        }
        crypto::hasher_for(&self.password_hasher)?;
        Ok(())
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            model: ModelVariant::Dynamic,
            password_hasher: "plain".to_string(),
            global_group: "global".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SecurityConfig::default();
        assert_eq!(config.model, ModelVariant::Dynamic);
        assert_eq!(config.password_hasher, "plain");
        assert_eq!(config.global_group, "global");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_variant_display_roundtrip() {
        for variant in ModelVariant::ALL {
            let parsed: ModelVariant = variant.to_string().parse().unwrap();
            assert_eq!(parsed, variant);
        }
        assert_eq!("TURBINE".parse::<ModelVariant>().unwrap(), ModelVariant::Turbine);
        assert!("flat".parse::<ModelVariant>().is_err());
    }

    #[test]
    fn test_edge_capabilities() {
        assert!(ModelVariant::Basic.has_user_group_edges());
        assert!(!ModelVariant::Basic.has_role_permission_edges());
        assert!(ModelVariant::Dynamic.has_group_role_edges());
        assert!(!ModelVariant::Turbine.has_user_group_edges());
        assert!(ModelVariant::Turbine.has_user_group_role_triples());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = SecurityConfig::from_json(r#"{"model": "turbine"}"#).unwrap();
        assert_eq!(config.model, ModelVariant::Turbine);
        assert_eq!(config.global_group, "global");
    }

    #[test]
    fn test_validate_rejects_unknown_hasher() {
        let config = SecurityConfig {
            password_hasher: "rot13".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SecurityError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_global_group() {
        let result = SecurityConfig::from_json(r#"{"global_group": "  "}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = SecurityConfig::for_model(ModelVariant::Basic);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"basic\""));
        let parsed: SecurityConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
