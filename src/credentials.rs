// Equipment type -> upstream API key lookup table, fixed at startup

use std::collections::BTreeMap;
use std::fmt;

use crate::error::RelayError;

/// Equipment types the relay knows about. Each one reads its key from
/// `CAL_API_KEY_<TYPE>`.
pub const EQUIPMENT_TYPES: [&str; 5] = [
    "PROJECTOR",
    "SPEAKER",
    "PLATINUM_SPEAKER",
    "LOGITECH1",
    "LOGITECH2",
];

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Keys must never end up in logs
impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    keys: BTreeMap<String, ApiKey>,
    fallback: Option<ApiKey>,
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equipment(mut self, equipment_type: &str, key: impl Into<String>) -> Self {
        self.keys
            .insert(equipment_type.to_uppercase(), ApiKey::new(key));
        self
    }

    pub fn with_fallback(mut self, key: impl Into<String>) -> Self {
        self.fallback = Some(ApiKey::new(key));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.fallback.is_none()
    }

    /// Configured equipment types in sorted order.
    pub fn equipment_types(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    pub fn fallback(&self) -> Option<&ApiKey> {
        self.fallback.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApiKey)> {
        self.keys.iter().map(|(name, key)| (name.as_str(), key))
    }

    /// Resolve the key for a request. The equipment type is matched
    /// case-insensitively; a missing type falls back to the default key.
    pub fn resolve(&self, equipment_type: Option<&str>) -> Result<&ApiKey, RelayError> {
        if self.is_empty() {
            return Err(RelayError::NotConfigured);
        }

        let found = match equipment_type {
            Some(name) => self.keys.get(&name.trim().to_uppercase()),
            None => self.fallback.as_ref(),
        };

        found.ok_or_else(|| RelayError::UnknownEquipment {
            equipment: equipment_type
                .map(|name| name.trim().to_uppercase())
                .unwrap_or_else(|| "<none>".to_string()),
            valid_types: self.equipment_types(),
        })
    }
}
