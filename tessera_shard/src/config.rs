//! Shard configuration and its validation.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::key::ShardId;

/// One shard: a constant id and the address handed to the connect function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig<I = i64> {
    pub id: I,
    #[serde(rename = "dsn", alias = "address")]
    pub address: String,
}

impl<I: ShardId> ShardConfig<I> {
    pub fn new(id: I, address: impl Into<String>) -> Self {
        Self { id, address: address.into() }
    }

    /// Per-field checks: valid id, non-blank address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.id.is_valid() {
            return Err(ConfigError::InvalidId(format!("{:?}", self.id)));
        }
        if self.address.trim().is_empty() {
            return Err(ConfigError::InvalidAddress(format!("{:?}", self.id)));
        }
        Ok(())
    }
}

/// Validate a whole configuration set: non-empty, every entry valid, ids and
/// addresses pairwise distinct.
pub fn validate_all<I: ShardId>(shards: &[ShardConfig<I>]) -> Result<(), ConfigError> {
    if shards.is_empty() {
        return Err(ConfigError::NoShards);
    }
    for shard in shards {
        shard.validate()?;
    }
    let mut ids = HashSet::with_capacity(shards.len());
    let mut addresses = HashSet::with_capacity(shards.len());
    for shard in shards {
        if !ids.insert(&shard.id) {
            return Err(ConfigError::DuplicateId(format!("{:?}", shard.id)));
        }
        if !addresses.insert(shard.address.as_str()) {
            return Err(ConfigError::DuplicateAddress(shard.address.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_validation() {
        assert!(ShardConfig::new(1i64, "dsn").validate().is_ok());
        assert_eq!(
            ShardConfig::new(1i64, "").validate(),
            Err(ConfigError::InvalidAddress("1".into()))
        );
        assert_eq!(
            ShardConfig::new(1i64, "   ").validate(),
            Err(ConfigError::InvalidAddress("1".into()))
        );
        assert_eq!(
            ShardConfig::new(0i64, "dsn").validate(),
            Err(ConfigError::InvalidId("0".into()))
        );
        assert!(ShardConfig::new(String::new(), "dsn").validate().is_err());
        assert!(ShardConfig::new("eu-1".to_string(), "dsn").validate().is_ok());
    }

    #[test]
    fn uniqueness() {
        let unique = vec![
            ShardConfig::new(1i64, "1"),
            ShardConfig::new(2, "2"),
            ShardConfig::new(3, "3"),
        ];
        assert!(validate_all(&unique).is_ok());

        let same_id = vec![ShardConfig::new(1i64, "1"), ShardConfig::new(1, "2")];
        assert_eq!(validate_all(&same_id), Err(ConfigError::DuplicateId("1".into())));

        let same_addr = vec![ShardConfig::new(1i64, "1"), ShardConfig::new(2, "1")];
        assert_eq!(
            validate_all(&same_addr),
            Err(ConfigError::DuplicateAddress("1".into()))
        );

        assert_eq!(validate_all::<i64>(&[]), Err(ConfigError::NoShards));
    }

    #[test]
    fn serde_field_names() {
        let cfg: ShardConfig = serde_json::from_str(r#"{"id":2,"dsn":"postgres://db2"}"#).unwrap();
        assert_eq!(cfg, ShardConfig::new(2, "postgres://db2"));
        let cfg: ShardConfig = serde_json::from_str(r#"{"id":3,"address":"h:1"}"#).unwrap();
        assert_eq!(cfg.address, "h:1");
        let out = serde_json::to_string(&ShardConfig::new(1i64, "x")).unwrap();
        assert_eq!(out, r#"{"id":1,"dsn":"x"}"#);
    }
}
