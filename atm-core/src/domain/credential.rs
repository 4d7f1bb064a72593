//! Credential hashing parameters

use serde::{Deserialize, Serialize};

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;

/// Argon2id parameters used when hashing new credentials
///
/// Verification always uses the parameters embedded in the stored hash,
/// so changing these only affects accounts registered afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Argon2Params {
    pub time_cost: u32,
    /// Memory in KiB
    pub memory_cost: u32,
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_cost: DEFAULT_MEMORY_COST,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl Argon2Params {
    /// Smallest parameters argon2 accepts. Only suitable for tests and demos.
    pub fn minimal() -> Self {
        Self {
            time_cost: 1,
            memory_cost: 8,
            parallelism: 1,
        }
    }

    /// Build the argon2 crate's parameter type
    pub fn to_argon2(&self) -> Result<argon2::Params, argon2::Error> {
        argon2::Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Argon2Params::default().to_argon2().is_ok());
        assert!(Argon2Params::minimal().to_argon2().is_ok());
    }

    #[test]
    fn test_memory_below_minimum_is_rejected() {
        let params = Argon2Params {
            time_cost: 1,
            memory_cost: 4,
            parallelism: 1,
        };
        assert!(params.to_argon2().is_err());
    }

    #[test]
    fn test_camel_case_serialization() {
        let json = serde_json::to_value(Argon2Params::default()).unwrap();
        assert_eq!(json["memoryCost"], 65536);
        assert_eq!(json["timeCost"], 3);
    }
}
