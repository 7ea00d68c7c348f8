use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::account::Account;
use crate::core_types::{AccountId, Amount};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Initial registry contents
    pub accounts: Vec<AccountSeed>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// One account of the initial registry
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AccountSeed {
    pub id: AccountId,
    pub opening_balance: Amount,
}

impl AccountSeed {
    pub fn to_account(&self) -> Account {
        Account::new(self.id, self.opening_balance)
    }
}

/// Randomized load phase of the demo driver
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SimulationConfig {
    pub workers: usize,
    pub transfers_per_worker: usize,
    /// Upper bound (whole units) for random transfer amounts
    pub max_amount: u32,
    /// RNG seed; each worker derives its own from this
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            transfers_per_worker: 1000,
            max_amount: 250,
            seed: 42,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn build_accounts(&self) -> Vec<Account> {
        self.accounts.iter().map(AccountSeed::to_account).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const SAMPLE: &str = r#"
log_level: info
log_dir: ./logs
log_file: banking.log
use_json: false
rotation: daily
accounts:
  - id: 1
    opening_balance: 1000
  - id: 2
    opening_balance: "2000.50"
"#;

    #[test]
    fn test_parse_config() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.rotation, "daily");
        assert_eq!(
            config.accounts,
            vec![
                AccountSeed {
                    id: 1,
                    opening_balance: Decimal::from(1000),
                },
                AccountSeed {
                    id: 2,
                    opening_balance: Decimal::new(200050, 2),
                },
            ]
        );
        // Missing block falls back to defaults
        assert_eq!(config.simulation, SimulationConfig::default());
    }

    #[test]
    fn test_build_accounts() {
        let config = AppConfig::from_yaml_str(SAMPLE).unwrap();
        let accounts = config.build_accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[1].id(), 2);
        assert_eq!(accounts[1].balance().unwrap(), Decimal::new(200050, 2));
    }

    #[test]
    fn test_missing_accounts_is_error() {
        let yaml = "log_level: info\nlog_dir: .\nlog_file: x.log\nuse_json: false\nrotation: never\n";
        assert!(AppConfig::from_yaml_str(yaml).is_err());
    }
}
