use std::{env, fmt, path::Path};

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult};

/// Unit an account's daily quota is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaUnit {
    Tokens,
    Requests,
    Dollars,
}

impl fmt::Display for QuotaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaUnit::Tokens => write!(f, "tokens"),
            QuotaUnit::Requests => write!(f, "requests"),
            QuotaUnit::Dollars => write!(f, "dollars"),
        }
    }
}

/// Authentication credentials for a provider account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {
    #[serde(default)]
    pub api_key: String,
}

/// A (provider, model) pair referenced from a model alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

/// A model alias mapping to an ordered list of provider models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMapping {
    pub alias: String,
    pub models: Vec<ModelRef>,
}

/// One upstream provider account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub provider: String,
    pub id: String,
    #[serde(default)]
    pub auth: Auth,
    /// Daily free allowance, measured in `quota_unit`.
    #[serde(default)]
    pub daily_free: i64,
    pub quota_unit: QuotaUnit,
    #[serde(default)]
    pub paid_enabled: bool,
    /// Dollar ceiling for paid usage per UTC day. 0 means unlimited.
    #[serde(default)]
    pub max_daily_spend: f64,
    /// Legacy single rate, normalized into the per-direction rates.
    #[serde(default)]
    pub cost_per_token: f64,
    #[serde(default)]
    pub cost_per_input_token: f64,
    #[serde(default)]
    pub cost_per_output_token: f64,
}

impl AccountConfig {
    fn has_positive_cost(&self) -> bool {
        self.cost_per_token > 0.0
            || self.cost_per_input_token > 0.0
            || self.cost_per_output_token > 0.0
    }
}

/// Top-level router configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub allow_paid: bool,
    #[serde(default)]
    pub default_model: String,
    #[serde(default)]
    pub models: Vec<ModelMapping>,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

impl RouterConfig {
    /// Load a config from a YAML file.
    ///
    /// `${VAR}` references are expanded from the process environment before
    /// parsing, then the config is validated and normalized.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let expanded = expand_env(&raw);

        let mut config: RouterConfig =
            serde_yaml::from_str(&expanded).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        config.validate()?;
        config.normalize();
        Ok(config)
    }

    /// Check required fields and numeric ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.accounts.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one account is required".to_string(),
            });
        }

        let mut seen_ids = std::collections::HashSet::new();
        for (i, acc) in self.accounts.iter().enumerate() {
            if acc.provider.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("accounts[{i}].provider"),
                });
            }
            if acc.id.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("accounts[{i}].id"),
                });
            }
            if !seen_ids.insert(acc.id.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts[{i}].id"),
                    value: acc.id.clone(),
                    reason: "duplicate account id".to_string(),
                });
            }

            for (field, value) in [
                ("daily_free", acc.daily_free as f64),
                ("max_daily_spend", acc.max_daily_spend),
                ("cost_per_token", acc.cost_per_token),
                ("cost_per_input_token", acc.cost_per_input_token),
                ("cost_per_output_token", acc.cost_per_output_token),
            ] {
                if value < 0.0 {
                    return Err(ConfigError::InvalidValue {
                        field: format!("accounts[{i}].{field}"),
                        value: value.to_string(),
                        reason: "must not be negative".to_string(),
                    });
                }
            }

            if acc.paid_enabled && !acc.has_positive_cost() {
                return Err(ConfigError::InvalidValue {
                    field: format!("accounts[{i}].paid_enabled"),
                    value: "true".to_string(),
                    reason: "paid accounts require a positive cost rate".to_string(),
                });
            }
        }

        for (i, m) in self.models.iter().enumerate() {
            if m.alias.is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: format!("models[{i}].alias"),
                });
            }
            if m.models.is_empty() {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("models[{i}] ({}): at least one model ref is required", m.alias),
                });
            }
        }

        Ok(())
    }

    /// Fold the legacy single `cost_per_token` rate into the per-direction
    /// rates when neither is set.
    pub fn normalize(&mut self) {
        for acc in &mut self.accounts {
            if acc.cost_per_token > 0.0
                && acc.cost_per_input_token == 0.0
                && acc.cost_per_output_token == 0.0
            {
                acc.cost_per_input_token = acc.cost_per_token;
                acc.cost_per_output_token = acc.cost_per_token;
            }
        }
    }
}

/// Expand `${VAR}` references from the process environment.
///
/// Unset variables expand to the empty string. A `$` not followed by `{` is
/// passed through unchanged.
fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                out.push_str(&env::var(name).unwrap_or_default());
                rest = &rest[start + 2 + end + 1..];
            }
            None => {
                // Unterminated reference, keep literal.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
