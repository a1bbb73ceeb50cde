//! Service configuration, read from the environment.

use strum::IntoEnumIterator;
use thiserror::Error;

use crate::domain::value_objects::PaymentMethod;
use crate::services::CheckoutSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub order_events_subject: String,
    pub checkout: CheckoutSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = parse_or("PORT", var("PORT"), 8083)?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 10)?;
        let order_events_subject = var("ORDER_EVENTS_SUBJECT").unwrap_or_else(|| "storefront.orders".to_string());

        let accepted_payment_methods = match var("ACCEPTED_PAYMENT_METHODS") {
            Some(raw) => parse_payment_methods(&raw)?,
            None => PaymentMethod::iter().collect(),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            port,
            nats_url: var("NATS_URL"),
            order_events_subject,
            checkout: CheckoutSettings { accepted_payment_methods },
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_payment_methods(raw: &str) -> Result<Vec<PaymentMethod>, ConfigError> {
    let mut methods = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let method = code
            .parse::<PaymentMethod>()
            .map_err(|_| ConfigError::Invalid { key: "ACCEPTED_PAYMENT_METHODS", value: code.to_string() })?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    if methods.is_empty() {
        return Err(ConfigError::Invalid { key: "ACCEPTED_PAYMENT_METHODS", value: raw.to_string() });
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/shop")]).unwrap();
        assert_eq!(config.port, 8083);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.nats_url, None);
        assert_eq!(config.order_events_subject, "storefront.orders");
        assert_eq!(config.checkout, CheckoutSettings::default());
    }

    #[test]
    fn test_database_url_required() {
        assert_eq!(config(&[("PORT", "80")]), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_payment_methods_subset() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("ACCEPTED_PAYMENT_METHODS", "khalti, e_sewa,khalti"),
        ])
        .unwrap();
        assert_eq!(config.checkout.accepted_payment_methods, vec![PaymentMethod::Khalti, PaymentMethod::ESewa]);
    }

    #[test]
    fn test_invalid_values() {
        let err = config(&[("DATABASE_URL", "x"), ("PORT", "eighty")]).unwrap_err();
        assert_eq!(err, ConfigError::Invalid { key: "PORT", value: "eighty".into() });
        let err = config(&[("DATABASE_URL", "x"), ("ACCEPTED_PAYMENT_METHODS", "paypal")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ACCEPTED_PAYMENT_METHODS", .. }));
    }
}
