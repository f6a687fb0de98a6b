//! Process configuration
//!
//! Every setting may be given as a command-line flag or through the
//! environment. The binary loads a `.env` file from the working directory
//! into the environment before arguments are parsed.

use std::{net::SocketAddr, time::Duration};

use barista::jwa;
use barista_oauth2::{RefreshPolicy, ValidatorConfig};
use clap::Parser;

/// Settings for the coffee shop API server
#[derive(Clone, Debug, Parser)]
#[command(name = "coffeeshop", version, about)]
pub struct Config {
    /// Auth0 tenant domain, such as `example.auth0.com`
    #[arg(long, env = "AUTH0_DOMAIN")]
    pub auth0_domain: String,

    /// API identifier expected in the `aud` claim of access tokens
    #[arg(long, env = "API_AUDIENCE")]
    pub api_audience: String,

    /// Signing algorithm accepted on access tokens
    #[arg(long = "algorithm", env = "ALGORITHMS", default_value = "RS256")]
    pub algorithm: jwa::Algorithm,

    /// Location of the drinks database
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://database.db?mode=rwc")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:5000")]
    pub bind_address: SocketAddr,

    /// Maximum age of the cached signing keys, in seconds
    ///
    /// When unset, the keys are fetched once and only refetched when a token
    /// names an unknown key.
    #[arg(long, env = "JWKS_TTL_SECS")]
    pub jwks_ttl_secs: Option<u64>,

    /// Minimum spacing between key set refetches caused by unknown key ids,
    /// in seconds
    #[arg(long, env = "JWKS_MISS_COOLDOWN_SECS", default_value_t = 30)]
    pub jwks_miss_cooldown_secs: u64,

    /// Interval between background refreshes of the signing keys, in seconds
    ///
    /// When unset or zero, the keys are only fetched on demand.
    #[arg(long, env = "JWKS_REFRESH_SECS")]
    pub jwks_refresh_secs: Option<u64>,

    /// Grace period applied to `exp` and `nbf`, in seconds
    #[arg(long, env = "TOKEN_LEEWAY_SECS", default_value_t = 0)]
    pub token_leeway_secs: u64,

    /// Drop the drinks table, recreate it, and insert the sample drinks
    #[arg(long)]
    pub reset_database: bool,
}

impl Config {
    /// Token validation settings
    pub fn validator(&self) -> ValidatorConfig {
        ValidatorConfig::new(&self.auth0_domain, &self.api_audience)
            .with_algorithm(self.algorithm)
            .with_leeway(Duration::from_secs(self.token_leeway_secs))
    }

    /// Refresh behaviour for the cached signing keys
    pub fn refresh_policy(&self) -> RefreshPolicy {
        let policy = RefreshPolicy::default()
            .with_miss_cooldown(Duration::from_secs(self.jwks_miss_cooldown_secs));

        match self.jwks_ttl_secs {
            Some(ttl) => policy.with_ttl(Duration::from_secs(ttl)),
            None => policy,
        }
    }

    /// How often to refresh the signing keys in the background, if at all
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.jwks_refresh_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut argv = vec!["coffeeshop"];
        argv.extend_from_slice(args);
        Ok(Config::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_apply() -> Result<()> {
        let config = parse(&[
            "--auth0-domain",
            "example.auth0.com",
            "--api-audience",
            "coffeeshop",
        ])?;

        assert_eq!(config.algorithm, jwa::Algorithm::RS256);
        assert_eq!(config.bind_address, "127.0.0.1:5000".parse()?);
        assert_eq!(config.jwks_miss_cooldown_secs, 30);
        assert!(!config.reset_database);

        let validator = config.validator();
        assert_eq!(validator.issuer().as_str(), "https://example.auth0.com/");
        assert_eq!(
            validator.jwks_url(),
            "https://example.auth0.com/.well-known/jwks.json"
        );

        let policy = config.refresh_policy();
        assert_eq!(policy.ttl, None);
        assert_eq!(policy.miss_cooldown, Duration::from_secs(30));
        assert_eq!(config.refresh_interval(), None);
        Ok(())
    }

    #[test]
    fn ttl_and_leeway_are_applied() -> Result<()> {
        let config = parse(&[
            "--auth0-domain",
            "example.auth0.com",
            "--api-audience",
            "coffeeshop",
            "--jwks-ttl-secs",
            "600",
            "--token-leeway-secs",
            "5",
            "--algorithm",
            "RS384",
        ])?;

        assert_eq!(config.refresh_policy().ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.validator().leeway, Duration::from_secs(5));
        assert_eq!(config.validator().algorithm, jwa::Algorithm::RS384);
        Ok(())
    }

    #[test]
    fn background_refresh_is_opt_in() -> Result<()> {
        let base = ["--auth0-domain", "example.auth0.com", "--api-audience", "coffeeshop"];

        let config = parse(&[&base[..], &["--jwks-refresh-secs", "300"]].concat())?;
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(300)));

        let config = parse(&[&base[..], &["--jwks-refresh-secs", "0"]].concat())?;
        assert_eq!(config.refresh_interval(), None);
        Ok(())
    }

    #[test]
    fn symmetric_algorithms_are_refused() {
        let result = parse(&[
            "--auth0-domain",
            "example.auth0.com",
            "--api-audience",
            "coffeeshop",
            "--algorithm",
            "HS256",
        ]);

        assert!(result.is_err());
    }
}
