use clap::Parser;

/// REST server for Matatena games. Address and port come from Rocket's own
/// configuration (`ROCKET_ADDRESS`, `ROCKET_PORT`).
#[derive(Parser, Debug, Clone)]
#[command(name = "matatena-api", version, about)]
pub struct ApiConfig {
    #[arg(long, env = "MONGO_URI", default_value = "mongodb://localhost:27017")]
    pub mongo_uri: String,

    #[arg(long, env = "MATATENA_DB", default_value = "matatena")]
    pub database: String,

    /// HS256 secret shared with the token issuer and the push server.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Reject out-of-turn moves and moves into full columns.
    #[arg(long, env = "MATATENA_STRICT_RULES")]
    pub strict_rules: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let config = ApiConfig::try_parse_from(["matatena-api", "--jwt-secret", "s3cret"]).unwrap();
        assert_eq!(config.mongo_uri, "mongodb://localhost:27017");
        assert_eq!(config.database, "matatena");
        assert!(!config.strict_rules);
    }
}
