use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::{
    DEFAULT_API_URL, GatewayConfig, MAX_RETRIES, REQUEST_TIMEOUT_SECS, RETRY_DELAY_SECS,
    RetryPolicy,
};

#[derive(Parser, Debug)]
#[command(
    name = "fin-assist",
    version,
    about = "AI financial assistant: profile analysis, advice, investment simulation and support chat"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server
    Serve(Box<ServeArgs>),
    /// Run an investment simulation and print it as JSON
    Simulate(SimulateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,
    #[arg(long, env = "GEMINI_API_URL", default_value = DEFAULT_API_URL)]
    pub gemini_api_url: String,
    #[arg(long, env = "HTTP_PROXY")]
    pub http_proxy: Option<String>,
    #[arg(long, env = "HTTPS_PROXY")]
    pub https_proxy: Option<String>,
    #[arg(
        long,
        env = "REQUEST_TIMEOUT_SECS",
        default_value_t = REQUEST_TIMEOUT_SECS,
        help = "Timeout for a single provider call in seconds"
    )]
    pub request_timeout_secs: u64,
    #[arg(
        long,
        env = "MAX_RETRIES",
        default_value_t = MAX_RETRIES,
        help = "Total attempts per provider call, including the first"
    )]
    pub max_retries: u32,
    #[arg(long, env = "RETRY_DELAY_SECS", default_value_t = RETRY_DELAY_SECS)]
    pub retry_delay_secs: u64,

    #[arg(
        long,
        env = "SECRET_KEY",
        hide_env_values = true,
        help = "Key used to sign session cookies; random per process when unset"
    )]
    pub secret_key: Option<String>,
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 86_400)]
    pub session_ttl_secs: u64,
    #[arg(long, env = "LOGIN_USER", default_value = "mingkai")]
    pub login_user: String,
    #[arg(long, env = "LOGIN_PASSWORD", default_value = "wang", hide_env_values = true)]
    pub login_password: String,

    #[arg(long, env = "HISTORY_FILE", default_value = "question_history.json")]
    pub history_file: PathBuf,
    #[arg(
        long,
        env = "DASHBOARD_CSV",
        default_value = "static/downloads/electricity_consumption.csv"
    )]
    pub dashboard_csv: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long)]
    pub initial_amount: f64,
    #[arg(long, help = "Expected annual return in percent, e.g. 5")]
    pub annual_rate: f64,
    #[arg(long)]
    pub years: u32,
}

/// Validated server settings.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen: SocketAddr,
    pub gateway: GatewayConfig,
    pub secret_key: Option<String>,
    pub session_ttl: Duration,
    pub login_user: String,
    pub login_password: String,
    pub history_file: PathBuf,
    pub dashboard_csv: PathBuf,
}

impl TryFrom<ServeArgs> for AppConfig {
    type Error = String;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        if args.max_retries == 0 {
            return Err("--max-retries must be >= 1".to_string());
        }
        if args.request_timeout_secs == 0 {
            return Err("--request-timeout-secs must be >= 1".to_string());
        }
        if args.session_ttl_secs == 0 {
            return Err("--session-ttl-secs must be >= 1".to_string());
        }
        if args.login_user.trim().is_empty() {
            return Err("--login-user must not be empty".to_string());
        }

        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Ok(Self {
            listen: SocketAddr::new(args.bind, args.port),
            gateway: GatewayConfig {
                api_key: non_empty(args.gemini_api_key),
                api_url: args.gemini_api_url,
                http_proxy: non_empty(args.http_proxy),
                https_proxy: non_empty(args.https_proxy),
                request_timeout: Duration::from_secs(args.request_timeout_secs),
                retry: RetryPolicy::new(
                    args.max_retries,
                    Duration::from_secs(args.retry_delay_secs),
                ),
            },
            secret_key: non_empty(args.secret_key),
            session_ttl: Duration::from_secs(args.session_ttl_secs),
            login_user: args.login_user,
            login_password: args.login_password,
            history_file: args.history_file,
            dashboard_csv: args.dashboard_csv,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["fin-assist", "serve"];
        argv.extend_from_slice(extra);
        let cli = Cli::try_parse_from(argv).expect("valid args");
        match cli.command {
            Command::Serve(args) => *args,
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn explicit_flags_build_gateway_config() {
        let config = AppConfig::try_from(serve_args(&[
            "--port",
            "8080",
            "--gemini-api-key",
            "abc",
            "--max-retries",
            "5",
            "--retry-delay-secs",
            "1",
            "--https-proxy",
            "http://proxy.local:3128",
            "--http-proxy",
            "",
        ]))
        .expect("valid config");

        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.gateway.api_key.as_deref(), Some("abc"));
        assert_eq!(config.gateway.retry.max_attempts, 5);
        assert_eq!(config.gateway.retry.delay, Duration::from_secs(1));
        assert_eq!(config.gateway.https_proxy.as_deref(), Some("http://proxy.local:3128"));
        assert_eq!(config.gateway.http_proxy, None);
    }

    #[test]
    fn rejects_zero_retries() {
        let err = AppConfig::try_from(serve_args(&["--max-retries", "0"])).expect_err("invalid");
        assert!(err.contains("--max-retries"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = AppConfig::try_from(serve_args(&["--request-timeout-secs", "0"]))
            .expect_err("invalid");
        assert!(err.contains("--request-timeout-secs"));
    }

    #[test]
    fn simulate_subcommand_parses_numbers() {
        let cli = Cli::try_parse_from([
            "fin-assist",
            "simulate",
            "--initial-amount",
            "1000",
            "--annual-rate",
            "5",
            "--years",
            "2",
        ])
        .expect("valid args");
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.initial_amount, 1000.0);
        assert_eq!(args.annual_rate, 5.0);
        assert_eq!(args.years, 2);
    }
}
