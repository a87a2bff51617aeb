//! Configuration types for tenant-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Seed list parsing and cloud endpoint selection

use crate::directory::graph::{GraphConfig, MAX_PAGE_SIZE};
use crate::error::ConfigError;
use crate::walker::WalkOptions;
use clap::{Parser, ValueEnum};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Maximum reasonable worker count
const MAX_WORKERS: usize = 512;

/// Maximum retries per request
const MAX_RETRIES: u32 = 10;

/// Default expansion concurrency per phase
pub const DEFAULT_WORKERS: usize = 20;

/// Crawl the group and role membership graph reachable from seed accounts
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tenant-walker",
    version,
    about = "Crawl the group and role membership graph reachable from seed accounts",
    long_about = "Starting from one or more seed users, repeatedly queries the directory for \
                  group, role and administrative unit memberships and for the members of every \
                  group found, until nothing new is discovered.\n\n\
                  Results are written as seven comma separated tables named after the tenant.",
    after_help = "EXAMPLES:\n    \
        tenant-walker -t contoso.onmicrosoft.com alice@contoso.com\n    \
        tenant-walker -t contoso.onmicrosoft.com 'alice@contoso.com,bob@contoso.com' -w 8\n    \
        tenant-walker -t contoso.onmicrosoft.com --seeds-file seeds.txt -o out/ --cloud us-gov"
)]
pub struct CliArgs {
    /// Seed accounts (object ids or principal names, comma or newline separated)
    #[arg(value_name = "SEEDS")]
    pub seeds: Option<String>,

    /// Read additional seed accounts from a file
    #[arg(long, value_name = "FILE")]
    pub seeds_file: Option<PathBuf>,

    /// Tenant being crawled; also prefixes every output file
    #[arg(short, long, value_name = "TENANT")]
    pub tenant: String,

    /// Directory receiving the output tables
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Maximum concurrent directory queries per phase
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// Bearer token for the directory API
    #[arg(long, env = "TENANT_WALKER_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub token: String,

    /// Cloud hosting the tenant
    #[arg(long, value_enum, default_value_t = CloudEnvironment::Global)]
    pub cloud: CloudEnvironment,

    /// Override the directory API host (takes precedence over --cloud)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Directory API version segment
    #[arg(long, default_value = "v1.0", value_name = "VERSION")]
    pub api_version: String,

    /// Page size for collection requests
    #[arg(long, default_value_t = MAX_PAGE_SIZE, value_name = "NUM")]
    pub page_size: u32,

    /// Request timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    pub timeout: u64,

    /// Retry attempts for throttled or transiently failing requests
    #[arg(long, default_value = "3", value_name = "NUM")]
    pub retries: u32,

    /// Log a progress line every NUM processed objects
    #[arg(long, default_value = "1000", value_name = "NUM")]
    pub progress_every: u64,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show per-object errors and anomalies)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// National cloud hosting the tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CloudEnvironment {
    /// Worldwide commercial cloud
    Global,
    /// US Government cloud
    UsGov,
    /// China cloud operated by 21Vianet
    China,
}

impl CloudEnvironment {
    /// Directory API host for this cloud
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            CloudEnvironment::Global => "https://graph.microsoft.com",
            CloudEnvironment::UsGov => "https://graph.microsoft.us",
            CloudEnvironment::China => "https://microsoftgraph.chinacloudapi.cn",
        }
    }
}

/// Split a seed list on commas and newlines
///
/// Entries are trimmed, empty entries dropped and exact duplicates
/// removed while keeping first-seen order.
pub fn parse_seeds(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .split(&[',', '\n'][..])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(String::from)
        .collect()
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Tenant being crawled
    pub tenant: String,

    /// Seed accounts, in the order given
    pub seeds: Vec<String>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Concurrent expansions per phase
    pub worker_count: usize,

    /// Directory API settings
    pub graph: GraphConfig,

    /// Progress log interval
    pub progress_every: u64,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let tenant = args.tenant.trim().to_string();
        if tenant.is_empty() {
            return Err(ConfigError::MissingTenant);
        }
        if tenant.contains(&['/', '\\', '\0'][..]) {
            return Err(ConfigError::InvalidTenant { tenant });
        }

        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        if args.page_size == 0 || args.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidPageSize {
                size: args.page_size,
                max: MAX_PAGE_SIZE,
            });
        }

        if args.timeout == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if args.retries > MAX_RETRIES {
            return Err(ConfigError::InvalidRetries {
                count: args.retries,
                max: MAX_RETRIES,
            });
        }

        // Collect seeds from the positional list and the seed file
        let mut raw_seeds = args.seeds.clone().unwrap_or_default();
        if let Some(ref path) = args.seeds_file {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SeedsFile {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            raw_seeds.push('\n');
            raw_seeds.push_str(&content);
        }
        let seeds = parse_seeds(&raw_seeds);
        if seeds.is_empty() {
            return Err(ConfigError::NoSeeds);
        }

        if !args.output_dir.is_dir() {
            return Err(ConfigError::InvalidOutputDir {
                path: args.output_dir.clone(),
                reason: "directory does not exist".to_string(),
            });
        }

        let host = args
            .endpoint
            .as_deref()
            .unwrap_or_else(|| args.cloud.graph_endpoint());
        let base_url = format!(
            "{}/{}",
            host.trim_end_matches('/'),
            args.api_version.trim_matches('/')
        );

        let graph = GraphConfig::new(&base_url, args.token)?
            .with_page_size(args.page_size)
            .with_timeout(Duration::from_secs(args.timeout))
            .with_retries(args.retries, Duration::from_secs(1));

        Ok(Self {
            tenant,
            seeds,
            output_dir: args.output_dir,
            worker_count: args.workers,
            graph,
            progress_every: args.progress_every,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }

    /// Options handed to the crawler core
    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            concurrency: self.worker_count,
            progress_every: self.progress_every,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["tenant-walker", "--token", "t", "-t", "contoso"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_seeds_separators() {
        let seeds = parse_seeds("alice, bob\ncarol,,\n  \n");
        assert_eq!(seeds, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_parse_seeds_dedup_keeps_order() {
        let seeds = parse_seeds("bob,alice,bob");
        assert_eq!(seeds, vec!["bob", "alice"]);
    }

    #[test]
    fn test_parse_seeds_case_sensitive() {
        let seeds = parse_seeds("Alice,alice");
        assert_eq!(seeds.len(), 2);
    }

    #[test]
    fn test_parse_seeds_crlf() {
        let seeds = parse_seeds("alice\r\nbob\r\n");
        assert_eq!(seeds, vec!["alice", "bob"]);
    }

    #[test]
    fn test_defaults() {
        let config = WalkConfig::from_args(args(&["alice"])).unwrap();
        assert_eq!(config.worker_count, DEFAULT_WORKERS);
        assert_eq!(config.graph.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.graph.base_url.as_str(), "https://graph.microsoft.com/v1.0");
        assert_eq!(config.progress_every, 1000);
        assert!(config.show_progress);
    }

    #[test]
    fn test_cloud_endpoint() {
        let config = WalkConfig::from_args(args(&["--cloud", "us-gov", "alice"])).unwrap();
        assert_eq!(config.graph.base_url.as_str(), "https://graph.microsoft.us/v1.0");

        let config =
            WalkConfig::from_args(args(&["--endpoint", "http://localhost:8080/", "alice"])).unwrap();
        assert_eq!(config.graph.base_url.as_str(), "http://localhost:8080/v1.0");
    }

    #[test]
    fn test_invalid_worker_count() {
        let err = WalkConfig::from_args(args(&["-w", "0", "alice"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkerCount { .. }));
    }

    #[test]
    fn test_tenant_with_path_separator() {
        let argv = ["tenant-walker", "--token", "t", "-t", "../contoso", "alice"];
        let err = WalkConfig::from_args(CliArgs::try_parse_from(argv).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTenant { .. }));

        let argv = ["tenant-walker", "--token", "t", "-t", "a\\b", "alice"];
        let err = WalkConfig::from_args(CliArgs::try_parse_from(argv).unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTenant { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = WalkConfig::from_args(args(&["--timeout", "0", "alice"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn test_retries_bounded() {
        let err = WalkConfig::from_args(args(&["--retries", "11", "alice"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRetries { count: 11, max: 10 }));

        let config = WalkConfig::from_args(args(&["--retries", "10", "alice"])).unwrap();
        assert_eq!(config.graph.max_retries, 10);
    }

    #[test]
    fn test_no_seeds() {
        let err = WalkConfig::from_args(args(&[" , "])).unwrap_err();
        assert!(matches!(err, ConfigError::NoSeeds));
    }

    #[test]
    fn test_seeds_file_merged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.txt");
        std::fs::write(&path, "bob\ncarol\nalice\n").unwrap();

        let config = WalkConfig::from_args(args(&[
            "--seeds-file",
            path.to_str().unwrap(),
            "alice",
        ]))
        .unwrap();
        assert_eq!(config.seeds, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_missing_output_dir() {
        let err = WalkConfig::from_args(args(&["-o", "/nonexistent/tenant-walker", "alice"]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOutputDir { .. }));
    }
}
