use clap::Parser;

use ti_purge::domain::filter::{DEFAULT_SORT_KEY, DEFAULT_SOURCE, MAX_CONFIDENCE};
use ti_purge::domain::workspace::{DEFAULT_API_VERSION, DEFAULT_BASE_URL};
use ti_purge::{Endpoints, Filter, PurgeConfig, SortOrder, SortSpec, Workspace};

/// Upper bound for `--timeout-secs`: one day.
const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Parser, Debug)]
#[command(
    name = "ti-purge",
    version,
    about = "Delete threat intelligence indicators from a Microsoft Sentinel workspace"
)]
pub struct Cli {
    #[arg(long, env = "TI_PURGE_SUBSCRIPTION", help = "Azure subscription id")]
    pub subscription: String,

    #[arg(
        long,
        visible_alias = "resourceGroup",
        env = "TI_PURGE_RESOURCE_GROUP",
        help = "Azure resource group"
    )]
    pub resource_group: String,

    #[arg(long, env = "TI_PURGE_WORKSPACE", help = "Sentinel workspace name")]
    pub workspace: String,

    #[arg(
        long = "source",
        env = "TI_PURGE_SOURCE",
        default_value = DEFAULT_SOURCE,
        help = "Threat intelligence sources, comma separated"
    )]
    pub sources: String,

    #[arg(
        long,
        visible_alias = "minConfidence",
        env = "TI_PURGE_MIN_CONFIDENCE",
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=MAX_CONFIDENCE as i64),
        help = "Minimum confidence"
    )]
    pub min_confidence: u8,

    #[arg(
        long,
        visible_alias = "maxConfidence",
        env = "TI_PURGE_MAX_CONFIDENCE",
        default_value_t = 50,
        value_parser = clap::value_parser!(u8).range(0..=MAX_CONFIDENCE as i64),
        help = "Maximum confidence"
    )]
    pub max_confidence: u8,

    #[arg(
        long,
        env = "TI_PURGE_PAGE_SIZE",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Indicators listed (and deleted) per cycle"
    )]
    pub page_size: u32,

    #[arg(long, env = "TI_PURGE_SORT_BY", default_value = DEFAULT_SORT_KEY)]
    pub sort_by: String,

    #[arg(long, env = "TI_PURGE_SORT_ORDER", default_value = "descending")]
    pub sort_order: SortOrder,

    #[arg(
        long,
        env = "TI_PURGE_MAX_CONCURRENCY",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Cap on concurrent deletes (default: one per listed indicator)"
    )]
    pub max_concurrency: Option<u32>,

    #[arg(long, env = "TI_PURGE_CYCLE_DELAY_MS", default_value_t = 1000)]
    pub cycle_delay_ms: u64,

    #[arg(
        long,
        env = "TI_PURGE_TIMEOUT_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(0..=MAX_TIMEOUT_SECS),
        help = "Per-request timeout in seconds, at most one day; 0 disables it"
    )]
    pub timeout_secs: u64,

    #[arg(long, env = "TI_PURGE_ENDPOINT", default_value = DEFAULT_BASE_URL)]
    pub endpoint: String,

    #[arg(long, env = "TI_PURGE_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    #[arg(
        long,
        env = "TI_PURGE_ACCESS_TOKEN",
        hide_env_values = true,
        help = "Bearer token to use instead of `az account get-access-token`"
    )]
    pub access_token: Option<String>,
}

impl Cli {
    pub fn filter(&self) -> ti_purge::Result<Filter> {
        Filter::builder()
            .sources_csv(&self.sources)
            .confidence(self.min_confidence, self.max_confidence)
            .page_size(self.page_size)
            .sort_by(SortSpec::new(self.sort_by.clone(), self.sort_order))
            .build()
    }

    pub fn endpoints(&self) -> ti_purge::Result<Endpoints> {
        let workspace = Workspace::new(
            self.subscription.clone(),
            self.resource_group.clone(),
            self.workspace.clone(),
        )?;
        Ok(Endpoints::new(workspace)
            .with_base_url(self.endpoint.clone())
            .with_api_version(self.api_version.clone()))
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        (self.timeout_secs > 0).then_some(self.timeout_secs.saturating_mul(1000))
    }

    pub fn purge_config(&self) -> PurgeConfig {
        PurgeConfig {
            cycle_delay_ms: self.cycle_delay_ms,
            max_concurrency: self.max_concurrency.map(|n| n as usize),
            ..PurgeConfig::default()
        }
    }
}
