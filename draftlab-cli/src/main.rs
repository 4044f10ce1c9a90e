//! DraftLab CLI: export, compare, source listing and cache management.
//!
//! Commands:
//! - `export`: one source's rankings as a plain-text table or JSON
//! - `compare`: consensus across sources with rank deltas
//! - `sources`: list registered sources
//! - `cache status`: report cached entries, their age and freshness
//! - `cache clear`: remove every cached entry

mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};

use draftlab_core::data::cache::{CacheStore, JsonFileStore, MemoryStore};
use draftlab_core::data::{CancelToken, FilterParams, PositionFilter, RankCache};
use draftlab_core::domain::{Position, ScoringMode};
use draftlab_core::{DraftlabConfig, JoinMode, MergeOptions, MissingRankPolicy};
use draftlab_runner::{CompareOutcome, FetchProgress, RankSession, StderrProgress};

use crate::output::OutputFormat;

const APP_DIR: &str = "draftlab";

#[derive(Parser)]
#[command(
    name = "draftlab",
    version,
    about = "DraftLab CLI: fantasy football rankings and consensus"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to a TOML config file. Defaults to <config dir>/draftlab/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory. Overrides the config file and the OS cache dir.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Keep the cache in memory only for this run.
    #[arg(long, global = true, default_value_t = false)]
    no_persist: bool,

    /// Emit JSON instead of plain-text tables.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct FilterArgs {
    /// Scoring format: standard, half, ppr.
    #[arg(long, default_value = "ppr")]
    scoring: ScoringMode,

    /// Positions to include (comma separated, e.g. QB,RB,WR).
    #[arg(long)]
    positions: Option<String>,

    /// Keep only these positions; wins over --positions.
    #[arg(long)]
    only: Option<String>,

    /// Positions to leave out.
    #[arg(long, conflicts_with_all = ["positions", "only"])]
    exclude: Option<String>,

    /// Cache TTL in seconds for this run.
    #[arg(long)]
    ttl: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one source's rankings.
    Export {
        /// Source id (see `draftlab sources`).
        #[arg(long, default_value = "espn-editorial")]
        source: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Max number of rows.
        #[arg(long, default_value_t = 300)]
        limit: usize,

        /// Omit the bye week column.
        #[arg(long, default_value_t = false)]
        no_bye: bool,

        /// Add tier, positional rank and VORP columns.
        #[arg(long, default_value_t = false)]
        insights: bool,
    },
    /// Build a consensus across sources.
    Compare {
        /// Comma separated source ids, in delta order.
        #[arg(long, default_value = "espn-editorial,sleeper-adp")]
        sources: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Max rows per source before merging.
        #[arg(long, default_value_t = 200)]
        limit: usize,

        /// Keep only players every source ranked.
        #[arg(long, default_value_t = false)]
        intersection: bool,

        /// Count a missing source as its list length + 1.
        #[arg(long, default_value_t = false)]
        penalize_missing: bool,

        /// Rows of the biggest-differences view (0 to skip).
        #[arg(long, default_value_t = 15)]
        diffs: usize,

        /// Add tier, positional rank and VORP columns.
        #[arg(long, default_value_t = false)]
        insights: bool,
    },
    /// List registered sources.
    Sources,
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached entries, their age and freshness.
    Status,
    /// Remove every cached entry.
    Clear {
        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "draftlab=info,draftlab_core=info,draftlab_runner=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = if cli.global.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };

    if let Some(path) = cli.global.config.as_deref() {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
    }
    let config_path = cli.global.config.clone().or_else(default_config_path);
    let config = DraftlabConfig::load(config_path.as_deref())?;
    debug!(?config_path, "configuration loaded");

    let (cache, cache_dir) = open_cache(&cli.global, &config)?;
    let result = dispatch(cli.command, &config, Arc::clone(&cache), cache_dir.as_deref(), format);

    if let Err(e) = cache.flush() {
        warn!("cache flush failed: {e}");
    }
    result
}

fn dispatch(
    command: Commands,
    config: &DraftlabConfig,
    cache: Arc<RankCache>,
    cache_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Export {
            source,
            filter,
            limit,
            no_bye,
            insights,
        } => {
            let session = build_session(config, cache, filter.ttl)?;
            let params = filter_params(&filter, Some(limit))?;
            let ranking =
                session.fetch_source(&source, filter.scoring, &params, &CancelToken::new())?;
            let provider = session.registry().resolve(&source)?;
            let analytics = insights.then(|| config.analytics_options());
            output::print_ranking(
                &ranking,
                provider.homepage(),
                !no_bye,
                analytics.as_ref(),
                format,
            )
        }
        Commands::Compare {
            sources,
            filter,
            limit,
            intersection,
            penalize_missing,
            diffs,
            insights,
        } => {
            let session = build_session(config, cache, filter.ttl)?;
            let params = filter_params(&filter, Some(limit))?;
            let ids: Vec<&str> = sources
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if ids.is_empty() {
                bail!("--sources must name at least one source");
            }
            let options = MergeOptions {
                join: if intersection {
                    JoinMode::Intersection
                } else {
                    JoinMode::Union
                },
                missing: if penalize_missing {
                    MissingRankPolicy::Penalize
                } else {
                    MissingRankPolicy::Skip
                },
            };
            let progress: Option<&dyn FetchProgress> = match format {
                OutputFormat::Plain => Some(&StderrProgress),
                OutputFormat::Json => None,
            };
            let outcome = session.compare(
                &ids,
                filter.scoring,
                &params,
                &options,
                &CancelToken::new(),
                progress,
            )?;
            for dropped in outcome.dropped() {
                warn!(source = %dropped.source_id, "source dropped: {}", dropped.error);
            }
            let analytics = insights.then(|| config.analytics_options());
            match &outcome {
                CompareOutcome::Consensus { table, dropped } => {
                    output::print_consensus(table, dropped, diffs, analytics.as_ref(), format)
                }
                CompareOutcome::SingleSource { ranking, .. } => {
                    eprintln!(
                        "Only '{}' returned data; showing its rankings without consensus.",
                        ranking.source
                    );
                    let homepage = session
                        .registry()
                        .resolve(ranking.source.as_str())
                        .map(|p| p.homepage().to_string())
                        .unwrap_or_default();
                    output::print_ranking(ranking, &homepage, true, analytics.as_ref(), format)
                }
            }
        }
        Commands::Sources => {
            let session = build_session(config, cache, None)?;
            output::print_sources(&session.registry().describe(), session.settings(), format)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => output::print_cache_status(&cache, cache_dir, format),
            CacheAction::Clear { confirm } => run_cache_clear(&cache, cache_dir, confirm),
        },
    }
}

fn build_session(
    config: &DraftlabConfig,
    cache: Arc<RankCache>,
    ttl: Option<u64>,
) -> Result<RankSession> {
    let mut config = config.clone();
    if let Some(secs) = ttl {
        config.cache.default_ttl_secs = secs;
        config.sources.clear();
    }
    Ok(RankSession::from_config(&config, cache)?)
}

fn open_cache(
    global: &GlobalArgs,
    config: &DraftlabConfig,
) -> Result<(Arc<RankCache>, Option<PathBuf>)> {
    let policy = config.cache_policy();
    if global.no_persist {
        let cache = RankCache::new(Arc::new(MemoryStore::new())).with_policy(policy);
        return Ok((Arc::new(cache), None));
    }
    let dir = global
        .cache_dir
        .clone()
        .or_else(|| config.cache.dir.clone())
        .or_else(|| dirs::cache_dir().map(|d| d.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from(".draftlab-cache"));
    let store: Arc<dyn CacheStore> = Arc::new(
        JsonFileStore::open(&dir)
            .with_context(|| format!("opening cache directory {}", dir.display()))?,
    );
    Ok((Arc::new(RankCache::new(store).with_policy(policy)), Some(dir)))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

fn filter_params(filter: &FilterArgs, limit: Option<usize>) -> Result<FilterParams> {
    let positions = if let Some(only) = filter.only.as_deref().or(filter.positions.as_deref()) {
        PositionFilter::only(parse_positions(only)?)
    } else if let Some(exclude) = filter.exclude.as_deref() {
        PositionFilter::except(parse_positions(exclude)?)
    } else {
        PositionFilter::Any
    };
    let mut params = FilterParams::default().with_positions(positions);
    if let Some(limit) = limit.filter(|&l| l > 0) {
        params = params.with_limit(limit);
    }
    Ok(params)
}

fn parse_positions(list: &str) -> Result<Vec<Position>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Position::parse_loose(s).with_context(|| format!("in position list '{list}'")))
        .collect()
}

fn run_cache_clear(cache: &RankCache, cache_dir: Option<&Path>, confirm: bool) -> Result<()> {
    let location = cache_dir.map_or_else(|| "(memory)".to_string(), |d| d.display().to_string());
    let count = cache.entries()?.len();
    if count == 0 {
        println!("Cache is empty: {location}");
        return Ok(());
    }
    if !confirm {
        println!("Found {count} cached {} in {location}.", plural(count));
        println!();
        println!("Dry run: pass --confirm to actually delete.");
        return Ok(());
    }
    let removed = cache.clear()?;
    println!("Done. Removed {removed} {}.", plural(removed));
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "entry"
    } else {
        "entries"
    }
}
