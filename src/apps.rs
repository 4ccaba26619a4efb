use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum, error::ErrorKind};

use crate::config::PoolConfig;
use crate::constants::auth::BEARER_PREFIX;
use crate::data::{Category, NumberRecord};
use crate::filter::{
    FilterCriteria, FilterSettings, filter_records, location_counts, lucky_pattern_counts,
};
use crate::pattern::{RangeRole, highlight_segments};
use crate::service::NumberService;
use crate::store::FileBlobStore;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Ordinary,
    Special,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Ordinary => Category::Ordinary,
            CategoryArg::Special => Category::Special,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "update_numbers",
    disable_help_subcommand = true,
    about = "Run one fetch/merge/enrich update cycle",
    long_about = "Fetch both categories from upstream in repeated batches, merge them into the persisted snapshot, fill missing locations, and save.",
    after_help = "Settings not given on the command line are read from NUMBER_POOL_* environment variables, then defaults."
)]
struct UpdateNumbersCli {
    #[arg(
        long,
        value_name = "TOKEN",
        help = "Bearer token presented to the update trigger"
    )]
    token: Option<String>,
    #[arg(
        long = "batch-count",
        value_parser = parse_positive_usize,
        help = "Sequential requests per category"
    )]
    batch_count: Option<usize>,
    #[arg(
        long = "batch-delay-ms",
        value_name = "MILLIS",
        help = "Pause between consecutive requests"
    )]
    batch_delay_ms: Option<u64>,
    #[arg(
        long = "store-path",
        value_name = "STORE_PATH",
        help = "Optional path for the persisted blob store file"
    )]
    store_path: Option<PathBuf>,
    #[arg(
        long = "store-dir",
        value_name = "DIR",
        conflicts_with = "store_path",
        help = "Optional directory for the persisted blob store (uses blobs.bin filename)"
    )]
    store_dir: Option<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(
    name = "query_numbers",
    disable_help_subcommand = true,
    about = "List active numbers with filters and highlighting",
    long_about = "Read the active records of one category, apply suffix, token, lucky-pattern and location filters, and print them with matches highlighted.",
    after_help = "Highlight markers: [..] pattern group, (..) filler digit, <..> include token."
)]
/// CLI for `query_numbers`.
///
/// Common usage:
/// - Numbers containing 888 or 520: `--include 888,520`
/// - Pairs sharing the last four digits of the mainland number: `--suffix 4 --no-primary`
/// - Show per-pattern and per-city counts: `--counts`
struct QueryNumbersCli {
    #[arg(long, value_enum, default_value = "ordinary", help = "Category to read")]
    category: CategoryArg,
    #[arg(
        long,
        default_value = "",
        help = "Tokens that must appear (comma or whitespace separated)"
    )]
    include: String,
    #[arg(
        long,
        default_value = "",
        help = "Tokens that must not appear (comma or whitespace separated)"
    )]
    exclude: String,
    #[arg(
        long,
        default_value_t = 0,
        help = "Keep only numbers sharing this many trailing digits with another"
    )]
    suffix: usize,
    #[arg(
        long,
        default_value = "",
        help = "Lucky pattern: AAAA, AABB, ABAB, AAAB, ABBB, AAXBB, ascending, descending, any"
    )]
    pattern: String,
    #[arg(long = "no-primary", help = "Do not match against the primary number")]
    no_primary: bool,
    #[arg(
        long = "no-secondary",
        help = "Do not match against the secondary number"
    )]
    no_secondary: bool,
    #[arg(
        long,
        default_value = "",
        help = "Province or city substring (case-sensitive)"
    )]
    location: String,
    #[arg(long, help = "Print at most this many records")]
    limit: Option<usize>,
    #[arg(long, help = "Print the filtered records as JSON")]
    json: bool,
    #[arg(long, help = "Print per-pattern and per-city result counts")]
    counts: bool,
    #[arg(
        long = "store-path",
        value_name = "STORE_PATH",
        help = "Optional path for the persisted blob store file"
    )]
    store_path: Option<PathBuf>,
    #[arg(
        long = "store-dir",
        value_name = "DIR",
        conflicts_with = "store_path",
        help = "Optional directory for the persisted blob store (uses blobs.bin filename)"
    )]
    store_dir: Option<PathBuf>,
}

impl QueryNumbersCli {
    fn filter_settings(&self) -> FilterSettings {
        FilterSettings {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            suffix: self.suffix.to_string(),
            lucky_pattern: self.pattern.clone(),
            match_primary: !self.no_primary,
            match_secondary: !self.no_secondary,
            location: self.location.clone(),
        }
    }
}

/// Run `update_numbers` with CLI args (excluding the program name).
pub fn run_update_numbers<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<UpdateNumbersCli, _>(
        std::iter::once("update_numbers".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let mut config = PoolConfig::from_env()?;
    if let Some(batch_count) = cli.batch_count {
        config.batch_count = batch_count;
    }
    if let Some(delay) = cli.batch_delay_ms {
        config.batch_delay = std::time::Duration::from_millis(delay);
    }
    config.store_path = resolve_store_path(cli.store_path, cli.store_dir, config.store_path);

    println!("Persisting snapshot to {}", config.store_path.display());
    let service = NumberService::from_config(&config)?;
    let authorization = cli.token.map(|token| format!("{BEARER_PREFIX}{token}"));
    let response = service.trigger_update(authorization.as_deref());
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        return Err(response
            .error
            .unwrap_or_else(|| "update failed".to_string())
            .into());
    }
    Ok(())
}

/// Run `query_numbers` with CLI args (excluding the program name).
pub fn run_query_numbers<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let Some(cli) = parse_cli::<QueryNumbersCli, _>(
        std::iter::once("query_numbers".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };

    let criteria = FilterCriteria::parse(&cli.filter_settings())?;
    let mut config = PoolConfig::from_env()?;
    config.store_path = resolve_store_path(
        cli.store_path.clone(),
        cli.store_dir.clone(),
        config.store_path,
    );

    let service = NumberService::from_config(&config)?;
    let category: Category = cli.category.into();
    let read = service.read(category);
    let filtered = filter_records(&read.data, &criteria);
    let shown = cli.limit.unwrap_or(filtered.len()).min(filtered.len());

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&filtered[..shown])?);
    } else {
        println!(
            "{} active {} numbers, {} matching (last updated {})",
            read.data.len(),
            category,
            filtered.len(),
            read.last_updated.to_rfc3339()
        );
        for record in &filtered[..shown] {
            println!("{}", render_record(record, &criteria));
        }
    }

    if cli.counts {
        println!();
        println!("Lucky patterns:");
        for (pattern, count) in lucky_pattern_counts(&read.data, &criteria) {
            println!("  {:<12} {count}", pattern.id());
        }
        println!("Cities:");
        for (city, count) in location_counts(&read.data, &criteria) {
            println!("  {city:<12} {count}");
        }
    }

    service.flush_write_backs();
    Ok(())
}

fn resolve_store_path(
    path: Option<PathBuf>,
    dir: Option<PathBuf>,
    fallback: PathBuf,
) -> PathBuf {
    if let Some(path) = path {
        path
    } else if let Some(dir) = dir {
        FileBlobStore::default_path_in_dir(dir)
    } else {
        fallback
    }
}

/// One output line: highlighted numbers plus location when known.
fn render_record(record: &NumberRecord, criteria: &FilterCriteria) -> String {
    let highlight = |number: &str, enabled: bool| {
        if enabled {
            render_highlighted(number, criteria)
        } else {
            number.to_string()
        }
    };
    let mut line = highlight(&record.primary_id, criteria.targets.primary);
    if !record.secondary_id.is_empty() {
        line.push_str("  ");
        line.push_str(&highlight(&record.secondary_id, criteria.targets.secondary));
    }
    match (&record.province, &record.city) {
        (Some(province), Some(city)) => line.push_str(&format!("  {province} {city}")),
        (None, Some(place)) | (Some(place), None) => line.push_str(&format!("  {place}")),
        (None, None) => {}
    }
    line
}

fn render_highlighted(number: &str, criteria: &FilterCriteria) -> String {
    highlight_segments(number, criteria.lucky_pattern, &criteria.include_tokens)
        .into_iter()
        .map(|segment| match segment.role {
            None => segment.text,
            Some(RangeRole::Filler) => format!("({})", segment.text),
            Some(RangeRole::Include) => format!("<{}>", segment.text),
            Some(RangeRole::Run | RangeRole::First | RangeRole::Second) => {
                format!("[{}]", segment.text)
            }
        })
        .collect()
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw.parse::<usize>().map_err(|_| {
        format!(
            "Could not parse --batch-count value '{}' as a positive integer",
            raw
        )
    })?;
    if parsed == 0 {
        return Err("--batch-count must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}
