//! Plain-text and JSON rendering for CLI commands.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use draftlab_core::consensus::{ConsensusTable, SourceRanking};
use draftlab_core::data::RankCache;
use draftlab_core::registry::SourceInfo;
use draftlab_core::{analyze, AnalyticsOptions, DraftInsight};
use draftlab_runner::{DroppedSource, SessionSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn dash_or<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

// ─── Rankings ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RankingReport<'a> {
    source: &'a str,
    homepage: &'a str,
    ranking: &'a SourceRanking,
    #[serde(skip_serializing_if = "Option::is_none")]
    insights: Option<Vec<DraftInsight>>,
}

pub fn print_ranking(
    ranking: &SourceRanking,
    homepage: &str,
    include_bye: bool,
    analytics: Option<&AnalyticsOptions>,
    format: OutputFormat,
) -> Result<()> {
    let insights = analytics.map(|opts| analyze(&ranking.records, opts));

    if format == OutputFormat::Json {
        return print_json(&RankingReport {
            source: ranking.source.as_str(),
            homepage,
            ranking,
            insights,
        });
    }

    let scoring = ranking.scoring().map_or("-", |s| s.as_str());
    println!();
    println!("=== {} ({scoring}) ===", ranking.source);
    println!("Source:    {homepage}");
    println!("Generated: {}", chrono::Local::now().date_naive());
    println!();

    let mut header = format!("{:>5}  {:<28} {:<4} {:<5}", "Rank", "Player", "Pos", "Team");
    if include_bye {
        header.push_str(&format!(" {:>3}", "Bye"));
    }
    if insights.is_some() {
        header.push_str(&format!(" {:>4} {:>5} {:>8}", "Tier", "PosRk", "VORP"));
    }
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for (i, r) in ranking.records.iter().enumerate() {
        let mut line = format!(
            "{:>5}  {:<28} {:<4} {:<5}",
            r.rank(),
            r.player_name(),
            r.position(),
            dash_or(r.team())
        );
        if include_bye {
            line.push_str(&format!(" {:>3}", dash_or(r.bye_week())));
        }
        if let Some(ins) = insights.as_ref().and_then(|v| v.get(i)) {
            line.push_str(&format!(" {:>4} {:>5} {:>8.4}", ins.tier, ins.pos_rank, ins.vorp));
        }
        println!("{line}");
    }
    println!();
    println!("{} players", ranking.records.len());
    Ok(())
}

// ─── Consensus ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct ConsensusReport<'a> {
    table: &'a ConsensusTable,
    dropped: &'a [DroppedSource],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    biggest_differences: Vec<DiffRow<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    insights: Option<Vec<DraftInsight>>,
}

#[derive(Serialize)]
struct DiffRow<'a> {
    player_name: &'a str,
    position: &'a str,
    delta: i64,
}

pub fn print_consensus(
    table: &ConsensusTable,
    dropped: &[DroppedSource],
    diffs: usize,
    analytics: Option<&AnalyticsOptions>,
    format: OutputFormat,
) -> Result<()> {
    let insights = analytics.map(|opts| analyze(table.rows(), opts));
    let pair = match table.sources() {
        [a, b, ..] => Some((a.as_str(), b.as_str())),
        _ => None,
    };
    let biggest: Vec<DiffRow<'_>> = match pair {
        Some((a, b)) if diffs > 0 => table
            .biggest_differences(a, b)
            .into_iter()
            .take(diffs)
            .map(|(row, delta)| DiffRow {
                player_name: &row.player_name,
                position: row.position.as_str(),
                delta,
            })
            .collect(),
        _ => Vec::new(),
    };

    if format == OutputFormat::Json {
        return print_json(&ConsensusReport {
            table,
            dropped,
            biggest_differences: biggest,
            insights,
        });
    }

    let sources: Vec<&str> = table.sources().iter().map(|s| s.as_str()).collect();
    println!();
    println!("=== Consensus ({}) ===", table.scoring());
    println!("Sources: {}", sources.join(", "));
    for d in dropped {
        println!("Dropped: {d}");
    }
    println!();

    let mut header = format!("{:>4}  {:<28} {:<4} {:<5}", "#", "Player", "Pos", "Team");
    for s in &sources {
        header.push_str(&format!(" {:>14}", truncate(s, 14)));
    }
    header.push_str(&format!(" {:>7}", "Avg"));
    if pair.is_some() {
        header.push_str(&format!(" {:>6}", "Delta"));
    }
    if insights.is_some() {
        header.push_str(&format!(" {:>4} {:>8}", "Tier", "VORP"));
    }
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for (i, row) in table.rows().iter().enumerate() {
        let mut line = format!(
            "{:>4}  {:<28} {:<4} {:<5}",
            row.consensus_position,
            row.player_name,
            row.position,
            dash_or(row.team.as_deref())
        );
        for s in &sources {
            line.push_str(&format!(" {:>14}", dash_or(row.rank_for(s))));
        }
        line.push_str(&format!(" {:>7.2}", row.consensus_rank));
        if let Some((a, b)) = pair {
            line.push_str(&format!(" {:>6}", dash_or(row.delta(a, b))));
        }
        if let Some(ins) = insights.as_ref().and_then(|v| v.get(i)) {
            line.push_str(&format!(" {:>4} {:>8.4}", ins.tier, ins.vorp));
        }
        println!("{line}");
    }

    if let (Some((a, b)), false) = (pair, biggest.is_empty()) {
        println!();
        println!("--- Biggest differences ({a} vs {b}) ---");
        for d in &biggest {
            println!("{:<28} {:<4} {:>+6}", d.player_name, d.position, d.delta);
        }
    }
    println!();
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

// ─── Sources ─────────────────────────────────────────────────────────

pub fn print_sources(
    sources: &[SourceInfo],
    settings: &SessionSettings,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(sources);
    }
    println!("{:<18} {:<15} {:<8} {:>8}  Homepage", "Id", "Kind", "Scoring", "TTL");
    println!("{}", "-".repeat(72));
    for s in sources {
        println!(
            "{:<18} {:<15} {:<8} {:>7}s  {}",
            s.id,
            s.kind,
            if s.honors_scoring { "yes" } else { "ignored" },
            settings.ttl_for(s.id.as_str()).as_secs(),
            s.homepage
        );
    }
    Ok(())
}

// ─── Cache ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CacheRow {
    key: String,
    records: usize,
    fetched_at: String,
    age_secs: i64,
    ttl_secs: u64,
    fresh: bool,
}

pub fn print_cache_status(
    cache: &RankCache,
    cache_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let now = cache.now();
    let mut rows: Vec<CacheRow> = cache
        .entries()?
        .into_iter()
        .map(|e| {
            let age_secs = e.age_secs(now);
            CacheRow {
                fresh: e.is_fresh(now, std::time::Duration::from_secs(e.ttl_secs)),
                records: e.payload.len(),
                fetched_at: e.fetched_at.to_rfc3339(),
                ttl_secs: e.ttl_secs,
                key: e.key,
                age_secs,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    if format == OutputFormat::Json {
        return print_json(&rows);
    }

    let location = cache_dir.map_or_else(|| "(memory)".to_string(), |d| d.display().to_string());
    if rows.is_empty() {
        println!("Cache is empty: {location}");
        return Ok(());
    }

    println!("Cache: {location}");
    println!("Entries: {}", rows.len());
    println!();
    println!("{:<60} {:>7} {:>9} {:>6}", "Key", "Players", "Age", "Fresh");
    println!("{}", "-".repeat(85));
    for r in &rows {
        println!(
            "{:<60} {:>7} {:>9} {:>6}",
            truncate(&r.key, 60),
            r.records,
            format_age(r.age_secs),
            if r.fresh { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn format_age(secs: i64) -> String {
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{:.1}h", s as f64 / 3600.0),
        s => format!("{:.1}d", s as f64 / 86_400.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages_pick_a_readable_unit() {
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(600), "10m");
        assert_eq!(format_age(5400), "1.5h");
        assert_eq!(format_age(172_800), "2.0d");
    }

    #[test]
    fn long_ids_are_truncated_by_chars() {
        assert_eq!(truncate("espn-editorial", 14), "espn-editorial");
        assert_eq!(truncate("a-very-long-source-id", 6), "a-very");
    }
}
