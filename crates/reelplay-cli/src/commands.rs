//! CLI command implementations

use crate::output::{self, OutputFormat};
use console::style;
use reelplay_core::{
    EpisodeList, HttpProbe, HttpRepository, PlayerConfig, Reachability, VideoRepository,
};

/// Resolve an episode field and print the result
pub fn episodes(field: &str, format: OutputFormat) -> anyhow::Result<()> {
    let list = EpisodeList::resolve(field);

    if format == OutputFormat::Text {
        println!("Episodes: {}", list.len());
    }
    if !list.is_empty() || format == OutputFormat::Json {
        println!("{}", output::episodes(&list, format));
    }
    Ok(())
}

/// Fetch one video and print its metadata and episodes
pub async fn video(config: &PlayerConfig, id: i64, format: OutputFormat) -> anyhow::Result<()> {
    let repository = HttpRepository::new(config)?;
    let video = repository.fetch_video(id).await?;

    if format == OutputFormat::Json {
        println!("{}", output::to_json(&video));
        return Ok(());
    }

    let list = EpisodeList::resolve(&video.video_url);
    println!("{}", style(&video.video_title).bold());
    println!("  ID: {}", video.video_id);
    if let Some(ref category) = video.video_category {
        println!("  Category: {}", category);
    }
    if let Some(ref duration) = video.video_duration {
        println!("  Duration: {}", duration);
    }
    if let Some(plays) = video.play_count_label() {
        println!("  Plays: {}", plays);
    }
    if let Some(coins) = video.video_coins.filter(|&c| c > 0) {
        println!("  Coins: {}", coins);
    }

    println!("\nEpisodes ({}):", list.len());
    if !list.is_empty() {
        println!("{}", output::episodes(&list, format));
    }
    Ok(())
}

/// List one page of a category
pub async fn list(
    config: &PlayerConfig,
    category: &str,
    limit: u32,
    offset: u32,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let repository = HttpRepository::new(config)?;
    let videos = repository
        .fetch_videos_by_category(category, limit, offset)
        .await?;

    if format != OutputFormat::Json {
        println!("Category '{}' ({} videos, offset {}):", category, videos.len(), offset);
    }
    println!("{}", output::videos(&videos, format));
    Ok(())
}

/// Run the reachability probe once
pub async fn probe(config: &PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let probe = HttpProbe::new(config)?;
    let result = probe.is_reachable().await;

    if format == OutputFormat::Json {
        let value = match result {
            Ok(reachable) => serde_json::json!({ "url": probe.url().as_str(), "reachable": reachable }),
            Err(ref e) => serde_json::json!({ "url": probe.url().as_str(), "error": e.to_string() }),
        };
        println!("{}", output::to_json(&value));
        return Ok(());
    }

    print!("Probing {}... ", probe.url());
    match result {
        Ok(true) => println!("{}", style("reachable").green()),
        Ok(false) => println!("{}", style("unreachable").red()),
        Err(e) => println!("{} ({})", style("check failed").yellow(), e),
    }
    Ok(())
}
