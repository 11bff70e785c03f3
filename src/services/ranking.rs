//! Ranking service
//!
//! Search, trending and the follow feed:
//! - Search is scored inside the database (see `search_contents`)
//! - Trending is scored here from views, likes, comments and age
//! - The feed and the statistics come from the read-model views

use crate::cache::{trending_key, CacheLayer, MemoryCache, TRENDING_PATTERN};
use crate::config::RankingConfig;
use crate::db::repositories::{ContentRepository, StatsRepository};
use crate::models::{Content, EngagementRow, ListParams, PagedResult, SearchHit, TrendingContent, User};
use crate::services::content::ContentServiceError;
use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Ordering;
use std::sync::Arc;

/// Upper bound on trending candidates scored per request
const TRENDING_CANDIDATES: i64 = 1000;

/// Longest accepted search query, in characters
pub const MAX_QUERY_LEN: usize = 200;

/// Hours added to the age so brand-new items do not divide by ~zero
const AGE_OFFSET_HOURS: f64 = 2.0;

pub struct RankingService {
    contents: Arc<dyn ContentRepository>,
    stats: Arc<dyn StatsRepository>,
    cache: Arc<MemoryCache>,
    cache_ttl: std::time::Duration,
    config: RankingConfig,
}

impl RankingService {
    pub fn new(
        contents: Arc<dyn ContentRepository>,
        stats: Arc<dyn StatsRepository>,
        cache: Arc<MemoryCache>,
        cache_ttl: std::time::Duration,
        config: RankingConfig,
    ) -> Self {
        Self {
            contents,
            stats,
            cache,
            cache_ttl,
            config,
        }
    }

    /// Relevance-ranked search over published content
    pub async fn search(
        &self,
        query: &str,
        params: &ListParams,
    ) -> Result<PagedResult<SearchHit>, ContentServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ContentServiceError::Validation("Search query is required".to_string()));
        }
        if query.chars().count() > MAX_QUERY_LEN {
            return Err(ContentServiceError::Validation(format!(
                "Search query must be at most {} characters",
                MAX_QUERY_LEN
            )));
        }

        let hits = self
            .contents
            .search(query, params.limit, params.offset, Utc::now())
            .await
            .context("Failed to search content")?;
        let total = self
            .contents
            .count_search(query)
            .await
            .context("Failed to count search results")?;

        tracing::debug!(query, total, "Search executed");
        Ok(PagedResult::new(hits, total, params))
    }

    /// Trending content inside the configured window, best first.
    ///
    /// Pages are cached for the cache TTL.
    pub async fn trending(
        &self,
        params: &ListParams,
    ) -> Result<PagedResult<TrendingContent>, ContentServiceError> {
        let key = trending_key(params.limit, params.offset);
        if let Some(page) = self
            .cache
            .get::<PagedResult<TrendingContent>>(&key)
            .await
            .ok()
            .flatten()
        {
            return Ok(page);
        }

        let now = Utc::now();
        let since = TimeDelta::try_days(self.config.trending_window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::UNIX_EPOCH);
        let rows = self
            .stats
            .engagement_since(since, TRENDING_CANDIDATES)
            .await
            .context("Failed to load trending candidates")?;

        let ranked = rank_trending(rows, &self.config, now);
        let total = ranked.len() as i64;
        let page = PagedResult::new(params.apply(ranked), total, params);

        if let Err(e) = self.cache.set(&key, &page, self.cache_ttl).await {
            tracing::warn!("Failed to cache trending page: {}", e);
        }
        Ok(page)
    }

    /// Published content from the accounts `user` follows, newest first
    pub async fn feed(
        &self,
        user: &User,
        params: &ListParams,
    ) -> Result<PagedResult<Content>, ContentServiceError> {
        let items = self
            .stats
            .feed(user.id, params.limit, params.offset)
            .await
            .context("Failed to load feed")?;
        let total = self
            .stats
            .count_feed(user.id)
            .await
            .context("Failed to count feed")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Rebuild the statistics read-models and drop cached rankings
    pub async fn refresh_stats(&self) -> Result<(), ContentServiceError> {
        self.stats.refresh().await.context("Failed to refresh statistics")?;
        if let Err(e) = self.cache.delete_pattern(TRENDING_PATTERN).await {
            tracing::warn!("Failed to invalidate trending cache: {}", e);
        }
        Ok(())
    }
}

/// Score and order trending candidates, best first.
///
/// Ties fall back to the newer publication, then the higher id.
pub fn rank_trending(rows: Vec<EngagementRow>, config: &RankingConfig, now: DateTime<Utc>) -> Vec<TrendingContent> {
    let mut ranked: Vec<TrendingContent> = rows
        .into_iter()
        .map(|row| {
            let published = row.content.published_at.unwrap_or(row.content.created_at);
            let age_hours = (now - published).num_seconds() as f64 / 3600.0;
            let score = trending_score(
                config,
                row.content.view_count,
                row.like_count,
                row.comment_count,
                age_hours,
            );
            TrendingContent {
                content: row.content,
                like_count: row.like_count,
                comment_count: row.comment_count,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.content.published_at.cmp(&a.content.published_at))
            .then_with(|| b.content.id.cmp(&a.content.id))
    });
    ranked
}

/// `popularity / (age_hours + 2) ^ gravity`, where popularity weighs views,
/// likes and comments. Negative ages (clock skew) count as zero.
pub fn trending_score(config: &RankingConfig, views: i64, likes: i64, comments: i64, age_hours: f64) -> f64 {
    let popularity = views as f64 * config.view_weight
        + likes as f64 * config.like_weight
        + comments as f64 * config.comment_weight;
    let age = age_hours.max(0.0) + AGE_OFFSET_HOURS;
    popularity / age.powf(config.gravity)
}
