use std::collections::HashMap;

use nt_core::{Article, ArticleId, ArticleQuery, ArticleStore, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Titles must be strictly more similar than this to count as duplicates.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// `1 - levenshtein / max_len` over raw, case-sensitive titles, measured in
/// characters. Two empty titles are identical.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / max_len as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateMark {
    pub duplicate: ArticleId,
    pub canonical: ArticleId,
    pub similarity: f64,
}

struct TitleProfile {
    len: usize,
    chars: HashMap<char, usize>,
}

impl TitleProfile {
    fn new(title: &str) -> Self {
        let mut chars = HashMap::new();
        for c in title.chars() {
            *chars.entry(c).or_insert(0) += 1;
        }
        Self {
            len: title.chars().count(),
            chars,
        }
    }

    /// A lower bound on the edit distance: every edit changes at most one
    /// character on each side of the multiset difference.
    fn distance_lower_bound(&self, other: &TitleProfile) -> usize {
        let only_here: usize = self
            .chars
            .iter()
            .map(|(c, n)| n.saturating_sub(*other.chars.get(c).unwrap_or(&0)))
            .sum();
        let only_there: usize = other
            .chars
            .iter()
            .map(|(c, n)| n.saturating_sub(*self.chars.get(c).unwrap_or(&0)))
            .sum();
        only_here.max(only_there)
    }

    fn could_match(&self, other: &TitleProfile) -> bool {
        let max_len = self.len.max(other.len);
        if max_len == 0 {
            return true;
        }
        let best_case = 1.0 - self.distance_lower_bound(other) as f64 / max_len as f64;
        best_case > SIMILARITY_THRESHOLD
    }
}

/// Title lengths outside this window cannot clear the threshold against a
/// title of `len` characters.
fn length_window(len: usize) -> (usize, usize) {
    let lo = ((len as f64) * SIMILARITY_THRESHOLD).floor() as usize;
    let hi = ((len as f64) / SIMILARITY_THRESHOLD).ceil() as usize;
    (lo.saturating_sub(1), hi + 1)
}

/// Marks near-duplicate articles inactive in place and returns what was
/// marked.
///
/// Pairs are visited as `(i, j)` with `i < j` in slice order. The newer (or
/// equally old) article of a matching pair becomes the duplicate, so on a
/// date tie article `i` is retired. Retired articles take no further part in
/// the pass. Pairs whose lengths or character counts rule out a match are
/// skipped without computing the edit distance; this never changes the
/// outcome.
pub fn mark_duplicates(articles: &mut [Article]) -> Vec<DuplicateMark> {
    let profiles: Vec<TitleProfile> = articles
        .iter()
        .map(|a| TitleProfile::new(&a.title))
        .collect();
    let mut by_len: Vec<usize> = (0..articles.len()).collect();
    by_len.sort_by_key(|&k| profiles[k].len);

    let mut retired = vec![false; articles.len()];
    let mut marks = Vec::new();

    for i in 0..articles.len() {
        if retired[i] {
            continue;
        }
        let (lo, hi) = length_window(profiles[i].len);
        let start = by_len.partition_point(|&k| profiles[k].len < lo);
        let end = by_len.partition_point(|&k| profiles[k].len <= hi);
        let mut candidates: Vec<usize> = by_len[start..end]
            .iter()
            .copied()
            .filter(|&j| j > i)
            .collect();
        candidates.sort_unstable();

        for j in candidates {
            if retired[j] || !profiles[i].could_match(&profiles[j]) {
                continue;
            }
            let similarity = title_similarity(&articles[i].title, &articles[j].title);
            if similarity <= SIMILARITY_THRESHOLD {
                continue;
            }
            let (duplicate, canonical) = if articles[i].published_at >= articles[j].published_at {
                (i, j)
            } else {
                (j, i)
            };
            let canonical_id = articles[canonical].id;
            articles[duplicate].mark_duplicate_of(canonical_id);
            retired[duplicate] = true;
            marks.push(DuplicateMark {
                duplicate: articles[duplicate].id,
                canonical: canonical_id,
                similarity,
            });
            debug!(
                duplicate = %articles[duplicate].title,
                canonical = %articles[canonical].title,
                similarity,
                "near-duplicate found"
            );
            if duplicate == i {
                break;
            }
        }
    }
    marks
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    pub scanned: usize,
    pub marked: usize,
    pub failed: usize,
    /// True when another pass held the lock and this one did nothing.
    pub skipped: bool,
}

/// Batch near-duplicate detection over the active corpus. Passes never
/// overlap: a call made while another is in progress returns at once.
#[derive(Debug, Default)]
pub struct DedupEngine {
    lock: Mutex<()>,
}

impl DedupEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run(&self, store: &dyn ArticleStore) -> Result<DedupReport> {
        let Ok(_guard) = self.lock.try_lock() else {
            info!("🧹 dedup pass already running, skipping");
            return Ok(DedupReport {
                skipped: true,
                ..DedupReport::default()
            });
        };

        let mut articles = store.query_articles(&ArticleQuery::active()).await?;
        let marks = mark_duplicates(&mut articles);
        let mut report = DedupReport {
            scanned: articles.len(),
            ..DedupReport::default()
        };

        for mark in &marks {
            match store.mark_duplicate(mark.duplicate, mark.canonical).await {
                Ok(()) => report.marked += 1,
                Err(e) => {
                    warn!(article = %mark.duplicate, error = %e, "failed to save duplicate mark");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            marked = report.marked,
            failed = report.failed,
            "🧹 dedup pass finished"
        );
        Ok(report)
    }
}
