// ============================================================================
// Merged history windowing
// ============================================================================
//
// History is one newest-first sequence stitched from two stores: the hot
// cache holds the newest `redis_count` messages, the durable store holds the
// rest. Positions are zero-based from the newest message:
//
//   position:  0 .. redis_count-1     redis_count .. total-1
//   store:     hot cache (ZREVRANGE)  durable store (offset = position - redis_count)
//
// Page p covers positions [(p-1)*limit, p*limit-1], clipped to the sequence.
//
// ============================================================================

use pairchat_error::{AppError, AppResult};

/// Where one page of merged history comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Page lies past the end of the sequence
    Empty,
    /// Read hot cache positions `start..=stop` (newest first)
    Hot { start: u64, stop: u64 },
    /// Read hot positions `hot_start..=hot_stop`, then `cold_take` durable
    /// messages from offset 0
    Straddle {
        hot_start: u64,
        hot_stop: u64,
        cold_take: u64,
    },
    /// Read `take` durable messages starting at `offset`
    Cold { offset: u64, take: u64 },
}

/// A resolved page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_page: u64,
    pub window: Window,
}

/// Normalize a page number: anything below 1 means the first page
pub fn normalize_page(page: Option<i64>) -> u32 {
    match page {
        Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
        _ => 1,
    }
}

/// Map `(page, limit)` onto the hot and cold stores.
///
/// `redis_count` is clamped to `total`. `limit` must be positive.
pub fn resolve_window(
    total: u64,
    redis_count: u64,
    page: u32,
    limit: u32,
) -> AppResult<ResolvedWindow> {
    if limit == 0 {
        return Err(AppError::validation("limit must be greater than 0"));
    }
    let page = page.max(1);
    let limit_u64 = limit as u64;
    let redis_count = redis_count.min(total);
    let total_page = total.div_ceil(limit_u64);

    let start = (page as u64 - 1).saturating_mul(limit_u64);
    let window = if start >= total {
        Window::Empty
    } else {
        let end = start.saturating_add(limit_u64 - 1).min(total - 1);
        if end < redis_count {
            Window::Hot { start, stop: end }
        } else if start < redis_count {
            Window::Straddle {
                hot_start: start,
                hot_stop: redis_count - 1,
                cold_take: end - redis_count + 1,
            }
        } else {
            Window::Cold {
                offset: start - redis_count,
                take: end - start + 1,
            }
        }
    };

    Ok(ResolvedWindow {
        page,
        limit,
        total,
        total_page,
        window,
    })
}
