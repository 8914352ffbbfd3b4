//! Title unlock table
//!
//! Display titles unlock as the diary grows. A tier is unlocked once the
//! number of saved outfits reaches its threshold.

/// One unlockable display title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleTier {
    /// Number of outfit entries required
    pub threshold: u32,
    pub label: &'static str,
}

const fn tier(threshold: u32, label: &'static str) -> TitleTier {
    TitleTier { threshold, label }
}

/// Standard tiers, ascending by threshold.
pub const STANDARD_TIERS: [TitleTier; 8] = [
    tier(1, "Fresh Fit"),
    tier(3, "Outfit Rookie"),
    tier(5, "Closet Explorer"),
    tier(10, "Style Regular"),
    tier(15, "Trend Spotter"),
    tier(30, "Fashion Enthusiast"),
    tier(60, "Style Icon"),
    tier(100, "Wardrobe Legend"),
];

/// Pure queries over an ordered tier list.
#[derive(Debug, Clone, Copy)]
pub struct TierTable<'a> {
    tiers: &'a [TitleTier],
}

impl TierTable<'static> {
    pub fn standard() -> Self {
        TierTable { tiers: &STANDARD_TIERS }
    }
}

impl<'a> TierTable<'a> {
    /// Wrap a tier list. The slice must be sorted ascending by threshold.
    pub fn new(tiers: &'a [TitleTier]) -> Self {
        debug_assert!(tiers.windows(2).all(|w| w[0].threshold <= w[1].threshold));
        TierTable { tiers }
    }

    pub fn tiers(&self) -> &'a [TitleTier] {
        self.tiers
    }

    /// All tiers whose threshold is at most `count`.
    pub fn unlocked(&self, count: u32) -> &'a [TitleTier] {
        let end = self.tiers.partition_point(|t| t.threshold <= count);
        &self.tiers[..end]
    }

    /// Lowest tier still locked at `count`, if any.
    pub fn next(&self, count: u32) -> Option<&'a TitleTier> {
        self.tiers.iter().find(|t| t.threshold > count)
    }

    /// Progress from the last unlocked threshold towards the next one.
    ///
    /// 0 for an empty table, 100 once everything is unlocked.
    pub fn progress_percent(&self, count: u32) -> u8 {
        if self.tiers.is_empty() {
            return 0;
        }
        let Some(next) = self.next(count) else {
            return 100;
        };
        let prev = self.unlocked(count).last().map_or(0, |t| t.threshold);
        let span = next.threshold.saturating_sub(prev);
        if span == 0 {
            return 100;
        }
        let done = count.saturating_sub(prev) as f64;
        let percent = (100.0 * done / span as f64).round();
        percent.clamp(0.0, 100.0) as u8
    }

    pub fn find(&self, label: &str) -> Option<&'a TitleTier> {
        self.tiers.iter().find(|t| t.label == label)
    }

    /// True when `label` names a tier unlocked at `count`.
    pub fn is_unlocked(&self, label: &str, count: u32) -> bool {
        self.find(label).is_some_and(|t| t.threshold <= count)
    }

    pub fn progress(&self, count: u32) -> TitleProgress<'a> {
        TitleProgress {
            count,
            unlocked: self.unlocked(count),
            next: self.next(count),
            percent: self.progress_percent(count),
        }
    }
}

/// Everything the profile screen shows about title progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleProgress<'a> {
    pub count: u32,
    pub unlocked: &'a [TitleTier],
    pub next: Option<&'a TitleTier>,
    pub percent: u8,
}

impl TitleProgress<'_> {
    /// Outfits still needed for the next tier.
    pub fn remaining(&self) -> Option<u32> {
        self.next.map(|t| t.threshold - self.count)
    }
}

pub fn unlocked_tiers(count: u32) -> &'static [TitleTier] {
    TierTable::standard().unlocked(count)
}

pub fn next_tier(count: u32) -> Option<&'static TitleTier> {
    TierTable::standard().next(count)
}

pub fn progress_percent(count: u32) -> u8 {
    TierTable::standard().progress_percent(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds(tiers: &[TitleTier]) -> Vec<u32> {
        tiers.iter().map(|t| t.threshold).collect()
    }

    #[test]
    fn test_nothing_unlocked_at_zero() {
        assert!(unlocked_tiers(0).is_empty());
        assert_eq!(progress_percent(0), 0);
        assert_eq!(next_tier(0).map(|t| t.threshold), Some(1));
    }

    #[test]
    fn test_exactly_on_a_threshold() {
        assert_eq!(thresholds(unlocked_tiers(5)), vec![1, 3, 5]);
        assert_eq!(next_tier(5).map(|t| t.threshold), Some(10));
        assert_eq!(progress_percent(5), 0);
    }

    #[test]
    fn test_progress_between_tiers_rounds() {
        // 10 -> 15: 2 of 5
        assert_eq!(progress_percent(12), 40);
        // 1 -> 3: 1 of 2
        assert_eq!(progress_percent(2), 50);
        // 30 -> 60: 11 of 30 = 36.67
        assert_eq!(progress_percent(41), 37);
    }

    #[test]
    fn test_everything_unlocked() {
        assert_eq!(unlocked_tiers(100).len(), STANDARD_TIERS.len());
        assert!(next_tier(100).is_none());
        assert_eq!(progress_percent(100), 100);
        assert_eq!(progress_percent(5000), 100);
    }

    #[test]
    fn test_empty_table() {
        let table = TierTable::new(&[]);
        assert_eq!(table.progress_percent(0), 0);
        assert_eq!(table.progress_percent(42), 0);
        assert!(table.next(3).is_none());
        assert!(table.unlocked(3).is_empty());
    }

    #[test]
    fn test_is_unlocked_by_label() {
        let table = TierTable::standard();
        assert!(table.is_unlocked("Fresh Fit", 1));
        assert!(!table.is_unlocked("Style Icon", 59));
        assert!(!table.is_unlocked("Not A Title", 1000));
    }

    #[test]
    fn test_progress_summary() {
        let progress = TierTable::standard().progress(7);
        assert_eq!(progress.unlocked.len(), 3);
        assert_eq!(progress.next.map(|t| t.label), Some("Style Regular"));
        assert_eq!(progress.remaining(), Some(3));
        assert_eq!(progress.percent, 40);
    }
}
