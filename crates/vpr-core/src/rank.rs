use crate::config::CategoryThresholds;
use crate::model::{RankedFinding, RpiCategory};

/// Primary deterministic order: RPI descending, tie-break key ascending.
///
/// Total given distinct stable ids: the key's trailing id field separates
/// records whose every other signal coincides.
pub fn primary_sort(items: &mut [RankedFinding]) {
    items.sort_by(|a, b| {
        b.scores.rpi.total_cmp(&a.scores.rpi).then_with(|| a.key.cmp(&b.key))
    });
}

/// Assign 1-based ranks and RPI categories in the current order.
pub fn assign_ranks(items: &mut [RankedFinding], thresholds: &CategoryThresholds) {
    for (idx, item) in items.iter_mut().enumerate() {
        item.rank = idx + 1;
        item.category = categorize(item.scores.rpi, thresholds);
    }
}

pub fn categorize(rpi: f64, thresholds: &CategoryThresholds) -> RpiCategory {
    if rpi >= thresholds.critical {
        RpiCategory::Critical
    } else if rpi >= thresholds.high {
        RpiCategory::High
    } else if rpi >= thresholds.medium {
        RpiCategory::Medium
    } else if rpi >= thresholds.low {
        RpiCategory::Low
    } else {
        RpiCategory::Minimal
    }
}
