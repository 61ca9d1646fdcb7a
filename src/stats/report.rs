//! Result formatting.

use serde::Serialize;

use crate::accel::AccelMetadata;
use crate::dataset::from_fixed;
use crate::stats::{GroupGeometry, Statistics};

/// Everything reported at the end of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub statistics: Statistics,
    pub accel: AccelMetadata,
    /// Absent for the scalar path, which does not partition.
    pub geometry: Option<GroupGeometry>,
}

impl Summary {
    pub fn min_celsius(&self) -> f64 {
        from_fixed(self.statistics.min as f64)
    }

    pub fn max_celsius(&self) -> f64 {
        from_fixed(self.statistics.max as f64)
    }

    pub fn mean_celsius(&self) -> f64 {
        from_fixed(self.statistics.mean)
    }
}

/// Format a summary as a human-readable report.
pub fn format_summary(summary: &Summary) -> String {
    let stats = &summary.statistics;
    let mut out = String::new();

    out.push_str(&format!(
        "Running on {} ({})\n",
        summary.accel.device, summary.accel.path_used
    ));
    if let Some(g) = &summary.geometry {
        out.push_str(&format!(
            "{} records, {} group{} of {} ({} padding)\n",
            stats.count,
            g.group_count,
            if g.group_count == 1 { "" } else { "s" },
            g.group_size,
            g.padding_count,
        ));
    } else {
        out.push_str(&format!("{} records\n", stats.count));
    }

    out.push_str("___________________________________________\n");
    out.push_str(&format!(
        "Minimum temperature within the dataset:\t{:.1}\n",
        summary.min_celsius()
    ));
    out.push_str(&format!(
        "Highest temperature within the dataset:\t{:.1}\n",
        summary.max_celsius()
    ));
    out.push_str(&format!(
        "Average temperature within the dataset:\t{:.2}\n",
        summary.mean_celsius()
    ));

    out.push_str(&format!(
        "\nHistogram ({} bins):\n",
        stats.histogram.nr_bins()
    ));
    for (i, count) in stats.histogram.counts.iter().enumerate() {
        let (lo, hi) = stats.histogram.bin_range(i);
        out.push_str(&format!(
            "  [{:>7.2}, {:>7.2}{} {}\n",
            from_fixed(lo),
            from_fixed(hi),
            if i + 1 == stats.histogram.nr_bins() { "]" } else { ")" },
            count
        ));
    }

    out.push_str(&format!(
        "\nCompleted in {:.3} ms\n",
        summary.accel.duration_us as f64 / 1000.0
    ));
    out
}
