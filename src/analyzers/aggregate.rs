use crate::analyzers::grade::{Expectation, band, expectation};
use crate::analyzers::types::{
    AchievementRecord, Distribution, DistributionBucket, DistributionSet, Target,
};
use crate::analyzers::utility::{pct, summarize};
use crate::config::WeightConfig;

/// Aggregates [`AchievementRecord`]s into one [`DistributionSet`] per
/// objective plus one for the aggregate degree.
///
/// Only students with a record are classified; excluded students never enter
/// the denominator of a percentage.
pub fn aggregate(records: &[AchievementRecord], config: &WeightConfig) -> Distribution {
    let sets = Target::ALL
        .into_iter()
        .map(|target| {
            let degrees: Vec<f64> = records.iter().map(|r| r.degree(target)).collect();
            distribution_set(target, &degrees, config)
        })
        .collect();
    Distribution { sets }
}

fn distribution_set(target: Target, degrees: &[f64], config: &WeightConfig) -> DistributionSet {
    let total = degrees.len();

    let meets = degrees
        .iter()
        .filter(|&&d| expectation(d, config.expectation_threshold) == Expectation::Meets)
        .count();
    let expectation = [(Expectation::Meets, meets), (Expectation::Below, total - meets)]
        .into_iter()
        .map(|(e, count)| bucket(e.label(), count, total))
        .collect();

    let mut band_counts = vec![0usize; config.bands.len()];
    for &degree in degrees {
        if let Some(i) = band(degree, &config.bands) {
            band_counts[i] += 1;
        }
    }
    let bands = config
        .bands
        .iter()
        .zip(band_counts)
        .map(|(spec, count)| bucket(&spec.label, count, total))
        .collect();

    DistributionSet {
        target,
        classified: total,
        expectation,
        bands,
        summary: summarize(degrees),
    }
}

fn bucket(label: &str, count: usize, total: usize) -> DistributionBucket {
    DistributionBucket {
        label: label.to_string(),
        count,
        percentage: pct(count, total),
    }
}
