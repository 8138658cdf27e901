//! Threshold policies deciding whether a data instance or a candidate
//! micro-cluster is explained by a reference set of summaries.

use crate::cluster::{self, MicroCluster};
use crate::point::DataInstance;

/// The outcome of a classification: the index of the nearest summary in
/// the reference set, when the set was not empty, and whether the
/// target was explained by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    closest: Option<usize>,
    explained: bool,
}

impl Classification {
    pub fn new(closest: Option<usize>, explained: bool) -> Self {
        Classification { closest, explained }
    }

    fn unexplained() -> Self {
        Classification {
            closest: None,
            explained: false,
        }
    }

    /// Index of the nearest summary in the reference set.
    pub fn closest(&self) -> Option<usize> {
        self.closest
    }

    pub fn is_explained(&self) -> bool {
        self.explained
    }

    /// The nearest index when the target was explained.
    pub fn explained_by(&self) -> Option<usize> {
        if self.explained {
            self.closest
        } else {
            None
        }
    }
}

/// A rule classifying a single data instance against a reference set.
pub trait InstanceDecisionRule {
    fn classify(&self, target: &DataInstance, clusters: &[MicroCluster]) -> Classification;
}

/// A rule classifying a candidate micro-cluster against a reference set.
pub trait ClusterDecisionRule {
    fn classify(&self, target: &MicroCluster, clusters: &[MicroCluster]) -> Classification;
}

/// Explains an instance when its distance to the nearest summary is at
/// most `factor` times the summary's standard deviation.
pub struct InstanceDeviationRule {
    factor: f64,
}

impl InstanceDeviationRule {
    pub fn new(factor: f64) -> Self {
        InstanceDeviationRule { factor }
    }
}

impl InstanceDecisionRule for InstanceDeviationRule {
    fn classify(&self, target: &DataInstance, clusters: &[MicroCluster]) -> Classification {
        let nearest = match cluster::closest(target.point(), clusters) {
            Some(i) => i,
            None => return Classification::unexplained(),
        };
        let distance = clusters[nearest].distance_to(target.point());
        let explained = distance <= clusters[nearest].standard_deviation() * self.factor;
        Classification::new(Some(nearest), explained)
    }
}

/// Explains a candidate when its distance to the nearest summary is
/// strictly under `factor` times the summary's standard deviation.
pub struct ClusterDeviationRule {
    factor: f64,
}

impl ClusterDeviationRule {
    pub fn new(factor: f64) -> Self {
        ClusterDeviationRule { factor }
    }
}

impl ClusterDecisionRule for ClusterDeviationRule {
    fn classify(&self, target: &MicroCluster, clusters: &[MicroCluster]) -> Classification {
        let nearest = match cluster::closest(&target.centroid(), clusters) {
            Some(i) => i,
            None => return Classification::unexplained(),
        };
        let distance = clusters[nearest].distance(target);
        let explained = distance < clusters[nearest].standard_deviation() * self.factor;
        Classification::new(Some(nearest), explained)
    }
}

/// Thresholds on the largest distance from the nearest summary to any
/// reference summary sharing its label and category. When no other
/// summary shares that identity the rule falls back to `factor` times
/// the nearest summary's standard deviation.
pub struct MaxIdentityDistanceRule {
    factor: f64,
}

impl MaxIdentityDistanceRule {
    pub fn new(factor: f64) -> Self {
        MaxIdentityDistanceRule { factor }
    }
}

impl ClusterDecisionRule for MaxIdentityDistanceRule {
    fn classify(&self, target: &MicroCluster, clusters: &[MicroCluster]) -> Classification {
        let nearest = match cluster::closest(&target.centroid(), clusters) {
            Some(i) => i,
            None => return Classification::unexplained(),
        };
        let mut max_distance = 0.;
        let mut seen = false;
        for other in same_identity(&clusters[nearest], clusters) {
            let distance = clusters[nearest].distance(other);
            if distance > max_distance {
                max_distance = distance;
                seen = true;
            }
        }
        let threshold = if seen {
            max_distance
        } else {
            clusters[nearest].standard_deviation() * self.factor
        };
        let explained = clusters[nearest].distance(target) < threshold;
        Classification::new(Some(nearest), explained)
    }
}

/// Thresholds on the mean distance from the nearest summary to every
/// reference summary sharing its label and category. The nearest
/// summary takes part in its own average, contributing a zero distance;
/// the fallback is the same as for `MaxIdentityDistanceRule`.
pub struct MeanIdentityDistanceRule {
    factor: f64,
}

impl MeanIdentityDistanceRule {
    pub fn new(factor: f64) -> Self {
        MeanIdentityDistanceRule { factor }
    }
}

impl ClusterDecisionRule for MeanIdentityDistanceRule {
    fn classify(&self, target: &MicroCluster, clusters: &[MicroCluster]) -> Classification {
        let nearest = match cluster::closest(&target.centroid(), clusters) {
            Some(i) => i,
            None => return Classification::unexplained(),
        };
        let mut count = 0;
        let mut distance_sum = 0.;
        for other in same_identity(&clusters[nearest], clusters) {
            count += 1;
            distance_sum += clusters[nearest].distance(other);
        }
        let threshold = if count > 0 {
            distance_sum / count as f64
        } else {
            clusters[nearest].standard_deviation() * self.factor
        };
        let explained = clusters[nearest].distance(target) < threshold;
        Classification::new(Some(nearest), explained)
    }
}

/// Thresholds on the sum of the standard deviations of the target and
/// of the nearest summary. No factor.
pub struct PooledDeviationRule;

impl PooledDeviationRule {
    pub fn new() -> Self {
        PooledDeviationRule
    }
}

impl Default for PooledDeviationRule {
    fn default() -> Self {
        PooledDeviationRule::new()
    }
}

impl ClusterDecisionRule for PooledDeviationRule {
    fn classify(&self, target: &MicroCluster, clusters: &[MicroCluster]) -> Classification {
        let nearest = match cluster::closest(&target.centroid(), clusters) {
            Some(i) => i,
            None => return Classification::unexplained(),
        };
        let distance = clusters[nearest].distance(target);
        let threshold = clusters[nearest].standard_deviation() + target.standard_deviation();
        let explained = distance < threshold;
        Classification::new(Some(nearest), explained)
    }
}

fn same_identity<'a>(
    nearest: &'a MicroCluster,
    clusters: &'a [MicroCluster],
) -> impl Iterator<Item = &'a MicroCluster> {
    clusters
        .iter()
        .filter(move |c| c.label() == nearest.label() && c.category() == nearest.category())
}

#[cfg(test)]
mod tests {
    use crate::cluster::Category;
    use crate::decision::*;

    fn summary(points: &[(f64, f64)], label: &str, first_timestamp: i64) -> MicroCluster {
        let instances: Vec<DataInstance> = points
            .iter()
            .enumerate()
            .map(|(i, (x, y))| DataInstance::new(vec![*x, *y], label, first_timestamp + i as i64))
            .collect();
        let mut cluster = MicroCluster::from_instances(&instances).unwrap();
        cluster.set_label(label);
        cluster.set_category(Category::Known);
        cluster
    }

    #[test]
    fn test_empty_reference_set_is_unexplained() {
        let target = DataInstance::new(vec![0., 0.], "a", 1);
        let classification = InstanceDeviationRule::new(1.1).classify(&target, &[]);
        assert_eq!(None, classification.closest());
        assert!(!classification.is_explained());
        assert_eq!(None, classification.explained_by());
    }

    #[test]
    fn test_instance_deviation_rule() {
        // centroid (0.5, 0.5), standard deviation 1/sqrt(2)
        let reference = vec![summary(&[(0., 0.), (1., 1.)], "a", 1)];
        let rule = InstanceDeviationRule::new(1.);
        let near = DataInstance::new(vec![0.5, 1.], "a", 10);
        assert!(rule.classify(&near, &reference).is_explained());
        let far = DataInstance::new(vec![3., 3.], "a", 11);
        let classification = rule.classify(&far, &reference);
        assert!(!classification.is_explained());
        assert_eq!(Some(0), classification.closest());
    }

    #[test]
    fn test_instance_deviation_rule_threshold_is_inclusive() {
        let reference = vec![summary(&[(0., 0.), (2., 0.)], "a", 1)];
        // standard deviation 1, instance exactly at distance 1
        let rule = InstanceDeviationRule::new(1.);
        let target = DataInstance::new(vec![2., 0.], "a", 10);
        assert!(rule.classify(&target, &reference).is_explained());
    }

    #[test]
    fn test_cluster_deviation_rule_threshold_is_strict() {
        let reference = vec![summary(&[(0., 0.), (2., 0.)], "a", 1)];
        let rule = ClusterDeviationRule::new(1.);
        // singleton at distance exactly 1 from the reference centroid
        let target = summary(&[(2., 0.)], "b", 10);
        assert!(!rule.classify(&target, &reference).is_explained());
        let near = summary(&[(1.5, 0.)], "b", 11);
        assert!(rule.classify(&near, &reference).is_explained());
    }

    #[test]
    fn test_max_identity_distance_rule() {
        let reference = vec![
            summary(&[(0., 0.)], "a", 1),
            summary(&[(6., 0.)], "a", 2),
            summary(&[(0., 100.)], "b", 3),
        ];
        let rule = MaxIdentityDistanceRule::new(1.);
        // nearest is the first summary, farthest same identity is at 6
        let target = summary(&[(3., 0.)], "c", 10);
        assert!(rule.classify(&target, &reference).is_explained());
        let far = summary(&[(0., -7.)], "c", 11);
        assert!(!rule.classify(&far, &reference).is_explained());
    }

    #[test]
    fn test_max_identity_distance_rule_falls_back_without_peers() {
        // a single summary of its identity: its own zero distance never
        // registers, so the deviation fallback applies
        let reference = vec![summary(&[(0., 0.), (2., 0.)], "a", 1)];
        let rule = MaxIdentityDistanceRule::new(2.);
        let target = summary(&[(2.5, 0.)], "b", 10);
        assert!(rule.classify(&target, &reference).is_explained());
        let far = summary(&[(3.5, 0.)], "b", 11);
        assert!(!rule.classify(&far, &reference).is_explained());
    }

    #[test]
    fn test_mean_identity_distance_rule_includes_nearest_itself() {
        let reference = vec![
            summary(&[(0., 0.)], "a", 1),
            summary(&[(6., 0.)], "a", 2),
            summary(&[(0., 100.)], "b", 3),
        ];
        let rule = MeanIdentityDistanceRule::new(1.);
        // mean over {0, 6} = 3, so a target at distance 3 is not
        // explained but one at 2.9 is
        let at_mean = summary(&[(0., 3.)], "c", 10);
        assert!(!rule.classify(&at_mean, &reference).is_explained());
        let below = summary(&[(0., 2.9)], "c", 11);
        assert!(rule.classify(&below, &reference).is_explained());
    }

    #[test]
    fn test_pooled_deviation_rule() {
        let reference = vec![summary(&[(0., 0.), (2., 0.)], "a", 1)];
        let rule = PooledDeviationRule::new();
        // reference deviation 1, target deviation 1, distance 1.9
        let target = summary(&[(1.9, 0.), (3.9, 0.)], "b", 10);
        assert!(rule.classify(&target, &reference).is_explained());
        // same deviations, distance 2
        let far = summary(&[(2., 0.), (4., 0.)], "b", 12);
        assert!(!rule.classify(&far, &reference).is_explained());
    }
}
