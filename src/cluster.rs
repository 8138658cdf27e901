//! Mergeable sufficient statistics summarizing a group of instances,
//! the micro-cluster, plus the nearest-summary scan and the modified
//! silhouette used to validate candidate patterns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::NoveltyError;
use crate::point::{DataInstance, Point};

/// Whether a micro-cluster summarizes a concept seen during training or
/// one discovered online.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Known,
    Novelty,
}

/// A micro-cluster: per dimension linear sum and squared sum, a member
/// count, the member timestamps, and the label/category assigned by the
/// engine.
///
/// A freshly clustered summary carries an empty label and the `Known`
/// category as placeholders; the engine assigns both before the summary
/// enters any memory collection.
#[derive(Clone, Debug)]
pub struct MicroCluster {
    timestamp: i64,
    label: String,
    category: Category,
    n: usize,
    ls: Vec<f64>,
    ss: Vec<f64>,
    timestamps: HashSet<i64>,
}

impl MicroCluster {
    /// Builds a singleton summary from one instance.
    pub fn from_instance(instance: &DataInstance) -> Self {
        let dimensions = instance.len();
        let mut cluster = MicroCluster {
            timestamp: 0,
            label: String::new(),
            category: Category::Known,
            n: 0,
            ls: vec![0.; dimensions],
            ss: vec![0.; dimensions],
            timestamps: HashSet::new(),
        };
        cluster.absorb(instance);
        cluster
    }

    /// Folds a non-empty batch of instances into one summary.
    pub fn from_instances(instances: &[DataInstance]) -> Result<Self, NoveltyError> {
        let first = instances.first().ok_or(NoveltyError::EmptyBatch)?;
        let mut cluster = MicroCluster::from_instance(first);
        for instance in &instances[1..] {
            cluster.absorb(instance);
        }
        Ok(cluster)
    }

    /// Adds an instance to the statistics, records its membership and
    /// bumps the last update timestamp.
    pub fn absorb(&mut self, instance: &DataInstance) {
        for (i, x) in instance.values().iter().enumerate() {
            self.ls[i] += x;
            self.ss[i] += x * x;
        }
        self.n += 1;
        self.timestamps.insert(instance.timestamp());
        self.touch(instance);
    }

    /// Bumps the last update timestamp without touching the statistics.
    pub fn touch(&mut self, instance: &DataInstance) {
        self.timestamp = instance.timestamp();
    }

    /// The center of mass of the summarized instances.
    pub fn centroid(&self) -> Point {
        Point::new(self.ls.iter().map(|x| x / self.n as f64).collect())
    }

    /// The deviation of the summarized instances around the centroid,
    /// computed from the sufficient statistics. A slightly negative
    /// variance residue from rounding is clamped to zero.
    pub fn standard_deviation(&self) -> f64 {
        let n = self.n as f64;
        let variance: f64 = self
            .ls
            .iter()
            .zip(&self.ss)
            .map(|(ls, ss)| {
                let mean = ls / n;
                ss / n - mean * mean
            })
            .sum();
        variance.max(0.).sqrt()
    }

    /// Distance between the centroids of two summaries.
    pub fn distance(&self, other: &MicroCluster) -> f64 {
        self.centroid().distance(&other.centroid())
    }

    /// Distance between this summary's centroid and an arbitrary point.
    pub fn distance_to(&self, point: &Point) -> f64 {
        self.centroid().distance(point)
    }

    /// Sums the statistics of two summaries. The member count adds, the
    /// last update timestamp is the max of the two, and the identity
    /// (label and category) always comes from the first operand. Member
    /// timestamp sets are not merged.
    pub fn merge(a: &MicroCluster, b: &MicroCluster) -> MicroCluster {
        MicroCluster {
            timestamp: a.timestamp.max(b.timestamp),
            label: a.label.clone(),
            category: a.category,
            n: a.n + b.n,
            ls: a.ls.iter().zip(&b.ls).map(|(x, y)| x + y).collect(),
            ss: a.ss.iter().zip(&b.ss).map(|(x, y)| x + y).collect(),
            timestamps: a.timestamps.clone(),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The timestamps of the instances absorbed by this summary.
    pub fn timestamps(&self) -> &HashSet<i64> {
        &self.timestamps
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }
}

/// Finds the index of the summary whose centroid is nearest to the
/// given point. The scan is linear with a strict comparison, so the
/// first summary achieving the minimum wins ties.
pub fn closest(point: &Point, clusters: &[MicroCluster]) -> Option<usize> {
    let mut winner = None;
    let mut min_distance = f64::MAX;
    for (i, cluster) in clusters.iter().enumerate() {
        let distance = cluster.distance_to(point);
        if distance < min_distance {
            min_distance = distance;
            winner = Some(i);
        }
    }
    winner
}

/// Separation score of a candidate summary against a reference set:
/// `(b - a) / max(a, b)` where `a` is the candidate's own deviation and
/// `b` the distance to the nearest reference centroid. Not the
/// classical per-point silhouette.
pub fn silhouette(candidate: &MicroCluster, reference: &[MicroCluster]) -> f64 {
    let centroid = candidate.centroid();
    let a = candidate.standard_deviation();
    let b = match closest(&centroid, reference) {
        Some(i) => reference[i].distance_to(&centroid),
        None => f64::MAX,
    };
    (b - a) / a.max(b)
}
