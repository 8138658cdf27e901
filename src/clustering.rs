//! The clustering strategies used to build micro-clusters from a batch
//! of instances: KMeans with deterministic farthest point seeding,
//! KMeans++ with D² sampling, and the two phase CluStream buffer.

use std::cell::RefCell;

use rand::rngs::StdRng;
use rand::Rng;

use crate::cluster::{self, MicroCluster};
use crate::error::NoveltyError;
use crate::point::{DataInstance, Point};

/// A strategy turning a batch of instances into micro-clusters. Empty
/// clusters are discarded from the output.
pub trait ClusteringStrategy {
    fn cluster(&self, instances: &[DataInstance]) -> Result<Vec<MicroCluster>, NoveltyError>;
}

/// KMeans with deterministic seeding: the first instance seeds the
/// first centroid, then each next centroid is the instance farthest
/// from the already chosen ones.
pub struct KMeans {
    k: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        KMeans { k }
    }
}

impl ClusteringStrategy for KMeans {
    fn cluster(&self, instances: &[DataInstance]) -> Result<Vec<MicroCluster>, NoveltyError> {
        if instances.is_empty() {
            return Err(NoveltyError::EmptyBatch);
        }
        let seeds = farthest_seeds(instances, self.k);
        let clusters = refine(instances, seeds)?;
        summarize(clusters)
    }
}

/// KMeans++ : centroids are drawn with probability proportional to the
/// squared distance to the nearest already chosen centroid, using a
/// supplied random source for reproducibility.
pub struct KMeansPlusPlus {
    k: usize,
    rng: RefCell<StdRng>,
}

impl KMeansPlusPlus {
    pub fn new(k: usize, rng: StdRng) -> Self {
        KMeansPlusPlus {
            k,
            rng: RefCell::new(rng),
        }
    }
}

impl ClusteringStrategy for KMeansPlusPlus {
    fn cluster(&self, instances: &[DataInstance]) -> Result<Vec<MicroCluster>, NoveltyError> {
        kmeans_plus_plus(instances, self.k, &mut self.rng.borrow_mut())
    }
}

/// Two phase CluStream. Small batches fall back to KMeans++; larger
/// batches build an initial buffer over the offline prefix and stream
/// the remaining instances through it, absorbing each one into the
/// nearest summary when it falls under the dynamic radius, otherwise
/// merging the closest pair of summaries to make room for a new
/// singleton.
pub struct CluStream {
    training_size: usize,
    buffer_size: usize,
    rng: RefCell<StdRng>,
}

impl CluStream {
    pub fn new(training_size: usize, buffer_size: usize, rng: StdRng) -> Self {
        CluStream {
            training_size,
            buffer_size,
            rng: RefCell::new(rng),
        }
    }

    fn insert(instance: &DataInstance, buffer: &mut Vec<MicroCluster>) {
        let nearest = match cluster::closest(instance.point(), buffer) {
            Some(i) => i,
            None => {
                buffer.push(MicroCluster::from_instance(instance));
                return;
            }
        };
        let distance = buffer[nearest].distance_to(instance.point());
        let radius = if buffer[nearest].n() > 1 {
            buffer[nearest].standard_deviation() * 2.
        } else {
            singleton_radius(nearest, buffer)
        };
        if distance < radius {
            buffer[nearest].absorb(instance);
        } else {
            merge_closest_pair(buffer);
            buffer.push(MicroCluster::from_instance(instance));
        }
    }
}

impl ClusteringStrategy for CluStream {
    fn cluster(&self, instances: &[DataInstance]) -> Result<Vec<MicroCluster>, NoveltyError> {
        if instances.is_empty() {
            return Err(NoveltyError::EmptyBatch);
        }
        let mut rng = self.rng.borrow_mut();
        if instances.len() <= self.training_size {
            let k = instances.len().min(self.buffer_size);
            return kmeans_plus_plus(instances, k, &mut rng);
        }
        let (offline, online) = instances.split_at(self.training_size);
        let k = self.training_size.min(self.buffer_size);
        let mut buffer = kmeans_plus_plus(offline, k, &mut rng)?;
        for instance in online {
            CluStream::insert(instance, &mut buffer);
        }
        Ok(buffer)
    }
}

fn kmeans_plus_plus(
    instances: &[DataInstance],
    k: usize,
    rng: &mut StdRng,
) -> Result<Vec<MicroCluster>, NoveltyError> {
    if instances.is_empty() {
        return Err(NoveltyError::EmptyBatch);
    }
    let seeds = weighted_seeds(instances, k, rng);
    let clusters = refine(instances, seeds)?;
    summarize(clusters)
}

fn farthest_seeds(instances: &[DataInstance], k: usize) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    for _ in 0..k {
        let mut selected = &instances[0];
        let mut max_distance = 0.;
        for instance in &instances[1..] {
            let distance = distance_to_closest(instance, &centroids);
            if distance > max_distance {
                max_distance = distance;
                selected = instance;
            }
        }
        centroids.push(selected.point().clone());
    }
    centroids
}

fn weighted_seeds(instances: &[DataInstance], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    for _ in 0..k {
        let seed = select_weighted(instances, &centroids, rng);
        centroids.push(seed);
    }
    centroids
}

/// Draws the next seed by walking the cumulative D² probabilities with
/// a uniform sample, falling through to the last instance when every
/// weight is zero.
fn select_weighted(instances: &[DataInstance], centroids: &[Point], rng: &mut StdRng) -> Point {
    let mut weights: Vec<f64> = instances
        .iter()
        .map(|instance| {
            let distance = distance_to_closest(instance, centroids);
            distance * distance
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    if sum > 0. {
        for weight in &mut weights {
            *weight /= sum;
        }
    }
    let r: f64 = rng.gen();
    let mut cumulative = 0.;
    let mut selected = instances.len() - 1;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if r <= cumulative {
            selected = i;
            break;
        }
    }
    instances[selected].point().clone()
}

/// Lloyd refinement: assign, recompute, repeat until every recomputed
/// centroid already occurs in the previous centroid set. The exact
/// equality stopping criterion comes with a convergence risk under
/// rounding; callers rely on it being preserved.
fn refine(
    instances: &[DataInstance],
    mut centroids: Vec<Point>,
) -> Result<Vec<Vec<DataInstance>>, NoveltyError> {
    loop {
        let clusters = group_by_closest(instances, &centroids);
        let mut next = centroids.clone();
        for (i, cluster) in clusters.iter().enumerate() {
            if !cluster.is_empty() {
                next[i] = Point::centroid(cluster.iter().map(|instance| instance.point()))?;
            }
        }
        let converged = next.iter().all(|centroid| centroids.contains(centroid));
        centroids = next;
        if converged {
            return Ok(clusters);
        }
    }
}

fn group_by_closest(instances: &[DataInstance], centroids: &[Point]) -> Vec<Vec<DataInstance>> {
    let mut clusters: Vec<Vec<DataInstance>> = centroids.iter().map(|_| vec![]).collect();
    for instance in instances {
        if let Some(i) = closest_centroid(instance, centroids) {
            clusters[i].push(instance.clone());
        }
    }
    clusters
}

fn closest_centroid(instance: &DataInstance, centroids: &[Point]) -> Option<usize> {
    let mut winner = None;
    let mut min_distance = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let distance = instance.distance(centroid);
        if distance < min_distance {
            min_distance = distance;
            winner = Some(i);
        }
    }
    winner
}

fn distance_to_closest(instance: &DataInstance, centroids: &[Point]) -> f64 {
    match closest_centroid(instance, centroids) {
        Some(i) => instance.distance(&centroids[i]),
        None => 0.,
    }
}

fn summarize(clusters: Vec<Vec<DataInstance>>) -> Result<Vec<MicroCluster>, NoveltyError> {
    clusters
        .iter()
        .filter(|cluster| !cluster.is_empty())
        .map(|cluster| MicroCluster::from_instances(cluster))
        .collect()
}

/// The radius proxy for a singleton summary: distance from its centroid
/// to the next nearest summary in the buffer.
fn singleton_radius(index: usize, buffer: &[MicroCluster]) -> f64 {
    let centroid = buffer[index].centroid();
    let mut radius = f64::MAX;
    for (i, other) in buffer.iter().enumerate() {
        if i != index {
            radius = radius.min(other.distance_to(&centroid));
        }
    }
    radius
}

/// Merges the two mutually closest summaries of the buffer, keeping the
/// identity of the earlier one.
fn merge_closest_pair(buffer: &mut Vec<MicroCluster>) {
    let mut pair = None;
    let mut min_distance = f64::MAX;
    for i in 0..buffer.len() {
        for j in i + 1..buffer.len() {
            let distance = buffer[i].distance(&buffer[j]);
            if distance < min_distance {
                min_distance = distance;
                pair = Some((i, j));
            }
        }
    }
    if let Some((i, j)) = pair {
        let second = buffer.remove(j);
        let first = buffer.remove(i);
        buffer.push(MicroCluster::merge(&first, &second));
    }
}
