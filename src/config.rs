//! The parameters driving the engine, fixed at construction: the two
//! clustering strategies, the two decision rules and the scalar knobs.
//! Validity (positive sizes, consistent dimensionality) is a caller
//! precondition and is not checked here.

use crate::clustering::ClusteringStrategy;
use crate::decision::{ClusterDecisionRule, InstanceDecisionRule};

pub struct Configuration {
    /// Clustering run per label over the training batch.
    pub clustering_for_initialization: Box<dyn ClusteringStrategy>,
    /// Clustering run over the temporary memory.
    pub clustering_for_novelty_detection: Box<dyn ClusteringStrategy>,
    /// Rule classifying candidate micro-clusters against a memory.
    pub micro_cluster_decision_rule: Box<dyn ClusterDecisionRule>,
    /// Rule classifying incoming instances against the decision model.
    pub data_instance_decision_rule: Box<dyn InstanceDecisionRule>,
    /// Temporary memory size that triggers novelty detection.
    pub temporary_memory_max_size: usize,
    /// Candidate clusters below this member count are rejected.
    pub minimum_cluster_size: usize,
    /// Period of the eviction maintenance, in timestamps.
    pub window_size: i64,
    /// Age beyond which an inactive summary moves to sleep memory.
    pub micro_cluster_lifespan: i64,
    /// Age beyond which a never-classified instance is dropped.
    pub instance_lifespan: i64,
    /// Whether an explaining summary absorbs the instance or only has
    /// its timestamp refreshed.
    pub incremental: bool,
}
