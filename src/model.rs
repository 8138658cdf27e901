//! The mutable state of the novelty detection engine: the three memory
//! collections, the scalar counters and the evaluation matrix, plus the
//! labeling events the engine emits.

use serde::{Deserialize, Serialize};

use crate::cluster::MicroCluster;
use crate::matrix::ConfusionMatrix;
use crate::point::DataInstance;

/// The externally visible output unit, mapping a timestamp to the label
/// predicted for the instance seen at that timestamp. Delayed events
/// from novelty detection may arrive out of timestamp order; a consumer
/// that needs strict order must re-sort.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labeling {
    timestamp: i64,
    label: String,
    is_novelty: bool,
}

impl Labeling {
    pub fn new(timestamp: i64, label: impl Into<String>, is_novelty: bool) -> Self {
        Labeling {
            timestamp,
            label: label.into(),
            is_novelty,
        }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_novelty(&self) -> bool {
        self.is_novelty
    }
}

/// The engine state. A micro-cluster belongs to exactly one of the
/// decision model or the sleep memory at a time; instances that failed
/// classification wait in the temporary memory until the next novelty
/// detection pass. The model is exclusively owned by its driver and
/// mutated only through the engine entry points.
pub struct Model {
    pub(crate) decision_model: Vec<MicroCluster>,
    pub(crate) sleep_memory: Vec<MicroCluster>,
    pub(crate) temporary_memory: Vec<DataInstance>,
    pub(crate) last_timestamp: i64,
    pub(crate) novelty_count: u32,
    pub(crate) matrix: ConfusionMatrix,
}

impl Model {
    pub(crate) fn new(decision_model: Vec<MicroCluster>, matrix: ConfusionMatrix) -> Self {
        Model {
            decision_model,
            sleep_memory: vec![],
            temporary_memory: vec![],
            last_timestamp: 0,
            novelty_count: 0,
            matrix,
        }
    }

    /// The summaries currently used for live classification.
    pub fn decision_model(&self) -> &[MicroCluster] {
        &self.decision_model
    }

    /// The summaries evicted for inactivity, still eligible for
    /// reactivation.
    pub fn sleep_memory(&self) -> &[MicroCluster] {
        &self.sleep_memory
    }

    /// The instances awaiting batch re-clustering.
    pub fn temporary_memory(&self) -> &[DataInstance] {
        &self.temporary_memory
    }

    /// The timestamp of the last processed instance.
    pub fn last_timestamp(&self) -> i64 {
        self.last_timestamp
    }

    /// How many novelties have been declared so far. The counter also
    /// assigns the sequential textual identifiers of new novelties.
    pub fn novelty_count(&self) -> u32 {
        self.novelty_count
    }

    /// The evaluation matrix, for external metric reporting.
    pub fn confusion_matrix(&self) -> &ConfusionMatrix {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use crate::model::*;

    #[test]
    fn test_fresh_model_is_empty() {
        let model = Model::new(vec![], ConfusionMatrix::new(&[]));
        assert!(model.decision_model().is_empty());
        assert!(model.sleep_memory().is_empty());
        assert!(model.temporary_memory().is_empty());
        assert_eq!(0, model.last_timestamp());
        assert_eq!(0, model.novelty_count());
    }

    #[test]
    fn test_labeling_serializes() {
        let labeling = Labeling::new(42, "0", true);
        let json = serde_json::to_string(&labeling).unwrap();
        assert_eq!(r#"{"timestamp":42,"label":"0","is_novelty":true}"#, json);
        let back: Labeling = serde_json::from_str(&json).unwrap();
        assert_eq!(labeling, back);
    }
}
