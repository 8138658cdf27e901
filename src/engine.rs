//! Engine orchestration: the offline initialization over a training
//! batch, the per instance online loop, the novelty detection procedure
//! over the temporary memory and the windowed eviction.

use tracing::{debug, info};

use crate::cluster::{self, Category};
use crate::config::Configuration;
use crate::error::NoveltyError;
use crate::matrix::ConfusionMatrix;
use crate::model::{Labeling, Model};
use crate::point::DataInstance;

/// Builds the initial model from a labeled training batch: instances
/// are sorted by timestamp, partitioned by label, clustered per label,
/// and only summaries with at least 3 members enter the decision model.
/// The evaluation matrix is seeded with the distinct labels observed,
/// in first seen order.
pub fn initialize(
    mut training: Vec<DataInstance>,
    config: &Configuration,
) -> Result<Model, NoveltyError> {
    training.sort_by_key(|instance| instance.timestamp());

    let mut known_labels: Vec<String> = vec![];
    for instance in &training {
        if !known_labels.iter().any(|label| label == instance.label()) {
            known_labels.push(instance.label().to_string());
        }
    }

    let mut decision_model = vec![];
    for label in &known_labels {
        let instances: Vec<DataInstance> = training
            .iter()
            .filter(|instance| instance.label() == label)
            .cloned()
            .collect();
        let mut clusters = config.clustering_for_initialization.cluster(&instances)?;
        for cluster in &mut clusters {
            cluster.set_label(label.clone());
            cluster.set_category(Category::Known);
        }
        decision_model.extend(clusters.into_iter().filter(|cluster| cluster.n() >= 3));
    }

    debug!(
        labels = known_labels.len(),
        clusters = decision_model.len(),
        "model initialized"
    );
    let matrix = ConfusionMatrix::new(&known_labels);
    Ok(Model::new(decision_model, matrix))
}

/// Processes one instance and returns the labeling events it produced:
/// one immediate event when the decision model explains the instance,
/// or any number of delayed events when the instance fills the
/// temporary memory and triggers novelty detection. Instances must be
/// fed in strictly increasing timestamp order.
pub fn process(
    instance: &DataInstance,
    model: &mut Model,
    config: &Configuration,
) -> Result<Vec<Labeling>, NoveltyError> {
    model.last_timestamp = instance.timestamp();

    let classification = config
        .data_instance_decision_rule
        .classify(instance, &model.decision_model);

    let mut labelings = vec![];
    let mut prediction = None;
    if let Some(index) = classification.explained_by() {
        let matched = &mut model.decision_model[index];
        if config.incremental {
            matched.absorb(instance);
        } else {
            matched.touch(instance);
        }
        let label = matched.label().to_string();
        let is_novel = matched.category() == Category::Novelty;
        labelings.push(Labeling::new(instance.timestamp(), label.clone(), is_novel));
        prediction = Some((label, is_novel));
    } else {
        model.temporary_memory.push(instance.clone());
        if model.temporary_memory.len() >= config.temporary_memory_max_size {
            labelings.extend(detect_novelty(model, config)?);
        }
    }

    if model.last_timestamp % config.window_size == 0 {
        evict_inactive(model, config);
    }

    match &prediction {
        Some((label, is_novel)) => model.matrix.add_prediction(instance, label, *is_novel),
        None => model.matrix.add_unknown(instance),
    }

    Ok(labelings)
}

/// Re-clusters the temporary memory and decides, for each candidate
/// cluster that is large and well separated enough, whether it extends
/// an active concept, reactivates a dormant one, or is a novelty. The
/// candidate joins the decision model either way, and the instances it
/// summarizes leave the temporary memory with a delayed labeling each.
fn detect_novelty(
    model: &mut Model,
    config: &Configuration,
) -> Result<Vec<Labeling>, NoveltyError> {
    let mut candidates = config
        .clustering_for_novelty_detection
        .cluster(&model.temporary_memory)?;

    // too small or too poorly separated candidates are rejected before
    // any candidate joins the model; their instances stay in the
    // temporary memory for a future retry
    candidates.retain(|candidate| {
        candidate.n() >= config.minimum_cluster_size
            && cluster::silhouette(candidate, &model.decision_model) > 0.
    });

    let mut labelings = vec![];
    for mut candidate in candidates {
        let rule = &config.micro_cluster_decision_rule;
        let decision = rule.classify(&candidate, &model.decision_model);
        let (label, category) = match decision.explained_by() {
            Some(index) => {
                let matched = &model.decision_model[index];
                debug!(label = matched.label(), "pattern extends an active concept");
                (matched.label().to_string(), matched.category())
            }
            None => match rule
                .classify(&candidate, &model.sleep_memory)
                .explained_by()
            {
                Some(index) => {
                    let awakened = model.sleep_memory.remove(index);
                    let label = awakened.label().to_string();
                    let category = awakened.category();
                    debug!(
                        label = label.as_str(),
                        "pattern reactivates a dormant concept"
                    );
                    model.decision_model.push(awakened);
                    (label, category)
                }
                None => {
                    let label = model.novelty_count.to_string();
                    model.novelty_count += 1;
                    info!(label = label.as_str(), size = candidate.n(), "novelty declared");
                    (label, Category::Novelty)
                }
            },
        };

        candidate.set_label(label.clone());
        candidate.set_category(category);
        let is_novel = category == Category::Novelty;
        let members = candidate.timestamps().clone();
        model.decision_model.push(candidate);

        let (resolved, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut model.temporary_memory)
            .into_iter()
            .partition(|instance| members.contains(&instance.timestamp()));
        model.temporary_memory = waiting;
        for instance in &resolved {
            model.matrix.update_delayed(instance, &label, is_novel);
            labelings.push(Labeling::new(instance.timestamp(), label.clone(), is_novel));
        }
    }
    Ok(labelings)
}

/// Moves decision model summaries that outlived their lifespan into the
/// sleep memory, and drops temporary memory instances that outlived
/// theirs. Runs once per completed window.
fn evict_inactive(model: &mut Model, config: &Configuration) {
    let last = model.last_timestamp;
    let clusters = std::mem::take(&mut model.decision_model);
    let (active, inactive): (Vec<_>, Vec<_>) = clusters
        .into_iter()
        .partition(|cluster| last - cluster.timestamp() <= config.micro_cluster_lifespan);
    if !inactive.is_empty() {
        debug!(count = inactive.len(), "summaries moved to sleep memory");
    }
    model.decision_model = active;
    model.sleep_memory.extend(inactive);
    model
        .temporary_memory
        .retain(|instance| last - instance.timestamp() <= config.instance_lifespan);
}
