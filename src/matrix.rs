//! A lazily growing contingency table between true labels and predicted
//! labels, with delayed reconciliation for instances that were first
//! counted as unknown, and the two error metrics derived from it.

use std::collections::HashMap;

use crate::error::NoveltyError;
use crate::point::DataInstance;

/// Rows are true labels; columns are two independently growing families
/// of predicted labels, one for known concepts and one for novelties,
/// plus one unknown counter per row. Rows and columns are added on
/// first sighting, in encounter order.
///
/// Cells are signed: an instance resolved by novelty detection within
/// the same `process` call that queued it transits through a -1 unknown
/// count before the call's final bookkeeping restores it.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    row_labels: Vec<String>,
    known_labels: Vec<String>,
    novelty_labels: Vec<String>,
    row_index: HashMap<String, usize>,
    known_index: HashMap<String, usize>,
    novelty_index: HashMap<String, usize>,
    known: Vec<Vec<i64>>,
    novelty: Vec<Vec<i64>>,
    unknown: Vec<i64>,
}

impl ConfusionMatrix {
    /// Builds a matrix seeded with the labels known at initialization:
    /// each gets a row and a known column, in the given order.
    pub fn new(known_labels: &[String]) -> Self {
        let mut matrix = ConfusionMatrix {
            row_labels: vec![],
            known_labels: vec![],
            novelty_labels: vec![],
            row_index: HashMap::new(),
            known_index: HashMap::new(),
            novelty_index: HashMap::new(),
            known: vec![],
            novelty: vec![],
            unknown: vec![],
        };
        for label in known_labels {
            if !matrix.known_index.contains_key(label) {
                matrix.add_known_column(label);
                matrix.ensure_row(label);
            }
        }
        matrix
    }

    /// Records an explained instance in the cell crossing its true
    /// label with the predicted label, in the known or novelty column
    /// family depending on `is_novel`.
    pub fn add_prediction(&mut self, instance: &DataInstance, predicted: &str, is_novel: bool) {
        let row = self.ensure_row(instance.label());
        if is_novel {
            let column = match self.novelty_index.get(predicted) {
                Some(&i) => i,
                None => self.add_novelty_column(predicted),
            };
            self.novelty[row][column] += 1;
        } else {
            let column = match self.known_index.get(predicted) {
                Some(&i) => i,
                None => self.add_known_column(predicted),
            };
            self.known[row][column] += 1;
        }
    }

    /// Records an unexplained instance against its true label.
    pub fn add_unknown(&mut self, instance: &DataInstance) {
        let row = self.ensure_row(instance.label());
        self.unknown[row] += 1;
    }

    /// Reconciles an instance previously counted as unknown: its
    /// unknown tally is decremented before the prediction is recorded.
    pub fn update_delayed(&mut self, instance: &DataInstance, predicted: &str, is_novel: bool) {
        let row = self.ensure_row(instance.label());
        self.unknown[row] -= 1;
        self.add_prediction(instance, predicted, is_novel);
    }

    /// The true labels seen so far, in encounter order.
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    /// The known predicted labels seen so far, in encounter order.
    pub fn known_labels(&self) -> &[String] {
        &self.known_labels
    }

    /// The novelty predicted labels seen so far, in encounter order.
    pub fn novelty_labels(&self) -> &[String] {
        &self.novelty_labels
    }

    /// The count of instances of `row` predicted as the known label
    /// `column`, when both exist.
    pub fn known_predictions(&self, row: &str, column: &str) -> Option<i64> {
        let row = *self.row_index.get(row)?;
        let column = *self.known_index.get(column)?;
        Some(self.known[row][column])
    }

    /// The count of instances of `row` predicted as the novelty label
    /// `column`, when both exist.
    pub fn novelty_predictions(&self, row: &str, column: &str) -> Option<i64> {
        let row = *self.row_index.get(row)?;
        let column = *self.novelty_index.get(column)?;
        Some(self.novelty[row][column])
    }

    /// The unknown tally of `row`, when it exists.
    pub fn unknown_count(&self, row: &str) -> Option<i64> {
        let row = *self.row_index.get(row)?;
        Some(self.unknown[row])
    }

    /// The combined error rate: novelty columns are first associated
    /// with the row contributing their single largest count, then each
    /// row's false positive and false negative rates are weighted by
    /// the row's share of the explained samples, and the grand total is
    /// halved.
    pub fn measure_cer(&self) -> Result<f64, NoveltyError> {
        if self.row_labels.is_empty() {
            return Err(NoveltyError::EmptyMatrix);
        }
        let total_explained: i64 = (0..self.row_labels.len())
            .map(|row| self.explained_count(row))
            .sum();
        if total_explained == 0 {
            return Err(NoveltyError::NoExplainedSamples);
        }
        let association = self.associate_novelties();
        let mut sum = 0.;
        for row in 0..self.row_labels.len() {
            let explained = self.explained_count(row);
            if explained == 0 {
                continue;
            }
            let tp = self.true_positives(row, &association);
            let fp = self.false_positives(row, &association);
            let fn_ = self.false_negatives(row, &association);
            let tn = self.true_negatives(row, &association);
            let rate = explained as f64 / total_explained as f64;
            sum += rate * (fp as f64 / (fp + tn).max(1) as f64);
            sum += rate * (fn_ as f64 / (fn_ + tp).max(1) as f64);
        }
        Ok(sum / 2.)
    }

    /// The unknown rate: mean over rows of `unknown / (explained +
    /// unknown)`, counting 1 for rows that were never explained.
    pub fn measure_unk_r(&self) -> Result<f64, NoveltyError> {
        if self.row_labels.is_empty() {
            return Err(NoveltyError::EmptyMatrix);
        }
        let mut sum = 0.;
        for row in 0..self.row_labels.len() {
            let unexplained = self.unknown[row] as f64;
            let explained = self.explained_count(row) as f64;
            if explained > 0. {
                sum += unexplained / (explained + unexplained);
            } else if unexplained > 0. {
                sum += 1.;
            }
        }
        Ok(sum / self.row_labels.len() as f64)
    }

    fn ensure_row(&mut self, label: &str) -> usize {
        if let Some(&row) = self.row_index.get(label) {
            return row;
        }
        let row = self.row_labels.len();
        self.row_index.insert(label.to_string(), row);
        self.row_labels.push(label.to_string());
        self.known.push(vec![0; self.known_labels.len()]);
        self.novelty.push(vec![0; self.novelty_labels.len()]);
        self.unknown.push(0);
        row
    }

    fn add_known_column(&mut self, label: &str) -> usize {
        let column = self.known_labels.len();
        self.known_index.insert(label.to_string(), column);
        self.known_labels.push(label.to_string());
        for row in &mut self.known {
            row.push(0);
        }
        column
    }

    fn add_novelty_column(&mut self, label: &str) -> usize {
        let column = self.novelty_labels.len();
        self.novelty_index.insert(label.to_string(), column);
        self.novelty_labels.push(label.to_string());
        for row in &mut self.novelty {
            row.push(0);
        }
        column
    }

    /// Associates each novelty column with the row holding its single
    /// largest count. Zero-max columns stay unassociated and the first
    /// encountered row wins ties.
    fn associate_novelties(&self) -> Vec<Option<usize>> {
        (0..self.novelty_labels.len())
            .map(|column| {
                let mut max = 0;
                let mut winner = None;
                for row in 0..self.row_labels.len() {
                    if self.novelty[row][column] > max {
                        max = self.novelty[row][column];
                        winner = Some(row);
                    }
                }
                winner
            })
            .collect()
    }

    fn explained_count(&self, row: usize) -> i64 {
        let known: i64 = self.known[row].iter().sum();
        let novelty: i64 = self.novelty[row].iter().sum();
        known + novelty
    }

    fn true_positives(&self, row: usize, association: &[Option<usize>]) -> i64 {
        let label = &self.row_labels[row];
        let mut sum = 0;
        if let Some(&column) = self.known_index.get(label) {
            sum += self.known[row][column];
        }
        for (column, associated) in association.iter().enumerate() {
            if *associated == Some(row) {
                sum += self.novelty[row][column];
            }
        }
        sum
    }

    fn false_positives(&self, row: usize, association: &[Option<usize>]) -> i64 {
        let label = &self.row_labels[row];
        let mut sum = 0;
        if let Some(&column) = self.known_index.get(label) {
            for other in 0..self.row_labels.len() {
                if other != row {
                    sum += self.known[other][column];
                }
            }
        }
        for (column, associated) in association.iter().enumerate() {
            if *associated == Some(row) {
                for other in 0..self.row_labels.len() {
                    if other != row {
                        sum += self.novelty[other][column];
                    }
                }
            }
        }
        sum
    }

    fn false_negatives(&self, row: usize, association: &[Option<usize>]) -> i64 {
        let label = &self.row_labels[row];
        let mut sum = 0;
        if self.known_index.contains_key(label) {
            for (column, column_label) in self.known_labels.iter().enumerate() {
                if column_label != label {
                    sum += self.known[row][column];
                }
            }
        }
        for (column, associated) in association.iter().enumerate() {
            if *associated != Some(row) {
                sum += self.novelty[row][column];
            }
        }
        sum
    }

    fn true_negatives(&self, row: usize, association: &[Option<usize>]) -> i64 {
        (0..self.row_labels.len())
            .filter(|&other| other != row)
            .map(|other| self.true_positives(other, association))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use approx_eq::assert_approx_eq;

    use crate::matrix::*;

    fn instance(label: &str, timestamp: i64) -> DataInstance {
        DataInstance::new(vec![0.], label, timestamp)
    }

    fn seeded() -> ConfusionMatrix {
        ConfusionMatrix::new(&["a".to_string(), "b".to_string()])
    }

    #[test]
    fn test_seeding_creates_rows_and_known_columns() {
        let matrix = seeded();
        assert_eq!(&["a", "b"], matrix.row_labels());
        assert_eq!(&["a", "b"], matrix.known_labels());
        assert!(matrix.novelty_labels().is_empty());
        assert_eq!(Some(0), matrix.known_predictions("a", "b"));
        assert_eq!(Some(0), matrix.unknown_count("a"));
    }

    #[test]
    fn test_add_prediction_increments_exactly_one_cell() {
        let mut matrix = seeded();
        matrix.add_prediction(&instance("a", 1), "b", false);
        assert_eq!(Some(1), matrix.known_predictions("a", "b"));
        assert_eq!(Some(0), matrix.known_predictions("a", "a"));
        assert_eq!(Some(0), matrix.known_predictions("b", "b"));
        assert_eq!(Some(0), matrix.known_predictions("b", "a"));
        assert_eq!(Some(0), matrix.unknown_count("a"));
        assert_eq!(Some(0), matrix.unknown_count("b"));
    }

    #[test]
    fn test_rows_and_columns_grow_lazily() {
        let mut matrix = seeded();
        matrix.add_prediction(&instance("c", 1), "0", true);
        assert_eq!(&["a", "b", "c"], matrix.row_labels());
        assert_eq!(&["0"], matrix.novelty_labels());
        assert_eq!(Some(1), matrix.novelty_predictions("c", "0"));
        assert_eq!(Some(0), matrix.novelty_predictions("a", "0"));
        assert_eq!(None, matrix.novelty_predictions("c", "1"));
    }

    #[test]
    fn test_add_unknown_and_delayed_reconciliation() {
        let mut matrix = seeded();
        matrix.add_unknown(&instance("a", 1));
        assert_eq!(Some(1), matrix.unknown_count("a"));
        matrix.update_delayed(&instance("a", 1), "0", true);
        assert_eq!(Some(0), matrix.unknown_count("a"));
        assert_eq!(Some(1), matrix.novelty_predictions("a", "0"));
    }

    #[test]
    fn test_unknown_rate() {
        let mut matrix = seeded();
        matrix.add_prediction(&instance("a", 1), "a", false);
        matrix.add_prediction(&instance("a", 2), "a", false);
        matrix.add_unknown(&instance("a", 3));
        matrix.add_unknown(&instance("b", 4));
        // a: 1/3, b: only unknowns counts as 1
        assert_approx_eq!((1. / 3. + 1.) / 2., matrix.measure_unk_r().unwrap());
    }

    #[test]
    fn test_unknown_rate_is_zero_without_unknowns() {
        let mut matrix = seeded();
        matrix.add_prediction(&instance("a", 1), "a", false);
        matrix.add_prediction(&instance("b", 2), "b", false);
        assert_eq!(0., matrix.measure_unk_r().unwrap());
    }

    #[test]
    fn test_metrics_reject_an_empty_matrix() {
        let matrix = ConfusionMatrix::new(&[]);
        assert_eq!(Err(NoveltyError::EmptyMatrix), matrix.measure_unk_r());
        assert_eq!(Err(NoveltyError::EmptyMatrix), matrix.measure_cer());
    }

    #[test]
    fn test_cer_rejects_a_matrix_without_predictions() {
        let mut matrix = seeded();
        matrix.add_unknown(&instance("a", 1));
        assert_eq!(Err(NoveltyError::NoExplainedSamples), matrix.measure_cer());
    }

    #[test]
    fn test_cer_is_zero_for_perfect_predictions() {
        let mut matrix = seeded();
        matrix.add_prediction(&instance("a", 1), "a", false);
        matrix.add_prediction(&instance("b", 2), "b", false);
        assert_eq!(0., matrix.measure_cer().unwrap());
    }

    #[test]
    fn test_cer_associates_novelty_columns_with_their_main_row() {
        let mut matrix = seeded();
        // novelty "0" is dominated by "a", so it counts as a's true
        // positives and stays an error only for the stray "b" sample
        matrix.add_prediction(&instance("a", 1), "0", true);
        matrix.add_prediction(&instance("a", 2), "0", true);
        matrix.add_prediction(&instance("b", 3), "0", true);
        matrix.add_prediction(&instance("b", 4), "b", false);
        // a: tp=2, fp=1, fn=0, tn=1; b: tp=1, fn=1, fp=0, tn=2
        // rate a = 0.5: 0.5 * (1/2) + 0.5 * 0 = 0.25
        // rate b = 0.5: 0.5 * 0 + 0.5 * (1/2) = 0.25
        assert_approx_eq!(0.25, matrix.measure_cer().unwrap());
    }

    #[test]
    fn test_cer_ignores_zero_max_novelty_columns() {
        let mut matrix = seeded();
        matrix.add_prediction(&instance("a", 1), "a", false);
        matrix.add_prediction(&instance("a", 2), "0", true);
        // force the "0" column back to zero so it stays unassociated
        matrix.novelty[0][0] = 0;
        let cer = matrix.measure_cer().unwrap();
        assert_eq!(0., cer);
    }
}
