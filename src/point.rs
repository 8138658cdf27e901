//! Geometry primitives: fixed dimension points in R^n and the labeled,
//! timestamped instances built on them.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::NoveltyError;

/// A point in R^n. Equality is exact, elementwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point(Vec<f64>);

impl Point {
    /// Builds a new point from its coordinates.
    pub fn new(x: Vec<f64>) -> Self {
        Point(x)
    }

    /// The number of dimensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The coordinate values.
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Computes the Euclidian distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(x1, x2)| {
                let d = x1 - x2;
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Elementwise sum of two points.
    pub fn add(p1: &Point, p2: &Point) -> Point {
        Point(p1.0.iter().zip(&p2.0).map(|(x1, x2)| x1 + x2).collect())
    }

    /// Divides every coordinate by a scalar.
    pub fn divide(point: &Point, scalar: f64) -> Point {
        Point(point.0.iter().map(|x| x / scalar).collect())
    }

    /// Computes the mean point of a non-empty set of points.
    pub fn centroid<'a, I>(points: I) -> Result<Point, NoveltyError>
    where
        I: IntoIterator<Item = &'a Point>,
    {
        let mut iter = points.into_iter();
        let first = iter.next().ok_or(NoveltyError::EmptyBatch)?;
        let mut sum = first.clone();
        let mut count = 1.0;
        for point in iter {
            sum = Point::add(&sum, point);
            count += 1.0;
        }
        Ok(Point::divide(&sum, count))
    }
}

/// A point together with its true label and its position in the stream.
/// Instances are immutable and their timestamps are expected to be
/// strictly increasing and unique across the whole stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataInstance {
    point: Point,
    label: String,
    timestamp: i64,
}

impl DataInstance {
    /// Builds a new data instance.
    pub fn new(x: Vec<f64>, label: impl Into<String>, timestamp: i64) -> Self {
        DataInstance {
            point: Point::new(x),
            label: label.into(),
            timestamp,
        }
    }

    pub fn point(&self) -> &Point {
        &self.point
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Deref for DataInstance {
    type Target = Point;

    fn deref(&self) -> &Point {
        &self.point
    }
}

#[cfg(test)]
mod tests {
    use crate::point::*;

    #[test]
    fn test_distance() {
        let d = Point::new(vec![0., 0.]).distance(&Point::new(vec![3., 4.]));
        assert_eq!(5., d);
        let d = Point::new(vec![1., 3.]).distance(&Point::new(vec![1., 3.]));
        assert_eq!(0., d);
    }

    #[test]
    fn test_add_divide() {
        let p = Point::add(&Point::new(vec![1., -1.2]), &Point::new(vec![2., 0.2]));
        assert_eq!(Point::new(vec![3., -1.]), p);
        let p = Point::divide(&p, 2.);
        assert_eq!(Point::new(vec![1.5, -0.5]), p);
    }

    #[test]
    fn test_centroid() {
        let points = vec![
            Point::new(vec![0., 0.]),
            Point::new(vec![2., 4.]),
            Point::new(vec![4., 2.]),
        ];
        let c = Point::centroid(points.iter()).unwrap();
        assert_eq!(Point::new(vec![2., 2.]), c);
    }

    #[test]
    fn test_centroid_of_nothing_fails() {
        let points: Vec<Point> = vec![];
        let c = Point::centroid(points.iter());
        assert_eq!(Err(NoveltyError::EmptyBatch), c);
    }

    #[test]
    fn test_instance_derefs_to_point() {
        let instance = DataInstance::new(vec![1., 2.], "a", 7);
        assert_eq!(2, instance.len());
        assert_eq!("a", instance.label());
        assert_eq!(7, instance.timestamp());
        assert_eq!(0., instance.distance(instance.point()));
    }
}
