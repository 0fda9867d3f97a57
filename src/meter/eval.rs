//! Evaluation results and the evaluator boundary.
//!
//! Expression evaluation is owned by an external component. This module only
//! defines the shapes it hands back and the trait it is called through.

use crate::core::error::EvalError;
use crate::meter::event::{Sample, SampleValue};
use std::cmp::Ordering;

/// Boundary-ordered distribution of `boundary -> count`.
///
/// Boundaries are kept sorted by [`f64::total_cmp`] and are unique, so
/// iteration order is always ascending boundary order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    buckets: Vec<(f64, i64)>,
}

impl Distribution {
    /// Builds a distribution, ordering boundaries and summing duplicates.
    pub fn new<I: IntoIterator<Item = (f64, i64)>>(buckets: I) -> Self {
        let mut buckets: Vec<(f64, i64)> = buckets.into_iter().collect();
        buckets.sort_by(|a, b| a.0.total_cmp(&b.0));
        buckets.dedup_by(|later, kept| {
            if later.0.total_cmp(&kept.0) == Ordering::Equal {
                kept.1 = kept.1.saturating_add(later.1);
                true
            } else {
                false
            }
        });
        Self { buckets }
    }

    /// Adds every bucket of `other` into this distribution.
    pub fn merge(&mut self, other: &Distribution) {
        let merged = Distribution::new(self.buckets.iter().chain(other.buckets.iter()).copied());
        *self = merged;
    }

    /// Iterates buckets in ascending boundary order
    pub fn iter(&self) -> impl Iterator<Item = (f64, i64)> + '_ {
        self.buckets.iter().copied()
    }

    /// Number of buckets
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Returns true if there are no buckets
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// A single numeric result
#[derive(Debug, Clone, PartialEq)]
pub struct SingleData {
    pub name: String,
    pub value: f64,
}

/// A distribution result
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramData {
    pub name: String,
    pub buckets: Distribution,
}

/// Canonical evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum EvalData {
    Single(SingleData),
    Histogram(HistogramData),
}

impl EvalData {
    /// Name of the series the data was evaluated from
    pub fn name(&self) -> &str {
        match self {
            EvalData::Single(data) => &data.name,
            EvalData::Histogram(data) => &data.name,
        }
    }

    /// Human readable kind, used in drop warnings
    pub fn kind(&self) -> &'static str {
        match self {
            EvalData::Single(_) => "single",
            EvalData::Histogram(_) => "histogram",
        }
    }
}

/// Why a multi-series result could not be collapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineError {
    /// The expression produced no series
    Empty,
    /// Single values and histograms were mixed
    MixedKinds,
}

/// Raw, possibly multi-series, evaluation result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalMultipleData {
    data: Vec<EvalData>,
}

impl EvalMultipleData {
    pub fn new(data: Vec<EvalData>) -> Self {
        Self { data }
    }

    /// Wraps one series
    pub fn single(data: EvalData) -> Self {
        Self { data: vec![data] }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Collapses all series into one value.
    ///
    /// Single values are summed; histograms are merged bucket by bucket.
    /// The first series names the result.
    pub fn combine_as_single_data(self) -> Result<EvalData, CombineError> {
        let mut series = self.data.into_iter();
        let mut combined = series.next().ok_or(CombineError::Empty)?;

        for next in series {
            match (&mut combined, next) {
                (EvalData::Single(acc), EvalData::Single(item)) => acc.value += item.value,
                (EvalData::Histogram(acc), EvalData::Histogram(item)) => {
                    acc.buckets.merge(&item.buckets)
                },
                _ => return Err(CombineError::MixedKinds),
            }
        }

        Ok(combined)
    }
}

/// Expression evaluator consumed by the dispatcher
pub trait Evaluator {
    /// Evaluates an expression to a raw result
    fn evaluate(&self, expression: &str) -> Result<EvalMultipleData, EvalError>;
}

impl<F> Evaluator for F
where
    F: Fn(&str) -> Result<EvalMultipleData, EvalError>,
{
    fn evaluate(&self, expression: &str) -> Result<EvalMultipleData, EvalError> {
        self(expression)
    }
}

/// Evaluator binding an expression to the samples reported with an event.
///
/// The expression is the sample name; every reported series carrying that
/// name becomes one entry of the result.
pub struct SampleEvaluator<'a> {
    samples: &'a [Sample],
}

impl<'a> SampleEvaluator<'a> {
    pub fn new(samples: &'a [Sample]) -> Self {
        Self { samples }
    }
}

impl Evaluator for SampleEvaluator<'_> {
    fn evaluate(&self, expression: &str) -> Result<EvalMultipleData, EvalError> {
        let name = expression.trim();
        if name.is_empty() {
            return Err(EvalError::EmptyExpression);
        }

        let data: Vec<EvalData> = self
            .samples
            .iter()
            .filter(|sample| sample.name == name)
            .map(|sample| match &sample.value {
                SampleValue::Single { value } => EvalData::Single(SingleData {
                    name: sample.name.clone(),
                    value: *value,
                }),
                SampleValue::Histogram { buckets } => EvalData::Histogram(HistogramData {
                    name: sample.name.clone(),
                    buckets: Distribution::new(buckets.iter().copied()),
                }),
            })
            .collect();

        if data.is_empty() {
            return Err(EvalError::UnknownSample(name.to_string()));
        }

        Ok(EvalMultipleData::new(data))
    }
}
