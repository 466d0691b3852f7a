//! Pass/fail criteria evaluated over the aggregated metrics once a run completes.
//!
//! A threshold binds a metric name to one or more expressions of the form
//! `aggregation operator value`, for example `p(95)<5000` or `rate>0.9`. Duration metrics are
//! compared in milliseconds.
use crate::data::{MetricValue, Summary};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("threshold `{0}` has no comparison operator")]
    MissingOperator(String),

    #[error("unknown aggregation `{0}`")]
    UnknownAggregation(String),

    #[error("invalid percentile `{0}`; expected p(N) with 0 < N <= 100")]
    InvalidPercentile(String),

    #[error("invalid threshold value `{0}`")]
    InvalidValue(String),

    #[error("threshold for `{0}` has no expressions")]
    Empty(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
    Rate,
    Count,
}

impl FromStr for Aggregation {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| ThresholdError::UnknownAggregation(s.to_string()))?;
                let pct: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| ThresholdError::InvalidPercentile(s.to_string()))?;
                if pct > 0. && pct <= 100. {
                    Ok(Aggregation::Percentile(pct))
                } else {
                    Err(ThresholdError::InvalidPercentile(s.to_string()))
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Percentile(pct) => write!(f, "p({pct})"),
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Count => write!(f, "count"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Operator {
    fn compare(self, actual: f64, expected: f64) -> bool {
        match self {
            Operator::Lt => actual < expected,
            Operator::Le => actual <= expected,
            Operator::Gt => actual > expected,
            Operator::Ge => actual >= expected,
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
        }
    }
}

/// A single `aggregation operator value` predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdExpr {
    pub aggregation: Aggregation,
    pub op: Operator,
    pub value: f64,
}

impl FromStr for ThresholdExpr {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let op_start = s
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| ThresholdError::MissingOperator(s.to_string()))?;
        let (aggregation, rest) = s.split_at(op_start);

        // Two-character operators have to be tried first.
        let (op, value) = [
            ("<=", Operator::Le),
            (">=", Operator::Ge),
            ("==", Operator::Eq),
            ("!=", Operator::Ne),
            ("<", Operator::Lt),
            (">", Operator::Gt),
        ]
        .into_iter()
        .find_map(|(token, op)| rest.strip_prefix(token).map(|value| (op, value)))
        .ok_or_else(|| ThresholdError::MissingOperator(s.to_string()))?;

        let aggregation = aggregation.trim().parse()?;
        let value = value.trim();
        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| ThresholdError::InvalidValue(value.to_string()))?;

        Ok(Self {
            aggregation,
            op,
            value,
        })
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregation, self.op.as_str(), self.value)
    }
}

impl ThresholdExpr {
    /// Resolve the aggregated value this expression compares against.
    fn actual(&self, value: &MetricValue, summary: &Summary) -> Result<f64, &'static str> {
        if !value.has_data() {
            return Err("no data");
        }

        let actual = match (value, self.aggregation) {
            (MetricValue::Counter(count), Aggregation::Count) => Some(*count as f64),
            (MetricValue::Counter(count), Aggregation::Rate) => {
                let secs = summary.elapsed.as_secs_f64();
                (secs > 0.).then(|| *count as f64 / secs)
            }
            (MetricValue::Rate(rate), Aggregation::Rate) => rate.rate(),
            (MetricValue::Rate(rate), Aggregation::Count) => Some(rate.trues as f64),
            (MetricValue::Trend(trend), Aggregation::Count) => Some(trend.count() as f64),
            (MetricValue::Trend(trend), agg) => {
                let dur = match agg {
                    Aggregation::Avg => trend.avg(),
                    Aggregation::Min => trend.min(),
                    Aggregation::Max => trend.max(),
                    Aggregation::Med => trend.quantile(0.5),
                    Aggregation::Percentile(pct) => trend.quantile(pct / 100.),
                    _ => return Err("unsupported aggregation"),
                };
                dur.map(|d| d.as_secs_f64() * 1_000.)
            }
            _ => return Err("unsupported aggregation"),
        };

        actual.ok_or("no data")
    }
}

/// Every expression attached to one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub exprs: Vec<ThresholdExpr>,
}

impl Threshold {
    /// Parse a threshold from its string expressions.
    ///
    /// ```
    /// use gateload_core::Threshold;
    ///
    /// let t = Threshold::new("http_req_duration", ["p(95)<5000"]).unwrap();
    /// assert_eq!(t.exprs.len(), 1);
    /// ```
    pub fn new<I, S>(metric: &str, exprs: I) -> Result<Self, ThresholdError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exprs = exprs
            .into_iter()
            .map(|expr| expr.as_ref().parse())
            .collect::<Result<Vec<ThresholdExpr>, _>>()?;

        if exprs.is_empty() {
            return Err(ThresholdError::Empty(metric.to_string()));
        }

        Ok(Self {
            metric: metric.to_string(),
            exprs,
        })
    }

    pub fn evaluate(&self, summary: &Summary) -> Vec<ThresholdOutcome> {
        let value = summary.get(&self.metric);
        self.exprs
            .iter()
            .map(|expr| {
                let actual = match value {
                    Some(value) => expr.actual(value, summary),
                    None => Err("no data"),
                };

                match actual {
                    Ok(actual) => ThresholdOutcome {
                        metric: self.metric.clone(),
                        expr: *expr,
                        actual: Some(actual),
                        passed: expr.op.compare(actual, expr.value),
                        reason: None,
                    },
                    Err(reason) => ThresholdOutcome {
                        metric: self.metric.clone(),
                        expr: *expr,
                        actual: None,
                        passed: false,
                        reason: Some(reason),
                    },
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expr: ThresholdExpr,
    pub actual: Option<f64>,
    pub passed: bool,
    pub reason: Option<&'static str>,
}

impl fmt::Display for ThresholdOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { '✓' } else { '✗' };
        write!(f, "{mark} {} {}", self.metric, self.expr)?;
        match (self.actual, self.reason) {
            (Some(actual), _) => write!(f, " (actual {actual:.4})"),
            (None, Some(reason)) => write!(f, " ({reason})"),
            (None, None) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RateSummary, TrendSummary};
    use std::time::Duration;

    fn summary_with_success_rate(trues: u64, falses: u64) -> Summary {
        let mut summary = Summary::new(Duration::from_secs(10));
        summary.insert(
            "success_rate",
            MetricValue::Rate(RateSummary { trues, falses }),
        );
        summary
    }

    #[test]
    fn parses_percentile() {
        let expr: ThresholdExpr = "p(95)<5000".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Percentile(95.));
        assert_eq!(expr.op, Operator::Lt);
        assert_eq!(expr.value, 5000.);
        assert_eq!(expr.to_string(), "p(95)<5000");
    }

    #[test]
    fn parses_two_char_operators_and_whitespace() {
        let expr: ThresholdExpr = " rate >= 0.9 ".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Rate);
        assert_eq!(expr.op, Operator::Ge);
        assert_eq!(expr.value, 0.9);

        let expr: ThresholdExpr = "p(99.9)!=1".parse().unwrap();
        assert_eq!(expr.aggregation, Aggregation::Percentile(99.9));
        assert_eq!(expr.op, Operator::Ne);
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(matches!(
            "rate".parse::<ThresholdExpr>(),
            Err(ThresholdError::MissingOperator(_))
        ));
        assert!(matches!(
            "mean<4".parse::<ThresholdExpr>(),
            Err(ThresholdError::UnknownAggregation(_))
        ));
        assert!(matches!(
            "p(0)<4".parse::<ThresholdExpr>(),
            Err(ThresholdError::InvalidPercentile(_))
        ));
        assert!(matches!(
            "p(101)<4".parse::<ThresholdExpr>(),
            Err(ThresholdError::InvalidPercentile(_))
        ));
        assert!(matches!(
            "rate<fast".parse::<ThresholdExpr>(),
            Err(ThresholdError::InvalidValue(_))
        ));
        assert!(matches!(
            "rate=>1".parse::<ThresholdExpr>(),
            Err(ThresholdError::MissingOperator(_))
        ));
        assert_eq!(
            Threshold::new("x", Vec::<&str>::new()),
            Err(ThresholdError::Empty("x".to_string()))
        );
    }

    #[test]
    fn full_success_rate_passes() {
        let threshold = Threshold::new("success_rate", ["rate>0.9"]).unwrap();
        let outcomes = threshold.evaluate(&summary_with_success_rate(1000, 0));
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].actual, Some(1.0));
    }

    #[test]
    fn eighty_percent_success_rate_fails() {
        let threshold = Threshold::new("success_rate", ["rate>0.9"]).unwrap();
        let outcomes = threshold.evaluate(&summary_with_success_rate(800, 200));
        assert!(!outcomes[0].passed);
        assert_eq!(outcomes[0].actual, Some(0.8));
    }

    #[test]
    fn missing_metric_fails_with_no_data() {
        let threshold = Threshold::new("success_rate", ["rate>0.9"]).unwrap();
        let outcomes = threshold.evaluate(&Summary::new(Duration::from_secs(1)));
        assert!(!outcomes[0].passed);
        assert_eq!(outcomes[0].reason, Some("no data"));
        assert_eq!(
            outcomes[0].to_string(),
            "✗ success_rate rate>0.9 (no data)"
        );
    }

    #[test]
    fn trend_thresholds_compare_in_milliseconds() {
        let mut trend = TrendSummary::new();
        for _ in 0..100 {
            trend.push(Duration::from_millis(120));
        }
        let mut summary = Summary::new(Duration::from_secs(1));
        summary.insert("http_req_duration", MetricValue::Trend(trend));

        let threshold =
            Threshold::new("http_req_duration", ["p(95)<5000", "avg<100", "max<=120"]).unwrap();
        let outcomes = threshold.evaluate(&summary);
        assert!(outcomes[0].passed);
        assert!(!outcomes[1].passed);
        assert!(outcomes[2].passed);
    }

    #[test]
    fn unsupported_aggregation_fails() {
        let threshold = Threshold::new("success_rate", ["p(95)<1"]).unwrap();
        let outcomes = threshold.evaluate(&summary_with_success_rate(5, 5));
        assert!(!outcomes[0].passed);
        assert_eq!(outcomes[0].reason, Some("unsupported aggregation"));
    }

    #[test]
    fn counter_rate_is_per_second() {
        let mut summary = Summary::new(Duration::from_secs(10));
        summary.insert("http_reqs", MetricValue::Counter(500));

        let threshold = Threshold::new("http_reqs", ["count==500", "rate>=50"]).unwrap();
        assert!(threshold.evaluate(&summary).iter().all(|o| o.passed));
    }
}
