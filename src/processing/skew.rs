//! Skewness-adaptive numeric transforms
//!
//! Per numeric column, fit-time skewness picks one of three treatments:
//! right-skewed columns get the cheap `ln(1+x)` transform, left-skewed
//! columns get a fitted Yeo-Johnson power transform, and roughly symmetric
//! columns pass through. The chosen method and its parameters are frozen at
//! fit time and replayed identically on every later table.

use super::{f64_values, ColumnTransform};
use crate::error::{PredictError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Treatment chosen for a column at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkewMethod {
    None,
    Log,
    YeoJohnson,
}

/// Fitted Yeo-Johnson parameters: the power exponent plus the
/// standardization constants of the transformed fit sample
#[derive(Debug, Clone, Serialize, Deserialize)]
struct YeoJohnsonParams {
    lambda: f64,
    mean: f64,
    std: f64,
}

/// Per-column fitted state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnSkewState {
    skewness: f64,
    method: SkewMethod,
    power: Option<YeoJohnsonParams>,
}

/// Applies a frozen, per-column de-skewing transform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkewHandler {
    columns: Vec<String>,
    threshold: f64,
    states: HashMap<String, ColumnSkewState>,
    is_fitted: bool,
}

impl SkewHandler {
    /// Create a handler over the given numeric columns
    pub fn new(columns: Vec<String>, threshold: f64) -> Self {
        Self {
            columns,
            threshold,
            states: HashMap::new(),
            is_fitted: false,
        }
    }

    /// The method chosen for a column, if fitted
    pub fn method(&self, column: &str) -> Option<SkewMethod> {
        self.states.get(column).map(|s| s.method)
    }

    /// The fit-time skewness of a column, if fitted
    pub fn skewness(&self, column: &str) -> Option<f64> {
        self.states.get(column).map(|s| s.skewness)
    }

    /// Columns the handler operates on, in declaration order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Adjusted Fisher-Pearson sample skewness. Zero for fewer than three
    /// samples or a degenerate (zero-variance) column.
    fn sample_skewness(values: &[f64]) -> f64 {
        let n = values.len();
        if n < 3 {
            return 0.0;
        }
        let nf = n as f64;
        let mean = values.iter().sum::<f64>() / nf;
        let m2 = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / nf;
        let m3 = values.iter().map(|&v| (v - mean).powi(3)).sum::<f64>() / nf;
        if m2 <= 1e-12 {
            return 0.0;
        }
        let g1 = m3 / m2.powf(1.5);
        g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
    }

    /// Yeo-Johnson transform for a single value
    fn yeojohnson_value(x: f64, lambda: f64) -> f64 {
        if x >= 0.0 {
            if lambda.abs() < 1e-10 {
                (x + 1.0).ln()
            } else {
                ((x + 1.0).powf(lambda) - 1.0) / lambda
            }
        } else if (lambda - 2.0).abs() < 1e-10 {
            -((-x + 1.0).ln())
        } else {
            -(((-x + 1.0).powf(2.0 - lambda) - 1.0) / (2.0 - lambda))
        }
    }

    /// Yeo-Johnson log-likelihood for lambda estimation
    fn yeojohnson_log_likelihood(values: &[f64], lambda: f64) -> f64 {
        let n = values.len() as f64;

        let transformed: Vec<f64> = values
            .iter()
            .map(|&x| Self::yeojohnson_value(x, lambda))
            .collect();

        let mean = transformed.iter().sum::<f64>() / n;
        let variance = transformed.iter().map(|&t| (t - mean).powi(2)).sum::<f64>() / n;

        if variance <= 0.0 {
            return f64::NEG_INFINITY;
        }

        let log_jacobian: f64 = values.iter().map(|&x| (x.abs() + 1.0).ln().copysign(x)).sum();

        -n / 2.0 * variance.ln() + (lambda - 1.0) * log_jacobian
    }

    /// Estimate lambda by grid search over [-2, 2]
    fn estimate_lambda(values: &[f64]) -> f64 {
        let mut best_lambda = 1.0;
        let mut best_ll = f64::NEG_INFINITY;

        for lambda_int in -20..=20 {
            let lambda = lambda_int as f64 * 0.1;
            let ll = Self::yeojohnson_log_likelihood(values, lambda);
            if ll > best_ll {
                best_ll = ll;
                best_lambda = lambda;
            }
        }

        best_lambda
    }

    fn fit_power_params(values: &[f64]) -> YeoJohnsonParams {
        let lambda = Self::estimate_lambda(values);
        let transformed: Vec<f64> = values
            .iter()
            .map(|&x| Self::yeojohnson_value(x, lambda))
            .collect();

        let n = transformed.len() as f64;
        let mean = transformed.iter().sum::<f64>() / n;
        let variance = transformed.iter().map(|&t| (t - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();

        YeoJohnsonParams {
            lambda,
            mean,
            std: if std == 0.0 { 1.0 } else { std },
        }
    }

    fn transform_column(&self, df: &DataFrame, col_name: &str, state: &ColumnSkewState) -> Result<Series> {
        let values = f64_values(df, col_name)?;

        let transformed: Vec<Option<f64>> = match state.method {
            SkewMethod::None => values,
            SkewMethod::Log => values
                .into_iter()
                .map(|opt| {
                    opt.map(|x| {
                        if x <= -1.0 {
                            Err(PredictError::Domain(format!(
                                "log1p undefined for {x} in column {col_name}"
                            )))
                        } else {
                            Ok((1.0 + x).ln())
                        }
                    })
                    .transpose()
                })
                .collect::<Result<Vec<Option<f64>>>>()?,
            SkewMethod::YeoJohnson => {
                let params = state.power.as_ref().ok_or_else(|| {
                    PredictError::Artifact(format!(
                        "missing Yeo-Johnson parameters for column {col_name}"
                    ))
                })?;
                values
                    .into_iter()
                    .map(|opt| {
                        opt.map(|x| {
                            (Self::yeojohnson_value(x, params.lambda) - params.mean) / params.std
                        })
                    })
                    .collect()
            }
        };

        Ok(Series::new(col_name.into(), transformed))
    }
}

impl ColumnTransform for SkewHandler {
    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        for col_name in &self.columns {
            let values: Vec<f64> = f64_values(df, col_name)?.into_iter().flatten().collect();

            let skewness = Self::sample_skewness(&values);
            let (method, power) = if skewness > self.threshold {
                (SkewMethod::Log, None)
            } else if skewness < -self.threshold {
                (SkewMethod::YeoJohnson, Some(Self::fit_power_params(&values)))
            } else {
                (SkewMethod::None, None)
            };

            debug!(column = %col_name, skewness, ?method, "fitted skew treatment");
            self.states.insert(
                col_name.clone(),
                ColumnSkewState {
                    skewness,
                    method,
                    power,
                },
            );
        }

        self.is_fitted = true;
        Ok(())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PredictError::FitState(
                "SkewHandler::transform called before fit".to_string(),
            ));
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .map(|col_name| {
                let state = self.states.get(col_name).ok_or_else(|| {
                    PredictError::FitState(format!("column not fitted: {col_name}"))
                })?;
                self.transform_column(df, col_name, state)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for transformed in replacements {
            result = result
                .with_column(transformed)
                .map_err(|e| PredictError::Data(e.to_string()))?
                .clone();
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right_skewed() -> Vec<f64> {
        // Long right tail: most mass small, a few large values
        vec![0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 20.0, 50.0]
    }

    fn left_skewed() -> Vec<f64> {
        vec![-50.0, -20.0, -3.0, -2.0, -2.0, -1.0, -1.0, -1.0, 0.0, 0.0]
    }

    #[test]
    fn test_skewness_sign() {
        assert!(SkewHandler::sample_skewness(&right_skewed()) > 1.0);
        assert!(SkewHandler::sample_skewness(&left_skewed()) < -1.0);
        assert_eq!(SkewHandler::sample_skewness(&[5.0, 5.0, 5.0, 5.0]), 0.0);
        assert_eq!(SkewHandler::sample_skewness(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_method_selection() {
        let df = df!(
            "right" => right_skewed(),
            "left" => left_skewed(),
            "flat" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        )
        .unwrap();

        let mut handler = SkewHandler::new(
            vec!["right".to_string(), "left".to_string(), "flat".to_string()],
            1.0,
        );
        handler.fit(&df).unwrap();

        assert_eq!(handler.method("right"), Some(SkewMethod::Log));
        assert_eq!(handler.method("left"), Some(SkewMethod::YeoJohnson));
        assert_eq!(handler.method("flat"), Some(SkewMethod::None));
    }

    #[test]
    fn test_log_transform_value() {
        let df = df!("right" => right_skewed()).unwrap();
        let mut handler = SkewHandler::new(vec!["right".to_string()], 1.0);
        handler.fit(&df).unwrap();
        assert_eq!(handler.method("right"), Some(SkewMethod::Log));

        let input = df!("right" => &[10.0]).unwrap();
        let result = handler.transform(&input).unwrap();
        let value = result.column("right").unwrap().f64().unwrap().get(0).unwrap();
        assert!((value - 11.0f64.ln()).abs() < 1e-12);
        assert!((value - 2.3979).abs() < 1e-4);
    }

    #[test]
    fn test_log_domain_violation() {
        let df = df!("right" => right_skewed()).unwrap();
        let mut handler = SkewHandler::new(vec!["right".to_string()], 1.0);
        handler.fit(&df).unwrap();

        let input = df!("right" => &[-2.0]).unwrap();
        let err = handler.transform(&input).unwrap_err();
        assert!(matches!(err, PredictError::Domain(_)));
    }

    #[test]
    fn test_transform_is_idempotent_given_fixed_input() {
        let df = df!("left" => left_skewed()).unwrap();
        let mut handler = SkewHandler::new(vec!["left".to_string()], 1.0);
        handler.fit(&df).unwrap();

        let input = df!("left" => &[-5.0, 0.0, 3.0]).unwrap();
        let first = handler.transform(&input).unwrap();
        let second = handler.transform(&input).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_yeojohnson_monotonic() {
        let df = df!("left" => left_skewed()).unwrap();
        let mut handler = SkewHandler::new(vec!["left".to_string()], 1.0);
        handler.fit(&df).unwrap();

        let input = df!("left" => &[-10.0, -1.0, 0.0, 1.0, 10.0]).unwrap();
        let result = handler.transform(&input).unwrap();
        let values: Vec<f64> = result
            .column("left")
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();

        for pair in values.windows(2) {
            assert!(pair[0] < pair[1], "expected monotonic output: {values:?}");
        }
    }

    #[test]
    fn test_method_frozen_at_fit() {
        // Fit on right-skewed data, then transform a left-skewed input:
        // the log method chosen at fit time must still apply.
        let df = df!("col" => right_skewed()).unwrap();
        let mut handler = SkewHandler::new(vec!["col".to_string()], 1.0);
        handler.fit(&df).unwrap();

        let input = df!("col" => left_skewed().iter().map(|v| v.abs()).collect::<Vec<_>>()).unwrap();
        let result = handler.transform(&input).unwrap();
        let first = result.column("col").unwrap().f64().unwrap().get(0).unwrap();
        assert!((first - (1.0 + 50.0f64).ln()).abs() < 1e-12);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let handler = SkewHandler::new(vec!["col".to_string()], 1.0);
        let df = df!("col" => &[1.0]).unwrap();
        assert!(matches!(
            handler.transform(&df).unwrap_err(),
            PredictError::FitState(_)
        ));
    }
}
