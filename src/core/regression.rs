// 營收線性迴歸：特徵先中心化並以 L2 norm 縮放再解正規方程，係數換回原始單位

use crate::config::settings::ModelSettings;
use crate::domain::model::{CoefficientWeight, ModelReport};
use crate::domain::table::Table;
use crate::utils::error::{EtlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

/// 正規化後對角線加上的微小 ridge 項，讓共線的 dummy 欄位仍可求解
const RIDGE: f64 = 1e-8;

#[derive(Error, Debug)]
pub enum RegressionError {
    #[error("Matrix is singular and cannot be factorised")]
    SingularMatrix,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Model has not been fitted yet")]
    NotFitted,

    #[error("Not enough samples: {0}")]
    NotEnoughSamples(String),
}

#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> std::result::Result<(), RegressionError> {
        let n = x.nrows();
        if n != y.len() {
            return Err(RegressionError::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if n == 0 {
            return Err(RegressionError::NotEnoughSamples(
                "training set is empty".to_string(),
            ));
        }

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| RegressionError::NotEnoughSamples("training set is empty".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        let centred = x - &x_mean;
        let norms = centred.map_axis(Axis(0), |col| col.dot(&col).sqrt());
        // 常數欄位 (norm 為 0) 不參與求解，係數固定為 0
        let scale = norms.mapv(|norm| if norm > 0.0 { norm } else { 1.0 });
        let z = &centred / &scale;
        let y_centred = y - y_mean;

        let mut gram = z.t().dot(&z);
        for (i, norm) in norms.iter().enumerate() {
            gram[[i, i]] += if *norm > 0.0 { RIDGE } else { 1.0 };
        }
        let rhs = z.t().dot(&y_centred);

        let beta = cholesky_solve(&gram, &rhs)?;
        let coefficients: Array1<f64> = beta
            .iter()
            .zip(norms.iter())
            .map(|(b, norm)| if *norm > 0.0 { b / norm } else { 0.0 })
            .collect();

        self.intercept = Some(y_mean - x_mean.dot(&coefficients));
        self.coefficients = Some(coefficients);
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> std::result::Result<Array1<f64>, RegressionError> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or(RegressionError::NotFitted)?;
        let intercept = self.intercept.ok_or(RegressionError::NotFitted)?;

        if x.ncols() != coefficients.len() {
            return Err(RegressionError::DimensionMismatch {
                expected: coefficients.len(),
                got: x.ncols(),
            });
        }

        Ok(x.dot(coefficients) + intercept)
    }
}

/// Solve `a x = b` for a symmetric positive definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> std::result::Result<Array1<f64>, RegressionError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(RegressionError::SingularMatrix);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}

/// 打散後切分，測試集取 ceil(test_size * n) 筆
pub fn train_test_split(
    n_samples: usize,
    test_size: f64,
    random_state: u64,
) -> std::result::Result<(Vec<usize>, Vec<usize>), RegressionError> {
    let n_test = (test_size * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(RegressionError::NotEnoughSamples(format!(
            "{} rows cannot be split with test_size {}",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(random_state);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// 殘差平方和為 0 時視為完美預測
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_tot: f64 = y_true.iter().map(|&y| (y - mean).powi(2)).sum();
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&y, &p)| (y - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

pub fn mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&y, &p)| (y - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// 係數依絕對值由大到小排序
pub fn coef_weights(coefficients: &Array1<f64>, features: &[String]) -> Vec<CoefficientWeight> {
    let mut weights: Vec<CoefficientWeight> = features
        .iter()
        .zip(coefficients.iter())
        .map(|(feature, &coef)| CoefficientWeight {
            feature: feature.clone(),
            coef,
            abs_coef: coef.abs(),
        })
        .collect();
    weights.sort_by(|a, b| b.abs_coef.total_cmp(&a.abs_coef));
    weights
}

/// 從清理後的表格取出目標與特徵矩陣
pub fn design_matrix(
    df: &Table,
    settings: &ModelSettings,
) -> Result<(Array2<f64>, Array1<f64>, Vec<String>)> {
    let target_idx = df.require_column("model input", &settings.target)?;

    let feature_idx: Vec<usize> = (0..df.width())
        .filter(|&i| i != target_idx)
        .filter(|&i| !settings.drop_columns.contains(&df.columns()[i]))
        .collect();
    let names: Vec<String> = feature_idx.iter().map(|&i| df.columns()[i].clone()).collect();

    let mut values = Vec::with_capacity(df.len() * feature_idx.len());
    let mut targets = Vec::with_capacity(df.len());
    for (row_number, row) in df.rows().iter().enumerate() {
        for &i in &feature_idx {
            let value = row[i].as_f64().ok_or_else(|| {
                EtlError::processing(format!(
                    "Feature '{}' is not numeric at row {}",
                    df.columns()[i],
                    row_number + 1
                ))
            })?;
            values.push(value);
        }
        let target = row[target_idx].as_f64().ok_or_else(|| {
            EtlError::processing(format!(
                "Target '{}' is not numeric at row {}",
                settings.target,
                row_number + 1
            ))
        })?;
        targets.push(target);
    }

    let x = Array2::from_shape_vec((df.len(), feature_idx.len()), values)
        .map_err(|e| EtlError::processing(e.to_string()))?;
    Ok((x, Array1::from(targets), names))
}

/// 切分訓練/測試集、擬合並以測試集 R² 評分
pub fn regression_model(df: &Table, settings: &ModelSettings) -> Result<(LinearRegression, ModelReport)> {
    if df.is_empty() {
        return Err(EtlError::ValidationError {
            message: "No listing rows left after cleaning, nothing to fit".to_string(),
        });
    }
    let (x, y, names) = design_matrix(df, settings)?;
    if names.is_empty() {
        return Err(EtlError::processing("No feature columns left for the regression"));
    }

    let (train, test) = train_test_split(x.nrows(), settings.test_size, settings.random_state)?;
    let x_train = x.select(Axis(0), &train);
    let y_train = y.select(Axis(0), &train);
    let x_test = x.select(Axis(0), &test);
    let y_test = y.select(Axis(0), &test);

    tracing::debug!(
        "Fitting {} features on {} rows, {} rows held out",
        names.len(),
        train.len(),
        test.len()
    );

    let mut model = LinearRegression::new();
    model.fit(&x_train, &y_train)?;

    let y_pred = model.predict(&x_test)?;
    let r2 = r2_score(&y_test, &y_pred);
    let mse = mean_squared_error(&y_test, &y_pred);

    tracing::info!(
        "The r-squared score for your model was {} on {} values.",
        r2,
        y_test.len()
    );

    let coefficients = model
        .coefficients
        .as_ref()
        .map(|c| coef_weights(c, &names))
        .ok_or(RegressionError::NotFitted)?;

    let report = ModelReport {
        target: settings.target.clone(),
        intercept: model.intercept.unwrap_or(0.0),
        r2,
        mse,
        n_train: train.len(),
        n_test: test.len(),
        coefficients,
    };

    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::collections::HashSet;

    #[test]
    fn test_fit_recovers_exact_linear_relation() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 4.0], [4.0, 3.0], [5.0, 7.0]];
        let y = x.column(0).mapv(|v| 3.0 * v) + x.column(1).mapv(|v| -2.0 * v) + 5.0;

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 3.0).abs() < 1e-5);
        assert!((coef[1] + 2.0).abs() < 1e-5);
        assert!((model.intercept.unwrap() - 5.0).abs() < 1e-4);

        let pred = model.predict(&x).unwrap();
        assert!(r2_score(&y, &pred) > 0.999_999);
    }

    #[test]
    fn test_constant_and_duplicate_columns_are_handled() {
        // 第二欄為常數，第三欄複製第一欄
        let x = array![[1.0, 7.0, 1.0], [2.0, 7.0, 2.0], [3.0, 7.0, 3.0], [4.0, 7.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert_eq!(coef[1], 0.0);
        assert!((coef[0] + coef[2] - 2.0).abs() < 1e-5);
        let pred = model.predict(&x).unwrap();
        assert!(mean_squared_error(&y, &pred) < 1e-8);
    }

    #[test]
    fn test_predict_requires_fit() {
        let model = LinearRegression::new();
        let x = array![[1.0]];
        assert!(matches!(model.predict(&x), Err(RegressionError::NotFitted)));
    }

    #[test]
    fn test_train_test_split_sizes_and_determinism() {
        let (train, test) = train_test_split(10, 0.3, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 7);

        let all: HashSet<usize> = train.iter().chain(test.iter()).copied().collect();
        assert_eq!(all.len(), 10);

        let (train_again, test_again) = train_test_split(10, 0.3, 42).unwrap();
        assert_eq!(train, train_again);
        assert_eq!(test, test_again);

        assert!(train_test_split(1, 0.3, 42).is_err());
    }

    #[test]
    fn test_r2_score_edge_cases() {
        let y = array![1.0, 1.0];
        assert_eq!(r2_score(&y, &array![1.0, 1.0]), 1.0);
        assert_eq!(r2_score(&y, &array![0.0, 2.0]), 0.0);
        let y = array![1.0, 2.0, 3.0];
        assert!((r2_score(&y, &array![1.0, 2.0, 4.0]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_coef_weights_sorted_by_magnitude() {
        let coefs = array![0.5, -3.0, 1.0];
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let weights = coef_weights(&coefs, &names);

        let order: Vec<&str> = weights.iter().map(|w| w.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(weights[0].abs_coef, 3.0);
        assert_eq!(weights[0].coef, -3.0);
    }

    #[test]
    fn test_regression_model_on_table() {
        let mut csv = String::from("accommodates,bedrooms,1,revenue_year\n");
        for i in 0..20 {
            let accommodates = (i % 6 + 1) as f64;
            let bedrooms = (i % 3) as f64;
            let revenue = 1000.0 * accommodates + 500.0 * bedrooms + 200.0;
            csv.push_str(&format!("{},{},{},{}\n", accommodates, bedrooms, revenue / 12.0, revenue));
        }
        let table = Table::from_csv_bytes(csv.as_bytes()).unwrap();

        let (_, report) = regression_model(&table, &ModelSettings::default()).unwrap();

        assert_eq!(report.n_test, 6);
        assert_eq!(report.n_train, 14);
        assert!(report.r2 > 0.999);
        // 月份欄與目標欄不作為特徵
        assert_eq!(report.coefficients.len(), 2);
        assert_eq!(report.coefficients[0].feature, "accommodates");
        assert!((report.coefficients[0].coef - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_regression_model_rejects_empty_input() {
        let table = Table::from_csv_bytes(b"accommodates,revenue_year\n").unwrap();
        let err = regression_model(&table, &ModelSettings::default()).unwrap_err();
        assert!(matches!(err, EtlError::ValidationError { .. }));
    }

    #[test]
    fn test_regression_model_rejects_text_features() {
        let table = Table::from_csv_bytes(b"kind,revenue_year\na,1\nb,2\nc,3\nd,4\n").unwrap();
        let err = regression_model(&table, &ModelSettings::default()).unwrap_err();
        assert!(matches!(err, EtlError::ProcessingError { .. }));
    }
}
