//! Gauss-Legendre quadrature on the reference cell `[0, 1]`.

use crate::error::{Error, Result};

/// Highest polynomial degree integrated exactly by the available rules.
pub const MAX_EXACT_DEGREE: usize = 9;

// (point, weight) pairs on [-1, 1]
const GAUSS_1: [(f64, f64); 1] = [(0.0, 2.0)];
const GAUSS_2: [(f64, f64); 2] = [
    (-0.577_350_269_189_625_8, 1.0),
    (0.577_350_269_189_625_8, 1.0),
];
const GAUSS_3: [(f64, f64); 3] = [
    (-0.774_596_669_241_483_4, 0.555_555_555_555_555_6),
    (0.0, 0.888_888_888_888_888_9),
    (0.774_596_669_241_483_4, 0.555_555_555_555_555_6),
];
const GAUSS_4: [(f64, f64); 4] = [
    (-0.861_136_311_594_052_6, 0.347_854_845_137_453_9),
    (-0.339_981_043_584_856_3, 0.652_145_154_862_546_1),
    (0.339_981_043_584_856_3, 0.652_145_154_862_546_1),
    (0.861_136_311_594_052_6, 0.347_854_845_137_453_9),
];
const GAUSS_5: [(f64, f64); 5] = [
    (-0.906_179_845_938_664_0, 0.236_926_885_056_189_1),
    (-0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
    (0.0, 0.568_888_888_888_888_9),
    (0.538_469_310_105_683_1, 0.478_628_670_499_366_5),
    (0.906_179_845_938_664_0, 0.236_926_885_056_189_1),
];

/// Rule integrating polynomials of `degree` exactly, mapped to `[0, 1]`.
pub fn gauss_legendre(degree: usize) -> Result<Vec<(f64, f64)>> {
    let rule: &[(f64, f64)] = match degree / 2 + 1 {
        1 => &GAUSS_1,
        2 => &GAUSS_2,
        3 => &GAUSS_3,
        4 => &GAUSS_4,
        5 => &GAUSS_5,
        _ => {
            return Err(Error::InvalidParameter(format!(
                "quadrature degree {} exceeds the supported maximum {}",
                degree, MAX_EXACT_DEGREE
            )));
        }
    };

    Ok(rule
        .iter()
        .map(|&(t, w)| (0.5 * (t + 1.0), 0.5 * w))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_cell_length() {
        for degree in 0..=MAX_EXACT_DEGREE {
            let rule = gauss_legendre(degree).unwrap();
            let total: f64 = rule.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-14, "degree {}", degree);
        }
    }

    #[test]
    fn integrates_monomials_exactly() {
        for degree in 0..=MAX_EXACT_DEGREE {
            let rule = gauss_legendre(degree).unwrap();
            let integral: f64 = rule.iter().map(|(x, w)| w * x.powi(degree as i32)).sum();
            let exact = 1.0 / (degree as f64 + 1.0);
            assert!((integral - exact).abs() < 1e-13, "degree {}", degree);
        }
    }

    #[test]
    fn too_high_degree_is_rejected() {
        assert!(gauss_legendre(MAX_EXACT_DEGREE + 1).is_err());
    }
}
