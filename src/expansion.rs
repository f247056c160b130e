//! # Jm expansion engines
//!
//! Two independent exact-arithmetic expansions of a Jones polynomial, each
//! yielding the Jm triviality index — the lowest nontrivial order at which
//! the expansion departs from the unknot's.
//!
//! - **Birman-Lin** ([`taylor_expansion`] / [`jm_taylor`]): the Taylor
//!   expansion of V(e^h) in h via rational power sums, a_m = M_m / m!.
//! - **JVP ring substitution** ([`jones_to_vxp`] / [`jm_ring`]): rewriting V
//!   in the ring generated by x with x·(x−p) = 1, as A(p) + B(p)·x.
//!
//! Under consistent variable conventions both engines report the same Jm for
//! the same knot. The trefoil {4:-1, 3:1, 1:1} classifies as Jm = 3 either way:
//!
//! ```rust
//! use jmscan::expansion::{jm_ring, jm_taylor};
//! use jmscan::poly::Laurent;
//!
//! let trefoil = Laurent::from_terms([(4, -1), (3, 1), (1, 1)]);
//! assert_eq!(jm_taylor(&trefoil, 11, 1).unwrap(), 3);
//! assert_eq!(jm_ring(&trefoil, false).unwrap(), 3);
//! ```

use crate::poly::{Laurent, PPoly};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};
use thiserror::Error;

/// Outcomes where an engine cannot produce a Jm index.
///
/// `Indeterminate` is a real boundary condition of the truncated Taylor
/// expansion: every post-constant coefficient up to the requested order was
/// zero. It is surfaced explicitly — callers must not coerce it to a default
/// index, since a fabricated value would corrupt the statistics. The unknot's
/// trivial map reaches it from both engines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JmError {
    #[error("empty coefficient map")]
    EmptyPolynomial,
    #[error("no nonzero coefficient past the constant term within order {order}")]
    Indeterminate { order: usize },
}

/// Which expansion computes the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Ring substitution x·(x−p) = 1 (default)
    Jvp,
    /// Taylor/power-sum expansion of V(e^h)
    BirmanLin,
}

impl Representation {
    /// Parse a representation selector from its CLI name.
    pub fn from_str(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "jvp" => Some(Representation::Jvp),
            "bl" | "birman-lin" => Some(Representation::BirmanLin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Jvp => "jvp",
            Representation::BirmanLin => "birman-lin",
        }
    }
}

/// Classify a corpus coefficient map with the selected engine.
///
/// Corpus records store integer-power exponents, so the Taylor engine runs
/// with `exponent_den = 1` and the ring engine with integer-power input.
/// `order` is the Taylor truncation order; the ring engine ignores it.
pub fn classify(v: &Laurent, rep: Representation, order: usize) -> Result<u32, JmError> {
    match rep {
        Representation::Jvp => jm_ring(v, false),
        Representation::BirmanLin => jm_taylor(v, order, 1),
    }
}

/// Taylor coefficients [a_0, ..., a_n] of V(e^h) = Σ a_m h^m + O(h^{n+1}).
///
/// Each exponent k is read as the rational r = k / `exponent_den`; pass
/// `exponent_den = 2` when integer keys encode half-integer powers of q.
/// Power sums M_m = Σ c_k·r^m accumulate exactly, one incremental r-power
/// pass per term, and a_m = M_m / m!.
pub fn taylor_expansion(v: &Laurent, n: usize, exponent_den: i64) -> Vec<BigRational> {
    debug_assert!(exponent_den > 0);
    let mut sums = vec![BigRational::zero(); n + 1];
    for (k, c) in v.iter() {
        let c = BigRational::from_integer(BigInt::from(c));
        let r = BigRational::new(BigInt::from(k), BigInt::from(exponent_den));
        let mut r_pow = BigRational::one();
        for sum in sums.iter_mut() {
            *sum += &r_pow * &c;
            r_pow *= &r;
        }
    }
    let mut factorial = BigInt::one();
    for (m, sum) in sums.iter_mut().enumerate() {
        if m > 1 {
            factorial *= m as u64;
            *sum /= BigRational::from_integer(factorial.clone());
        }
    }
    sums
}

/// Jm from the Birman-Lin expansion truncated at `order`.
///
/// The first nonzero a_m with m ≥ 1 yields Jm = m + 1. If every one of
/// a_1..a_order vanishes the index is undetermined at this order.
pub fn jm_taylor(v: &Laurent, order: usize, exponent_den: i64) -> Result<u32, JmError> {
    if v.is_empty() {
        return Err(JmError::EmptyPolynomial);
    }
    let coeffs = taylor_expansion(v, order, exponent_den);
    for (m, a) in coeffs.iter().enumerate().skip(1) {
        if !a.is_zero() {
            return Ok(m as u32 + 1);
        }
    }
    Err(JmError::Indeterminate { order })
}

// x·(A + Bx) = B + (A + pB)x
fn mul_by_x(a: &PPoly, b: &PPoly) -> (PPoly, PPoly) {
    (b.clone(), a.add(&b.shift_up()))
}

// y·(A + Bx) = (B − pA) + Ax, with y = x − p
fn mul_by_y(a: &PPoly, b: &PPoly) -> (PPoly, PPoly) {
    (b.add(&a.shift_up().scale(-1)), a.clone())
}

/// Table [(A_0, B_0), ..., (A_n, B_n)] with x^k = A_k + B_k·x.
fn power_table_x(n: usize) -> Vec<(PPoly, PPoly)> {
    let mut table = vec![(PPoly::constant(1), PPoly::zero())];
    if n == 0 {
        return table;
    }
    let (mut a, mut b) = (PPoly::zero(), PPoly::constant(1));
    table.push((a.clone(), b.clone()));
    for _ in 2..=n {
        let (na, nb) = mul_by_x(&a, &b);
        a = na;
        b = nb;
        table.push((a.clone(), b.clone()));
    }
    table
}

/// Table [(A_0, B_0), ..., (A_n, B_n)] with y^k = (x−p)^k = A_k + B_k·x.
fn power_table_y(n: usize) -> Vec<(PPoly, PPoly)> {
    let mut table = vec![(PPoly::constant(1), PPoly::zero())];
    if n == 0 {
        return table;
    }
    let (mut a, mut b) = (PPoly::from_terms([(1, -1)]), PPoly::constant(1));
    table.push((a.clone(), b.clone()));
    for _ in 2..=n {
        let (na, nb) = mul_by_y(&a, &b);
        a = na;
        b = nb;
        table.push((a.clone(), b.clone()));
    }
    table
}

/// Rewrite V(q) = Σ c_k q^k as V(x, p) = A(p) + B(p)·x under x·(x−p) = 1.
///
/// With `input_q_is_half_power` the input variable already equals the ring
/// generator, so q^k → x^k and q^{-m} → (x−p)^m. Otherwise q = x² and every
/// exponent doubles. The tables are built exactly up to the largest needed
/// power, so unlike the truncated Taylor series nothing is cut off.
pub fn jones_to_vxp(v: &Laurent, input_q_is_half_power: bool) -> (PPoly, PPoly) {
    if v.is_empty() {
        return (PPoly::zero(), PPoly::zero());
    }
    let scale = if input_q_is_half_power { 1 } else { 2 };
    let x_table = power_table_x((v.max_positive_exp() * scale) as usize);
    let y_table = power_table_y((v.max_negative_exp() * scale) as usize);

    let mut a_total = PPoly::zero();
    let mut b_total = PPoly::zero();
    for (k, c) in v.iter() {
        let (a_k, b_k) = if k >= 0 {
            &x_table[(k * scale) as usize]
        } else {
            &y_table[(-k * scale) as usize]
        };
        a_total = a_total.add(&a_k.scale(c as i128));
        b_total = b_total.add(&b_k.scale(c as i128));
    }
    (a_total, b_total)
}

/// Jm from the ring substitution.
///
/// A_total and B_total merge coefficient-wise by degree in p; the first
/// nonzero merged coefficient at degree d ≥ 1 yields Jm = d + 1.
pub fn jm_ring(v: &Laurent, input_q_is_half_power: bool) -> Result<u32, JmError> {
    if v.is_empty() {
        return Err(JmError::EmptyPolynomial);
    }
    let (a, b) = jones_to_vxp(v, input_q_is_half_power);
    let max_deg = a.degree().unwrap_or(0).max(b.degree().unwrap_or(0));
    for d in 1..=max_deg {
        if a.coeff(d) + b.coeff(d) != 0 {
            return Ok(d + 1);
        }
    }
    Err(JmError::Indeterminate {
        order: max_deg as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(num: i64, den: i64) -> BigRational {
        BigRational::new(BigInt::from(num), BigInt::from(den))
    }

    fn trefoil() -> Laurent {
        Laurent::from_terms([(4, -1), (3, 1), (1, 1)])
    }

    fn figure_eight() -> Laurent {
        Laurent::from_terms([(2, 1), (1, -1), (0, 1), (-1, -1), (-2, 1)])
    }

    fn unknot() -> Laurent {
        Laurent::from_terms([(0, 1)])
    }

    #[test]
    fn taylor_trefoil_known_values() {
        let a = taylor_expansion(&trefoil(), 6, 1);
        let expected = [
            rat(1, 1),
            rat(0, 1),
            rat(-3, 1),
            rat(-6, 1),
            rat(-29, 4),
            rat(-13, 2),
            rat(-187, 40),
        ];
        assert_eq!(a, expected);
    }

    #[test]
    fn taylor_half_power_input_matches_integer_power() {
        // Trefoil written in powers of q^{1/2}: exponents doubled, den = 2.
        let half = Laurent::from_terms([(8, -1), (6, 1), (2, 1)]);
        assert_eq!(taylor_expansion(&half, 6, 2), taylor_expansion(&trefoil(), 6, 1));
    }

    #[test]
    fn ring_trefoil_known_tables() {
        let (a, b) = jones_to_vxp(&trefoil(), false);
        assert_eq!(a, PPoly::from_terms([(0, 1), (2, -3), (4, -4), (6, -1)]));
        assert_eq!(b, PPoly::from_terms([(3, -6), (5, -5), (7, -1)]));
    }

    #[test]
    fn ring_mirror_trefoil_known_tables() {
        let (a, b) = jones_to_vxp(&trefoil().mirror(), false);
        assert_eq!(
            a,
            PPoly::from_terms([(0, 1), (2, -3), (4, -10), (6, -6), (8, -1)])
        );
        assert_eq!(b, PPoly::from_terms([(3, 6), (5, 5), (7, 1)]));
    }

    #[test]
    fn ring_half_power_unlink() {
        // V = -q - q^{-1} with q already the half-power variable: p - 2x.
        let unlink = Laurent::from_terms([(1, -1), (-1, -1)]);
        let (a, b) = jones_to_vxp(&unlink, true);
        assert_eq!(a, PPoly::from_terms([(1, 1)]));
        assert_eq!(b, PPoly::from_terms([(0, -2)]));
    }

    #[test]
    fn ring_half_power_equals_doubled_integer_power() {
        let half = Laurent::from_terms([(8, -1), (6, 1), (2, 1)]);
        assert_eq!(jones_to_vxp(&half, true), jones_to_vxp(&trefoil(), false));
    }

    #[test]
    fn engines_agree_on_trefoil() {
        assert_eq!(jm_taylor(&trefoil(), 11, 1).unwrap(), 3);
        assert_eq!(jm_ring(&trefoil(), false).unwrap(), 3);
    }

    #[test]
    fn engines_agree_on_mirror() {
        let mirror = trefoil().mirror();
        assert_eq!(jm_taylor(&mirror, 11, 1).unwrap(), 3);
        assert_eq!(jm_ring(&mirror, false).unwrap(), 3);
    }

    #[test]
    fn engines_agree_on_figure_eight() {
        assert_eq!(jm_taylor(&figure_eight(), 11, 1).unwrap(), 3);
        assert_eq!(jm_ring(&figure_eight(), false).unwrap(), 3);
    }

    #[test]
    fn unknot_is_indeterminate_not_a_fabricated_index() {
        assert_eq!(
            jm_taylor(&unknot(), 11, 1),
            Err(JmError::Indeterminate { order: 11 })
        );
        assert_eq!(jm_ring(&unknot(), false), Err(JmError::Indeterminate { order: 0 }));
    }

    #[test]
    fn truncation_too_low_is_indeterminate() {
        assert_eq!(
            jm_taylor(&trefoil(), 1, 1),
            Err(JmError::Indeterminate { order: 1 })
        );
    }

    #[test]
    fn empty_map_is_rejected() {
        assert_eq!(jm_taylor(&Laurent::new(), 11, 1), Err(JmError::EmptyPolynomial));
        assert_eq!(jm_ring(&Laurent::new(), false), Err(JmError::EmptyPolynomial));
    }

    #[test]
    fn representation_round_trip() {
        assert_eq!(Representation::from_str("jvp"), Some(Representation::Jvp));
        assert_eq!(Representation::from_str("JVP"), Some(Representation::Jvp));
        assert_eq!(Representation::from_str("bl"), Some(Representation::BirmanLin));
        assert_eq!(
            Representation::from_str("birman-lin"),
            Some(Representation::BirmanLin)
        );
        assert_eq!(Representation::from_str("taylor"), None);
        assert_eq!(Representation::Jvp.as_str(), "jvp");
    }

    #[test]
    fn classify_dispatches_both_engines() {
        let v = trefoil();
        assert_eq!(classify(&v, Representation::Jvp, 11).unwrap(), 3);
        assert_eq!(classify(&v, Representation::BirmanLin, 11).unwrap(), 3);
    }
}
