//! # Sparse polynomial types
//!
//! Two map-backed polynomial representations underpin the classifier:
//!
//! - [`Laurent`] — a Jones polynomial V(q) = Σ c_k q^k as a map from integer
//!   exponent to nonzero coefficient. Exponents may be negative; half-integer
//!   powers are handled by the callers via an exponent denominator.
//! - [`PPoly`] — a polynomial in the ring generator p as a map from degree to
//!   nonzero coefficient, used by the ring-substitution engine.
//!
//! Zero coefficients are never stored: every constructor and operation drops
//! them, so `is_zero` and degree queries stay O(1)/O(log n) on the map.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while building a [`Laurent`] from corpus data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolyError {
    /// An exponent key in a record's coefficient map was not an integer.
    #[error("malformed exponent key: {0:?}")]
    BadExponent(String),
}

/// A Laurent polynomial V(q) = Σ c_k q^k with integer coefficients.
///
/// # Example
///
/// ```rust
/// use jmscan::poly::Laurent;
///
/// // Trefoil: V(q) = -q^4 + q^3 + q
/// let v = Laurent::from_terms([(4, -1), (3, 1), (1, 1)]);
/// assert_eq!(v.coeff(3), 1);
/// assert_eq!(v.coeff(2), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Laurent {
    terms: BTreeMap<i64, i64>,
}

impl Laurent {
    pub fn new() -> Self {
        Laurent::default()
    }

    /// Build from (exponent, coefficient) pairs, dropping zero coefficients.
    pub fn from_terms<I: IntoIterator<Item = (i64, i64)>>(terms: I) -> Self {
        let mut poly = Laurent::new();
        for (exp, coeff) in terms {
            poly.insert(exp, coeff);
        }
        poly
    }

    /// Build from a corpus `coeffs` map with string exponent keys.
    ///
    /// Keys must parse as (possibly negative) integers; any other key makes
    /// the record unusable as a whole.
    pub fn from_string_map(map: &BTreeMap<String, i64>) -> Result<Self, PolyError> {
        let mut poly = Laurent::new();
        for (key, &coeff) in map {
            let exp: i64 = key
                .trim()
                .parse()
                .map_err(|_| PolyError::BadExponent(key.clone()))?;
            poly.insert(exp, coeff);
        }
        Ok(poly)
    }

    /// Set the coefficient of q^exp. A zero coefficient removes the term.
    pub fn insert(&mut self, exp: i64, coeff: i64) {
        if coeff == 0 {
            self.terms.remove(&exp);
        } else {
            self.terms.insert(exp, coeff);
        }
    }

    pub fn coeff(&self, exp: i64) -> i64 {
        self.terms.get(&exp).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Terms in increasing exponent order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.terms.iter().map(|(&e, &c)| (e, c))
    }

    /// Largest non-negative exponent, or 0 if there is none.
    pub fn max_positive_exp(&self) -> i64 {
        self.terms
            .keys()
            .rev()
            .find(|&&e| e >= 0)
            .copied()
            .unwrap_or(0)
    }

    /// Largest magnitude among negative exponents, or 0 if there is none.
    pub fn max_negative_exp(&self) -> i64 {
        self.terms.keys().find(|&&e| e < 0).map(|&e| -e).unwrap_or(0)
    }

    /// The mirror knot's polynomial: every exponent negated.
    pub fn mirror(&self) -> Laurent {
        Laurent::from_terms(self.iter().map(|(e, c)| (-e, c)))
    }
}

/// A polynomial in p with i128 coefficients, sparse by degree.
///
/// The ring-substitution engine represents every ring element as
/// A(p) + B(p)·x; this is the A/B half. Supports the three operations the
/// power-table recurrences need: addition, scalar multiplication, and the
/// degree shift that multiplying by p performs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PPoly {
    terms: BTreeMap<u32, i128>,
}

impl PPoly {
    pub fn zero() -> Self {
        PPoly::default()
    }

    /// The constant polynomial c.
    pub fn constant(c: i128) -> Self {
        let mut poly = PPoly::zero();
        poly.insert(0, c);
        poly
    }

    pub fn from_terms<I: IntoIterator<Item = (u32, i128)>>(terms: I) -> Self {
        let mut poly = PPoly::zero();
        for (deg, coeff) in terms {
            poly.insert(deg, coeff);
        }
        poly
    }

    pub fn insert(&mut self, deg: u32, coeff: i128) {
        if coeff == 0 {
            self.terms.remove(&deg);
        } else {
            self.terms.insert(deg, coeff);
        }
    }

    pub fn coeff(&self, deg: u32) -> i128 {
        self.terms.get(&deg).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Highest degree with a nonzero coefficient, if any.
    pub fn degree(&self) -> Option<u32> {
        self.terms.keys().next_back().copied()
    }

    /// Sparse sum; zero results are dropped.
    pub fn add(&self, other: &PPoly) -> PPoly {
        let mut out = self.clone();
        for (&deg, &coeff) in &other.terms {
            let sum = out.coeff(deg) + coeff;
            out.insert(deg, sum);
        }
        out
    }

    pub fn scale(&self, k: i128) -> PPoly {
        if k == 0 {
            return PPoly::zero();
        }
        PPoly {
            terms: self.terms.iter().map(|(&d, &c)| (d, c * k)).collect(),
        }
    }

    /// Multiply by p: every degree shifted up by one.
    pub fn shift_up(&self) -> PPoly {
        PPoly {
            terms: self.terms.iter().map(|(&d, &c)| (d + 1, c)).collect(),
        }
    }
}
