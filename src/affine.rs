//! Integer affine expressions over named block indexes
//!
//! An [`Affine`] is what the block IR uses for refinement accesses and
//! constraints: a constant plus a sparse weighted sum of index variables.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::Serialize;

/// `constant + sum(coeff * index)`, with zero coefficients never stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Affine {
    terms: BTreeMap<String, i64>,
    constant: i64,
}

impl Affine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(name: impl Into<String>) -> Self {
        Self::term(name, 1)
    }

    pub fn term(name: impl Into<String>, coeff: i64) -> Self {
        let mut affine = Self::new();
        affine.add_term(name.into(), coeff);
        affine
    }

    pub fn constant(&self) -> i64 {
        self.constant
    }

    pub fn coeff(&self, name: &str) -> i64 {
        self.terms.get(name).copied().unwrap_or(0)
    }

    /// Index terms in name order
    pub fn terms(&self) -> impl Iterator<Item = (&str, i64)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty() && self.constant == 0
    }

    /// If this is exactly `1 * index`, the index name
    pub fn as_simple_index(&self) -> Option<&str> {
        if self.constant != 0 || self.terms.len() != 1 {
            return None;
        }
        self.terms
            .iter()
            .next()
            .filter(|(_, coeff)| **coeff == 1)
            .map(|(name, _)| name.as_str())
    }

    fn add_term(&mut self, name: String, coeff: i64) {
        let entry = self.terms.entry(name.clone()).or_insert(0);
        *entry += coeff;
        if *entry == 0 {
            self.terms.remove(&name);
        }
    }

    /// Replace the listed indexes by fixed values
    pub fn partial_eval(&self, values: &BTreeMap<String, i64>) -> Affine {
        let mut result = Affine::from(self.constant);
        for (name, coeff) in &self.terms {
            match values.get(name) {
                Some(value) => result.constant += coeff * value,
                None => result.add_term(name.clone(), *coeff),
            }
        }
        result
    }
}

impl From<i64> for Affine {
    fn from(constant: i64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant,
        }
    }
}

impl PartialEq<i64> for Affine {
    fn eq(&self, other: &i64) -> bool {
        self.terms.is_empty() && self.constant == *other
    }
}

impl AddAssign for Affine {
    fn add_assign(&mut self, rhs: Affine) {
        for (name, coeff) in rhs.terms {
            self.add_term(name, coeff);
        }
        self.constant += rhs.constant;
    }
}

impl AddAssign<i64> for Affine {
    fn add_assign(&mut self, rhs: i64) {
        self.constant += rhs;
    }
}

impl SubAssign for Affine {
    fn sub_assign(&mut self, rhs: Affine) {
        *self += -rhs;
    }
}

impl SubAssign<i64> for Affine {
    fn sub_assign(&mut self, rhs: i64) {
        self.constant -= rhs;
    }
}

impl Add for Affine {
    type Output = Affine;
    fn add(mut self, rhs: Affine) -> Affine {
        self += rhs;
        self
    }
}

impl Sub for Affine {
    type Output = Affine;
    fn sub(mut self, rhs: Affine) -> Affine {
        self -= rhs;
        self
    }
}

impl Neg for Affine {
    type Output = Affine;
    fn neg(self) -> Affine {
        self * -1
    }
}

impl Mul<i64> for Affine {
    type Output = Affine;
    fn mul(self, rhs: i64) -> Affine {
        if rhs == 0 {
            return Affine::new();
        }
        Affine {
            terms: self.terms.into_iter().map(|(k, v)| (k, v * rhs)).collect(),
            constant: self.constant * rhs,
        }
    }
}

impl fmt::Display for Affine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, coeff) in &self.terms {
            if first {
                if *coeff < 0 {
                    write!(f, "-")?;
                }
            } else if *coeff < 0 {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            if coeff.abs() == 1 {
                write!(f, "{}", name)?;
            } else {
                write!(f, "{}*{}", coeff.abs(), name)?;
            }
            first = false;
        }
        if first {
            return write!(f, "{}", self.constant);
        }
        if self.constant != 0 {
            let sign = if self.constant < 0 { "-" } else { "+" };
            write!(f, " {} {}", sign, self.constant.abs())?;
        }
        Ok(())
    }
}

impl From<Affine> for String {
    fn from(affine: Affine) -> String {
        affine.to_string()
    }
}
