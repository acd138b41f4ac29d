//! Rational numbers and linear polynomials over named index variables
//!
//! These are the index expressions a contraction is written in. A
//! polynomial is kept sparse: zero coefficients are never stored.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Least common multiple of two positive integers
pub fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b) * b).abs()
}

/// A normalized fraction: the denominator is positive and coprime to the numerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i64,
    den: i64,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    /// Panics if `den` is zero
    pub fn new(num: i64, den: i64) -> Self {
        assert!(den != 0, "zero denominator");
        let g = gcd(num, den).max(1);
        let sign = if den < 0 { -1 } else { 1 };
        Self {
            num: sign * num / g,
            den: sign * den / g,
        }
    }

    pub fn numer(&self) -> i64 {
        self.num
    }

    pub fn denom(&self) -> i64 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn floor(&self) -> i64 {
        self.num.div_euclid(self.den)
    }

    pub fn ceil(&self) -> i64 {
        -(-self.num).div_euclid(self.den)
    }

    pub fn abs(&self) -> Self {
        Self {
            num: self.num.abs(),
            den: self.den,
        }
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Self { num: n, den: 1 }
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl Add for Rational {
    type Output = Rational;
    fn add(self, rhs: Rational) -> Rational {
        Rational::new(self.num * rhs.den + rhs.num * self.den, self.den * rhs.den)
    }
}

impl Sub for Rational {
    type Output = Rational;
    fn sub(self, rhs: Rational) -> Rational {
        self + -rhs
    }
}

impl Mul for Rational {
    type Output = Rational;
    fn mul(self, rhs: Rational) -> Rational {
        Rational::new(self.num * rhs.num, self.den * rhs.den)
    }
}

/// Panics on division by zero
impl Div for Rational {
    type Output = Rational;
    fn div(self, rhs: Rational) -> Rational {
        Rational::new(self.num * rhs.den, self.den * rhs.num)
    }
}

impl Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        Rational {
            num: -self.num,
            den: self.den,
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// A linear polynomial `c0 + c1*x1 + ... + cn*xn` with rational coefficients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Polynomial {
    terms: BTreeMap<String, Rational>,
    constant: Rational,
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl Polynomial {
    pub fn new() -> Self {
        Self::default()
    }

    /// A polynomial consisting of a single index with coefficient one
    pub fn var(name: impl Into<String>) -> Self {
        Self::term(name, Rational::ONE)
    }

    pub fn term(name: impl Into<String>, coeff: Rational) -> Self {
        let mut poly = Self::new();
        poly.add_term(name.into(), coeff);
        poly
    }

    pub fn constant_of(value: impl Into<Rational>) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value.into(),
        }
    }

    pub fn constant(&self) -> Rational {
        self.constant
    }

    pub fn coeff(&self, name: &str) -> Rational {
        self.terms.get(name).copied().unwrap_or(Rational::ZERO)
    }

    /// Index terms in name order (the constant is not included)
    pub fn terms(&self) -> impl Iterator<Item = (&str, Rational)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// Number of stored terms, counting a nonzero constant as a term
    pub fn term_count(&self) -> usize {
        self.terms.len() + usize::from(!self.constant.is_zero())
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// The polynomial without its constant term
    pub fn linear_part(&self) -> Polynomial {
        Polynomial {
            terms: self.terms.clone(),
            constant: Rational::ZERO,
        }
    }

    fn add_term(&mut self, name: String, coeff: Rational) {
        let entry = self.terms.entry(name).or_insert(Rational::ZERO);
        *entry = *entry + coeff;
        if entry.is_zero() {
            self.terms.retain(|_, c| !c.is_zero());
        }
    }

    /// Replace every occurrence of `name` with `value`
    pub fn substitute(&self, name: &str, value: &Polynomial) -> Polynomial {
        let coeff = self.coeff(name);
        if coeff.is_zero() {
            return self.clone();
        }
        let mut rest = self.clone();
        rest.terms.remove(name);
        rest + value.clone() * coeff
    }
}

impl Add for Polynomial {
    type Output = Polynomial;
    fn add(mut self, rhs: Polynomial) -> Polynomial {
        self += rhs;
        self
    }
}

impl AddAssign for Polynomial {
    fn add_assign(&mut self, rhs: Polynomial) {
        for (name, coeff) in rhs.terms {
            self.add_term(name, coeff);
        }
        self.constant = self.constant + rhs.constant;
    }
}

impl Sub for Polynomial {
    type Output = Polynomial;
    fn sub(mut self, rhs: Polynomial) -> Polynomial {
        self -= rhs;
        self
    }
}

impl SubAssign for Polynomial {
    fn sub_assign(&mut self, rhs: Polynomial) {
        *self += -rhs;
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;
    fn neg(self) -> Polynomial {
        self * -Rational::ONE
    }
}

impl Mul<Rational> for Polynomial {
    type Output = Polynomial;
    fn mul(self, rhs: Rational) -> Polynomial {
        if rhs.is_zero() {
            return Polynomial::new();
        }
        Polynomial {
            terms: self.terms.into_iter().map(|(k, v)| (k, v * rhs)).collect(),
            constant: self.constant * rhs,
        }
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, coeff) in &self.terms {
            let mag = coeff.abs();
            if first {
                if coeff.numer() < 0 {
                    write!(f, "-")?;
                }
            } else if coeff.numer() < 0 {
                write!(f, " - ")?;
            } else {
                write!(f, " + ")?;
            }
            if mag == Rational::ONE {
                write!(f, "{}", name)?;
            } else {
                write!(f, "{}*{}", mag, name)?;
            }
            first = false;
        }
        if first {
            return write!(f, "{}", self.constant);
        }
        if !self.constant.is_zero() {
            let sign = if self.constant.numer() < 0 { "-" } else { "+" };
            write!(f, " {} {}", sign, self.constant.abs())?;
        }
        Ok(())
    }
}

impl FromStr for Polynomial {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_polynomial(s)
    }
}

impl TryFrom<String> for Polynomial {
    type Error = CompileError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Polynomial> for String {
    fn from(poly: Polynomial) -> String {
        poly.to_string()
    }
}
