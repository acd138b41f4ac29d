//! Index bound computation and contraction normalization
//!
//! The generator consumes these results through the [`BoundSolver`] trait.
//! [`DefaultSolver`] handles the cases the language produces in practice:
//! a fresh index for each multi-index output polynomial, boxes derived from
//! single-index constraints, interval propagation across multi-index
//! constraints, and defractionalization of indexes that always appear with
//! one shared denominator.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ast::{Contraction, TensorShape};
use crate::error::{CompileError, CompileResult};
use crate::poly::{lcm, Polynomial, Rational};

/// `0 <= poly < range`
#[derive(Debug, Clone, PartialEq)]
pub struct RangeConstraint {
    pub poly: Polynomial,
    pub range: i64,
}

impl RangeConstraint {
    pub fn new(poly: Polynomial, range: i64) -> Self {
        Self { poly, range }
    }
}

impl fmt::Display for RangeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0 <= {} < {}", self.poly, self.range)
    }
}

/// `poly <= rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleConstraint {
    pub poly: Polynomial,
    pub rhs: i64,
}

impl SimpleConstraint {
    pub fn new(poly: Polynomial, rhs: i64) -> Self {
        Self { poly, rhs }
    }
}

/// Inclusive integer range of one index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bound {
    pub min: i64,
    pub max: i64,
}

impl Bound {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> u64 {
        (self.max - self.min + 1) as u64
    }

    pub fn is_tight(&self) -> bool {
        self.min == self.max
    }
}

pub type IndexBounds = BTreeMap<String, Bound>;

/// Join constraint text for log output
pub fn constraints_to_string(cons: &[RangeConstraint]) -> String {
    cons.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
}

/// Bound and defract collaborator used by the contraction compiler
pub trait BoundSolver {
    /// Make every index variable range over integers only
    fn constrain_index_vars_to_ints(&self, cion: &Contraction) -> Contraction;

    /// Rewrite output polynomials that cannot be inverted to simple indexes
    fn reduce_output_polynomials(
        &self,
        cion: &Contraction,
        cons: &[RangeConstraint],
    ) -> CompileResult<Contraction>;

    /// Rewrite fractional-stride accesses into integer ones
    fn defract(&self, cion: &Contraction, cons: &[RangeConstraint]) -> CompileResult<Contraction>;

    /// Derive per-index bounds plus the constraints the bounds do not imply
    fn compute_bounds(
        &self,
        cons: &[RangeConstraint],
    ) -> CompileResult<(IndexBounds, Vec<SimpleConstraint>)>;

    /// One range constraint per spec dimension plus the explicit constraints
    fn gather_constraints(&self, cion: &Contraction, shapes: &[TensorShape]) -> Vec<RangeConstraint> {
        let mut cons = Vec::new();
        for (spec, shape) in cion.specs.iter().zip(shapes) {
            for (poly, dim) in spec.spec.iter().zip(&shape.dims) {
                cons.push(RangeConstraint::new(poly.clone(), dim.size as i64));
            }
        }
        for con in &cion.constraints {
            cons.push(RangeConstraint::new(con.poly.clone(), con.range as i64));
        }
        cons
    }

    /// Intersect constraints over the same (or negated) linear expression
    fn merge_parallel_constraints(&self, cons: &mut Vec<RangeConstraint>) {
        merge_parallel(cons);
    }
}

/// The solver used unless the caller injects another one
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSolver;

impl BoundSolver for DefaultSolver {
    fn constrain_index_vars_to_ints(&self, cion: &Contraction) -> Contraction {
        // Index variables are integer-valued by construction here
        cion.clone()
    }

    fn reduce_output_polynomials(
        &self,
        cion: &Contraction,
        _cons: &[RangeConstraint],
    ) -> CompileResult<Contraction> {
        Ok(reduce_multi_index_outputs(cion))
    }

    fn defract(&self, cion: &Contraction, _cons: &[RangeConstraint]) -> CompileResult<Contraction> {
        Ok(defract_shared_denominators(cion))
    }

    fn compute_bounds(
        &self,
        cons: &[RangeConstraint],
    ) -> CompileResult<(IndexBounds, Vec<SimpleConstraint>)> {
        compute_box(cons)
    }
}

fn all_integral(poly: &Polynomial) -> bool {
    poly.constant().is_integer() && poly.terms().all(|(_, c)| c.is_integer())
}

/// Interval `[lo, hi]` of the sign-normalized linear part
fn normalized_interval(con: &RangeConstraint) -> Option<(Polynomial, i64, i64)> {
    if !all_integral(&con.poly) || con.poly.is_constant() {
        return None;
    }
    let c = con.poly.constant().numer();
    let linear = con.poly.linear_part();
    let first_negative = linear.terms().next().map_or(false, |(_, k)| k.numer() < 0);
    if first_negative {
        Some((-linear, c - con.range + 1, c))
    } else {
        Some((linear, -c, con.range - 1 - c))
    }
}

fn merge_parallel(cons: &mut Vec<RangeConstraint>) {
    // (linear part, lo, hi, members)
    let mut groups: Vec<(Polynomial, i64, i64, usize)> = Vec::new();
    let mut slots: Vec<Option<usize>> = Vec::with_capacity(cons.len());
    for con in cons.iter() {
        match normalized_interval(con) {
            Some((linear, lo, hi)) => {
                if let Some(pos) = groups.iter().position(|g| g.0 == linear) {
                    let group = &mut groups[pos];
                    group.1 = group.1.max(lo);
                    group.2 = group.2.min(hi);
                    group.3 += 1;
                    slots.push(Some(pos));
                } else {
                    groups.push((linear, lo, hi, 1));
                    slots.push(Some(groups.len() - 1));
                }
            }
            None => slots.push(None),
        }
    }
    let mut emitted = BTreeSet::new();
    let mut merged = Vec::with_capacity(cons.len());
    for (con, slot) in cons.drain(..).zip(slots) {
        match slot {
            Some(pos) if groups[pos].3 > 1 => {
                if emitted.insert(pos) {
                    let (linear, lo, hi, _) = &groups[pos];
                    let poly = linear.clone() - Polynomial::constant_of(*lo);
                    merged.push(RangeConstraint::new(poly, hi - lo + 1));
                }
            }
            _ => merged.push(con),
        }
    }
    *cons = merged;
}

/// Give every multi-index output polynomial its own fresh index.
///
/// For an output dimension `c*x + rest` a new index `v` replaces the whole
/// polynomial, and `x = (v - rest) / c` is substituted into every spec and
/// explicit constraint. The pivot `x` is the index with the smallest
/// coefficient magnitude, first by name on ties.
fn reduce_multi_index_outputs(cion: &Contraction) -> Contraction {
    let mut result = cion.clone();
    let mut used: BTreeSet<String> = result
        .specs
        .iter()
        .flat_map(|s| s.spec.iter())
        .chain(result.constraints.iter().map(|c| &c.poly))
        .flat_map(|p| p.vars().map(str::to_string))
        .collect();
    let mut next = 0;
    let rank = result.specs.first().map_or(0, |s| s.spec.len());
    for dim in 0..rank {
        let poly = result.specs[0].spec[dim].clone();
        if poly.vars().count() < 2 {
            continue;
        }
        let Some((pivot, coeff)) = poly
            .terms()
            .min_by_key(|(_, c)| c.abs())
            .map(|(name, c)| (name.to_string(), c))
        else {
            continue;
        };
        let fresh = loop {
            let name = format!("v{}", next);
            next += 1;
            if used.insert(name.clone()) {
                break name;
            }
        };
        let rest = poly - Polynomial::term(pivot.clone(), coeff);
        let solved = (Polynomial::var(fresh) - rest) * (Rational::ONE / coeff);
        for spec in &mut result.specs {
            for p in &mut spec.spec {
                *p = p.substitute(&pivot, &solved);
            }
        }
        for con in &mut result.constraints {
            con.poly = con.poly.substitute(&pivot, &solved);
        }
    }
    result
}

fn defract_shared_denominators(cion: &Contraction) -> Contraction {
    let mut result = cion.clone();
    loop {
        let polys: Vec<&Polynomial> = result.specs.iter().flat_map(|s| s.spec.iter()).collect();
        let vars: BTreeSet<String> = polys
            .iter()
            .flat_map(|p| p.vars().map(str::to_string))
            .collect();
        let candidate = vars.into_iter().find_map(|var| {
            let mut denom = 1;
            for poly in &polys {
                let coeff = poly.coeff(&var);
                if coeff.is_zero() {
                    continue;
                }
                let rest_integral = poly.constant().is_integer()
                    && poly.terms().all(|(name, c)| name == var || c.is_integer());
                if !rest_integral {
                    return None;
                }
                if denom != 1 && coeff.denom() != 1 && coeff.denom() != denom {
                    return None;
                }
                denom = lcm(denom, coeff.denom());
            }
            (denom > 1).then_some((var, denom))
        });
        let Some((var, denom)) = candidate else {
            return result;
        };
        let scaled = Polynomial::term(var.clone(), Rational::from(denom));
        for spec in &mut result.specs {
            for poly in &mut spec.spec {
                *poly = poly.substitute(&var, &scaled);
            }
        }
        for con in &mut result.constraints {
            con.poly = con.poly.substitute(&var, &scaled);
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Interval {
    lo: Option<i64>,
    hi: Option<i64>,
}

impl Interval {
    fn tighten(&mut self, lo: i64, hi: i64) -> bool {
        let new_lo = self.lo.map_or(lo, |cur| cur.max(lo));
        let new_hi = self.hi.map_or(hi, |cur| cur.min(hi));
        let changed = self.lo != Some(new_lo) || self.hi != Some(new_hi);
        self.lo = Some(new_lo);
        self.hi = Some(new_hi);
        changed
    }

    fn closed(&self) -> Option<(i64, i64)> {
        Some((self.lo?, self.hi?))
    }
}

/// Range of `coeff * v` solved for `v` given `lo <= coeff * v <= hi`
fn solve_for(coeff: Rational, lo: Rational, hi: Rational) -> (i64, i64) {
    let (a, b) = (lo / coeff, hi / coeff);
    if coeff.numer() > 0 {
        (a.ceil(), b.floor())
    } else {
        (b.ceil(), a.floor())
    }
}

/// Extremes of `poly` over a box; every index must be bounded
fn poly_extremes(poly: &Polynomial, bounds: &IndexBounds) -> Option<(Rational, Rational)> {
    let mut min = poly.constant();
    let mut max = poly.constant();
    for (name, coeff) in poly.terms() {
        let bound = bounds.get(name)?;
        let at_min = coeff * Rational::from(bound.min);
        let at_max = coeff * Rational::from(bound.max);
        min = min + at_min.min(at_max);
        max = max + at_min.max(at_max);
    }
    Some((min, max))
}

fn compute_box(cons: &[RangeConstraint]) -> CompileResult<(IndexBounds, Vec<SimpleConstraint>)> {
    let mut intervals: BTreeMap<String, Interval> = BTreeMap::new();
    for con in cons {
        for var in con.poly.vars() {
            intervals.entry(var.to_string()).or_default();
        }
    }

    let mut multi = Vec::new();
    for con in cons {
        let upper = Rational::from(con.range - 1);
        match con.poly.vars().count() {
            0 => {
                let c = con.poly.constant();
                if c < Rational::ZERO || c > upper {
                    return Err(CompileError::unsolvable(format!("constraint {} is never satisfied", con)));
                }
            }
            1 => {
                let Some((name, coeff)) = con.poly.terms().next() else {
                    continue;
                };
                let c = con.poly.constant();
                let (lo, hi) = solve_for(coeff, -c, upper - c);
                if let Some(interval) = intervals.get_mut(name) {
                    interval.tighten(lo, hi);
                }
            }
            _ => multi.push(con),
        }
    }

    // Propagate through multi-index constraints until nothing new is learned
    loop {
        let mut changed = false;
        for con in &multi {
            let upper = Rational::from(con.range - 1);
            for (name, coeff) in con.poly.terms() {
                if intervals.get(name).and_then(Interval::closed).is_some() {
                    continue;
                }
                let mut rest_min = con.poly.constant();
                let mut rest_max = con.poly.constant();
                let mut others_bounded = true;
                for (other, k) in con.poly.terms() {
                    if other == name {
                        continue;
                    }
                    match intervals.get(other).and_then(Interval::closed) {
                        Some((lo, hi)) => {
                            let a = k * Rational::from(lo);
                            let b = k * Rational::from(hi);
                            rest_min = rest_min + a.min(b);
                            rest_max = rest_max + a.max(b);
                        }
                        None => others_bounded = false,
                    }
                }
                if !others_bounded {
                    continue;
                }
                let (lo, hi) = solve_for(coeff, -rest_max, upper - rest_min);
                if let Some(interval) = intervals.get_mut(name) {
                    changed |= interval.tighten(lo, hi);
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut bounds = IndexBounds::new();
    for (name, interval) in &intervals {
        let Some((min, max)) = interval.closed() else {
            return Err(CompileError::unsolvable(format!("index {} is unbounded", name)));
        };
        if min > max {
            return Err(CompileError::unsolvable(format!(
                "index {} has an empty range [{}, {}]",
                name, min, max
            )));
        }
        bounds.insert(name.clone(), Bound::new(min, max));
    }

    let mut simple = Vec::new();
    for con in multi {
        let lower = SimpleConstraint::new(-con.poly.clone(), 0);
        let upper = SimpleConstraint::new(con.poly.clone(), con.range - 1);
        for candidate in [lower, upper] {
            let implied = poly_extremes(&candidate.poly, &bounds)
                .map_or(false, |(_, max)| max <= Rational::from(candidate.rhs));
            if !implied {
                simple.push(candidate);
            }
        }
    }
    Ok((bounds, simple))
}
