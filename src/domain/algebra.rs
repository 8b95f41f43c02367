//! Polynomial Algebra
//!
//! Normalizes cost expressions into multivariate polynomials over "atoms"
//! (free variables plus any subexpression we cannot open up, keyed by its
//! rendered text), provides the Faulhaber closed forms used to resolve
//! summations, and implements the simplify/factor passes of the solver.

use crate::domain::expr::{Rat, SymExpr};
use std::collections::BTreeMap;

/// A monomial: atoms with positive exponents, sorted by atom name.
pub type Monomial = Vec<(String, u32)>;

/// Sparse multivariate polynomial with rational coefficients.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rat>,
}

const MAX_POW: u32 = 16;
const MAX_SUM_DEGREE: u32 = 10;

impl Poly {
    pub fn zero() -> Self {
        Poly::default()
    }

    pub fn constant(r: Rat) -> Self {
        let mut p = Poly::zero();
        if !r.is_zero() {
            p.terms.insert(Vec::new(), r);
        }
        p
    }

    pub fn atom(name: impl Into<String>) -> Self {
        let mut p = Poly::zero();
        p.terms.insert(vec![(name.into(), 1)], Rat::one());
        p
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// `Some(c)` when the polynomial is a bare constant (including zero).
    pub fn as_constant(&self) -> Option<Rat> {
        if self.terms.is_empty() {
            return Some(Rat::zero());
        }
        if self.terms.len() == 1 {
            let (mono, c) = self.terms.iter().next().unwrap();
            if mono.is_empty() {
                return Some(*c);
            }
        }
        None
    }

    /// Coefficient arithmetic is checked; `None` means some coefficient
    /// left the rational range and the caller must degrade.
    fn insert(&mut self, mono: Monomial, coef: Rat) -> Option<()> {
        if coef.is_zero() {
            return Some(());
        }
        let entry = self.terms.entry(mono);
        match entry {
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(coef);
            }
            std::collections::btree_map::Entry::Occupied(mut o) => {
                let sum = o.get().add(&coef)?;
                if sum.is_zero() {
                    o.remove();
                } else {
                    *o.get_mut() = sum;
                }
            }
        }
        Some(())
    }

    pub fn add(&self, other: &Poly) -> Option<Poly> {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.insert(m.clone(), *c)?;
        }
        Some(out)
    }

    pub fn sub(&self, other: &Poly) -> Option<Poly> {
        self.add(&other.scale(Rat::int(-1))?)
    }

    pub fn scale(&self, r: Rat) -> Option<Poly> {
        if r.is_zero() {
            return Some(Poly::zero());
        }
        let mut out = Poly::zero();
        for (m, c) in &self.terms {
            out.terms.insert(m.clone(), c.mul(&r)?);
        }
        Some(out)
    }

    pub fn mul(&self, other: &Poly) -> Option<Poly> {
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.insert(merge_monomials(ma, mb), ca.mul(cb)?)?;
            }
        }
        Some(out)
    }

    pub fn pow(&self, exp: u32) -> Option<Poly> {
        let mut out = Poly::constant(Rat::one());
        for _ in 0..exp {
            out = out.mul(self)?;
        }
        Some(out)
    }

    pub fn all_coeffs_nonneg(&self) -> bool {
        self.terms.values().all(|c| !c.is_negative())
    }

    pub fn all_coeffs_nonpos(&self) -> bool {
        self.terms.values().all(|c| c.is_negative() || c.is_zero())
    }

    /// Terms in graded order: total degree descending, ties broken by the
    /// monomial's atom ordering. This is the display order.
    pub fn ordered_terms(&self) -> Vec<(Monomial, Rat)> {
        let mut terms: Vec<(Monomial, Rat)> = self
            .terms
            .iter()
            .map(|(m, c)| (m.clone(), *c))
            .collect();
        terms.sort_by(|a, b| {
            let da: u32 = a.0.iter().map(|(_, e)| e).sum();
            let db: u32 = b.0.iter().map(|(_, e)| e).sum();
            db.cmp(&da).then_with(|| a.0.cmp(&b.0))
        });
        terms
    }

    /// All atoms appearing in the polynomial.
    pub fn atoms(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in self.terms.keys() {
            for (name, _) in m {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
        }
        out
    }

    pub fn degree_in(&self, atom: &str) -> u32 {
        self.terms
            .keys()
            .map(|m| exponent_of(m, atom))
            .max()
            .unwrap_or(0)
    }
}

fn merge_monomials(a: &Monomial, b: &Monomial) -> Monomial {
    let mut map: BTreeMap<String, u32> = BTreeMap::new();
    for (name, e) in a.iter().chain(b.iter()) {
        *map.entry(name.clone()).or_insert(0) += e;
    }
    map.into_iter().collect()
}

fn exponent_of(m: &Monomial, atom: &str) -> u32 {
    m.iter()
        .find(|(name, _)| name == atom)
        .map(|(_, e)| *e)
        .unwrap_or(0)
}

// ============================================================================
// Expression -> polynomial normalization
// ============================================================================

/// Convert an expression to a polynomial. Anything that cannot be opened up
/// (unresolved summations, unknowns, symbolic denominators, unresolvable
/// min/max, coefficients past the rational range) becomes an atom keyed by
/// its rendered text, so the conversion is total and like terms still
/// combine around the opaque parts.
pub fn to_poly(expr: &SymExpr) -> Poly {
    open_poly(expr).unwrap_or_else(|| Poly::atom(expr.to_string()))
}

fn open_poly(expr: &SymExpr) -> Option<Poly> {
    match expr {
        SymExpr::Num(r) => Some(Poly::constant(*r)),
        SymExpr::Var(name) => Some(Poly::atom(name.clone())),
        SymExpr::Add(terms) => {
            let mut acc = Poly::zero();
            for t in terms {
                acc = acc.add(&to_poly(t))?;
            }
            Some(acc)
        }
        SymExpr::Mul(factors) => {
            let mut acc = Poly::constant(Rat::one());
            for fct in factors {
                acc = acc.mul(&to_poly(fct))?;
            }
            Some(acc)
        }
        SymExpr::Pow(base, exp) => match exp.as_ref() {
            SymExpr::Num(r) if r.is_integer() && !r.is_negative() && r.num() <= MAX_POW as i64 => {
                to_poly(base).pow(r.num() as u32)
            }
            _ => Some(Poly::atom(expr.to_string())),
        },
        SymExpr::Div(a, b) => {
            let den = to_poly(b);
            match den.as_constant() {
                Some(c) if !c.is_zero() => to_poly(a).scale(Rat::one().div(&c)?),
                _ => Some(Poly::atom(expr.to_string())),
            }
        }
        SymExpr::Min(a, b) => {
            let pa = to_poly(a);
            let pb = to_poly(b);
            // A zero branch is the floor of any admissible cost.
            if pa.is_zero() || pb.is_zero() {
                return Some(Poly::zero());
            }
            let diff = pa.sub(&pb)?;
            Some(if diff.all_coeffs_nonneg() {
                pb
            } else if diff.all_coeffs_nonpos() {
                pa
            } else {
                Poly::atom(expr.to_string())
            })
        }
        SymExpr::Max(a, b) => {
            let pa = to_poly(a);
            let pb = to_poly(b);
            let diff = pa.sub(&pb)?;
            Some(if diff.all_coeffs_nonneg() {
                pa
            } else if diff.all_coeffs_nonpos() {
                pb
            } else {
                Poly::atom(expr.to_string())
            })
        }
        SymExpr::Sum(_, _) | SymExpr::Func(_, _) | SymExpr::Unknown(_) => {
            Some(Poly::atom(expr.to_string()))
        }
    }
}

/// Rebuild the canonical expression form of a polynomial: terms in graded
/// order, each term `coeff * atom**exp * ...`.
pub fn poly_to_expr(p: &Poly) -> SymExpr {
    let terms = p.ordered_terms();
    if terms.is_empty() {
        return SymExpr::zero();
    }
    let rendered: Vec<SymExpr> = terms
        .into_iter()
        .map(|(mono, coef)| {
            let mut factors: Vec<SymExpr> = vec![SymExpr::Num(coef)];
            for (atom, e) in mono {
                factors.push(atom_power(&atom, e));
            }
            SymExpr::mul(factors)
        })
        .collect();
    SymExpr::add(rendered)
}

fn atom_power(atom: &str, e: u32) -> SymExpr {
    let base = SymExpr::var(atom);
    if e == 1 {
        base
    } else {
        SymExpr::Pow(Box::new(base), Box::new(SymExpr::int(e as i64)))
    }
}

/// Expand and combine like terms, returning the canonical rendering.
pub fn simplify(expr: &SymExpr) -> SymExpr {
    poly_to_expr(&to_poly(expr))
}

// ============================================================================
// Summation closed forms (Faulhaber)
// ============================================================================

/// Bernoulli numbers B0..B10 with the B1 = +1/2 convention.
fn bernoulli_plus(j: u32) -> Option<Rat> {
    let table = [
        (1i64, 1i64),
        (1, 2),
        (1, 6),
        (0, 1),
        (-1, 30),
        (0, 1),
        (1, 42),
        (0, 1),
        (-1, 30),
        (0, 1),
        (5, 66),
    ];
    table.get(j as usize).map(|&(n, d)| Rat::new(n, d))
}

fn binomial(n: u32, k: u32) -> i64 {
    let mut out: i64 = 1;
    for i in 0..k.min(n - k) {
        out = out * (n - i) as i64 / (i + 1) as i64;
    }
    out
}

/// `S_k(m) = sum_{v=1}^{m} v^k`, with the upper bound `m` given as a
/// polynomial. `None` when `k` exceeds the supported degree or a
/// coefficient leaves the rational range.
pub fn power_sum(k: u32, m: &Poly) -> Option<Poly> {
    if k > MAX_SUM_DEGREE {
        return None;
    }
    let mut acc = Poly::zero();
    for j in 0..=k {
        let b = bernoulli_plus(j)?;
        if b.is_zero() {
            continue;
        }
        let coef = b.mul(&Rat::new(binomial(k + 1, j), (k + 1) as i64))?;
        acc = acc.add(&m.pow(k + 1 - j)?.scale(coef)?)?;
    }
    Some(acc)
}

/// Resolve `Sum(body, (var, lo, hi))` to a closed-form polynomial.
///
/// The body is grouped by powers of `var`; each power contributes
/// `coeff * (S_k(hi) - S_k(lo - 1))`. Fails (returns `None`) when the bound
/// variable is buried inside an opaque atom, or a power is out of range.
pub fn resolve_sum(body: &Poly, var: &str, lo: &Poly, hi: &Poly) -> Option<Poly> {
    // Group coefficients by the exponent of the bound variable.
    let mut by_power: BTreeMap<u32, Poly> = BTreeMap::new();
    for (mono, coef) in body.ordered_terms() {
        let mut e = 0u32;
        let mut rest: Monomial = Vec::new();
        for (atom, exp) in mono {
            if atom == var {
                e = exp;
            } else {
                if atom_mentions_var(&atom, var) {
                    return None;
                }
                rest.push((atom, exp));
            }
        }
        let mut part = Poly::zero();
        part.insert(rest, coef)?;
        let slot = by_power.entry(e).or_insert_with(Poly::zero);
        *slot = slot.add(&part)?;
    }

    let lo_minus_1 = lo.sub(&Poly::constant(Rat::one()))?;
    let mut out = Poly::zero();
    for (k, coef) in by_power {
        let upper = power_sum(k, hi)?;
        let lower = power_sum(k, &lo_minus_1)?;
        out = out.add(&coef.mul(&upper.sub(&lower)?)?)?;
    }
    Some(out)
}

// ============================================================================
// Atom text scanning
// ============================================================================

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `var` occurs as a standalone identifier inside rendered text.
pub fn atom_mentions_var(text: &str, var: &str) -> bool {
    let bytes: Vec<char> = text.chars().collect();
    let target: Vec<char> = var.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(&target[..]) {
            let before_ok = i == 0 || !is_ident_char(bytes[i - 1]);
            let after = i + target.len();
            let after_ok = after >= bytes.len() || !is_ident_char(bytes[after]);
            if before_ok && after_ok {
                return true;
            }
        }
        i += 1;
    }
    false
}

/// Highest explicit `var**k` exponent inside rendered text; zero when the
/// variable only appears bare or not at all. Mirrors the dominant-term
/// fallback for terms that are not polynomial in the size variable.
pub fn explicit_exponent(text: &str, var: &str) -> u32 {
    let chars: Vec<char> = text.chars().collect();
    let target: Vec<char> = var.chars().collect();
    let mut best = 0u32;
    let mut i = 0;
    while i < chars.len() {
        if chars[i..].starts_with(&target[..]) {
            let before_ok = i == 0 || !is_ident_char(chars[i - 1]);
            let mut j = i + target.len();
            if before_ok && j + 1 < chars.len() && chars[j] == '*' && chars[j + 1] == '*' {
                j += 2;
                let mut digits = String::new();
                while j < chars.len() && chars[j].is_ascii_digit() {
                    digits.push(chars[j]);
                    j += 1;
                }
                if let Ok(k) = digits.parse::<u32>() {
                    best = best.max(k);
                }
            }
        }
        i += 1;
    }
    best
}

// ============================================================================
// Factoring
// ============================================================================

/// Factored form: `content * f1^e1 * f2^e2 * ...` with primitive factors.
#[derive(Debug, Clone)]
pub struct Factored {
    pub content: Rat,
    pub factors: Vec<(Poly, u32)>,
}

/// Heuristic factorization: rational content, common monomial, and rational
/// root splitting of a remaining univariate quadratic. Enough to prefer
/// `n*(n - 1)/2` over `n**2/2 - n/2`.
pub fn factor(p: &Poly) -> Option<Factored> {
    if p.is_zero() || p.as_constant().is_some() {
        return None;
    }

    // Rational content: p = content * primitive, integer coprime coefficients,
    // positive leading coefficient in graded order.
    let terms = p.ordered_terms();
    let mut den_lcm: i64 = 1;
    for (_, c) in &terms {
        den_lcm = lcm(den_lcm, c.den())?;
    }
    let mut num_gcd: i64 = 0;
    for (_, c) in &terms {
        let scaled = c.num() as i128 * (den_lcm / c.den()) as i128;
        num_gcd = gcd_i64(num_gcd, i64::try_from(scaled).ok()?);
    }
    let sign = if terms[0].1.is_negative() { -1 } else { 1 };
    let content = Rat::new(sign * num_gcd, den_lcm);
    let primitive = p.scale(Rat::one().div(&content)?)?;

    // Common monomial across every term.
    let prim_terms = primitive.ordered_terms();
    let mut common: Monomial = prim_terms[0].0.clone();
    for (mono, _) in prim_terms.iter().skip(1) {
        common.retain(|(atom, _)| exponent_of(mono, atom) > 0);
        for entry in common.iter_mut() {
            entry.1 = entry.1.min(exponent_of(mono, &entry.0));
        }
    }
    common.retain(|(_, e)| *e > 0);

    let mut factors: Vec<(Poly, u32)> = common
        .iter()
        .map(|(atom, e)| (Poly::atom(atom.clone()), *e))
        .collect();

    let mut remainder = Poly::zero();
    for (mono, coef) in prim_terms {
        let reduced: Monomial = mono
            .into_iter()
            .map(|(atom, e)| {
                let drop = exponent_of(&common, &atom);
                (atom, e - drop)
            })
            .filter(|(_, e)| *e > 0)
            .collect();
        remainder.insert(reduced, coef)?;
    }

    push_remainder_factors(&mut factors, remainder);
    if factors.is_empty() {
        return None;
    }
    Some(Factored { content, factors })
}

fn push_remainder_factors(factors: &mut Vec<(Poly, u32)>, remainder: Poly) {
    if remainder.as_constant().map_or(false, |c| c.is_one()) {
        return;
    }
    let atoms = remainder.atoms();
    if atoms.len() == 1 && remainder.degree_in(&atoms[0]) == 2 {
        if let Some((f1, f2)) = split_quadratic(&remainder, &atoms[0]) {
            if f1 == f2 {
                push_factor(factors, f1, 2);
            } else {
                push_factor(factors, f1, 1);
                push_factor(factors, f2, 1);
            }
            return;
        }
    }
    push_factor(factors, remainder, 1);
}

fn push_factor(factors: &mut Vec<(Poly, u32)>, f: Poly, e: u32) {
    for entry in factors.iter_mut() {
        if entry.0 == f {
            entry.1 += e;
            return;
        }
    }
    factors.push((f, e));
}

/// Split a primitive univariate quadratic with rational roots into two
/// integer linear factors, Gauss-style. `None` for irrational roots or a
/// discriminant too wide to work with; the caller then keeps the quadratic
/// whole.
fn split_quadratic(p: &Poly, var: &str) -> Option<(Poly, Poly)> {
    let coeff_at = |k: u32| -> Rat {
        p.ordered_terms()
            .into_iter()
            .find(|(m, _)| exponent_of(m, var) == k)
            .map(|(_, c)| c)
            .unwrap_or_else(Rat::zero)
    };
    let a = coeff_at(2);
    let b = coeff_at(1);
    let c = coeff_at(0);
    if !a.is_integer() || !b.is_integer() || !c.is_integer() {
        return None;
    }
    let (ai, bi, ci) = (a.num() as i128, b.num() as i128, c.num() as i128);
    // b^2 and 4ac each fit comfortably in i128; the difference still needs
    // a checked subtract near the extremes.
    let disc = bi.checked_mul(bi)?.checked_sub(4i128.checked_mul(ai)?.checked_mul(ci)?)?;
    if disc < 0 {
        return None;
    }
    let sqrt = integer_sqrt(disc)?;
    // Roots (-b ± sqrt) / 2a; each rational root p/q gives a factor (q*v - p).
    let root = |s: i128| Rat::checked_ratio(-bi + s, 2 * ai);
    let linear = |r: Rat| -> Option<Poly> {
        Poly::atom(var.to_string())
            .scale(Rat::int(r.den()))?
            .sub(&Poly::constant(Rat::int(r.num())))
    };
    let f1 = linear(root(sqrt)?)?;
    let f2 = linear(root(-sqrt)?)?;
    // Primitivity of the input guarantees the leading coefficients multiply
    // back exactly; verify to be safe.
    if f1.mul(&f2)? == *p {
        Some(order_pair(f1, f2))
    } else {
        None
    }
}

fn order_pair(f1: Poly, f2: Poly) -> (Poly, Poly) {
    let a = poly_to_expr(&f1).to_string();
    let b = poly_to_expr(&f2).to_string();
    if a <= b {
        (f1, f2)
    } else {
        (f2, f1)
    }
}

fn integer_sqrt(v: i128) -> Option<i128> {
    let r = (v as f64).sqrt().round() as i128;
    for cand in (r - 2).max(0)..=r + 2 {
        if cand.checked_mul(cand) == Some(v) {
            return Some(cand);
        }
    }
    None
}

fn gcd_i64(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

fn lcm(a: i64, b: i64) -> Option<i64> {
    (a / gcd_i64(a, b)).checked_mul(b)
}

/// Render a factored form as an expression, repeated factors as powers.
pub fn factored_to_expr(f: &Factored) -> SymExpr {
    let mut parts: Vec<SymExpr> = vec![SymExpr::Num(f.content)];
    for (poly, e) in &f.factors {
        let base = poly_to_expr(poly);
        if *e == 1 {
            parts.push(base);
        } else {
            parts.push(SymExpr::Pow(
                Box::new(base),
                Box::new(SymExpr::int(*e as i64)),
            ));
        }
    }
    SymExpr::mul(parts)
}
