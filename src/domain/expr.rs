//! Symbolic Cost Expressions
//!
//! The tree form of the cost-expression grammar: rationals, free variables,
//! arithmetic, `min`/`max`, bounded summations, and an opaque `unknown(...)`
//! leaf for expressions that could not be resolved. The annotator builds
//! these trees and renders them to strings; the solver parses them back.

use std::fmt;

// ============================================================================
// Rat - exact rational coefficients
// ============================================================================

/// An exact rational number. Always kept reduced, denominator positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rat {
    num: i64,
    den: i64,
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl Rat {
    pub fn new(num: i64, den: i64) -> Self {
        debug_assert!(den != 0, "rational with zero denominator");
        let sign = if den < 0 { -1 } else { 1 };
        let g = gcd(num, den);
        Rat {
            num: sign * num / g,
            den: sign * den / g,
        }
    }

    pub fn int(v: i64) -> Self {
        Rat { num: v, den: 1 }
    }

    pub fn zero() -> Self {
        Rat::int(0)
    }

    pub fn one() -> Self {
        Rat::int(1)
    }

    /// Closest rational with denominator up to 1e9. Exact for the short
    /// decimals that show up as branch probabilities (0.5, 0.25, ...).
    pub fn approx_f64(x: f64) -> Self {
        const SCALE: i64 = 1_000_000_000;
        let scaled = (x * SCALE as f64).round();
        if !scaled.is_finite() || scaled.abs() >= i64::MAX as f64 {
            // Saturating cast; only reachable through absurd inputs.
            return Rat::int(x as i64);
        }
        Rat::new(scaled as i64, SCALE)
    }

    pub fn num(&self) -> i64 {
        self.num
    }

    pub fn den(&self) -> i64 {
        self.den
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_one(&self) -> bool {
        self.num == 1 && self.den == 1
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn abs(&self) -> Self {
        Rat {
            num: self.num.abs(),
            den: self.den,
        }
    }

    pub fn neg(&self) -> Self {
        Rat {
            num: -self.num,
            den: self.den,
        }
    }

    /// Arithmetic is exact in i128 and `None` when the reduced result
    /// leaves the i64 range; callers degrade the term instead of carrying
    /// a silently truncated value.
    pub fn add(&self, other: &Rat) -> Option<Rat> {
        let num = self.num as i128 * other.den as i128 + other.num as i128 * self.den as i128;
        let den = self.den as i128 * other.den as i128;
        Self::from_i128(num, den)
    }

    pub fn sub(&self, other: &Rat) -> Option<Rat> {
        let num = self.num as i128 * other.den as i128 - other.num as i128 * self.den as i128;
        let den = self.den as i128 * other.den as i128;
        Self::from_i128(num, den)
    }

    pub fn mul(&self, other: &Rat) -> Option<Rat> {
        let num = self.num as i128 * other.num as i128;
        let den = self.den as i128 * other.den as i128;
        Self::from_i128(num, den)
    }

    pub fn div(&self, other: &Rat) -> Option<Rat> {
        if other.is_zero() {
            return None;
        }
        let num = self.num as i128 * other.den as i128;
        let den = self.den as i128 * other.num as i128;
        Self::from_i128(num, den)
    }

    pub fn pow(&self, exp: u32) -> Option<Rat> {
        let mut out = Rat::one();
        for _ in 0..exp {
            out = out.mul(self)?;
        }
        Some(out)
    }

    /// Exact conversion of a wide ratio.
    pub fn checked_ratio(num: i128, den: i128) -> Option<Rat> {
        if den == 0 {
            return None;
        }
        Self::from_i128(num, den)
    }

    fn from_i128(num: i128, den: i128) -> Option<Rat> {
        let sign: i128 = if den < 0 { -1 } else { 1 };
        let g = gcd128(num, den);
        let num = i64::try_from(sign * num / g).ok()?;
        let den = i64::try_from(sign * den / g).ok()?;
        Some(Rat { num, den })
    }

    /// Compare without overflow on the cross product.
    pub fn cmp_value(&self, other: &Rat) -> std::cmp::Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

fn gcd128(a: i128, b: i128) -> i128 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

impl fmt::Display for Rat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

// ============================================================================
// SymExpr - the cost-expression tree
// ============================================================================

/// One bound-variable range of a summation, inclusive on both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SumLimit {
    pub var: String,
    pub lo: SymExpr,
    pub hi: SymExpr,
}

/// A symbolic cost expression.
///
/// `Sum` carries one or more limits: multiple limits are the flattened form
/// of directly-nested summations over the same body, innermost limit first.
/// `Unknown` is the graceful-degradation leaf: it renders as
/// `unknown(<original text>)` and survives every downstream stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SymExpr {
    Num(Rat),
    Var(String),
    Add(Vec<SymExpr>),
    Mul(Vec<SymExpr>),
    Pow(Box<SymExpr>, Box<SymExpr>),
    Div(Box<SymExpr>, Box<SymExpr>),
    Min(Box<SymExpr>, Box<SymExpr>),
    Max(Box<SymExpr>, Box<SymExpr>),
    Sum(Box<SymExpr>, Vec<SumLimit>),
    Func(String, Vec<SymExpr>),
    Unknown(String),
}

impl SymExpr {
    pub fn int(v: i64) -> Self {
        SymExpr::Num(Rat::int(v))
    }

    pub fn num(r: Rat) -> Self {
        SymExpr::Num(r)
    }

    pub fn var(name: impl Into<String>) -> Self {
        SymExpr::Var(name.into())
    }

    pub fn zero() -> Self {
        SymExpr::int(0)
    }

    pub fn one() -> Self {
        SymExpr::int(1)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, SymExpr::Num(r) if r.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, SymExpr::Num(r) if r.is_one())
    }

    /// Sum of terms, dropping zeros the way the annotator's output grammar
    /// expects (`0` terms never appear in rendered costs).
    pub fn add(terms: Vec<SymExpr>) -> SymExpr {
        let mut flat = Vec::new();
        for t in terms {
            if t.is_zero() {
                continue;
            }
            match t {
                SymExpr::Add(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => SymExpr::zero(),
            1 => flat.into_iter().next().unwrap(),
            _ => SymExpr::Add(flat),
        }
    }

    /// Product of factors; any zero factor collapses the whole product.
    pub fn mul(factors: Vec<SymExpr>) -> SymExpr {
        if factors.iter().any(SymExpr::is_zero) {
            return SymExpr::zero();
        }
        let mut flat = Vec::new();
        for fct in factors {
            if fct.is_one() {
                continue;
            }
            match fct {
                SymExpr::Mul(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => SymExpr::one(),
            1 => flat.into_iter().next().unwrap(),
            _ => SymExpr::Mul(flat),
        }
    }

    /// Scale by a rational factor, folding into an existing coefficient.
    pub fn scale(r: Rat, expr: SymExpr) -> SymExpr {
        if r.is_zero() || expr.is_zero() {
            return SymExpr::zero();
        }
        if r.is_one() {
            return expr;
        }
        match expr {
            SymExpr::Num(v) => match v.mul(&r) {
                Some(folded) => SymExpr::Num(folded),
                // Out of range; keep the product unfolded.
                None => SymExpr::Mul(vec![SymExpr::Num(r), SymExpr::Num(v)]),
            },
            SymExpr::Mul(mut factors) => {
                if let Some(SymExpr::Num(head)) = factors.first_mut() {
                    if let Some(folded) = head.mul(&r) {
                        *head = folded;
                        return SymExpr::mul(factors);
                    }
                }
                let mut out = vec![SymExpr::Num(r)];
                out.extend(factors);
                SymExpr::Mul(out)
            }
            other => SymExpr::Mul(vec![SymExpr::Num(r), other]),
        }
    }

    pub fn neg(expr: SymExpr) -> SymExpr {
        SymExpr::scale(Rat::int(-1), expr)
    }

    /// `Sum(body, (var, lo, hi))`; a zero body sums to zero outright.
    pub fn sum(body: SymExpr, var: impl Into<String>, lo: SymExpr, hi: SymExpr) -> SymExpr {
        if body.is_zero() {
            return SymExpr::zero();
        }
        SymExpr::Sum(
            Box::new(body),
            vec![SumLimit {
                var: var.into(),
                lo,
                hi,
            }],
        )
    }

    /// `min` with the annotator's shortcuts: a zero branch wins outright,
    /// equal branches collapse.
    pub fn min_of(a: SymExpr, b: SymExpr) -> SymExpr {
        if a.is_zero() || b.is_zero() {
            return SymExpr::zero();
        }
        if a == b {
            return a;
        }
        if let (SymExpr::Num(x), SymExpr::Num(y)) = (&a, &b) {
            return if x.cmp_value(y).is_le() { a } else { b };
        }
        SymExpr::Min(Box::new(a), Box::new(b))
    }

    pub fn max_of(a: SymExpr, b: SymExpr) -> SymExpr {
        if a == b {
            return a;
        }
        if a.is_zero() {
            return b;
        }
        if b.is_zero() {
            return a;
        }
        if let (SymExpr::Num(x), SymExpr::Num(y)) = (&a, &b) {
            return if x.cmp_value(y).is_ge() { a } else { b };
        }
        SymExpr::Max(Box::new(a), Box::new(b))
    }

    /// Whether `name` occurs as a free variable anywhere in the tree.
    pub fn contains_var(&self, name: &str) -> bool {
        match self {
            SymExpr::Num(_) | SymExpr::Unknown(_) => false,
            SymExpr::Var(v) => v == name,
            SymExpr::Add(xs) | SymExpr::Mul(xs) => xs.iter().any(|x| x.contains_var(name)),
            SymExpr::Pow(a, b) | SymExpr::Div(a, b) | SymExpr::Min(a, b) | SymExpr::Max(a, b) => {
                a.contains_var(name) || b.contains_var(name)
            }
            SymExpr::Sum(body, limits) => {
                body.contains_var(name)
                    || limits
                        .iter()
                        .any(|l| l.lo.contains_var(name) || l.hi.contains_var(name))
            }
            SymExpr::Func(_, args) => args.iter().any(|x| x.contains_var(name)),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn needs_parens_in_product(e: &SymExpr) -> bool {
    match e {
        SymExpr::Add(_) | SymExpr::Div(_, _) | SymExpr::Mul(_) => true,
        SymExpr::Num(r) => r.is_negative() || !r.is_integer(),
        _ => false,
    }
}

fn product_body(factors: &[SymExpr]) -> String {
    factors
        .iter()
        .map(|fct| {
            if needs_parens_in_product(fct) {
                format!("({})", fct)
            } else {
                fct.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("*")
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Num(r) => write!(f, "{}", r),
            SymExpr::Var(name) => write!(f, "{}", name),
            SymExpr::Add(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    let s = t.to_string();
                    if i == 0 {
                        write!(f, "{}", s)?;
                    } else if let Some(stripped) = s.strip_prefix('-') {
                        write!(f, " - {}", stripped)?;
                    } else {
                        write!(f, " + {}", s)?;
                    }
                }
                Ok(())
            }
            SymExpr::Mul(factors) => {
                // Lift a leading rational coefficient so `1/2 * n` renders
                // as `n/2` and `5/4 * n * (n-1)` as `5*n*(n - 1)/4`.
                if let Some((SymExpr::Num(coef), rest)) = factors.split_first() {
                    if !rest.is_empty() {
                        let body = product_body(rest);
                        let prefix = if coef.num() == 1 {
                            String::new()
                        } else if coef.num() == -1 {
                            "-".to_string()
                        } else {
                            format!("{}*", coef.num())
                        };
                        return if coef.den() == 1 {
                            write!(f, "{}{}", prefix, body)
                        } else {
                            write!(f, "{}{}/{}", prefix, body, coef.den())
                        };
                    }
                }
                write!(f, "{}", product_body(factors))
            }
            SymExpr::Pow(base, exp) => {
                let base_s = match base.as_ref() {
                    SymExpr::Var(_) => base.to_string(),
                    SymExpr::Num(r) if !r.is_negative() && r.is_integer() => base.to_string(),
                    _ => format!("({})", base),
                };
                let exp_s = match exp.as_ref() {
                    SymExpr::Num(r) if !r.is_negative() && r.is_integer() => exp.to_string(),
                    SymExpr::Var(_) => exp.to_string(),
                    _ => format!("({})", exp),
                };
                write!(f, "{}**{}", base_s, exp_s)
            }
            SymExpr::Div(a, b) => {
                let num = match a.as_ref() {
                    SymExpr::Add(_) => format!("({})", a),
                    _ => a.to_string(),
                };
                let den = match b.as_ref() {
                    SymExpr::Add(_) | SymExpr::Mul(_) | SymExpr::Div(_, _) => format!("({})", b),
                    _ => b.to_string(),
                };
                write!(f, "{}/{}", num, den)
            }
            SymExpr::Min(a, b) => write!(f, "min({}, {})", a, b),
            SymExpr::Max(a, b) => write!(f, "max({}, {})", a, b),
            SymExpr::Sum(body, limits) => {
                write!(f, "Sum({}", body)?;
                for l in limits {
                    write!(f, ", ({}, {}, {})", l.var, l.lo, l.hi)?;
                }
                write!(f, ")")
            }
            SymExpr::Func(name, args) => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, rendered.join(", "))
            }
            SymExpr::Unknown(text) => write!(f, "unknown({})", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rat_reduces() {
        assert_eq!(Rat::new(2, 4), Rat::new(1, 2));
        assert_eq!(Rat::new(1, -2), Rat::new(-1, 2));
        assert_eq!(Rat::approx_f64(0.5), Rat::new(1, 2));
        assert_eq!(Rat::approx_f64(0.25), Rat::new(1, 4));
    }

    #[test]
    fn test_rat_arithmetic_is_checked() {
        assert_eq!(Rat::new(1, 2).add(&Rat::new(1, 3)), Some(Rat::new(5, 6)));
        let wide = Rat::int(5_000_000_000);
        assert!(wide.mul(&wide).is_none());
        assert!(Rat::int(i64::MAX).add(&Rat::one()).is_none());
    }

    #[test]
    fn test_scale_keeps_wide_product_unfolded() {
        let wide = SymExpr::int(5_000_000_000);
        let scaled = SymExpr::scale(Rat::int(5_000_000_000), wide);
        assert_eq!(scaled.to_string(), "5000000000*5000000000");
    }

    #[test]
    fn test_add_drops_zeros() {
        let e = SymExpr::add(vec![SymExpr::zero(), SymExpr::int(1), SymExpr::var("n")]);
        assert_eq!(e.to_string(), "1 + n");
        assert!(SymExpr::add(vec![SymExpr::zero(), SymExpr::zero()]).is_zero());
    }

    #[test]
    fn test_mul_collapses_on_zero() {
        let e = SymExpr::mul(vec![SymExpr::var("n"), SymExpr::zero()]);
        assert!(e.is_zero());
    }

    #[test]
    fn test_coefficient_rendering() {
        let half_n = SymExpr::scale(Rat::new(1, 2), SymExpr::var("n"));
        assert_eq!(half_n.to_string(), "n/2");

        let e = SymExpr::mul(vec![
            SymExpr::Num(Rat::new(5, 4)),
            SymExpr::var("n"),
            SymExpr::add(vec![SymExpr::var("n"), SymExpr::int(-1)]),
        ]);
        assert_eq!(e.to_string(), "5*n*(n - 1)/4");
    }

    #[test]
    fn test_sum_rendering() {
        let inner = SymExpr::sum(
            SymExpr::one(),
            "j",
            SymExpr::one(),
            SymExpr::add(vec![SymExpr::var("n"), SymExpr::neg(SymExpr::var("i"))]),
        );
        let outer = SymExpr::sum(
            inner,
            "i",
            SymExpr::one(),
            SymExpr::add(vec![SymExpr::var("n"), SymExpr::int(-1)]),
        );
        assert_eq!(
            outer.to_string(),
            "Sum(Sum(1, (j, 1, n - i)), (i, 1, n - 1))"
        );
    }

    #[test]
    fn test_min_max_shortcuts() {
        assert!(SymExpr::min_of(SymExpr::var("a"), SymExpr::zero()).is_zero());
        assert_eq!(
            SymExpr::max_of(SymExpr::int(3), SymExpr::zero()).to_string(),
            "3"
        );
        assert_eq!(
            SymExpr::max_of(SymExpr::var("a"), SymExpr::var("b")).to_string(),
            "max(a, b)"
        );
    }

    #[test]
    fn test_sum_of_zero_body() {
        assert!(SymExpr::sum(SymExpr::zero(), "i", SymExpr::one(), SymExpr::var("n")).is_zero());
    }
}
