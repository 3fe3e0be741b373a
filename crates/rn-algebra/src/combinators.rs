//! Combinators shared by the belief propagator and the reliability engine.

use crate::Probability;

/// Product of a sequence of scalars (independence assumed).
///
/// Returns `one` for an empty sequence.
pub fn product<'a, P, I>(factors: I) -> P
where
    P: Probability + 'a,
    I: IntoIterator<Item = &'a P>,
{
    factors
        .into_iter()
        .fold(P::one(), |acc, f| acc.mul(f))
}

/// Exact union probability of `n` independent events by the full signed
/// inclusion–exclusion expansion:
///
/// `P(⋃ Aᵢ) = Σ_{∅≠S⊆{1..n}} (−1)^{|S|+1} ∏_{i∈S} pᵢ`
///
/// Subsets are enumerated in ascending bitmask order and accumulated
/// sequentially, so the floating-point result is identical across runs and
/// thread counts.  The expansion is `2^n − 1` terms; callers cap `n`.
///
/// Returns `zero` for an empty slice.
pub fn inclusion_exclusion<P: Probability>(terms: &[P]) -> P {
    let n = terms.len();
    debug_assert!(n < usize::BITS as usize, "inclusion-exclusion over {n} terms");
    let mut acc = P::zero();
    for mask in 1u64..(1u64 << n) {
        let mut term = P::one();
        for (i, p) in terms.iter().enumerate() {
            if mask & (1 << i) != 0 {
                term = term.mul(p);
            }
        }
        if mask.count_ones() % 2 == 1 {
            acc = acc.add(&term);
        } else {
            acc = acc.sub(&term);
        }
    }
    acc
}
