//! Bit-packed cache keys of components.
//!
//! A signature stores, in order, the number of variables, the number of
//! clauses, every variable id and every clause id, each field using a width
//! fixed by the [`PackingContext`]. The header makes encodings self-delimiting,
//! so two components under the same context share a signature if and only if
//! they are equal.
use bitvec::prelude::*;

use crate::cnf::ClauseId;
use crate::component::Component;
use crate::literal::Variable;
use crate::util::bits_for;

/// Field widths shared by every signature of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingContext {
    var_bits: u32,
    clause_bits: u32,
}

impl PackingContext {
    /// Widths able to hold variable ids up to `max_var` and clause ids, or
    /// counts, up to `num_clauses`.
    #[must_use]
    pub fn new(max_var: u32, num_clauses: u32) -> Self {
        PackingContext {
            var_bits: bits_for(u64::from(max_var)),
            clause_bits: bits_for(u64::from(num_clauses)),
        }
    }

    /// Exact length of the encoding of a component with the given shape.
    #[must_use]
    pub fn encoded_bits(&self, num_vars: usize, num_clauses: usize) -> usize {
        (num_vars + 1) * self.var_bits as usize + (num_clauses + 1) * self.clause_bits as usize
    }

    /// Whether a component of this shape packs into a single `u128`.
    #[must_use]
    pub fn is_small(&self, num_vars: usize, num_clauses: usize) -> bool {
        self.encoded_bits(num_vars, num_clauses) <= 128
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signature {
    Small(u128),
    Large(Box<[u64]>),
}

impl Signature {
    /// Bytes owned by the signature outside of its inline representation.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        match self {
            Signature::Small(_) => 0,
            Signature::Large(words) => std::mem::size_of_val(&**words),
        }
    }

    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        fxhash::hash64(self)
    }
}

/// Pack a component into a signature. Trivial components fit a single
/// `u128`; the rest spill to the heap.
pub fn encode(component: &Component, ctx: &PackingContext) -> Signature {
    let (vars, clauses) = (component.vars(), component.clauses());
    let var_bits = ctx.var_bits as usize;
    let clause_bits = ctx.clause_bits as usize;
    let mut bits: BitVec<u64, Lsb0> =
        BitVec::with_capacity(ctx.encoded_bits(vars.len(), clauses.len()));

    let mut write = |value: u64, width: usize| {
        debug_assert!(width == 64 || value >> width == 0, "{value} overflows {width} bits");
        bits.extend_from_bitslice(&value.view_bits::<Lsb0>()[..width]);
    };

    write(vars.len() as u64, var_bits);
    write(clauses.len() as u64, clause_bits);
    for var in vars {
        write(u64::from(var.id()), var_bits);
    }
    for clause in clauses {
        write(u64::from(clause.0), clause_bits);
    }

    let padded = bits.len().div_ceil(64) * 64;
    bits.resize(padded, false);
    let words = bits.into_vec();

    if component.is_trivial(ctx) {
        let low = u128::from(words.first().copied().unwrap_or(0));
        let high = u128::from(words.get(1).copied().unwrap_or(0));
        Signature::Small(low | high << 64)
    } else {
        Signature::Large(words.into_boxed_slice())
    }
}

/// Recover the variables and clauses of an encoded component.
#[must_use]
pub fn decode(signature: &Signature, ctx: &PackingContext) -> (Vec<Variable>, Vec<ClauseId>) {
    match signature {
        Signature::Small(packed) => {
            let words = [*packed as u64, (*packed >> 64) as u64];
            decode_bits(words.view_bits::<Lsb0>(), ctx)
        }
        Signature::Large(words) => decode_bits(words.view_bits::<Lsb0>(), ctx),
    }
}

fn decode_bits(bits: &BitSlice<u64, Lsb0>, ctx: &PackingContext) -> (Vec<Variable>, Vec<ClauseId>) {
    let var_bits = ctx.var_bits as usize;
    let clause_bits = ctx.clause_bits as usize;
    let mut position = 0;
    let mut read = |width: usize| {
        let value: u64 = bits[position..position + width].load_le();
        position += width;
        value
    };

    let num_vars = read(var_bits) as usize;
    let num_clauses = read(clause_bits) as usize;
    let vars = (0..num_vars)
        .map(|_| Variable(read(var_bits) as u32))
        .collect();
    let clauses = (0..num_clauses)
        .map(|_| ClauseId(read(clause_bits) as u32))
        .collect();

    (vars, clauses)
}

#[cfg(test)]
mod test {
    use super::{decode, encode, PackingContext, Signature};
    use crate::cnf::ClauseId;
    use crate::component::Component;
    use crate::literal::Variable;
    use pretty_assertions::assert_eq;

    fn component(vars: &[u32], clauses: &[u32]) -> Component {
        Component::new(
            vars.iter().map(|&v| Variable::new(v)).collect(),
            clauses.iter().map(|&c| ClauseId(c)).collect(),
        )
    }

    #[test]
    fn small_components_pack_inline() {
        let ctx = PackingContext::new(10, 4);
        let comp = component(&[2, 3, 9], &[0, 3]);
        assert!(comp.is_trivial(&ctx));
        let signature = encode(&comp, &ctx);

        assert!(matches!(signature, Signature::Small(_)));
        let (vars, clauses) = decode(&signature, &ctx);
        assert_eq!(Component::new(vars, clauses), comp);
    }

    #[test]
    fn large_components_spill() {
        let ctx = PackingContext::new(1000, 50);
        let comp = component(&(1..=40).collect::<Vec<_>>(), &[1, 7, 49]);
        assert!(!comp.is_trivial(&ctx));
        let signature = encode(&comp, &ctx);

        assert!(matches!(signature, Signature::Large(_)));
        assert!(signature.heap_bytes() > 0);
        let (vars, clauses) = decode(&signature, &ctx);
        assert_eq!(Component::new(vars, clauses), comp);
    }

    #[test]
    fn trailing_zero_fields_stay_distinct() {
        // Clause id 0 encodes as zeros; the header keeps both apart.
        let ctx = PackingContext::new(8, 8);
        let without = encode(&component(&[1, 2], &[]), &ctx);
        let with = encode(&component(&[1, 2], &[0]), &ctx);

        assert_ne!(without, with);
    }

    #[test]
    fn equal_components_equal_signatures() {
        let ctx = PackingContext::new(64, 16);
        let a = encode(&component(&[5, 6, 60], &[2, 15]), &ctx);
        let b = encode(&component(&[5, 6, 60], &[2, 15]), &ctx);
        let c = encode(&component(&[5, 6, 61], &[2, 15]), &ctx);

        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a, c);
    }
}
