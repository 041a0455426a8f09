/// Number of bits needed to write down every value in `0..=max_value`, at least one.
pub(crate) fn bits_for(max_value: u64) -> u32 {
    (u64::BITS - max_value.leading_zeros()).max(1)
}

/// Weighted count by enumerating all assignments. Only for small formulas.
#[cfg(test)]
pub(crate) fn brute_force_count(
    cnf: &crate::cnf::Cnf,
    weights: &crate::count::LiteralWeights<f64>,
) -> f64 {
    use crate::literal::Variable;

    let n = cnf.num_vars();
    assert!(n < 20, "brute force is limited to small formulas");

    let mut total = 0.0;
    for bits in 0u32..1 << n {
        let value = |var: Variable| bits >> (var.id() - 1) & 1 == 1;
        if cnf.evaluate(value) {
            total += cnf
                .variables()
                .map(|var| *weights.weight(var.literal(value(var).into())))
                .product::<f64>();
        }
    }
    total
}

/// Deterministic pseudo-random CNF with clauses of one to four literals.
#[cfg(test)]
pub(crate) fn random_cnf(seed: u64, num_vars: u32, num_clauses: usize) -> crate::cnf::Cnf {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut next = |bound: u64| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state % bound
    };

    let mut cnf = crate::cnf::Cnf::new(num_vars);
    for _ in 0..num_clauses {
        let width = 1 + next(3) as usize + usize::from(next(4) == 0);
        let clause: Vec<i32> = (0..width)
            .map(|_| {
                let var = 1 + next(u64::from(num_vars)) as i32;
                if next(2) == 0 {
                    var
                } else {
                    -var
                }
            })
            .collect();
        cnf.add_dimacs_clause(&clause).unwrap();
    }
    cnf
}

#[cfg(test)]
mod test {
    use super::{bits_for, brute_force_count};
    use crate::cnf::Cnf;
    use crate::count::LiteralWeights;
    use pretty_assertions::assert_eq;

    #[test]
    fn bit_widths() {
        assert_eq!(bits_for(0), 1);
        assert_eq!(bits_for(1), 1);
        assert_eq!(bits_for(2), 2);
        assert_eq!(bits_for(255), 8);
        assert_eq!(bits_for(256), 9);
    }

    #[test]
    fn brute_force_agrees_with_hand_count() {
        let cnf = Cnf::from_dimacs_clauses(2, &[vec![1, 2], vec![-1, 2]]).unwrap();
        assert_eq!(brute_force_count(&cnf, &LiteralWeights::unweighted(2)), 2.0);
    }
}
