//! FFT-friendly transform lengths.

/// Smallest `2^a * 3^b * 5^c` reachable from the next power of two that is
/// still at least `n`.
fn good_size_cc(n: usize) -> usize {
    let mut best_fac = n.next_power_of_two();

    while best_fac % 4 == 0 {
        let new_fac = best_fac / 4 * 3;
        match new_fac.cmp(&n) {
            std::cmp::Ordering::Less => break,
            std::cmp::Ordering::Equal => return n,
            std::cmp::Ordering::Greater => {
                best_fac = new_fac;
            }
        }
    }
    while best_fac % 6 == 0 {
        let new_fac = best_fac / 6 * 5;
        match new_fac.cmp(&n) {
            std::cmp::Ordering::Less => break,
            std::cmp::Ordering::Equal => return n,
            std::cmp::Ordering::Greater => {
                best_fac = new_fac;
            }
        }
    }

    best_fac
}

/// Transform length for each axis of a padded buffer.
pub fn compute<const N: usize>(size: &[usize; N]) -> [usize; N] {
    size.map(good_size_cc)
}
