//! Reed-Solomon decoding over GF(2^8): syndromes, extended Euclidean
//! algorithm for the error locator, Chien search, Forney magnitudes.

use log::debug;

use crate::decoder::gf256::{self, GfPoly};
use crate::error::{DecodeError, Result};

/// Correct up to `two_s / 2` byte errors in `received` in place.
///
/// `received` holds the full codeword block, data followed by `two_s` error
/// correction codewords, highest-degree coefficient first.
pub fn correct_errors(received: &mut [u8], two_s: usize) -> Result<()> {
    let poly = GfPoly::new(received.to_vec())?;

    let mut syndrome_coefficients = vec![0u8; two_s];
    let mut no_error = true;
    for i in 0..two_s {
        let eval = poly.evaluate_at(gf256::exp(i));
        syndrome_coefficients[two_s - 1 - i] = eval;
        if eval != 0 {
            no_error = false;
        }
    }
    if no_error {
        return Ok(());
    }

    let syndrome = GfPoly::new(syndrome_coefficients)?;
    let (sigma, omega) = run_euclidean_algorithm(gf256::build_monomial(two_s, 1), syndrome, two_s)?;

    let error_locations = find_error_locations(&sigma)?;
    let error_magnitudes = find_error_magnitudes(&omega, &error_locations)?;

    let length = received.len();
    for (i, &location) in error_locations.iter().enumerate() {
        let position = length as isize - 1 - gf256::log(location) as isize;
        if position < 0 {
            return Err(DecodeError::ReedSolomon("bad error location"));
        }
        received[position as usize] = gf256::add(received[position as usize], error_magnitudes[i]);
    }
    debug!("reed-solomon corrected {} error(s)", error_locations.len());
    Ok(())
}

/// Extended Euclidean algorithm over a = x^two_s and b = syndrome poly,
/// stopping once the remainder degree drops below two_s / 2. Returns
/// (sigma, omega) normalized by sigma(0).
fn run_euclidean_algorithm(a: GfPoly, b: GfPoly, two_s: usize) -> Result<(GfPoly, GfPoly)> {
    let (a, b) = if a.degree() < b.degree() { (b, a) } else { (a, b) };

    let mut r_last = a;
    let mut r = b;
    let mut t_last = GfPoly::zero();
    let mut t = GfPoly::one();

    while 2 * r.degree() >= two_s {
        let r_last_last = r_last;
        let t_last_last = t_last;
        r_last = r;
        t_last = t;

        if r_last.is_zero() {
            // Euclidean algorithm already terminated?
            return Err(DecodeError::ReedSolomon("divisor polynomial was zero"));
        }

        r = r_last_last;
        let mut q = GfPoly::zero();
        let denominator_leading_term = r_last.coefficient(r_last.degree());
        let dlt_inverse = gf256::inverse(denominator_leading_term)?;
        while r.degree() >= r_last.degree() && !r.is_zero() {
            let degree_diff = r.degree() - r_last.degree();
            let scale = gf256::multiply(r.coefficient(r.degree()), dlt_inverse);
            q = q.add_or_subtract(&gf256::build_monomial(degree_diff, scale));
            r = r.add_or_subtract(&r_last.multiply_by_monomial(degree_diff, scale));
        }

        t = q.multiply(&t_last).add_or_subtract(&t_last_last);

        if r.degree() >= r_last.degree() {
            return Err(DecodeError::ReedSolomon("division failed to reduce remainder"));
        }
    }

    let sigma_tilde_at_zero = t.coefficient(0);
    if sigma_tilde_at_zero == 0 {
        return Err(DecodeError::ReedSolomon("sigma(0) was zero"));
    }

    let inverse = gf256::inverse(sigma_tilde_at_zero)?;
    let sigma = t.multiply_scalar(inverse);
    let omega = r.multiply_scalar(inverse);
    Ok((sigma, omega))
}

/// Chien search: locator roots by exhaustive evaluation.
fn find_error_locations(error_locator: &GfPoly) -> Result<Vec<u8>> {
    let num_errors = error_locator.degree();
    if num_errors == 1 {
        return Ok(vec![error_locator.coefficient(1)]);
    }
    let mut result = Vec::with_capacity(num_errors);
    for i in 1..=255u16 {
        if error_locator.evaluate_at(i as u8) == 0 {
            result.push(gf256::inverse(i as u8)?);
            if result.len() == num_errors {
                break;
            }
        }
    }
    if result.len() != num_errors {
        return Err(DecodeError::ReedSolomon("locator degree does not match root count"));
    }
    Ok(result)
}

/// Forney algorithm for error magnitudes.
fn find_error_magnitudes(omega: &GfPoly, error_locations: &[u8]) -> Result<Vec<u8>> {
    let s = error_locations.len();
    let mut result = Vec::with_capacity(s);
    for i in 0..s {
        let xi_inverse = gf256::inverse(error_locations[i])?;
        let mut denominator = 1u8;
        for (j, &other) in error_locations.iter().enumerate() {
            if i == j {
                continue;
            }
            // denominator *= 1 + other * xi_inverse; forcing the low bit
            // keeps the product consistent without a 0-aware multiply.
            let term = gf256::multiply(other, xi_inverse);
            let term_plus_one = if term & 0x01 == 0 { term | 1 } else { term & !1 };
            denominator = gf256::multiply(denominator, term_plus_one);
        }
        result.push(gf256::multiply(
            omega.evaluate_at(xi_inverse),
            gf256::inverse(denominator)?,
        ));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference encoder: appends `two_s` ECC bytes whose generator roots
    /// are alpha^0 .. alpha^(two_s - 1).
    fn rs_encode(data: &[u8], two_s: usize) -> Vec<u8> {
        let mut generator = GfPoly::one();
        for i in 0..two_s {
            let root_factor = GfPoly::new(vec![1, gf256::exp(i)]).unwrap();
            generator = generator.multiply(&root_factor);
        }
        let info = GfPoly::new(data.to_vec()).unwrap().multiply_by_monomial(two_s, 1);
        let (_, remainder) = info.divide(&generator).unwrap();

        let mut codeword = data.to_vec();
        let mut ecc = vec![0u8; two_s];
        if !remainder.is_zero() {
            for degree in 0..=remainder.degree() {
                ecc[two_s - 1 - degree] = remainder.coefficient(degree);
            }
        }
        codeword.extend_from_slice(&ecc);
        codeword
    }

    #[test]
    fn no_errors_is_a_no_op() {
        let mut codeword = rs_encode(&[0x12, 0x34, 0x56, 0x78], 10);
        let expected = codeword.clone();
        correct_errors(&mut codeword, 10).unwrap();
        assert_eq!(codeword, expected);
    }

    #[test]
    fn corrects_single_error() {
        let data = [0x40, 0xD2, 0x75, 0x47, 0x76, 0x17, 0x32, 0x06];
        let mut codeword = rs_encode(&data, 10);
        let clean = codeword.clone();
        codeword[3] ^= 0xA5;
        correct_errors(&mut codeword, 10).unwrap();
        assert_eq!(codeword, clean);
    }

    #[test]
    fn corrects_up_to_half_ecc_errors() {
        let data: Vec<u8> = (1..=16).collect();
        let mut codeword = rs_encode(&data, 10);
        let clean = codeword.clone();
        for (i, position) in [0usize, 5, 9, 14, 20].iter().enumerate() {
            codeword[*position] ^= 0x11 + i as u8;
        }
        correct_errors(&mut codeword, 10).unwrap();
        assert_eq!(codeword, clean);
    }

    #[test]
    fn corrects_errors_in_ecc_tail() {
        let data = [7u8, 7, 7, 7];
        let mut codeword = rs_encode(&data, 8);
        let clean = codeword.clone();
        let len = codeword.len();
        codeword[len - 1] ^= 0xFF;
        codeword[len - 3] ^= 0x0F;
        correct_errors(&mut codeword, 8).unwrap();
        assert_eq!(codeword, clean);
    }

    #[test]
    fn too_many_errors_is_detected() {
        let data: Vec<u8> = (10..30).collect();
        let mut codeword = rs_encode(&data, 6);
        // 6 ECC codewords correct at most 3 errors.
        for position in [0usize, 3, 6, 9, 12] {
            codeword[position] ^= 0xC3;
        }
        assert!(matches!(
            correct_errors(&mut codeword, 6),
            Err(DecodeError::ReedSolomon(_))
        ));
    }

    #[test]
    fn all_zero_codeword_is_valid() {
        let mut codeword = vec![0u8; 26];
        correct_errors(&mut codeword, 10).unwrap();
        assert_eq!(codeword, vec![0u8; 26]);
    }
}
