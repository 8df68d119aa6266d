// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Reed-Solomon error correction over GF(2^8).
//!
//! RS(255, 223) with primitive polynomial 0x11D (x^8+x^4+x^3+x^2+1) and
//! first consecutive root α^0: 32 parity bytes per chunk, up to 16 byte
//! errors corrected per chunk. Data is split into chunks of at most 223
//! bytes; the last chunk may be shortened. Decoding is Berlekamp-Massey,
//! Chien search and Forney.

use std::sync::OnceLock;

/// Primitive polynomial for GF(2^8).
const PRIM_POLY: u16 = 0x11D;

/// Codeword length of the unshortened code.
pub const N_MAX: usize = 255;

/// Parity bytes per chunk.
pub const PARITY_LEN: usize = 32;

/// Data bytes per full chunk.
pub const K_MAX: usize = N_MAX - PARITY_LEN;

/// Correctable byte errors per chunk.
pub const T_MAX: usize = PARITY_LEN / 2;

// --- GF(2^8) arithmetic ---

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn build_gf_tables() -> GfTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    for i in 0..255usize {
        exp[i] = x as u8;
        exp[i + 255] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIM_POLY;
        }
    }
    exp[510] = exp[0];
    exp[511] = exp[1];
    GfTables { exp, log }
}

fn gf() -> &'static GfTables {
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(build_gf_tables)
}

fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = gf();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Caller guarantees `a != 0`.
fn gf_inv(a: u8) -> u8 {
    let t = gf();
    t.exp[255 - t.log[a as usize] as usize]
}

/// α^e for any non-negative exponent.
fn alpha_pow(e: usize) -> u8 {
    gf().exp[e % 255]
}

/// α^-e.
fn alpha_pow_neg(e: usize) -> u8 {
    gf().exp[(255 - e % 255) % 255]
}

/// Evaluate a highest-degree-first polynomial at `x`.
fn poly_eval(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Evaluate an ascending-power polynomial at `x`.
fn eval_asc(poly: &[u8], x: u8) -> u8 {
    let mut result = 0u8;
    let mut x_pow = 1u8;
    for &c in poly {
        result ^= gf_mul(c, x_pow);
        x_pow = gf_mul(x_pow, x);
    }
    result
}

/// g(x) = prod_{i=0}^{31} (x - α^i), highest degree first.
fn generator() -> &'static [u8] {
    static GEN: OnceLock<Vec<u8>> = OnceLock::new();
    GEN.get_or_init(|| {
        let mut g = vec![1u8];
        for i in 0..PARITY_LEN {
            let root = alpha_pow(i);
            let mut next = vec![0u8; g.len() + 1];
            for (j, &c) in g.iter().enumerate() {
                next[j] ^= c;
                next[j + 1] ^= gf_mul(c, root);
            }
            g = next;
        }
        g
    })
}

// --- Encoding ---

/// Systematic encoding of one chunk: `data ‖ parity`.
fn encode_chunk(data: &[u8]) -> Vec<u8> {
    debug_assert!(data.len() <= K_MAX);
    let g = generator();
    let mut reg = [0u8; PARITY_LEN];
    for &byte in data {
        let feedback = byte ^ reg[0];
        for j in 0..PARITY_LEN - 1 {
            reg[j] = reg[j + 1] ^ gf_mul(feedback, g[j + 1]);
        }
        reg[PARITY_LEN - 1] = gf_mul(feedback, g[PARITY_LEN]);
    }
    let mut out = Vec::with_capacity(data.len() + PARITY_LEN);
    out.extend_from_slice(data);
    out.extend_from_slice(&reg);
    out
}

/// Encode `data` as consecutive chunks of at most [`K_MAX`] bytes.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(data.len()));
    for chunk in data.chunks(K_MAX) {
        out.extend_from_slice(&encode_chunk(chunk));
    }
    out
}

/// Encoded size of `data_len` bytes.
pub fn encoded_len(data_len: usize) -> usize {
    let full = data_len / K_MAX;
    let rem = data_len % K_MAX;
    full * N_MAX + if rem > 0 { rem + PARITY_LEN } else { 0 }
}

/// Largest data length whose encoding fits in `budget` bytes.
pub fn max_data_len(budget: usize) -> usize {
    let full = budget / N_MAX;
    let rem = budget % N_MAX;
    full * K_MAX + rem.saturating_sub(PARITY_LEN)
}

// --- Decoding ---

/// A chunk had more errors than the code can correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uncorrectable {
    pub chunk: usize,
}

fn syndromes(block: &[u8]) -> [u8; PARITY_LEN] {
    let mut s = [0u8; PARITY_LEN];
    for (i, slot) in s.iter_mut().enumerate() {
        *slot = poly_eval(block, alpha_pow(i));
    }
    s
}

/// Error locator σ(x), ascending powers.
fn berlekamp_massey(s: &[u8]) -> Vec<u8> {
    let n = s.len();
    let mut c = vec![0u8; n + 1];
    let mut b = vec![0u8; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut c_len = 1usize;
    let mut b_len = 1usize;
    let mut ell = 0usize;
    let mut b_disc = 1u8;
    let mut m = 1usize;

    for r in 0..n {
        let mut delta = s[r];
        for i in 1..c_len {
            delta ^= gf_mul(c[i], s[r - i]);
        }
        if delta == 0 {
            m += 1;
            continue;
        }
        let factor = gf_mul(delta, gf_inv(b_disc));
        if 2 * ell <= r {
            let prev = c.clone();
            let prev_len = c_len;
            c_len = c_len.max(b_len + m);
            for j in 0..b_len {
                c[j + m] ^= gf_mul(factor, b[j]);
            }
            b = prev;
            b_len = prev_len;
            ell = r + 1 - ell;
            b_disc = delta;
            m = 1;
        } else {
            c_len = c_len.max(b_len + m);
            for j in 0..b_len {
                c[j + m] ^= gf_mul(factor, b[j]);
            }
            m += 1;
        }
    }
    c.truncate(c_len);
    c
}

/// Roots of σ over the full 255-symbol block: (power, array index) pairs.
fn chien_search(sigma: &[u8]) -> Option<Vec<(usize, usize)>> {
    let expected = sigma.len() - 1;
    let found: Vec<(usize, usize)> = (0..N_MAX)
        .filter(|&p| eval_asc(sigma, alpha_pow_neg(p)) == 0)
        .map(|p| (p, N_MAX - 1 - p))
        .collect();
    (found.len() == expected).then_some(found)
}

/// Error magnitudes, FCR = 0: e = X · Ω(X⁻¹) / σ'(X⁻¹).
fn forney(sigma: &[u8], s: &[u8], found: &[(usize, usize)]) -> Option<Vec<u8>> {
    let two_t = s.len();
    let mut omega = vec![0u8; two_t];
    for (i, &si) in sigma.iter().enumerate().take(two_t) {
        for j in 0..two_t - i {
            omega[i + j] ^= gf_mul(si, s[j]);
        }
    }
    // Formal derivative: only odd powers survive in characteristic 2.
    let mut sigma_prime = vec![0u8; sigma.len().saturating_sub(1)];
    for i in (1..sigma.len()).step_by(2) {
        sigma_prime[i - 1] = sigma[i];
    }
    found
        .iter()
        .map(|&(p, _)| {
            let x_inv = alpha_pow_neg(p);
            let denom = eval_asc(&sigma_prime, x_inv);
            (denom != 0).then(|| gf_mul(alpha_pow(p), gf_mul(eval_asc(&omega, x_inv), gf_inv(denom))))
        })
        .collect()
}

/// Decode one (possibly shortened) chunk. Returns the data and the number of
/// corrected bytes.
fn decode_chunk(received: &[u8]) -> Option<(Vec<u8>, usize)> {
    let data_len = received.len().checked_sub(PARITY_LEN)?;
    let padding = N_MAX - received.len();
    let mut block = [0u8; N_MAX];
    block[padding..].copy_from_slice(received);

    let s = syndromes(&block);
    if s.iter().all(|&v| v == 0) {
        return Some((received[..data_len].to_vec(), 0));
    }
    let sigma = berlekamp_massey(&s);
    let errors = sigma.len() - 1;
    if errors == 0 || errors > T_MAX {
        return None;
    }
    let found = chien_search(&sigma)?;
    let magnitudes = forney(&sigma, &s, &found)?;
    for (&(_, idx), &mag) in found.iter().zip(&magnitudes) {
        // An error in the virtual zero padding means we locked onto the wrong codeword.
        if idx < padding {
            return None;
        }
        block[idx] ^= mag;
    }
    if syndromes(&block).iter().any(|&v| v != 0) {
        return None;
    }
    Some((block[padding..padding + data_len].to_vec(), errors))
}

/// Decode `data_len` bytes of data from chunks produced by [`encode`].
///
/// Returns the data and the total number of corrected bytes.
pub fn decode(encoded: &[u8], data_len: usize) -> Result<(Vec<u8>, usize), Uncorrectable> {
    let mut out = Vec::with_capacity(data_len);
    let mut corrected = 0;
    let mut offset = 0;
    let mut chunk = 0;
    while out.len() < data_len {
        let take = (data_len - out.len()).min(K_MAX) + PARITY_LEN;
        let block = encoded.get(offset..offset + take).ok_or(Uncorrectable { chunk })?;
        let (data, errs) = decode_chunk(block).ok_or(Uncorrectable { chunk })?;
        out.extend_from_slice(&data);
        corrected += errs;
        offset += take;
        chunk += 1;
    }
    Ok((out, corrected))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i * 31 + 7) as u8).collect()
    }

    #[test]
    fn gf_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "a = {a}");
        }
    }

    #[test]
    fn generator_has_expected_roots() {
        let g = generator();
        assert_eq!(g.len(), PARITY_LEN + 1);
        for i in 0..PARITY_LEN {
            assert_eq!(poly_eval(g, alpha_pow(i)), 0);
        }
    }

    #[test]
    fn lengths() {
        assert_eq!(encoded_len(0), 0);
        assert_eq!(encoded_len(10), 42);
        assert_eq!(encoded_len(223), 255);
        assert_eq!(encoded_len(224), 255 + 33);
        for n in [0, 1, 100, 223, 224, 1000] {
            assert_eq!(encode(&data(n)).len(), encoded_len(n));
            assert!(encoded_len(max_data_len(encoded_len(n))) <= encoded_len(n));
            assert!(max_data_len(encoded_len(n)) >= n);
        }
        assert_eq!(max_data_len(32), 0);
        assert_eq!(max_data_len(33), 1);
    }

    #[test]
    fn clean_decode() {
        let d = data(500);
        let (out, fixed) = decode(&encode(&d), d.len()).unwrap();
        assert_eq!(out, d);
        assert_eq!(fixed, 0);
    }

    #[test]
    fn corrects_up_to_t_errors_per_chunk() {
        let d = data(400);
        let mut enc = encode(&d);
        for i in 0..T_MAX {
            enc[i * 13] ^= 0xA5;
        }
        // Second (shortened) chunk starts at 255.
        for i in 0..5 {
            enc[255 + i * 11] ^= 0x3C;
        }
        let (out, fixed) = decode(&enc, d.len()).unwrap();
        assert_eq!(out, d);
        assert_eq!(fixed, T_MAX + 5);
    }

    #[test]
    fn shortened_chunk_with_five_errors() {
        let d = data(10);
        let mut enc = encode(&d);
        for i in [0, 3, 9, 20, 41] {
            enc[i] ^= 0xFF;
        }
        assert_eq!(decode(&enc, 10).unwrap().0, d);
    }

    #[test]
    fn too_many_errors_name_the_chunk() {
        let d = data(300);
        let mut enc = encode(&d);
        for i in 0..T_MAX + 4 {
            enc[255 + i] ^= 0x5A;
        }
        assert_eq!(decode(&enc, d.len()), Err(Uncorrectable { chunk: 1 }));
    }

    #[test]
    fn truncated_input_is_uncorrectable() {
        let enc = encode(&data(50));
        assert_eq!(decode(&enc[..40], 50), Err(Uncorrectable { chunk: 0 }));
    }
}
