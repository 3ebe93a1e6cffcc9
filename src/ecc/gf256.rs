//! GF(2^8) arithmetic with the primitive polynomial 0x11D (x^8+x^4+x^3+x^2+1).

use std::sync::OnceLock;

const PRIM_POLY: u16 = 0x11D;

/// Order of the multiplicative group.
pub const ORDER: usize = 255;

struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn build_tables() -> GfTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..ORDER {
        exp[i] = x as u8;
        exp[i + ORDER] = x as u8; // wrap-around so log sums never need a modulo
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

fn tables() -> &'static GfTables {
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

/// α^i for any exponent.
pub fn exp(i: usize) -> u8 {
    tables().exp[i % ORDER]
}

/// α^-i for any exponent.
pub fn exp_neg(i: usize) -> u8 {
    tables().exp[(ORDER - i % ORDER) % ORDER]
}

pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Multiplicative inverse. `a` must be non-zero.
pub fn inv(a: u8) -> u8 {
    debug_assert_ne!(a, 0, "zero has no inverse in GF(2^8)");
    let t = tables();
    t.exp[ORDER - t.log[a as usize] as usize]
}

pub fn div(a: u8, b: u8) -> u8 {
    mul(a, inv(b))
}

/// Evaluate a polynomial with the highest-degree coefficient first.
pub fn poly_eval(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0u8, |acc, &coeff| mul(acc, x) ^ coeff)
}

/// Evaluate a polynomial with the constant term first.
pub fn poly_eval_asc(poly: &[u8], x: u8) -> u8 {
    let mut result = 0u8;
    let mut x_pow = 1u8;
    for &coeff in poly {
        result ^= mul(coeff, x_pow);
        x_pow = mul(x_pow, x);
    }
    result
}

/// Multiply two polynomials (highest-degree coefficient first).
pub fn poly_mul(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = vec![0u8; a.len() + b.len() - 1];
    for (i, &ac) in a.iter().enumerate() {
        for (j, &bc) in b.iter().enumerate() {
            result[i + j] ^= mul(ac, bc);
        }
    }
    result
}
