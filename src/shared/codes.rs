//! Human-facing reference codes (booking codes, ticket codes).

use rand::Rng;

/// Unambiguous alphabet: no 0/O or 1/I/L.
const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const BOOKING_CODE_LEN: usize = 8;
pub const TICKET_CODE_LEN: usize = 12;

/// Generate a random uppercase reference code of the given length.
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

pub fn booking_code() -> String {
    generate_code(BOOKING_CODE_LEN)
}

pub fn ticket_code() -> String {
    generate_code(TICKET_CODE_LEN)
}
