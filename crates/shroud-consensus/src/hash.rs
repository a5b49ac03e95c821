use sha2::{Digest, Sha256, Sha512};
use sha3::{Sha3_256, Sha3_512};

pub fn sha256d(b: &[u8]) -> [u8; 32] {
    sha256d_parts(&[b])
}

pub fn sha256d_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha256::new();
    for p in parts {
        h.update(p);
    }
    let first = h.finalize();
    let out = Sha256::digest(first);
    let mut r = [0u8; 32];
    r.copy_from_slice(&out);
    r
}

pub fn sha512_parts(parts: &[&[u8]]) -> [u8; 64] {
    let mut h = Sha512::new();
    for p in parts {
        h.update(p);
    }
    let out = h.finalize();
    let mut r = [0u8; 64];
    r.copy_from_slice(&out);
    r
}

pub fn sha3_256(b: &[u8]) -> [u8; 32] {
    sha3_256_parts(&[b])
}

pub fn sha3_256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha3_256::new();
    for p in parts {
        h.update(p);
    }
    let out = h.finalize();
    let mut r = [0u8; 32];
    r.copy_from_slice(&out);
    r
}

pub fn sha3_512_parts(parts: &[&[u8]]) -> [u8; 64] {
    let mut h = Sha3_512::new();
    for p in parts {
        h.update(p);
    }
    let out = h.finalize();
    let mut r = [0u8; 64];
    r.copy_from_slice(&out);
    r
}
