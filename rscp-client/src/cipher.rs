//! The RSCP session cipher.
//!
//! The appliance speaks Rijndael with a 256-bit block *and* a 256-bit key
//! in CBC mode with zero-byte padding. That block size rules out the AES
//! subset every mainstream crate implements, so the cipher core lives here;
//! it is the textbook Rijndael cipher with Nb = Nk = 8 and 14 rounds, and
//! its AES parameterizations reproduce the FIPS-197 appendix vectors.
//!
//! The CBC mode is non-standard too: the IV is not per-message but
//! per-session and per-direction. Each encrypt call seeds the next one
//! with the last ciphertext block it produced; each decrypt call seeds the
//! next one with the last ciphertext block it consumed. Both registers
//! start as 32 bytes of 0xFF, which is why a fresh session is required per
//! physical connection and why the two directions must never be confused.
//!
//! Zero padding is stripped blindly on decrypt: genuine plaintext ending
//! in 0x00 would be corrupted. That is inherited protocol behavior and is
//! preserved exactly; the frame codec never depends on bytes past the
//! declared frame end.

use crate::error::ClientError;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 32;

/// Session key size in bytes.
pub const KEY_SIZE: usize = 32;

const NB: usize = 8; // block columns (4-byte words)
const NK: usize = 8; // key words
const NR: usize = 14; // rounds
const SHIFTS: [usize; 4] = [0, 1, 3, 4]; // ShiftRows offsets for Nb = 8

const SBOX: [u8; 256] = [
    0x63, 0x7c, 0x77, 0x7b, 0xf2, 0x6b, 0x6f, 0xc5, 0x30, 0x01, 0x67, 0x2b, 0xfe, 0xd7, 0xab, 0x76,
    0xca, 0x82, 0xc9, 0x7d, 0xfa, 0x59, 0x47, 0xf0, 0xad, 0xd4, 0xa2, 0xaf, 0x9c, 0xa4, 0x72, 0xc0,
    0xb7, 0xfd, 0x93, 0x26, 0x36, 0x3f, 0xf7, 0xcc, 0x34, 0xa5, 0xe5, 0xf1, 0x71, 0xd8, 0x31, 0x15,
    0x04, 0xc7, 0x23, 0xc3, 0x18, 0x96, 0x05, 0x9a, 0x07, 0x12, 0x80, 0xe2, 0xeb, 0x27, 0xb2, 0x75,
    0x09, 0x83, 0x2c, 0x1a, 0x1b, 0x6e, 0x5a, 0xa0, 0x52, 0x3b, 0xd6, 0xb3, 0x29, 0xe3, 0x2f, 0x84,
    0x53, 0xd1, 0x00, 0xed, 0x20, 0xfc, 0xb1, 0x5b, 0x6a, 0xcb, 0xbe, 0x39, 0x4a, 0x4c, 0x58, 0xcf,
    0xd0, 0xef, 0xaa, 0xfb, 0x43, 0x4d, 0x33, 0x85, 0x45, 0xf9, 0x02, 0x7f, 0x50, 0x3c, 0x9f, 0xa8,
    0x51, 0xa3, 0x40, 0x8f, 0x92, 0x9d, 0x38, 0xf5, 0xbc, 0xb6, 0xda, 0x21, 0x10, 0xff, 0xf3, 0xd2,
    0xcd, 0x0c, 0x13, 0xec, 0x5f, 0x97, 0x44, 0x17, 0xc4, 0xa7, 0x7e, 0x3d, 0x64, 0x5d, 0x19, 0x73,
    0x60, 0x81, 0x4f, 0xdc, 0x22, 0x2a, 0x90, 0x88, 0x46, 0xee, 0xb8, 0x14, 0xde, 0x5e, 0x0b, 0xdb,
    0xe0, 0x32, 0x3a, 0x0a, 0x49, 0x06, 0x24, 0x5c, 0xc2, 0xd3, 0xac, 0x62, 0x91, 0x95, 0xe4, 0x79,
    0xe7, 0xc8, 0x37, 0x6d, 0x8d, 0xd5, 0x4e, 0xa9, 0x6c, 0x56, 0xf4, 0xea, 0x65, 0x7a, 0xae, 0x08,
    0xba, 0x78, 0x25, 0x2e, 0x1c, 0xa6, 0xb4, 0xc6, 0xe8, 0xdd, 0x74, 0x1f, 0x4b, 0xbd, 0x8b, 0x8a,
    0x70, 0x3e, 0xb5, 0x66, 0x48, 0x03, 0xf6, 0x0e, 0x61, 0x35, 0x57, 0xb9, 0x86, 0xc1, 0x1d, 0x9e,
    0xe1, 0xf8, 0x98, 0x11, 0x69, 0xd9, 0x8e, 0x94, 0x9b, 0x1e, 0x87, 0xe9, 0xce, 0x55, 0x28, 0xdf,
    0x8c, 0xa1, 0x89, 0x0d, 0xbf, 0xe6, 0x42, 0x68, 0x41, 0x99, 0x2d, 0x0f, 0xb0, 0x54, 0xbb, 0x16,
];

const INV_SBOX: [u8; 256] = [
    0x52, 0x09, 0x6a, 0xd5, 0x30, 0x36, 0xa5, 0x38, 0xbf, 0x40, 0xa3, 0x9e, 0x81, 0xf3, 0xd7, 0xfb,
    0x7c, 0xe3, 0x39, 0x82, 0x9b, 0x2f, 0xff, 0x87, 0x34, 0x8e, 0x43, 0x44, 0xc4, 0xde, 0xe9, 0xcb,
    0x54, 0x7b, 0x94, 0x32, 0xa6, 0xc2, 0x23, 0x3d, 0xee, 0x4c, 0x95, 0x0b, 0x42, 0xfa, 0xc3, 0x4e,
    0x08, 0x2e, 0xa1, 0x66, 0x28, 0xd9, 0x24, 0xb2, 0x76, 0x5b, 0xa2, 0x49, 0x6d, 0x8b, 0xd1, 0x25,
    0x72, 0xf8, 0xf6, 0x64, 0x86, 0x68, 0x98, 0x16, 0xd4, 0xa4, 0x5c, 0xcc, 0x5d, 0x65, 0xb6, 0x92,
    0x6c, 0x70, 0x48, 0x50, 0xfd, 0xed, 0xb9, 0xda, 0x5e, 0x15, 0x46, 0x57, 0xa7, 0x8d, 0x9d, 0x84,
    0x90, 0xd8, 0xab, 0x00, 0x8c, 0xbc, 0xd3, 0x0a, 0xf7, 0xe4, 0x58, 0x05, 0xb8, 0xb3, 0x45, 0x06,
    0xd0, 0x2c, 0x1e, 0x8f, 0xca, 0x3f, 0x0f, 0x02, 0xc1, 0xaf, 0xbd, 0x03, 0x01, 0x13, 0x8a, 0x6b,
    0x3a, 0x91, 0x11, 0x41, 0x4f, 0x67, 0xdc, 0xea, 0x97, 0xf2, 0xcf, 0xce, 0xf0, 0xb4, 0xe6, 0x73,
    0x96, 0xac, 0x74, 0x22, 0xe7, 0xad, 0x35, 0x85, 0xe2, 0xf9, 0x37, 0xe8, 0x1c, 0x75, 0xdf, 0x6e,
    0x47, 0xf1, 0x1a, 0x71, 0x1d, 0x29, 0xc5, 0x89, 0x6f, 0xb7, 0x62, 0x0e, 0xaa, 0x18, 0xbe, 0x1b,
    0xfc, 0x56, 0x3e, 0x4b, 0xc6, 0xd2, 0x79, 0x20, 0x9a, 0xdb, 0xc0, 0xfe, 0x78, 0xcd, 0x5a, 0xf4,
    0x1f, 0xdd, 0xa8, 0x33, 0x88, 0x07, 0xc7, 0x31, 0xb1, 0x12, 0x10, 0x59, 0x27, 0x80, 0xec, 0x5f,
    0x60, 0x51, 0x7f, 0xa9, 0x19, 0xb5, 0x4a, 0x0d, 0x2d, 0xe5, 0x7a, 0x9f, 0x93, 0xc9, 0x9c, 0xef,
    0xa0, 0xe0, 0x3b, 0x4d, 0xae, 0x2a, 0xf5, 0xb0, 0xc8, 0xeb, 0xbb, 0x3c, 0x83, 0x53, 0x99, 0x61,
    0x17, 0x2b, 0x04, 0x7e, 0xba, 0x77, 0xd6, 0x26, 0xe1, 0x69, 0x14, 0x63, 0x55, 0x21, 0x0c, 0x7d,
];

const RCON: [u8; 14] = [
    0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36, 0x6c, 0xd8, 0xab, 0x4d,
];

fn gmul(mut a: u8, mut b: u8) -> u8 {
    let mut p = 0u8;
    for _ in 0..8 {
        if b & 1 != 0 {
            p ^= a;
        }
        let hi = a & 0x80;
        a <<= 1;
        if hi != 0 {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    p
}

/// Rijndael with a 256-bit block and 256-bit key (the raw block cipher;
/// modes and padding live in [`CipherSession`]).
struct Rijndael256 {
    round_keys: [[u8; 4]; NB * (NR + 1)],
}

impl Rijndael256 {
    fn new(key: &[u8; KEY_SIZE]) -> Self {
        let mut w = [[0u8; 4]; NB * (NR + 1)];
        for (i, word) in w.iter_mut().enumerate().take(NK) {
            word.copy_from_slice(&key[4 * i..4 * i + 4]);
        }
        for i in NK..NB * (NR + 1) {
            let prev = w[i - 1];
            let t = if i % NK == 0 {
                [
                    SBOX[prev[1] as usize] ^ RCON[i / NK - 1],
                    SBOX[prev[2] as usize],
                    SBOX[prev[3] as usize],
                    SBOX[prev[0] as usize],
                ]
            } else if i % NK == 4 {
                // Nk > 6 takes an extra SubWord every half key schedule.
                [
                    SBOX[prev[0] as usize],
                    SBOX[prev[1] as usize],
                    SBOX[prev[2] as usize],
                    SBOX[prev[3] as usize],
                ]
            } else {
                prev
            };
            for j in 0..4 {
                w[i][j] = w[i - NK][j] ^ t[j];
            }
        }
        Self { round_keys: w }
    }

    fn add_round_key(&self, state: &mut [[u8; NB]; 4], round: usize) {
        for c in 0..NB {
            for r in 0..4 {
                state[r][c] ^= self.round_keys[round * NB + c][r];
            }
        }
    }

    fn encrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut st = load(block);
        self.add_round_key(&mut st, 0);
        for round in 1..NR {
            sub_bytes(&mut st);
            shift_rows(&mut st);
            mix_columns(&mut st);
            self.add_round_key(&mut st, round);
        }
        sub_bytes(&mut st);
        shift_rows(&mut st);
        self.add_round_key(&mut st, NR);
        store(&st)
    }

    fn decrypt_block(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut st = load(block);
        self.add_round_key(&mut st, NR);
        for round in (1..NR).rev() {
            inv_shift_rows(&mut st);
            inv_sub_bytes(&mut st);
            self.add_round_key(&mut st, round);
            inv_mix_columns(&mut st);
        }
        inv_shift_rows(&mut st);
        inv_sub_bytes(&mut st);
        self.add_round_key(&mut st, 0);
        store(&st)
    }
}

fn load(block: &[u8; BLOCK_SIZE]) -> [[u8; NB]; 4] {
    let mut st = [[0u8; NB]; 4];
    for c in 0..NB {
        for r in 0..4 {
            st[r][c] = block[4 * c + r];
        }
    }
    st
}

fn store(state: &[[u8; NB]; 4]) -> [u8; BLOCK_SIZE] {
    let mut block = [0u8; BLOCK_SIZE];
    for c in 0..NB {
        for r in 0..4 {
            block[4 * c + r] = state[r][c];
        }
    }
    block
}

fn sub_bytes(state: &mut [[u8; NB]; 4]) {
    for row in state.iter_mut() {
        for b in row.iter_mut() {
            *b = SBOX[*b as usize];
        }
    }
}

fn inv_sub_bytes(state: &mut [[u8; NB]; 4]) {
    for row in state.iter_mut() {
        for b in row.iter_mut() {
            *b = INV_SBOX[*b as usize];
        }
    }
}

fn shift_rows(state: &mut [[u8; NB]; 4]) {
    for (r, row) in state.iter_mut().enumerate() {
        row.rotate_left(SHIFTS[r]);
    }
}

fn inv_shift_rows(state: &mut [[u8; NB]; 4]) {
    for (r, row) in state.iter_mut().enumerate() {
        row.rotate_right(SHIFTS[r]);
    }
}

fn mix_columns(state: &mut [[u8; NB]; 4]) {
    for c in 0..NB {
        let a = [state[0][c], state[1][c], state[2][c], state[3][c]];
        state[0][c] = gmul(a[0], 2) ^ gmul(a[1], 3) ^ a[2] ^ a[3];
        state[1][c] = a[0] ^ gmul(a[1], 2) ^ gmul(a[2], 3) ^ a[3];
        state[2][c] = a[0] ^ a[1] ^ gmul(a[2], 2) ^ gmul(a[3], 3);
        state[3][c] = gmul(a[0], 3) ^ a[1] ^ a[2] ^ gmul(a[3], 2);
    }
}

fn inv_mix_columns(state: &mut [[u8; NB]; 4]) {
    for c in 0..NB {
        let a = [state[0][c], state[1][c], state[2][c], state[3][c]];
        state[0][c] = gmul(a[0], 14) ^ gmul(a[1], 11) ^ gmul(a[2], 13) ^ gmul(a[3], 9);
        state[1][c] = gmul(a[0], 9) ^ gmul(a[1], 14) ^ gmul(a[2], 11) ^ gmul(a[3], 13);
        state[2][c] = gmul(a[0], 13) ^ gmul(a[1], 9) ^ gmul(a[2], 14) ^ gmul(a[3], 11);
        state[3][c] = gmul(a[0], 11) ^ gmul(a[1], 13) ^ gmul(a[2], 9) ^ gmul(a[3], 14);
    }
}

/// Stateful encrypt/decrypt pair tied to one logical connection.
///
/// Owned exclusively by one [`Connection`](crate::Connection); the IV
/// registers are not safe to share across two live connections.
pub struct CipherSession {
    cipher: Rijndael256,
    enc_iv: [u8; BLOCK_SIZE],
    dec_iv: [u8; BLOCK_SIZE],
}

impl CipherSession {
    /// Derives the session key from the pre-shared passphrase: its UTF-8
    /// bytes, right-padded with 0xFF. Longer passphrases are rejected
    /// rather than truncated.
    pub fn new(passphrase: &str) -> Result<Self, ClientError> {
        let bytes = passphrase.as_bytes();
        if bytes.len() > KEY_SIZE {
            return Err(ClientError::KeyTooLong { len: bytes.len() });
        }
        let mut key = [0xFFu8; KEY_SIZE];
        key[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            cipher: Rijndael256::new(&key),
            enc_iv: [0xFF; BLOCK_SIZE],
            dec_iv: [0xFF; BLOCK_SIZE],
        })
    }

    /// Encrypts a frame, advancing the encrypt-direction IV to the last
    /// ciphertext block produced.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut padded = plaintext.to_vec();
        let rem = padded.len() % BLOCK_SIZE;
        if rem != 0 {
            padded.resize(padded.len() + BLOCK_SIZE - rem, 0x00);
        }
        let mut out = Vec::with_capacity(padded.len());
        let mut prev = self.enc_iv;
        for chunk in padded.chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            for (i, b) in block.iter_mut().enumerate() {
                *b = chunk[i] ^ prev[i];
            }
            prev = self.cipher.encrypt_block(&block);
            out.extend_from_slice(&prev);
        }
        if !out.is_empty() {
            self.enc_iv = prev;
        }
        out
    }

    /// Decrypts a frame, advancing the decrypt-direction IV to the last
    /// ciphertext block consumed, and strips trailing zero padding.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, ClientError> {
        let mut plain = self.cbc_decrypt(&self.dec_iv, ciphertext)?;
        if ciphertext.len() >= BLOCK_SIZE {
            self.dec_iv
                .copy_from_slice(&ciphertext[ciphertext.len() - BLOCK_SIZE..]);
        }
        while plain.last() == Some(&0x00) {
            plain.pop();
        }
        Ok(plain)
    }

    /// Decrypts without committing the IV or stripping padding. Lets the
    /// connection probe accumulated bytes for frame completeness before
    /// the stateful decrypt runs once over the full ciphertext.
    pub(crate) fn preview_decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.cbc_decrypt(&self.dec_iv, ciphertext)
    }

    fn cbc_decrypt(
        &self,
        iv: &[u8; BLOCK_SIZE],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, ClientError> {
        if ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(ClientError::InvalidCiphertext {
                len: ciphertext.len(),
            });
        }
        let mut out = Vec::with_capacity(ciphertext.len());
        let mut prev = *iv;
        for chunk in ciphertext.chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            let plain = self.cipher.decrypt_block(&block);
            for (i, p) in plain.iter().enumerate() {
                out.push(p ^ prev[i]);
            }
            prev = block;
        }
        Ok(out)
    }
}

impl std::fmt::Debug for CipherSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key or IV material.
        f.debug_struct("CipherSession").finish_non_exhaustive()
    }
}
