//! Code generation, slow hashing and bucket fingerprints

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::CodeConfig;
use crate::error::{Error, Result};
use crate::models::Section;

/// Uppercase letters and digits without look-alikes (0/O, 1/I/L)
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Longest slug fragment kept in a member code
const SLUG_FRAGMENT_LEN: usize = 8;

/// Argon2id hasher with configured cost
#[derive(Clone)]
pub struct CodeHasher {
    argon2: Argon2<'static>,
}

impl CodeHasher {
    pub fn new(config: &CodeConfig) -> Result<Self> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| Error::Config(format!("invalid code hash parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Salted PHC-format hash of a code
    pub fn hash(&self, code: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(code.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::Hashing(e.to_string()))
    }
}

impl std::fmt::Debug for CodeHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeHasher").finish_non_exhaustive()
    }
}

/// Check a candidate code against a stored hash.
/// Cost parameters come from the stored PHC string.
/// Errors only if the stored hash cannot be parsed.
pub fn verify_code(code: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| Error::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(code.as_bytes(), &parsed)
        .is_ok())
}

/// Short non-secret bucket for narrowing hash scans: 16 bits of SHA-256
pub fn fingerprint(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    format!("{:02x}{:02x}", digest[0], digest[1])
}

/// Random characters from the unambiguous alphabet
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Lowercase alphanumeric fragment of the section slug (or name)
fn slug_fragment(section: &Section) -> String {
    let source = if section.slug.trim().is_empty() {
        &section.name
    } else {
        &section.slug
    };

    let fragment: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(SLUG_FRAGMENT_LEN)
        .collect();

    if fragment.is_empty() {
        "sec".to_string()
    } else {
        fragment
    }
}

/// Member code: `<slug>-<id4>-<SUFFIX>`
pub fn member_code(section: &Section, suffix_len: usize) -> String {
    let id = section.id.simple().to_string();
    format!(
        "{}-{}-{}",
        slug_fragment(section),
        &id[..4],
        random_suffix(suffix_len)
    )
}

/// Supervisor code: `sup-<SUFFIX>`
pub fn supervisor_code(len: usize) -> String {
    format!("sup-{}", random_suffix(len))
}
