//! PostgreSQL password authentication: MD5 and SCRAM-SHA-256.
//!
//! SCRAM implements RFC 5802 / RFC 7677 as PostgreSQL applies them.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Compute the legacy MD5 password response: MD5(MD5(password + user) + salt).
pub fn md5_password(user: &str, password: &str, salt: &[u8; 4]) -> String {
    let inner = format!("{}{}", password, user);
    let inner_hex = format!("{:x}", md5::compute(inner.as_bytes()));

    let mut outer_input = inner_hex.into_bytes();
    outer_input.extend_from_slice(salt);

    format!("md5{:x}", md5::compute(&outer_input))
}

/// SCRAM authentication errors.
#[derive(Debug, Clone)]
pub enum ScramError {
    InvalidServerMessage,
    InvalidSalt,
    InvalidIterations,
    MissingNonce,
    MissingSalt,
    MissingIterations,
    NonceVerificationFailed,
    InvalidServerSignature,
    ServerSignatureVerificationFailed,
    InvalidState,
}

impl std::fmt::Display for ScramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidServerMessage => write!(f, "Invalid server message"),
            Self::InvalidSalt => write!(f, "Invalid salt encoding"),
            Self::InvalidIterations => write!(f, "Invalid iteration count"),
            Self::MissingNonce => write!(f, "Missing nonce in server message"),
            Self::MissingSalt => write!(f, "Missing salt in server message"),
            Self::MissingIterations => write!(f, "Missing iterations in server message"),
            Self::NonceVerificationFailed => write!(f, "Server nonce verification failed"),
            Self::InvalidServerSignature => write!(f, "Invalid server signature"),
            Self::ServerSignatureVerificationFailed => {
                write!(f, "Server signature verification failed")
            }
            Self::InvalidState => write!(f, "Invalid SCRAM state"),
        }
    }
}

impl std::error::Error for ScramError {}

/// SCRAM-SHA-256 client state machine.
///
/// Usage: `client_first_message` → send; feed the server challenge through
/// `process_server_first` → send; verify the final payload with
/// `verify_server_final`.
pub struct ScramClient {
    username: String,
    password: String,
    client_nonce: String,
    /// Filled by `process_server_first`, consumed by `verify_server_final`.
    proof_state: Option<ProofState>,
}

struct ProofState {
    auth_message: String,
    salted_password: [u8; 32],
}

impl ScramClient {
    pub fn new(username: &str, password: &str) -> Self {
        // 18 random bytes, base64-encoded to a 24-char printable nonce
        let nonce_bytes: [u8; 18] = rand::thread_rng().gen();
        Self {
            username: username.to_string(),
            password: password.to_string(),
            client_nonce: BASE64.encode(nonce_bytes),
            proof_state: None,
        }
    }

    /// client-first-message: `n,,n=<username>,r=<client-nonce>`.
    pub fn client_first_message(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare()).into_bytes()
    }

    fn client_first_bare(&self) -> String {
        // PostgreSQL is lenient about SASLprep; usernames pass through as-is.
        format!("n={},r={}", self.username, self.client_nonce)
    }

    /// Process `r=<nonce>,s=<salt>,i=<iterations>` and produce the
    /// client-final-message with the proof.
    pub fn process_server_first(&mut self, server_msg: &[u8]) -> Result<Vec<u8>, ScramError> {
        let server_str =
            std::str::from_utf8(server_msg).map_err(|_| ScramError::InvalidServerMessage)?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;

        for part in server_str.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = Some(value.to_string());
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = Some(BASE64.decode(value).map_err(|_| ScramError::InvalidSalt)?);
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| ScramError::InvalidIterations)?,
                );
            }
        }

        let combined_nonce = nonce.ok_or(ScramError::MissingNonce)?;
        let salt = salt.ok_or(ScramError::MissingSalt)?;
        let iterations = iterations.ok_or(ScramError::MissingIterations)?;

        // The server must echo our nonce as a prefix of the combined nonce
        if !combined_nonce.starts_with(&self.client_nonce) {
            return Err(ScramError::NonceVerificationFailed);
        }

        let salted_password = hi(&self.password, &salt, iterations);
        let client_key = hmac_sha256(&salted_password, b"Client Key");
        let stored_key = sha256(&client_key);

        let client_final_without_proof = format!("c=biws,r={}", combined_nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare(),
            server_str,
            client_final_without_proof
        );

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes());
        let client_proof = xor_bytes(&client_key, &client_signature);

        self.proof_state = Some(ProofState {
            auth_message,
            salted_password,
        });

        let client_final = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(client_proof)
        );
        Ok(client_final.into_bytes())
    }

    /// Verify the server's `v=<verifier>` signature.
    pub fn verify_server_final(&self, server_msg: &[u8]) -> Result<(), ScramError> {
        let server_str =
            std::str::from_utf8(server_msg).map_err(|_| ScramError::InvalidServerMessage)?;

        let verifier_b64 = server_str
            .strip_prefix("v=")
            .ok_or(ScramError::InvalidServerSignature)?;

        let server_signature = BASE64
            .decode(verifier_b64)
            .map_err(|_| ScramError::InvalidServerSignature)?;

        let state = self.proof_state.as_ref().ok_or(ScramError::InvalidState)?;

        let server_key = hmac_sha256(&state.salted_password, b"Server Key");
        let expected = hmac_sha256(&server_key, state.auth_message.as_bytes());

        if server_signature != expected {
            return Err(ScramError::ServerSignatureVerificationFailed);
        }

        Ok(())
    }
}

/// Hi() - PBKDF2 with HMAC-SHA-256.
fn hi(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut output = [0u8; 32];
    pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut output)
        .expect("valid output length");
    output
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn xor_bytes(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    for i in 0..32 {
        result[i] = a[i] ^ b[i];
    }
    result
}
