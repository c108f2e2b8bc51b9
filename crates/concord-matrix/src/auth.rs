//! Login material: operator credentials and derived peer identities.

use std::path::Path;

use concord_federation::ServerName;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::Deserialize;

use crate::error::Result;

/// Operator account credentials, loaded from a JSON file
/// `{"username": ..., "password": ...}`.
///
/// An unreadable or malformed file is a fatal startup error - there is
/// no sensible retry for bad credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Load credentials from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// An ephemeral signing identity for logging into peer servers.
///
/// Acting on a peer server requires no privileged account, only
/// measurement access, so instead of the operator's credentials we log
/// in with a throwaway keypair: the username is the address form of the
/// public key and the password a signature over the server's name.
#[derive(Debug)]
pub struct PeerIdentity {
    signing_key: SigningKey,
}

impl PeerIdentity {
    /// Generate a fresh identity.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Address-style username derived from the public key.
    pub fn username(&self) -> String {
        format!(
            "0x{}",
            hex::encode(self.signing_key.verifying_key().to_bytes())
        )
    }

    /// Login proof for a server: hex signature over the server name.
    pub fn proof_for(&self, server: &ServerName) -> String {
        let signature = self.signing_key.sign(server.as_str().as_bytes());
        hex::encode(signature.to_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn credentials_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "ensurer", "password": "hunter2"}}"#).unwrap();

        let credentials = Credentials::from_json_file(file.path()).unwrap();
        assert_eq!(credentials.username, "ensurer");
        assert_eq!(credentials.password, "hunter2");
    }

    #[test]
    fn malformed_credentials_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"username": "ensurer"}}"#).unwrap();
        assert!(Credentials::from_json_file(file.path()).is_err());
    }

    #[test]
    fn peer_identity_is_stable_per_instance() {
        let identity = PeerIdentity::generate();
        let server = ServerName::new("a.example");

        assert_eq!(identity.username(), identity.username());
        assert_eq!(identity.proof_for(&server), identity.proof_for(&server));
        // Different servers get different proofs.
        assert_ne!(
            identity.proof_for(&server),
            identity.proof_for(&ServerName::new("b.example"))
        );
    }

    #[test]
    fn distinct_identities_differ() {
        assert_ne!(
            PeerIdentity::generate().username(),
            PeerIdentity::generate().username()
        );
    }
}
