//! Error classification
//!
//! Every error type in this crate reports an [`ErrorKind`] so callers can pick
//! a remediation without matching on individual variants:
//!
//! | Kind            | Typical cause                               | Remediation               |
//! |-----------------|---------------------------------------------|---------------------------|
//! | `Structural`    | malformed JOSE object, JSON or claim shape  | reject, never retry       |
//! | `Cryptographic` | bad signature/MAC, failed decryption, no key| key rotation / alerting   |
//! | `Policy`        | expired, wrong audience, wrong nonce, ...   | reject, client misconfig  |
//! | `Configuration` | missing selector, short secret, bad param   | fix deployment            |
//! | `Network`       | remote JWK set or document retrieval        | caller may retry the call |

use thiserror::Error;

/// Coarse failure class shared by all error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input that can never verify
    Structural,
    /// Signature, MAC or decryption failure, including "no candidate keys"
    Cryptographic,
    /// Claims policy violation
    Policy,
    /// Invalid or missing configuration
    Configuration,
    /// External I/O failure
    Network,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Structural => "structural",
            Self::Cryptographic => "cryptographic",
            Self::Policy => "policy",
            Self::Configuration => "configuration",
            Self::Network => "network",
        };
        f.write_str(name)
    }
}

/// Construction-time configuration errors
///
/// These are raised when a verifier, selector or codec is built, never while
/// verifying a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A shared secret is shorter than the minimum key size
    #[error("secret must be at least {min_bits} bits, got {actual_bits} bits")]
    SecretTooShort {
        /// Required minimum
        min_bits: usize,
        /// Length of the supplied secret
        actual_bits: usize,
    },

    /// The algorithm does not belong to the family the component requires
    #[error("algorithm {algorithm} not permitted: {reason}")]
    AlgorithmNotPermitted {
        /// Offending algorithm name
        algorithm: String,
        /// Why it was refused
        reason: &'static str,
    },

    /// An identifier or parameter value is invalid
    #[error("invalid {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why it was refused
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidParameter`]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Always [`ErrorKind::Configuration`]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::SecretTooShort {
            min_bits: 256,
            actual_bits: 128,
        };
        assert_eq!(
            err.to_string(),
            "secret must be at least 256 bits, got 128 bits"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Cryptographic.to_string(), "cryptographic");
        assert_eq!(ErrorKind::Policy.to_string(), "policy");
    }
}
