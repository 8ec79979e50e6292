//! JOSE objects: parsing, JWS verification, JWE decryption and dispatch
//!
//! ```rust
//! use oidc_trust::jose::{JoseObject, JoseProcessor, SecuredVariant};
//!
//! # tokio_test::block_on(async {
//! let compact = "eyJhbGciOiJub25lIn0.eyJzdWIiOiJhbGljZSJ9.";
//! let object = JoseObject::parse(compact).unwrap();
//! assert_eq!(object.variant(), "plain");
//!
//! let verified = JoseProcessor::unsecured().process(&object).await.unwrap();
//! assert_eq!(verified.variant, SecuredVariant::Plain);
//! # });
//! ```

mod algorithm;
pub mod jwe;
mod object;
mod processor;

pub use algorithm::{EncryptionMethod, JweAlgorithm, JwsFamily, jws_algorithm_name};
pub use jwe::{JweEncrypter, JweError};
pub use object::{
    EncryptedObject, JoseHeader, JoseObject, ParseError, PlainObject, SignedObject,
};
pub use processor::{JoseError, JoseProcessor, SecuredVariant, Verified};
