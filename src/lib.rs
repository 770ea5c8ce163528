pub mod chain;
pub mod context;
pub mod model;
pub mod policy;
pub mod truststore;
pub mod validator;
pub mod x509;

// Re-export commonly used types
pub use chain::{Chain, ChainBuildError, ChainBuilder};
pub use context::{VerificationContext, VerificationOutcome};
pub use model::{Certificate, CertificateRevocationList, KeyUsage};
pub use policy::VerifyPolicy;
pub use truststore::TrustStore;
pub use validator::{ChainValidator, ErrorKind, SignatureVerifier, Verdict};
pub use x509::{DecodeError, DerSignatureVerifier, decode_certificate, decode_crl};
