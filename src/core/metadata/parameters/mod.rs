/// Metadata supplied by the verifier, also known as the Client Metadata.
pub mod verifier;
