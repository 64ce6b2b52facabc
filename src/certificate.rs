//! Recover a signature-verification key from a PEM X.509 certificate.
//!
//! The identity provider publishes full certificates, while RSA key import
//! works on `SubjectPublicKeyInfo`. The certificate is walked with
//! [`DerReader`] down to the SPKI element, whose complete encoding is then
//! imported as an RSASSA-PKCS1-v1_5 / SHA-256 verifying key.
//!
//! ```text
//! Certificate ::= SEQUENCE {
//!   tbsCertificate       TBSCertificate,
//!   signatureAlgorithm   AlgorithmIdentifier,
//!   signatureValue       BIT STRING }
//!
//! TBSCertificate ::= SEQUENCE {
//!   version         [0]  EXPLICIT Version DEFAULT v1,
//!   serialNumber         CertificateSerialNumber,
//!   signature            AlgorithmIdentifier,
//!   issuer               Name,
//!   validity             Validity,
//!   subject              Name,
//!   subjectPublicKeyInfo SubjectPublicKeyInfo,
//!   ... }
//! ```

use std::fmt;

use base64::{engine::general_purpose, Engine as _};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use sha2::Sha256;

use crate::der::{DerReader, TAG_CONTEXT_0, TAG_SEQUENCE};
use crate::error::Error;

/// TBSCertificate fields between the version and the SPKI, in order.
const SKIPPED_TBS_FIELDS: [&str; 5] = ["serialNumber", "signature", "issuer", "validity", "subject"];

/// An imported RSA public key usable only for PKCS#1 v1.5 / SHA-256 verification.
pub struct PublicKeyHandle {
    key: VerifyingKey<Sha256>,
    modulus_bits: usize,
}

impl PublicKeyHandle {
    /// Import a DER `SubjectPublicKeyInfo` carrying an RSA key.
    pub fn from_spki_der(spki: &[u8]) -> Result<Self, Error> {
        let public_key = RsaPublicKey::from_public_key_der(spki).map_err(|e| {
            Error::InvalidCertificateStructure(format!(
                "subjectPublicKeyInfo is not an importable RSA key: {}",
                e
            ))
        })?;
        let modulus_bits = public_key.size() * 8;
        Ok(Self {
            key: VerifyingKey::new(public_key),
            modulus_bits,
        })
    }

    /// Verify `signature` over `message`. Malformed signature bytes verify as `false`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        self.key.verify(message, &signature).is_ok()
    }

    pub fn modulus_bits(&self) -> usize {
        self.modulus_bits
    }
}

impl fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyHandle")
            .field("algorithm", &"RSASSA-PKCS1-v1_5/SHA-256")
            .field("modulus_bits", &self.modulus_bits)
            .finish()
    }
}

/// Strip PEM armor lines and whitespace, then base64-decode to DER.
pub fn pem_to_der(pem: &str) -> Result<Vec<u8>, Error> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.chars())
        .filter(|c| !c.is_whitespace())
        .collect();

    if body.is_empty() {
        return Err(Error::InvalidPem("no base64 content".to_string()));
    }

    Ok(general_purpose::STANDARD.decode(body)?)
}

/// Locate the complete `SubjectPublicKeyInfo` encoding inside certificate DER.
///
/// The returned slice includes the SPKI tag and length octets, which is the
/// form SPKI importers expect.
pub fn extract_spki(der: &[u8]) -> Result<&[u8], Error> {
    let certificate = DerReader::new(der).expect_tag(TAG_SEQUENCE, "Certificate")?;
    let mut tbs = certificate
        .contents()
        .expect_tag(TAG_SEQUENCE, "TBSCertificate")?
        .contents();

    tbs.skip_if(TAG_CONTEXT_0, "version")?;
    for field in SKIPPED_TBS_FIELDS {
        tbs.skip(field)?;
    }

    let spki = tbs.expect_tag(TAG_SEQUENCE, "subjectPublicKeyInfo")?;
    Ok(spki.raw())
}

/// Convert a PEM certificate into a verification key handle.
pub fn extract_public_key(pem_certificate: &str) -> Result<PublicKeyHandle, Error> {
    let der = pem_to_der(pem_certificate)?;
    let spki = extract_spki(&der)?;
    let handle = PublicKeyHandle::from_spki_der(spki)?;
    tracing::debug!(
        certificate_bytes = der.len(),
        spki_bytes = spki.len(),
        modulus_bits = handle.modulus_bits(),
        "extracted public key from certificate"
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{sign_rs256, CERT_V1_PEM, CERT_V3_PEM, OTHER_CERT_PEM, SIGNING_SPKI_PEM};

    #[test]
    fn test_v3_certificate_yields_reference_spki() {
        let der = pem_to_der(CERT_V3_PEM).unwrap();
        let golden = pem_to_der(SIGNING_SPKI_PEM).unwrap();
        assert_eq!(extract_spki(&der).unwrap(), golden.as_slice());
    }

    #[test]
    fn test_v1_certificate_without_version_yields_same_spki() {
        let v1 = pem_to_der(CERT_V1_PEM).unwrap();
        let v3 = pem_to_der(CERT_V3_PEM).unwrap();
        // The v1 fixture has no [0] element; the v3 fixture does.
        assert_ne!(v1[8], TAG_CONTEXT_0);
        assert_eq!(v3[8], TAG_CONTEXT_0);
        assert_eq!(extract_spki(&v1).unwrap(), extract_spki(&v3).unwrap());
    }

    #[test]
    fn test_different_certificate_yields_different_spki() {
        let ours = pem_to_der(CERT_V3_PEM).unwrap();
        let theirs = pem_to_der(OTHER_CERT_PEM).unwrap();
        assert_ne!(extract_spki(&ours).unwrap(), extract_spki(&theirs).unwrap());
    }

    #[test]
    fn test_truncated_certificate_is_structural_error() {
        let der = pem_to_der(CERT_V3_PEM).unwrap();
        for cut in [1, 4, 40, der.len() / 2, der.len() - 1] {
            let err = extract_spki(&der[..cut]).unwrap_err();
            assert!(
                matches!(err, Error::InvalidCertificateStructure(_)),
                "cut at {}: {:?}",
                cut,
                err
            );
        }
    }

    #[test]
    fn test_inner_length_overrun_is_structural_error() {
        let mut der = pem_to_der(CERT_V1_PEM).unwrap();
        // TBSCertificate header at offset 4 uses a two-octet long-form length.
        assert_eq!(&der[4..6], &[0x30, 0x82]);
        der[6] = 0xff;
        der[7] = 0xff;
        let err = extract_spki(&der).unwrap_err();
        assert!(matches!(err, Error::InvalidCertificateStructure(_)));
    }

    #[test]
    fn test_non_sequence_outer_tag() {
        let mut der = pem_to_der(CERT_V3_PEM).unwrap();
        der[0] = 0x31;
        let err = extract_spki(&der).unwrap_err();
        assert!(matches!(err, Error::InvalidCertificateStructure(_)));
    }

    #[test]
    fn test_pem_errors() {
        assert!(matches!(
            pem_to_der("-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----"),
            Err(Error::InvalidPem(_))
        ));
        assert!(matches!(
            pem_to_der("-----BEGIN CERTIFICATE-----\n!!not base64!!\n-----END CERTIFICATE-----"),
            Err(Error::InvalidPem(_))
        ));
        assert!(matches!(
            extract_public_key("garbage?"),
            Err(Error::InvalidPem(_))
        ));
    }

    #[test]
    fn test_extracted_key_verifies_signatures() {
        let handle = extract_public_key(CERT_V3_PEM).unwrap();
        assert_eq!(handle.modulus_bits(), 2048);

        let signature = sign_rs256(b"header.payload");
        assert!(handle.verify(b"header.payload", &signature));
        assert!(!handle.verify(b"header.payloaD", &signature));
        assert!(!handle.verify(b"header.payload", &signature[1..]));
        assert!(!handle.verify(b"header.payload", &[]));
    }

    #[test]
    fn test_other_key_rejects_signature() {
        let handle = extract_public_key(OTHER_CERT_PEM).unwrap();
        assert!(!handle.verify(b"header.payload", &sign_rs256(b"header.payload")));
    }

    #[test]
    fn test_spki_import_rejects_non_rsa_bytes() {
        let err = PublicKeyHandle::from_spki_der(&[0x30, 0x03, 0x02, 0x01, 0x00]).unwrap_err();
        assert!(matches!(err, Error::InvalidCertificateStructure(_)));
    }
}
