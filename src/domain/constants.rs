//! Centralized constants for commonly repeated DER/OID bytes, tags and PDF literals.
//! Keep this intentionally small; only broadly reused literals should live here.

// === ASN.1 DER Constants ===

/// ASN.1 INTEGER tag
pub const ASN1_INTEGER_TAG: u8 = 0x02;

/// ASN.1 OCTET STRING tag
pub const ASN1_OCTET_STRING_TAG: u8 = 0x04;

/// ASN.1 OBJECT IDENTIFIER tag
pub const ASN1_OID_TAG: u8 = 0x06;

/// ASN.1 UTCTime tag
pub const ASN1_UTC_TIME_TAG: u8 = 0x17;

/// ASN.1 GeneralizedTime tag
pub const ASN1_GENERALIZED_TIME_TAG: u8 = 0x18;

/// ASN.1 SEQUENCE tag
pub const ASN1_SEQUENCE_TAG: u8 = 0x30;

/// ASN.1 SET tag
pub const ASN1_SET_TAG: u8 = 0x31;

/// ASN.1 context-specific constructed tag [0] (EXPLICIT wrapper or IMPLICIT SET)
pub const ASN1_CONTEXT_0_CONSTRUCTED_TAG: u8 = 0xA0;

/// CMS version 1 (`SignedData` and `SignerInfo` with issuerAndSerialNumber)
pub const CMS_VERSION_1: &[u8] = &[0x02, 0x01, 0x01];

// === PKCS#7/CMS OID Constants ===

/// id-data (1.2.840.113549.1.7.1) with tag and length
pub const OID_DATA_COMPLETE: &[u8] = &[
    0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x01,
];

/// id-signedData (1.2.840.113549.1.7.2) with tag and length
pub const OID_SIGNED_DATA_COMPLETE: &[u8] = &[
    0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02,
];

/// PKCS#9 contentType OID (1.2.840.113549.1.9.3) with tag and length
pub const OID_CONTENT_TYPE_COMPLETE: &[u8] = &[
    0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x03,
];

/// PKCS#9 messageDigest OID (1.2.840.113549.1.9.4) with tag and length
pub const OID_MESSAGE_DIGEST_COMPLETE: &[u8] = &[
    0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x04,
];

/// PKCS#9 signingTime OID (1.2.840.113549.1.9.5) with tag and length
pub const OID_SIGNING_TIME_COMPLETE: &[u8] = &[
    0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x05,
];

/// SHA-256 `AlgorithmIdentifier` SEQUENCE with NULL parameters (2.16.840.1.101.3.4.2.1)
pub const SHA256_ALGORITHM_IDENTIFIER: &[u8] = &[
    0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00,
];

/// sha256WithRSAEncryption `AlgorithmIdentifier` with NULL parameters (1.2.840.113549.1.1.11)
pub const SHA256_WITH_RSA_ALGORITHM_IDENTIFIER: &[u8] = &[
    0x30, 0x0D, 0x06, 0x09, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B, 0x05, 0x00,
];

/// rsaEncryption OID (1.2.840.113549.1.1.1) in dotted form, as reported by `x509-cert`
pub const RSA_ENCRYPTION_OID: &str = "1.2.840.113549.1.1.1";

/// SHA-256 `DigestInfo` prefix preceding the 32 digest bytes (PKCS#1 v1.5, RFC 8017 9.2)
pub const SHA256_DIGEST_INFO_PREFIX: &[u8] = &[
    0x30, 0x31, 0x30, 0x0D, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

/// SHA-256 output size in bytes
pub const SHA256_DIGEST_LEN: usize = 32;

// === PDF Signature Constants ===

/// Default signature reservation in bytes (hex placeholder is twice this plus brackets)
pub const DEFAULT_RESERVED_SIGNATURE_BYTES: usize = 8192;

/// `/ByteRange` placeholder slot: four fixed-width integers, space padded when filled
pub const BYTE_RANGE_PLACEHOLDER: &str = "[0 ********** ********** **********]";

/// Width of each of the three variable `/ByteRange` integers
pub const BYTE_RANGE_FIELD_WIDTH: usize = 10;

/// `/SigFlags` value: SignaturesExist | AppendOnly
pub const ACRO_FORM_SIG_FLAGS: u32 = 3;

/// Widget annotation flags: Print | Locked
pub const SIGNATURE_WIDGET_FLAGS: u32 = 132;

/// Default signature field name
pub const DEFAULT_SIGNATURE_FIELD_NAME: &str = "Signature1";

/// Signature handler written to `/Filter`
pub const PDF_SIGNATURE_FILTER: &str = "Adobe.PPKLite";

/// Signature encoding written to `/SubFilter`
pub const PDF_SIGNATURE_SUB_FILTER: &str = "adbe.pkcs7.detached";

/// Maximum PDF cross-reference offset representable in a 10 digit xref entry
pub const PDF_MAX_XREF_OFFSET: u64 = 9_999_999_999;
