//! PKCS#11 hardware token adapter built on `cryptoki`.
//!
//! Loads a vendor module, opens a read-only session on the selected slot and
//! signs SHA-256 `DigestInfo` blocks with `CKM_RSA_PKCS`. The certificate is
//! paired with its private key through `CKA_ID`.

use std::path::{Path, PathBuf};

use cryptoki::{
    context::{CInitializeArgs, Pkcs11},
    mechanism::Mechanism,
    object::{Attribute, AttributeType, CertificateType, ObjectClass, ObjectHandle},
    session::{Session, UserType},
    slot::Slot,
    types::AuthPin,
};

use super::token::{SigningToken, TokenDescription, TokenKind};
use crate::{
    domain::{
        crypto::{DocumentDigest, RawSignature},
        types::{SlotSelector, TokenPin},
    },
    infra::error::{SigningError, SigningResult, TokenError},
};

/// A certificate object read from the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCertificate {
    pub label: String,
    pub id: Vec<u8>,
    pub der: Vec<u8>,
}

/// A slot that currently has a token inserted.
#[derive(Debug, Clone)]
pub struct SlotEntry {
    pub index: usize,
    pub slot_id: u64,
    pub description: TokenDescription,
}

pub struct Pkcs11Token {
    module: PathBuf,
    _context: Pkcs11,
    slot: Slot,
    session: Session,
    description: TokenDescription,
    key_label: Option<String>,
    logged_in: bool,
    /// Certificate chosen for signing, resolved lazily.
    signer: Option<TokenCertificate>,
}

fn load_module(module: &Path) -> SigningResult<Pkcs11> {
    log::debug!("Loading PKCS#11 module {}", module.display());
    let context = Pkcs11::new(module).map_err(|e| {
        SigningError::ConfigurationError(format!(
            "Failed to load PKCS#11 module {}: {e}",
            module.display()
        ))
    })?;
    context.initialize(CInitializeArgs::OsThreads)?;
    Ok(context)
}

fn describe_slot(context: &Pkcs11, slot: Slot) -> SigningResult<TokenDescription> {
    let info = context.get_token_info(slot)?;
    Ok(TokenDescription {
        kind: TokenKind::Pkcs11,
        label: info.label().trim_end().to_string(),
        manufacturer: info.manufacturer_id().trim_end().to_string(),
        model: info.model().trim_end().to_string(),
        serial: info.serial_number().trim_end().to_string(),
    })
}

/// Enumerate the slots of `module` that hold a token.
///
/// # Errors
/// `ConfigurationError` if the module cannot be loaded.
pub fn list_slots(module: &Path) -> SigningResult<Vec<SlotEntry>> {
    let context = load_module(module)?;
    context
        .get_slots_with_token()?
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            Ok(SlotEntry {
                index,
                slot_id: slot.id(),
                description: describe_slot(&context, slot)?,
            })
        })
        .collect()
}

impl Pkcs11Token {
    /// Load `module` and open a session on the slot chosen by `selector`.
    ///
    /// # Errors
    /// `NotPresent` if no slot with a token matches the selector.
    pub fn open(
        module: &Path,
        selector: &SlotSelector,
        key_label: Option<String>,
    ) -> SigningResult<Self> {
        let context = load_module(module)?;
        let slots = context.get_slots_with_token()?;
        if slots.is_empty() {
            return Err(TokenError::NotPresent.into());
        }

        let slot = match selector {
            SlotSelector::Index(index) => slots.get(*index).copied(),
            SlotSelector::Label(label) => slots.iter().copied().find(|slot| {
                describe_slot(&context, *slot).is_ok_and(|d| d.label == label.trim_end())
            }),
        }
        .ok_or_else(|| {
            log::warn!("{selector} not found among {} token slot(s)", slots.len());
            SigningError::Token(TokenError::NotPresent)
        })?;

        let description = describe_slot(&context, slot)?;
        let session = context.open_ro_session(slot)?;
        log::info!("Opened session on {description}");

        Ok(Self {
            module: module.to_path_buf(),
            _context: context,
            slot,
            session,
            description,
            key_label,
            logged_in: false,
            signer: None,
        })
    }

    #[must_use]
    pub fn module(&self) -> &Path {
        &self.module
    }

    #[must_use]
    pub fn slot_id(&self) -> u64 {
        self.slot.id()
    }

    /// Every X.509 certificate object visible in the session.
    pub fn list_certificates(&self) -> SigningResult<Vec<TokenCertificate>> {
        let handles = self.session.find_objects(&[
            Attribute::Class(ObjectClass::CERTIFICATE),
            Attribute::CertificateType(CertificateType::X_509),
        ])?;
        handles
            .into_iter()
            .map(|handle| self.read_certificate(handle))
            .collect()
    }

    fn read_certificate(&self, handle: ObjectHandle) -> SigningResult<TokenCertificate> {
        let mut certificate = TokenCertificate {
            label: String::new(),
            id: Vec::new(),
            der: Vec::new(),
        };
        for attribute in self.session.get_attributes(
            handle,
            &[AttributeType::Label, AttributeType::Id, AttributeType::Value],
        )? {
            match attribute {
                Attribute::Label(label) => {
                    certificate.label = String::from_utf8_lossy(&label).into_owned();
                }
                Attribute::Id(id) => certificate.id = id,
                Attribute::Value(der) => certificate.der = der,
                _ => {}
            }
        }
        if certificate.der.is_empty() {
            return Err(TokenError::NoSuchKey("certificate object has no value".into()).into());
        }
        Ok(certificate)
    }

    /// Signing certificate: the labelled one if a key label was configured,
    /// otherwise the first certificate with a matching private key.
    fn signer(&mut self) -> SigningResult<TokenCertificate> {
        if let Some(signer) = &self.signer {
            return Ok(signer.clone());
        }
        let certificates = self.list_certificates()?;
        let chosen = match &self.key_label {
            Some(label) => certificates.into_iter().find(|c| &c.label == label),
            None => {
                let with_key = certificates
                    .iter()
                    .find(|c| !c.id.is_empty() && self.private_key(&c.id).is_ok())
                    .cloned();
                with_key.or_else(|| certificates.into_iter().next())
            }
        }
        .ok_or_else(|| {
            TokenError::NoSuchKey(match &self.key_label {
                Some(label) => format!("no certificate labelled '{label}'"),
                None => "no certificate on token".into(),
            })
        })?;
        log::debug!(
            "Signing certificate '{}' (CKA_ID {})",
            chosen.label,
            hex::encode(&chosen.id)
        );
        self.signer = Some(chosen.clone());
        Ok(chosen)
    }

    /// Private key with `CKA_ID == id`, else the first key allowed to sign.
    fn private_key(&self, id: &[u8]) -> SigningResult<ObjectHandle> {
        if !id.is_empty() {
            let by_id = self.session.find_objects(&[
                Attribute::Class(ObjectClass::PRIVATE_KEY),
                Attribute::Id(id.to_vec()),
            ])?;
            if let Some(handle) = by_id.first() {
                return Ok(*handle);
            }
        }
        let signing_keys = self.session.find_objects(&[
            Attribute::Class(ObjectClass::PRIVATE_KEY),
            Attribute::Sign(true),
        ])?;
        signing_keys.first().copied().ok_or_else(|| {
            TokenError::NoSuchKey(format!("no private key with CKA_ID {}", hex::encode(id))).into()
        })
    }
}

impl SigningToken for Pkcs11Token {
    fn kind(&self) -> TokenKind {
        TokenKind::Pkcs11
    }

    fn login(&mut self, pin: &TokenPin) -> SigningResult<()> {
        self.session
            .login(UserType::User, Some(&AuthPin::new(pin.as_str().to_string())))?;
        self.logged_in = true;
        // Private objects become visible after login.
        self.signer = None;
        log::info!("Logged in to {}", self.description.label);
        Ok(())
    }

    fn certificate_der(&mut self) -> SigningResult<Vec<u8>> {
        Ok(self.signer()?.der)
    }

    fn chain_certificates_der(&mut self) -> SigningResult<Vec<Vec<u8>>> {
        let signer = self.signer()?;
        Ok(self
            .list_certificates()?
            .into_iter()
            .filter(|c| c.der != signer.der)
            .map(|c| c.der)
            .collect())
    }

    fn sign_digest(&mut self, digest: &DocumentDigest) -> SigningResult<RawSignature> {
        if !self.logged_in {
            return Err(TokenError::NotLoggedIn.into());
        }
        let signer = self.signer()?;
        let key = self.private_key(&signer.id)?;
        log::debug!("C_Sign CKM_RSA_PKCS over SHA-256 DigestInfo");
        let signature = self
            .session
            .sign(&Mechanism::RsaPkcs, key, &digest.digest_info())?;
        Ok(RawSignature::new(signature))
    }

    fn describe(&mut self) -> SigningResult<TokenDescription> {
        Ok(self.description.clone())
    }
}

impl Drop for Pkcs11Token {
    fn drop(&mut self) {
        if self.logged_in {
            if let Err(e) = self.session.logout() {
                log::debug!("Logout on drop failed: {e}");
            }
        }
    }
}
