//! Signer configuration file: token selection, reservation size and
//! default signature metadata.
//!
//! Persists token and signature preferences as TOML so repeated signing runs
//! need only the input and output paths. The PIN is never stored here.

use crate::domain::{
    constants::{DEFAULT_RESERVED_SIGNATURE_BYTES, DEFAULT_SIGNATURE_FIELD_NAME},
    pdf::SignatureReservation,
    types::SlotSelector,
};
use crate::infra::error::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted signer preferences. The PIN is never part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfiguration {
    /// Path of the vendor PKCS#11 module (`.so` / `.dll`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkcs11_module: Option<String>,

    /// Slot index among slots with a token, or a token label
    pub slot: String,

    /// Label of the certificate / key pair to sign with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_label: Option<String>,

    /// Bytes reserved for the DER signature inside `/Contents`
    pub reserved_signature_bytes: usize,

    /// `/T` of the signature field
    pub signature_field_name: String,

    /// Default signature dictionary metadata
    pub metadata: MetadataDefaults,
}

/// Optional `/Name`, `/Reason`, `/Location` and `/ContactInfo` values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

impl Default for SignerConfiguration {
    fn default() -> Self {
        Self {
            pkcs11_module: None,
            slot: "0".to_string(),
            key_label: None,
            reserved_signature_bytes: DEFAULT_RESERVED_SIGNATURE_BYTES,
            signature_field_name: DEFAULT_SIGNATURE_FIELD_NAME.to_string(),
            metadata: MetadataDefaults::default(),
        }
    }
}

impl SignerConfiguration {
    /// Parsed slot selector.
    pub fn slot_selector(&self) -> SigningResult<SlotSelector> {
        self.slot
            .parse()
            .map_err(|e| SigningError::ConfigurationError(format!("Invalid slot: {e}")))
    }

    /// Parsed signature reservation.
    pub fn reservation(&self) -> SigningResult<SignatureReservation> {
        SignatureReservation::from_bytes(self.reserved_signature_bytes).map_err(|e| {
            SigningError::ConfigurationError(format!("Invalid reserved_signature_bytes: {e}"))
        })
    }
}

/// Loads, validates and edits the TOML configuration file.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for the per-user configuration file.
    pub fn new() -> SigningResult<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    /// Manager for an explicit file (`--config`).
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// `<config dir>/pdf-token-signer/config.toml`.
    pub fn default_config_path() -> SigningResult<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Ok(config_dir.join("pdf-token-signer").join("config.toml"))
        } else {
            // no platform config dir
            Ok(PathBuf::from("pdf-token-signer-config.toml"))
        }
    }

    /// Load the file, writing defaults first when it is missing.
    pub fn load_or_create_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::info!(
                "Configuration file not found, creating default: {}",
                self.config_path.display()
            );
            let default_config = SignerConfiguration::default();
            self.save(&default_config)?;
            Ok(default_config)
        }
    }

    /// Load the file if present, otherwise defaults without touching disk.
    pub fn load_or_default(&self) -> SigningResult<SignerConfiguration> {
        if self.config_path.exists() {
            self.load()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path.display()
            );
            Ok(SignerConfiguration::default())
        }
    }

    /// Parse and validate the file.
    pub fn load(&self) -> SigningResult<SignerConfiguration> {
        log::debug!("Reading signer configuration {}", self.config_path.display());

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to read config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: SignerConfiguration = toml::from_str(&content).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to parse config file: {e}"))
        })?;

        Self::validate_config(&config)?;
        Ok(config)
    }

    /// Validate, then write `config` as TOML.
    pub fn save(&self, config: &SignerConfiguration) -> SigningResult<()> {
        Self::validate_config(config)?;
        log::info!("Writing signer configuration {}", self.config_path.display());

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SigningError::ConfigurationError(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(|e| {
            SigningError::ConfigurationError(format!("Failed to serialize config: {e}"))
        })?;

        fs::write(&self.config_path, content).map_err(|e| {
            SigningError::ConfigurationError(format!(
                "Failed to write config file {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Reject settings the signer cannot honour.
    pub fn validate_config(config: &SignerConfiguration) -> SigningResult<()> {
        config.slot_selector()?;
        config.reservation()?;

        if config.signature_field_name.trim().is_empty() {
            return Err(SigningError::ConfigurationError(
                "signature_field_name must not be empty".to_string(),
            ));
        }

        if let Some(module) = &config.pkcs11_module {
            if module.trim().is_empty() {
                return Err(SigningError::ConfigurationError(
                    "pkcs11_module must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Set one key by name; an empty value clears optional keys.
    pub fn update_value(&self, key: &str, value: &str) -> SigningResult<()> {
        let mut config = self.load_or_default()?;
        let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

        match key {
            "pkcs11_module" => config.pkcs11_module = optional(value),
            "slot" => config.slot = value.to_string(),
            "key_label" => config.key_label = optional(value),
            "reserved_signature_bytes" => {
                config.reserved_signature_bytes = value.parse().map_err(|_| {
                    SigningError::ConfigurationError(format!("Invalid byte count: {value}"))
                })?;
            }
            "signature_field_name" => config.signature_field_name = value.to_string(),
            "signer_name" => config.metadata.signer_name = optional(value),
            "reason" => config.metadata.reason = optional(value),
            "location" => config.metadata.location = optional(value),
            "contact_info" => config.metadata.contact_info = optional(value),
            _ => {
                return Err(SigningError::ConfigurationError(format!(
                    "Unknown configuration key: {key}"
                )));
            }
        }

        self.save(&config)
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Current configuration rendered as TOML or JSON.
    pub fn export_config(&self, format: ExportFormat) -> SigningResult<String> {
        let config = self.load_or_default()?;

        match format {
            ExportFormat::Toml => toml::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("TOML export failed: {e}"))),
            ExportFormat::Json => serde_json::to_string_pretty(&config)
                .map_err(|e| SigningError::ConfigurationError(format!("JSON export failed: {e}"))),
        }
    }
}

/// Configuration export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Toml,
    Json,
}
