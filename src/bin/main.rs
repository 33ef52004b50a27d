//! PDF Token Signer CLI
//!
//! Command-line interface for signing PDFs with a PKCS#11 token, verifying
//! signed PDFs, inspecting tokens and managing the configuration file.

use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use pdf_token_signer::{
    adapters::token::{connect, SigningToken, TokenSource},
    domain::crypto::{certificate_pem, SigningCertificate},
    infra::config::{ConfigManager, ExportFormat, SignerConfiguration},
    SignWorkflow, SignatureReservation, SigningError, SystemClock, TokenPin, VerifyWorkflow,
};
use std::{path::PathBuf, sync::Arc};

#[derive(Parser)]
#[command(name = "pdf-token-signer")]
#[command(about = "Sign PDF documents with a PKCS#11 hardware token")]
#[command(long_about = "
PDF Token Signer - Adobe Reader compatible PDF signatures from a smartcard or USB token

EXAMPLES:
    # Sign with the first token of a vendor module
    pdf-token-signer sign contract.pdf -o contract-signed.pdf --module /usr/lib/libeTPkcs11.so

    # Sign with a development key pair instead of a token
    pdf-token-signer sign in.pdf -o out.pdf --soft-key key.pem --soft-cert cert.pem

    # Check a signed document
    pdf-token-signer verify contract-signed.pdf

    # Show slots and certificates
    pdf-token-signer token-info --module /usr/lib/softhsm/libsofthsm2.so

ENVIRONMENT VARIABLES:
    TOKEN_PIN       Token user PIN (alternative to --pin)
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TokenArgs {
    /// PKCS#11 module path (overrides config)
    #[arg(short, long, value_name = "MODULE")]
    module: Option<PathBuf>,

    /// Slot index or token label (overrides config)
    #[arg(short, long, value_name = "SLOT")]
    slot: Option<String>,

    /// Label of the certificate / key pair to use (overrides config)
    #[arg(short, long, value_name = "LABEL")]
    key_label: Option<String>,

    /// Token PIN
    #[arg(long, env = "TOKEN_PIN", hide_env_values = true)]
    pin: Option<String>,

    /// PEM private key for software signing (development only)
    #[arg(long, value_name = "KEY_PEM", requires = "soft_cert")]
    soft_key: Option<PathBuf>,

    /// PEM certificate for software signing
    #[arg(long, value_name = "CERT_PEM", requires = "soft_key")]
    soft_cert: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a PDF file
    Sign {
        /// PDF file to sign
        #[arg(value_name = "INPUT_FILE")]
        input_file: PathBuf,

        /// Output file path (must differ from the input)
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: PathBuf,

        #[command(flatten)]
        token: TokenArgs,

        /// Signature field name
        #[arg(long)]
        field_name: Option<String>,

        /// Signer name written as /Name
        #[arg(long)]
        name: Option<String>,

        /// Reason for signing
        #[arg(long)]
        reason: Option<String>,

        /// Signing location
        #[arg(long)]
        location: Option<String>,

        /// Contact information
        #[arg(long)]
        contact_info: Option<String>,

        /// Bytes reserved for the signature (overrides config)
        #[arg(long, value_name = "BYTES")]
        reserve: Option<usize>,

        /// Embed the other certificates found on the token
        #[arg(long)]
        include_chain: bool,
    },

    /// Verify the last signature of a signed PDF
    Verify {
        /// Signed PDF file to verify
        #[arg(value_name = "SIGNED_FILE")]
        file: PathBuf,
    },

    /// Show token slots and certificates
    TokenInfo {
        #[command(flatten)]
        token: TokenArgs,
    },

    /// Export the signing certificate
    ExportCert {
        #[command(flatten)]
        token: TokenArgs,

        /// Output encoding
        #[arg(short, long, value_enum, default_value = "pem")]
        format: CertFormatArg,

        /// Output file (defaults to stdout for PEM)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value (empty clears optional keys)
        value: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormatArg {
    Toml,
    Json,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CertFormatArg {
    Der,
    Pem,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Sign {
            input_file,
            output,
            token,
            field_name,
            name,
            reason,
            location,
            contact_info,
            reserve,
            include_chain,
        } => {
            let config = config_manager.load_or_default()?;
            let mut workflow = SignWorkflow::new(Arc::new(SystemClock)).with_chain(include_chain);
            workflow = workflow.with_reservation(match reserve {
                Some(bytes) => SignatureReservation::from_bytes(bytes)?,
                None => config.reservation()?,
            });

            let mut metadata = workflow.metadata();
            metadata.field_name = field_name.unwrap_or_else(|| config.signature_field_name.clone());
            metadata.signer_name = name.or_else(|| config.metadata.signer_name.clone());
            metadata.reason = reason.or_else(|| config.metadata.reason.clone());
            metadata.location = location.or_else(|| config.metadata.location.clone());
            metadata.contact_info = contact_info.or_else(|| config.metadata.contact_info.clone());

            let pin = parse_pin(&token)?;
            let mut signing_token = open_token(&token, &config, pin.clone())?;
            let signed = workflow
                .sign_file(
                    &input_file,
                    &output,
                    signing_token.as_mut(),
                    pin.as_ref(),
                    &metadata,
                )
                .map_err(|e| {
                    if e.is_embedder_contract_violation() {
                        log::warn!("Input left untouched; no output was written");
                    }
                    e
                })
                .context("Signing failed")?;

            println!("✅ File signed successfully!");
            println!("  Output: {}", output.display());
            println!("  File size: {} bytes", signed.len());
            println!("  ByteRange: {}", signed.byte_range());
        }

        Commands::Verify { file } => {
            let report = VerifyWorkflow::new().run_file(&file)?;
            if let Some(signer) = &report.signer {
                println!("📜 Signer: {}", signer.subject);
                println!("  Issuer: {}", signer.issuer);
                println!("  Serial: {}", signer.serial_hex);
                if let Some(time) = signer.signing_time {
                    println!("  Signing time: {time}");
                }
            }
            println!("  ByteRange covers document: {}", mark(report.byte_range_ok));
            println!("  Structure: {}", mark(report.structure_ok));
            println!("  Document digest: {}", mark(report.digest_ok));
            println!("  Signed attributes: {}", mark(report.attrs_ok));
            println!("  Signature: {}", mark(report.signature_ok));
            if report.success() {
                println!("✅ Signature is valid");
            } else {
                eprintln!("❌ Signature is NOT valid:");
                for problem in &report.problems {
                    eprintln!("  - {problem}");
                }
                std::process::exit(1);
            }
        }

        Commands::TokenInfo { token } => {
            let config = config_manager.load_or_default()?;
            handle_token_info(&token, &config)?;
        }

        Commands::ExportCert {
            token,
            format,
            output,
        } => {
            let config = config_manager.load_or_default()?;
            let pin = parse_pin(&token)?;
            let mut signing_token = open_token(&token, &config, pin.clone())?;
            if let Some(pin) = &pin {
                signing_token.login(pin)?;
            }
            let der = signing_token.certificate_der()?;
            let bytes = match format {
                CertFormatArg::Der => der,
                CertFormatArg::Pem => certificate_pem(&der)?,
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, bytes).into_diagnostic()?;
                    println!("✅ Certificate exported to: {}", path.display());
                }
                None if matches!(format, CertFormatArg::Pem) => {
                    print!("{}", String::from_utf8_lossy(&bytes));
                }
                None => {
                    return Err(miette::miette!("DER output needs --output <FILE>"));
                }
            }
        }

        Commands::Config(config_cmd) => handle_config_command(&config_manager, config_cmd)?,
    }

    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAILED"
    }
}

fn parse_pin(args: &TokenArgs) -> Result<Option<TokenPin>> {
    Ok(args
        .pin
        .as_deref()
        .map(TokenPin::new)
        .transpose()
        .context("Invalid PIN")?)
}

/// Software token when key files are given, otherwise the PKCS#11 module.
fn token_source(
    args: &TokenArgs,
    config: &SignerConfiguration,
    pin: Option<TokenPin>,
) -> Result<TokenSource, SigningError> {
    if let (Some(key), Some(certificate)) = (&args.soft_key, &args.soft_cert) {
        return Ok(TokenSource::Software {
            key: key.clone(),
            certificate: certificate.clone(),
            pin,
        });
    }
    pkcs11_source(args, config)
}

#[cfg(feature = "pkcs11-backend")]
fn pkcs11_source(
    args: &TokenArgs,
    config: &SignerConfiguration,
) -> Result<TokenSource, SigningError> {
    let module = args
        .module
        .clone()
        .or_else(|| config.pkcs11_module.as_ref().map(PathBuf::from))
        .ok_or_else(|| {
            SigningError::ConfigurationError(
                "no PKCS#11 module: pass --module or run 'config set pkcs11_module <path>'".into(),
            )
        })?;
    let slot = match &args.slot {
        Some(slot) => slot.parse()?,
        None => config.slot_selector()?,
    };
    Ok(TokenSource::Pkcs11 {
        module,
        slot,
        key_label: args.key_label.clone().or_else(|| config.key_label.clone()),
    })
}

#[cfg(not(feature = "pkcs11-backend"))]
fn pkcs11_source(
    _args: &TokenArgs,
    _config: &SignerConfiguration,
) -> Result<TokenSource, SigningError> {
    Err(SigningError::ConfigurationError(
        "built without the 'pkcs11-backend' feature; use --soft-key/--soft-cert".into(),
    ))
}

fn open_token(
    args: &TokenArgs,
    config: &SignerConfiguration,
    pin: Option<TokenPin>,
) -> Result<Box<dyn SigningToken>> {
    let source = token_source(args, config, pin)?;
    Ok(connect(&source).context("Failed to open signing token")?)
}

fn handle_token_info(args: &TokenArgs, config: &SignerConfiguration) -> Result<()> {
    #[cfg(feature = "pkcs11-backend")]
    if args.soft_key.is_none() {
        if let TokenSource::Pkcs11 { module, .. } = pkcs11_source(args, config)? {
            println!("🔍 Slots with a token ({}):", module.display());
            for entry in pdf_token_signer::adapters::pkcs11::list_slots(&module)? {
                println!("  #{} (slot id {}): {}", entry.index, entry.slot_id, entry.description);
            }
        }
    }

    let pin = parse_pin(args)?;
    let mut token = open_token(args, config, pin.clone())?;
    println!("🔑 Selected: {}", token.describe()?);
    if let Some(pin) = &pin {
        token.login(pin)?;
    }

    let certificate = SigningCertificate::from_der(token.certificate_der()?)?;
    println!("📜 Signing certificate:");
    println!("  Subject: {}", certificate.subject());
    println!("  Issuer: {}", certificate.issuer());
    println!("  Serial: {}", certificate.serial_hex());
    println!("  Key size: {} bits", certificate.rsa_modulus_len() * 8);
    if let (Some(from), Some(until)) = (certificate.not_before(), certificate.not_after()) {
        println!("  Valid: {from} to {until}");
    }

    let chain = token.chain_certificates_der()?;
    if !chain.is_empty() {
        println!("📁 Other certificates on token:");
        for der in chain {
            match SigningCertificate::from_der(der) {
                Ok(cert) => println!("  - {} (issuer {})", cert.subject(), cert.issuer()),
                Err(e) => println!("  - <unreadable: {e}>"),
            }
        }
    }
    Ok(())
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show { format } => {
            println!(
                "📋 Configuration file: {}",
                config_manager.config_path().display()
            );
            println!("{}", config_manager.export_config(format.into())?);
        }

        ConfigCommands::Init => {
            config_manager.load_or_create_default()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to customize settings, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            config_manager.update_value(&key, &value)?;
            println!("✅ Configuration updated: {key} = {value}");
        }
    }

    Ok(())
}
