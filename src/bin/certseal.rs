//! Command-line signer and verifier.
//!
//! ```text
//! certseal sign <in.pdf> <out.pdf> <key.pem> <chain.pem> [config.json]
//! certseal verify <signed.pdf> <anchors.pem>
//! ```
//!
//! `verify` prints the verdict as JSON and exits with 0 only when the
//! signature is valid and trusted.

use certseal::config::SignerConfig;
use certseal::signatures::{verify, KeyMaterial, PdfSigner, SignableDocument, TrustStore};
use certseal::verification_code::VerificationCode;
use certseal::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const USAGE: &str = "usage:
  certseal sign <in.pdf> <out.pdf> <key.pem> <chain.pem> [config.json]
  certseal verify <signed.pdf> <anchors.pem>";

enum Command {
    Sign {
        input: PathBuf,
        output: PathBuf,
        key: PathBuf,
        chain: PathBuf,
        config: Option<PathBuf>,
    },
    Verify {
        signed: PathBuf,
        anchors: PathBuf,
    },
}

impl Command {
    fn from_args() -> Option<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
            ["sign", input, output, key, chain, rest @ ..] if rest.len() <= 1 => {
                Some(Command::Sign {
                    input: PathBuf::from(input),
                    output: PathBuf::from(output),
                    key: PathBuf::from(key),
                    chain: PathBuf::from(chain),
                    config: rest.first().map(PathBuf::from),
                })
            },
            ["verify", signed, anchors] => Some(Command::Verify {
                signed: PathBuf::from(signed),
                anchors: PathBuf::from(anchors),
            }),
            _ => None,
        }
    }
}

fn sign(
    input: &Path,
    output: &Path,
    key: &Path,
    chain: &Path,
    config: Option<&Path>,
) -> Result<()> {
    let config = match config {
        Some(path) => SignerConfig::from_file(path)?,
        None => SignerConfig::default(),
    };
    let key = KeyMaterial::from_pem(&fs::read_to_string(key)?, &fs::read(chain)?)?;
    let document = SignableDocument::new(fs::read(input)?)?;

    let signed = PdfSigner::new(config.sign_options()).sign(&document, &key)?;
    fs::write(output, &signed)?;
    log::info!("wrote {} ({} bytes)", output.display(), signed.len());

    if let Some(base_url) = &config.verification_base_url {
        let issued = chrono::Utc::now().date_naive();
        let code = VerificationCode::for_certificate(base_url, key.leaf(), issued)?;
        println!("{}", code.payload()?);
    }
    Ok(())
}

fn verify_file(signed: &Path, anchors: &Path) -> Result<bool> {
    let anchors = TrustStore::from_pem(&fs::read(anchors)?)?;
    let verdict = verify(&fs::read(signed)?, &anchors)?;
    let json = serde_json::to_string_pretty(&verdict)
        .map_err(|e| certseal::Error::Config(format!("cannot serialize verdict: {}", e)))?;
    println!("{}", json);
    Ok(verdict.is_valid())
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(command) = Command::from_args() else {
        eprintln!("{}", USAGE);
        return ExitCode::from(2);
    };

    let outcome = match &command {
        Command::Sign {
            input,
            output,
            key,
            chain,
            config,
        } => sign(input, output, key, chain, config.as_deref()).map(|()| true),
        Command::Verify { signed, anchors } => verify_file(signed, anchors),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        },
    }
}
