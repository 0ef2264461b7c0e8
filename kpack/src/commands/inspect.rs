use anyhow::{Result, bail};
use base64::Engine;
use clap::Args;
use colored::Colorize;
use kpack_drm::pssh;
use log::info;
use std::{fs, path::Path};

#[derive(Args, Clone, Debug)]
/// Print the system id and key ids of pssh boxes.
pub struct Inspect {
    /// Pssh data input.
    /// Can be an init segment path, a file of raw boxes or a base64 encoded pssh box.
    #[arg(required = true, value_name = "PATH|BASE64")]
    input: String,
}

impl Inspect {
    pub fn execute(self) -> Result<()> {
        let data = if Path::new(&self.input).exists() {
            fs::read(&self.input)?
        } else if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(self.input.trim())
        {
            data
        } else {
            bail!("Unable to determine the INPUT type.");
        };

        let boxes = pssh::parse_boxes(&data)?;

        if boxes.is_empty() {
            bail!("No pssh box found in the INPUT.");
        }

        info!("Found {} pssh box(es).", boxes.len());

        for parsed in boxes {
            println!(
                "[{}] version {}, {} bytes",
                parsed.system_id.to_string().to_uppercase().green(),
                parsed.version,
                parsed.data.len()
            );

            for key_id in &parsed.key_ids {
                println!("  {} {}", "KID".cyan(), key_id);
            }

            println!("  {} {}", "BOX".cyan(), parsed.as_base64());
        }

        Ok(())
    }
}
