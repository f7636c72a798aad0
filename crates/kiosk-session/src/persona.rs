//! Kiosk persona and product spec sheet.
//!
//! The persona file is TOML with a `[persona]` section (avatar, voice and
//! model identities plus the spoken introduction) and a `[product]` section
//! describing the one device on display. A default file is embedded at
//! compile time from `contrib/persona/default.toml`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const DEFAULT_PERSONA: &str = include_str!("../../../contrib/persona/default.toml");

#[derive(Error, Debug)]
pub enum PersonaError {
    #[error("failed to read persona file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad persona TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Identity of the assistant shown on screen.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaProfile {
    pub name: String,
    pub avatar_id: String,
    pub voice_id: String,
    pub llm_id: String,
    /// Scripted utterance spoken once the session is ready.
    pub intro: String,
}

/// Factual attributes of the product on display.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecSheet {
    pub model: String,
    pub cpu: String,
    pub ram_gb: u32,
    pub storage: String,
    pub gpu: String,
    pub os: String,
}

/// A parsed persona file.
#[derive(Debug, Clone, Deserialize)]
pub struct KioskPersona {
    pub persona: PersonaProfile,
    pub product: SpecSheet,
}

/// Persona configuration as sent to the session token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaConfig {
    pub name: String,
    pub avatar_id: String,
    pub voice_id: String,
    pub llm_id: String,
    pub system_prompt: String,
}

impl KioskPersona {
    /// The persona compiled into the binary.
    pub fn embedded() -> Result<Self, PersonaError> {
        Self::from_toml_str(DEFAULT_PERSONA)
    }

    /// Load from `path`, or the embedded default when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, PersonaError> {
        let Some(path) = path else {
            return Self::embedded();
        };
        let text = std::fs::read_to_string(path).map_err(|source| PersonaError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let persona = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), name = %persona.persona.name, "loaded persona");
        Ok(persona)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PersonaError> {
        Ok(toml::from_str(text)?)
    }

    pub fn intro(&self) -> &str {
        self.persona.intro.trim()
    }

    /// Build the token-request persona, rendering the system prompt from the
    /// spec sheet.
    pub fn persona_config(&self) -> PersonaConfig {
        PersonaConfig {
            name: self.persona.name.clone(),
            avatar_id: self.persona.avatar_id.clone(),
            voice_id: self.persona.voice_id.clone(),
            llm_id: self.persona.llm_id.clone(),
            system_prompt: system_prompt(&self.persona.name, &self.product),
        }
    }
}

/// Sales-assistant prompt: factual hardware answers only from the spec
/// sheet, general knowledge only for suitability and usage advice.
fn system_prompt(name: &str, spec: &SpecSheet) -> String {
    format!(
        r#"You are "{name}", a sales assistant in a showroom, standing next to ONE specific device on display.
You are NOT the device. Always refer to it as "this laptop", "this model" or "it".

Spec sheet of the device on display:
- Model: {model}
- Processor (CPU): {cpu}
- RAM: {ram} GB
- Storage: {storage}
- Graphics (GPU): {gpu}
- Operating System: {os}

Introduction: when a new customer arrives, greet them, mention the key highlights from the spec sheet and two or three ideal use cases. Keep it under 30 seconds.

Hardware questions (RAM, processor, storage, graphics, operating system): answer ONLY with the exact values from the spec sheet. Never guess or invent hardware values.

Suitability questions (gaming, video editing, programming, comparisons): use general knowledge about typical performance of these specs. Give a clear yes, no or partially with a short, simple explanation, and be honest but polite when something is not ideal.

Tone: warm, polite, non-technical. Focus on what this device is good for."#,
        model = spec.model,
        cpu = spec.cpu,
        ram = spec.ram_gb,
        storage = spec.storage,
        gpu = spec.gpu,
        os = spec.os,
    )
}
