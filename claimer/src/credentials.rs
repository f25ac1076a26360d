//! Sign-in secrets: configured values first, the interactive prompt second.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{debug, warn};

use crate::config::ClaimConfig;
use crate::errors::ClaimError;

const OTP_DIGITS: usize = 6;
const OTP_STEP_SECS: u64 = 30;
const OTP_PROMPT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Text,
    /// Input is not echoed
    Password,
}

/// Asks the operator for a value.
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    /// `None` when the operator skipped the prompt or nobody can answer it.
    async fn prompt(&self, message: &str, kind: PromptKind) -> Result<Option<String>, ClaimError>;
}

/// Prompter for unattended runs: every prompt is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait::async_trait]
impl Prompter for NoPrompt {
    async fn prompt(&self, message: &str, _kind: PromptKind) -> Result<Option<String>, ClaimError> {
        debug!(message, "No prompt available, skipping");
        Ok(None)
    }
}

/// A one-time code. Kept as text so leading zeros survive.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(input: &str) -> Result<Self, ClaimError> {
        let code = input.trim();
        if code.len() == OTP_DIGITS && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(ClaimError::InvalidArgument(format!(
                "The code must be {OTP_DIGITS} digits!"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OtpCode {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

fn totp(seed: &str) -> Result<TOTP, ClaimError> {
    let cleaned: String = seed
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    let secret = Secret::Encoded(cleaned)
        .to_bytes()
        .map_err(|e| ClaimError::InvalidArgument(format!("OTP seed is not valid base32: {e:?}")))?;
    Ok(TOTP::new_unchecked(
        Algorithm::SHA1,
        OTP_DIGITS,
        1,
        OTP_STEP_SECS,
        secret,
    ))
}

/// Time-based code for `seed` at `unix_time`.
pub fn totp_at(seed: &str, unix_time: u64) -> Result<OtpCode, ClaimError> {
    OtpCode::parse(&totp(seed)?.generate(unix_time))
}

/// Time-based code for `seed` right now.
pub fn totp_now(seed: &str) -> Result<OtpCode, ClaimError> {
    let code = totp(seed)?
        .generate_current()
        .map_err(|e| ClaimError::InvalidArgument(format!("System clock is unusable: {e}")))?;
    OtpCode::parse(&code)
}

#[derive(Clone)]
pub struct Credentials {
    email: Option<String>,
    password: Option<String>,
    otp_key: Option<String>,
    prompter: Arc<dyn Prompter>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Credentials {
    pub fn new(config: &ClaimConfig, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            email: non_empty(config.email.clone()),
            password: non_empty(config.password.clone()),
            otp_key: non_empty(config.otp_key.clone()),
            prompter,
        }
    }

    /// Both email and password come from configuration.
    pub fn is_configured(&self) -> bool {
        self.email.is_some() && self.password.is_some()
    }

    pub async fn email(&self) -> Result<Option<String>, ClaimError> {
        match &self.email {
            Some(email) => Ok(Some(email.clone())),
            None => Ok(non_empty(
                self.prompter.prompt("Enter email", PromptKind::Text).await?,
            )),
        }
    }

    pub async fn password(&self) -> Result<Option<String>, ClaimError> {
        match &self.password {
            Some(password) => Ok(Some(password.clone())),
            None => Ok(non_empty(
                self.prompter
                    .prompt("Enter password", PromptKind::Password)
                    .await?,
            )),
        }
    }

    /// Generated from the configured seed, otherwise asked for.
    pub async fn otp(&self) -> Result<OtpCode, ClaimError> {
        if let Some(seed) = &self.otp_key {
            return totp_now(seed);
        }
        for _ in 0..OTP_PROMPT_ATTEMPTS {
            let Some(answer) = self
                .prompter
                .prompt("Enter two-factor sign in code", PromptKind::Text)
                .await?
            else {
                break;
            };
            match OtpCode::parse(&answer) {
                Ok(code) => return Ok(code),
                Err(e) => warn!("{}", e),
            }
        }
        Err(ClaimError::AuthFailure(
            "No valid two-factor code was provided".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // RFC 6238 SHA1 test secret "12345678901234567890" in base32
    const RFC_SEED: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    struct Scripted(Mutex<Vec<Option<String>>>);

    #[async_trait::async_trait]
    impl Prompter for Scripted {
        async fn prompt(&self, _message: &str, _kind: PromptKind) -> Result<Option<String>, ClaimError> {
            let mut answers = self.0.lock().unwrap();
            Ok(if answers.is_empty() { None } else { answers.remove(0) })
        }
    }

    fn scripted(answers: &[&str]) -> Arc<dyn Prompter> {
        Arc::new(Scripted(Mutex::new(
            answers.iter().map(|a| Some(a.to_string())).collect(),
        )))
    }

    #[test]
    fn otp_code_keeps_leading_zeros() {
        assert_eq!(OtpCode::parse("012345").unwrap().as_str(), "012345");
        assert_eq!(OtpCode::parse(" 000001 ").unwrap().as_str(), "000001");
        assert!(OtpCode::parse("12345").is_err());
        assert!(OtpCode::parse("1234567").is_err());
        assert!(OtpCode::parse("12a456").is_err());
    }

    #[test]
    fn totp_matches_rfc_vectors() {
        assert_eq!(totp_at(RFC_SEED, 59).unwrap().as_str(), "287082");
        assert_eq!(totp_at(RFC_SEED, 1_111_111_109).unwrap().as_str(), "081804");
        let spaced = "gezd gnbv gy3t qojq gezd gnbv gy3t qojq";
        assert_eq!(totp_at(spaced, 59).unwrap().as_str(), "287082");
        assert!(totp_at("not base32!", 59).is_err());
    }

    #[tokio::test]
    async fn configured_values_win_over_prompt() {
        let config = ClaimConfig {
            email: Some("alex@example.com".into()),
            password: Some("hunter2".into()),
            ..Default::default()
        };
        let creds = Credentials::new(&config, scripted(&["other", "other"]));
        assert!(creds.is_configured());
        assert_eq!(creds.email().await.unwrap().as_deref(), Some("alex@example.com"));
        assert_eq!(creds.password().await.unwrap().as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn empty_answers_count_as_missing() {
        let creds = Credentials::new(&ClaimConfig::default(), scripted(&["  "]));
        assert!(!creds.is_configured());
        assert_eq!(creds.email().await.unwrap(), None);
        assert_eq!(creds.password().await.unwrap(), None);
    }

    #[tokio::test]
    async fn otp_prompt_retries_until_six_digits() {
        let creds = Credentials::new(&ClaimConfig::default(), scripted(&["123", "012345"]));
        assert_eq!(creds.otp().await.unwrap().as_str(), "012345");

        let creds = Credentials::new(&ClaimConfig::default(), Arc::new(NoPrompt));
        assert!(matches!(creds.otp().await, Err(ClaimError::AuthFailure(_))));
    }

    #[tokio::test]
    async fn otp_seed_takes_priority() {
        let config = ClaimConfig {
            otp_key: Some(RFC_SEED.into()),
            ..Default::default()
        };
        let creds = Credentials::new(&config, scripted(&["999999"]));
        let code = creds.otp().await.unwrap();
        assert_eq!(code.as_str().len(), 6);
        assert_ne!(code.as_str(), "999999");
    }
}
