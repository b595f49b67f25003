//! Main CLI parser and top-level argument handling.
//!
//! Global options override the environment (`PARLEY_*` variables, optionally
//! loaded from `.env`), which overrides the built-in defaults.

use std::path::PathBuf;

use clap::Parser;
use parley_voice::{AudioFormat, SpeechConfig};

use crate::commands::Commands;

/// Command-line interface definition for parley.
#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Speak chat replies aloud: server TTS with local fallback")]
#[command(version)]
pub struct Cli {
    /// Base URL of the chat server
    #[arg(long = "api-base", global = true)]
    pub api_base: Option<String>,

    /// Audio container requested from the server (mp3 or wav)
    #[arg(long, global = true)]
    pub format: Option<AudioFormat>,

    /// Local engine speaking rate (0.5 to 2.0)
    #[arg(long, global = true)]
    pub rate: Option<f32>,

    /// Local speech engine binary
    #[arg(long = "espeak-bin", global = true)]
    pub espeak_bin: Option<PathBuf>,

    /// Seconds to wait for the server before falling back
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Apply command-line overrides on top of `config`.
    pub fn apply_to(&self, config: &mut SpeechConfig) {
        if let Some(ref base) = self.api_base {
            config.set_api_base(base);
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(rate) = self.rate {
            config.local_rate = rate;
        }
        if let Some(ref bin) = self.espeak_bin {
            config.espeak_bin = bin.display().to_string();
        }
        if let Some(timeout) = self.timeout {
            config.remote_timeout_secs = timeout;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "parley",
            "--verbose",
            "--api-base",
            "http://chat.local:9000/",
            "--format",
            "WAV",
            "health",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.format, Some(AudioFormat::Wav));
        assert!(matches!(cli.command, Some(Commands::Health)));

        let mut config = SpeechConfig::default();
        cli.apply_to(&mut config);
        assert_eq!(config.api_base, "http://chat.local:9000");
        assert_eq!(config.format, AudioFormat::Wav);
    }

    #[test]
    fn test_say_joins_words() {
        let cli = Cli::parse_from(["parley", "say", "--voice", "nova", "hello", "there"]);
        let Some(Commands::Say { text, voice }) = cli.command else {
            panic!("expected say");
        };
        assert_eq!(text.join(" "), "hello there");
        assert_eq!(voice.as_deref(), Some("nova"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(Cli::try_parse_from(["parley", "--format", "ogg", "voices"]).is_err());
    }
}
