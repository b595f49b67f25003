//! Main commands enum.

use clap::Subcommand;

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Speak one utterance and wait until it has been heard
    Say {
        /// Text to speak (words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Voice hint for the server and the local engine
        #[arg(long, env = "PARLEY_VOICE")]
        voice: Option<String>,
    },

    /// Speak each line read from stdin; a new line interrupts the previous one.
    ///
    /// `/stop` silences output, `/quit` exits.
    Listen {
        /// Voice hint for the server and the local engine
        #[arg(long, env = "PARLEY_VOICE")]
        voice: Option<String>,
    },

    /// List the voices offered by the server and the local engine
    Voices,

    /// Check whether the chat server and the local engine are reachable
    Health,

    /// Ask the server to abandon in-flight generation
    Interrupt,
}
