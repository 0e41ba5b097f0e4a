use clap::Parser;

#[derive(Debug, Parser)]
pub struct Cli {
    #[command(flatten)]
    pub verbosity: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Path of the configuration file
    #[clap(long, short)]
    pub config: camino::Utf8PathBuf,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Stream the animation to the configured display
    Run {
        /// Seed for the random number generator, overrides the configuration
        #[clap(long)]
        seed: Option<u64>,
    },

    /// Load and validate the configuration, then exit
    VerifyConfig,
}
