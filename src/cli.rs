//! Command-line interface implementation for kiln.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Command-line arguments structure for kiln.
#[derive(Parser, Debug)]
#[command(author, version, about = "kiln: template renderer with SOPS secret injection", long_about = None)]
pub struct Args {
    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Renders all template files and injects secrets.
    ///
    /// Renders every file from `kiln.source` into `kiln.target`, injecting all
    /// configuration data and secrets from kiln.yaml and secrets.yaml.
    Render {
        /// Cleanup all .terraform directories in target path before rendering
        #[arg(short = 't', long = "cleanup-terraform")]
        cleanup_terraform: bool,

        /// Clean entire target path before rendering
        #[arg(short = 'd', long = "remove-directories")]
        remove_directories: bool,
    },

    /// Renders a single template from a file or STDIN to a file or STDOUT.
    #[command(visible_alias = "file")]
    Template {
        /// Template file, `-` or omitted for STDIN
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        /// Output file, `-` or omitted for STDOUT
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Stores generated secrets back into the encrypted secrets file.
    ///
    /// File names under `kiln.secrets` translate into key paths, for example
    /// rendered/secrets/tls.key is stored at `tls: key:` in secrets.yaml.
    /// Rendered counterparts of *.sops_enc files are re-encrypted back to their
    /// original location under `kiln.source`.
    #[command(name = "store-secrets", visible_aliases = ["store", "save"])]
    StoreSecrets,

    /// Prints version information
    Version,
}

/// Treats `-` like an omitted path, meaning STDIN or STDOUT.
pub fn std_stream_path(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| *p != Path::new("-"))
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 and the help text if no subcommand is given
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let missing = matches!(
                e.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::MissingSubcommand
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            );
            if missing {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
