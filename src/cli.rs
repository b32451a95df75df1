use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "authstack")]
#[command(about = "authstack - Validate, synthesize and dry-run OAuth-protected API deployments")]
pub struct Cli {
    /// Manifest path (defaults to authstack.yaml, searched upwards)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Environment for parameter resolution (development, staging, production)
    #[arg(short, long, default_value = "development", global = true)]
    pub env: String,

    /// Override a parameter, e.g. --set DOMAIN_PREFIX=my-prefix (can be repeated)
    #[arg(long = "set", value_name = "NAME=VALUE", global = true)]
    pub set: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the manifest and print a summary
    Validate {
        /// Additional manifests checked for hosted domain prefix collisions
        #[arg(value_name = "EXTRA_MANIFESTS")]
        extra: Vec<PathBuf>,
    },
    /// Synthesize the deployment template
    Synth {
        /// Write template and asset manifest to this directory instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Template format for stdout
        #[arg(long, value_enum, default_value = "json")]
        format: TemplateFormat,
    },
    /// Show the route authorization table
    Routes {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show deployment waves of the synthesized template
    Graph {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate one request against the route table
    Check {
        /// HTTP method, e.g. GET
        method: String,

        /// Request path, e.g. /accessToken
        path: String,

        /// Obtain a token for this client before sending the request
        #[arg(long)]
        client: Option<String>,

        /// Grant used to obtain the token (defaults to the client's own flow)
        #[arg(long, value_enum)]
        grant: Option<Grant>,

        /// Scope to request (can be repeated; defaults to all allowed scopes)
        #[arg(long = "scope")]
        scopes: Vec<String>,

        /// Which token to present
        #[arg(long, value_enum)]
        token: Option<TokenKind>,
    },
    /// Write a starter manifest
    Init {
        /// Output file path
        #[arg(short, long, default_value = "authstack.yaml")]
        output: PathBuf,
        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemplateFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Grant {
    Code,
    ClientCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TokenKind {
    Id,
    Access,
}
