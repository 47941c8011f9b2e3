use clap::{Args, FromArgMatches, Parser, Subcommand};

use crate::metadata::{PKG_DESCRIPTION, PKG_NAME, PKG_VERSION};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_NAMESPACE: &str = "org.temporary.soap";

#[derive(Parser, Debug, Clone)]
#[command(name = PKG_NAME)]
#[command(version = PKG_VERSION)]
#[command(about = PKG_DESCRIPTION, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the SOAP server (default)
    Start(StartArgs),
    /// Print the WSDL document to stdout and exit
    Wsdl(WsdlArgs),
    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct StartArgs {
    /// TCP port to listen on (all interfaces)
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Target namespace of the published service
    #[arg(long, env = "SOAP_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
}

#[derive(Args, Debug, Clone)]
pub struct WsdlArgs {
    /// Endpoint address written into the service element
    #[arg(long, default_value = "http://0.0.0.0:5000/")]
    pub location: String,

    /// Target namespace of the published service
    #[arg(long, env = "SOAP_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
}

impl Default for StartArgs {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StartArgs {
    /// Validate CLI/environment-derived arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be between 1 and 65535".to_string());
        }
        if self.namespace.trim().is_empty() {
            return Err("SOAP_NAMESPACE cannot be empty".to_string());
        }
        Ok(())
    }

    /// Parse start arguments on their own, outside any subcommand. Values not
    /// given in `args` come from the environment or the defaults.
    pub fn try_parse_standalone<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let matches =
            Self::augment_args(clap::Command::new(PKG_NAME)).try_get_matches_from(args)?;
        Self::from_arg_matches(&matches)
    }
}

impl Cli {
    /// The subcommand to run. A bare invocation starts the server with
    /// settings taken from the environment only.
    pub fn resolved_command(&self) -> Result<Command, clap::Error> {
        match &self.command {
            Some(command) => Ok(command.clone()),
            None => StartArgs::try_parse_standalone([PKG_NAME]).map(Command::Start),
        }
    }
}
