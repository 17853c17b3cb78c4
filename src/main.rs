use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser};
use sdnotify_proxy::{Config, EXIT_FAILURE, Outcome, Subscribe, Supervisor};

#[derive(Parser, Debug)]
#[command(
    name = "sdnotify-proxy",
    version,
    about = "Run a command behind a substitute NOTIFY_SOCKET and detach it once it reports READY=1"
)]
struct Cli {
    /// Seconds the command has to become ready (0 disables the deadline)
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout: u64,

    /// Print lifecycle traces to stderr (also enabled by VERBOSE=1)
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Path of the notification socket to create
    #[arg(value_name = "PROXY_SOCKET_PATH")]
    socket: PathBuf,

    /// Command to run, followed by its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

/// `VERBOSE=1` turns tracing on; any other value is ignored.
fn verbose_env(value: Option<&OsStr>) -> bool {
    value.is_some_and(|v| v == "1")
}

impl Cli {
    fn config(&self, env_verbose: bool) -> Config {
        Config {
            timeout: Duration::from_secs(self.timeout),
            verbose: self.verbose || env_verbose,
            ..Config::default()
        }
    }
}

fn subscribers(cfg: &Config) -> Vec<Arc<dyn Subscribe>> {
    #[cfg(feature = "logging")]
    {
        let writer: Arc<dyn Subscribe> = Arc::new(sdnotify_proxy::LogWriter::new(cfg.verbose));
        vec![writer]
    }
    #[cfg(not(feature = "logging"))]
    {
        let _ = cfg;
        Vec::new()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            process::exit(EXIT_FAILURE);
        }
        // --help / --version
        Err(e) => e.exit(),
    };

    let cfg = cli.config(verbose_env(std::env::var_os("VERBOSE").as_deref()));
    let sup = Supervisor::new(cfg.clone(), subscribers(&cfg));

    let code = match sup.run(cli.socket, cli.command).await {
        Ok(Outcome::Detached { pid }) => {
            let mut out = std::io::stdout().lock();
            if writeln!(out, "{pid}").and_then(|()| out.flush()).is_err() {
                EXIT_FAILURE
            } else {
                0
            }
        }
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("sdnotify-proxy: {e}");
            e.exit_code()
        }
    };
    process::exit(code);
}
