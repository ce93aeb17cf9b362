//! Kiln CLI - prepare and run deferred array expressions.
//! Kiln CLI - 准备并运行延迟数组表达式。

mod commands;
mod output;

use clap::{Parser, Subcommand};
use kiln_air::EngineConfig;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Main CLI structure.
/// 主 CLI 结构体。
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "Kiln - deferred array expressions, specialized per backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (JSON). / 引擎配置文件（JSON）。
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output. / 启用详细输出。
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available CLI commands.
/// 可用的 CLI 命令。
#[derive(Subcommand)]
enum Commands {
    /// Lower an expression and print the prepared IR. / 降低表达式并打印准备好的 IR。
    Prepare {
        /// Expression file (JSON). / 表达式文件（JSON）。
        file: PathBuf,

        /// Backend strategy. / 后端策略。
        #[arg(short, long)]
        strategy: Option<String>,

        /// Append the verification pass. / 追加验证 pass。
        #[arg(long)]
        verify: bool,
    },

    /// Prepare an expression and execute it. / 准备并执行表达式。
    Run {
        /// Expression file (JSON). / 表达式文件（JSON）。
        file: PathBuf,

        /// Backend strategy. / 后端策略。
        #[arg(short, long)]
        strategy: Option<String>,
    },

    /// Build and evaluate `(a + b) * (a + b)` as a term tree. / 以项树构建并求值 `(a + b) * (a + b)`。
    Demo,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "kiln=debug" } else { "kiln=info" };
    let filter = EnvFilter::try_from_env("KILN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, String> {
    match path {
        Some(path) => EngineConfig::load(path).map_err(|e| output::report(&e)),
        None => Ok(EngineConfig::default()),
    }
}

/// Main entry point.
/// 主入口点。
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Commands::Prepare {
            file,
            strategy,
            verify,
        } => {
            let verify = verify || config.verify;
            commands::prepare::run(&file, strategy.as_deref(), config.verify(verify))
        }
        Commands::Run { file, strategy } => commands::run::run(&file, strategy.as_deref(), config),
        Commands::Demo => commands::demo::run(cli.verbose),
    });

    if let Err(e) = result {
        output::error(&e);
        std::process::exit(1);
    }
}
