//! jbridge command-line tool
//!
//! Compiles JNI bridges for methods described on the command line and
//! shows the runtime layout they are compiled against.

mod commands;
mod method_spec;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use method_spec::MethodSpec;
use settings::CompileArgs;

#[derive(Parser)]
#[command(name = "jbridge")]
#[command(about = "JNI bridge compiler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Cranelift IR of the bridges for the given methods
    Emit {
        /// Methods as `[static ]Lpkg/Class;->name(descriptor)`
        #[arg(required = true)]
        methods: Vec<MethodSpec>,
        #[command(flatten)]
        compile: CompileArgs,
    },

    /// Compile bridges into a relocatable object file
    Object {
        /// Methods as `[static ]Lpkg/Class;->name(descriptor)`
        #[arg(required = true)]
        methods: Vec<MethodSpec>,
        /// Output file
        #[arg(short, long, default_value = "bridges.o")]
        output: PathBuf,
        #[command(flatten)]
        compile: CompileArgs,
    },

    /// Print the runtime field offsets bridges are compiled against
    Layout,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("JBRIDGE_LOG", "warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Emit { methods, compile } => commands::emit::execute(&methods, &compile.load()?),
        Commands::Object { methods, output, compile } => {
            commands::object::execute(&methods, &output, &compile.load()?)
        }
        Commands::Layout => commands::layout::execute(),
    }
}
