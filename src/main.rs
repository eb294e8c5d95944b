use apollo_codegen::{cli::Cli, toolchain::ApolloCli};
use clap::Parser;
use eyre::{Result, WrapErr};

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp(None)
        .init();

    let cwd = std::env::current_dir().wrap_err("unable to determine current working directory")?;
    let toolchain =
        ApolloCli::new(args.cli_url.clone(), &cwd).with_sha256(args.cli_sha256.clone());
    args.run(&cwd, &toolchain)?;

    Ok(())
}
