mod cli;
mod logger;

fn main() -> color_eyre::eyre::Result<()> {
    cli::main()
}
