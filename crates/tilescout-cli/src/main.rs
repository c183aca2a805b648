mod command;
mod config;
mod replay;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
