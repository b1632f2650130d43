mod command;
mod schema;
mod signal;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
