use anyhow::Result;

fn main() -> Result<()> {
    let args = shunt::cli::parse();
    shunt::app::run(args)
}
