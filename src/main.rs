use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = neonviz::config::Config::parse();
    neonviz::app::run(cfg)
}
