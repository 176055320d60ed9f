use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cfg = media_fx::config::Config::parse();
    if cfg.list_devices {
        media_fx::audio::list_input_devices()?;
        return Ok(());
    }
    cfg.validate()?;

    if let Err(err) = media_fx::logging::init(&cfg.log_level, cfg.log_file.as_deref(), "media_fx") {
        eprintln!("warning: logging disabled: {err:#}");
    }

    media_fx::app::run(cfg)
}
