use std::path::Path;

use crate::settings::{load_settings, settings_path};

pub fn run(conf: Option<&Path>) -> anyhow::Result<()> {
    let settings = load_settings(conf)?;
    let names = settings.issuer_names();
    if names.is_empty() {
        let path = conf.map(Path::to_path_buf).unwrap_or_else(settings_path);
        println!("No issuers defined in {}.", path.display());
        return Ok(());
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}
