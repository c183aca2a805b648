use std::path::PathBuf;

use crate::{config::AppConfig, util::Output};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ConfigArg {
    /// Write the configuration to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(config: &AppConfig, arg: &ConfigArg) -> anyhow::Result<()> {
    Output::save_json(config, arg.output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::read_json_file;

    #[test]
    fn test_written_config_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let arg = ConfigArg {
            output: Some(path.clone()),
        };
        run(&AppConfig::default(), &arg).unwrap();
        let config: AppConfig = read_json_file("config", &path).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
