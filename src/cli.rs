//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use dse_mirror::MirrorConfig;

/// Mirror a subject-partitioned exam paper library.
///
/// Probes every candidate document location for the requested subjects and
/// resumes from the durable state record, so interrupted runs pick up where
/// they left off without re-attempting settled URLs.
#[derive(Parser, Debug)]
#[command(name = "dse-mirror")]
#[command(author, version, about)]
pub struct Args {
    /// Subject keys to mirror (default: all catalog subjects)
    pub subjects: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum concurrent requests, 1-100 (default: config file value, or 30)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Candidates per batch, 1-500; the state record is checkpointed after
    /// each batch (default: config file value, or 50)
    #[arg(short = 'b', long, value_parser = clap::value_parser!(u16).range(1..=500))]
    pub batch_size: Option<u16>,

    /// Storage root for downloaded documents
    #[arg(short = 'o', long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Path of the durable state record
    #[arg(short = 's', long, default_value = "mirror_state.json")]
    pub state_file: PathBuf,

    /// Optional JSON config file overriding the built-in defaults
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Applies the engine tunables to `config`. A flag that was not supplied
    /// leaves the config-file (or built-in) value untouched.
    pub fn apply_overrides(&self, config: &mut MirrorConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = usize::from(concurrency);
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = usize::from(batch_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["dse-mirror"]).unwrap();
        assert!(args.subjects.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert!(args.concurrency.is_none());
        assert!(args.batch_size.is_none());
        assert_eq!(args.output_dir, PathBuf::from("downloads"));
        assert_eq!(args.state_file, PathBuf::from("mirror_state.json"));
        assert!(args.config.is_none());
    }

    #[test]
    fn test_cli_positional_subjects() {
        let args = Args::try_parse_from(["dse-mirror", "phy", "chem", "bio"]).unwrap();
        assert_eq!(args.subjects, vec!["phy", "chem", "bio"]);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["dse-mirror", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        let args = Args::try_parse_from(["dse-mirror", "-c", "1"]).unwrap();
        assert_eq!(args.concurrency, Some(1));
        let args = Args::try_parse_from(["dse-mirror", "-c", "100"]).unwrap();
        assert_eq!(args.concurrency, Some(100));

        let result = Args::try_parse_from(["dse-mirror", "-c", "0"]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::ValueValidation
        );
        let result = Args::try_parse_from(["dse-mirror", "-c", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_batch_size_bounds() {
        let args = Args::try_parse_from(["dse-mirror", "-b", "500"]).unwrap();
        assert_eq!(args.batch_size, Some(500));

        let result = Args::try_parse_from(["dse-mirror", "-b", "0"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(["dse-mirror", "--batch-size", "501"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_paths_and_config() {
        let args = Args::try_parse_from([
            "dse-mirror",
            "-o",
            "/data/mirror",
            "-s",
            "/data/state.json",
            "--config",
            "mirror.json",
            "phy",
        ])
        .unwrap();
        assert_eq!(args.output_dir, PathBuf::from("/data/mirror"));
        assert_eq!(args.state_file, PathBuf::from("/data/state.json"));
        assert_eq!(args.config, Some(PathBuf::from("mirror.json")));
        assert_eq!(args.subjects, vec!["phy"]);
    }

    #[test]
    fn test_apply_overrides_absent_flags_keep_config_values() {
        let mut config = MirrorConfig::default();
        config.concurrency = 12;
        config.batch_size = 77;

        let args = Args::try_parse_from(["dse-mirror"]).unwrap();
        args.apply_overrides(&mut config);
        assert_eq!(config.concurrency, 12);
        assert_eq!(config.batch_size, 77);
    }

    #[test]
    fn test_apply_overrides_supplied_flags_win() {
        let mut config = MirrorConfig::default();
        config.concurrency = 12;
        config.batch_size = 77;

        let args = Args::try_parse_from(["dse-mirror", "-c", "5", "-b", "10"]).unwrap();
        args.apply_overrides(&mut config);
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["dse-mirror", "--help"]);
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            clap::error::ErrorKind::DisplayHelp
        );
    }
}
