//! Command-line arguments of `interop`.

use clap::Parser;
use peerlink::Scenario;

/// Printed for a missing or malformed command line.
pub const USAGE: &str = "command:interop <bytes_size_in_KB>";

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "interop", about = "GPU memory interop and P2P transfer checks")]
pub struct Cli {
    /// Transfer size in KB; the scenario moves size_kb * 256 u32 elements.
    #[arg(value_name = "SIZE_KB", value_parser = parse_size_kb)]
    pub size_kb: usize,

    /// Scenario to run.
    #[arg(long, default_value_t = Scenario::InteropP2p, value_parser = parse_scenario)]
    pub scenario: Scenario,
}

impl Cli {
    /// Parse `args` (program name first). `None` when the usage line should
    /// be shown instead.
    pub fn from_args<I, T>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Cli::try_parse_from(args).ok()
    }

    /// Number of `u32` elements covered by `size_kb`.
    pub fn elem_count(&self) -> usize {
        self.size_kb * 1024 / 4
    }
}

fn parse_size_kb(s: &str) -> Result<usize, String> {
    let kb: usize = s.parse().map_err(|e| format!("invalid size `{s}`: {e}"))?;
    if kb == 0 {
        return Err("size must be at least 1 KB".into());
    }
    kb.checked_mul(1024)
        .map(|_| kb)
        .ok_or_else(|| format!("size `{s}` KB overflows"))
}

fn parse_scenario(s: &str) -> Result<Scenario, String> {
    s.parse::<Scenario>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_and_default_scenario() {
        let cli = Cli::from_args(["interop", "4"]).unwrap();
        assert_eq!(cli.size_kb, 4);
        assert_eq!(cli.elem_count(), 1024);
        assert_eq!(cli.scenario, Scenario::InteropP2p);
    }

    #[test]
    fn test_scenario_flag() {
        let cli = Cli::from_args(["interop", "2", "--scenario", "ocl-p2p-parallel"]).unwrap();
        assert_eq!(cli.scenario, Scenario::OclP2pParallel);
        assert_eq!(cli.elem_count(), 512);
    }

    #[test]
    fn test_missing_or_invalid_size() {
        assert!(Cli::from_args(["interop"]).is_none());
        assert!(Cli::from_args(["interop", "lots"]).is_none());
        assert!(Cli::from_args(["interop", "0"]).is_none());
        assert!(Cli::from_args(["interop", "-3"]).is_none());
    }

    #[test]
    fn test_unknown_scenario() {
        assert!(Cli::from_args(["interop", "1", "--scenario", "warp-drive"]).is_none());
    }
}
