// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::{Parser, Subcommand};
use storage_registry::DirectoryType;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List all storage devices. (default)
    List(ListArgs),
    /// Print the current state of a storage device.
    State(StateArgs),
    /// Print the absolute path of a directory type on a storage device.
    Path(PathArgs),
    /// Watch storage devices and print state changes until interrupted.
    Watch(WatchArgs),
}

#[derive(Parser, Clone, Default)]
pub struct ListArgs {
    /// Print the device list as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct StateArgs {
    /// Storage id as shown by `list`.
    pub id: u32,
}

#[derive(Parser, Clone)]
pub struct PathArgs {
    /// Storage id as shown by `list`.
    pub id: u32,
    /// Directory type: images, sounds, videos, camera, downloads, music,
    /// documents, others or ringtones.
    pub kind: DirectoryType,
}

#[derive(Parser, Clone)]
pub struct WatchArgs {
    /// Storage ids to watch. Watches every device when omitted.
    pub ids: Vec<u32>,
    /// The interval in seconds at which mount state is polled.
    #[arg(short, long, default_value_t = 1)]
    pub interval: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_command() {
        let cli = Cli::try_parse_from(["storage-registry", "path", "2", "Downloads"]).unwrap();
        match cli.command {
            Some(Commands::Path(args)) => {
                assert_eq!(args.id, 2);
                assert_eq!(args.kind, DirectoryType::Downloads);
            }
            _ => panic!("expected path command"),
        }
    }

    #[test]
    fn test_parse_watch_defaults() {
        let cli = Cli::try_parse_from(["storage-registry", "-v", "watch"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Watch(args)) => {
                assert!(args.ids.is_empty());
                assert_eq!(args.interval, 1);
            }
            _ => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_invalid_directory_type_rejected() {
        assert!(Cli::try_parse_from(["storage-registry", "path", "0", "wallpapers"]).is_err());
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["storage-registry"]).unwrap();
        assert!(cli.command.is_none());
    }
}
